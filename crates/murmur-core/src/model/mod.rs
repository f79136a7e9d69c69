//! Model handler abstractions for Murmur.
//!
//! - `ModelHandler`: RPITIT trait plugins implement for a model capability
//! - `BoxModelHandler`: object-safe wrapper for dynamic dispatch
//! - `ModelRegistry`: per-model-type handler lists with priority selection
//! - `merge_model_params`: character / per-model / call-site parameter merge

pub mod handler;
pub mod registry;
pub mod settings;

pub use handler::{BoxModelHandler, ModelHandler};
pub use registry::{ModelEntry, ModelRegistry};
pub use settings::merge_model_params;
