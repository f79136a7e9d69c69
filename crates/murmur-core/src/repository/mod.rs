//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (murmur-infra) implements. The core crate never depends on any specific
//! storage technology.

pub mod box_memory;
pub mod memory;

pub use box_memory::BoxMemoryRepository;
pub use memory::MemoryRepository;
