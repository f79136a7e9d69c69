//! Infrastructure layer for Murmur.
//!
//! Contains implementations of the port traits defined in `murmur-core`
//! (an in-memory `MemoryRepository`) and the `config.toml` loader.

pub mod config;
pub mod memory;

pub use memory::InMemoryRepository;
