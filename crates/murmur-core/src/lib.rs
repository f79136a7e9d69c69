//! Runtime core for Murmur agents.
//!
//! This crate holds the message pipeline, the plugin and capability
//! registries, and the port traits (`MemoryRepository`, `ModelHandler`)
//! that the infrastructure layer implements. It depends only on
//! `murmur-types`, never on `murmur-infra`.

pub mod action;
pub mod agent;
pub mod bootstrap;
pub mod evaluator;
pub mod event;
pub mod model;
pub mod plugin;
pub mod provider;
pub mod repository;
pub mod runtime;
pub mod service;

#[cfg(test)]
mod testing;

pub use agent::{HandleOptions, MessageOrchestrator, MessageProcessingResult};
pub use runtime::AgentRuntime;
