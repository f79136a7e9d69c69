//! Shared domain types for Murmur.
//!
//! This crate contains the core domain types used across the Murmur agent
//! runtime: messages, per-turn state, action results, model invocation types,
//! runtime events, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod action;
pub mod config;
pub mod error;
pub mod event;
pub mod memory;
pub mod model;
pub mod state;
