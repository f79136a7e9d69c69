//! Message handling pipeline for Murmur.
//!
//! - `decision`: rule-based respond/skip decision per message
//! - `single_shot` / `multi_step`: response strategies
//! - `ledger`: per-room supersession tickets
//! - `orchestrator`: drives one message through the whole pipeline

pub mod decision;
pub mod ledger;
pub mod multi_step;
pub mod orchestrator;
pub mod parse;
pub mod prompt;
pub mod single_shot;
pub mod strategy;

pub use decision::{MentionContext, ResponseDecision, ResponsePolicy, decide};
pub use ledger::ResponseLedger;
pub use multi_step::run_multi_step;
pub use orchestrator::{HandleOptions, MessageOrchestrator, MessageProcessingResult};
pub use single_shot::run_single_shot;
pub use strategy::{ResponseMode, StrategyResult};
