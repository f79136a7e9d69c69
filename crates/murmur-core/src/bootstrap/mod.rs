//! Built-in `bootstrap` plugin.
//!
//! Supplies the baseline actions every agent needs (`REPLY`, `IGNORE`,
//! `NONE`) and the providers the strategies rely on (`CHARACTER`,
//! `RECENT_MESSAGES`, `ACTIONS`, `ACTION_STATE`).

pub mod actions;
pub mod providers;

use crate::action::BoxAction;
use crate::plugin::Plugin;
use crate::provider::BoxProvider;

pub use actions::{IgnoreAction, NoneAction, ReplyAction};
pub use providers::{ActionStateProvider, ActionsProvider, CharacterProvider, RecentMessagesProvider};

pub const REPLY_ACTION: &str = "REPLY";
pub const IGNORE_ACTION: &str = "IGNORE";
pub const NONE_ACTION: &str = "NONE";

pub const CHARACTER_PROVIDER: &str = "CHARACTER";
pub const RECENT_MESSAGES_PROVIDER: &str = "RECENT_MESSAGES";
pub const ACTIONS_PROVIDER: &str = "ACTIONS";
pub const ACTION_STATE_PROVIDER: &str = "ACTION_STATE";

#[derive(Debug, Default)]
pub struct BootstrapPlugin;

impl Plugin for BootstrapPlugin {
    fn name(&self) -> &str {
        "bootstrap"
    }

    fn description(&self) -> &str {
        "Core actions and context providers"
    }

    fn actions(&self) -> Vec<BoxAction> {
        vec![
            BoxAction::new(ReplyAction::default()),
            BoxAction::new(IgnoreAction),
            BoxAction::new(NoneAction),
        ]
    }

    fn providers(&self) -> Vec<BoxProvider> {
        vec![
            BoxProvider::new(CharacterProvider),
            BoxProvider::new(RecentMessagesProvider),
            BoxProvider::new(ActionsProvider),
            BoxProvider::new(ActionStateProvider),
        ]
    }
}
