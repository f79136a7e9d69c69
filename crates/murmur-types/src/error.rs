use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while invoking a model handler.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no handler registered for model type '{model_type}'")]
    NoHandler { model_type: String },

    #[error("provider '{provider}' has no handler for model type '{model_type}'")]
    NoProviderHandler { model_type: String, provider: String },

    #[error("model provider error: {0}")]
    Provider(String),

    #[error("unexpected model output: expected {expected}")]
    UnexpectedOutput { expected: &'static str },
}

/// Errors from repository operations (used by trait definitions in murmur-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("memory not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors returned by an action handler.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action failed: {0}")]
    Failed(String),

    #[error("action cancelled")]
    Cancelled,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors returned by a context provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors related to plugin registration.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("invalid plugin: {0}")]
    Invalid(String),

    #[error("plugin '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("plugin '{name}' failed to initialize: {message}")]
    InitFailed { name: String, message: String },
}

/// Errors surfaced to callers of the message-processing pipeline.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("run {run_id} timed out after {after:?}")]
    Timeout { run_id: Uuid, after: Duration },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_handler_display() {
        let err = ModelError::NoHandler {
            model_type: "TEXT_LARGE".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no handler registered for model type 'TEXT_LARGE'"
        );
    }

    #[test]
    fn test_timeout_display_mentions_run() {
        let run_id = Uuid::now_v7();
        let err = RuntimeError::Timeout {
            run_id,
            after: Duration::from_secs(5),
        };
        assert!(err.to_string().contains(&run_id.to_string()));
    }

    #[test]
    fn test_runtime_error_wraps_model_error() {
        let err: RuntimeError = ModelError::Provider("down".to_string()).into();
        assert_eq!(err.to_string(), "model provider error: down");
    }
}
