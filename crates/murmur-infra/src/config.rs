//! Runtime configuration loader for Murmur.
//!
//! Reads `config.toml` (`~/.murmur/config.toml` by default) and deserializes
//! it into [`RuntimeConfig`]. Falls back to defaults when the file is missing
//! or malformed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use murmur_types::config::RuntimeConfig;

/// Minimum response deadline (safety floor).
const MIN_RESPONSE_TIMEOUT_SECS: u64 = 1;

/// Default config location: `~/.murmur/config.toml`.
///
/// Falls back to `./.murmur/config.toml` when no home directory is known.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".murmur")
        .join("config.toml")
}

/// Load runtime configuration from `path`.
///
/// - If the file does not exist, returns [`RuntimeConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - Otherwise returns the parsed config.
pub async fn load_runtime_config(path: &Path) -> RuntimeConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return RuntimeConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return RuntimeConfig::default();
        }
    };

    match toml::from_str::<RuntimeConfig>(&content) {
        Ok(config) => {
            tracing::info!(
                character = %config.character.name,
                plugins = config.plugins.len(),
                "Loaded config from {}",
                path.display()
            );
            config
        }
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            RuntimeConfig::default()
        }
    }
}

/// Resolve the per-message response deadline.
///
/// Priority:
/// 1. Explicit override (e.g. a CLI flag)
/// 2. `runtime.response_timeout_secs` from config
///
/// A one second floor is enforced regardless of source.
pub fn resolve_response_timeout(config: &RuntimeConfig, override_secs: Option<u64>) -> Duration {
    let secs = override_secs.unwrap_or(config.runtime.response_timeout_secs);
    Duration::from_secs(secs.max(MIN_RESPONSE_TIMEOUT_SECS))
}
