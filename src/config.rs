//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LIVEPOLL_BACK_CONFIG_PATH";

const DEFAULT_CODE_RETRY_LIMIT: u32 = 25;
const DEFAULT_ROOM_CHANNEL_CAPACITY: usize = 32;
const DEFAULT_MEDIA_ROOT: &str = "static/files";
const DEFAULT_SECRET_LENGTH: usize = 4;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// How many random codes to probe before giving up on allocation.
    pub code_retry_limit: u32,
    /// Broadcast channel capacity of each activity room.
    pub room_channel_capacity: usize,
    /// Root directory holding per-activity media files.
    pub media_root: PathBuf,
    /// Length of generated access secrets for anonymous activities.
    pub secret_length: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration from file");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            code_retry_limit: DEFAULT_CODE_RETRY_LIMIT,
            room_channel_capacity: DEFAULT_ROOM_CHANNEL_CAPACITY,
            media_root: PathBuf::from(DEFAULT_MEDIA_ROOT),
            secret_length: DEFAULT_SECRET_LENGTH,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    code_retry_limit: Option<u32>,
    room_channel_capacity: Option<usize>,
    media_root: Option<PathBuf>,
    secret_length: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            code_retry_limit: raw.code_retry_limit.unwrap_or(defaults.code_retry_limit),
            room_channel_capacity: raw
                .room_channel_capacity
                .unwrap_or(defaults.room_channel_capacity),
            media_root: raw.media_root.unwrap_or(defaults.media_root),
            secret_length: raw.secret_length.unwrap_or(defaults.secret_length),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let raw: RawConfig = serde_json::from_str(r#"{"code_retry_limit": 3}"#).unwrap();
        let config: AppConfig = raw.into();

        assert_eq!(config.code_retry_limit, 3);
        assert_eq!(config.room_channel_capacity, DEFAULT_ROOM_CHANNEL_CAPACITY);
        assert_eq!(config.media_root, PathBuf::from(DEFAULT_MEDIA_ROOT));
        assert_eq!(config.secret_length, DEFAULT_SECRET_LENGTH);
    }
}
