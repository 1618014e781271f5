use std::{env, path::PathBuf, time::Duration};
use tracing::{info, warn};

use crate::remote::{RemoteConfig, RemoteStore};

pub const DEFAULT_INTERVAL_SECONDS: u64 = 5;
pub const DEFAULT_BATCH_SIZE: usize = 1;
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
pub const DEFAULT_LOG_DIR: &str = "./data/logs";
/// Single-user deployments share one fixed owner id.
pub const DEFAULT_USER_ID: &str = "00000000-0000-0000-0000-000000000001";

const URL_VARS: [&str; 2] = ["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"];
const KEY_VARS: [&str; 2] = ["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("interval must be at least 1 second")]
    ZeroInterval,

    #[error("batch size must be at least 1")]
    ZeroBatchSize,
}

/// Settings shared by the tracker loop and the reporting server.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    pub interval_seconds: u64,
    pub batch_size: usize,
    pub log_dir: PathBuf,
    pub retention_days: u32,
    pub remote: Option<RemoteConfig>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            batch_size: DEFAULT_BATCH_SIZE,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            retention_days: DEFAULT_RETENTION_DAYS,
            remote: None,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_seconds == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Builds the remote client, or `None` for local-only mode.
    pub fn remote_store(&self) -> Option<RemoteStore> {
        let Some(cfg) = self.remote.clone() else {
            info!("remote mirror disabled (no credentials); local log only");
            return None;
        };
        match RemoteStore::new(cfg) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("remote mirror disabled: {e}; local log only");
                None
            }
        }
    }
}

/// Loads `.env.local` then `.env` from the working directory, if present.
/// Variables already set in the process environment win.
pub fn load_env_files() {
    for name in [".env.local", ".env"] {
        if dotenvy::from_filename(name).is_ok() {
            info!("loaded environment from {name}");
        }
    }
}

/// Remote credentials from explicit values, falling back to the environment.
pub fn resolve_remote(
    url: Option<String>,
    key: Option<String>,
    user_id: Option<String>,
) -> Option<RemoteConfig> {
    let url = url.filter(|v| !v.trim().is_empty()).or_else(|| first_env(&URL_VARS))?;
    let key = key.filter(|v| !v.trim().is_empty()).or_else(|| first_env(&KEY_VARS))?;
    Some(RemoteConfig {
        url,
        key,
        user_id: user_id.unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
    })
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|n| env::var(n).ok())
        .find(|v| !v.trim().is_empty())
}
