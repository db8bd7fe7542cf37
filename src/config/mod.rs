use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DEFAULT_SLOW_QUERY_MS: u64 = 100;

// ─── StorageConfig ────────────────────────────────────────────────────────────

/// Storage configuration (`[storage]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the SQLite database.
    pub data_dir: PathBuf,
    /// Log SQLite queries that exceed this threshold (milliseconds).
    /// Set to 0 to disable slow query logging.
    pub slow_query_threshold_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            slow_query_threshold_ms: DEFAULT_SLOW_QUERY_MS,
        }
    }
}

// ─── ReviewConfig ─────────────────────────────────────────────────────────────

/// Review policy configuration (`[review]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// When true, an update cannot be approved or rejected by the worker who
    /// submitted it. Default: false (small teams often self-review).
    pub forbid_self_review: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            forbid_self_review: false,
        }
    }
}

// ─── EngineConfig ─────────────────────────────────────────────────────────────

/// Top-level engine configuration, loaded from a TOML file.
/// Missing file or missing sections fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub storage: StorageConfig,
    pub review: ReviewConfig,
}

impl EngineConfig {
    /// Load configuration from `path`. A missing file is not an error:
    /// defaults apply and a note is logged.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no config file found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        match toml::from_str::<Self>(&raw) {
            Ok(config) => {
                info!(path = %path.display(), "loaded engine config");
                Ok(config)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config file invalid, using defaults");
                Ok(Self::default())
            }
        }
    }
}
