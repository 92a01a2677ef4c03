//! Framework configuration.
//!
//! This struct is plain `serde`-deserializable and carries no dependency
//! on the `config` crate itself — layering defaults, a user file, and
//! environment overrides is `forge-server`'s job (it wraps this type with
//! the `config` crate). Keeping the core library independent of that
//! crate lets it be embedded by hosts with their own configuration story.

use serde::{Deserialize, Serialize};

fn default_worker_pool_size() -> usize {
    forge_async::available_parallelism().into()
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory bundle archives are unpacked into and shared libraries
    /// are loaded from.
    pub location: std::path::PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            location: std::path::PathBuf::from("./forge-bundles"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_pool_size")]
    pub pool_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: default_worker_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Top-level framework configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameworkConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub log: LogConfig,
}
