use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Disk fallback and daemon logging paths
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding one persisted record per namespace
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Daemon log directory; stdout logging when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            log_dir: None,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./confsync-cache")
}
