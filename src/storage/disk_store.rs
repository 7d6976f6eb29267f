use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::debug;
use tracing::warn;

use super::FallbackStore;
use crate::constants::DISK_RECORD_SUFFIX;
use crate::utils::file_io;
use crate::utils::hash::content_hash;
use crate::ConfigSnapshot;
use crate::StorageError;

/// File-per-namespace fallback store.
///
/// One record per namespace under `base_dir`; presence of the file is the
/// existence check, there is no separate index. Records are replaced
/// atomically (temp file + rename), and a write whose content hash matches
/// the last written record is suppressed entirely.
pub struct DiskFallbackStore {
    base_dir: PathBuf,

    /// Content hash of the last record written per namespace.
    hashes: Mutex<HashMap<String, u64>>,
}

impl DiskFallbackStore {
    /// Creates the store, bootstrapping `base_dir` if needed.
    pub fn new(base_dir: PathBuf) -> Result<Self, StorageError> {
        file_io::ensure_dir(&base_dir)?;
        Ok(Self {
            base_dir,
            hashes: Mutex::new(HashMap::new()),
        })
    }

    fn record_path(&self, namespace: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}{}", namespace, DISK_RECORD_SUFFIX))
    }

    fn decode(buf: &[u8]) -> Result<ConfigSnapshot, StorageError> {
        bincode::deserialize(buf).map_err(StorageError::Serialization)
    }
}

impl FallbackStore for DiskFallbackStore {
    fn write(&self, namespace: &str, snapshot: &ConfigSnapshot) -> Result<(), StorageError> {
        let buf = bincode::serialize(snapshot)?;
        let new_hash = content_hash(&buf);

        let mut hashes = self.hashes.lock();
        if hashes.get(namespace) == Some(&new_hash) {
            debug!("record for namespace '{}' unchanged, skip write", namespace);
            return Ok(());
        }
        file_io::write_atomic(&self.record_path(namespace), &buf)?;
        hashes.insert(namespace.to_string(), new_hash);
        debug!("persisted record for namespace '{}'", namespace);
        Ok(())
    }

    fn read(&self, namespace: &str) -> Result<Option<ConfigSnapshot>, StorageError> {
        let path = self.record_path(namespace);
        if !path.is_file() {
            return Ok(None);
        }
        let buf = fs::read(&path)?;
        Ok(Some(Self::decode(&buf)?))
    }

    fn load_all(&self) -> Result<HashMap<String, ConfigSnapshot>, StorageError> {
        let mut records = HashMap::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            // The namespace is everything before the record suffix; dotted
            // namespaces such as "app.yaml" round-trip intact.
            let Some(namespace) = name.strip_suffix(DISK_RECORD_SUFFIX) else {
                continue;
            };
            if namespace.is_empty() {
                continue;
            }
            match fs::read(entry.path()) {
                Ok(buf) => match Self::decode(&buf) {
                    Ok(snapshot) => {
                        records.insert(namespace.to_string(), snapshot);
                    }
                    Err(e) => warn!("skip undecodable record '{}': {}", name, e),
                },
                Err(e) => warn!("skip unreadable record '{}': {}", name, e),
            }
        }
        Ok(records)
    }
}
