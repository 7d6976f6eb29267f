//! A builder pattern implementation for constructing a [`SyncEngine`]
//! instance.
//!
//! The [`EngineBuilder`] wires the engine's collaborators together,
//! initializing production-ready defaults (HTTP remote source, disk
//! fallback store) that can be overridden one by one.
//!
//! ## Example
//! ```ignore
//! let settings = Settings::load(None)?;
//! let engine = EngineBuilder::new(settings)
//!     .on_change(|namespace, snapshot| {
//!         println!("{} refreshed: {} keys", namespace, snapshot.len());
//!     })
//!     .build()?;
//! engine.start().await?;
//! ```

use std::sync::Arc;

use crate::metrics;
use crate::network::HttpConfigSource;
use crate::network::RemoteConfigSource;
use crate::storage::DiskFallbackStore;
use crate::storage::FallbackStore;
use crate::ConfigSnapshot;
use crate::Result;
use crate::Settings;

use super::ChangeListener;
use super::SyncEngine;

pub struct EngineBuilder {
    settings: Settings,
    source: Option<Arc<dyn RemoteConfigSource>>,
    store: Option<Arc<dyn FallbackStore>>,
    listener: Option<ChangeListener>,
}

impl EngineBuilder {
    /// Create a new builder with default components for `settings`
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            source: None,
            store: None,
            listener: None,
        }
    }

    /// Replace the default HTTP remote source
    pub fn remote_source(mut self, source: Arc<dyn RemoteConfigSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the default disk fallback store
    pub fn fallback_store(mut self, store: Arc<dyn FallbackStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register the change callback, invoked synchronously from the sync
    /// loop with `(namespace, new_snapshot)` after every detected change.
    /// A slow callback stalls the loop.
    pub fn on_change<F>(mut self, listener: F) -> Self
    where
        F: Fn(&str, &ConfigSnapshot) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Build the engine with current configuration
    pub fn build(self) -> Result<SyncEngine> {
        metrics::register_custom_metrics();

        let source: Arc<dyn RemoteConfigSource> = match self.source {
            Some(source) => source,
            None => Arc::new(HttpConfigSource::new(&self.settings)?),
        };
        let store: Arc<dyn FallbackStore> = match self.store {
            Some(store) => store,
            None => Arc::new(DiskFallbackStore::new(
                self.settings.storage.cache_dir.clone(),
            )?),
        };

        Ok(SyncEngine::new(self.settings, source, store, self.listener))
    }
}
