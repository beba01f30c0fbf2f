//! Conversation history backends for Parley.

pub mod file_backend;
pub mod in_memory;

#[cfg(test)]
mod conformance;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use parley_config::AppConfig;
use parley_core::{MessageStore, StoreError};
use std::sync::Arc;
use tracing::info;

/// Open the backend selected by `storage.backend`.
pub async fn build_from_config(config: &AppConfig) -> Result<Arc<dyn MessageStore>, StoreError> {
    let store: Arc<dyn MessageStore> = match config.storage.backend.as_str() {
        "memory" => Arc::new(InMemoryStore::new()),
        "file" => Arc::new(FileStore::open(config.storage_path())?),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let path = config.storage_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Storage(format!("Failed to create data directory: {e}"))
                })?;
            }
            Arc::new(SqliteStore::new(&path.to_string_lossy()).await?)
        }
        other => {
            return Err(StoreError::Storage(format!(
                "Storage backend '{other}' is not available in this build"
            )));
        }
    };
    info!(backend = store.name(), "Message store ready");
    Ok(store)
}
