// src/providers/file.rs
use std::path::{Path, PathBuf};

use super::{ProviderError, SnapshotProvider};
use crate::snapshot::{v1::Pool, v2::Market};

/// Reads snapshots saved as JSON. `key` is a path relative to `root`; a key
/// without an extension gets `.json`.
pub struct JsonFileProvider {
    pub root: PathBuf,
}

impl JsonFileProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    fn path(&self, key: &str) -> PathBuf {
        let path = self.root.join(key);
        match path.extension() {
            Some(_) => path,
            None => path.with_extension("json"),
        }
    }

    async fn read(&self, key: &str) -> Result<String, ProviderError> {
        let path = self.path(key);
        tracing::debug!(path = %path.display(), "loading snapshot");
        Ok(tokio::fs::read_to_string(&path).await?)
    }
}

impl Default for JsonFileProvider {
    fn default() -> Self { Self::new(Path::new(".")) }
}

#[async_trait::async_trait]
impl SnapshotProvider for JsonFileProvider {
    async fn load_pool(&self, key: &str) -> Result<Pool, ProviderError> {
        Ok(Pool::from_json(&self.read(key).await?)?)
    }

    async fn load_market(&self, key: &str) -> Result<Market, ProviderError> {
        Ok(Market::from_json(&self.read(key).await?)?)
    }
}
