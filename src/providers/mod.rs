// src/providers/mod.rs
use async_trait::async_trait;

use crate::error::RiskError;
use crate::snapshot::{v1::Pool, v2::Market};

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Snapshot(#[from] RiskError),
}

/// Source of point-in-time snapshots. Refresh cadence belongs to the caller.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Pool as served by the v1 subgraph.
    async fn load_pool(&self, key: &str) -> Result<Pool, ProviderError>;

    /// Market as served by the v2 API server.
    async fn load_market(&self, key: &str) -> Result<Market, ProviderError>;
}

pub mod file;
