use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::store::files::TrendStore;
use crate::store::models::AnalyzedVideo;

/// Outcome of persisting one scored batch. The file name is only used for
/// logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistResult {
    pub file_name: String,
    pub items: usize,
}

/// Final stage: hand the fully scored batch to the persistence collaborator.
#[async_trait]
pub trait PersistStage: Send + Sync {
    async fn persist(
        &self,
        region: &str,
        collected_at: DateTime<Utc>,
        batch: &[AnalyzedVideo],
    ) -> Result<PersistResult>;
}

/// Persistence over the flat-file store.
pub struct FilePersistStage {
    store: Arc<TrendStore>,
}

impl FilePersistStage {
    #[must_use]
    pub fn new(store: Arc<TrendStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PersistStage for FilePersistStage {
    async fn persist(
        &self,
        region: &str,
        collected_at: DateTime<Utc>,
        batch: &[AnalyzedVideo],
    ) -> Result<PersistResult> {
        let file_name = self
            .store
            .save_analyzed(region, collected_at, batch)
            .await
            .context("failed to save analyzed batch")?;

        info!(region, file = %file_name, items = batch.len(), "scored batch persisted");
        Ok(PersistResult {
            file_name,
            items: batch.len(),
        })
    }
}
