//! Pipeline orchestrator and builder for the trend-scoring pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::clients::{GeminiClient, VpiClient, YoutubeClient};
use crate::config::Config;
use crate::store::files::TrendStore;
use crate::store::models::{AnalyzedVideo, RawVideo};

use super::enrich::{EnrichStage, SubscriberEnrichStage};
use super::persist::{FilePersistStage, PersistResult, PersistStage};
use super::predict::{PredictStage, VpiPredictStage};
use super::score;
use super::vectorize::{KeywordVectorizeStage, VectorizeStage};

/// Core orchestrator: owns the batch for one run and sequences the stages
/// in their fixed dependency order (enrich → predict → vectorize → score →
/// persist).
///
/// Batch-fatal stage errors abort the run before anything is persisted;
/// per-item fallbacks are handled inside the stages themselves.
pub struct TrendPipeline {
    stages: PipelineStages,
}

/// Container for all pipeline stages.
pub struct PipelineStages {
    enrich: Arc<dyn EnrichStage>,
    predict: Arc<dyn PredictStage>,
    vectorize: Arc<dyn VectorizeStage>,
    persist: Arc<dyn PersistStage>,
}

/// Builder pattern for constructing [`TrendPipeline`] with custom stages.
#[derive(Default)]
pub struct PipelineBuilder {
    enrich: Option<Arc<dyn EnrichStage>>,
    predict: Option<Arc<dyn PredictStage>>,
    vectorize: Option<Arc<dyn VectorizeStage>>,
    persist: Option<Arc<dyn PersistStage>>,
}

impl TrendPipeline {
    /// Wire up the default stage implementations over the shared clients.
    #[must_use]
    pub fn new(
        config: &Config,
        youtube: Arc<YoutubeClient>,
        vpi: Arc<VpiClient>,
        gemini: Arc<GeminiClient>,
        store: Arc<TrendStore>,
    ) -> Self {
        PipelineBuilder::new()
            .with_enrich_stage(Arc::new(SubscriberEnrichStage::new(youtube)))
            .with_predict_stage(Arc::new(VpiPredictStage::new(vpi)))
            .with_vectorize_stage(Arc::new(KeywordVectorizeStage::new(
                gemini,
                config.keyword_count(),
                config.embed_concurrency(),
            )))
            .with_persist_stage(Arc::new(FilePersistStage::new(store)))
            .build()
    }

    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Execute the full pipeline for one region's collected batch.
    ///
    /// Batch order is preserved from `videos` through to persistence.
    ///
    /// # Errors
    /// Propagates batch-fatal stage failures; nothing is persisted in that
    /// case.
    pub async fn execute(
        &self,
        region: &str,
        collected_at: DateTime<Utc>,
        videos: &[RawVideo],
    ) -> Result<PersistResult> {
        let mut batch: Vec<AnalyzedVideo> = videos
            .iter()
            .map(|video| AnalyzedVideo::from_raw(video, region, collected_at))
            .collect();

        info!(region, items = batch.len(), "trend pipeline started");

        self.stages
            .enrich
            .enrich(&mut batch)
            .await
            .context("subscriber enrichment failed")?;
        self.stages
            .predict
            .predict(&mut batch)
            .await
            .context("VPI score integration failed")?;
        self.stages
            .vectorize
            .vectorize(&mut batch)
            .await
            .context("topic vectorization failed")?;

        score::calculate_trend_scores(&mut batch);

        let persisted = self
            .stages
            .persist
            .persist(region, collected_at, &batch)
            .await
            .context("failed to persist scored batch")?;

        info!(
            region,
            file = %persisted.file_name,
            items = persisted.items,
            "trend pipeline completed"
        );
        Ok(persisted)
    }
}

impl PipelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_enrich_stage(mut self, stage: Arc<dyn EnrichStage>) -> Self {
        self.enrich = Some(stage);
        self
    }

    #[must_use]
    pub fn with_predict_stage(mut self, stage: Arc<dyn PredictStage>) -> Self {
        self.predict = Some(stage);
        self
    }

    #[must_use]
    pub fn with_vectorize_stage(mut self, stage: Arc<dyn VectorizeStage>) -> Self {
        self.vectorize = Some(stage);
        self
    }

    #[must_use]
    pub fn with_persist_stage(mut self, stage: Arc<dyn PersistStage>) -> Self {
        self.persist = Some(stage);
        self
    }

    /// # Panics
    /// Panics when a stage was not configured; the pipeline has no optional
    /// stages.
    #[must_use]
    pub fn build(self) -> TrendPipeline {
        TrendPipeline {
            stages: PipelineStages {
                enrich: self
                    .enrich
                    .unwrap_or_else(|| panic!("enrich stage must be configured before build")),
                predict: self
                    .predict
                    .unwrap_or_else(|| panic!("predict stage must be configured before build")),
                vectorize: self
                    .vectorize
                    .unwrap_or_else(|| panic!("vectorize stage must be configured before build")),
                persist: self
                    .persist
                    .unwrap_or_else(|| panic!("persist stage must be configured before build")),
            },
        }
    }
}
