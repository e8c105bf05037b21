use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::clients::{VpiClient, VpiFeatureRecord, VpiPrediction};
use crate::store::models::AnalyzedVideo;
use crate::util::time;

/// Videos at or under this length are classified as short-form.
pub const SHORT_FORM_MAX_SECS: u64 = 140;

/// Stage 2: attach the externally predicted virality score to every video.
#[async_trait]
pub trait PredictStage: Send + Sync {
    async fn predict(&self, batch: &mut [AnalyzedVideo]) -> Result<()>;
}

/// Prediction backed by one batched call to the VPI service.
pub struct VpiPredictStage {
    client: Arc<VpiClient>,
}

impl VpiPredictStage {
    #[must_use]
    pub fn new(client: Arc<VpiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PredictStage for VpiPredictStage {
    async fn predict(&self, batch: &mut [AnalyzedVideo]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        // Payload construction is the validation gate: one malformed video
        // fails the whole batch because the call is a single request.
        let payload =
            build_vpi_payload(batch, time::now()).context("failed to build VPI payload")?;
        let predictions = self
            .client
            .fetch_scores(&payload)
            .await
            .context("VPI batch call failed")?;

        apply_predictions(batch, &predictions);
        debug!(
            videos = batch.len(),
            scored = predictions.len(),
            "VPI scores merged"
        );
        Ok(())
    }
}

/// Build the batch prediction payload, validating required fields.
///
/// # Errors
/// Any video missing a category id, duration, or parseable publish
/// timestamp, or carrying a non-floored (zero) subscriber count, fails the
/// whole batch.
pub fn build_vpi_payload(
    batch: &[AnalyzedVideo],
    now: DateTime<Utc>,
) -> Result<Vec<VpiFeatureRecord>> {
    batch.iter().map(|video| feature_record(video, now)).collect()
}

fn feature_record(video: &AnalyzedVideo, now: DateTime<Utc>) -> Result<VpiFeatureRecord> {
    let id = &video.video_id;

    let Some(category_raw) = video.category_id.as_deref() else {
        bail!("video {id}: missing category id");
    };
    let category_id: i64 = category_raw
        .parse()
        .with_context(|| format!("video {id}: non-numeric category id {category_raw:?}"))?;

    let Some(duration) = video.duration.as_deref() else {
        bail!("video {id}: missing duration");
    };

    let Some(hours_since_upload) = time::hours_since(&video.published_at, now) else {
        bail!(
            "video {id}: missing or unparsable publish timestamp {:?}",
            video.published_at
        );
    };

    // the enrichment stage floors to 1; a zero means it never ran
    if video.subscriber_count == 0 {
        bail!("video {id}: subscriber count was not enriched");
    }

    let duration_sec = time::parse_iso8601_duration_secs(duration);

    Ok(VpiFeatureRecord {
        id: id.clone(),
        actual_views: video.view_count,
        subscriber_count: video.subscriber_count,
        upload_date: video.published_at.clone(),
        like_count: video.like_count,
        duration_sec,
        category_id,
        is_short: duration_sec <= SHORT_FORM_MAX_SECS,
        hours_since_upload,
        category_group: category_group(category_id),
    })
}

/// Merge predictions by video id; ids the service did not score get 0.
pub fn apply_predictions(
    batch: &mut [AnalyzedVideo],
    predictions: &HashMap<String, VpiPrediction>,
) {
    for video in batch {
        video.vpi_score = predictions
            .get(&video.video_id)
            .map_or(0.0, |prediction| prediction.vpi_score);
    }
}

/// Coarse category grouping the VPI request schema expects.
fn category_group(category_id: i64) -> &'static str {
    match category_id {
        10 => "Music",
        17 => "Sports",
        20 => "Gaming",
        22 => "People & Blogs",
        25 => "News",
        26 => "Howto & Style",
        27 => "Education",
        28 => "Science & Tech",
        29 => "Giving",
        1 | 2 | 15 | 18 | 19 | 21 | 23 | 24 | 30 => "Entertainment",
        _ => "Other",
    }
}
