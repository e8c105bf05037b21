use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::truncate_error_body;

#[derive(Debug, Clone)]
pub struct VpiConfig {
    pub api_url: String,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
}

/// One item of the batch prediction payload. Building this record is the
/// pipeline's validation gate; the client sends whatever it is handed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VpiFeatureRecord {
    pub id: String,
    pub actual_views: u64,
    pub subscriber_count: u64,
    pub upload_date: String,
    pub like_count: u64,
    pub duration_sec: u64,
    pub category_id: i64,
    pub is_short: bool,
    pub hours_since_upload: i64,
    pub category_group: &'static str,
}

/// Predicted virality for one video.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VpiPrediction {
    pub vpi_score: f64,
    pub predicted_views: f64,
}

#[derive(Debug, Deserialize)]
struct VpiResponseItem {
    id: String,
    #[serde(default)]
    vpi: f64,
    #[serde(default)]
    pred: f64,
}

/// Client for the external virality-prediction service. One POST per batch.
#[derive(Debug, Clone)]
pub struct VpiClient {
    client: Client,
    endpoint: Url,
}

impl VpiClient {
    /// # Errors
    /// Fails when the endpoint URL does not parse or the HTTP client cannot
    /// be built.
    pub fn new(config: VpiConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build VPI HTTP client")?;

        let endpoint = Url::parse(&config.api_url).context("invalid VPI endpoint URL")?;

        Ok(Self { client, endpoint })
    }

    /// Request predicted scores for a whole batch.
    ///
    /// The response is keyed by video id; ids the service did not score are
    /// simply absent from the map.
    ///
    /// # Errors
    /// A non-success response or an unparsable body is batch-fatal for the
    /// caller.
    pub async fn fetch_scores(
        &self,
        payload: &[VpiFeatureRecord],
    ) -> Result<HashMap<String, VpiPrediction>> {
        if payload.is_empty() {
            return Ok(HashMap::new());
        }

        debug!(count = payload.len(), "requesting VPI predictions");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(payload)
            .send()
            .await
            .context("VPI batch request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "VPI service returned status {}: {}",
                status,
                truncate_error_body(&body, 160)
            );
        }

        let items: Vec<VpiResponseItem> = response
            .json()
            .await
            .context("failed to deserialize VPI response")?;

        let predictions = items
            .into_iter()
            .map(|item| {
                (
                    item.id,
                    VpiPrediction {
                        vpi_score: item.vpi,
                        predicted_views: item.pred,
                    },
                )
            })
            .collect::<HashMap<_, _>>();

        debug!(count = predictions.len(), "VPI predictions received");
        Ok(predictions)
    }
}
