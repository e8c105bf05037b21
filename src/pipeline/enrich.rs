use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::clients::YoutubeClient;
use crate::store::models::AnalyzedVideo;

/// Stage 1: attach per-channel subscriber counts to every video.
#[async_trait]
pub trait EnrichStage: Send + Sync {
    async fn enrich(&self, batch: &mut [AnalyzedVideo]) -> Result<()>;
}

/// Enrichment backed by one batched channel-statistics lookup.
///
/// The join is intentionally lossy: a missing channel id or a missing map
/// entry resolves to a subscriber count of 1 so downstream numeric stages
/// never see a zero. No video is ever dropped here.
pub struct SubscriberEnrichStage {
    client: Arc<YoutubeClient>,
}

impl SubscriberEnrichStage {
    #[must_use]
    pub fn new(client: Arc<YoutubeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EnrichStage for SubscriberEnrichStage {
    async fn enrich(&self, batch: &mut [AnalyzedVideo]) -> Result<()> {
        let channel_ids: Vec<String> = batch
            .iter()
            .filter_map(|video| video.channel_id.clone())
            .collect();

        let counts = self.client.fetch_channel_subscriber_counts(&channel_ids).await;
        merge_subscriber_counts(batch, &counts);

        debug!(
            videos = batch.len(),
            channels_resolved = counts.len(),
            "subscriber counts merged"
        );
        Ok(())
    }
}

/// Assign each video its channel's subscriber count, floored to 1.
pub fn merge_subscriber_counts(batch: &mut [AnalyzedVideo], counts: &HashMap<String, u64>) {
    for video in batch {
        let count = video
            .channel_id
            .as_ref()
            .and_then(|id| counts.get(id))
            .copied()
            .unwrap_or(1);
        video.subscriber_count = count.max(1);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::store::models::RawVideo;

    use super::*;

    fn video(id: &str, channel_id: Option<&str>) -> AnalyzedVideo {
        let raw: RawVideo = serde_json::from_value(serde_json::json!({
            "id": id,
            "snippet": {"channelId": channel_id}
        }))
        .expect("raw video");
        AnalyzedVideo::from_raw(&raw, "KR", Utc::now())
    }

    #[test]
    fn merge_assigns_looked_up_counts() {
        let mut batch = vec![video("a", Some("chan-1")), video("b", Some("chan-2"))];
        let counts = HashMap::from([
            ("chan-1".to_string(), 5000_u64),
            ("chan-2".to_string(), 120_u64),
        ]);

        merge_subscriber_counts(&mut batch, &counts);

        assert_eq!(batch[0].subscriber_count, 5000);
        assert_eq!(batch[1].subscriber_count, 120);
    }

    #[test]
    fn merge_defaults_missing_lookups_to_one() {
        let mut batch = vec![video("a", Some("unknown-chan")), video("b", None)];

        merge_subscriber_counts(&mut batch, &HashMap::new());

        assert_eq!(batch[0].subscriber_count, 1);
        assert_eq!(batch[1].subscriber_count, 1);
    }

    #[test]
    fn merge_floors_zero_counts() {
        let mut batch = vec![video("a", Some("chan-1"))];
        let counts = HashMap::from([("chan-1".to_string(), 0_u64)]);

        merge_subscriber_counts(&mut batch, &counts);

        assert_eq!(batch[0].subscriber_count, 1);
    }

    #[test]
    fn merge_keeps_every_video() {
        let mut batch = vec![video("a", None), video("b", Some("chan-1")), video("c", None)];
        merge_subscriber_counts(&mut batch, &HashMap::new());

        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|v| v.subscriber_count >= 1));
    }
}
