use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::clients::truncate_error_body;
use crate::store::models::RawVideo;

/// The channels endpoint accepts at most this many ids per request.
const MAX_CHANNELS_PER_REQUEST: usize = 50;

#[derive(Debug, Clone)]
pub struct YoutubeConfig {
    pub base_url: String,
    pub api_key: String,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
}

/// Client for the video platform's data API: popular-videos listing and
/// batched channel statistics.
#[derive(Debug, Clone)]
pub struct YoutubeClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<RawVideo>,
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelResource>,
}

#[derive(Debug, Deserialize)]
struct ChannelResource {
    id: String,
    #[serde(default)]
    statistics: Option<ChannelStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    #[serde(default)]
    subscriber_count: Option<String>,
}

impl YoutubeClient {
    /// # Errors
    /// Fails when the base URL does not parse or the HTTP client cannot be
    /// built.
    pub fn new(config: YoutubeConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build youtube HTTP client")?;

        // Url::join drops the last path segment without a trailing slash.
        let mut raw_base = config.base_url;
        if !raw_base.ends_with('/') {
            raw_base.push('/');
        }
        let base_url = Url::parse(&raw_base).context("invalid youtube base URL")?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
        })
    }

    /// Fetch the current most-popular videos for a region.
    ///
    /// # Errors
    /// A non-success response or an unparsable body fails the region's run.
    pub async fn fetch_popular_videos(
        &self,
        region: &str,
        max_results: usize,
    ) -> Result<Vec<RawVideo>> {
        let mut url = self
            .base_url
            .join("videos")
            .context("failed to build videos URL")?;
        url.query_pairs_mut()
            .append_pair("part", "snippet,statistics,contentDetails")
            .append_pair("chart", "mostPopular")
            .append_pair("regionCode", region)
            .append_pair("maxResults", &max_results.to_string())
            .append_pair("key", &self.api_key);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("popular videos request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "videos endpoint returned status {}: {}",
                status,
                truncate_error_body(&body, 300)
            );
        }

        let list: VideoListResponse = response
            .json()
            .await
            .context("failed to deserialize popular videos response")?;

        debug!(region, count = list.items.len(), "popular videos fetched");
        Ok(list.items)
    }

    /// Batched subscriber-count lookup for a set of channel ids.
    ///
    /// Absence is a valid response: ids missing from the result are the
    /// caller's problem to default. A failed request degrades to an empty
    /// map (logged) so the pipeline can fall back to the floor value instead
    /// of aborting the batch. Private or zero counts come back as 1.
    pub async fn fetch_channel_subscriber_counts(
        &self,
        channel_ids: &[String],
    ) -> HashMap<String, u64> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = channel_ids
            .iter()
            .filter(|id| !id.is_empty() && seen.insert(id.as_str()))
            .collect();

        debug!(count = unique.len(), "looking up channel subscriber counts");
        if unique.is_empty() {
            return HashMap::new();
        }

        let id_param = unique
            .iter()
            .take(MAX_CHANNELS_PER_REQUEST)
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(",");

        match self.request_channel_statistics(&id_param).await {
            Ok(counts) => counts,
            Err(error) => {
                warn!(
                    error = %error,
                    "channel statistics lookup failed; continuing with floor subscriber counts"
                );
                HashMap::new()
            }
        }
    }

    async fn request_channel_statistics(&self, id_param: &str) -> Result<HashMap<String, u64>> {
        let mut url = self
            .base_url
            .join("channels")
            .context("failed to build channels URL")?;
        url.query_pairs_mut()
            .append_pair("part", "statistics")
            .append_pair("id", id_param)
            .append_pair("key", &self.api_key);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("channels request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "channels endpoint returned status {}: {}",
                status,
                truncate_error_body(&body, 300)
            );
        }

        let list: ChannelListResponse = response
            .json()
            .await
            .context("failed to deserialize channels response")?;

        if list.items.is_empty() {
            warn!("channels endpoint returned no items");
        }

        let mut counts = HashMap::new();
        for channel in list.items {
            let count = channel
                .statistics
                .and_then(|stats| stats.subscriber_count)
                .and_then(|raw| raw.parse::<u64>().ok())
                .unwrap_or(1);
            counts.insert(channel.id, count.max(1));
        }

        debug!(count = counts.len(), "channel subscriber counts fetched");
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_config(base_url: String) -> YoutubeConfig {
        YoutubeConfig {
            base_url,
            api_key: "test-key".to_string(),
            connect_timeout: Duration::from_secs(3),
            total_timeout: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn fetch_popular_videos_parses_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("chart", "mostPopular"))
            .and(query_param("regionCode", "KR"))
            .and(query_param("maxResults", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"id": "a", "statistics": {"viewCount": "10"}},
                    {"id": "b"}
                ]
            })))
            .mount(&server)
            .await;

        let client = YoutubeClient::new(test_config(server.uri())).expect("client builds");
        let videos = client
            .fetch_popular_videos("KR", 2)
            .await
            .expect("fetch succeeds");

        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].id, "a");
        assert_eq!(videos[0].statistics.view_count.as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn fetch_popular_videos_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos"))
            .respond_with(ResponseTemplate::new(403).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let client = YoutubeClient::new(test_config(server.uri())).expect("client builds");
        let error = client
            .fetch_popular_videos("KR", 30)
            .await
            .expect_err("status 403 is an error");

        assert!(error.to_string().contains("403"));
    }

    #[tokio::test]
    async fn subscriber_counts_floor_zero_and_private_to_one() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .and(query_param("id", "chan-1,chan-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"id": "chan-1", "statistics": {"subscriberCount": "0"}},
                    {"id": "chan-2", "statistics": {}}
                ]
            })))
            .mount(&server)
            .await;

        let client = YoutubeClient::new(test_config(server.uri())).expect("client builds");
        let ids = vec![
            "chan-1".to_string(),
            "chan-2".to_string(),
            // duplicate must not be sent twice
            "chan-1".to_string(),
        ];
        let counts = client.fetch_channel_subscriber_counts(&ids).await;

        assert_eq!(counts.get("chan-1"), Some(&1));
        assert_eq!(counts.get("chan-2"), Some(&1));
    }

    #[tokio::test]
    async fn subscriber_counts_degrade_to_empty_on_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = YoutubeClient::new(test_config(server.uri())).expect("client builds");
        let counts = client
            .fetch_channel_subscriber_counts(&["chan-1".to_string()])
            .await;

        assert!(counts.is_empty());
    }

    #[tokio::test]
    async fn subscriber_counts_skip_request_for_no_ids() {
        // no server: an empty id list must not hit the network
        let client = YoutubeClient::new(test_config("http://127.0.0.1:1".to_string()))
            .expect("client builds");
        let counts = client.fetch_channel_subscriber_counts(&[]).await;

        assert!(counts.is_empty());
    }
}
