use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A video resource as returned by the popular-videos listing.
///
/// Only the parts the pipeline consumes are modeled; everything else in the
/// API response is ignored. Counts arrive as decimal strings and may be
/// absent for videos with hidden statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVideo {
    pub id: String,
    #[serde(default)]
    pub snippet: Snippet,
    #[serde(default)]
    pub statistics: Statistics,
    #[serde(rename = "contentDetails", default)]
    pub content_details: ContentDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnails: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    #[serde(default)]
    pub view_count: Option<String>,
    #[serde(default)]
    pub like_count: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentDetails {
    #[serde(default)]
    pub duration: Option<String>,
}

/// The unit of analysis: one video of a batch, created from a [`RawVideo`]
/// at the start of a run and filled in place by each pipeline stage.
///
/// Serde renames keep the persisted schema stable (`trendScore_View` and
/// friends predate this worker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedVideo {
    #[serde(rename = "videoId")]
    pub video_id: String,
    #[serde(rename = "collectedAt")]
    pub collected_at: DateTime<Utc>,
    #[serde(rename = "regionCode")]
    pub region_code: String,
    pub title: String,
    /// Carried for keyword extraction only; not part of the persisted record.
    #[serde(skip)]
    pub description: String,
    #[serde(rename = "publishedAt")]
    pub published_at: String,
    #[serde(rename = "viewCount")]
    pub view_count: u64,
    #[serde(rename = "likeCount")]
    pub like_count: u64,
    #[serde(rename = "categoryId")]
    pub category_id: Option<String>,
    pub duration: Option<String>,
    #[serde(rename = "channelId")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnails: Option<Value>,
    /// Never 0 in a persisted record; the enrichment stage floors it to 1.
    #[serde(rename = "subscriberCount")]
    pub subscriber_count: u64,
    #[serde(rename = "vpiScore")]
    pub vpi_score: f64,
    pub keywords: Vec<String>,
    /// Empty means "no topic signal" for this video.
    #[serde(rename = "keywordEmbedding")]
    pub keyword_embedding: Vec<f32>,
    #[serde(rename = "trendScore_View")]
    pub trend_score_view: f64,
    #[serde(rename = "trendScore_VPI")]
    pub trend_score_vpi: f64,
}

impl AnalyzedVideo {
    /// Base conversion from a collected resource. Analysis fields start at
    /// their documented defaults and are only meaningful after their stage
    /// has run.
    #[must_use]
    pub fn from_raw(raw: &RawVideo, region: &str, collected_at: DateTime<Utc>) -> Self {
        Self {
            video_id: raw.id.clone(),
            collected_at,
            region_code: region.to_string(),
            title: raw.snippet.title.clone(),
            description: raw.snippet.description.clone(),
            published_at: raw.snippet.published_at.clone(),
            view_count: parse_count(raw.statistics.view_count.as_deref()),
            like_count: parse_count(raw.statistics.like_count.as_deref()),
            category_id: raw.snippet.category_id.clone(),
            duration: raw.content_details.duration.clone(),
            channel_id: raw.snippet.channel_id.clone(),
            thumbnails: raw.snippet.thumbnails.clone(),
            subscriber_count: 1,
            vpi_score: 0.0,
            keywords: Vec::new(),
            keyword_embedding: Vec::new(),
            trend_score_view: 0.0,
            trend_score_vpi: 0.0,
        }
    }
}

fn parse_count(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.parse().ok()).unwrap_or(0)
}
