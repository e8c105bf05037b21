use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::clients::truncate_error_body;

/// Description text is clipped to this many characters in the prompt.
const MAX_DESCRIPTION_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    pub keyword_model: String,
    pub embed_model: String,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
}

/// Per-video input of the keyword extraction prompt.
#[derive(Debug, Clone)]
pub struct KeywordSource {
    pub video_id: String,
    pub title: String,
    pub description: String,
}

/// Client for the LLM keyword-extraction call and the keyword-embedding
/// call. Both are thin wrappers over the generative-language API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: Url,
    api_key: String,
    keyword_model: String,
    embed_model: String,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    #[serde(default)]
    embedding: Embedding,
}

#[derive(Debug, Default, Deserialize)]
struct Embedding {
    #[serde(default)]
    values: Vec<f32>,
}

impl GeminiClient {
    /// # Errors
    /// Fails when the base URL does not parse or the HTTP client cannot be
    /// built.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build gemini HTTP client")?;

        // Url::join drops the last path segment without a trailing slash.
        let mut raw_base = config.base_url;
        if !raw_base.ends_with('/') {
            raw_base.push('/');
        }
        let base_url = Url::parse(&raw_base).context("invalid gemini base URL")?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
            keyword_model: config.keyword_model,
            embed_model: config.embed_model,
        })
    }

    /// Extract topical keywords for a whole batch with a single prompt.
    ///
    /// The returned map is untrusted: the model decides which ids appear and
    /// how many keywords each carries. Callers reconcile the cardinality.
    ///
    /// # Errors
    /// A non-success response or model output that is not a JSON object is
    /// batch-fatal for the caller.
    pub async fn extract_keywords_batch(
        &self,
        videos: &[KeywordSource],
        count: usize,
    ) -> Result<HashMap<String, Vec<String>>> {
        if videos.is_empty() {
            return Ok(HashMap::new());
        }

        let prompt = build_keyword_prompt(videos, count);
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 8192,
                response_mime_type: "application/json",
            },
        };

        let url = self.model_url(&self.keyword_model, "generateContent")?;
        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .context("keyword extraction request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "keyword extraction returned status {}: {}",
                status,
                truncate_error_body(&body, 300)
            );
        }

        let generated: GenerateContentResponse = response
            .json()
            .await
            .context("failed to deserialize keyword extraction response")?;
        let text = response_text(&generated);

        let parsed: Value = serde_json::from_str(&text)
            .with_context(|| format!("model returned unparsable keyword JSON: {}", truncate_error_body(&text, 200)))?;
        let Value::Object(entries) = parsed else {
            anyhow::bail!("model returned keyword JSON that is not an object");
        };

        let mut keywords = HashMap::new();
        for (video_id, value) in entries {
            let candidates = match value {
                Value::Array(items) => items
                    .into_iter()
                    .filter_map(|item| item.as_str().map(ToString::to_string))
                    .collect(),
                // a bare string still counts as one candidate
                Value::String(single) => vec![single],
                _ => Vec::new(),
            };
            keywords.insert(video_id, candidates);
        }

        debug!(count = keywords.len(), "keyword candidates extracted");
        Ok(keywords)
    }

    /// Embed one keyword. Failures are the caller's per-item problem.
    ///
    /// # Errors
    /// A non-success response or an unparsable body fails this keyword only.
    pub async fn embed_keyword(&self, keyword: &str) -> Result<Vec<f32>> {
        let request = EmbedContentRequest {
            content: Content {
                parts: vec![Part {
                    text: keyword.to_string(),
                }],
            },
        };

        let url = self.model_url(&self.embed_model, "embedContent")?;
        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .context("keyword embedding request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("keyword embedding returned status {status}");
        }

        let embedded: EmbedContentResponse = response
            .json()
            .await
            .context("failed to deserialize keyword embedding response")?;

        Ok(embedded.embedding.values)
    }

    fn model_url(&self, model: &str, action: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("models/{model}:{action}"))
            .with_context(|| format!("failed to build {action} URL"))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

fn response_text(response: &GenerateContentResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .and_then(|content| content.parts.first())
        .map(|part| part.text.clone())
        .unwrap_or_default()
}

fn build_keyword_prompt(videos: &[KeywordSource], count: usize) -> String {
    let header = format!(
        "You are a video metadata analyst.\n\
         From each video's title and description, produce {count} keywords that capture its core topic.\n\n\
         Rules:\n\
         - Keywords are concise noun phrases\n\
         - Prefer proper nouns and topical terms; avoid duplicates and synonyms\n\
         - No hashtags, sentences, emoji, or markdown; keywords only\n\
         - Output exactly one JSON object, nothing else\n\n\
         Format: {{ \"<videoId>\": [\"keyword1\", ... ({count} total) ...], ... }}"
    );

    let entries = videos
        .iter()
        .enumerate()
        .map(|(idx, video)| {
            let description = clip_description(&video.description);
            format!(
                "#{}\nvideoId: {}\ntitle: {}\ndescription: {}",
                idx + 1,
                video.video_id,
                video.title,
                description
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{header}\n\n[Input]\n{entries}")
}

fn clip_description(description: &str) -> String {
    description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_DESCRIPTION_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_config(base_url: String) -> GeminiConfig {
        GeminiConfig {
            base_url,
            api_key: "test-key".to_string(),
            keyword_model: "kw-model".to_string(),
            embed_model: "embed-model".to_string(),
            connect_timeout: Duration::from_secs(3),
            total_timeout: Duration::from_secs(30),
        }
    }

    fn source(video_id: &str) -> KeywordSource {
        KeywordSource {
            video_id: video_id.to_string(),
            title: format!("title of {video_id}"),
            description: "  some   description  ".to_string(),
        }
    }

    fn generate_response(model_json: &serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": model_json.to_string()}]}
            }]
        })
    }

    #[tokio::test]
    async fn extract_keywords_parses_model_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/kw-model:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(generate_response(
                &serde_json::json!({
                    "a": ["music", "concert"],
                    "b": "soccer",
                    "c": 42
                }),
            )))
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(server.uri())).expect("client builds");
        let keywords = client
            .extract_keywords_batch(&[source("a"), source("b")], 2)
            .await
            .expect("extraction succeeds");

        assert_eq!(keywords["a"], vec!["music", "concert"]);
        assert_eq!(keywords["b"], vec!["soccer"]);
        // non-array, non-string payloads degrade to no candidates
        assert!(keywords["c"].is_empty());
    }

    #[tokio::test]
    async fn extract_keywords_fails_on_unparsable_model_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "not json at all"}]}}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(server.uri())).expect("client builds");
        let error = client
            .extract_keywords_batch(&[source("a")], 2)
            .await
            .expect_err("unparsable model output is fatal");

        assert!(error.to_string().contains("unparsable keyword JSON"));
    }

    #[tokio::test]
    async fn extract_keywords_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(server.uri())).expect("client builds");
        assert!(
            client
                .extract_keywords_batch(&[source("a")], 2)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn embed_keyword_returns_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/embed-model:embedContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": {"values": [0.1, 0.2, 0.3]}
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(server.uri())).expect("client builds");
        let vector = client.embed_keyword("music").await.expect("embed succeeds");

        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn embed_keyword_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(server.uri())).expect("client builds");
        assert!(client.embed_keyword("music").await.is_err());
    }

    #[test]
    fn prompt_clips_and_flattens_descriptions() {
        let long = KeywordSource {
            video_id: "long".to_string(),
            title: "t".to_string(),
            description: format!("intro   {}", "x".repeat(1000)),
        };
        let prompt = build_keyword_prompt(&[long], 3);

        assert!(prompt.contains("videoId: long"));
        assert!(!prompt.contains("intro   "));
        let description_line = prompt
            .lines()
            .find(|line| line.starts_with("description: "))
            .expect("description line present");
        assert!(description_line.len() <= "description: ".len() + MAX_DESCRIPTION_CHARS);
    }
}
