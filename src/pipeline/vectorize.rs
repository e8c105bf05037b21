use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::clients::{GeminiClient, KeywordSource};
use crate::store::models::AnalyzedVideo;

/// Stage 3: extract keywords, embed them, and pool each video's vectors
/// into a single topic vector.
#[async_trait]
pub trait VectorizeStage: Send + Sync {
    async fn vectorize(&self, batch: &mut [AnalyzedVideo]) -> Result<()>;
}

/// Vectorization backed by the LLM extraction call plus one embedding call
/// per non-empty keyword.
///
/// The extraction call is batch-fatal; embedding failures are isolated to
/// their video (topic vector cleared, batch continues).
pub struct KeywordVectorizeStage {
    client: Arc<GeminiClient>,
    keyword_count: usize,
    embed_concurrency: usize,
}

impl KeywordVectorizeStage {
    #[must_use]
    pub fn new(client: Arc<GeminiClient>, keyword_count: usize, embed_concurrency: usize) -> Self {
        Self {
            client,
            keyword_count,
            embed_concurrency,
        }
    }

    async fn embed_batch(&self, batch: &mut [AnalyzedVideo]) {
        // Bound the cross-video fan-out so the embedding collaborator is not
        // overwhelmed; per-video keyword calls (<= keyword_count) run
        // unbounded underneath one permit.
        let semaphore = Arc::new(Semaphore::new(self.embed_concurrency.max(1)));

        let tasks = batch.iter().enumerate().map(|(idx, video)| {
            let keywords: Vec<String> = video
                .keywords
                .iter()
                .filter(|keyword| !keyword.is_empty())
                .cloned()
                .collect();
            let video_id = video.video_id.clone();
            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);

            async move {
                if keywords.is_empty() {
                    return (idx, Vec::new());
                }
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return (idx, Vec::new()),
                };

                let calls = keywords.iter().map(|keyword| client.embed_keyword(keyword));
                match futures::future::try_join_all(calls).await {
                    Ok(vectors) => (idx, max_pool(&vectors)),
                    Err(error) => {
                        warn!(
                            video_id = %video_id,
                            error = %error,
                            "keyword embedding failed; clearing topic vector"
                        );
                        (idx, Vec::new())
                    }
                }
            }
        });

        for (idx, vector) in futures::future::join_all(tasks).await {
            batch[idx].keyword_embedding = vector;
        }
    }
}

#[async_trait]
impl VectorizeStage for KeywordVectorizeStage {
    async fn vectorize(&self, batch: &mut [AnalyzedVideo]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let sources: Vec<KeywordSource> = batch
            .iter()
            .map(|video| KeywordSource {
                video_id: video.video_id.clone(),
                title: video.title.clone(),
                description: video.description.clone(),
            })
            .collect();

        let candidates = self
            .client
            .extract_keywords_batch(&sources, self.keyword_count)
            .await
            .context("keyword extraction call failed")?;

        for video in batch.iter_mut() {
            video.keywords = reconcile_keywords(
                candidates.get(&video.video_id).map(Vec::as_slice),
                self.keyword_count,
            );
        }

        self.embed_batch(batch).await;

        let with_vectors = batch
            .iter()
            .filter(|video| !video.keyword_embedding.is_empty())
            .count();
        debug!(
            videos = batch.len(),
            with_vectors, "topic vectors computed"
        );
        Ok(())
    }
}

/// Normalize an untrusted candidate list into exactly `count` keyword slots:
/// trim, drop empties, truncate, right-pad with empty strings. Never fails.
#[must_use]
pub fn reconcile_keywords(candidates: Option<&[String]>, count: usize) -> Vec<String> {
    let mut slots: Vec<String> = candidates
        .unwrap_or(&[])
        .iter()
        .map(|candidate| candidate.trim().to_string())
        .filter(|candidate| !candidate.is_empty())
        .take(count)
        .collect();
    slots.resize(count, String::new());
    slots
}

/// Element-wise maximum over a set of embedding vectors.
///
/// Empty vectors contribute nothing; the output dimension is the first
/// non-empty vector's. Indices past a shorter vector's end contribute no
/// value, and a dimension nothing contributed to resolves to 0.
#[must_use]
pub fn max_pool(vectors: &[Vec<f32>]) -> Vec<f32> {
    let valid: Vec<&Vec<f32>> = vectors.iter().filter(|vector| !vector.is_empty()).collect();
    let Some(first) = valid.first() else {
        return Vec::new();
    };

    let mut pooled = vec![f32::NEG_INFINITY; first.len()];
    for vector in &valid {
        for (idx, slot) in pooled.iter_mut().enumerate() {
            if let Some(&value) = vector.get(idx) {
                if value > *slot {
                    *slot = value;
                }
            }
        }
    }

    pooled
        .into_iter()
        .map(|value| if value == f32::NEG_INFINITY { 0.0 } else { value })
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn owned(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[rstest]
    #[case(None, 4)]
    #[case(Some(vec![]), 4)]
    #[case(Some(vec!["a".to_string()]), 4)]
    #[case(Some(vec!["a".to_string(); 10]), 4)]
    #[case(Some(vec!["  ".to_string(), String::new()]), 2)]
    fn reconcile_always_returns_exactly_count_slots(
        #[case] candidates: Option<Vec<String>>,
        #[case] count: usize,
    ) {
        let slots = reconcile_keywords(candidates.as_deref(), count);
        assert_eq!(slots.len(), count);
    }

    #[test]
    fn reconcile_trims_drops_truncates_and_pads() {
        let candidates = owned(&["  music ", "", "   ", "concert", "live", "extra"]);

        let slots = reconcile_keywords(Some(&candidates), 3);

        assert_eq!(slots, vec!["music", "concert", "live"]);

        let padded = reconcile_keywords(Some(&candidates[..4]), 3);
        assert_eq!(padded, vec!["music", "concert", ""]);
    }

    #[test]
    fn max_pool_takes_elementwise_maximum() {
        let pooled = max_pool(&[vec![0.1, 0.4], vec![0.3, 0.2]]);
        assert_eq!(pooled, vec![0.3, 0.4]);
    }

    #[test]
    fn max_pool_is_order_independent() {
        let forward = max_pool(&[vec![0.1, 0.4], vec![0.3, 0.2]]);
        let reverse = max_pool(&[vec![0.3, 0.2], vec![0.1, 0.4]]);
        assert_eq!(forward, reverse);
    }

    #[test]
    fn max_pool_of_single_vector_is_identity() {
        let vector = vec![-0.5, 0.0, 0.7];
        assert_eq!(max_pool(std::slice::from_ref(&vector)), vector);
    }

    #[test]
    fn max_pool_of_nothing_is_empty() {
        assert!(max_pool(&[]).is_empty());
        assert!(max_pool(&[Vec::new(), Vec::new()]).is_empty());
    }

    #[test]
    fn max_pool_ignores_empty_contributors() {
        let pooled = max_pool(&[Vec::new(), vec![0.2, 0.1], Vec::new()]);
        assert_eq!(pooled, vec![0.2, 0.1]);
    }

    #[test]
    fn max_pool_tolerates_mismatched_vector_lengths() {
        // indices past a shorter vector's end contribute nothing, they do
        // not act as zero: max(-0.4, -0.1) and then -0.2 alone
        let pooled = max_pool(&[vec![-0.4, -0.2], vec![-0.1]]);
        assert_eq!(pooled, vec![-0.1, -0.2]);

        // the first non-empty vector sets the output dimension; the longer
        // vector's tail is ignored
        let clipped = max_pool(&[vec![-0.5], vec![-0.9, 0.8]]);
        assert_eq!(clipped, vec![-0.5]);
    }
}
