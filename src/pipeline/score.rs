//! Stage 4: cross-item trend scoring.
//!
//! Every video's raw score is its own signal plus the similarity-weighted
//! signal of every other video in the batch, then each score series is
//! min-max normalized to [0, 100]. Scores are batch-relative: a value is
//! only meaningful next to the batch it was computed in.

use crate::store::models::AnalyzedVideo;

/// Cosine similarity between two topic vectors.
///
/// Defined as 0 whenever either vector is empty, the lengths differ, or
/// either norm is 0. These are valid degenerate inputs ("no topic signal"),
/// not errors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b) {
        dot += f64::from(x) * f64::from(y);
        norm_a += f64::from(x) * f64::from(x);
        norm_b += f64::from(y) * f64::from(y);
    }
    norm_a = norm_a.sqrt();
    norm_b = norm_b.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Precompute the pairwise similarity matrix for the whole batch.
///
/// The relation is symmetric and reused by both score series, so each pair
/// is computed once and mirrored. The diagonal stays 0 and is never read.
#[must_use]
pub fn similarity_matrix(batch: &[AnalyzedVideo]) -> Vec<Vec<f64>> {
    let n = batch.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for a in 0..n {
        for i in (a + 1)..n {
            let similarity =
                cosine_similarity(&batch[a].keyword_embedding, &batch[i].keyword_embedding);
            matrix[a][i] = similarity;
            matrix[i][a] = similarity;
        }
    }
    matrix
}

/// Compute and assign both trend scores for the whole batch.
pub fn calculate_trend_scores(batch: &mut [AnalyzedVideo]) {
    if batch.is_empty() {
        return;
    }

    let matrix = similarity_matrix(batch);
    let n = batch.len();
    let mut raw_view = Vec::with_capacity(n);
    let mut raw_vpi = Vec::with_capacity(n);

    #[allow(clippy::cast_precision_loss)]
    for a in 0..n {
        let mut view = batch[a].view_count as f64;
        let mut vpi = batch[a].vpi_score;
        for (i, video) in batch.iter().enumerate() {
            if i == a {
                continue;
            }
            let similarity = matrix[a][i];
            view += similarity * video.view_count as f64;
            vpi += similarity * video.vpi_score;
        }
        raw_view.push(view);
        raw_vpi.push(vpi);
    }

    normalize_scores(&mut raw_view);
    normalize_scores(&mut raw_vpi);

    for ((video, view), vpi) in batch.iter_mut().zip(raw_view).zip(raw_vpi) {
        video.trend_score_view = view;
        video.trend_score_vpi = vpi;
    }
}

/// Min-max normalize a score series to [0, 100] in place.
///
/// When every raw value is identical (including a single-element series)
/// each score becomes exactly 100 instead of dividing by zero.
pub fn normalize_scores(scores: &mut [f64]) {
    let Some(&first) = scores.first() else {
        return;
    };

    let mut min = first;
    let mut max = first;
    for &score in scores.iter() {
        min = min.min(score);
        max = max.max(score);
    }

    if max == min {
        scores.fill(100.0);
        return;
    }

    for score in scores.iter_mut() {
        *score = (*score - min) / (max - min) * 100.0;
    }
}
