pub mod gemini;
pub mod vpi;
pub mod youtube;

pub use gemini::{GeminiClient, GeminiConfig, KeywordSource};
pub use vpi::{VpiClient, VpiConfig, VpiFeatureRecord, VpiPrediction};
pub use youtube::{YoutubeClient, YoutubeConfig};

/// Trim an untrusted error body before embedding it in an error message.
pub(crate) fn truncate_error_body(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::truncate_error_body;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_error_body("abcdef", 3), "abc");
        assert_eq!(truncate_error_body("ab", 3), "ab");
        assert_eq!(truncate_error_body("키워드 없음", 3), "키워드");
    }
}
