use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an ISO-8601 duration such as `PT4M13S` into whole seconds.
///
/// Anything that does not match the `PT..H..M..S` shape parses to 0, which
/// matches how the predictor treats videos with unknown length.
pub(crate) fn parse_iso8601_duration_secs(duration: &str) -> u64 {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?").expect("duration pattern is valid")
    });

    let Some(captures) = pattern.captures(duration) else {
        return 0;
    };

    let component = |idx: usize| {
        captures
            .get(idx)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };

    component(1) * 3600 + component(2) * 60 + component(3)
}

/// Hours elapsed since an RFC 3339 publish timestamp, rounded to the nearest
/// whole hour. `None` when the timestamp does not parse.
pub(crate) fn hours_since(published_at: &str, now: DateTime<Utc>) -> Option<i64> {
    let published = DateTime::parse_from_rfc3339(published_at)
        .ok()?
        .with_timezone(&Utc);
    let elapsed_ms = now.signed_duration_since(published).num_milliseconds();
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    Some((elapsed_ms as f64 / 3_600_000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("PT4M13S", 253)]
    #[case("PT1H2M3S", 3723)]
    #[case("PT59S", 59)]
    #[case("PT2H", 7200)]
    #[case("P1D", 0)]
    #[case("", 0)]
    #[case("garbage", 0)]
    fn parses_iso8601_durations(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(parse_iso8601_duration_secs(input), expected);
    }

    #[test]
    fn hours_since_rounds_to_nearest_hour() {
        let now = Utc.with_ymd_and_hms(2025, 11, 10, 13, 0, 0).unwrap();

        assert_eq!(hours_since("2025-11-10T10:00:00Z", now), Some(3));
        // 2h40m rounds up to 3
        assert_eq!(hours_since("2025-11-10T10:20:00Z", now), Some(3));
        // 2h20m rounds down to 2
        assert_eq!(hours_since("2025-11-10T10:40:00Z", now), Some(2));
    }

    #[test]
    fn hours_since_rejects_unparsable_timestamp() {
        assert_eq!(hours_since("not-a-timestamp", Utc::now()), None);
        assert_eq!(hours_since("", Utc::now()), None);
    }
}
