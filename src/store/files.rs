use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::debug;

use super::models::{AnalyzedVideo, RawVideo};

/// Flat-file repository for collected and scored batches.
///
/// Files are named `YYYYMMDD_HHMM_<REGION>_<kind>.json` with a local-time
/// stamp, one file per region per run.
#[derive(Debug, Clone)]
pub struct TrendStore {
    data_dir: PathBuf,
}

#[derive(Serialize)]
struct RawBatchFile<'a> {
    #[serde(rename = "collectedAt")]
    collected_at: DateTime<Utc>,
    #[serde(rename = "regionCode")]
    region_code: &'a str,
    videos: &'a [RawVideo],
}

impl TrendStore {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Save the collected batch before analysis. Returns the file name.
    ///
    /// # Errors
    /// Fails when the data directory cannot be created or the file cannot be
    /// written.
    pub async fn save_raw(
        &self,
        region: &str,
        collected_at: DateTime<Utc>,
        videos: &[RawVideo],
    ) -> Result<String> {
        let file = RawBatchFile {
            collected_at,
            region_code: region,
            videos,
        };
        let body = serde_json::to_vec_pretty(&file).context("failed to serialize raw batch")?;
        self.write(&file_name(region, collected_at, "raw"), &body)
            .await
    }

    /// Save the fully scored batch. Returns the file name.
    ///
    /// # Errors
    /// Fails when the data directory cannot be created or the file cannot be
    /// written.
    pub async fn save_analyzed(
        &self,
        region: &str,
        collected_at: DateTime<Utc>,
        videos: &[AnalyzedVideo],
    ) -> Result<String> {
        let body =
            serde_json::to_vec_pretty(videos).context("failed to serialize analyzed batch")?;
        self.write(&file_name(region, collected_at, "analyzed"), &body)
            .await
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    async fn write(&self, name: &str, body: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .with_context(|| format!("failed to create data dir {}", self.data_dir.display()))?;

        let path = self.data_dir.join(name);
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        debug!(file = name, bytes = body.len(), "batch file written");
        Ok(name.to_string())
    }
}

fn file_name(region: &str, collected_at: DateTime<Utc>, kind: &str) -> String {
    let stamp = collected_at.with_timezone(&Local).format("%Y%m%d_%H%M");
    format!("{stamp}_{region}_{kind}.json")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn file_name_carries_stamp_region_and_kind() {
        let collected_at = Utc.with_ymd_and_hms(2025, 11, 10, 4, 0, 0).unwrap();
        let name = file_name("KR", collected_at, "analyzed");

        assert!(name.ends_with("_KR_analyzed.json"), "got {name}");
        // 13 stamp chars: YYYYMMDD_HHMM
        assert_eq!(name.len(), "YYYYMMDD_HHMM".len() + "_KR_analyzed.json".len());
    }

    #[tokio::test]
    async fn save_raw_writes_wrapped_batch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TrendStore::new(dir.path());
        let videos: Vec<RawVideo> =
            vec![serde_json::from_value(serde_json::json!({"id": "a"})).expect("raw video")];

        let name = store
            .save_raw("US", Utc::now(), &videos)
            .await
            .expect("save succeeds");

        let body = std::fs::read_to_string(dir.path().join(&name)).expect("file exists");
        let parsed: serde_json::Value = serde_json::from_str(&body).expect("valid json");
        assert_eq!(parsed["regionCode"], "US");
        assert_eq!(parsed["videos"][0]["id"], "a");
        assert!(parsed.get("collectedAt").is_some());
    }

    #[tokio::test]
    async fn save_analyzed_creates_missing_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TrendStore::new(dir.path().join("nested").join("data"));

        let name = store
            .save_analyzed("KR", Utc::now(), &[])
            .await
            .expect("save succeeds");

        assert!(store.data_dir().join(name).exists());
    }
}
