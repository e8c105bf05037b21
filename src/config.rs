use std::{env, path::PathBuf, time::Duration};

use thiserror::Error;

/// Worker configuration, loaded once from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    youtube_api_key: String,
    youtube_base_url: String,
    vpi_api_url: String,
    gemini_api_key: String,
    gemini_base_url: String,
    gemini_keyword_model: String,
    gemini_embed_model: String,
    regions: Vec<String>,
    max_results: usize,
    keyword_count: usize,
    data_dir: PathBuf,
    embed_concurrency: usize,
    http_connect_timeout: Duration,
    http_total_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// Load and validate the worker configuration from environment
    /// variables.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a required variable is unset or a value
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let youtube_api_key = env_var("YOUTUBE_API_KEY")?;
        let youtube_base_url = env::var("YOUTUBE_BASE_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/youtube/v3".to_string());
        let vpi_api_url = env_var("VPI_API_URL")?;
        let gemini_api_key = env_var("GEMINI_API_KEY")?;
        let gemini_base_url = env::var("GEMINI_BASE_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());
        let gemini_keyword_model =
            env::var("GEMINI_KEYWORD_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());
        let gemini_embed_model =
            env::var("GEMINI_EMBED_MODEL").unwrap_or_else(|_| "text-embedding-004".to_string());

        let regions = parse_csv("TREND_REGIONS", "KR,US");
        let max_results = parse_usize("TREND_MAX_RESULTS", 30)?;
        let keyword_count = parse_usize("TREND_KEYWORD_COUNT", 4)?;
        let data_dir =
            PathBuf::from(env::var("TREND_DATA_DIR").unwrap_or_else(|_| "./data".to_string()));
        let embed_concurrency = parse_usize("TREND_EMBED_CONCURRENCY", 8)?;

        let http_connect_timeout = parse_duration_ms("HTTP_CONNECT_TIMEOUT_MS", 3000)?;
        let http_total_timeout = parse_duration_ms("HTTP_TOTAL_TIMEOUT_MS", 30000)?;

        Ok(Self {
            youtube_api_key,
            youtube_base_url,
            vpi_api_url,
            gemini_api_key,
            gemini_base_url,
            gemini_keyword_model,
            gemini_embed_model,
            regions,
            max_results,
            keyword_count,
            data_dir,
            embed_concurrency,
            http_connect_timeout,
            http_total_timeout,
        })
    }

    #[must_use]
    pub fn youtube_api_key(&self) -> &str {
        &self.youtube_api_key
    }

    #[must_use]
    pub fn youtube_base_url(&self) -> &str {
        &self.youtube_base_url
    }

    #[must_use]
    pub fn vpi_api_url(&self) -> &str {
        &self.vpi_api_url
    }

    #[must_use]
    pub fn gemini_api_key(&self) -> &str {
        &self.gemini_api_key
    }

    #[must_use]
    pub fn gemini_base_url(&self) -> &str {
        &self.gemini_base_url
    }

    #[must_use]
    pub fn gemini_keyword_model(&self) -> &str {
        &self.gemini_keyword_model
    }

    #[must_use]
    pub fn gemini_embed_model(&self) -> &str {
        &self.gemini_embed_model
    }

    #[must_use]
    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    #[must_use]
    pub fn max_results(&self) -> usize {
        self.max_results
    }

    #[must_use]
    pub fn keyword_count(&self) -> usize {
        self.keyword_count
    }

    #[must_use]
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    #[must_use]
    pub fn embed_concurrency(&self) -> usize {
        self.embed_concurrency
    }

    #[must_use]
    pub fn http_connect_timeout(&self) -> Duration {
        self.http_connect_timeout
    }

    #[must_use]
    pub fn http_total_timeout(&self) -> Duration {
        self.http_total_timeout
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default_ms.to_string());
    let ms = raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    Ok(Duration::from_millis(ms))
}

fn parse_csv(name: &'static str, default: &str) -> Vec<String> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.split(',')
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}
