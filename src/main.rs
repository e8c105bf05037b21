use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{error, info};

use trend_worker::{
    clients::{GeminiClient, GeminiConfig, VpiClient, VpiConfig, YoutubeClient, YoutubeConfig},
    config::Config,
    observability,
    pipeline::TrendPipeline,
    store::files::TrendStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init().context("failed to initialize tracing")?;
    let config = Config::from_env().context("failed to load configuration")?;

    let youtube = Arc::new(
        YoutubeClient::new(YoutubeConfig {
            base_url: config.youtube_base_url().to_string(),
            api_key: config.youtube_api_key().to_string(),
            connect_timeout: config.http_connect_timeout(),
            total_timeout: config.http_total_timeout(),
        })
        .context("failed to create youtube client")?,
    );
    let vpi = Arc::new(
        VpiClient::new(VpiConfig {
            api_url: config.vpi_api_url().to_string(),
            connect_timeout: config.http_connect_timeout(),
            total_timeout: config.http_total_timeout(),
        })
        .context("failed to create VPI client")?,
    );
    let gemini = Arc::new(
        GeminiClient::new(GeminiConfig {
            base_url: config.gemini_base_url().to_string(),
            api_key: config.gemini_api_key().to_string(),
            keyword_model: config.gemini_keyword_model().to_string(),
            embed_model: config.gemini_embed_model().to_string(),
            connect_timeout: config.http_connect_timeout(),
            total_timeout: config.http_total_timeout(),
        })
        .context("failed to create gemini client")?,
    );
    let store = Arc::new(TrendStore::new(config.data_dir().clone()));

    let pipeline = TrendPipeline::new(
        &config,
        Arc::clone(&youtube),
        vpi,
        gemini,
        Arc::clone(&store),
    );

    let collected_at = Utc::now();
    info!(regions = ?config.regions(), "daily collection started");

    for region in config.regions() {
        // one region's failure must not abort the others
        if let Err(err) =
            run_region(region, collected_at, &config, &youtube, &store, &pipeline).await
        {
            error!(region, error = ?err, "region processing failed");
        }
    }

    info!("daily collection finished");
    Ok(())
}

async fn run_region(
    region: &str,
    collected_at: DateTime<Utc>,
    config: &Config,
    youtube: &YoutubeClient,
    store: &TrendStore,
    pipeline: &TrendPipeline,
) -> Result<()> {
    info!(region, "collecting popular videos");
    let videos = youtube
        .fetch_popular_videos(region, config.max_results())
        .await
        .context("failed to fetch popular videos")?;

    let raw_file = store
        .save_raw(region, collected_at, &videos)
        .await
        .context("failed to save raw batch")?;
    info!(region, file = %raw_file, items = videos.len(), "raw batch saved");

    pipeline.execute(region, collected_at, &videos).await?;
    Ok(())
}
