use anyhow::{Context, Result};
use channel_pipeline::{DiscoveryStage, EnrichmentStage, WhatlangClassifier};
use clap::{Parser, Subcommand};
use database::{ProfileSink, SqliteStore};
use page_renderer::BrowserlessRenderer;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tubescout_core::{AppConfig, CoreError, ErrorReporter, RetryMetrics};
use youtube_client::YouTubeApiClient;

const DEFAULT_LOG_FILTER: &str =
    "tubescout=info,channel_pipeline=info,youtube_client=info,page_renderer=info,database=info,tubescout_core=info";

#[derive(Parser)]
#[command(name = "tubescout")]
#[command(about = "Discover small YouTube channels and enrich them into profiles")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "tubescout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for candidate videos and add their channels to the roster
    Discover,
    /// Build profiles for every roster channel not yet enriched
    Enrich,
    /// Discovery followed by enrichment
    Run,
    /// Write the enriched profiles as a JSON array
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let reporter = ErrorReporter::new();
    info!("Starting tubescout");

    match cli.command {
        Commands::Export { output } => {
            let config = AppConfig::read(&cli.config)
                .map_err(|e| reported(&reporter, e.into()))
                .with_context(|| format!("loading {}", cli.config.display()))?;
            export(&config, &output).await
        }
        command => {
            let config = AppConfig::load(&cli.config)
                .map_err(|e| reported(&reporter, e.into()))
                .with_context(|| format!("loading {}", cli.config.display()))?;
            run_pipeline(&config, &command, &reporter).await
        }
    }
}

/// Log a fatal error with its code and operator-facing message before it
/// ends the run.
fn reported(reporter: &ErrorReporter, error: CoreError) -> CoreError {
    reporter.report_error(&error);
    error
}

fn log_retry_metrics(stage: &str, metrics: &RetryMetrics) {
    info!(
        stage,
        calls = metrics.total_calls,
        retries = metrics.total_retries,
        exhausted = metrics.exhausted,
        aborted = metrics.aborted,
        quota_halts = metrics.quota_halts,
        "Retry usage"
    );
}

async fn run_pipeline(
    config: &AppConfig,
    command: &Commands,
    reporter: &ErrorReporter,
) -> Result<()> {
    let store = SqliteStore::open(&config.database_url)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;
    let api = YouTubeApiClient::new(config.api_key.clone())?;
    let renderer = BrowserlessRenderer::new(&config.render)?;

    let mut halted = false;
    if matches!(command, Commands::Discover | Commands::Run) {
        let stage = DiscoveryStage::new(config, &api, &renderer, WhatlangClassifier, &store, &store);
        let summary = stage.run().await.map_err(|e| reported(reporter, e))?;
        info!("Discovery summary: {}", serde_json::to_string(&summary)?);
        log_retry_metrics("discovery", &summary.retry);
        if summary.unmarked > 0 {
            warn!(
                "{} videos could not be marked processed and will be seen again",
                summary.unmarked
            );
        }
        if let Some(halt) = summary.halted {
            reporter.report_error(&CoreError::Quota(halt));
            halted = true;
        }
    }

    if matches!(command, Commands::Enrich | Commands::Run) {
        if halted {
            warn!("Skipping enrichment: discovery stopped on quota");
        } else {
            let stage = EnrichmentStage::new(config, &api, &renderer, &store, &store);
            let summary = stage.run().await.map_err(|e| reported(reporter, e))?;
            info!(
                "Enrichment summary: enriched={} already_enriched={} unsaved={} halted={}",
                summary.channels_enriched,
                summary.already_enriched,
                summary.unsaved.len(),
                summary.halted.is_some()
            );
            log_retry_metrics("enrichment", &summary.retry);
            for profile in &summary.unsaved {
                warn!("Unsaved profile: {}", serde_json::to_string(profile)?);
            }
            if let Some(halt) = summary.halted {
                reporter.report_error(&CoreError::Quota(halt));
            }
        }
    }

    let metrics = api.get_metrics().await;
    info!(
        requests = metrics.total_requests,
        failed = metrics.failed_requests,
        quota_exceeded = metrics.quota_exceeded_requests,
        estimated_units = metrics.estimated_quota_units,
        "API usage"
    );
    info!("Processed videos on record: {}", store.processed_count().await?);
    store.close().await;
    Ok(())
}

async fn export(config: &AppConfig, output: &Path) -> Result<()> {
    let store = SqliteStore::open(&config.database_url)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;
    let profiles = store.profiles().await?;
    let json = serde_json::to_string_pretty(&profiles)?;
    tokio::fs::write(output, json)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    info!("Exported {} profiles to {}", profiles.len(), output.display());
    store.close().await;
    Ok(())
}
