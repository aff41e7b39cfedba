mod aggregate;
mod analyzer;
mod api_types;
mod classifiers;
mod columns;
mod config;
#[cfg(test)]
mod fakes;
mod inference;
mod lexicon;
mod models;
mod orchestrator;
mod out_models;
mod render;
mod server;
mod wordcloud;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use analyzer::ReviewAnalyzer;
use classifiers::{SentimentClassifier, Summarizer, UrgencyClassifier};
use config::ServiceConfig;
use inference::{warm_up, ModelHandles};
use lexicon::LexiconProvider;
use orchestrator::BatchPipeline;
use server::AppState;
use wordcloud::WordCloudBuilder;

/// Review Vibes - CSV review analysis service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file (defaults to the embedded config)
    #[arg(short, long, env = "REVIEW_VIBES_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address, overrides [server].host
    #[arg(long, env = "REVIEW_VIBES_HOST")]
    host: Option<String>,

    /// Bind port, overrides [server].port
    #[arg(short, long, env = "REVIEW_VIBES_PORT")]
    port: Option<u16>,

    /// Bearer token for the inference API
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    hf_token: Option<String>,

    /// Start without probing the inference models
    #[arg(long)]
    skip_warm_up: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();

    info!("Starting review_vibes");

    let args = Args::parse();

    // CLI/env > file > embedded default
    let mut cfg = match &args.config {
        Some(path) => {
            debug!("Using config file: {}", path.display());
            ServiceConfig::load(Some(path.as_path()))
        }
        None => {
            debug!("Using embedded default config");
            ServiceConfig::load(None)
        }
    }
    .context("loading configuration")?;

    if let Some(host) = args.host {
        cfg.server.host = host;
    }
    if let Some(port) = args.port {
        cfg.server.port = port;
    }
    if args.skip_warm_up {
        cfg.inference.warm_up = false;
    }
    cfg.validate().context("validating configuration")?;

    let models = ModelHandles::from_config(&cfg.inference, &cfg.analysis, args.hf_token)
        .context("building inference client")?;
    let sentiment: Arc<dyn SentimentClassifier> = Arc::new(models.sentiment);
    let summarizer: Arc<dyn Summarizer> = Arc::new(models.summarizer);
    let urgency: Arc<dyn UrgencyClassifier> = Arc::new(models.urgency);

    let models_loaded = if cfg.inference.warm_up {
        warm_up(sentiment.as_ref(), summarizer.as_ref(), urgency.as_ref()).await
    } else {
        info!("Model warm-up skipped");
        false
    };

    let lexicon = Arc::new(LexiconProvider::from_config(&cfg.lexicon).context("loading lexicon")?);
    let renderer = render::select_renderer(&cfg.wordcloud).context("loading word cloud font")?;

    let analyzer = ReviewAnalyzer::new(sentiment, summarizer, urgency, &cfg.analysis);
    let cloud = Arc::new(WordCloudBuilder::new(lexicon, renderer, cfg.wordcloud.clone()));
    let pipeline = Arc::new(BatchPipeline::new(analyzer, cloud, &cfg.analysis));

    let app = server::router(AppState { pipeline, models_loaded }, &cfg.server);

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(
        "Listening - addr={}, allowed_origins={:?}, max_upload_bytes={}",
        addr, cfg.server.allowed_origins, cfg.server.max_upload_bytes
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
