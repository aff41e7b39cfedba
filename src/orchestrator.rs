use itertools::Itertools;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::analyzer::ReviewAnalyzer;
use crate::columns::{parse_reviews, ParseError};
use crate::config::AnalysisConfig;
use crate::models::{AnalyzedReview, Review};
use crate::out_models::AnalysisResponse;
use crate::wordcloud::WordCloudBuilder;

/// Pipeline states, entered strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parsing,
    PerRowAnalysis,
    CorpusSideEffects,
    ResponseAssembly,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parsing => "Parsing",
            Self::PerRowAnalysis => "Row analysis",
            Self::CorpusSideEffects => "Word cloud",
            Self::ResponseAssembly => "Response assembly",
        };
        f.write_str(name)
    }
}

/// One upload in, one response out. Holds only shared, read-only handles.
#[derive(Clone)]
pub struct BatchPipeline {
    analyzer: ReviewAnalyzer,
    cloud: Arc<WordCloudBuilder>,
    row_concurrency: usize,
}

impl BatchPipeline {
    pub fn new(analyzer: ReviewAnalyzer, cloud: Arc<WordCloudBuilder>, cfg: &AnalysisConfig) -> Self {
        Self {
            analyzer,
            cloud,
            row_concurrency: cfg.row_concurrency.max(1),
        }
    }

    /// Fails only on client-input errors raised while parsing; every later
    /// failure is absorbed into a fallback value.
    pub async fn run(&self, upload: &[u8]) -> Result<AnalysisResponse, ParseError> {
        let pipeline_start = Instant::now();
        info!("Pipeline started - upload_bytes={}", upload.len());

        // 1) Parsing
        let stage_start = Instant::now();
        let reviews = parse_reviews(upload)?;
        log_stage(Stage::Parsing, stage_start, &format!("rows={}", reviews.len()));

        // 2) Per-row analysis
        let stage_start = Instant::now();
        let summaries = self.analyze_rows(&reviews).await;
        log_stage(Stage::PerRowAnalysis, stage_start, &format!("rows={}", summaries.len()));

        // 3) Corpus side effects
        let stage_start = Instant::now();
        let corpus = reviews.iter().map(|r| r.text.as_str()).join(" ");
        let image = self.build_cloud(corpus).await;
        log_stage(Stage::CorpusSideEffects, stage_start, &format!("built={}", !image.is_empty()));

        // 4) Response assembly
        let stage_start = Instant::now();
        let stats = aggregate(&summaries);
        let response = AnalysisResponse::assemble(stats, summaries, image, self.cloud.image_kind());
        log_stage(Stage::ResponseAssembly, stage_start, "");

        info!(
            "Pipeline completed successfully - total_duration={:.2}s, rows={}, positive={}, negative={}, neutral={}",
            pipeline_start.elapsed().as_secs_f32(),
            response.sentiment_analysis.total_comments,
            response.sentiment_analysis.positive,
            response.sentiment_analysis.negative,
            response.sentiment_analysis.neutral,
        );
        Ok(response)
    }

    /// Rows go out in chunks of `row_concurrency`; results come back in
    /// input order.
    async fn analyze_rows(&self, reviews: &[Review]) -> Vec<AnalyzedReview> {
        let total = reviews.len();
        let mut out = Vec::with_capacity(total);

        for chunk in reviews.chunks(self.row_concurrency) {
            let batch_start = Instant::now();
            let tasks = chunk.iter().map(|r| self.analyzer.analyze(r));
            out.extend(futures::future::join_all(tasks).await);

            debug!(
                "Row analysis progress: {}/{} | Batch of {}: {:.2}s",
                out.len(),
                total,
                chunk.len(),
                batch_start.elapsed().as_secs_f32()
            );
        }
        out
    }

    async fn build_cloud(&self, corpus: String) -> String {
        let cloud = Arc::clone(&self.cloud);
        match tokio::task::spawn_blocking(move || cloud.build(&corpus)).await {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Word cloud task failed - error={}", e);
                String::new()
            }
        }
    }
}

fn log_stage(stage: Stage, started: Instant, detail: &str) {
    if detail.is_empty() {
        info!("{} completed - duration={:.2}s", stage, started.elapsed().as_secs_f32());
    } else {
        info!("{} completed - duration={:.2}s, {}", stage, started.elapsed().as_secs_f32(), detail);
    }
}
