//! Collaborator seams for the three model-backed services.
//!
//! Every call returns an explicit `Result` so the review analyzer can map
//! failures onto its documented fallbacks. Implementations are built once
//! at startup and shared read-only behind `Arc`.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{LabelScore, SentimentResult};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("could not decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned no output")]
    EmptyOutput { service: &'static str },
}

/// Text → (label, confidence).
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<SentimentResult, ClassifierError>;
}

/// Text → short abstractive summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, ClassifierError>;
}

/// (text, candidate labels) → labels ranked by descending score.
#[async_trait]
pub trait UrgencyClassifier: Send + Sync {
    async fn rank(
        &self,
        text: &str,
        candidate_labels: &[&str],
    ) -> Result<Vec<LabelScore>, ClassifierError>;
}
