use std::sync::Arc;
use tracing::{debug, warn};

use crate::classifiers::{SentimentClassifier, Summarizer, UrgencyClassifier};
use crate::config::AnalysisConfig;
use crate::models::{AnalyzedReview, Review, SentimentLabel, SentimentResult, UrgencyTier};

/// Summary text used when the summarizer fails.
pub const SUMMARY_PLACEHOLDER: &str = "Unable to generate summary";

/// Per-review orchestration of the three collaborators.
///
/// Failures never escape: each collaborator error is replaced by its
/// fallback (NEUTRAL/0.0, [`SUMMARY_PLACEHOLDER`], `minor`).
#[derive(Clone)]
pub struct ReviewAnalyzer {
    sentiment: Arc<dyn SentimentClassifier>,
    summarizer: Arc<dyn Summarizer>,
    urgency: Arc<dyn UrgencyClassifier>,
    summary_max_chars: usize,
}

impl ReviewAnalyzer {
    pub fn new(
        sentiment: Arc<dyn SentimentClassifier>,
        summarizer: Arc<dyn Summarizer>,
        urgency: Arc<dyn UrgencyClassifier>,
        cfg: &AnalysisConfig,
    ) -> Self {
        Self {
            sentiment,
            summarizer,
            urgency,
            summary_max_chars: cfg.summary_max_chars,
        }
    }

    pub async fn analyze(&self, review: &Review) -> AnalyzedReview {
        // The summary does not depend on sentiment, so it runs alongside
        // the sentiment → urgency chain.
        let sentiment_then_urgency = async {
            let sentiment = self.sentiment_of(review).await;
            let urgency = self.urgency_of(review, &sentiment.label).await;
            (sentiment, urgency)
        };
        let ((sentiment, urgency), summary) =
            futures::join!(sentiment_then_urgency, self.summary_of(review));

        debug!(
            "Review analyzed - row={}, sentiment={}, score={:.2}, urgency={}",
            review.id, sentiment.label, sentiment.score, urgency
        );

        AnalyzedReview {
            id: review.id,
            original_comment: review.text.clone(),
            summary,
            sentiment: sentiment.label,
            sentiment_score: sentiment.score,
            urgency,
        }
    }

    async fn sentiment_of(&self, review: &Review) -> SentimentResult {
        match self.sentiment.classify(&review.text).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Error in sentiment analysis - row={}, error={}", review.id, e);
                SentimentResult::fallback()
            }
        }
    }

    async fn summary_of(&self, review: &Review) -> String {
        let input = clip_chars(&review.text, self.summary_max_chars);
        match self.summarizer.summarize(input).await {
            Ok(s) => s,
            Err(e) => {
                warn!("Error in summarization - row={}, error={}", review.id, e);
                SUMMARY_PLACEHOLDER.to_string()
            }
        }
    }

    async fn urgency_of(&self, review: &Review, label: &SentimentLabel) -> UrgencyTier {
        if label.is_positive() {
            return UrgencyTier::NotApplicable;
        }

        let cleaned = strip_to_alphanumeric(&review.text);
        if cleaned.trim().is_empty() {
            return UrgencyTier::Minor;
        }

        match self.urgency.rank(&cleaned, &UrgencyTier::CANDIDATES).await {
            Ok(ranked) => match ranked.first() {
                Some(top) => UrgencyTier::from_label(&top.label),
                None => UrgencyTier::Minor,
            },
            Err(e) => {
                warn!("Error in urgency detection - row={}, error={}", review.id, e);
                UrgencyTier::Minor
            }
        }
    }
}

/// First `max_chars` characters of `text`, cut on a char boundary.
pub fn clip_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Keep ASCII letters, digits and whitespace only.
pub fn strip_to_alphanumeric(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect()
}
