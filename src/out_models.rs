use serde::Serialize;

use crate::aggregate::{AggregateStatistics, SentimentCounts, UrgencyCounts};
use crate::models::AnalyzedReview;
use crate::render::ImageKind;

/// Encoding tag of `WordCloud::image`.
pub const WORD_CLOUD_FORMAT: &str = "base64";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub sentiment_analysis: SentimentCounts,
    pub summaries: Vec<AnalyzedReview>,
    pub word_cloud: WordCloud,
    pub urgency_analysis: UrgencyCounts,
    pub average_sentiment_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordCloud {
    pub image: String, // empty when the cloud could not be built
    pub format: &'static str,
    /// `image/png` or `image/svg+xml`, depending on the active renderer.
    pub media_type: &'static str,
}

impl AnalysisResponse {
    pub fn assemble(
        stats: AggregateStatistics,
        summaries: Vec<AnalyzedReview>,
        image: String,
        kind: ImageKind,
    ) -> Self {
        Self {
            sentiment_analysis: stats.sentiment,
            summaries,
            word_cloud: WordCloud {
                image,
                format: WORD_CLOUD_FORMAT,
                media_type: kind.media_type(),
            },
            urgency_analysis: stats.urgency,
            average_sentiment_score: stats.average_sentiment_score,
        }
    }
}

/// Liveness payload of `GET /`.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub message: &'static str,
    pub status: &'static str,
    pub models_loaded: bool,
}

impl Health {
    pub fn healthy(models_loaded: bool) -> Self {
        Self {
            message: "Sentiment Analysis API is running",
            status: "healthy",
            models_loaded,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::models::{SentimentLabel, UrgencyTier};

    #[test]
    fn response_uses_camel_case_wire_keys() {
        let rows = vec![AnalyzedReview {
            id: 0,
            original_comment: "I love this!".into(),
            summary: "Loves it".into(),
            sentiment: SentimentLabel::Positive,
            sentiment_score: 0.98,
            urgency: UrgencyTier::NotApplicable,
        }];
        let stats = aggregate(&rows);
        let v = serde_json::to_value(AnalysisResponse::assemble(stats, rows, "aGk=".into(), ImageKind::Png)).unwrap();

        assert_eq!(v["sentimentAnalysis"]["positive"], 1);
        assert_eq!(v["sentimentAnalysis"]["totalComments"], 1);
        assert_eq!(v["urgencyAnalysis"]["notApplicable"], 1);
        assert_eq!(v["urgencyAnalysis"]["critical"], 0);
        assert_eq!(v["wordCloud"]["format"], "base64");
        assert_eq!(v["wordCloud"]["image"], "aGk=");
        assert_eq!(v["wordCloud"]["mediaType"], "image/png");
        assert_eq!(v["summaries"][0]["urgency"], "Not Applicable");
        assert_eq!(v["averageSentimentScore"], 0.98);
    }

    #[test]
    fn health_payload_shape() {
        let v = serde_json::to_value(Health::healthy(false)).unwrap();
        assert_eq!(v["message"], "Sentiment Analysis API is running");
        assert_eq!(v["status"], "healthy");
        assert_eq!(v["models_loaded"], false);
    }
}
