use serde::Serialize;

use crate::models::{AnalyzedReview, SentimentLabel, UrgencyTier};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentCounts {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub total_comments: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrgencyCounts {
    pub critical: usize,
    pub moderate: usize,
    pub minor: usize,
    pub not_applicable: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateStatistics {
    pub sentiment: SentimentCounts,
    pub urgency: UrgencyCounts,
    pub average_sentiment_score: f64,
}

/// Single pass over the rows. Unrecognised labels count towards
/// `total_comments` only.
pub fn aggregate(rows: &[AnalyzedReview]) -> AggregateStatistics {
    let mut stats = AggregateStatistics::default();
    let mut score_sum = 0.0;

    for row in rows {
        match row.sentiment {
            SentimentLabel::Positive => stats.sentiment.positive += 1,
            SentimentLabel::Negative => stats.sentiment.negative += 1,
            SentimentLabel::Neutral => stats.sentiment.neutral += 1,
            SentimentLabel::Other(_) => {}
        }
        match row.urgency {
            UrgencyTier::Critical => stats.urgency.critical += 1,
            UrgencyTier::Moderate => stats.urgency.moderate += 1,
            UrgencyTier::Minor => stats.urgency.minor += 1,
            UrgencyTier::NotApplicable => stats.urgency.not_applicable += 1,
            UrgencyTier::Other(_) => {}
        }
        score_sum += row.sentiment_score;
    }

    stats.sentiment.total_comments = rows.len();
    stats.average_sentiment_score = if rows.is_empty() {
        0.0
    } else {
        score_sum / rows.len() as f64
    };
    stats
}
