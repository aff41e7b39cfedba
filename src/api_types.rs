use serde::{Deserialize, Serialize};

use crate::models::LabelScore;

/* Requests */

#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest<'a, P: Serialize> {
    pub inputs: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<P>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummarizationParameters {
    pub max_length: u32,
    pub min_length: u32,
    pub do_sample: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZeroShotParameters<'a> {
    pub candidate_labels: &'a [&'a str],
}

/* Responses */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiLabelScore {
    pub label: String,
    pub score: f64,
}

/// text-classification answers either `[{..}]` or, for batched
/// pipelines, `[[{..}, ..]]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiClassification {
    Nested(Vec<Vec<ApiLabelScore>>),
    Flat(Vec<ApiLabelScore>),
}

impl ApiClassification {
    /// Highest-scoring label across whatever shape came back.
    pub fn best(self) -> Option<ApiLabelScore> {
        let all: Vec<ApiLabelScore> = match self {
            ApiClassification::Nested(v) => v.into_iter().flatten().collect(),
            ApiClassification::Flat(v) => v,
        };
        all.into_iter()
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSummary {
    pub summary_text: String,
}

/// zero-shot-classification answers `{sequence, labels, scores}` on the
/// legacy endpoint and a list of `{label, score}` on the router.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiZeroShot {
    Columns {
        labels: Vec<String>,
        scores: Vec<f64>,
    },
    Pairs(Vec<ApiLabelScore>),
}

impl ApiZeroShot {
    /// Ranked by descending score.
    pub fn into_ranked(self) -> Vec<LabelScore> {
        let mut ranked: Vec<LabelScore> = match self {
            ApiZeroShot::Columns { labels, scores } => labels
                .into_iter()
                .zip(scores)
                .map(|(label, score)| LabelScore { label, score })
                .collect(),
            ApiZeroShot::Pairs(pairs) => pairs
                .into_iter()
                .map(|p| LabelScore { label: p.label, score: p.score })
                .collect(),
        };
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}
