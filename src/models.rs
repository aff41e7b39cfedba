use serde::{Serialize, Serializer};
use std::fmt;

/// One review row, addressed by its ordinal position in the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub id: usize,
    pub text: String,
}

impl Review {
    pub fn new(id: usize, text: impl Into<String>) -> Self {
        Self { id, text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    /// Anything the classifier returned outside the three known classes.
    Other(String),
}

impl SentimentLabel {
    /// Normalise a raw classifier label. Casing is ignored and the
    /// `LABEL_n` ids of the twitter-roberta family are mapped as well.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "POSITIVE" | "LABEL_2" => Self::Positive,
            "NEGATIVE" | "LABEL_0" => Self::Negative,
            "NEUTRAL" | "LABEL_1" => Self::Neutral,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn lowercase(&self) -> String {
        match self {
            Self::Positive => "positive".into(),
            Self::Negative => "negative".into(),
            Self::Neutral => "neutral".into(),
            Self::Other(raw) => raw.to_lowercase(),
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive)
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => f.write_str("POSITIVE"),
            Self::Negative => f.write_str("NEGATIVE"),
            Self::Neutral => f.write_str("NEUTRAL"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for SentimentLabel {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.lowercase())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub score: f64, // [0.0, 1.0], 2 decimals
}

impl SentimentResult {
    pub fn new(label: SentimentLabel, raw_score: f64) -> Self {
        Self {
            label,
            score: round2(raw_score.clamp(0.0, 1.0)),
        }
    }

    /// Value substituted when the sentiment collaborator fails.
    pub fn fallback() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: 0.0,
        }
    }
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrgencyTier {
    Critical,
    Moderate,
    Minor,
    NotApplicable,
    Other(String),
}

impl UrgencyTier {
    /// Candidate labels handed to the zero-shot collaborator, in this order.
    pub const CANDIDATES: [&'static str; 3] = ["critical", "moderate", "minor"];

    /// Exact-match conversion; labels with unexpected spelling are kept
    /// verbatim and later fall outside every aggregate bucket.
    pub fn from_label(raw: &str) -> Self {
        match raw {
            "critical" => Self::Critical,
            "moderate" => Self::Moderate,
            "minor" => Self::Minor,
            "Not Applicable" => Self::NotApplicable,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Critical => "critical",
            Self::Moderate => "moderate",
            Self::Minor => "minor",
            Self::NotApplicable => "Not Applicable",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for UrgencyTier {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

/// A candidate label and its zero-shot score.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedReview {
    #[serde(serialize_with = "id_as_string")]
    pub id: usize,
    pub original_comment: String,
    pub summary: String,
    pub sentiment: SentimentLabel,
    pub sentiment_score: f64,
    pub urgency: UrgencyTier,
}

fn id_as_string<S: Serializer>(id: &usize, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(id)
}
