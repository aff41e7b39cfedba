//! Scriptable, call-counting collaborators for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::classifiers::{ClassifierError, SentimentClassifier, Summarizer, UrgencyClassifier};
use crate::models::{LabelScore, SentimentLabel, SentimentResult};

type Script<T> = Box<dyn Fn(&str) -> Result<T, ClassifierError> + Send + Sync>;
type DelayFn = Box<dyn Fn(&str) -> Duration + Send + Sync>;

#[derive(Default)]
pub struct CallLog {
    count: AtomicUsize,
    inputs: Mutex<Vec<String>>,
}

impl CallLog {
    fn record(&self, text: &str) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(text.to_string());
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

pub struct FakeSentiment {
    script: Script<SentimentResult>,
    delay: Option<DelayFn>,
    pub calls: CallLog,
}

impl FakeSentiment {
    pub fn new(f: impl Fn(&str) -> Result<SentimentResult, ClassifierError> + Send + Sync + 'static) -> Self {
        Self { script: Box::new(f), delay: None, calls: CallLog::default() }
    }

    /// "love"/"great"/"amazing" → POSITIVE, "terrible"/"broken"/"awful" → NEGATIVE, else NEUTRAL.
    pub fn keyword() -> Self {
        Self::new(|text| {
            let t = text.to_lowercase();
            let r = if ["love", "great", "amazing"].iter().any(|w| t.contains(w)) {
                SentimentResult::new(SentimentLabel::Positive, 0.98)
            } else if ["terrible", "broken", "awful"].iter().any(|w| t.contains(w)) {
                SentimentResult::new(SentimentLabel::Negative, 0.95)
            } else {
                SentimentResult::new(SentimentLabel::Neutral, 0.61)
            };
            Ok(r)
        })
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(ClassifierError::EmptyOutput { service: "sentiment" }))
    }

    pub fn with_delay(mut self, f: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Some(Box::new(f));
        self
    }
}

#[async_trait]
impl SentimentClassifier for FakeSentiment {
    async fn classify(&self, text: &str) -> Result<SentimentResult, ClassifierError> {
        self.calls.record(text);
        if let Some(d) = &self.delay {
            tokio::time::sleep(d(text)).await;
        }
        (self.script)(text)
    }
}

pub struct FakeSummarizer {
    script: Script<String>,
    pub calls: CallLog,
}

impl FakeSummarizer {
    pub fn new(f: impl Fn(&str) -> Result<String, ClassifierError> + Send + Sync + 'static) -> Self {
        Self { script: Box::new(f), calls: CallLog::default() }
    }

    /// Echoes the first five words.
    pub fn echo() -> Self {
        Self::new(|text| Ok(text.split_whitespace().take(5).collect::<Vec<_>>().join(" ")))
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(ClassifierError::EmptyOutput { service: "summarization" }))
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, ClassifierError> {
        self.calls.record(text);
        (self.script)(text)
    }
}

pub struct FakeUrgency {
    script: Script<Vec<LabelScore>>,
    pub calls: CallLog,
}

impl FakeUrgency {
    pub fn new(f: impl Fn(&str) -> Result<Vec<LabelScore>, ClassifierError> + Send + Sync + 'static) -> Self {
        Self { script: Box::new(f), calls: CallLog::default() }
    }

    /// Always ranks `top` first.
    pub fn fixed(top: &'static str) -> Self {
        Self::new(move |_| {
            let mut ranked = vec![LabelScore { label: top.to_string(), score: 0.8 }];
            for other in ["critical", "moderate", "minor"] {
                if other != top {
                    ranked.push(LabelScore { label: other.to_string(), score: 0.1 });
                }
            }
            Ok(ranked)
        })
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(ClassifierError::EmptyOutput { service: "zero-shot" }))
    }
}

#[async_trait]
impl UrgencyClassifier for FakeUrgency {
    async fn rank(&self, text: &str, _candidate_labels: &[&str]) -> Result<Vec<LabelScore>, ClassifierError> {
        self.calls.record(text);
        (self.script)(text)
    }
}

/// Fakes bundled with shared handles so tests can keep asserting on
/// call counts after handing clones to the code under test.
pub struct FakeModels {
    pub sentiment: Arc<FakeSentiment>,
    pub summarizer: Arc<FakeSummarizer>,
    pub urgency: Arc<FakeUrgency>,
}

impl FakeModels {
    pub fn new(sentiment: FakeSentiment, summarizer: FakeSummarizer, urgency: FakeUrgency) -> Self {
        Self {
            sentiment: Arc::new(sentiment),
            summarizer: Arc::new(summarizer),
            urgency: Arc::new(urgency),
        }
    }

    pub fn standard() -> Self {
        Self::new(FakeSentiment::keyword(), FakeSummarizer::echo(), FakeUrgency::fixed("critical"))
    }

    pub fn total_calls(&self) -> usize {
        self.sentiment.calls.count() + self.summarizer.calls.count() + self.urgency.calls.count()
    }
}
