//! HTTP-backed collaborators speaking the Hugging Face Inference API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api_types::*;
use crate::classifiers::{ClassifierError, SentimentClassifier, Summarizer, UrgencyClassifier};
use crate::config::{AnalysisConfig, InferenceConfig};
use crate::models::{LabelScore, SentimentLabel, SentimentResult};

/// One endpoint on the inference host plus the shared connection pool.
#[derive(Clone)]
pub struct InferenceEndpoint {
    client: Client,
    url: String,
    token: Option<String>,
    service: &'static str,
}

impl InferenceEndpoint {
    pub fn new(client: Client, api_base: &str, model: &str, token: Option<String>, service: &'static str) -> Self {
        let url = format!("{}/{}", api_base.trim_end_matches('/'), model.trim_start_matches('/'));
        Self { client, url, token, service }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, body: &B) -> Result<T, ClassifierError> {
        let start = std::time::Instant::now();
        let service = self.service;

        let mut req = self.client.post(&self.url).json(body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|source| ClassifierError::Transport { service, source })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("{} call rejected - status={}, url={}", service, status.as_u16(), self.url);
            return Err(ClassifierError::Status {
                service,
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|source| ClassifierError::Transport { service, source })?;
        let parsed = serde_json::from_slice::<T>(&bytes).map_err(|e| ClassifierError::Decode {
            service,
            message: e.to_string(),
        })?;

        debug!(
            "{} call completed - duration={:.2}s, response_bytes={}",
            service,
            start.elapsed().as_secs_f32(),
            bytes.len()
        );
        Ok(parsed)
    }
}

fn truncate_for_log(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Shared client for all inference calls, built once per process.
pub fn build_client(cfg: &InferenceConfig) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(cfg.request_timeout_secs))
        .user_agent(concat!("review_vibes/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub struct HttpSentimentClassifier {
    endpoint: InferenceEndpoint,
}

impl HttpSentimentClassifier {
    pub fn new(endpoint: InferenceEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl SentimentClassifier for HttpSentimentClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentResult, ClassifierError> {
        let req: InferenceRequest<'_, ()> = InferenceRequest { inputs: text, parameters: None };
        let out: ApiClassification = self.endpoint.post(&req).await?;
        let best = out.best().ok_or(ClassifierError::EmptyOutput { service: "sentiment" })?;
        Ok(SentimentResult::new(SentimentLabel::parse(&best.label), best.score))
    }
}

pub struct HttpSummarizer {
    endpoint: InferenceEndpoint,
    params: SummarizationParameters,
}

impl HttpSummarizer {
    pub fn new(endpoint: InferenceEndpoint, analysis: &AnalysisConfig) -> Self {
        Self {
            endpoint,
            params: SummarizationParameters {
                max_length: analysis.summary_max_length,
                min_length: analysis.summary_min_length,
                do_sample: false,
            },
        }
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, ClassifierError> {
        let req = InferenceRequest { inputs: text, parameters: Some(self.params.clone()) };
        let out: Vec<ApiSummary> = self.endpoint.post(&req).await?;
        out.into_iter()
            .next()
            .map(|s| s.summary_text.trim().to_string())
            .ok_or(ClassifierError::EmptyOutput { service: "summarization" })
    }
}

pub struct HttpZeroShotClassifier {
    endpoint: InferenceEndpoint,
}

impl HttpZeroShotClassifier {
    pub fn new(endpoint: InferenceEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl UrgencyClassifier for HttpZeroShotClassifier {
    async fn rank(&self, text: &str, candidate_labels: &[&str]) -> Result<Vec<LabelScore>, ClassifierError> {
        let req = InferenceRequest {
            inputs: text,
            parameters: Some(ZeroShotParameters { candidate_labels }),
        };
        let out: ApiZeroShot = self.endpoint.post(&req).await?;
        let ranked = out.into_ranked();
        if ranked.is_empty() {
            return Err(ClassifierError::EmptyOutput { service: "zero-shot" });
        }
        Ok(ranked)
    }
}

/// The three process-wide handles, built from config.
pub struct ModelHandles {
    pub sentiment: HttpSentimentClassifier,
    pub summarizer: HttpSummarizer,
    pub urgency: HttpZeroShotClassifier,
}

impl ModelHandles {
    pub fn from_config(inference: &InferenceConfig, analysis: &AnalysisConfig, token: Option<String>) -> reqwest::Result<Self> {
        let client = build_client(inference)?;
        let base = inference.api_base.as_str();

        let sentiment = InferenceEndpoint::new(client.clone(), base, &inference.sentiment_model, token.clone(), "sentiment");
        let summarization = InferenceEndpoint::new(client.clone(), base, &inference.summarization_model, token.clone(), "summarization");
        let zero_shot = InferenceEndpoint::new(client, base, &inference.zero_shot_model, token, "zero-shot");

        info!(
            "Inference endpoints configured - sentiment={}, summarization={}, zero_shot={}",
            sentiment.url(),
            summarization.url(),
            zero_shot.url()
        );

        Ok(Self {
            sentiment: HttpSentimentClassifier::new(sentiment),
            summarizer: HttpSummarizer::new(summarization, analysis),
            urgency: HttpZeroShotClassifier::new(zero_shot),
        })
    }
}

/// One call per collaborator; returns true when all three answered.
pub async fn warm_up(
    sentiment: &dyn SentimentClassifier,
    summarizer: &dyn Summarizer,
    urgency: &dyn UrgencyClassifier,
) -> bool {
    let start = std::time::Instant::now();
    info!("Loading models...");
    let probe = "The delivery was late but support fixed it quickly.";

    let (s, m, u) = futures::join!(
        sentiment.classify(probe),
        summarizer.summarize(probe),
        urgency.rank(probe, &crate::models::UrgencyTier::CANDIDATES),
    );

    let mut ok = true;
    if let Err(e) = s {
        warn!("Sentiment model warm-up failed: {}", e);
        ok = false;
    }
    if let Err(e) = m {
        warn!("Summarization model warm-up failed: {}", e);
        ok = false;
    }
    if let Err(e) = u {
        warn!("Zero-shot model warm-up failed: {}", e);
        ok = false;
    }

    info!(
        "Model warm-up completed - duration={:.2}s, all_loaded={}",
        start.elapsed().as_secs_f32(),
        ok
    );
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint(server: &MockServer, model: &str, service: &'static str) -> InferenceEndpoint {
        InferenceEndpoint::new(Client::new(), &server.uri(), model, Some("hf_test".into()), service)
    }

    fn analysis() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    #[tokio::test]
    async fn sentiment_picks_highest_score_and_normalises_label() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/org/sentiment"))
            .and(header("authorization", "Bearer hf_test"))
            .and(body_partial_json(serde_json::json!({"inputs": "This is terrible"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([[
                {"label": "negative", "score": 0.914},
                {"label": "neutral", "score": 0.07},
                {"label": "positive", "score": 0.016}
            ]])))
            .expect(1)
            .mount(&server)
            .await;

        let clf = HttpSentimentClassifier::new(endpoint(&server, "org/sentiment", "sentiment"));
        let out = clf.classify("This is terrible").await.unwrap();
        assert_eq!(out.label, SentimentLabel::Negative);
        assert_eq!(out.score, 0.91);
    }

    #[tokio::test]
    async fn summarizer_sends_generation_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/org/summary"))
            .and(body_partial_json(serde_json::json!({
                "parameters": {"max_length": 100, "min_length": 30, "do_sample": false}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"summary_text": " Customer reports a crash. "}])),
            )
            .mount(&server)
            .await;

        let s = HttpSummarizer::new(endpoint(&server, "org/summary", "summarization"), &analysis());
        assert_eq!(s.summarize("The app crashes").await.unwrap(), "Customer reports a crash.");
    }

    #[tokio::test]
    async fn zero_shot_returns_ranked_labels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/org/nli"))
            .and(body_partial_json(serde_json::json!({
                "parameters": {"candidate_labels": ["critical", "moderate", "minor"]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sequence": "The app crashes",
                "labels": ["critical", "moderate", "minor"],
                "scores": [0.81, 0.12, 0.07]
            })))
            .mount(&server)
            .await;

        let z = HttpZeroShotClassifier::new(endpoint(&server, "org/nli", "zero-shot"));
        let ranked = z.rank("The app crashes", &["critical", "moderate", "minor"]).await.unwrap();
        assert_eq!(ranked[0].label, "critical");
        assert_eq!(ranked.len(), 3);
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model is loading"))
            .mount(&server)
            .await;

        let clf = HttpSentimentClassifier::new(endpoint(&server, "org/sentiment", "sentiment"));
        match clf.classify("anything").await {
            Err(ClassifierError::Status { status, body, .. }) => {
                assert_eq!(status, 503);
                assert!(body.contains("loading"));
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let s = HttpSummarizer::new(endpoint(&server, "m", "summarization"), &analysis());
        assert!(matches!(s.summarize("x").await, Err(ClassifierError::Decode { .. })));
    }

    #[tokio::test]
    async fn empty_summary_list_is_empty_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let s = HttpSummarizer::new(endpoint(&server, "m", "summarization"), &analysis());
        assert!(matches!(s.summarize("x").await, Err(ClassifierError::EmptyOutput { .. })));
    }

    #[test]
    fn endpoint_url_joins_base_and_model() {
        let e = InferenceEndpoint::new(Client::new(), "https://host/models/", "/org/m", None, "sentiment");
        assert_eq!(e.url(), "https://host/models/org/m");
    }
}
