//! Service configuration.
//!
//! Loaded from a TOML file (`--config`), falling back to the embedded
//! `config/review_vibes.toml`. Every key has a default, so a partial file
//! only needs the values it changes.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Default configuration shipped with the binary.
pub const DEFAULT_CONFIG: &str = include_str!("../config/review_vibes.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' must be greater than zero")]
    Zero { field: String },

    #[error("Configuration field '{field}' must be within [0, 1], got {value}")]
    OutOfUnitRange { field: String, value: f64 },

    #[error("Configuration field '{field}' must not be negative, got {value}")]
    Negative { field: String, value: f64 },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Unknown colormap '{0}' (supported: viridis)")]
    UnknownColormap(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub inference: InferenceConfig,
    pub analysis: AnalysisConfig,
    pub wordcloud: WordCloudConfig,
    pub lexicon: LexiconConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            allowed_origins: vec!["http://localhost:3000".into()],
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub api_base: String,
    pub sentiment_model: String,
    pub summarization_model: String,
    pub zero_shot_model: String,
    pub request_timeout_secs: u64,
    /// Probe every collaborator once at startup.
    pub warm_up: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_base: "https://router.huggingface.co/hf-inference/models".into(),
            sentiment_model: "cardiffnlp/twitter-roberta-base-sentiment-latest".into(),
            summarization_model: "knkarthick/MEETING_SUMMARY".into(),
            zero_shot_model: "facebook/bart-large-mnli".into(),
            request_timeout_secs: 60,
            warm_up: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Rows analysed concurrently; output order never depends on it.
    pub row_concurrency: usize,
    /// Summarizer input is clipped to this many characters.
    pub summary_max_chars: usize,
    pub summary_max_length: u32,
    pub summary_min_length: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            row_concurrency: 8,
            summary_max_chars: 1000,
            summary_max_length: 100,
            summary_min_length: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WordCloudConfig {
    pub width: u32,
    pub height: u32,
    pub max_words: usize,
    pub min_font_size: u32,
    pub contour_width: u32,
    pub relative_scaling: f64,
    pub prefer_horizontal: f64,
    pub normalize_plurals: bool,
    /// Count bigrams whose Dunning log-likelihood score exceeds
    /// `collocation_threshold` as their own entries.
    pub collocations: bool,
    pub collocation_threshold: f64,
    /// Minimum |compound| a lexicon hit needs to stay in the cloud.
    pub polarity_threshold: f64,
    pub colormap: String,
    pub font_path: Option<PathBuf>,
    pub seed: u64,
}

impl Default for WordCloudConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            max_words: 80,
            min_font_size: 12,
            contour_width: 1,
            relative_scaling: 0.5,
            prefer_horizontal: 0.9,
            normalize_plurals: true,
            collocations: true,
            collocation_threshold: 30.0,
            polarity_threshold: 0.41,
            colormap: "viridis".into(),
            font_path: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub positive_words: Option<PathBuf>,
    pub negative_words: Option<PathBuf>,
    pub polarity: Option<PathBuf>,
    /// Look for unzipped `opinion_lexicon` and `vader_lexicon` resources in
    /// the NLTK data directories before falling back to the bundled lists.
    pub search_nltk_data: bool,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            positive_words: None,
            negative_words: None,
            polarity: None,
            search_nltk_data: true,
        }
    }
}

impl ServiceConfig {
    /// Load from `path`, or the embedded default when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::from_toml(DEFAULT_CONFIG),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::EmptyRequired { field: "server.host".into() });
        }
        nonzero("server.port", self.server.port as u64)?;
        nonzero("server.max_upload_bytes", self.server.max_upload_bytes as u64)?;

        Url::parse(&self.inference.api_base).map_err(|_| ConfigError::InvalidUrl {
            field: "inference.api_base".into(),
            url: self.inference.api_base.clone(),
        })?;
        for (field, value) in [
            ("inference.sentiment_model", &self.inference.sentiment_model),
            ("inference.summarization_model", &self.inference.summarization_model),
            ("inference.zero_shot_model", &self.inference.zero_shot_model),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyRequired { field: field.into() });
            }
        }
        nonzero("inference.request_timeout_secs", self.inference.request_timeout_secs)?;

        nonzero("analysis.row_concurrency", self.analysis.row_concurrency as u64)?;
        nonzero("analysis.summary_max_chars", self.analysis.summary_max_chars as u64)?;

        let wc = &self.wordcloud;
        nonzero("wordcloud.width", wc.width as u64)?;
        nonzero("wordcloud.height", wc.height as u64)?;
        nonzero("wordcloud.max_words", wc.max_words as u64)?;
        nonzero("wordcloud.min_font_size", wc.min_font_size as u64)?;
        unit_range("wordcloud.relative_scaling", wc.relative_scaling)?;
        unit_range("wordcloud.prefer_horizontal", wc.prefer_horizontal)?;
        unit_range("wordcloud.polarity_threshold", wc.polarity_threshold)?;
        if wc.collocation_threshold.is_nan() || wc.collocation_threshold < 0.0 {
            return Err(ConfigError::Negative {
                field: "wordcloud.collocation_threshold".into(),
                value: wc.collocation_threshold,
            });
        }
        if !wc.colormap.eq_ignore_ascii_case("viridis") {
            return Err(ConfigError::UnknownColormap(wc.colormap.clone()));
        }

        Ok(())
    }
}

fn nonzero(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero { field: field.to_string() });
    }
    Ok(())
}

fn unit_range(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::OutOfUnitRange { field: field.to_string(), value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_parses_and_validates() {
        let config = ServiceConfig::from_toml(DEFAULT_CONFIG).expect("default config should load");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.analysis.summary_max_chars, 1000);
        assert_eq!(config.wordcloud.max_words, 80);
        assert!((config.wordcloud.polarity_threshold - 0.41).abs() < f64::EPSILON);
        assert!(config.wordcloud.collocations);
        assert_eq!(config.wordcloud.collocation_threshold, 30.0);
        assert!(config.lexicon.search_nltk_data);
        assert!(config.lexicon.positive_words.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = ServiceConfig::from_toml("[server]\nport = 9001\n").unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.inference.zero_shot_model, "facebook/bart-large-mnli");
        assert_eq!(config.wordcloud.width, 1000);
    }

    #[test]
    fn rejects_bad_api_base() {
        let err = ServiceConfig::from_toml("[inference]\napi_base = \"not a url\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn rejects_zero_concurrency_and_out_of_range_threshold() {
        let err = ServiceConfig::from_toml("[analysis]\nrow_concurrency = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Zero { .. }));

        let err = ServiceConfig::from_toml("[wordcloud]\npolarity_threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfUnitRange { .. }));
    }

    #[test]
    fn rejects_negative_collocation_threshold() {
        let err = ServiceConfig::from_toml("[wordcloud]\ncollocation_threshold = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Negative { .. }));
    }

    #[test]
    fn rejects_unknown_colormap() {
        let err = ServiceConfig::from_toml("[wordcloud]\ncolormap = \"plasma\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownColormap(_)));
    }

    #[test]
    fn loads_from_file_and_reports_missing_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[analysis]\nrow_concurrency = 2").unwrap();
        let config = ServiceConfig::load(Some(f.path())).unwrap();
        assert_eq!(config.analysis.row_concurrency, 2);

        let missing = ServiceConfig::load(Some(Path::new("/nonexistent/review_vibes.toml")));
        assert!(matches!(missing, Err(ConfigError::FileNotFound(_))));
    }
}
