//! Lexicon Provider: opinion word sets and a word-level polarity scorer.
//!
//! The opinion lists use the Hu & Liu format (one word per line, `;`
//! comments). The polarity lexicon uses the VADER format
//! (`word<TAB>mean-valence<TAB>...`).
//!
//! Each resource resolves independently: the configured path, then the
//! first NLTK data directory holding the unzipped resource, then the copy
//! compiled into the binary.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::LexiconConfig;

const BUNDLED_POSITIVE: &str = include_str!("../data/opinion_positive.txt");
const BUNDLED_NEGATIVE: &str = include_str!("../data/opinion_negative.txt");
const BUNDLED_POLARITY: &str = include_str!("../data/polarity_lexicon.tsv");

const NLTK_POSITIVE: &str = "corpora/opinion_lexicon/positive-words.txt";
const NLTK_NEGATIVE: &str = "corpora/opinion_lexicon/negative-words.txt";
const NLTK_POLARITY: &str = "sentiment/vader_lexicon/vader_lexicon.txt";

const NLTK_SYSTEM_DIRS: &[&str] = &[
    "/usr/share/nltk_data",
    "/usr/local/share/nltk_data",
    "/usr/lib/nltk_data",
    "/usr/local/lib/nltk_data",
];

/// Normalisation constant of the compound score.
const ALPHA: f64 = 15.0;
/// Valence multiplier applied to a word preceded by a negation.
const NEGATION_SCALAR: f64 = -0.74;
/// How many preceding tokens are searched for a negation.
const NEGATION_WINDOW: usize = 3;

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "nowhere", "neither", "nor", "cannot",
    "without", "dont", "doesnt", "didnt", "isnt", "wasnt", "arent", "werent", "wont", "cant",
    "couldnt", "shouldnt", "wouldnt", "hasnt", "havent", "hadnt", "aint",
];

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("Failed to read lexicon file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed polarity entry in {origin} at line {line}: {content:?}")]
    Malformed {
        origin: String,
        line: usize,
        content: String,
    },
}

pub struct LexiconProvider {
    positive: HashSet<String>,
    negative: HashSet<String>,
    valence: HashMap<String, f64>,
}

impl LexiconProvider {
    /// The word lists compiled into the binary.
    pub fn bundled() -> Result<Self, LexiconError> {
        Ok(Self {
            positive: parse_opinion_list(BUNDLED_POSITIVE),
            negative: parse_opinion_list(BUNDLED_NEGATIVE),
            valence: parse_polarity(BUNDLED_POLARITY, "bundled polarity lexicon")?,
        })
    }

    /// Resolve every list against `cfg`, searching the NLTK data
    /// directories when `cfg.search_nltk_data` is set.
    pub fn from_config(cfg: &LexiconConfig) -> Result<Self, LexiconError> {
        let roots = if cfg.search_nltk_data { nltk_data_dirs() } else { Vec::new() };
        Self::load(cfg, &roots)
    }

    /// Like [`from_config`](Self::from_config) with explicit NLTK roots.
    pub fn load(cfg: &LexiconConfig, nltk_roots: &[PathBuf]) -> Result<Self, LexiconError> {
        let (positive, positive_origin) =
            source(cfg.positive_words.as_deref(), nltk_roots, NLTK_POSITIVE, BUNDLED_POSITIVE)?;
        let (negative, negative_origin) =
            source(cfg.negative_words.as_deref(), nltk_roots, NLTK_NEGATIVE, BUNDLED_NEGATIVE)?;
        let (polarity, polarity_origin) =
            source(cfg.polarity.as_deref(), nltk_roots, NLTK_POLARITY, BUNDLED_POLARITY)?;

        let lex = Self {
            positive: parse_opinion_list(&positive),
            negative: parse_opinion_list(&negative),
            valence: parse_polarity(&polarity, &polarity_origin)?,
        };
        info!(
            "Lexicon loaded - positive={} ({}), negative={} ({}), polarity_entries={} ({})",
            lex.positive.len(),
            positive_origin,
            lex.negative.len(),
            negative_origin,
            lex.valence.len(),
            polarity_origin
        );
        Ok(lex)
    }

    /// Member of either opinion set, regardless of direction.
    pub fn is_opinion_word(&self, word: &str) -> bool {
        self.positive.contains(word) || self.negative.contains(word)
    }

    pub fn valence(&self, word: &str) -> Option<f64> {
        self.valence.get(word).copied()
    }

    /// Compound polarity of `text` in [-1, 1]; 0.0 when nothing scores.
    pub fn compound(&self, text: &str) -> f64 {
        let tokens: Vec<String> = text
            .split_whitespace()
            .map(|t| {
                t.trim_matches(|c: char| !c.is_alphanumeric())
                    .replace('\'', "")
                    .to_lowercase()
            })
            .filter(|t| !t.is_empty())
            .collect();

        let mut sum = 0.0;
        for (i, tok) in tokens.iter().enumerate() {
            let Some(mut v) = self.valence(tok) else {
                continue;
            };
            let start = i.saturating_sub(NEGATION_WINDOW);
            if tokens[start..i].iter().any(|t| NEGATIONS.contains(&t.as_str())) {
                v *= NEGATION_SCALAR;
            }
            sum += v;
        }
        normalize(sum)
    }
}

fn normalize(score: f64) -> f64 {
    if score == 0.0 {
        return 0.0;
    }
    (score / (score * score + ALPHA).sqrt()).clamp(-1.0, 1.0)
}

/// `$NLTK_DATA` entries, then `~/nltk_data`, then the system locations.
pub fn nltk_data_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = env::var_os("NLTK_DATA")
        .map(|v| env::split_paths(&v).collect())
        .unwrap_or_default();
    if let Some(home) = env::var_os("HOME") {
        dirs.push(PathBuf::from(home).join("nltk_data"));
    }
    dirs.extend(NLTK_SYSTEM_DIRS.iter().map(PathBuf::from));
    dirs
}

/// Text of one resource and a label naming where it came from.
fn source(
    configured: Option<&Path>,
    nltk_roots: &[PathBuf],
    relative: &str,
    bundled: &'static str,
) -> Result<(Cow<'static, str>, String), LexiconError> {
    let found = configured.map(Path::to_path_buf).or_else(|| {
        nltk_roots.iter().map(|root| root.join(relative)).find(|p| p.is_file())
    });
    match found {
        Some(path) => Ok((Cow::Owned(read(&path)?), path.display().to_string())),
        None => {
            debug!("{} not found in {} NLTK data dirs, using bundled copy", relative, nltk_roots.len());
            Ok((Cow::Borrowed(bundled), "bundled".to_string()))
        }
    }
}

/// The published opinion lists carry a few Latin-1 bytes, so decoding is lossy.
fn read(path: &Path) -> Result<String, LexiconError> {
    let bytes = fs::read(path).map_err(|source| LexiconError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn parse_opinion_list(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with(';'))
        .map(str::to_lowercase)
        .collect()
}

fn parse_polarity(content: &str, origin: &str) -> Result<HashMap<String, f64>, LexiconError> {
    let mut out = HashMap::new();
    for (n, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let word = fields.next().map(str::trim).unwrap_or_default();
        let mean = fields.next().and_then(|m| m.trim().parse::<f64>().ok());
        match mean {
            Some(v) if !word.is_empty() => {
                out.insert(word.to_lowercase(), v);
            }
            _ => {
                return Err(LexiconError::Malformed {
                    origin: origin.to_string(),
                    line: n + 1,
                    content: line.to_string(),
                })
            }
        }
    }
    Ok(out)
}
