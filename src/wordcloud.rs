//! Word Cloud Builder.
//!
//! corpus → cleaned text → opinion-lexicon filter → polarity filter
//! (fallback: cleaned text) → word frequencies → layout → render → base64.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use itertools::Itertools;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::WordCloudConfig;
use crate::lexicon::LexiconProvider;
use crate::render::{viridis, CloudLayout, CloudRenderer, ImageKind, PlacedWord, RenderError};

/// Padding kept free around every placed word.
const MARGIN: u32 = 2;
/// Distance between successive spiral turns, in px.
const SPIRAL_SPACING: f64 = 4.0;
/// Arc length between successive spiral probes, in px.
const SPIRAL_STEP: f64 = 2.0;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w[\w']+").expect("static token pattern"));

pub struct WordCloudBuilder {
    lexicon: Arc<LexiconProvider>,
    renderer: Arc<dyn CloudRenderer>,
    cfg: WordCloudConfig,
}

impl WordCloudBuilder {
    pub fn new(lexicon: Arc<LexiconProvider>, renderer: Arc<dyn CloudRenderer>, cfg: WordCloudConfig) -> Self {
        Self { lexicon, renderer, cfg }
    }

    /// Format of the images `build` produces.
    pub fn image_kind(&self) -> ImageKind {
        self.renderer.kind()
    }

    /// Base64-encoded cloud image, or an empty string on any failure.
    pub fn build(&self, corpus: &str) -> String {
        let start = Instant::now();
        match self.try_build(corpus) {
            Ok(encoded) => {
                info!(
                    "Word cloud completed - kind={}, encoded_len={}, duration={:.2}s",
                    self.renderer.kind(),
                    encoded.len(),
                    start.elapsed().as_secs_f64()
                );
                encoded
            }
            Err(e) => {
                warn!("Error generating word cloud - error={}", e);
                String::new()
            }
        }
    }

    pub fn try_build(&self, corpus: &str) -> Result<String, RenderError> {
        let cleaned = clean_corpus(corpus);
        let salient = self.salient_tokens(&cleaned);

        let text = if salient.is_empty() {
            debug!("No salient tokens - falling back to the full corpus");
            cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            debug!("Salient tokens - count={}", salient.len());
            salient.join(" ")
        };

        let freqs = word_frequencies(&text, &self.cfg);
        if freqs.is_empty() {
            return Err(RenderError::EmptyCorpus);
        }

        let layout = self.layout(&freqs);
        let bytes = self.renderer.render(&layout)?;
        Ok(STANDARD.encode(bytes))
    }

    /// Tokens present in the opinion lexicon whose polarity magnitude
    /// reaches the configured threshold, in corpus order.
    pub fn salient_tokens<'a>(&self, cleaned: &'a str) -> Vec<&'a str> {
        let opinion: Vec<&str> = cleaned
            .split_whitespace()
            .filter(|t| self.lexicon.is_opinion_word(t))
            .collect();

        let threshold = self.cfg.polarity_threshold;
        opinion
            .into_par_iter()
            .filter(|t| self.lexicon.compound(t).abs() >= threshold)
            .collect()
    }

    pub fn layout(&self, freqs: &[(String, f64)]) -> CloudLayout {
        let start_size = self.initial_font_size(freqs);
        let mut rng = StdRng::seed_from_u64(self.cfg.seed);
        let words = self.place_words(freqs, start_size, &mut rng);
        debug!(
            "Word cloud layout - words={}, placed={}, start_size={}",
            freqs.len(),
            words.len(),
            start_size
        );
        CloudLayout {
            width: self.cfg.width,
            height: self.cfg.height,
            contour_width: self.cfg.contour_width,
            words,
        }
    }

    /// Harmonic mean of the sizes the two most frequent words reach on an
    /// empty canvas starting from the canvas height.
    fn initial_font_size(&self, freqs: &[(String, f64)]) -> u32 {
        if freqs.len() < 2 {
            return self.cfg.height;
        }
        let mut rng = StdRng::seed_from_u64(self.cfg.seed);
        let trial = self.place_words(&freqs[..2], self.cfg.height, &mut rng);
        match trial.as_slice() {
            [a, b] => {
                let (a, b) = (a.font_size as f64, b.font_size as f64);
                (2.0 * a * b / (a + b)) as u32
            }
            [a] => a.font_size as u32,
            _ => self.cfg.height,
        }
    }

    fn place_words(&self, freqs: &[(String, f64)], start_size: u32, rng: &mut StdRng) -> Vec<PlacedWord> {
        let cfg = &self.cfg;
        let rs = cfg.relative_scaling;
        let mut occupancy = Occupancy::new(cfg.width, cfg.height);
        let mut placed = Vec::with_capacity(freqs.len());
        let mut font_size = start_size as i64;
        let mut last_freq = 1.0;

        for (word, freq) in freqs {
            if *freq <= 0.0 {
                continue;
            }
            if rs != 0.0 {
                font_size = ((rs * (freq / last_freq) + (1.0 - rs)) * font_size as f64).round() as i64;
            }

            let mut vertical = !rng.random_bool(cfg.prefer_horizontal);
            let mut tried_other_orientation = false;
            let spot = loop {
                if font_size < cfg.min_font_size as i64 {
                    break None;
                }
                let (w, h) = self.renderer.measure(word, font_size as f32);
                let (bw, bh) = if vertical { (h, w) } else { (w, h) };
                if let Some(pos) = spiral_search(&occupancy, bw + MARGIN, bh + MARGIN, rng) {
                    break Some((pos, bw, bh));
                }
                if !tried_other_orientation && cfg.prefer_horizontal < 1.0 {
                    vertical = !vertical;
                    tried_other_orientation = true;
                } else {
                    font_size -= 1;
                    vertical = false;
                }
            };

            // Canvas is full at the smallest allowed size.
            let Some(((x, y), bw, bh)) = spot else {
                break;
            };

            occupancy.occupy(x, y, bw + MARGIN, bh + MARGIN);
            placed.push(PlacedWord {
                text: word.clone(),
                font_size: font_size as f32,
                x: x + MARGIN / 2,
                y: y + MARGIN / 2,
                vertical,
                color: viridis(rng.random_range(0.0..1.0)),
            });
            last_freq = *freq;
        }
        placed
    }
}

/// Lowercase and drop every character that is not `a-z` or whitespace.
pub fn clean_corpus(corpus: &str) -> String {
    corpus
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_whitespace())
        .collect()
}

/// Relative frequencies (most frequent = 1.0) of the top `max_words`
/// entries, most frequent first. Ties are ordered alphabetically.
/// Entries are single words, plus word pairs that score as collocations
/// when `cfg.collocations` is set.
pub fn word_frequencies(text: &str, cfg: &WordCloudConfig) -> Vec<(String, f64)> {
    let stop = stopwords();
    let words: Vec<String> = TOKEN_RE
        .find_iter(text)
        .map(|m| {
            let w = m.as_str().to_lowercase();
            match w.strip_suffix("'s") {
                Some(stripped) => stripped.to_string(),
                None => w,
            }
        })
        .filter(|w| !w.chars().all(|c| c.is_numeric()))
        .collect();

    // Pairs are taken before stopwords are dropped, so "thank you very
    // much" never yields "thank much".
    let pairs: Vec<String> = words
        .iter()
        .tuple_windows()
        .filter(|(a, b)| !stop.contains(a.as_str()) && !stop.contains(b.as_str()))
        .map(|(a, b)| format!("{} {}", a, b))
        .collect();
    let unigrams: Vec<&String> = words.iter().filter(|w| !stop.contains(w.as_str())).collect();
    let n_words = unigrams.len();

    let (mut counts, standard) = count_tokens(unigrams, cfg.normalize_plurals);
    if cfg.collocations {
        let (pair_counts, _) = count_tokens(pairs.iter(), cfg.normalize_plurals);
        let single = counts.clone();
        for (pair, n) in pair_counts.into_iter().sorted() {
            let Some((a, b)) = pair.split_once(' ') else {
                continue;
            };
            let (Some(w1), Some(w2)) = (standard.get(a), standard.get(b)) else {
                continue;
            };
            let (Some(&c1), Some(&c2)) = (single.get(w1), single.get(w2)) else {
                continue;
            };
            if collocation_score(n, c1, c2, n_words as i64) > cfg.collocation_threshold {
                // a word in several collocations can go negative
                *counts.entry(w1.clone()).or_insert(0) -= n;
                *counts.entry(w2.clone()).or_insert(0) -= n;
                counts.insert(pair, n);
            }
        }
        counts.retain(|_, n| *n > 0);
    }

    let mut ranked: Vec<(String, i64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(cfg.max_words);

    let Some(max) = ranked.first().map(|(_, c)| *c) else {
        return Vec::new();
    };
    ranked
        .into_iter()
        .map(|(w, c)| (w, c as f64 / max as f64))
        .collect()
}

/// Token counts plus the form each token was counted under. With
/// `normalize_plurals`, a token ending in `s` (not `ss`) is merged into
/// its singular when the singular also occurs.
fn count_tokens<S: AsRef<str>>(
    tokens: impl IntoIterator<Item = S>,
    normalize_plurals: bool,
) -> (HashMap<String, i64>, HashMap<String, String>) {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for t in tokens {
        *counts.entry(t.as_ref().to_string()).or_insert(0) += 1;
    }
    let mut standard: HashMap<String, String> = counts.keys().map(|k| (k.clone(), k.clone())).collect();

    if normalize_plurals {
        let plurals: Vec<String> = counts
            .keys()
            .filter(|w| w.ends_with('s') && !w.ends_with("ss"))
            .cloned()
            .sorted()
            .collect();
        for plural in plurals {
            let singular = &plural[..plural.len() - 1];
            if counts.contains_key(singular) {
                let n = counts.remove(&plural).unwrap_or(0);
                *counts.entry(singular.to_string()).or_insert(0) += n;
                standard.insert(plural.clone(), singular.to_string());
            }
        }
    }
    (counts, standard)
}

/// Dunning log-likelihood ratio of the pair (w1, w2) seen `c12` times,
/// given unigram counts `c1`, `c2` over `n` words.
fn collocation_score(c12: i64, c1: i64, c2: i64, n: i64) -> f64 {
    if n <= c1 || n <= c2 {
        return 0.0;
    }
    let (c12, c1, c2, n) = (c12 as f64, c1 as f64, c2 as f64, n as f64);
    let p = c2 / n;
    let p1 = c12 / c1;
    let p2 = (c2 - c12) / (n - c1);
    let score = log_likelihood(c12, c1, p) + log_likelihood(c2 - c12, n - c1, p)
        - log_likelihood(c12, c1, p1)
        - log_likelihood(c2 - c12, n - c1, p2);
    -2.0 * score
}

fn log_likelihood(k: f64, n: f64, x: f64) -> f64 {
    x.max(1e-10).ln() * k + (1.0 - x).max(1e-10).ln() * (n - k)
}

/// Archimedean spiral from the canvas centre (random phase), stretched to
/// the canvas aspect ratio. Returns the first free top-left corner.
fn spiral_search(occ: &Occupancy, bw: u32, bh: u32, rng: &mut StdRng) -> Option<(u32, u32)> {
    if bw > occ.width || bh > occ.height {
        return None;
    }
    let cx = (occ.width - bw) as f64 / 2.0;
    let cy = (occ.height - bh) as f64 / 2.0;
    let aspect = occ.width as f64 / occ.height as f64;
    let phase = rng.random_range(0.0..TAU);
    let max_r = occ.height as f64;

    let mut theta = 0.0f64;
    loop {
        let r = SPIRAL_SPACING * theta / TAU;
        if r > max_r {
            return None;
        }
        let x = (cx + r * aspect * (theta + phase).cos()).round();
        let y = (cy + r * (theta + phase).sin()).round();
        if x >= 0.0 && y >= 0.0 && occ.is_free(x as u32, y as u32, bw, bh) {
            return Some((x as u32, y as u32));
        }
        theta += (SPIRAL_STEP / r.max(1.0)).min(0.5);
    }
}

/// Pixel occupancy with a summed-area table for O(1) box queries.
struct Occupancy {
    width: u32,
    height: u32,
    cells: Vec<u32>,
    integral: Vec<u32>,
}

impl Occupancy {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![0; (width * height) as usize],
            integral: vec![0; ((width + 1) * (height + 1)) as usize],
        }
    }

    fn is_free(&self, x: u32, y: u32, bw: u32, bh: u32) -> bool {
        if x + bw > self.width || y + bh > self.height {
            return false;
        }
        let s = (self.width + 1) as usize;
        let (x0, y0, x1, y1) = (x as usize, y as usize, (x + bw) as usize, (y + bh) as usize);
        let sum = self.integral[y1 * s + x1] + self.integral[y0 * s + x0]
            - self.integral[y0 * s + x1]
            - self.integral[y1 * s + x0];
        sum == 0
    }

    fn occupy(&mut self, x: u32, y: u32, bw: u32, bh: u32) {
        let x1 = (x + bw).min(self.width);
        let y1 = (y + bh).min(self.height);
        for row in y..y1 {
            for col in x..x1 {
                self.cells[(row * self.width + col) as usize] = 1;
            }
        }
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let w = self.width as usize;
        let s = w + 1;
        for y in 0..self.height as usize {
            let mut row_sum = 0;
            for x in 0..w {
                row_sum += self.cells[y * w + x];
                self.integral[(y + 1) * s + x + 1] = self.integral[y * s + x + 1] + row_sum;
            }
        }
    }
}

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: Lazy<HashSet<&'static str>> = Lazy::new(|| {
        [
            "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
            "any", "are", "aren't", "as", "at", "be", "because", "been", "before", "being",
            "below", "between", "both", "but", "by", "can", "can't", "cannot", "com", "could",
            "couldn't", "did", "didn't", "do", "does", "doesn't", "doing", "don't", "down",
            "during", "each", "else", "ever", "few", "for", "from", "further", "get", "had",
            "hadn't", "has", "hasn't", "have", "haven't", "having", "he", "he'd", "he'll", "he's",
            "hence", "her", "here", "here's", "hers", "herself", "him", "himself", "his", "how",
            "how's", "however", "http", "i", "i'd", "i'll", "i'm", "i've", "if", "in", "into",
            "is", "isn't", "it", "it's", "its", "itself", "just", "k", "let's", "like", "me",
            "more", "most", "mustn't", "my", "myself", "no", "nor", "not", "of", "off", "on",
            "once", "only", "or", "other", "otherwise", "ought", "our", "ours", "ourselves", "out",
            "over", "own", "r", "same", "shall", "shan't", "she", "she'd", "she'll", "she's",
            "should", "shouldn't", "since", "so", "some", "such", "than", "that", "that's", "the",
            "their", "theirs", "them", "themselves", "then", "there", "there's", "therefore",
            "these", "they", "they'd", "they'll", "they're", "they've", "this", "those", "through",
            "to", "too", "under", "until", "up", "very", "was", "wasn't", "we", "we'd", "we'll",
            "we're", "we've", "were", "weren't", "what", "what's", "when", "when's", "where",
            "where's", "which", "while", "who", "who's", "whom", "why", "why's", "with", "won't",
            "would", "wouldn't", "www", "you", "you'd", "you'll", "you're", "you've", "your",
            "yours", "yourself", "yourselves",
        ]
        .into_iter()
        .collect()
    });
    &SET
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SvgRenderer;

    fn builder() -> WordCloudBuilder {
        WordCloudBuilder::new(
            Arc::new(LexiconProvider::bundled().unwrap()),
            Arc::new(SvgRenderer),
            WordCloudConfig::default(),
        )
    }

    fn freq_cfg(normalize_plurals: bool, collocations: bool) -> WordCloudConfig {
        WordCloudConfig { normalize_plurals, collocations, ..Default::default() }
    }

    fn decode_svg(encoded: &str) -> String {
        String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap()
    }

    #[test]
    fn cleaning_drops_digits_and_punctuation() {
        assert_eq!(clean_corpus("Great!! 5 stars, TERRIBLE support."), "great  stars terrible support");
        assert_eq!(clean_corpus("Café"), "caf");
    }

    #[test]
    fn salient_tokens_keep_only_forceful_opinion_words() {
        let b = builder();
        let cleaned = clean_corpus("I love it, but delivery was terrible and slow and annoying. Love!");
        assert_eq!(b.salient_tokens(&cleaned), vec!["love", "terrible", "love"]);
    }

    #[test]
    fn less_common_complaint_words_are_salient() {
        let b = builder();
        let cleaned = clean_corpus("Furious customer: horrendous, painful service and I was hurt.");
        assert_eq!(b.salient_tokens(&cleaned), vec!["furious", "horrendous", "painful", "hurt"]);

        let svg = decode_svg(&b.build("Furious customer: horrendous, painful service and I was hurt."));
        assert!(svg.contains(">horrendous</text>"));
        assert!(!svg.contains(">customer</text>"));
    }

    #[test]
    fn frequencies_merge_plurals_and_drop_stopwords() {
        let f = word_frequencies(
            "the review reviews review glass product's product",
            &freq_cfg(true, false),
        );
        assert_eq!(f[0], ("review".to_string(), 1.0));
        assert!(f.iter().all(|(w, _)| w != "reviews" && w != "the"));
        let product = f.iter().find(|(w, _)| w == "product").unwrap();
        assert!((product.1 - 2.0 / 3.0).abs() < 1e-9);
        assert!(f.iter().any(|(w, _)| w == "glass"));
    }

    #[test]
    fn plurals_stay_separate_when_disabled() {
        let f = word_frequencies("review reviews", &freq_cfg(false, false));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn frequencies_respect_max_words() {
        let text: Vec<String> = (0..120).map(|i| format!("word{}x", i)).collect();
        assert_eq!(word_frequencies(&text.join(" "), &WordCloudConfig::default()).len(), 80);
    }

    #[test]
    fn frequent_pairs_become_single_entries() {
        let text: Vec<String> = (0..15).map(|i| format!("customer service x{}y", i)).collect();
        let text = text.join(" ");

        let f = word_frequencies(&text, &freq_cfg(true, true));
        assert_eq!(f[0], ("customer service".to_string(), 1.0));
        assert!(f.iter().all(|(w, _)| w != "customer" && w != "service"));
        // one-off pairs stay below the threshold
        assert!(f.iter().all(|(w, _)| w == "customer service" || !w.contains(' ')));

        let f = word_frequencies(&text, &freq_cfg(true, false));
        assert!(f.iter().any(|(w, _)| w == "customer"));
        assert!(f.iter().all(|(w, _)| !w.contains(' ')));
    }

    #[test]
    fn pairs_never_span_a_stopword() {
        let text = "thank you very much ".repeat(20);
        let f = word_frequencies(&text, &freq_cfg(true, true));
        assert!(f.iter().all(|(w, _)| w != "thank much"));
    }

    #[test]
    fn collocation_score_rewards_fixed_pairs() {
        // pair always together vs. pair seen once among independent words
        assert!(collocation_score(15, 15, 15, 45) > 30.0);
        assert!(collocation_score(1, 15, 1, 45) < 30.0);
        assert_eq!(collocation_score(3, 3, 3, 3), 0.0);
    }

    #[test]
    fn builds_from_salient_words() {
        let svg = decode_svg(&builder().build("Amazing product, terrible support. Amazing!"));
        assert!(svg.contains(">amazing</text>"));
        assert!(svg.contains(">terrible</text>"));
        assert!(!svg.contains(">product</text>"));
    }

    #[test]
    fn falls_back_to_full_corpus_without_lexicon_hits() {
        let svg = decode_svg(&builder().build("delivery arrived on tuesday"));
        assert!(svg.contains(">delivery</text>"));
        assert!(svg.contains(">tuesday</text>"));
    }

    #[test]
    fn empty_or_unusable_corpus_degrades_to_empty_string() {
        let b = builder();
        assert_eq!(b.build(""), "");
        assert_eq!(b.build("!!! 123 ???"), "");
        assert!(matches!(b.try_build("   "), Err(RenderError::EmptyCorpus)));
    }

    #[test]
    fn layout_is_deterministic_and_non_overlapping() {
        let b = builder();
        let text = "love love love great great terrible awful awful horrible amazing excellent \
                    broken broken broken worst fantastic disappointed rude";
        let freqs = word_frequencies(text, &WordCloudConfig::default());
        let first = b.layout(&freqs);
        let second = b.layout(&freqs);
        assert_eq!(first.words.len(), second.words.len());
        assert!(!first.words.is_empty());

        let boxes: Vec<(u32, u32, u32, u32)> = first
            .words
            .iter()
            .map(|w| {
                let (mw, mh) = SvgRenderer.measure(&w.text, w.font_size);
                let (bw, bh) = if w.vertical { (mh, mw) } else { (mw, mh) };
                (w.x, w.y, w.x + bw, w.y + bh)
            })
            .collect();

        for (i, a) in boxes.iter().enumerate() {
            assert!(a.2 <= 1000 && a.3 <= 600, "word {} leaves the canvas", i);
            for b in &boxes[i + 1..] {
                let overlap = a.0 < b.2 && b.0 < a.2 && a.1 < b.3 && b.1 < a.3;
                assert!(!overlap);
            }
        }

        for (a, b) in first.words.iter().zip(&second.words) {
            assert_eq!((a.x, a.y, a.vertical, a.font_size), (b.x, b.y, b.vertical, b.font_size));
        }
        // most frequent word is the largest
        let max = first.words.iter().map(|w| w.font_size).fold(0.0, f32::max);
        assert_eq!(first.words[0].font_size, max);
        assert!(first.words.iter().all(|w| w.font_size >= 12.0));
    }

    #[test]
    fn occupancy_reports_collisions() {
        let mut occ = Occupancy::new(20, 10);
        assert!(occ.is_free(0, 0, 20, 10));
        occ.occupy(5, 5, 3, 3);
        assert!(!occ.is_free(0, 0, 20, 10));
        assert!(!occ.is_free(6, 6, 1, 1));
        assert!(occ.is_free(0, 0, 5, 10));
        assert!(!occ.is_free(15, 0, 6, 1));
    }
}
