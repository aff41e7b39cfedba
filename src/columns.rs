//! CSV decoding and review-column resolution.

use csv::{Reader, ReaderBuilder};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::Review;

/// Canonical name of the text column.
pub const REVIEW_COLUMN: &str = "review";

/// Synonyms probed in order when the canonical column is absent.
pub const FALLBACK_COLUMNS: [&str; 5] = ["comment", "comments", "text", "feedback", "response"];

/// Client-input failures; all of them map to HTTP 400.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Error processing file: upload is not valid UTF-8 ({0})")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    #[error("Error processing file: {0}")]
    MalformedCsv(#[from] csv::Error),

    #[error("No 'review' column found in CSV. Please ensure your CSV has a 'review' column or similar.")]
    MissingColumn { headers: Vec<String> },
}

/// A parsed upload with its text column located.
pub struct ReviewTable<'a> {
    reader: Reader<&'a [u8]>,
    column_index: usize,
    source_column: String,
}

impl<'a> ReviewTable<'a> {
    /// Header the reviews were read from, before renaming to `review`.
    pub fn source_column(&self) -> &str {
        &self.source_column
    }

    pub fn was_renamed(&self) -> bool {
        self.source_column != REVIEW_COLUMN
    }

    /// Lazily yields one `Review` per data row, ids counting from zero.
    /// Empty lines are skipped by the reader; a row with an empty review
    /// cell is still a row and yields an empty text.
    pub fn reviews(self) -> impl Iterator<Item = Result<Review, ParseError>> + 'a {
        let idx = self.column_index;
        self.reader
            .into_records()
            .enumerate()
            .map(move |(id, r)| -> Result<Review, ParseError> {
                let rec = r?;
                let text = rec.get(idx).unwrap_or_default().to_string();
                Ok(Review::new(id, text))
            })
    }
}

/// Decode raw upload bytes as UTF-8, dropping a leading byte-order mark.
pub fn decode_upload(bytes: &[u8]) -> Result<&str, ParseError> {
    let text = std::str::from_utf8(bytes)?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Locate the review column: `review` if present, else the first
/// matching synonym from [`FALLBACK_COLUMNS`].
pub fn resolve_column(headers: &[String]) -> Result<(usize, String), ParseError> {
    let find = |name: &str| headers.iter().position(|h| h == name);

    if let Some(i) = find(REVIEW_COLUMN) {
        return Ok((i, REVIEW_COLUMN.to_string()));
    }
    for candidate in FALLBACK_COLUMNS {
        if let Some(i) = find(candidate) {
            return Ok((i, candidate.to_string()));
        }
    }
    Err(ParseError::MissingColumn { headers: headers.to_vec() })
}

pub fn open_table(text: &str) -> Result<ReviewTable<'_>, ParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    debug!("CSV headers - {:?}", headers);

    let (column_index, source_column) = resolve_column(&headers)?;
    let table = ReviewTable { reader, column_index, source_column };
    if table.was_renamed() {
        info!("Found review data in column: {}", table.source_column());
    }
    Ok(table)
}

/// Decode, resolve and materialise every review row.
pub fn parse_reviews(bytes: &[u8]) -> Result<Vec<Review>, ParseError> {
    let text = decode_upload(bytes)?;
    let table = open_table(text)?;
    table.reviews().collect()
}
