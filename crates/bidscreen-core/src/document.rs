//! Document text preparation ahead of an analysis run.
//!
//! Pages arrive as plain text from an external extractor. Before they reach
//! the model they are joined with page markers (so evidence can cite a page),
//! optionally grouped into chunks, and truncated to the budget of the chosen
//! detail level.
//!
//! # Page markers
//!
//! Every page is prefixed with `"\n\n--- PAGE {n} ---\n"`, `n` starting at 1.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Marker appended when a document is cut to its detail-level budget.
pub const TRUNCATION_NOTE: &str =
    "\n\n[Document truncated — increase detail level for full analysis]";

/// Title used when the first page has no text.
pub const DEFAULT_TITLE: &str = "Tender Document";

const MAX_TITLE_CHARS: usize = 150;
const DATE_SCAN_LINES: usize = 15;

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2}[./]\d{1,2}[./]20\d{2})\b|\b((?:January|February|March|April|May|June|July|August|September|October|November|December|gennaio|febbraio|marzo|aprile|maggio|giugno|luglio|agosto|settembre|ottobre|novembre|dicembre|Januar|Februar|März|Mai|Juni|Juli|Oktober|Dezember)\s+20\d{2})\b",
    )
    .expect("date pattern is valid")
});

/// How exhaustive an analysis run should be; bounds the text sent to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetailLevel {
    #[serde(alias = "low")]
    Low,
    #[default]
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
}

impl DetailLevel {
    /// Maximum characters of document text sent at this level.
    pub fn char_budget(&self) -> usize {
        match self {
            Self::Low => 80_000,
            Self::Medium => 200_000,
            Self::High => 400_000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetailLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown detail level: {other:?} (low, medium, high)")),
        }
    }
}

/// Split extracted plain text into pages on form-feed characters.
///
/// Trailing empty pages (a final `\x0c`) are dropped.
pub fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split('\x0c').map(str::to_string).collect();
    while pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

fn page_block(number: usize, text: &str) -> String {
    format!("\n\n--- PAGE {number} ---\n{}", text.trim())
}

/// Join all pages into one text with page markers, for single-pass analysis.
pub fn extract_raw_text<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .enumerate()
        .map(|(i, page)| page_block(i + 1, page.as_ref()))
        .collect()
}

/// Group marked pages into chunks of at most `max_chars` characters.
///
/// A page is never split: a single page longer than `max_chars` becomes a
/// chunk of its own.
pub fn chunk_pages<S: AsRef<str>>(pages: &[S], max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for (i, page) in pages.iter().enumerate() {
        let block = page_block(i + 1, page.as_ref());
        let block_len = block.chars().count();

        if current_len + block_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(&block);
        current_len += block_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Cut `text` to the character budget of `detail`.
///
/// Returns the (possibly shortened) text and whether it was truncated.
pub fn truncate_for_detail(text: &str, detail: DetailLevel) -> (String, bool) {
    let (cut, truncated) = truncate_chars(text, detail.char_budget());
    if truncated {
        debug!(%detail, budget = detail.char_budget(), "document truncated");
    }
    (cut, truncated)
}

/// Cut `text` to at most `max_chars` characters plus [`TRUNCATION_NOTE`].
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (format!("{}{TRUNCATION_NOTE}", &text[..cut]), true),
        None => (text.to_string(), false),
    }
}

/// Heuristic title and date from the first page.
///
/// Only a fallback for reports whose model output left these empty: the
/// title is the first non-blank line, the date the first recognisable date
/// in the opening lines.
pub fn guess_title_and_date<S: AsRef<str>>(pages: &[S]) -> (String, String) {
    let Some(first) = pages.first() else {
        return (DEFAULT_TITLE.to_string(), String::new());
    };

    let lines: Vec<&str> = first
        .as_ref()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let title = lines
        .first()
        .map(|l| l.chars().take(MAX_TITLE_CHARS).collect())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let date = lines
        .iter()
        .take(DATE_SCAN_LINES)
        .find_map(|line| DATE_PATTERN.find(line))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    (title, date)
}
