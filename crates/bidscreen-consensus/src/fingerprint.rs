//! Significant-word fingerprints and lexical similarity.
//!
//! Findings from independent runs carry no stable identifier, so "the same
//! finding" is approximated by surface overlap: two texts match when their
//! fingerprints share at least [`SIMILARITY_THRESHOLD`] terms. There is no
//! stemming or synonym handling. Near-duplicates that fall under the
//! threshold stay separate; unrelated findings must never collapse, so the
//! threshold stays conservative.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Shared terms required for two texts to count as the same finding.
pub const SIMILARITY_THRESHOLD: usize = 2;

/// Terms kept per fingerprint, in document order.
pub const MAX_TERMS: usize = 10;

/// Tokens shorter than this (in characters) are ignored.
pub const MIN_TERM_CHARS: usize = 3;

/// English and Italian function words dropped before fingerprinting.
pub const STOP_WORDS: &[&str] = &[
    // English
    "the", "and", "for", "with", "that", "this", "these", "those", "from", "into", "onto",
    "upon", "are", "was", "were", "will", "shall", "must", "should", "would", "could", "can",
    "may", "might", "not", "has", "have", "had", "been", "being", "any", "all", "each", "per",
    "its", "their", "them", "they", "there", "where", "when", "which", "who", "whom", "what",
    "than", "then", "such", "also", "other", "our", "your", "you", "but", "nor", "via", "over",
    "under", "more", "most", "only", "about", "after", "before", "within", "without", "between",
    "does", "did", "out", "off", "both", "some", "very", "same", "own", "too",
    // Italian
    "del", "della", "delle", "dei", "degli", "dello", "dell", "che", "per", "con", "una",
    "uno", "gli", "non", "sono", "come", "anche", "alla", "alle", "allo", "agli", "all", "dal",
    "dalla", "dalle", "dai", "dagli", "dallo", "nel", "nella", "nelle", "nei", "negli", "nello",
    "sul", "sulla", "sulle", "sui", "sugli", "sullo", "tra", "fra", "questo", "questa", "questi",
    "queste", "quello", "quella", "quelli", "quelle", "essere", "stato", "stata", "viene",
    "vengono", "deve", "devono", "più", "ogni", "suo", "sua", "suoi", "sue", "loro", "ecc",
    "etc", "cui", "quale", "quali", "dove", "quando", "senza", "presso", "oppure", "ovvero",
];

static TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[a-z0-9àáâäèéêëìíîïòóôöùúûüç]+").expect("term pattern is valid")
});

static STOP_SET: LazyLock<BTreeSet<&'static str>> =
    LazyLock::new(|| STOP_WORDS.iter().copied().collect());

/// Tuning knobs for similarity. `Default` uses the named constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    pub similarity_threshold: usize,
    pub max_terms: usize,
    /// Let the reconciler group items that are equal after trimming and
    /// case-folding, even when they are too short to fingerprint ("CE").
    /// Off by default; [`MergeOptions::similar`] ignores it.
    pub fold_exact_repeats: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: SIMILARITY_THRESHOLD,
            max_terms: MAX_TERMS,
            fold_exact_repeats: false,
        }
    }
}

impl MergeOptions {
    pub fn fingerprint(&self, text: &str) -> Fingerprint {
        Fingerprint::with_max_terms(text, self.max_terms)
    }

    /// Whether the fingerprints of `a` and `b` share at least
    /// `similarity_threshold` terms.
    pub fn similar(&self, a: &str, b: &str) -> bool {
        self.fingerprint(a).overlap(&self.fingerprint(b)) >= self.similarity_threshold
    }
}

/// The bag of significant lower-cased terms of a text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    terms: BTreeSet<String>,
}

impl Fingerprint {
    /// Fingerprint of the first [`MAX_TERMS`] significant tokens.
    pub fn of(text: &str) -> Self {
        Self::with_max_terms(text, MAX_TERMS)
    }

    /// Set of the first `max_terms` significant tokens, in document order.
    /// Repeated tokens use up the budget, so the set may hold fewer terms.
    pub fn with_max_terms(text: &str, max_terms: usize) -> Self {
        let lowered = text.to_lowercase();
        let terms = TERM
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|term| term.chars().count() >= MIN_TERM_CHARS && !STOP_SET.contains(*term))
            .take(max_terms)
            .map(str::to_string)
            .collect();
        Self { terms }
    }

    /// Number of terms shared with `other`.
    pub fn overlap(&self, other: &Fingerprint) -> usize {
        self.terms.intersection(&other.terms).count()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms in sorted order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }
}

/// A text prepared for repeated comparison during reconciliation.
#[derive(Debug, Clone)]
pub(crate) struct MatchKey {
    /// Trimmed, case-folded text; only kept with `fold_exact_repeats`.
    folded: Option<String>,
    fingerprint: Fingerprint,
}

impl MatchKey {
    pub(crate) fn new(text: &str, options: &MergeOptions) -> Self {
        let folded = text.trim().to_lowercase();
        Self {
            folded: (options.fold_exact_repeats && !folded.is_empty()).then_some(folded),
            fingerprint: options.fingerprint(text),
        }
    }

    pub(crate) fn matches(&self, other: &MatchKey, options: &MergeOptions) -> bool {
        let repeat = matches!((&self.folded, &other.folded), (Some(a), Some(b)) if a == b);
        repeat || self.fingerprint.overlap(&other.fingerprint) >= options.similarity_threshold
    }
}

/// Fingerprint of `text` with default options.
pub fn fingerprint(text: &str) -> Fingerprint {
    Fingerprint::of(text)
}

/// Whether `a` and `b` share at least [`SIMILARITY_THRESHOLD`] significant terms.
pub fn similar(a: &str, b: &str) -> bool {
    MergeOptions::default().similar(a, b)
}
