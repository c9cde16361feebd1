//! Token usage and cost accounting for analysis runs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::lenient;

/// Token usage, cost, and provenance of a report.
///
/// A single-run report has `run_count == 1`; a merged report carries the
/// summed usage of every run it was reconciled from. Every report stands for
/// at least one run, so a missing or zero `run_count` decodes as 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", default)]
pub struct UsageMeta {
    #[serde(deserialize_with = "lenient::text")]
    pub model: String,
    #[serde(deserialize_with = "lenient::count")]
    pub prompt_tokens: u64,
    #[serde(deserialize_with = "lenient::count")]
    pub completion_tokens: u64,
    #[serde(deserialize_with = "lenient::count")]
    pub total_tokens: u64,
    /// USD. `estimated_cost_usd` is accepted as an alias.
    #[serde(deserialize_with = "lenient::amount")]
    pub estimated_cost: f64,
    #[serde(deserialize_with = "lenient::size")]
    pub run_count: usize,
    #[serde(deserialize_with = "lenient::text")]
    pub detail_level: String,
    #[serde(deserialize_with = "lenient::size")]
    pub pages_analyzed: usize,
    #[serde(deserialize_with = "lenient::size")]
    pub chars_analyzed: usize,
    #[serde(deserialize_with = "lenient::flag")]
    pub truncated: bool,
}

impl Default for UsageMeta {
    fn default() -> Self {
        Self {
            model: String::new(),
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            estimated_cost: 0.0,
            run_count: 1,
            detail_level: String::new(),
            pages_analyzed: 0,
            chars_analyzed: 0,
            truncated: false,
        }
    }
}

impl Serialize for UsageMeta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        UsageMeta::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for UsageMeta {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let fields = lenient::canonical_object(de, &[("estimated_cost_usd", "estimated_cost")])?;
        let mut meta = UsageMeta::deserialize(fields).map_err(serde::de::Error::custom)?;
        meta.run_count = meta.run_count.max(1);
        Ok(meta)
    }
}

/// Per-million-token prices in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for Pricing {
    /// gpt-4o list prices.
    fn default() -> Self {
        Self {
            input_per_million: 2.50,
            output_per_million: 10.00,
        }
    }
}

/// Estimated USD cost of one call, rounded to 4 decimals.
pub fn estimate_cost(prompt_tokens: u64, completion_tokens: u64, pricing: &Pricing) -> f64 {
    let raw = prompt_tokens as f64 * pricing.input_per_million / 1_000_000.0
        + completion_tokens as f64 * pricing.output_per_million / 1_000_000.0;
    (raw * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_uses_default_pricing() {
        // 100k in at 2.50/M + 10k out at 10.00/M = 0.25 + 0.10
        let cost = estimate_cost(100_000, 10_000, &Pricing::default());
        assert!((cost - 0.35).abs() < 1e-9);
    }

    #[test]
    fn cost_rounds_to_four_decimals() {
        let cost = estimate_cost(1, 1, &Pricing::default());
        assert_eq!(cost, 0.0);
        let cost = estimate_cost(12_345, 678, &Pricing::default());
        assert_eq!(cost, 0.0376);
    }

    #[test]
    fn legacy_meta_keys_decode() {
        let meta: UsageMeta = serde_json::from_str(
            r#"{"model": "gpt-4o", "prompt_tokens": 10, "completion_tokens": 5,
                "total_tokens": 15, "estimated_cost_usd": 0.0001,
                "detail_level": "High", "pages_analyzed": 12, "truncated": false}"#,
        )
        .unwrap();
        assert_eq!(meta.total_tokens, 15);
        assert_eq!(meta.estimated_cost, 0.0001);
        assert_eq!(meta.detail_level, "High");
        assert_eq!(meta.pages_analyzed, 12);
        assert_eq!(meta.run_count, 1);
    }

    #[test]
    fn run_count_is_at_least_one() {
        let zero: UsageMeta = serde_json::from_str(r#"{"run_count": 0}"#).unwrap();
        assert_eq!(zero.run_count, 1);
        let three: UsageMeta = serde_json::from_str(r#"{"run_count": 3}"#).unwrap();
        assert_eq!(three.run_count, 3);
        assert_eq!(UsageMeta::default().run_count, 1);
    }

    #[test]
    fn both_cost_keys_keep_the_canonical_one() {
        let meta: UsageMeta =
            serde_json::from_str(r#"{"estimated_cost": 0.5, "estimated_cost_usd": 0.25}"#)
                .unwrap();
        assert_eq!(meta.estimated_cost, 0.5);
    }
}
