//! Consensus run configuration and the company risk profile.

use std::path::Path;

use anyhow::Context;
use bidscreen_consensus::MergeOptions;
use bidscreen_core::DetailLevel;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How many runs to issue, how, and how to merge them.
///
/// N = `temperatures.len()`. Every field defaults, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub temperatures: Vec<f32>,
    /// Runs in flight at once; clamped to `1..=N`.
    pub max_parallel: usize,
    pub detail: DetailLevel,
    pub model: String,
    pub merge: MergeOptions,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            temperatures: vec![0.1, 0.4, 0.7],
            max_parallel: 3,
            detail: DetailLevel::Medium,
            model: "gpt-4o".into(),
            merge: MergeOptions::default(),
        }
    }
}

impl ConsensusConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn runs(&self) -> usize {
        self.temperatures.len()
    }

    /// `max_parallel` clamped to `1..=runs`.
    pub fn parallelism(&self) -> usize {
        self.max_parallel.clamp(1, self.runs().max(1))
    }

    /// Replace the temperature schedule with `runs` evenly spaced values
    /// from 0.1 to 0.7. A single run uses 0.1.
    pub fn with_runs(mut self, runs: usize) -> Self {
        self.temperatures = match runs {
            0 => Vec::new(),
            1 => vec![0.1],
            n => (0..n)
                .map(|i| {
                    let t = 0.1 + 0.6 * i as f32 / (n - 1) as f32;
                    (t * 100.0).round() / 100.0
                })
                .collect(),
        };
        self
    }
}

/// Company profile and risk register fed into the system prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskProfile {
    pub company_profile: CompanyProfile,
    /// Free-form register of risk factors, embedded verbatim as JSON.
    pub risk_register: Value,
    /// Free-form guidance per tender type (bundle, unbundle, ...).
    pub tender_type_guidance: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyProfile {
    pub name: String,
    pub business_description: String,
    pub products: Vec<String>,
    /// Kept as JSON: profiles write either a number or a range like "6-9".
    pub typical_delivery_months: Value,
    pub geographic_coverage: Vec<String>,
    pub languages: Vec<String>,
}

impl RiskProfile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read risk profile {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse risk profile {}", path.display()))
    }
}
