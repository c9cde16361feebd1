//! Consensus driver: N analysis runs at different temperatures, merged.

use bidscreen_consensus::ConsensusMerger;
use bidscreen_core::document::{guess_title_and_date, truncate_for_detail};
use bidscreen_core::{DetailLevel, StructuredReport, extract_raw_text};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::analyzer::{AnalysisError, AnalysisRequest, Analyzer};
use crate::config::ConsensusConfig;

/// Placeholder some models echo back from the response template.
const TEMPLATE_PLACEHOLDER: &str = "string";

/// Document text ready to send, plus the first-page metadata fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedDocument {
    pub text: String,
    pub pages: usize,
    pub truncated: bool,
    pub fallback_title: String,
    pub fallback_date: String,
}

impl PreparedDocument {
    pub fn new<S: AsRef<str>>(pages: &[S], detail: DetailLevel) -> Self {
        let (text, truncated) = truncate_for_detail(&extract_raw_text(pages), detail);
        let (fallback_title, fallback_date) = guess_title_and_date(pages);
        Self {
            text,
            pages: pages.len(),
            truncated,
            fallback_title,
            fallback_date,
        }
    }

    /// Fill a missing (or template-echoed) title and a missing date.
    pub fn apply_fallbacks(&self, report: &mut StructuredReport) {
        let title = report.title.trim();
        if title.is_empty() || title == TEMPLATE_PLACEHOLDER {
            report.title = self.fallback_title.clone();
        }
        if report.date.trim().is_empty() {
            report.date = self.fallback_date.clone();
        }
    }
}

/// A run that produced no report.
#[derive(Debug)]
pub struct RunFailure {
    /// 0-based run index.
    pub run: usize,
    pub temperature: f32,
    pub error: AnalysisError,
}

#[derive(Debug)]
pub struct ConsensusOutcome {
    pub report: StructuredReport,
    pub runs_requested: usize,
    pub runs_succeeded: usize,
    pub failures: Vec<RunFailure>,
}

/// Run one analysis per configured temperature and merge the successes.
///
/// At most `config.parallelism()` runs are in flight. Reports are merged in
/// run order, whatever order they complete in. Failed runs are skipped; the
/// call only fails when no run succeeds.
pub async fn run_consensus<A, S>(
    analyzer: &A,
    pages: &[S],
    config: &ConsensusConfig,
) -> Result<ConsensusOutcome, AnalysisError>
where
    A: Analyzer + ?Sized,
    S: AsRef<str>,
{
    let runs_requested = config.runs();
    if runs_requested == 0 {
        return Err(AnalysisError::NoRuns);
    }

    let document = PreparedDocument::new(pages, config.detail);
    info!(
        runs = runs_requested,
        parallel = config.parallelism(),
        pages = document.pages,
        chars = document.text.chars().count(),
        truncated = document.truncated,
        "starting consensus analysis"
    );

    let requests: Vec<AnalysisRequest> = config
        .temperatures
        .iter()
        .map(|&temperature| AnalysisRequest {
            document_text: document.text.clone(),
            temperature,
            detail: config.detail,
            model: config.model.clone(),
            pages: document.pages,
            truncated: document.truncated,
        })
        .collect();

    let results: Vec<Result<StructuredReport, AnalysisError>> =
        stream::iter(requests.iter().map(|request| analyzer.analyze(request)))
            .buffered(config.parallelism())
            .collect()
            .await;

    let mut reports = Vec::with_capacity(runs_requested);
    let mut failures = Vec::new();
    for (run, (result, request)) in results.into_iter().zip(&requests).enumerate() {
        match result {
            Ok(mut report) => {
                document.apply_fallbacks(&mut report);
                reports.push(report);
            }
            Err(error) => {
                warn!(run, temperature = request.temperature, error = %error, "analysis run failed");
                failures.push(RunFailure {
                    run,
                    temperature: request.temperature,
                    error,
                });
            }
        }
    }

    if reports.is_empty() {
        let last = failures.pop().map(|f| f.error).unwrap_or(AnalysisError::NoRuns);
        return Err(AnalysisError::AllRunsFailed {
            runs: runs_requested,
            last: Box::new(last),
        });
    }

    let runs_succeeded = reports.len();
    let report = ConsensusMerger::new(config.merge).merge(&reports)?;
    info!(
        requested = runs_requested,
        succeeded = runs_succeeded,
        recommendation = %report.verdict.recommendation,
        "consensus analysis complete"
    );

    Ok(ConsensusOutcome {
        report,
        runs_requested,
        runs_succeeded,
        failures,
    })
}
