//! The analysis-run seam: one model call over one document at one temperature.

use async_trait::async_trait;
use bidscreen_consensus::MergeError;
use bidscreen_core::{DetailLevel, StructuredReport};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model returned no content")]
    EmptyResponse,
    #[error("document too large for the model context after {attempts} attempts")]
    ContextTooLarge { attempts: u32 },
    #[error("API key not set (OPENAI_API_KEY)")]
    MissingApiKey,
    #[error("no analysis runs configured")]
    NoRuns,
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("all {runs} analysis runs failed; last error: {last}")]
    AllRunsFailed {
        runs: usize,
        #[source]
        last: Box<AnalysisError>,
    },
}

impl AnalysisError {
    /// Whether the same request may succeed if sent again later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Server { status, .. } => *status == 429 || *status >= 500,
            #[cfg(feature = "http")]
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Input to a single analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Prepared document text (page markers, already truncated for `detail`).
    pub document_text: String,
    pub temperature: f32,
    pub detail: DetailLevel,
    pub model: String,
    pub pages: usize,
    /// Whether `document_text` was cut to fit the detail budget.
    pub truncated: bool,
}

/// Produces one structured report per call.
///
/// Implementations fill `usage_meta` for the run they perform, with
/// `run_count = 1`.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<StructuredReport, AnalysisError>;
}
