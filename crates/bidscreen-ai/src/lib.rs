//! Analysis runs for tender screening: prompt construction, the [`Analyzer`]
//! seam, and the consensus driver that issues N runs and merges them.
//!
//! Enable the `http` feature for [`OpenAiAnalyzer`], an OpenAI-compatible
//! chat-completions client.

mod analyzer;
pub mod config;
pub mod consensus;
#[cfg(feature = "http")]
mod openai;
pub mod prompt;

pub use analyzer::{AnalysisError, AnalysisRequest, Analyzer};
pub use config::{CompanyProfile, ConsensusConfig, RiskProfile};
pub use consensus::{ConsensusOutcome, PreparedDocument, RunFailure, run_consensus};
#[cfg(feature = "http")]
pub use openai::{DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, OpenAiAnalyzer};
