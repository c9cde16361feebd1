use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    /// No analysis run completed; merging nothing is a caller bug.
    #[error("no reports to merge")]
    NoReports,
}
