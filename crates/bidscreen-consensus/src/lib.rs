//! Consensus merge engine.
//!
//! Reconciles N independently generated [`StructuredReport`]s of the same
//! tender document (one per sampling temperature) into a single report:
//!
//! - [`fingerprint`]: significant-word fingerprints and lexical similarity
//! - [`reconcile`]: deduplicate and rank list fields across runs
//! - [`verdict`]: majority scalars and the Go/No-Go verdict with NO_GO override
//! - [`assemble`]: drive the above over every report field
//!
//! All functions are pure: no I/O, no clock, no shared state. Output depends
//! only on the ordered input list.
//!
//! [`StructuredReport`]: bidscreen_core::StructuredReport

pub mod assemble;
mod error;
pub mod fingerprint;
pub mod reconcile;
pub mod verdict;

pub use assemble::{ConsensusMerger, FINDING_MIN_SUPPORT, merge, merge_usage};
pub use error::MergeError;
pub use fingerprint::{
    Fingerprint, MAX_TERMS, MergeOptions, SIMILARITY_THRESHOLD, fingerprint, similar,
};
pub use reconcile::{
    DEFAULT_MIN_SUPPORT, Finding, MergeGroup, merge_records, merge_strings, reconcile_records,
    reconcile_strings,
};
pub use verdict::{majority_scalar, merge_verdict};
