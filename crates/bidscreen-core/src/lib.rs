//! Core types for Bidscreen: the structured screening report, its permissive
//! JSON decoding, usage accounting, and document text preparation.

pub mod document;
pub mod lenient;
pub mod report;
pub mod usage;

pub use document::{DetailLevel, chunk_pages, extract_raw_text, guess_title_and_date};
pub use report::{
    Deadline, Domain, DomainSection, DomainSections, MetadataField, Recommendation, Risk,
    RiskLevel, Showstopper, StructuredReport, Verdict,
};
pub use usage::{Pricing, UsageMeta, estimate_cost};
