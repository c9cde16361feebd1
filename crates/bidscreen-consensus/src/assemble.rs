//! Report assembly: drive the reconcilers over every field of the report.

use bidscreen_core::{Domain, DomainSections, MetadataField, Risk, StructuredReport, UsageMeta};
use indexmap::IndexSet;
use tracing::{debug, info};

use crate::MergeError;
use crate::fingerprint::MergeOptions;
use crate::reconcile::{DEFAULT_MIN_SUPPORT, Finding, reconcile_records, reconcile_strings};
use crate::verdict::{majority_scalar, merge_verdict};

/// Minimum support for showstoppers, risks and deadlines: a finding reported
/// by any single run is kept. Omitting a real negative finding is the
/// costlier error for a screening report.
pub const FINDING_MIN_SUPPORT: usize = 1;

/// Merges N reports of the same document into one consensus report.
#[derive(Debug, Clone, Default)]
pub struct ConsensusMerger {
    options: MergeOptions,
}

impl ConsensusMerger {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merge `reports`, given in run order.
    ///
    /// A single report is returned unchanged. The output always has the same
    /// shape as an input report, with `usage_meta.run_count == reports.len()`.
    /// Only an empty input is an error.
    pub fn merge(&self, reports: &[StructuredReport]) -> Result<StructuredReport, MergeError> {
        match reports {
            [] => Err(MergeError::NoReports),
            [single] => Ok(single.clone()),
            _ => Ok(self.merge_many(reports)),
        }
    }

    fn merge_many(&self, reports: &[StructuredReport]) -> StructuredReport {
        let mut merged = StructuredReport::default();

        for field in MetadataField::ALL {
            *merged.metadata_mut(field) =
                majority_scalar(reports.iter().map(|r| r.metadata(field)));
        }

        merged.verdict = merge_verdict(reports.iter().map(|r| &r.verdict));

        merged.summary_points = self.strings(reports, |r| r.summary_points.as_slice());
        merged.deliverables = self.strings(reports, |r| r.deliverables.as_slice());
        merged.open_questions = self.strings(reports, |r| r.open_questions.as_slice());

        // Showstoppers, risks and deadlines keep single-run findings
        // (FINDING_MIN_SUPPORT). Risks are then ordered by severity, not support.
        merged.showstoppers = self.findings(reports, |r| &r.showstoppers);
        merged.risks = self.findings(reports, |r| &r.risks);
        sort_by_severity(&mut merged.risks);
        merged.deadlines = self.findings(reports, |r| &r.deadlines);

        // Key union in first-seen order across runs.
        let categories: IndexSet<&String> = reports
            .iter()
            .flat_map(|r| r.requirement_categories.keys())
            .collect();
        for category in categories {
            let items = self.strings(reports, |r| {
                r.requirement_categories
                    .get(category)
                    .map(Vec::as_slice)
                    .unwrap_or(&[])
            });
            merged.requirement_categories.insert(category.clone(), items);
        }

        merged.domain_sections = self.domains(reports);
        merged.usage_meta = merge_usage(reports);

        info!(
            runs = reports.len(),
            showstoppers = merged.showstoppers.len(),
            risks = merged.risks.len(),
            recommendation = %merged.verdict.recommendation,
            score = merged.verdict.score,
            "merged reports"
        );
        merged
    }

    fn strings<'a, F>(&self, reports: &'a [StructuredReport], field: F) -> Vec<String>
    where
        F: Fn(&'a StructuredReport) -> &'a [String],
    {
        let lists: Vec<&[String]> = reports.iter().map(field).collect();
        reconcile_strings(&lists, &self.options, DEFAULT_MIN_SUPPORT)
            .into_iter()
            .map(|g| g.canonical)
            .collect()
    }

    fn findings<'a, T, F>(&self, reports: &'a [StructuredReport], field: F) -> Vec<T>
    where
        T: Finding + 'a,
        F: Fn(&'a StructuredReport) -> &'a Vec<T>,
    {
        let lists: Vec<&[T]> = reports.iter().map(|r| field(r).as_slice()).collect();
        reconcile_records(&lists, &self.options, FINDING_MIN_SUPPORT)
            .into_iter()
            .map(|g| g.canonical)
            .collect()
    }

    /// Longest summary per domain; key points reconciled like any string list.
    fn domains(&self, reports: &[StructuredReport]) -> DomainSections {
        let mut sections = DomainSections::default();
        for domain in Domain::ALL {
            let section = sections.get_mut(domain);
            section.summary = longest(
                reports
                    .iter()
                    .map(|r| r.domain_sections.get(domain).summary.as_str()),
            );
            section.key_points = self.strings(reports, |r| {
                r.domain_sections.get(domain).key_points.as_slice()
            });
            debug!(domain = domain.key(), points = section.key_points.len(), "merged domain");
        }
        sections
    }
}

/// Merge `reports` with default [`MergeOptions`].
pub fn merge(reports: &[StructuredReport]) -> Result<StructuredReport, MergeError> {
    ConsensusMerger::default().merge(reports)
}

/// Additive usage: every run's tokens and cost are real spend.
///
/// `model` and `detail_level` come from the last run; page and character
/// counts take the maximum; `truncated` is set if any run was truncated.
pub fn merge_usage(reports: &[StructuredReport]) -> UsageMeta {
    let metas = reports.iter().map(|r| &r.usage_meta);
    let last = reports.last().map(|r| &r.usage_meta);
    UsageMeta {
        model: last.map(|m| m.model.clone()).unwrap_or_default(),
        prompt_tokens: metas.clone().map(|m| m.prompt_tokens).sum(),
        completion_tokens: metas.clone().map(|m| m.completion_tokens).sum(),
        total_tokens: metas.clone().map(|m| m.total_tokens).sum(),
        estimated_cost: metas.clone().map(|m| m.estimated_cost).sum(),
        run_count: reports.len(),
        detail_level: last.map(|m| m.detail_level.clone()).unwrap_or_default(),
        pages_analyzed: metas.clone().map(|m| m.pages_analyzed).max().unwrap_or(0),
        chars_analyzed: metas.clone().map(|m| m.chars_analyzed).max().unwrap_or(0),
        truncated: metas.clone().any(|m| m.truncated),
    }
}

/// Stable sort, highest score first.
fn sort_by_severity(risks: &mut [Risk]) {
    risks.sort_by(|a, b| b.score.cmp(&a.score));
}

/// Longest string by characters; the first one wins ties.
fn longest<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let mut best = "";
    for value in values {
        if value.chars().count() > best.chars().count() {
            best = value;
        }
    }
    best.to_string()
}
