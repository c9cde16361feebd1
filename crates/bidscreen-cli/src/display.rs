//! Terminal report card for a screening report.
//!
//! Renders a [`StructuredReport`] as grouped, human-readable sections.
//! Sections with nothing to show are skipped.

use std::fmt;

use bidscreen_core::{MetadataField, StructuredReport};

const MAX_LIST_ITEMS: usize = 10;

// ── Section groupings ──

const TENDER: &[MetadataField] = &[
    MetadataField::Reference,
    MetadataField::Date,
    MetadataField::Authority,
    MetadataField::City,
    MetadataField::Country,
    MetadataField::TenderType,
    MetadataField::EstimatedValue,
    MetadataField::Deadline,
];

// ── Public API ──

/// Print the report card to stderr, keeping stdout free for JSON.
pub fn print_report_card(report: &StructuredReport) {
    eprint!("{}", render_report_card(report));
}

pub fn render_report_card(report: &StructuredReport) -> String {
    let mut card = Card::default();

    let title = if report.title.is_empty() {
        "(untitled tender)"
    } else {
        report.title.as_str()
    };
    card.line(format_args!("=== {title} ==="));
    card.blank();

    tender_section(&mut card, report);
    verdict_section(&mut card, report);
    card.list("Summary", &report.summary_points);
    showstopper_section(&mut card, report);
    risk_section(&mut card, report);
    requirement_section(&mut card, report);
    domain_section(&mut card, report);
    card.list("Deliverables", &report.deliverables);
    card.list("Open Questions", &report.open_questions);
    deadline_section(&mut card, report);
    usage_section(&mut card, report);

    card.out
}

// ── Section rendering ──

#[derive(Default)]
struct Card {
    out: String,
}

impl Card {
    fn line(&mut self, text: impl fmt::Display) {
        self.out.push_str(&text.to_string());
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn field(&mut self, label: &str, value: impl fmt::Display) {
        self.line(format_args!("  {label:<18} {value}"));
    }

    /// Bulleted list, capped at [`MAX_LIST_ITEMS`].
    fn bullets(&mut self, indent: &str, items: &[String]) {
        for item in items.iter().take(MAX_LIST_ITEMS) {
            self.line(format_args!("{indent}- {item}"));
        }
        if items.len() > MAX_LIST_ITEMS {
            self.line(format_args!(
                "{indent}  ... and {} more",
                items.len() - MAX_LIST_ITEMS
            ));
        }
    }

    fn list(&mut self, header: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        self.line(header);
        self.bullets("  ", items);
        self.blank();
    }
}

fn tender_section(card: &mut Card, report: &StructuredReport) {
    let has_data = TENDER.iter().any(|&f| !report.metadata(f).is_empty());
    if !has_data {
        return;
    }
    card.line("Tender");
    for &field in TENDER {
        let value = report.metadata(field);
        if !value.is_empty() {
            card.field(field.as_str(), value);
        }
    }
    card.blank();
}

fn verdict_section(card: &mut Card, report: &StructuredReport) {
    let verdict = &report.verdict;
    card.line("Verdict");
    card.field("recommendation", verdict.recommendation);
    card.field("score", format_args!("{}/100", verdict.score));
    if !verdict.rationale.is_empty() {
        card.field("rationale", &verdict.rationale);
    }
    card.blank();
}

fn showstopper_section(card: &mut Card, report: &StructuredReport) {
    let items = &report.showstoppers;
    if items.is_empty() {
        return;
    }
    card.line(format_args!("Showstoppers ({})", items.len()));
    for s in items {
        card.line(format_args!("  [{}] {}", or_dash(&s.id), s.description));
        if !s.evidence.is_empty() || !s.document_ref.is_empty() {
            card.line(format_args!("      evidence: {}", evidence(&s.evidence, &s.document_ref)));
        }
        if !s.impact.is_empty() {
            card.line(format_args!("      impact: {}", s.impact));
        }
    }
    card.blank();
}

fn risk_section(card: &mut Card, report: &StructuredReport) {
    let items = &report.risks;
    if items.is_empty() {
        return;
    }
    card.line(format_args!("Risks ({})", items.len()));
    for r in items.iter().take(MAX_LIST_ITEMS) {
        card.line(format_args!(
            "  [{:<6} {:>3}] {}",
            r.level.as_str(),
            r.score,
            r.risk_text
        ));
        if !r.category.is_empty() {
            card.line(format_args!("      category: {}", r.category));
        }
        if !r.mitigation.is_empty() {
            card.line(format_args!("      mitigation: {}", r.mitigation));
        }
    }
    if items.len() > MAX_LIST_ITEMS {
        card.line(format_args!("  ... and {} more", items.len() - MAX_LIST_ITEMS));
    }
    card.blank();
}

fn requirement_section(card: &mut Card, report: &StructuredReport) {
    let categories: Vec<_> = report
        .requirement_categories
        .iter()
        .filter(|(_, items)| !items.is_empty())
        .collect();
    if categories.is_empty() {
        return;
    }
    card.line("Requirements");
    for (category, items) in categories {
        card.line(format_args!("  {} ({}):", category, items.len()));
        card.bullets("    ", items);
    }
    card.blank();
}

fn domain_section(card: &mut Card, report: &StructuredReport) {
    let domains: Vec<_> = report
        .domain_sections
        .iter()
        .filter(|(_, s)| !s.summary.is_empty() || !s.key_points.is_empty())
        .collect();
    if domains.is_empty() {
        return;
    }
    card.line("Domains");
    for (domain, section) in domains {
        card.line(format_args!("  {}", domain.label()));
        if !section.summary.is_empty() {
            card.line(format_args!("    {}", section.summary));
        }
        card.bullets("    ", &section.key_points);
    }
    card.blank();
}

fn deadline_section(card: &mut Card, report: &StructuredReport) {
    let items = &report.deadlines;
    if items.is_empty() {
        return;
    }
    card.line("Deadlines");
    for d in items {
        card.field(&d.milestone, or_dash(&d.when));
    }
    card.blank();
}

fn usage_section(card: &mut Card, report: &StructuredReport) {
    let usage = &report.usage_meta;
    if usage.model.is_empty() && usage.total_tokens == 0 {
        return;
    }
    card.line("Usage");
    if !usage.model.is_empty() {
        card.field("model", &usage.model);
    }
    card.field("runs", usage.run_count);
    card.field(
        "tokens",
        format_args!(
            "{} ({} in / {} out)",
            usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
        ),
    );
    card.field("cost", format_args!("${:.4}", usage.estimated_cost));
    if !usage.detail_level.is_empty() {
        card.field("detail", &usage.detail_level);
    }
    if usage.pages_analyzed > 0 {
        card.field(
            "analyzed",
            format_args!(
                "{} pages, {} chars{}",
                usage.pages_analyzed,
                usage.chars_analyzed,
                if usage.truncated { " (truncated)" } else { "" }
            ),
        );
    }
}

// ── Helpers ──

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn evidence(quote: &str, document_ref: &str) -> String {
    match (quote.is_empty(), document_ref.is_empty()) {
        (false, false) => format!("{quote} ({document_ref})"),
        (false, true) => quote.to_string(),
        _ => document_ref.to_string(),
    }
}
