//! Structured pre-bid screening report, as produced by one analysis run.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::lenient;
use crate::usage::UsageMeta;

/// One structured screening report.
///
/// Every field decodes permissively: a missing or malformed field becomes its
/// empty value, so a partially broken model response still yields a report.
/// The key names used in the provider prompt are accepted as aliases
/// ([`REPORT_ALIASES`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", default)]
pub struct StructuredReport {
    #[serde(deserialize_with = "lenient::text")]
    pub title: String,
    #[serde(deserialize_with = "lenient::text")]
    pub date: String,
    #[serde(deserialize_with = "lenient::text")]
    pub reference: String,
    #[serde(deserialize_with = "lenient::text")]
    pub authority: String,
    #[serde(deserialize_with = "lenient::text")]
    pub city: String,
    #[serde(deserialize_with = "lenient::text")]
    pub country: String,
    #[serde(deserialize_with = "lenient::text")]
    pub tender_type: String,
    #[serde(deserialize_with = "lenient::text")]
    pub estimated_value: String,
    #[serde(deserialize_with = "lenient::text")]
    pub deadline: String,

    #[serde(deserialize_with = "lenient::value")]
    pub verdict: Verdict,

    /// Earlier points are more significant.
    #[serde(deserialize_with = "lenient::strings")]
    pub summary_points: Vec<String>,
    #[serde(deserialize_with = "lenient::records")]
    pub showstoppers: Vec<Showstopper>,
    #[serde(deserialize_with = "lenient::records")]
    pub risks: Vec<Risk>,
    /// Open key set, in first-seen order: a run may introduce categories no
    /// other run mentions.
    #[serde(deserialize_with = "lenient::categories")]
    pub requirement_categories: IndexMap<String, Vec<String>>,
    #[serde(deserialize_with = "lenient::strings")]
    pub deliverables: Vec<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub open_questions: Vec<String>,
    #[serde(deserialize_with = "lenient::records")]
    pub deadlines: Vec<Deadline>,
    #[serde(deserialize_with = "lenient::value")]
    pub domain_sections: DomainSections,

    #[serde(deserialize_with = "lenient::value")]
    pub usage_meta: UsageMeta,
}

/// `(alias, canonical)` report keys. When both are present the canonical
/// key wins.
pub const REPORT_ALIASES: &[(&str, &str)] = &[
    ("tender_title", "title"),
    ("tender_date", "date"),
    ("tender_reference", "reference"),
    ("contracting_authority", "authority"),
    ("estimated_value_eur", "estimated_value"),
    ("submission_deadline", "deadline"),
    ("go_nogo", "verdict"),
    ("executive_summary", "summary_points"),
    ("requirements", "requirement_categories"),
    ("_meta", "usage_meta"),
];

impl Serialize for StructuredReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        StructuredReport::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for StructuredReport {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let fields = lenient::canonical_object(de, REPORT_ALIASES)?;
        StructuredReport::deserialize(fields).map_err(serde::de::Error::custom)
    }
}

impl StructuredReport {
    /// Decode a report from JSON text. Fails only if the text is not a JSON object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read one of the nine scalar metadata fields.
    pub fn metadata(&self, field: MetadataField) -> &str {
        match field {
            MetadataField::Title => &self.title,
            MetadataField::Date => &self.date,
            MetadataField::Reference => &self.reference,
            MetadataField::Authority => &self.authority,
            MetadataField::City => &self.city,
            MetadataField::Country => &self.country,
            MetadataField::TenderType => &self.tender_type,
            MetadataField::EstimatedValue => &self.estimated_value,
            MetadataField::Deadline => &self.deadline,
        }
    }

    /// Mutable access to one of the nine scalar metadata fields.
    pub fn metadata_mut(&mut self, field: MetadataField) -> &mut String {
        match field {
            MetadataField::Title => &mut self.title,
            MetadataField::Date => &mut self.date,
            MetadataField::Reference => &mut self.reference,
            MetadataField::Authority => &mut self.authority,
            MetadataField::City => &mut self.city,
            MetadataField::Country => &mut self.country,
            MetadataField::TenderType => &mut self.tender_type,
            MetadataField::EstimatedValue => &mut self.estimated_value,
            MetadataField::Deadline => &mut self.deadline,
        }
    }
}

/// The scalar metadata fields of a [`StructuredReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Title,
    Date,
    Reference,
    Authority,
    City,
    Country,
    TenderType,
    EstimatedValue,
    Deadline,
}

impl MetadataField {
    pub const ALL: [MetadataField; 9] = [
        Self::Title,
        Self::Date,
        Self::Reference,
        Self::Authority,
        Self::City,
        Self::Country,
        Self::TenderType,
        Self::EstimatedValue,
        Self::Deadline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Date => "date",
            Self::Reference => "reference",
            Self::Authority => "authority",
            Self::City => "city",
            Self::Country => "country",
            Self::TenderType => "tender_type",
            Self::EstimatedValue => "estimated_value",
            Self::Deadline => "deadline",
        }
    }
}

// ── Verdict ──

/// Go/No-Go screening outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Recommendation {
    Go,
    /// Also the decoded value for a missing or unrecognised recommendation.
    #[default]
    GoWithMitigation,
    NoGo,
}

impl Recommendation {
    pub const ALL: [Recommendation; 3] = [Self::Go, Self::GoWithMitigation, Self::NoGo];

    /// Read a model-written recommendation. Text that does not parse but
    /// still mentions NO-GO (`"NO-GO (showstopper)"`) is [`Self::NoGo`];
    /// anything else unrecognised is [`Self::GoWithMitigation`].
    pub fn from_loose(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| {
            let upper = s.to_ascii_uppercase();
            let words: Vec<&str> = upper
                .split(|c: char| !c.is_ascii_alphanumeric())
                .filter(|w| !w.is_empty())
                .collect();
            if words.contains(&"NOGO") || words.windows(2).any(|w| w == ["NO", "GO"]) {
                Self::NoGo
            } else {
                Self::default()
            }
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Go => "GO",
            Self::GoWithMitigation => "GO_WITH_MITIGATION",
            Self::NoGo => "NO_GO",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a string that names no [`Recommendation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRecommendation(pub String);

impl fmt::Display for UnknownRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown recommendation: {:?}", self.0)
    }
}

impl std::error::Error for UnknownRecommendation {}

impl FromStr for Recommendation {
    type Err = UnknownRecommendation;

    /// Case-insensitive; spaces and hyphens count as underscores, so
    /// `"GO with Mitigation"` and `"NO-GO"` both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "GO" => Ok(Self::Go),
            "GO_WITH_MITIGATION" | "GO_WITH_MITIGATIONS" => Ok(Self::GoWithMitigation),
            "NO_GO" | "NOGO" => Ok(Self::NoGo),
            _ => Err(UnknownRecommendation(s.to_string())),
        }
    }
}

/// Upper-case with spaces and hyphens as underscores.
fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

impl Serialize for Recommendation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Recommendation {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(de)?;
        Ok(Self::from_loose(&lenient::text_of(&raw)))
    }
}

/// The Go/No-Go verdict of one report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Verdict {
    pub recommendation: Recommendation,
    /// Overall complexity, 0..=100.
    #[serde(deserialize_with = "lenient::score")]
    pub score: u32,
    #[serde(deserialize_with = "lenient::text")]
    pub rationale: String,
}

// ── Findings ──

/// A condition that disqualifies the bid on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Showstopper {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::text")]
    pub evidence: String,
    #[serde(deserialize_with = "lenient::text")]
    pub document_ref: String,
    #[serde(deserialize_with = "lenient::text")]
    pub impact: String,
}

/// Qualitative severity band of a [`Risk`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RiskLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let raw = lenient::text_of(&Value::deserialize(de)?);
        Ok(match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        })
    }
}

/// A scored risk finding. `risk` is accepted for `risk_text`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", default)]
pub struct Risk {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub risk_text: String,
    #[serde(deserialize_with = "lenient::text")]
    pub category: String,
    pub level: RiskLevel,
    /// Severity, 0..=100.
    #[serde(deserialize_with = "lenient::score")]
    pub score: u32,
    #[serde(deserialize_with = "lenient::text")]
    pub document_ref: String,
    #[serde(deserialize_with = "lenient::text")]
    pub evidence: String,
    #[serde(deserialize_with = "lenient::text")]
    pub mitigation: String,
}

impl Serialize for Risk {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Risk::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for Risk {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let fields = lenient::canonical_object(de, &[("risk", "risk_text")])?;
        Risk::deserialize(fields).map_err(serde::de::Error::custom)
    }
}

/// A dated milestone extracted from the tender.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deadline {
    #[serde(deserialize_with = "lenient::text")]
    pub milestone: String,
    #[serde(deserialize_with = "lenient::text")]
    pub when: String,
    #[serde(deserialize_with = "lenient::text")]
    pub evidence: String,
}

// ── Domain sections ──

/// Narrative summary and key points for one analysis domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainSection {
    #[serde(deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(deserialize_with = "lenient::strings")]
    pub key_points: Vec<String>,
}

/// The fixed analysis domains of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Technical,
    Commercial,
    LegalCompliance,
    LogisticsFacility,
    ItConnectivity,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Self::Technical,
        Self::Commercial,
        Self::LegalCompliance,
        Self::LogisticsFacility,
        Self::ItConnectivity,
    ];

    /// JSON key of this domain inside `domain_sections`.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Commercial => "commercial",
            Self::LegalCompliance => "legal_compliance",
            Self::LogisticsFacility => "logistics_facility",
            Self::ItConnectivity => "it_connectivity",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Technical => "Technical",
            Self::Commercial => "Commercial",
            Self::LegalCompliance => "Legal & Compliance",
            Self::LogisticsFacility => "Logistics & Facility",
            Self::ItConnectivity => "IT & Connectivity",
        }
    }
}

/// One [`DomainSection`] per [`Domain`]; all five are always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainSections {
    #[serde(deserialize_with = "lenient::value")]
    pub technical: DomainSection,
    #[serde(deserialize_with = "lenient::value")]
    pub commercial: DomainSection,
    #[serde(deserialize_with = "lenient::value")]
    pub legal_compliance: DomainSection,
    #[serde(deserialize_with = "lenient::value")]
    pub logistics_facility: DomainSection,
    #[serde(deserialize_with = "lenient::value")]
    pub it_connectivity: DomainSection,
}

impl DomainSections {
    pub fn get(&self, domain: Domain) -> &DomainSection {
        match domain {
            Domain::Technical => &self.technical,
            Domain::Commercial => &self.commercial,
            Domain::LegalCompliance => &self.legal_compliance,
            Domain::LogisticsFacility => &self.logistics_facility,
            Domain::ItConnectivity => &self.it_connectivity,
        }
    }

    pub fn get_mut(&mut self, domain: Domain) -> &mut DomainSection {
        match domain {
            Domain::Technical => &mut self.technical,
            Domain::Commercial => &mut self.commercial,
            Domain::LegalCompliance => &mut self.legal_compliance,
            Domain::LogisticsFacility => &mut self.logistics_facility,
            Domain::ItConnectivity => &mut self.it_connectivity,
        }
    }

    /// Iterate `(domain, section)` pairs in [`Domain::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Domain, &DomainSection)> {
        Domain::ALL.into_iter().map(move |d| (d, self.get(d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_provider_prompt_keys() {
        let json = r#"{
            "tender_title": "Lab automation for Ospedale San Marco",
            "contracting_authority": "ASL Roma 1",
            "estimated_value_eur": 2400000,
            "executive_summary": ["Turnkey lab line", "Seven-year service"],
            "go_nogo": {"recommendation": "GO with Mitigation", "score": 61, "rationale": "Tight schedule"},
            "risks": [{"id": "R1", "risk": "Penalty clauses uncapped", "category": "commercial", "score": 70}],
            "requirements": {"space_and_facility": ["Floor load 500 kg/m2"]},
            "_meta": {"model": "gpt-4o", "total_tokens": 9000, "estimated_cost_usd": 0.041}
        }"#;
        let report = StructuredReport::from_json(json).unwrap();
        assert_eq!(report.title, "Lab automation for Ospedale San Marco");
        assert_eq!(report.authority, "ASL Roma 1");
        assert_eq!(report.estimated_value, "2400000");
        assert_eq!(report.summary_points.len(), 2);
        assert_eq!(report.verdict.recommendation, Recommendation::GoWithMitigation);
        assert_eq!(report.verdict.score, 61);
        assert_eq!(report.risks[0].risk_text, "Penalty clauses uncapped");
        assert_eq!(report.risks[0].level, RiskLevel::Medium);
        assert_eq!(
            report.requirement_categories["space_and_facility"],
            vec!["Floor load 500 kg/m2"]
        );
        assert_eq!(report.usage_meta.total_tokens, 9000);
        assert_eq!(report.usage_meta.model, "gpt-4o");
    }

    #[test]
    fn structurally_incomplete_report_decodes() {
        let json = r#"{
            "title": "Partial",
            "verdict": "NO-GO",
            "showstoppers": "none",
            "risks": [{"risk_text": "ok"}, 42, null],
            "deadlines": null,
            "domain_sections": {"technical": {"summary": "fine", "key_points": "single"}}
        }"#;
        let report = StructuredReport::from_json(json).unwrap();
        assert_eq!(report.title, "Partial");
        // A bare string is not a verdict object.
        assert_eq!(report.verdict, Verdict::default());
        assert!(report.showstoppers.is_empty());
        assert_eq!(report.risks.len(), 1);
        assert!(report.deadlines.is_empty());
        assert_eq!(report.domain_sections.technical.key_points, vec!["single"]);
        assert_eq!(report.domain_sections.commercial, DomainSection::default());
    }

    #[test]
    fn canonical_and_alias_keys_together_decode() {
        let report = StructuredReport::from_json(
            r#"{
                "title": "Canonical",
                "tender_title": "Alias",
                "date": null,
                "tender_date": "2025-03-01",
                "risks": [{"risk": "short", "risk_text": "Uncapped penalty clauses", "score": 60}]
            }"#,
        )
        .unwrap();
        assert_eq!(report.title, "Canonical");
        assert_eq!(report.date, "2025-03-01");
        assert_eq!(report.risks.len(), 1);
        assert_eq!(report.risks[0].risk_text, "Uncapped penalty clauses");
    }

    #[test]
    fn categories_keep_model_order() {
        let report = StructuredReport::from_json(
            r#"{"requirements": {"space_and_facility": ["a"], "analyzer_connectivity": ["b"], "commercial_conditions": ["c"]}}"#,
        )
        .unwrap();
        let keys: Vec<&str> = report.requirement_categories.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["space_and_facility", "analyzer_connectivity", "commercial_conditions"]
        );
    }

    #[test]
    fn not_an_object_is_an_error() {
        assert!(StructuredReport::from_json("[1, 2]").is_err());
        assert!(StructuredReport::from_json("not json").is_err());
    }

    #[test]
    fn recommendation_parses_loosely() {
        assert_eq!("GO".parse::<Recommendation>(), Ok(Recommendation::Go));
        assert_eq!(" go ".parse::<Recommendation>(), Ok(Recommendation::Go));
        assert_eq!("NO-GO".parse::<Recommendation>(), Ok(Recommendation::NoGo));
        assert_eq!("no go".parse::<Recommendation>(), Ok(Recommendation::NoGo));
        assert_eq!(
            "GO with Mitigation".parse::<Recommendation>(),
            Ok(Recommendation::GoWithMitigation)
        );
        assert!("maybe".parse::<Recommendation>().is_err());
    }

    #[test]
    fn annotated_no_go_stays_no_go() {
        for raw in ["NO-GO (showstopper)", "Recommendation: no go", "NOGO!"] {
            assert_eq!(Recommendation::from_loose(raw), Recommendation::NoGo, "{raw}");
        }
        assert_eq!(Recommendation::from_loose("maybe"), Recommendation::GoWithMitigation);
        assert_eq!(
            Recommendation::from_loose("no good reason to decline"),
            Recommendation::GoWithMitigation
        );
        assert_eq!(Recommendation::from_loose("GO"), Recommendation::Go);

        let v: Verdict =
            serde_json::from_str(r#"{"recommendation": "NO-GO (showstopper S1)"}"#).unwrap();
        assert_eq!(v.recommendation, Recommendation::NoGo);
    }

    #[test]
    fn recommendation_serializes_canonically() {
        let v = Verdict {
            recommendation: Recommendation::NoGo,
            score: 90,
            rationale: "Middleware not supported".into(),
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["recommendation"], "NO_GO");
        let back: Verdict = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn risk_level_is_case_insensitive() {
        let r: Risk = serde_json::from_str(r#"{"level": "HIGH"}"#).unwrap();
        assert_eq!(r.level, RiskLevel::High);
        let r: Risk = serde_json::from_str(r#"{"level": 3}"#).unwrap();
        assert_eq!(r.level, RiskLevel::Medium);
    }

    #[test]
    fn serialized_report_always_has_every_domain() {
        let json = serde_json::to_value(StructuredReport::default()).unwrap();
        let sections = json["domain_sections"].as_object().unwrap();
        for domain in Domain::ALL {
            assert!(sections.contains_key(domain.key()), "{}", domain.key());
        }
    }

    #[test]
    fn metadata_accessors_cover_all_fields() {
        let mut report = StructuredReport::default();
        for (i, field) in MetadataField::ALL.into_iter().enumerate() {
            *report.metadata_mut(field) = format!("v{i}");
        }
        assert_eq!(report.title, "v0");
        assert_eq!(report.deadline, "v8");
        for (i, field) in MetadataField::ALL.into_iter().enumerate() {
            assert_eq!(report.metadata(field), format!("v{i}"));
        }
    }
}
