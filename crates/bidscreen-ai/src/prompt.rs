//! Prompt construction for a screening run.

use bidscreen_core::DetailLevel;
use serde_json::Value;

use crate::config::RiskProfile;

// ── Prompt templates ──

const RESPONSE_FORMAT: &str = "\
RESPONSE FORMAT:
You MUST respond with a valid JSON object. No markdown, no explanation outside JSON.
Use exactly this structure:

{
  \"tender_title\": \"string\",
  \"tender_date\": \"string or empty\",
  \"tender_reference\": \"string or empty\",
  \"contracting_authority\": \"string\",
  \"city\": \"string or empty\",
  \"country\": \"string or empty\",
  \"tender_type\": \"bundle | unbundle | unknown\",
  \"estimated_value_eur\": \"string or empty\",
  \"submission_deadline\": \"string or empty\",
  \"executive_summary\": [\"string\", \"string\", \"string\"],
  \"go_nogo\": {
    \"recommendation\": \"GO | GO with Mitigation | NO-GO\",
    \"score\": 0,
    \"rationale\": \"string\"
  },
  \"showstoppers\": [
    {
      \"id\": \"string\",
      \"description\": \"string\",
      \"evidence\": \"string (quote)\",
      \"document_ref\": \"string (page reference)\",
      \"impact\": \"string\"
    }
  ],
  \"risks\": [
    {
      \"id\": \"string\",
      \"risk\": \"string\",
      \"category\": \"string\",
      \"level\": \"Low | Medium | High\",
      \"probability\": 1,
      \"impact\": 1,
      \"score\": 1,
      \"document_ref\": \"string\",
      \"evidence\": \"string\",
      \"mitigation\": \"string\"
    }
  ],
  \"requirements\": {
    \"scope_and_responsibility\": [\"string\"],
    \"space_and_facility\": [\"string\"],
    \"analyzer_connectivity\": [\"string\"],
    \"it_and_middleware\": [\"string\"],
    \"schedule_and_milestones\": [\"string\"],
    \"qualification_and_compliance\": [\"string\"],
    \"commercial_conditions\": [\"string\"]
  },
  \"domain_sections\": {
    \"technical\": {\"summary\": \"string\", \"key_points\": [\"string\"]},
    \"commercial\": {\"summary\": \"string\", \"key_points\": [\"string\"]},
    \"legal_compliance\": {\"summary\": \"string\", \"key_points\": [\"string\"]},
    \"logistics_facility\": {\"summary\": \"string\", \"key_points\": [\"string\"]},
    \"it_connectivity\": {\"summary\": \"string\", \"key_points\": [\"string\"]}
  },
  \"deliverables\": [\"string\"],
  \"open_questions\": [\"string\"],
  \"deadlines\": [
    {
      \"milestone\": \"string\",
      \"when\": \"string\",
      \"evidence\": \"string\"
    }
  ]
}";

const SCORING_RULES: &str = "\
SCORING RULES:
- probability and impact: integer 1-5
- risk score = probability * impact
- risk level: High for score >= 15, Medium for 8-14, Low below 8
- Go/No-Go logic:
  - Any showstopper present -> NO-GO
  - Sum of top-5 risk scores >= 60 -> GO with Mitigation
  - Otherwise -> GO
- score in go_nogo: 0-100 representing overall complexity
- Cite the page marker (--- PAGE n ---) of every piece of evidence in document_ref";

/// The system prompt: company profile, risk register, response shape.
pub fn system_prompt(profile: &RiskProfile) -> String {
    let company = &profile.company_profile;
    let name = or_default(&company.name, "the company");
    let business = or_default(
        &company.business_description,
        "Clinical laboratory automation supplier",
    );
    let delivery = match &company.typical_delivery_months {
        Value::Null => "N/A".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let languages = if company.languages.is_empty() {
        "English".to_string()
    } else {
        company.languages.join(", ")
    };

    format!(
        "You are an expert pre-bid tender analyst for {name}.\n\
         \n\
         COMPANY PROFILE:\n\
         - Business: {business}\n\
         - Products: {products}\n\
         - Typical delivery time: {delivery} months\n\
         - Geographic coverage: {coverage}\n\
         - Languages handled: {languages}\n\
         \n\
         YOUR TASK:\n\
         Analyze the tender document provided and produce a structured pre-bid screening report.\n\
         Focus on identifying SHOWSTOPPERS (reasons to immediately decline), HIGH RISKS, and \
         MEDIUM RISKS based on the company risk register provided.\n\
         \n\
         RISK REGISTER TO APPLY:\n\
         {register}\n\
         \n\
         TENDER TYPE CONTEXT:\n\
         {guidance}\n\
         \n\
         {RESPONSE_FORMAT}\n\
         \n\
         {SCORING_RULES}\n",
        products = company.products.join(", "),
        coverage = company.geographic_coverage.join(", "),
        register = pretty(&profile.risk_register),
        guidance = pretty(&profile.tender_type_guidance),
    )
}

/// The user prompt: the prepared document and the detail instruction.
pub fn user_prompt(document_text: &str, detail: DetailLevel) -> String {
    format!(
        "TENDER DOCUMENT:\n\
         {document_text}\n\
         \n\
         ---\n\
         ANALYSIS DETAIL LEVEL: {detail}\n\
         {instruction}\n\
         \n\
         Analyze this tender document according to your system instructions and return the JSON report.\n",
        instruction = detail_instruction(detail),
    )
}

fn detail_instruction(detail: DetailLevel) -> &'static str {
    match detail {
        DetailLevel::Low => "Provide a concise analysis. Focus only on showstoppers and top 3 risks.",
        DetailLevel::Medium => {
            "Provide a balanced analysis. Cover all risk categories and key requirements."
        }
        DetailLevel::High => {
            "Provide an exhaustive analysis. Extract every constraint, requirement, and risk. \
             List all open questions that need clarification before bidding."
        }
    }
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

fn pretty(value: &Value) -> String {
    match value {
        Value::Null => "{}".to_string(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
