//! OpenAI-compatible chat-completions analyzer.

use std::time::Duration;

use async_trait::async_trait;
use bidscreen_core::document::{TRUNCATION_NOTE, truncate_chars};
use bidscreen_core::{Pricing, StructuredReport, UsageMeta, estimate_cost};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analyzer::{AnalysisError, AnalysisRequest, Analyzer};
use crate::config::RiskProfile;
use crate::prompt::{system_prompt, user_prompt};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Analyzer backed by `POST {base_url}/v1/chat/completions`.
///
/// Rate limits (429) and server errors (5xx) are retried with exponential
/// backoff. A context-length rejection halves the document text and retries.
pub struct OpenAiAnalyzer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    system_prompt: String,
    pricing: Pricing,
    max_retries: u32,
    initial_backoff: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: ChatUsage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl OpenAiAnalyzer {
    /// Create an analyzer for the given base URL (e.g. `https://api.openai.com`).
    ///
    /// A trailing slash on `base_url` is ignored.
    pub fn new(
        base_url: String,
        api_key: String,
        profile: &RiskProfile,
    ) -> Result<Self, AnalysisError> {
        if api_key.trim().is_empty() {
            return Err(AnalysisError::MissingApiKey);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            system_prompt: system_prompt(profile),
            pricing: Pricing::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_secs(2),
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// One chat-completions call, no retries.
    async fn complete(
        &self,
        request: &AnalysisRequest,
        document_text: &str,
    ) -> Result<ChatResponse, AnalysisError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let user = user_prompt(document_text, request.detail);
        let body = ChatRequest {
            model: &request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: request.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        info!(
            url = %url,
            model = %request.model,
            temperature = request.temperature,
            "requesting analysis"
        );
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AnalysisError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl Analyzer for OpenAiAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<StructuredReport, AnalysisError> {
        let mut text = request.document_text.clone();
        let mut truncated = request.truncated;
        let mut backoff = self.initial_backoff;

        for attempt in 0..=self.max_retries {
            let err = match self.complete(request, &text).await {
                Ok(resp) => return into_report(resp, request, &text, truncated, &self.pricing),
                Err(err) => err,
            };
            if attempt == self.max_retries {
                return Err(if is_context_overflow(&err) {
                    AnalysisError::ContextTooLarge {
                        attempts: attempt + 1,
                    }
                } else {
                    err
                });
            }

            if is_context_overflow(&err) {
                text = halve(&text);
                truncated = true;
                warn!(
                    attempt,
                    chars = analyzed_chars(&text),
                    "context length exceeded, halving document"
                );
            } else if err.is_transient() {
                debug!(attempt, ?backoff, error = %err, "retrying analysis request");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            } else {
                return Err(err);
            }
        }
        Err(AnalysisError::ContextTooLarge {
            attempts: self.max_retries + 1,
        })
    }
}

/// Decode the model's JSON content and stamp the run's usage.
fn into_report(
    resp: ChatResponse,
    request: &AnalysisRequest,
    text: &str,
    truncated: bool,
    pricing: &Pricing,
) -> Result<StructuredReport, AnalysisError> {
    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(AnalysisError::EmptyResponse)?;

    let mut report = StructuredReport::from_json(&content)?;
    let usage = resp.usage;
    report.usage_meta = UsageMeta {
        model: if resp.model.is_empty() {
            request.model.clone()
        } else {
            resp.model
        },
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
        estimated_cost: estimate_cost(usage.prompt_tokens, usage.completion_tokens, pricing),
        run_count: 1,
        detail_level: request.detail.as_str().to_string(),
        pages_analyzed: request.pages,
        chars_analyzed: analyzed_chars(text),
        truncated,
    };
    info!(
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        risks = report.risks.len(),
        "analysis complete"
    );
    Ok(report)
}

/// Whether the provider rejected the request as too large for the model.
fn is_context_overflow(err: &AnalysisError) -> bool {
    match err {
        AnalysisError::Server { status: 413, .. } => true,
        AnalysisError::Server { status: 400, body } => {
            body.contains("context_length_exceeded") || body.contains("maximum context length")
        }
        _ => false,
    }
}

/// Document characters, excluding a trailing truncation note.
fn analyzed_chars(text: &str) -> usize {
    text.strip_suffix(TRUNCATION_NOTE)
        .unwrap_or(text)
        .chars()
        .count()
}

/// Keep the first half of the document and re-append the truncation note.
fn halve(text: &str) -> String {
    let body = text.strip_suffix(TRUNCATION_NOTE).unwrap_or(text);
    let (halved, _) = truncate_chars(body, body.chars().count() / 2);
    halved
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidscreen_core::{DetailLevel, Recommendation};

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            document_text: "\n\n--- PAGE 1 ---\nBando".into(),
            temperature: 0.4,
            detail: DetailLevel::Medium,
            model: "gpt-4o".into(),
            pages: 12,
            truncated: false,
        }
    }

    fn analyzer(base_url: &str) -> OpenAiAnalyzer {
        OpenAiAnalyzer::new(base_url.into(), "sk-test".into(), &RiskProfile::default()).unwrap()
    }

    #[test]
    fn trims_trailing_slash() {
        assert_eq!(analyzer("http://localhost:8080/").base_url, "http://localhost:8080");
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let result = OpenAiAnalyzer::new(DEFAULT_BASE_URL.into(), " ".into(), &RiskProfile::default());
        assert!(matches!(result, Err(AnalysisError::MissingApiKey)));
    }

    #[test]
    fn request_body_asks_for_json_object() {
        let body = ChatRequest {
            model: "gpt-4o",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "sys",
                },
                ChatMessage {
                    role: "user",
                    content: "doc",
                },
            ],
            temperature: 0.7,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "doc");
        assert_eq!(json["model"], "gpt-4o");
    }

    #[test]
    fn response_becomes_report_with_usage() {
        let resp: ChatResponse = serde_json::from_str(
            r#"{
                "model": "gpt-4o-2024-08-06",
                "choices": [{"message": {"content":
                    "{\"tender_title\": \"TLA Padova\", \"go_nogo\": {\"recommendation\": \"NO-GO\", \"score\": 80}}"}}],
                "usage": {"prompt_tokens": 40000, "completion_tokens": 2000, "total_tokens": 42000}
            }"#,
        )
        .unwrap();
        let report = into_report(resp, &request(), "abcd", true, &Pricing::default()).unwrap();

        assert_eq!(report.title, "TLA Padova");
        assert_eq!(report.verdict.recommendation, Recommendation::NoGo);
        assert_eq!(report.usage_meta.model, "gpt-4o-2024-08-06");
        assert_eq!(report.usage_meta.total_tokens, 42_000);
        assert_eq!(report.usage_meta.estimated_cost, 0.12);
        assert_eq!(report.usage_meta.run_count, 1);
        assert_eq!(report.usage_meta.detail_level, "Medium");
        assert_eq!(report.usage_meta.pages_analyzed, 12);
        assert_eq!(report.usage_meta.chars_analyzed, 4);
        assert!(report.usage_meta.truncated);
    }

    #[test]
    fn missing_content_is_an_error() {
        let resp: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        let err = into_report(resp, &request(), "", false, &Pricing::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyResponse));
    }

    #[test]
    fn detects_context_overflow() {
        let overflow = AnalysisError::Server {
            status: 400,
            body: r#"{"error": {"code": "context_length_exceeded"}}"#.into(),
        };
        let other = AnalysisError::Server {
            status: 400,
            body: "invalid temperature".into(),
        };
        assert!(is_context_overflow(&overflow));
        assert!(is_context_overflow(&AnalysisError::Server {
            status: 413,
            body: String::new(),
        }));
        assert!(!is_context_overflow(&other));
    }

    #[test]
    fn halving_replaces_previous_note() {
        let once = halve("abcdefgh");
        assert_eq!(once, format!("abcd{TRUNCATION_NOTE}"));
        let twice = halve(&once);
        assert_eq!(twice, format!("ab{TRUNCATION_NOTE}"));
        assert_eq!(analyzed_chars(&twice), 2);
    }
}
