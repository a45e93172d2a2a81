//! Gemini `generateContent` client.
//!
//! # Invariants
//! - Without an API key no request is made; drafts come from the offline
//!   generator.
//! - Any transport, status or parse failure yields a fallback draft.
//! - The API key travels in a header, never in the URL or the logs.

use crate::ai::offline::OfflineReviewGenerator;
use crate::ai::prompt::{
    global_prompt, global_system_instruction, monthly_prompt, monthly_system_instruction,
};
use crate::ai::{
    AiError, AiSettings, GlobalReviewContext, GlobalReviewDraft, ReviewContext, ReviewDraft,
    ReviewGenerator,
};
use log::{info, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

const API_KEY_HEADER: &str = "x-goog-api-key";
const JSON_MIME_TYPE: &str = "application/json";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Review generator backed by the Gemini REST API.
pub struct GeminiReviewGenerator {
    client: Client,
    settings: AiSettings,
    offline: OfflineReviewGenerator,
}

impl GeminiReviewGenerator {
    pub fn new(settings: AiSettings) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| AiError::Client(err.to_string()))?;
        Ok(Self {
            client,
            offline: OfflineReviewGenerator::new(settings.language),
            settings,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Monthly draft without fallback handling.
    pub fn try_generate_monthly(&self, context: &ReviewContext) -> Result<ReviewDraft, AiError> {
        let system = monthly_system_instruction(self.settings.language);
        let prompt = monthly_prompt(context);
        let text = self.generate_text(&system, &prompt)?;
        ReviewDraft::from_model_text(&text)
    }

    /// Global draft without fallback handling.
    pub fn try_generate_global(
        &self,
        context: &GlobalReviewContext,
    ) -> Result<GlobalReviewDraft, AiError> {
        let system = global_system_instruction(self.settings.language);
        let prompt = global_prompt(context);
        let text = self.generate_text(&system, &prompt)?;
        GlobalReviewDraft::from_model_text(&text)
    }

    fn api_key(&self) -> Option<&str> {
        self.settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model
        )
    }

    /// Sends one `generateContent` call and returns the first text part.
    fn generate_text(&self, system: &str, prompt: &str) -> Result<String, AiError> {
        let api_key = self.api_key().ok_or(AiError::MissingApiKey)?;
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: system }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: JSON_MIME_TYPE,
            },
        };

        let response = self
            .client
            .post(self.url())
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .map_err(|err| AiError::Transport(describe_transport_error(err)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::Status(status.as_u16()));
        }

        let body: GenerateResponse = response
            .json()
            .map_err(|err| AiError::Parse(format!("invalid response body: {err}")))?;
        extract_text(body)
    }
}

impl ReviewGenerator for GeminiReviewGenerator {
    fn generate_monthly(&self, context: &ReviewContext) -> ReviewDraft {
        if !self.has_api_key() {
            info!("event=ai_generate module=ai status=ok scope=monthly origin=offline");
            return self.offline.generate_monthly(context);
        }
        match self.try_generate_monthly(context) {
            Ok(draft) => {
                info!(
                    "event=ai_generate module=ai status=ok scope=monthly origin=generated model={}",
                    self.settings.model
                );
                draft
            }
            Err(err) => {
                warn!(
                    "event=ai_generate module=ai status=error scope=monthly error_kind={}",
                    err.kind()
                );
                self.offline.fallback_monthly(err.to_string())
            }
        }
    }

    fn generate_global(&self, context: &GlobalReviewContext) -> GlobalReviewDraft {
        if !self.has_api_key() {
            info!("event=ai_generate module=ai status=ok scope=global origin=offline");
            return self.offline.generate_global(context);
        }
        match self.try_generate_global(context) {
            Ok(draft) => {
                info!(
                    "event=ai_generate module=ai status=ok scope=global origin=generated model={}",
                    self.settings.model
                );
                draft
            }
            Err(err) => {
                warn!(
                    "event=ai_generate module=ai status=error scope=global error_kind={}",
                    err.kind()
                );
                self.offline.fallback_global(err.to_string())
            }
        }
    }
}

fn extract_text(body: GenerateResponse) -> Result<String, AiError> {
    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or(AiError::InvalidResponse("no candidates"))?;
    let part = candidate
        .content
        .and_then(|content| content.parts.into_iter().next())
        .ok_or(AiError::InvalidResponse("candidate has no content parts"))?;
    part.text
        .filter(|text| !text.trim().is_empty())
        .ok_or(AiError::InvalidResponse("empty text part"))
}

fn describe_transport_error(err: reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        err.without_url().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_text, GeminiReviewGenerator, GenerateResponse};
    use crate::ai::{AiError, AiSettings, DraftOrigin, ReviewContext, ReviewGenerator};
    use std::time::Duration;

    fn context() -> ReviewContext {
        ReviewContext {
            line_name: "Legal".to_string(),
            month: "2025-02".parse().unwrap(),
            projects: Vec::new(),
            completed_tasks: Vec::new(),
            overdue_tasks: Vec::new(),
            active_risks: Vec::new(),
        }
    }

    #[test]
    fn extract_text_reads_first_candidate_part() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"summary\":\"S\"}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(body).unwrap(), "{\"summary\":\"S\"}");
    }

    #[test]
    fn extract_text_rejects_empty_envelopes() {
        let body: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            extract_text(body),
            Err(AiError::InvalidResponse("no candidates"))
        ));
        let body: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[]}}]}"#).unwrap();
        assert!(extract_text(body).is_err());
    }

    #[test]
    fn blank_api_key_uses_offline_generator() {
        let generator = GeminiReviewGenerator::new(AiSettings {
            api_key: Some("  ".to_string()),
            ..AiSettings::default()
        })
        .unwrap();
        assert!(!generator.has_api_key());
        let draft = generator.generate_monthly(&context());
        assert_eq!(draft.origin, DraftOrigin::Offline);
    }

    #[test]
    fn unreachable_endpoint_yields_fallback_draft() {
        let generator = GeminiReviewGenerator::new(AiSettings {
            api_key: Some("test-key".to_string()),
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
            ..AiSettings::default()
        })
        .unwrap();
        let draft = generator.generate_monthly(&context());
        assert!(matches!(draft.origin, DraftOrigin::Fallback { .. }));
        assert!(!draft.summary.is_empty());
    }
}
