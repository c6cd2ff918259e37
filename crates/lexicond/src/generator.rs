//! Word generator backed by the Gemini `generateContent` API.
//!
//! One call is one request: the generator returns the raw model text and
//! leaves parsing and deduplication to the acquisition loop. The exclusion
//! list in the prompt is advisory; the model does not always honour it.

use crate::config::GeneratorConfig;
use async_trait::async_trait;
use lexicon_shared::GeneratorError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Context sent with each generation request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    /// Terms the generator is asked to avoid
    pub excluded_terms: Vec<String>,
}

/// Build the instruction text for one word request
pub fn build_prompt(ctx: &PromptContext) -> String {
    let mut prompt = String::from(
        "Suggest one commonly used intermediate-level English word that helps someone \
         improve their everyday vocabulary. It should be practical in daily conversation. \
         Give the word, a short definition, and two example sentences showing how it is \
         used in daily life.\n\n\
         Respond with JSON only, in exactly this shape:\n\
         {\"term\": \"word\", \"definition\": \"what it means\", \
         \"usages\": [\"example sentence 1\", \"example sentence 2\"]}\n",
    );

    if !ctx.excluded_terms.is_empty() {
        prompt.push_str("\nDo not use any of these words: ");
        prompt.push_str(&ctx.excluded_terms.join(", "));
        prompt.push_str(".\n");
    }

    prompt.push_str("\nReturn the JSON object and nothing else.");
    prompt
}

// ============================================================================
// Generator Trait
// ============================================================================

/// Source of raw candidate payloads
#[async_trait]
pub trait WordGenerator: Send + Sync {
    /// Issue one generation request and return the raw text payload
    async fn generate(&self, ctx: &PromptContext) -> Result<String, GeneratorError>;
}

// ============================================================================
// Gemini Generator (Production)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Gemini API client
pub struct GeminiGenerator {
    config: GeneratorConfig,
    api_key: String,
    client: Client,
}

impl GeminiGenerator {
    pub fn new(config: GeneratorConfig, api_key: impl Into<String>) -> Result<Self, GeneratorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeneratorError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            api_key: api_key.into(),
            client,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    fn request_body(&self, ctx: &PromptContext) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: build_prompt(ctx),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: self.config.max_output_tokens,
                temperature: self.config.temperature,
            },
        }
    }
}

/// Concatenate the text parts of the first candidate
fn extract_text(response: GeminiResponse) -> Result<String, GeneratorError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(GeneratorError::EmptyResponse)?;

    if let Some(reason) = &candidate.finish_reason {
        debug!("Gemini finish reason: {}", reason);
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GeneratorError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl WordGenerator for GeminiGenerator {
    async fn generate(&self, ctx: &PromptContext) -> Result<String, GeneratorError> {
        debug!(
            "Requesting word from {} ({} excluded terms)",
            self.config.model,
            ctx.excluded_terms.len()
        );

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&self.request_body(ctx))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Timeout(self.config.timeout_secs)
                } else {
                    GeneratorError::Http(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::Http(format!("Failed to decode response: {}", e)))?;

        extract_text(parsed)
    }
}

// ============================================================================
// Fake Generator (Testing)
// ============================================================================

/// Generator that replays a script of responses and records every prompt
/// context it receives. Once the script runs out every call fails with
/// `GeneratorError::EmptyResponse`.
#[derive(Default)]
pub struct FakeGenerator {
    script: Mutex<VecDeque<Result<String, GeneratorError>>>,
    calls: Mutex<Vec<PromptContext>>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw text payload
    pub fn push_raw(&self, raw: impl Into<String>) -> &Self {
        self.lock_script().push_back(Ok(raw.into()));
        self
    }

    /// Queue a well-formed payload for `term`
    pub fn push_term(&self, term: &str) -> &Self {
        let payload = serde_json::json!({
            "term": term,
            "definition": format!("meaning of {}", term),
            "usages": [format!("first use of {}", term), format!("second use of {}", term)],
        });
        self.push_raw(payload.to_string())
    }

    /// Queue a transport failure
    pub fn push_error(&self, error: GeneratorError) -> &Self {
        self.lock_script().push_back(Err(error));
        self
    }

    /// Prompt contexts received so far, in call order
    pub fn calls(&self) -> Vec<PromptContext> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn remaining(&self) -> usize {
        self.lock_script().len()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, GeneratorError>>> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl WordGenerator for FakeGenerator {
    async fn generate(&self, ctx: &PromptContext) -> Result<String, GeneratorError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ctx.clone());
        self.lock_script()
            .pop_front()
            .unwrap_or(Err(GeneratorError::EmptyResponse))
    }
}
