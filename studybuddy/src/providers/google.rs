use super::sanitize;
use super::{GenerativeBackend, ProviderError};
use crate::types::{GenerationOptions, ModelInfo, StudyRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";
const PROBE_PROMPT: &str = "ping";

/// Google Generative Language (Gemini API key) client.
pub struct GeminiClient {
    client: Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn send_generate(
        &self,
        api_key: &str,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<String, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::AuthRequired(
                "API key required for Gemini".into(),
            ));
        }

        let resp = self
            .client
            .post(self.generate_url(model))
            .header(API_KEY_HEADER, api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(sanitize::api_error_body(status.as_u16(), &body));
        }

        let gen_resp: GenerateContentResponse = resp.json().await?;
        reply_text(gen_resp)
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
    thought: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Models list response
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelsListResponse {
    models: Option<Vec<CatalogEntry>>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntry {
    name: String,
    display_name: Option<String>,
    supported_generation_methods: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn build_request(
    system_instruction: &str,
    request: &StudyRequest,
    options: &GenerationOptions,
) -> GenerateContentRequest {
    let mut parts = Vec::new();
    if let Some(question) = request.question_text() {
        parts.push(Part::text(question));
    }
    if let Some(img) = &request.image {
        parts.push(Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: img.mime_type.clone(),
                data: img.data.clone(),
            }),
        });
    }

    let system_instruction = Some(system_instruction.trim())
        .filter(|s| !s.is_empty())
        .map(|s| SystemInstruction {
            parts: vec![Part::text(s)],
        });

    let generation_config = if options.temperature.is_some() || options.max_output_tokens.is_some() {
        Some(GenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_output_tokens,
        })
    } else {
        None
    };

    GenerateContentRequest {
        contents: vec![Content {
            role: "user".into(),
            parts,
        }],
        system_instruction,
        generation_config,
    }
}

fn probe_request() -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user".into(),
            parts: vec![Part::text(PROBE_PROMPT)],
        }],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            temperature: None,
            max_output_tokens: Some(1),
        }),
    }
}

/// Concatenate the non-thought text of the first candidate.
fn reply_text(resp: GenerateContentResponse) -> Result<String, ProviderError> {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        let reason = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "NO_CANDIDATES".into());
        return Err(ProviderError::EmptyReply { finish_reason: reason });
    };

    let text: String = candidate
        .content
        .and_then(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !p.thought.unwrap_or(false))
        .filter_map(|p| p.text)
        .collect();

    if text.is_empty() {
        return Err(ProviderError::EmptyReply {
            finish_reason: candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".into()),
        });
    }
    Ok(text)
}

fn catalog_entries(list: ModelsListResponse) -> Vec<ModelInfo> {
    list.models
        .unwrap_or_default()
        .into_iter()
        .map(|m| {
            let id = m.name.strip_prefix("models/").unwrap_or(&m.name).to_string();
            let supports_generate = m
                .supported_generation_methods
                .as_ref()
                .is_some_and(|methods| methods.iter().any(|x| x == "generateContent"));
            ModelInfo {
                display_name: m.display_name.unwrap_or_else(|| id.clone()),
                id,
                supports_generate,
            }
        })
        .filter(|m| m.supports_generate)
        .collect()
}

// ---------------------------------------------------------------------------
// Backend impl
// ---------------------------------------------------------------------------

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate(
        &self,
        api_key: &str,
        model: &str,
        system_instruction: &str,
        request: &StudyRequest,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let body = build_request(system_instruction, request, options);
        self.send_generate(api_key, model, &body).await
    }

    async fn probe(&self, api_key: &str, model: &str) -> Result<(), ProviderError> {
        match self.send_generate(api_key, model, &probe_request()).await {
            // A one-token budget can legitimately end without text; the model answered.
            Ok(_) | Err(ProviderError::EmptyReply { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_models(&self, api_key: &str) -> Result<Vec<ModelInfo>, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .client
                .get(&url)
                .header(API_KEY_HEADER, api_key)
                .query(&[("pageSize", "1000")]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let resp = req.send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(sanitize::api_error_body(status.as_u16(), &body));
            }

            let mut list: ModelsListResponse = resp.json().await?;
            page_token = list.next_page_token.take().filter(|t| !t.is_empty());
            models.extend(catalog_entries(list));

            if page_token.is_none() {
                break;
            }
        }

        Ok(models)
    }
}
