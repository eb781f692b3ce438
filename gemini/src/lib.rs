//! Minimal Google Gemini API client.
//!
//! This crate provides a focused client for Gemini's `generateContent`
//! endpoint with:
//! - Text generation with a system instruction
//! - Structured JSON output (`responseMimeType: application/json`)
//! - Multimodal input parts (text and inline base64 images)
//! - Image generation via response modalities

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

/// Errors that can occur when using the Gemini client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Gemini API client.
#[derive(Clone)]
pub struct Gemini {
    client: reqwest::Client,
    api_key: String,
    text_model: String,
    image_model: String,
}

impl Gemini {
    /// Create a new Gemini client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.into(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    /// Create a Gemini client from the GEMINI_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| Error::NoApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set the default text model for this client.
    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    /// Set the default image model for this client.
    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    /// The model used when a request selects [`ModelKind::Text`].
    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    /// The model used when a request selects [`ModelKind::Image`].
    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    /// Send a generation request and return the full response.
    pub async fn generate(&self, request: Request) -> Result<Response, Error> {
        if self.api_key.is_empty() {
            return Err(Error::NoApiKey);
        }

        let model = match request.model {
            ModelKind::Text => &self.text_model,
            ModelKind::Image => &self.image_model,
        };
        let api_request = build_api_request(&request);
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{API_BASE}/models/{model}:generateContent"))
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        Ok(parse_response(api_response))
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        Ok(headers)
    }
}

// ============================================================================
// Public types
// ============================================================================

/// Which of the client's configured models a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    #[default]
    Text,
    Image,
}

/// A generation request to send to Gemini.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: ModelKind,
    pub system: Option<String>,
    pub contents: Vec<Content>,
    pub response_mime_type: Option<String>,
    pub response_modalities: Option<Vec<Modality>>,
    pub temperature: Option<f32>,
    /// Thinking token budget; `Some(0)` disables thinking entirely.
    pub thinking_budget: Option<u32>,
}

impl Request {
    /// Create a new request with the given contents.
    pub fn new(contents: Vec<Content>) -> Self {
        Self {
            model: ModelKind::Text,
            system: None,
            contents,
            response_mime_type: None,
            response_modalities: None,
            temperature: None,
            thinking_budget: None,
        }
    }

    /// Create a request from a single user prompt string.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self::new(vec![Content::user(vec![Part::text(prompt)])])
    }

    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.model = model;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_response_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.response_mime_type = Some(mime_type.into());
        self
    }

    pub fn with_response_modalities(mut self, modalities: Vec<Modality>) -> Self {
        self.response_modalities = Some(modalities);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }
}

/// A turn of content in the conversation.
#[derive(Debug, Clone)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    /// Create a user turn.
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// Create a model turn.
    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }
}

/// The role of a content turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// A part of a content turn.
#[derive(Debug, Clone)]
pub enum Part {
    Text(String),
    /// Inline binary data (base64) with its mime type.
    InlineData {
        mime_type: String,
        data: String,
    },
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    /// Create an inline-data part from base64 bytes.
    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::InlineData {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// Output modalities a request may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Text,
    Image,
}

/// A generation response from Gemini.
#[derive(Debug, Clone)]
pub struct Response {
    pub parts: Vec<ResponsePart>,
    pub finish_reason: Option<String>,
}

/// A part of the model's response.
#[derive(Debug, Clone)]
pub enum ResponsePart {
    Text(String),
    InlineData { mime_type: String, data: String },
}

impl Response {
    /// Get all text content concatenated.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ResponsePart::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Get the first inline-data payload, if any.
    pub fn first_inline_data(&self) -> Option<(&str, &str)> {
        self.parts.iter().find_map(|p| match p {
            ResponsePart::InlineData { mime_type, data } => {
                Some((mime_type.as_str(), data.as_str()))
            }
            _ => None,
        })
    }
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<ApiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum ApiPart {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "inlineData")]
    InlineData(ApiInlineData),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ApiThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    content: Option<ApiContent>,
    finish_reason: Option<String>,
}

fn build_api_request(request: &Request) -> ApiRequest {
    let has_config = request.response_mime_type.is_some()
        || request.response_modalities.is_some()
        || request.temperature.is_some()
        || request.thinking_budget.is_some();

    ApiRequest {
        system_instruction: request.system.as_ref().map(|s| ApiContent {
            role: None,
            parts: vec![ApiPart::Text(s.clone())],
        }),
        contents: request
            .contents
            .iter()
            .map(|c| ApiContent {
                role: Some(
                    match c.role {
                        Role::User => "user",
                        Role::Model => "model",
                    }
                    .to_string(),
                ),
                parts: c.parts.iter().map(|p| p.into()).collect(),
            })
            .collect(),
        generation_config: has_config.then(|| ApiGenerationConfig {
            response_mime_type: request.response_mime_type.clone(),
            response_modalities: request.response_modalities.as_ref().map(|ms| {
                ms.iter()
                    .map(|m| {
                        match m {
                            Modality::Text => "TEXT",
                            Modality::Image => "IMAGE",
                        }
                        .to_string()
                    })
                    .collect()
            }),
            temperature: request.temperature,
            thinking_config: request
                .thinking_budget
                .map(|thinking_budget| ApiThinkingConfig { thinking_budget }),
        }),
    }
}

impl From<&Part> for ApiPart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => ApiPart::Text(text.clone()),
            Part::InlineData { mime_type, data } => ApiPart::InlineData(ApiInlineData {
                mime_type: mime_type.clone(),
                data: data.clone(),
            }),
        }
    }
}

fn parse_response(api_response: ApiResponse) -> Response {
    let mut parts = Vec::new();
    let mut finish_reason = None;

    if let Some(candidate) = api_response.candidates.into_iter().next() {
        finish_reason = candidate.finish_reason;
        if let Some(content) = candidate.content {
            for part in content.parts {
                parts.push(match part {
                    ApiPart::Text(text) => ResponsePart::Text(text),
                    ApiPart::InlineData(inline) => ResponsePart::InlineData {
                        mime_type: inline.mime_type,
                        data: inline.data,
                    },
                });
            }
        }
    }

    Response {
        parts,
        finish_reason,
    }
}
