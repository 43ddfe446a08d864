//! Text-completion backends for bookmark categorization
//!
//! The categorizer only needs `prompt -> text`. Two HTTP backends are provided:
//! Anthropic's Messages API and Google's Gemini `generateContent`. Both are
//! authenticated by a single API key handed in at construction time.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, ServiceError};

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Anything that turns a prompt into a completion
pub trait CompletionService {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, ServiceError>> + Send;
}

/// Which HTTP API to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    #[default]
    Anthropic,
    Gemini,
}

impl LlmBackend {
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmBackend::Anthropic => "claude-haiku-4-5-20251001",
            LlmBackend::Gemini => "gemini-1.5-flash",
        }
    }

    /// Environment variable that overrides the stored key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
            LlmBackend::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmBackend::Anthropic => "anthropic",
            LlmBackend::Gemini => "gemini",
        }
    }
}

impl fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(LlmBackend::Anthropic),
            "gemini" | "google" => Ok(LlmBackend::Gemini),
            other => Err(format!("unknown backend '{}' (expected anthropic or gemini)", other)),
        }
    }
}

/// Map a non-success HTTP status to a service error class
fn classify_status(status: u16, body: &str) -> ServiceError {
    let message = format!("API error {}: {}", status, body);
    match status {
        429 | 503 | 529 => ServiceError::Overloaded(message),
        400 | 401 | 403 | 404 => ServiceError::Rejected(message),
        _ => ServiceError::Transient(message),
    }
}

fn build_http_client() -> Result<Client, Error> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| Error::HttpClient(e.to_string()))
}

async fn read_error(response: reqwest::Response) -> ServiceError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    classify_status(status, &body)
}

// ==================== Anthropic ====================

/// Anthropic API message format
#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Anthropic API request format
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

/// Anthropic API response format
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Result<Self, Error> {
        Ok(Self {
            client: build_http_client()?,
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| LlmBackend::Anthropic.default_model().to_string()),
        })
    }
}

impl CompletionService for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: 2000,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::Transient(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Transient(format!("Failed to parse response: {}", e)))?;

        debug!("[AI] Anthropic returned {} content blocks", api_response.content.len());
        Ok(api_response
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .unwrap_or_default())
    }
}

// ==================== Gemini ====================

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

impl GeminiResponse {
    /// Text of the first candidate, all parts joined
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default()
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Result<Self, Error> {
        Ok(Self {
            client: build_http_client()?,
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| LlmBackend::Gemini.default_model().to_string()),
        })
    }
}

impl CompletionService for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(format!("{}/{}:generateContent", GEMINI_URL, self.model))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::Transient(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }

        let api_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Transient(format!("Failed to parse response: {}", e)))?;

        Ok(api_response.into_text())
    }
}

// ==================== Runtime selection ====================

/// A backend chosen at runtime from settings
pub enum Backend {
    Anthropic(AnthropicClient),
    Gemini(GeminiClient),
}

impl Backend {
    pub fn new(kind: LlmBackend, api_key: impl Into<String>, model: Option<String>) -> Result<Self, Error> {
        Ok(match kind {
            LlmBackend::Anthropic => Backend::Anthropic(AnthropicClient::new(api_key, model)?),
            LlmBackend::Gemini => Backend::Gemini(GeminiClient::new(api_key, model)?),
        })
    }
}

impl CompletionService for Backend {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        match self {
            Backend::Anthropic(client) => client.complete(prompt).await,
            Backend::Gemini(client) => client.complete(prompt).await,
        }
    }
}
