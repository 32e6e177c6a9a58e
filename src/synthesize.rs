//! Answer synthesis: prompt construction and the completion call.
//!
//! The prompt is a deterministic template over the question and the cited
//! sources. The completion itself goes through the [`CompletionClient`]
//! trait; [`OpenAiClient`] is the production implementation. One attempt,
//! no retry: the caller decides whether to retry or degrade, and a failure
//! here is fatal to the request.

use async_trait::async_trait;
use std::time::Duration;

use crate::cite::Citation;
use crate::config::SynthesisConfig;
use crate::extract::ExtractedText;

/// System message sent with every completion.
pub const SYSTEM_INSTRUCTION: &str =
    "Be concise; cite sources with markdown links at the end.";

/// Stands in for the body of a source with no extractable text.
const NO_TEXT_FALLBACK: &str = "(no inline text available - likely a PDF or binary; rely on the title and suggest opening the source link)";

/// Synthesis failures, split so callers can tell configuration problems
/// from upstream ones.
#[derive(Debug)]
pub enum SynthesisError {
    /// `OPENAI_API_KEY` absent. A deployment problem, not an upstream one.
    MissingApiKey,
    /// The provider answered with a non-success status. `code` is the
    /// provider's own error code where its payload exposed one.
    Upstream { status: u16, code: String },
    /// The request never completed (DNS, TLS, timeout).
    Network(String),
    /// A success status with a body we could not read an answer out of.
    MalformedResponse(String),
}

impl std::fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SynthesisError::MissingApiKey => {
                write!(f, "OPENAI_API_KEY environment variable not set")
            }
            SynthesisError::Upstream { status, code } => {
                write!(f, "completion API error {}: {}", status, code)
            }
            SynthesisError::Network(e) => write!(f, "completion request failed: {}", e),
            SynthesisError::MalformedResponse(e) => {
                write!(f, "malformed completion response: {}", e)
            }
        }
    }
}

impl std::error::Error for SynthesisError {}

impl SynthesisError {
    /// True for failures that mean the service is misconfigured rather
    /// than the provider being unhealthy.
    pub fn is_config(&self) -> bool {
        matches!(self, SynthesisError::MissingApiKey)
    }
}

/// External text-generation collaborator: prompt in, answer out.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, SynthesisError>;
}

/// Render the user prompt: one block per source with an ordinal header,
/// then the question. Sources with no inline text get the fixed fallback
/// sentence pointing the reader at the link.
pub fn build_prompt(question: &str, sources: &[(Citation, ExtractedText)]) -> String {
    let joined = sources
        .iter()
        .enumerate()
        .map(|(i, (citation, extracted))| {
            let body = if extracted.has_text() {
                extracted.text.as_str()
            } else {
                NO_TEXT_FALLBACK
            };
            format!(
                "SOURCE {}: {} - {}\n{}",
                i + 1,
                citation.name,
                citation.url,
                body
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!(
        "You are the brokerage agent assistant.\n\
         Use ONLY the information from the provided SOURCES to answer the question.\n\
         If the exact answer is not present in the source text, say you don't have enough info and point the agent to the most relevant source link by exact name.\n\
         Never invent policy text or legal language.\n\
         Answer briefly (2-6 sentences) and include a \"Sources\" list with markdown links.\n\
         \n\
         QUESTION:\n{}\n\
         \n\
         SOURCES:\n{}",
        question, joined
    )
}

// ============ OpenAI client ============

/// Chat-completions client. Credentials come from the environment at
/// construction time; nothing here reads the environment per request.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f64,
}

impl OpenAiClient {
    /// Build a client from config, reading `OPENAI_API_KEY` once.
    pub fn from_env(cfg: &SynthesisConfig) -> Result<Self, SynthesisError> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| SynthesisError::MissingApiKey)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| SynthesisError::Network(e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, SynthesisError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthesisError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SynthesisError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(SynthesisError::Upstream {
                status: status.as_u16(),
                code: upstream_error_code(&text),
            });
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| SynthesisError::MalformedResponse(e.to_string()))?;
        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                SynthesisError::MalformedResponse("missing choices[0].message.content".to_string())
            })
    }
}

/// Pull the provider's own error code out of its error payload, falling
/// back to a generic marker when the body is not the expected shape.
fn upstream_error_code(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let err = v.get("error")?.clone();
            err.get("code")
                .or_else(|| err.get("type"))
                .and_then(|c| c.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "upstream_error".to_string())
}
