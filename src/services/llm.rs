use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// System prompt shared by every recommendation call
pub const SYSTEM_PROMPT: &str =
    "You are a movie recommendation expert. Always respond with valid JSON only.";

const TEMPERATURE: f32 = 0.7;

/// A chat model that answers in JSON
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Sends one system and one user message, returns the raw content of the
    /// first choice
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> AppResult<String>;
}

/// OpenAI-compatible chat completions client, pointed at Groq by default
#[derive(Clone)]
pub struct GroqClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl GroqClient {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
            model,
        }
    }
}

#[async_trait::async_trait]
impl ChatCompletion for GroqClient {
    #[tracing::instrument(skip(self, system, user), fields(model = %self.model))]
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> AppResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Chat completion failed");
            return Err(AppError::ExternalApi(format!(
                "LLM API returned status {}",
                status
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::ExternalApi("No response from AI".to_string()))?;

        tracing::debug!(response_len = content.len(), "Chat completion received");
        Ok(content)
    }
}
