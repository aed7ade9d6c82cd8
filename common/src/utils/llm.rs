use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use thiserror::Error;

use super::config::AppConfig;

/// Typed failure of a completion call. The payload is provider detail for logs only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("authentication with the model provider failed: {0}")]
    Auth(String),
    #[error("could not reach the model provider: {0}")]
    Connection(String),
    #[error("model provider rate limit hit: {0}")]
    RateLimit(String),
    #[error("model completion failed: {0}")]
    Other(String),
}

impl From<OpenAIError> for GenerationError {
    fn from(err: OpenAIError) -> Self {
        match err {
            OpenAIError::Reqwest(inner) => {
                let detail = inner.to_string();
                match inner.status().map(|s| s.as_u16()) {
                    Some(401 | 403) => Self::Auth(detail),
                    Some(429) => Self::RateLimit(detail),
                    _ if inner.is_connect() || inner.is_timeout() || inner.is_request() => {
                        Self::Connection(detail)
                    }
                    _ => Self::Other(detail),
                }
            }
            OpenAIError::ApiError(api) => {
                let haystack = format!(
                    "{} {} {}",
                    api.code.as_deref().unwrap_or_default(),
                    api.r#type.as_deref().unwrap_or_default(),
                    api.message
                )
                .to_lowercase();
                classify_message(&haystack, api.message)
            }
            other => {
                let detail = other.to_string();
                classify_message(&detail.to_lowercase(), detail)
            }
        }
    }
}

fn classify_message(haystack: &str, detail: String) -> GenerationError {
    if ["invalid_api_key", "incorrect api key", "authentication", "401"]
        .iter()
        .any(|needle| haystack.contains(needle))
    {
        GenerationError::Auth(detail)
    } else if ["rate_limit", "rate limit", "429", "insufficient_quota"]
        .iter()
        .any(|needle| haystack.contains(needle))
    {
        GenerationError::RateLimit(detail)
    } else if ["connection", "timed out", "dns"]
        .iter()
        .any(|needle| haystack.contains(needle))
    {
        GenerationError::Connection(detail)
    } else {
        GenerationError::Other(detail)
    }
}

/// Chat completion seam: one system prompt, one user message, one answer.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_message: &str)
        -> Result<String, GenerationError>;
}

pub struct OpenAiChatModel {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatModel {
    pub fn new(client: Arc<Client<OpenAIConfig>>, config: &AppConfig) -> Self {
        Self {
            client,
            model: config.chat_model.clone(),
            temperature: config.chat_temperature,
            max_tokens: config.chat_max_tokens,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, GenerationError> {
        #[allow(deprecated)]
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessage::from(system_prompt).into(),
                ChatCompletionRequestUserMessage::from(user_message).into(),
            ])
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(GenerationError::from)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(GenerationError::from)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| GenerationError::Other("no content in completion response".into()))
    }
}
