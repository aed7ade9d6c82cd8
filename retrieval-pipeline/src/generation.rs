use std::{sync::Arc, time::Instant};

use common::utils::llm::{ChatModel, GenerationError};
use tracing::{error, info, instrument};

/// User-facing failure class. Provider detail never reaches the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    Auth,
    Connection,
    RateLimit,
    Other,
}

impl From<&GenerationError> for FallbackKind {
    fn from(err: &GenerationError) -> Self {
        match err {
            GenerationError::Auth(_) => Self::Auth,
            GenerationError::Connection(_) => Self::Connection,
            GenerationError::RateLimit(_) => Self::RateLimit,
            GenerationError::Other(_) => Self::Other,
        }
    }
}

impl FallbackKind {
    /// Static apology shown in place of a generated answer, written in `name`'s voice.
    pub fn message(self, name: &str) -> String {
        match self {
            Self::Auth => format!(
                "I apologize, but I'm having trouble accessing {name}'s knowledge base at the moment. Please try again later."
            ),
            Self::Connection => format!(
                "I apologize, but I'm having trouble connecting to {name}'s knowledge base. Please check your internet connection and try again."
            ),
            Self::RateLimit => format!(
                "I apologize, but {name}'s AI clone is experiencing high demand. Please try again in a few moments."
            ),
            Self::Other => format!(
                "I apologize, but I'm having trouble processing your request as {name}'s AI clone. Please try again later."
            ),
        }
    }
}

/// Single-attempt completion over the chat model seam.
#[derive(Clone)]
pub struct ResponseGenerator {
    model: Arc<dyn ChatModel>,
}

impl ResponseGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Sends `prompt` as the system message and `query` as the user message. No retry here;
    /// recovery belongs to the caller.
    #[instrument(skip_all, fields(prompt_chars = prompt.len(), query_chars = query.len()))]
    pub async fn generate(&self, prompt: &str, query: &str) -> Result<String, GenerationError> {
        let started = Instant::now();
        match self.model.complete(prompt, query).await {
            Ok(answer) => {
                info!(
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    answer_chars = answer.len(),
                    "generation finished"
                );
                Ok(answer)
            }
            Err(err) => {
                error!(error = %err, kind = ?FallbackKind::from(&err), "generation failed");
                Err(err)
            }
        }
    }

    /// Like [`Self::generate`] but maps any failure to its static apology.
    pub async fn generate_or_fallback(&self, prompt: &str, query: &str, name: &str) -> String {
        match self.generate(prompt, query).await {
            Ok(answer) => answer,
            Err(err) => FallbackKind::from(&err).message(name),
        }
    }
}
