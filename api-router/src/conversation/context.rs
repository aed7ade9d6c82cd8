use common::{
    error::AppError,
    storage::types::{chat_exchange::ChatExchange, chatbot::Chatbot, profile::Profile},
};
use retrieval_pipeline::RetrievalResult;
use tracing::error;

use super::{ChatRequest, ConversationOrchestrator};

pub struct ConversationContext<'a> {
    pub request_id: String,
    pub request: &'a ChatRequest,
    pub orchestrator: &'a ConversationOrchestrator,
    pub visitor_id: String,
    pub chatbot: Option<Chatbot>,
    pub profile: Option<Profile>,
    pub history: Vec<ChatExchange>,
    pub retrieval: RetrievalResult,
    pub prompt: Option<String>,
    pub response: Option<String>,
    pub exchange: Option<ChatExchange>,
}

impl<'a> ConversationContext<'a> {
    pub fn new(
        request_id: String,
        request: &'a ChatRequest,
        orchestrator: &'a ConversationOrchestrator,
        visitor_id: String,
    ) -> Self {
        Self {
            request_id,
            request,
            orchestrator,
            visitor_id,
            chatbot: None,
            profile: None,
            history: Vec::new(),
            retrieval: RetrievalResult::default(),
            prompt: None,
            response: None,
            exchange: None,
        }
    }

    pub fn message(&self) -> &str {
        self.request.message.trim()
    }

    pub fn chatbot(&self) -> Result<&Chatbot, AppError> {
        self.chatbot
            .as_ref()
            .ok_or_else(|| AppError::InternalError("chatbot expected to be resolved".into()))
    }

    pub fn profile(&self) -> Result<&Profile, AppError> {
        self.profile
            .as_ref()
            .ok_or_else(|| AppError::InternalError("profile expected to be resolved".into()))
    }

    pub fn take_prompt(&mut self) -> Result<String, AppError> {
        self.prompt
            .take()
            .ok_or_else(|| AppError::InternalError("prompt expected to be assembled".into()))
    }

    pub fn take_response(&mut self) -> Result<String, AppError> {
        self.response
            .take()
            .ok_or_else(|| AppError::InternalError("response expected to be generated".into()))
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(
            request_id = %self.request_id,
            visitor_id = %self.visitor_id,
            error = %err,
            "conversation aborted"
        );
        err
    }
}
