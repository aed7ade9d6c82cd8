mod context;
mod stages;
mod state;

use std::{sync::Arc, time::Instant};

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        exchange_buffer::ExchangeBuffer,
        types::chat_exchange::{ChatExchange, HistoryFilter},
        vector::VectorStore,
    },
    utils::{
        config::{AppConfig, ProfileDefaults},
        llm::ChatModel,
    },
};
use ingestion_pipeline::ContentIndexer;
use retrieval_pipeline::{
    evaluate_meeting_request, PromptAssembler, ResponseGenerator, RetrievalEngine,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use self::{
    context::ConversationContext,
    stages::{assemble, generate, index, persist, resolve_owner, retrieve, short_circuit},
    state::ready,
};

/// Reply for a message that is empty after trimming.
pub const EMPTY_MESSAGE_REPLY: &str =
    "It looks like your message was empty. What would you like to know about me?";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub visitor_id: Option<String>,
    #[serde(default)]
    pub visitor_name: Option<String>,
    #[serde(default)]
    pub chatbot_id: Option<String>,
    #[serde(default)]
    pub chatbot_slug: Option<String>,
    #[serde(default)]
    pub target_user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub query_time_ms: u64,
}

/// Drives one chat turn: resolve owner, retrieve, assemble, generate, persist, index.
///
/// Only owner resolution can fail the turn. Retrieval and indexing problems are absorbed,
/// generation failures degrade to a profile-only retry and then a static apology, and a
/// row-store failure while persisting parks the exchange in the in-memory buffer.
#[derive(Clone)]
pub struct ConversationOrchestrator {
    db: Arc<SurrealDbClient>,
    retrieval: RetrievalEngine,
    assembler: PromptAssembler,
    generator: ResponseGenerator,
    indexer: ContentIndexer,
    buffer: ExchangeBuffer,
    profile_defaults: ProfileDefaults,
}

impl ConversationOrchestrator {
    pub fn new(
        db: Arc<SurrealDbClient>,
        vector_store: Arc<dyn VectorStore>,
        chat_model: Arc<dyn ChatModel>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            retrieval: RetrievalEngine::new(Arc::clone(&vector_store), config.retrieval.clone()),
            assembler: PromptAssembler::new(config.history_limit),
            generator: ResponseGenerator::new(chat_model),
            indexer: ContentIndexer::new(vector_store),
            buffer: ExchangeBuffer::new(config.fallback_buffer_capacity),
            profile_defaults: config.profile_defaults.clone(),
        }
    }

    #[tracing::instrument(
        skip_all,
        fields(
            visitor_id = request.visitor_id.as_deref().unwrap_or("anonymous"),
            chatbot_id = request.chatbot_id.as_deref().unwrap_or("-"),
            target_user_id = request.target_user_id.as_deref().unwrap_or("-")
        )
    )]
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatReply, AppError> {
        let started = Instant::now();

        if request.message.trim().is_empty() {
            return Ok(ChatReply {
                response: EMPTY_MESSAGE_REPLY.to_string(),
                query_time_ms: elapsed_ms(started),
            });
        }

        let visitor_id = request
            .visitor_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map_or_else(|| format!("anonymous-{}", Uuid::new_v4()), str::to_string);

        let mut ctx =
            ConversationContext::new(Uuid::new_v4().to_string(), &request, self, visitor_id);

        let machine = ready();
        let machine = resolve_owner(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;

        let meeting = evaluate_meeting_request(ctx.message(), ctx.profile()?);
        let machine = if let Some(reply) = meeting.reply() {
            short_circuit(machine, &mut ctx, reply.to_string()).map_err(|err| ctx.abort(err))?
        } else {
            let machine = retrieve(machine, &mut ctx)
                .await
                .map_err(|err| ctx.abort(err))?;
            let machine = assemble(machine, &mut ctx).map_err(|err| ctx.abort(err))?;
            generate(machine, &mut ctx)
                .await
                .map_err(|err| ctx.abort(err))?
        };

        let machine = persist(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let _machine = index(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;

        let response = ctx
            .exchange
            .take()
            .map(|exchange| exchange.response)
            .ok_or_else(|| AppError::InternalError("exchange expected after persist".into()))?;
        let query_time_ms = elapsed_ms(started);

        info!(
            request_id = %ctx.request_id,
            visitor_id = %ctx.visitor_id,
            query_time_ms,
            response_chars = response.len(),
            "conversation turn finished"
        );

        Ok(ChatReply {
            response,
            query_time_ms,
        })
    }

    /// Stored exchanges matching `filter`, oldest first.
    pub async fn history(&self, filter: &HistoryFilter, limit: usize) -> Vec<ChatExchange> {
        let mut exchanges = self.load_history(filter, limit).await;
        exchanges.reverse();
        exchanges
    }

    /// Newest first. Falls back to the in-memory buffer when the row store fails.
    async fn load_history(&self, filter: &HistoryFilter, limit: usize) -> Vec<ChatExchange> {
        if limit == 0 {
            return Vec::new();
        }
        match ChatExchange::query_recent(filter, limit, &self.db).await {
            Ok(exchanges) => exchanges,
            Err(err) => {
                warn!(error = %err, "history query failed, reading buffered exchanges");
                self.buffer.recent(filter, limit).await
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
