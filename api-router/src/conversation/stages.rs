use common::{
    error::AppError,
    storage::types::{
        chat_exchange::{ChatExchange, HistoryFilter},
        chatbot::{Chatbot, ChatbotLookup},
        owner::Owner,
        profile::Profile,
        visitor::Visitor,
    },
};
use retrieval_pipeline::{FallbackKind, RetrievalResult};
use state_machines::core::GuardError;
use tracing::{debug, info, instrument, warn};

use super::{
    context::ConversationContext,
    state::{
        ConversationMachine, Generated, Indexed, OwnerResolved, Persisted, PromptAssembled, Ready,
        Retrieved,
    },
    ChatRequest,
};

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Picks the chatbot lookup a request asks for: explicit id, then slug, then target owner,
/// then the store-wide default.
pub fn chatbot_lookup(request: &ChatRequest) -> ChatbotLookup {
    if let Some(id) = non_blank(request.chatbot_id.as_deref()) {
        ChatbotLookup::Id(id.to_string())
    } else if let Some(slug) = non_blank(request.chatbot_slug.as_deref()) {
        ChatbotLookup::Slug(slug.to_string())
    } else if let Some(owner_id) = non_blank(request.target_user_id.as_deref()) {
        ChatbotLookup::Owner(owner_id.to_string())
    } else {
        ChatbotLookup::Default
    }
}

#[instrument(
    level = "trace",
    skip_all,
    fields(request_id = %ctx.request_id, visitor_id = %ctx.visitor_id)
)]
pub async fn resolve_owner(
    machine: ConversationMachine<(), Ready>,
    ctx: &mut ConversationContext<'_>,
) -> Result<ConversationMachine<(), OwnerResolved>, AppError> {
    let orchestrator = ctx.orchestrator;
    let db = orchestrator.db.as_ref();
    let lookup = chatbot_lookup(ctx.request);

    if let ChatbotLookup::Owner(owner_id) = &lookup {
        if db.get_item::<Owner>(owner_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Owner {owner_id} not found")));
        }
    }

    let chatbot = Chatbot::get_or_create(&lookup, db)
        .await?
        .ok_or_else(|| match &lookup {
            ChatbotLookup::Id(id) => AppError::NotFound(format!("Chatbot {id} not found")),
            ChatbotLookup::Slug(slug) => AppError::NotFound(format!("Chatbot {slug} not found")),
            _ => AppError::NotFound("No chatbot is configured".to_string()),
        })?;

    if let Err(err) =
        Visitor::get_or_create(&ctx.visitor_id, ctx.request.visitor_name.as_deref(), db).await
    {
        warn!(visitor_id = %ctx.visitor_id, error = %err, "visitor bookkeeping failed");
    }

    let stored = match Profile::get_for_owner(&chatbot.owner_id, db).await {
        Ok(stored) => stored,
        Err(err) => {
            warn!(owner_id = %chatbot.owner_id, error = %err, "profile lookup failed, using defaults");
            None
        }
    };
    let profile = Profile::merged(
        stored.as_ref(),
        &chatbot.owner_id,
        &orchestrator.profile_defaults,
    );

    info!(
        request_id = %ctx.request_id,
        owner_id = %chatbot.owner_id,
        chatbot_id = %chatbot.id,
        stored_profile = stored.is_some(),
        "conversation owner resolved"
    );

    ctx.chatbot = Some(chatbot);
    ctx.profile = Some(profile);

    machine
        .resolve_owner()
        .map_err(|(_, guard)| map_guard_error("resolve_owner", &guard))
}

/// Answers without retrieval or generation, used for meeting requests.
pub fn short_circuit(
    machine: ConversationMachine<(), OwnerResolved>,
    ctx: &mut ConversationContext<'_>,
    reply: String,
) -> Result<ConversationMachine<(), Generated>, AppError> {
    debug!(request_id = %ctx.request_id, "meeting request answered directly");
    ctx.response = Some(reply);

    machine
        .short_circuit()
        .map_err(|(_, guard)| map_guard_error("short_circuit", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(request_id = %ctx.request_id, visitor_id = %ctx.visitor_id)
)]
pub async fn retrieve(
    machine: ConversationMachine<(), OwnerResolved>,
    ctx: &mut ConversationContext<'_>,
) -> Result<ConversationMachine<(), Retrieved>, AppError> {
    let orchestrator = ctx.orchestrator;
    let chatbot = ctx.chatbot()?;
    let owner_id = chatbot.owner_id.clone();

    let filter = HistoryFilter {
        visitor_id: Some(ctx.visitor_id.clone()),
        chatbot_id: Some(chatbot.id.clone()),
        owner_id: None,
    };
    let mut history = orchestrator
        .load_history(&filter, orchestrator.assembler.history_limit())
        .await;
    history.sort_by_key(|exchange| exchange.created_at);

    let settings = orchestrator.retrieval.settings();
    let retrieval = orchestrator
        .retrieval
        .retrieve(
            ctx.message(),
            Some(&owner_id),
            Some(&ctx.visitor_id),
            settings.top_k,
            settings.include_conversation,
        )
        .await;

    debug!(
        request_id = %ctx.request_id,
        history = history.len(),
        entries = retrieval.entries.len(),
        "conversation context gathered"
    );

    ctx.history = history;
    ctx.retrieval = retrieval;

    machine
        .retrieve()
        .map_err(|(_, guard)| map_guard_error("retrieve", &guard))
}

pub fn assemble(
    machine: ConversationMachine<(), Retrieved>,
    ctx: &mut ConversationContext<'_>,
) -> Result<ConversationMachine<(), PromptAssembled>, AppError> {
    let prompt = ctx.orchestrator.assembler.assemble(
        ctx.message(),
        &ctx.retrieval,
        ctx.profile()?,
        &ctx.history,
    );
    ctx.prompt = Some(prompt);

    machine
        .assemble()
        .map_err(|(_, guard)| map_guard_error("assemble", &guard))
}

/// Generates the answer. A failed attempt is retried once with a profile-only prompt; a second
/// failure yields the static apology for that failure.
#[instrument(
    level = "trace",
    skip_all,
    fields(request_id = %ctx.request_id, visitor_id = %ctx.visitor_id)
)]
pub async fn generate(
    machine: ConversationMachine<(), PromptAssembled>,
    ctx: &mut ConversationContext<'_>,
) -> Result<ConversationMachine<(), Generated>, AppError> {
    let orchestrator = ctx.orchestrator;
    let prompt = ctx.take_prompt()?;
    let profile = ctx.profile()?;

    let response = match orchestrator.generator.generate(&prompt, ctx.message()).await {
        Ok(answer) => answer,
        Err(first) => {
            warn!(
                request_id = %ctx.request_id,
                error = %first,
                "generation failed, retrying without retrieved context"
            );
            let degraded = orchestrator.assembler.assemble(
                ctx.message(),
                &RetrievalResult::empty(true),
                profile,
                &ctx.history,
            );
            match orchestrator.generator.generate(&degraded, ctx.message()).await {
                Ok(answer) => answer,
                Err(second) => {
                    warn!(
                        request_id = %ctx.request_id,
                        error = %second,
                        "degraded generation failed, using fallback text"
                    );
                    FallbackKind::from(&second).message(&profile.name)
                }
            }
        }
    };

    ctx.response = Some(response);

    machine
        .generate()
        .map_err(|(_, guard)| map_guard_error("generate", &guard))
}

/// Records what the visitor saw. A row-store failure parks the exchange in the in-memory buffer.
#[instrument(
    level = "trace",
    skip_all,
    fields(request_id = %ctx.request_id, visitor_id = %ctx.visitor_id)
)]
pub async fn persist(
    machine: ConversationMachine<(), Generated>,
    ctx: &mut ConversationContext<'_>,
) -> Result<ConversationMachine<(), Persisted>, AppError> {
    let orchestrator = ctx.orchestrator;
    let response = ctx.take_response()?;
    let chatbot = ctx.chatbot()?;

    let exchange = ChatExchange::new(
        ctx.message().to_string(),
        response,
        ctx.visitor_id.clone(),
        non_blank(ctx.request.visitor_name.as_deref()).map(str::to_string),
        chatbot.owner_id.clone(),
        chatbot.id.clone(),
    );

    let stored = match exchange.clone().append(&orchestrator.db).await {
        Ok(stored) => stored,
        Err(err) => {
            warn!(
                request_id = %ctx.request_id,
                exchange_id = %exchange.id,
                error = %err,
                "persisting exchange failed, buffering in memory"
            );
            orchestrator.buffer.push(exchange.clone()).await;
            exchange
        }
    };

    ctx.exchange = Some(stored);

    machine
        .persist()
        .map_err(|(_, guard)| map_guard_error("persist", &guard))
}

pub async fn index(
    machine: ConversationMachine<(), Persisted>,
    ctx: &mut ConversationContext<'_>,
) -> Result<ConversationMachine<(), Indexed>, AppError> {
    if let Some(exchange) = &ctx.exchange {
        // Failure is logged by the indexer and never blocks the reply.
        let indexed = ctx.orchestrator.indexer.index_exchange(exchange).await;
        debug!(request_id = %ctx.request_id, indexed, "exchange indexing finished");
    }

    machine
        .index()
        .map_err(|(_, guard)| map_guard_error("index", &guard))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid conversation transition during {event}: {guard:?}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            message: "hi".into(),
            ..ChatRequest::default()
        }
    }

    #[test]
    fn test_chatbot_lookup_precedence() {
        let mut req = request();
        assert_eq!(chatbot_lookup(&req), ChatbotLookup::Default);

        req.target_user_id = Some("owner-1".into());
        assert_eq!(chatbot_lookup(&req), ChatbotLookup::Owner("owner-1".into()));

        req.chatbot_slug = Some("user-owner-1".into());
        assert_eq!(chatbot_lookup(&req), ChatbotLookup::Slug("user-owner-1".into()));

        req.chatbot_id = Some("  ".into());
        assert_eq!(chatbot_lookup(&req), ChatbotLookup::Slug("user-owner-1".into()));

        req.chatbot_id = Some("bot-1".into());
        assert_eq!(chatbot_lookup(&req), ChatbotLookup::Id("bot-1".into()));
    }
}
