#![allow(clippy::module_name_repetitions)]
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

/// Sender recorded for visitor-initiated turns.
pub const VISITOR_SENDER: &str = "visitor";

// One visitor turn plus the answer shown for it. `created_at` is the exchange timestamp.
stored_object!(ChatExchange, "chat_exchange", {
    message: String,
    sender: String,
    response: String,
    visitor_id: String,
    #[serde(default)]
    visitor_name: Option<String>,
    owner_id: String,
    chatbot_id: String
});

/// Conjunctive filter over stored exchanges. Unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub visitor_id: Option<String>,
    pub chatbot_id: Option<String>,
    pub owner_id: Option<String>,
}

impl HistoryFilter {
    pub fn matches(&self, exchange: &ChatExchange) -> bool {
        self.visitor_id
            .as_deref()
            .is_none_or(|v| v == exchange.visitor_id)
            && self
                .chatbot_id
                .as_deref()
                .is_none_or(|c| c == exchange.chatbot_id)
            && self
                .owner_id
                .as_deref()
                .is_none_or(|o| o == exchange.owner_id)
    }
}

impl ChatExchange {
    pub fn new(
        message: String,
        response: String,
        visitor_id: String,
        visitor_name: Option<String>,
        owner_id: String,
        chatbot_id: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            message,
            sender: VISITOR_SENDER.to_string(),
            response,
            visitor_id,
            visitor_name,
            owner_id,
            chatbot_id,
        }
    }

    pub async fn append(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.store_item(self)
            .await?
            .ok_or_else(|| AppError::InternalError("chat exchange was not stored".into()))
    }

    /// Most recent exchanges matching `filter`, newest first.
    pub async fn query_recent(
        filter: &HistoryFilter,
        limit: usize,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let mut conditions = Vec::new();
        if filter.visitor_id.is_some() {
            conditions.push("visitor_id = $visitor_id");
        }
        if filter.chatbot_id.is_some() {
            conditions.push("chatbot_id = $chatbot_id");
        }
        if filter.owner_id.is_some() {
            conditions.push("owner_id = $owner_id");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT * FROM chat_exchange {where_clause} ORDER BY created_at DESC LIMIT {limit}"
        );

        let exchanges: Vec<Self> = db
            .client
            .query(sql)
            .bind(("visitor_id", filter.visitor_id.clone().unwrap_or_default()))
            .bind(("chatbot_id", filter.chatbot_id.clone().unwrap_or_default()))
            .bind(("owner_id", filter.owner_id.clone().unwrap_or_default()))
            .await?
            .take(0)?;

        Ok(exchanges)
    }
}
