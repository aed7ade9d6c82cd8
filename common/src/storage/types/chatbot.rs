use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(Chatbot, "chatbot", {
    owner_id: String,
    name: String,
    slug: String
});

/// How a chat request names the assistant it is talking to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatbotLookup {
    Id(String),
    Slug(String),
    /// The owner's chatbot, created on first use.
    Owner(String),
    /// The first chatbot in the store.
    Default,
}

impl Chatbot {
    pub fn new(owner_id: String) -> Self {
        let now = Utc::now();
        let slug_suffix: String = owner_id.chars().take(8).collect();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            slug: format!("user-{slug_suffix}"),
            name: "My AI Assistant".to_string(),
            owner_id,
        }
    }

    async fn first_where(
        field: &'static str,
        value: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let sql = format!("SELECT * FROM chatbot WHERE {field} = $value ORDER BY created_at ASC LIMIT 1");
        let chatbot: Option<Self> = db
            .client
            .query(sql)
            .bind(("value", value.to_string()))
            .await?
            .take(0)?;
        Ok(chatbot)
    }

    /// Resolves a chatbot. `Owner` lookups create the owner's default chatbot when none exists;
    /// every other lookup returns `None` when nothing matches.
    pub async fn get_or_create(
        lookup: &ChatbotLookup,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        match lookup {
            ChatbotLookup::Id(id) => Ok(db.get_item::<Self>(id).await?),
            ChatbotLookup::Slug(slug) => Self::first_where("slug", slug, db).await,
            ChatbotLookup::Owner(owner_id) => {
                if let Some(existing) = Self::first_where("owner_id", owner_id, db).await? {
                    return Ok(Some(existing));
                }
                let created = db.store_item(Self::new(owner_id.clone())).await?;
                if let Some(chatbot) = &created {
                    tracing::info!(owner_id = %owner_id, chatbot_id = %chatbot.id, "created default chatbot");
                }
                Ok(created)
            }
            ChatbotLookup::Default => {
                let chatbot: Option<Self> = db
                    .client
                    .query("SELECT * FROM chatbot ORDER BY created_at ASC LIMIT 1")
                    .await?
                    .take(0)?;
                Ok(chatbot)
            }
        }
    }
}
