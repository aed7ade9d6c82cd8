use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(Project, "project", {
    owner_id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    details: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    content_html: Option<String>
});

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub details: String,
    /// Rich body. Either plain text or an editor JSON document with an `html` member.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_html: Option<String>,
}

impl Project {
    pub fn new(owner_id: String, input: ProjectInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            owner_id,
            title: input.title,
            description: input.description,
            category: input.category,
            details: input.details,
            content: input.content,
            content_html: input.content_html,
        }
    }

    pub async fn create(
        owner_id: &str,
        input: ProjectInput,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        if input.title.trim().is_empty() {
            return Err(AppError::Validation("Project title is required".into()));
        }

        db.store_item(Self::new(owner_id.to_string(), input))
            .await?
            .ok_or_else(|| AppError::InternalError("project was not stored".into()))
    }

    pub async fn list_for_owner(
        owner_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let projects: Vec<Self> = db
            .client
            .query("SELECT * FROM type::table($table) WHERE owner_id = $owner_id ORDER BY created_at ASC")
            .bind(("table", Self::table_name()))
            .bind(("owner_id", owner_id.to_string()))
            .await?
            .take(0)?;

        Ok(projects)
    }

    async fn get_owned(id: &str, owner_id: &str, db: &SurrealDbClient) -> Result<Self, AppError> {
        let project: Self = db
            .get_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project {id} not found")))?;

        if project.owner_id != owner_id {
            return Err(AppError::Forbidden(
                "You don't have access to this project".to_string(),
            ));
        }

        Ok(project)
    }

    pub async fn update(
        id: &str,
        owner_id: &str,
        input: ProjectInput,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let existing = Self::get_owned(id, owner_id, db).await?;

        let updated = Self {
            id: existing.id,
            created_at: existing.created_at,
            updated_at: Utc::now(),
            owner_id: existing.owner_id,
            title: input.title,
            description: input.description,
            category: input.category,
            details: input.details,
            content: input.content,
            content_html: input.content_html,
        };

        db.upsert_item(updated)
            .await?
            .ok_or_else(|| AppError::InternalError("project update returned nothing".into()))
    }

    pub async fn delete(id: &str, owner_id: &str, db: &SurrealDbClient) -> Result<(), AppError> {
        Self::get_owned(id, owner_id, db).await?;
        db.delete_item::<Self>(id).await?;
        Ok(())
    }
}
