use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(Document, "document", {
    owner_id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    file_name: String,
    text: String
});

impl Document {
    pub fn new(
        owner_id: String,
        title: String,
        description: Option<String>,
        file_name: String,
        text: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            owner_id,
            title,
            description: description.filter(|d| !d.trim().is_empty()),
            file_name,
            text,
        }
    }

    /// Loads a document and checks it belongs to `owner_id`.
    pub async fn get_owned(
        id: &str,
        owner_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let document: Self = db
            .get_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {id} not found")))?;

        if document.owner_id != owner_id {
            return Err(AppError::Forbidden(
                "You don't have access to this document".to_string(),
            ));
        }

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_owned_checks_owner() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");

        let doc = Document::new(
            "owner-1".into(),
            "Caching notes".into(),
            Some(String::new()),
            "notes.txt".into(),
            "Ava specializes in distributed caching.".into(),
        );
        assert!(doc.description.is_none());
        db.store_item(doc.clone()).await.expect("store");

        let owned = Document::get_owned(&doc.id, "owner-1", &db)
            .await
            .expect("owner can read");
        assert_eq!(owned.title, "Caching notes");

        let foreign = Document::get_owned(&doc.id, "owner-2", &db).await;
        assert!(matches!(foreign, Err(AppError::Forbidden(_))));
    }
}
