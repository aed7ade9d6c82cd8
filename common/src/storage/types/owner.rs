use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(Owner, "owner", {
    name: String,
    api_key: String
});

impl Owner {
    pub fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            name,
            api_key: format!("pk_{}", Uuid::new_v4().simple()),
        }
    }

    pub async fn find_by_api_key(
        api_key: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let owner: Option<Owner> = db
            .client
            .query("SELECT * FROM owner WHERE api_key = $api_key LIMIT 1")
            .bind(("api_key", api_key.to_string()))
            .await?
            .take(0)?;

        Ok(owner)
    }

    /// Persists a fresh owner. The returned record carries the generated API key.
    pub async fn create(name: &str, db: &SurrealDbClient) -> Result<Self, AppError> {
        let owner = Self::new(name.to_string());
        db.store_item(owner)
            .await?
            .ok_or_else(|| AppError::InternalError("owner was not stored".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_by_api_key() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");

        let owner = Owner::create("Ava", &db).await.expect("create owner");
        assert!(owner.api_key.starts_with("pk_"));

        let found = Owner::find_by_api_key(&owner.api_key, &db)
            .await
            .expect("lookup");
        assert_eq!(found.map(|o| o.id), Some(owner.id));

        let missing = Owner::find_by_api_key("pk_unknown", &db)
            .await
            .expect("lookup");
        assert!(missing.is_none());
    }
}
