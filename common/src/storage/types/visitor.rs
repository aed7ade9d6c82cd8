use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

// Record id is the client-supplied visitor id; `updated_at` doubles as last seen.
stored_object!(Visitor, "visitor", {
    #[serde(default)]
    name: Option<String>
});

impl Visitor {
    /// Records a visit. Refreshes last seen and fills the name if the stored one is empty.
    pub async fn get_or_create(
        visitor_id: &str,
        name: Option<&str>,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let now = Utc::now();
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        let visitor = match db.get_item::<Self>(visitor_id).await? {
            Some(mut existing) => {
                existing.updated_at = now;
                if existing.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
                    existing.name = name.map(str::to_string);
                }
                existing
            }
            None => Self {
                id: visitor_id.to_string(),
                created_at: now,
                updated_at: now,
                name: name.map(str::to_string),
            },
        };

        Ok(db.upsert_item(visitor).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_get_or_create_fills_missing_name_only() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");

        let first = Visitor::get_or_create("visitor-1", None, &db)
            .await
            .expect("create")
            .expect("visitor");
        assert!(first.name.is_none());

        let named = Visitor::get_or_create("visitor-1", Some("Sam"), &db)
            .await
            .expect("update")
            .expect("visitor");
        assert_eq!(named.name.as_deref(), Some("Sam"));
        assert!(named.updated_at >= first.updated_at);

        let renamed = Visitor::get_or_create("visitor-1", Some("Other"), &db)
            .await
            .expect("update")
            .expect("visitor");
        assert_eq!(renamed.name.as_deref(), Some("Sam"));
    }
}
