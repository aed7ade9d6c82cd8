use std::sync::Arc;

use common::{
    error::AppError,
    storage::{
        types::{
            chat_exchange::ChatExchange,
            content_unit::{ContentCategory, ContentExtra, ContentUnit},
            document::Document,
            profile::Profile,
            project::Project,
        },
        vector::{ContentFilter, VectorStore},
    },
};
use tracing::{info, warn};

use crate::utils::{chunking::split_text, html::flatten_rich_content};

/// Keeps the vector store in sync with profile, project, document and conversation content.
///
/// Every call replaces the units of its partition (delete by filter, then insert) so
/// re-indexing the same source never accumulates duplicates. Failures are logged and
/// reported as `false`; callers decide whether that matters.
#[derive(Clone)]
pub struct ContentIndexer {
    store: Arc<dyn VectorStore>,
}

impl ContentIndexer {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    #[tracing::instrument(skip_all, fields(owner_id = %owner_id))]
    pub async fn index_profile(&self, profile: &Profile, owner_id: &str) -> bool {
        let result = async {
            let units = profile_units(profile, owner_id)?;
            self.replace(
                &ContentFilter::partition(ContentCategory::Profile, owner_id),
                units,
            )
            .await
        }
        .await;
        report(ContentCategory::Profile, owner_id, result)
    }

    #[tracing::instrument(skip_all, fields(owner_id = %owner_id, projects = projects.len()))]
    pub async fn index_projects(&self, projects: &[Project], owner_id: &str) -> bool {
        let result = async {
            let mut units = Vec::new();
            for project in projects {
                units.extend(project_units(project, owner_id)?);
            }
            self.replace(
                &ContentFilter::partition(ContentCategory::Project, owner_id),
                units,
            )
            .await
        }
        .await;
        report(ContentCategory::Project, owner_id, result)
    }

    #[tracing::instrument(skip_all, fields(owner_id = %owner_id, document_id = %document.id))]
    pub async fn index_document(&self, document: &Document, owner_id: &str) -> bool {
        let result = async {
            let units = document_units(document, owner_id)?;
            self.replace(
                &ContentFilter::partition(ContentCategory::Document, owner_id)
                    .with_document(&document.id),
                units,
            )
            .await
        }
        .await;
        report(ContentCategory::Document, owner_id, result)
    }

    /// Adds one conversation unit. Conversation units are append-only; the unit id is derived
    /// from the exchange id so a repeated call rewrites the same unit.
    #[tracing::instrument(skip_all, fields(owner_id = %exchange.owner_id, visitor_id = %exchange.visitor_id))]
    pub async fn index_exchange(&self, exchange: &ChatExchange) -> bool {
        let unit = exchange_unit(exchange);
        let result = self.store.upsert(vec![unit]).await.map(|()| 1);
        report(ContentCategory::Conversation, &exchange.owner_id, result)
    }

    /// Drops every unit of a document.
    pub async fn remove_document(&self, document_id: &str, owner_id: &str) -> bool {
        let filter =
            ContentFilter::partition(ContentCategory::Document, owner_id).with_document(document_id);
        match self.store.delete(&filter).await {
            Ok(removed) => {
                info!(%owner_id, %document_id, removed, "removed document units");
                true
            }
            Err(err) => {
                warn!(%owner_id, %document_id, error = %err, "failed to remove document units");
                false
            }
        }
    }

    async fn replace(
        &self,
        filter: &ContentFilter,
        units: Vec<ContentUnit>,
    ) -> Result<usize, AppError> {
        self.store.delete(filter).await?;
        let count = units.len();
        self.store.upsert(units).await?;
        Ok(count)
    }
}

fn report(category: ContentCategory, owner_id: &str, result: Result<usize, AppError>) -> bool {
    match result {
        Ok(units) => {
            info!(%category, %owner_id, units, "indexed content");
            true
        }
        Err(err) => {
            warn!(%category, %owner_id, error = %err, "indexing failed");
            false
        }
    }
}

/// Splits `text` and emits one unit per chunk. A single chunk keeps `base_id`; multiple
/// chunks get `{prefix}_{index}_{suffix}` ids plus chunk position metadata.
fn chunked_units(
    id_parts: (&str, &str),
    category: ContentCategory,
    subcategory: &str,
    owner_id: &str,
    text: &str,
    extra: &ContentExtra,
) -> Result<Vec<ContentUnit>, AppError> {
    let (prefix, suffix) = id_parts;
    let chunks = split_text(text)?;
    let total = chunks.len();

    if total == 1 {
        return Ok(chunks
            .into_iter()
            .map(|chunk| {
                ContentUnit::new(
                    format!("{prefix}_{suffix}"),
                    category,
                    subcategory,
                    owner_id,
                    chunk,
                    extra.clone(),
                )
            })
            .collect());
    }

    Ok(chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            let mut extra = extra.clone();
            extra.chunk_index = Some(index);
            extra.total_chunks = Some(total);
            ContentUnit::new(
                format!("{prefix}_{index}_{suffix}"),
                category,
                subcategory,
                owner_id,
                chunk,
                extra,
            )
        })
        .collect())
}

pub fn profile_units(profile: &Profile, owner_id: &str) -> Result<Vec<ContentUnit>, AppError> {
    let mut units = Vec::new();
    for (subcategory, value) in profile.indexable_fields() {
        units.extend(chunked_units(
            (subcategory, owner_id),
            ContentCategory::Profile,
            subcategory,
            owner_id,
            value,
            &ContentExtra::default(),
        )?);
    }
    Ok(units)
}

pub fn project_units(project: &Project, owner_id: &str) -> Result<Vec<ContentUnit>, AppError> {
    let extra = ContentExtra {
        project_id: Some(project.id.clone()),
        project_category: Some(project.category.clone()).filter(|c| !c.is_empty()),
        title: Some(project.title.clone()),
        ..Default::default()
    };

    let body = if project.content.trim().is_empty() && project.content_html.is_none() {
        String::new()
    } else {
        flatten_rich_content(&project.content, project.content_html.as_deref())
    };

    let fields = [
        ("title", project.title.as_str()),
        ("description", project.description.as_str()),
        ("details", project.details.as_str()),
        ("content", body.as_str()),
    ];

    let mut units = Vec::new();
    for (subcategory, text) in fields {
        if text.trim().is_empty() {
            continue;
        }
        let prefix = format!("project_{subcategory}_{}", project.id);
        units.extend(chunked_units(
            (&prefix, owner_id),
            ContentCategory::Project,
            subcategory,
            owner_id,
            text,
            &extra,
        )?);
    }
    Ok(units)
}

pub fn document_units(document: &Document, owner_id: &str) -> Result<Vec<ContentUnit>, AppError> {
    let extra = ContentExtra {
        document_id: Some(document.id.clone()),
        title: Some(document.title.clone()),
        ..Default::default()
    };

    let fields = [
        ("title", document.title.as_str()),
        ("description", document.description.as_deref().unwrap_or_default()),
        ("content", document.text.as_str()),
    ];

    let mut units = Vec::new();
    for (subcategory, text) in fields {
        if text.trim().is_empty() {
            continue;
        }
        let prefix = format!("document_{subcategory}_{}", document.id);
        units.extend(chunked_units(
            (&prefix, owner_id),
            ContentCategory::Document,
            subcategory,
            owner_id,
            text,
            &extra,
        )?);
    }
    Ok(units)
}

pub fn exchange_unit(exchange: &ChatExchange) -> ContentUnit {
    ContentUnit::new(
        format!("conversation_{}", exchange.id),
        ContentCategory::Conversation,
        "exchange",
        &exchange.owner_id,
        format!(
            "User asked: {}\nYou responded: {}",
            exchange.message, exchange.response
        ),
        ContentExtra {
            visitor_id: Some(exchange.visitor_id.clone()),
            chatbot_id: Some(exchange.chatbot_id.clone()),
            timestamp: Some(exchange.created_at.to_rfc3339()),
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use common::storage::{
        db::SurrealDbClient,
        types::{content_unit::ScoredUnit, project::ProjectInput},
        vector::SurrealVectorStore,
    };
    use common::utils::embedding::EmbeddingProvider;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    struct UnreachableStore;

    #[async_trait]
    impl VectorStore for UnreachableStore {
        async fn upsert(&self, _units: Vec<ContentUnit>) -> Result<(), AppError> {
            Err(AppError::InternalError("vector store unreachable".into()))
        }
        async fn delete(&self, _filter: &ContentFilter) -> Result<usize, AppError> {
            Err(AppError::InternalError("vector store unreachable".into()))
        }
        async fn query(
            &self,
            _text: &str,
            _top_k: usize,
            _filter: Option<&ContentFilter>,
        ) -> Result<Vec<ScoredUnit>, AppError> {
            Err(AppError::InternalError("vector store unreachable".into()))
        }
        async fn count(&self, _filter: Option<&ContentFilter>) -> Result<usize, AppError> {
            Err(AppError::InternalError("vector store unreachable".into()))
        }
        async fn exists(&self, _filter: &ContentFilter) -> Result<bool, AppError> {
            Err(AppError::InternalError("vector store unreachable".into()))
        }
    }

    async fn surreal_store() -> Arc<SurrealVectorStore> {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");
        let provider = EmbeddingProvider::new_hashed(64).expect("hashed provider");
        Arc::new(SurrealVectorStore::new(Arc::new(db), Arc::new(provider)))
    }

    fn profile(owner_id: &str) -> Profile {
        Profile {
            id: owner_id.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            name: "Ava".into(),
            location: "Lisbon".into(),
            bio: "Backend engineer".into(),
            skills: "Rust, caching".into(),
            experience: String::new(),
            interests: String::new(),
            calendly_link: None,
            meeting_rules: None,
        }
    }

    fn document(owner_id: &str, text: String) -> Document {
        Document::new(
            owner_id.into(),
            "Caching handbook".into(),
            Some("Internal notes".into()),
            "handbook.txt".into(),
            text,
        )
    }

    #[test]
    fn test_unit_ids_are_deterministic() {
        let profile = profile("owner-1");
        let first: Vec<String> = profile_units(&profile, "owner-1")
            .expect("units")
            .into_iter()
            .map(|u| u.id)
            .collect();
        let second: Vec<String> = profile_units(&profile, "owner-1")
            .expect("units")
            .into_iter()
            .map(|u| u.id)
            .collect();

        assert_eq!(first, second);
        assert!(first.contains(&"name_owner-1".to_string()));
        assert!(first.contains(&"bio_owner-1".to_string()));
        assert!(!first.iter().any(|id| id.starts_with("experience_")));
    }

    #[test]
    fn test_long_document_is_chunked_with_positions() {
        let doc = document("owner-1", "Consistent hashing spreads keys. ".repeat(80));
        let units = document_units(&doc, "owner-1").expect("units");

        let content: Vec<&ContentUnit> = units
            .iter()
            .filter(|u| u.subcategory == "content")
            .collect();
        assert!(content.len() > 1);
        for (index, unit) in content.iter().enumerate() {
            assert_eq!(unit.extra.chunk_index, Some(index));
            assert_eq!(unit.extra.total_chunks, Some(content.len()));
            assert_eq!(
                unit.id,
                format!("document_content_{}_{index}_owner-1", doc.id)
            );
            assert_eq!(unit.extra.document_id.as_deref(), Some(doc.id.as_str()));
        }
        assert!(units.iter().any(|u| u.id == format!("document_title_{}_owner-1", doc.id)));
    }

    #[test]
    fn test_project_content_is_flattened() {
        let project = Project::new(
            "owner-1".into(),
            ProjectInput {
                title: "Edge cache".into(),
                content: r#"{"html": "<p>Built an <em>edge</em> cache</p>"}"#.into(),
                ..Default::default()
            },
        );
        let units = project_units(&project, "owner-1").expect("units");
        let content = units
            .iter()
            .find(|u| u.subcategory == "content")
            .expect("content unit");
        assert_eq!(content.text, "Built an edge cache");
        assert_eq!(
            content.id,
            format!("project_content_{}_owner-1", project.id)
        );
    }

    #[test]
    fn test_exchange_unit_shape() {
        let exchange = ChatExchange::new(
            "What do you do?".into(),
            "I build caches.".into(),
            "visitor-1".into(),
            None,
            "owner-1".into(),
            "bot-1".into(),
        );
        let unit = exchange_unit(&exchange);
        assert_eq!(unit.id, format!("conversation_{}", exchange.id));
        assert_eq!(unit.text, "User asked: What do you do?\nYou responded: I build caches.");
        assert_eq!(unit.extra.visitor_id.as_deref(), Some("visitor-1"));
        assert!(unit.extra.timestamp.is_some());
    }

    #[tokio::test]
    async fn test_reindexing_is_idempotent() {
        let store = surreal_store().await;
        let indexer = ContentIndexer::new(store.clone());
        let profile = profile("owner-1");
        let doc = document("owner-1", "Ava specializes in distributed caching.".into());

        assert!(indexer.index_profile(&profile, "owner-1").await);
        assert!(indexer.index_document(&doc, "owner-1").await);
        let before = store.count(None).await.expect("count");

        assert!(indexer.index_profile(&profile, "owner-1").await);
        assert!(indexer.index_document(&doc, "owner-1").await);
        let after = store.count(None).await.expect("count");

        assert_eq!(before, after);
        let expected: BTreeSet<String> = profile_units(&profile, "owner-1")
            .expect("units")
            .into_iter()
            .chain(document_units(&doc, "owner-1").expect("units"))
            .map(|u| u.id)
            .collect();
        assert_eq!(after, expected.len());
    }

    #[tokio::test]
    async fn test_reindex_drops_stale_units() {
        let store = surreal_store().await;
        let indexer = ContentIndexer::new(store.clone());
        let mut profile = profile("owner-1");

        assert!(indexer.index_profile(&profile, "owner-1").await);
        profile.skills = String::new();
        assert!(indexer.index_profile(&profile, "owner-1").await);

        let filter = ContentFilter::partition(ContentCategory::Profile, "owner-1");
        assert_eq!(store.count(Some(&filter)).await.expect("count"), 3);
    }

    #[tokio::test]
    async fn test_unreachable_store_reports_false() {
        let indexer = ContentIndexer::new(Arc::new(UnreachableStore));
        assert!(!indexer.index_profile(&profile("owner-1"), "owner-1").await);
        assert!(!indexer.remove_document("doc", "owner-1").await);
    }
}
