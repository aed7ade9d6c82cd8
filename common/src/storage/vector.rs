use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::content_unit::{ContentCategory, ContentExtra, ContentUnit, ScoredUnit},
    },
    utils::embedding::EmbeddingProvider,
};

const UNIT_TABLE: &str = "content_unit";

/// Distance assigned to hits whose similarity is undefined (zero vectors).
const UNDEFINED_DISTANCE: f32 = 2.0;

/// Conjunctive equality filter over unit metadata. Unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFilter {
    pub category: Option<ContentCategory>,
    pub owner_id: Option<String>,
    pub visitor_id: Option<String>,
    pub document_id: Option<String>,
    pub project_id: Option<String>,
}

impl ContentFilter {
    pub fn category(category: ContentCategory) -> Self {
        Self {
            category: Some(category),
            ..Default::default()
        }
    }

    pub fn partition(category: ContentCategory, owner_id: &str) -> Self {
        Self {
            category: Some(category),
            owner_id: Some(owner_id.to_string()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_document(mut self, document_id: &str) -> Self {
        self.document_id = Some(document_id.to_string());
        self
    }

    #[must_use]
    pub fn with_visitor(mut self, visitor_id: &str) -> Self {
        self.visitor_id = Some(visitor_id.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn matches(&self, unit: &ContentUnit) -> bool {
        self.category.is_none_or(|c| c == unit.category)
            && self.owner_id.as_deref().is_none_or(|o| o == unit.owner_id)
            && self
                .visitor_id
                .as_deref()
                .is_none_or(|v| unit.extra.visitor_id.as_deref() == Some(v))
            && self
                .document_id
                .as_deref()
                .is_none_or(|d| unit.extra.document_id.as_deref() == Some(d))
            && self
                .project_id
                .as_deref()
                .is_none_or(|p| unit.extra.project_id.as_deref() == Some(p))
    }

    /// SurrealQL `WHERE` clause plus its bindings. Empty string when unconstrained.
    fn to_where(&self) -> (String, Vec<(&'static str, String)>) {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();

        if let Some(category) = self.category {
            conditions.push("category = $category");
            binds.push(("category", category.as_str().to_string()));
        }
        if let Some(owner_id) = &self.owner_id {
            conditions.push("owner_id = $owner_id");
            binds.push(("owner_id", owner_id.clone()));
        }
        if let Some(visitor_id) = &self.visitor_id {
            conditions.push("extra.visitor_id = $visitor_id");
            binds.push(("visitor_id", visitor_id.clone()));
        }
        if let Some(document_id) = &self.document_id {
            conditions.push("extra.document_id = $document_id");
            binds.push(("document_id", document_id.clone()));
        }
        if let Some(project_id) = &self.project_id {
            conditions.push("extra.project_id = $project_id");
            binds.push(("project_id", project_id.clone()));
        }

        if conditions.is_empty() {
            (String::new(), binds)
        } else {
            (format!("WHERE {}", conditions.join(" AND ")), binds)
        }
    }
}

/// Semantic index over [`ContentUnit`]s.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or replaces units by id, embedding their text.
    async fn upsert(&self, units: Vec<ContentUnit>) -> Result<(), AppError>;

    /// Removes every unit matching `filter`. An empty filter is rejected.
    async fn delete(&self, filter: &ContentFilter) -> Result<usize, AppError>;

    /// Up to `top_k` units closest to `text`, ascending by distance.
    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&ContentFilter>,
    ) -> Result<Vec<ScoredUnit>, AppError>;

    async fn count(&self, filter: Option<&ContentFilter>) -> Result<usize, AppError>;

    /// Cheap probe: does at least one unit match?
    async fn exists(&self, filter: &ContentFilter) -> Result<bool, AppError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredUnit {
    category: ContentCategory,
    subcategory: String,
    owner_id: String,
    text: String,
    extra: ContentExtra,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct UnitHit {
    id: String,
    category: ContentCategory,
    subcategory: String,
    owner_id: String,
    text: String,
    #[serde(default)]
    extra: ContentExtra,
    distance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: i64,
}

/// [`VectorStore`] over a SurrealDB table. Embeddings are computed at upsert time and
/// similarity is exact cosine distance over the filtered rows.
pub struct SurrealVectorStore {
    db: Arc<SurrealDbClient>,
    embedding_provider: Arc<EmbeddingProvider>,
}

impl SurrealVectorStore {
    pub fn new(db: Arc<SurrealDbClient>, embedding_provider: Arc<EmbeddingProvider>) -> Self {
        Self {
            db,
            embedding_provider,
        }
    }
}

#[async_trait]
impl VectorStore for SurrealVectorStore {
    async fn upsert(&self, units: Vec<ContentUnit>) -> Result<(), AppError> {
        if units.is_empty() {
            return Ok(());
        }

        let texts = units.iter().map(|u| u.text.clone()).collect();
        let embeddings = self.embedding_provider.embed_batch(texts).await?;
        if embeddings.len() != units.len() {
            return Err(AppError::InternalError(format!(
                "embedding count mismatch: {} units, {} embeddings",
                units.len(),
                embeddings.len()
            )));
        }

        for (unit, embedding) in units.into_iter().zip(embeddings) {
            let record = StoredUnit {
                category: unit.category,
                subcategory: unit.subcategory,
                owner_id: unit.owner_id,
                text: unit.text,
                extra: unit.extra,
                embedding,
            };
            let _stored: Option<StoredUnit> = self
                .db
                .upsert((UNIT_TABLE, unit.id))
                .content(record)
                .await?;
        }

        Ok(())
    }

    async fn delete(&self, filter: &ContentFilter) -> Result<usize, AppError> {
        if filter.is_empty() {
            return Err(AppError::Validation(
                "refusing to delete content units without a filter".into(),
            ));
        }

        let removed = self.count(Some(filter)).await?;

        let (where_clause, binds) = filter.to_where();
        let sql = format!("DELETE {UNIT_TABLE} {where_clause} RETURN NONE");
        let mut query = self.db.client.query(sql);
        for bind in binds {
            query = query.bind(bind);
        }
        query.await?.check()?;

        debug!(removed, ?filter, "deleted content units");
        Ok(removed)
    }

    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&ContentFilter>,
    ) -> Result<Vec<ScoredUnit>, AppError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedding_provider.embed(text).await?;
        let (where_clause, binds) = filter.map(ContentFilter::to_where).unwrap_or_default();

        let sql = format!(
            "SELECT meta::id(id) AS id, category, subcategory, owner_id, text, extra, \
             1 - vector::similarity::cosine(embedding, $embedding) AS distance \
             FROM {UNIT_TABLE} {where_clause} ORDER BY distance ASC LIMIT {top_k}"
        );
        let mut query = self.db.client.query(sql).bind(("embedding", embedding));
        for bind in binds {
            query = query.bind(bind);
        }
        let hits: Vec<UnitHit> = query.await?.take(0)?;

        let mut scored: Vec<ScoredUnit> = hits
            .into_iter()
            .map(|hit| {
                #[allow(clippy::cast_possible_truncation)]
                let distance = hit
                    .distance
                    .map(|d| d as f32)
                    .filter(|d| d.is_finite())
                    .unwrap_or(UNDEFINED_DISTANCE);
                ScoredUnit {
                    unit: ContentUnit {
                        id: hit.id,
                        category: hit.category,
                        subcategory: hit.subcategory,
                        owner_id: hit.owner_id,
                        text: hit.text,
                        extra: hit.extra,
                    },
                    distance,
                }
            })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        Ok(scored)
    }

    async fn count(&self, filter: Option<&ContentFilter>) -> Result<usize, AppError> {
        let (where_clause, binds) = filter.map(ContentFilter::to_where).unwrap_or_default();
        let sql = format!("SELECT count() AS count FROM {UNIT_TABLE} {where_clause} GROUP ALL");
        let mut query = self.db.client.query(sql);
        for bind in binds {
            query = query.bind(bind);
        }
        let row: Option<CountRow> = query.await?.take(0)?;

        Ok(row.map_or(0, |r| usize::try_from(r.count).unwrap_or(0)))
    }

    async fn exists(&self, filter: &ContentFilter) -> Result<bool, AppError> {
        let (where_clause, binds) = filter.to_where();
        let sql = format!("SELECT VALUE meta::id(id) FROM {UNIT_TABLE} {where_clause} LIMIT 1");
        let mut query = self.db.client.query(sql);
        for bind in binds {
            query = query.bind(bind);
        }
        let rows: Vec<String> = query.await?.take(0)?;

        Ok(!rows.is_empty())
    }
}
