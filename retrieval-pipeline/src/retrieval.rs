use std::{cmp::Ordering, sync::Arc, time::Instant};

use common::{
    storage::{
        types::content_unit::{ContentCategory, ContentExtra, ScoredUnit},
        vector::{ContentFilter, VectorStore},
    },
    utils::config::RetrievalSettings,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// One grounding snippet with its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedEntry {
    pub text: String,
    pub category: ContentCategory,
    pub subcategory: String,
    pub distance: f32,
    pub extra: ContentExtra,
}

impl From<ScoredUnit> for RetrievedEntry {
    fn from(scored: ScoredUnit) -> Self {
        Self {
            text: scored.unit.text,
            category: scored.unit.category,
            subcategory: scored.unit.subcategory,
            distance: scored.distance,
            extra: scored.unit.extra,
        }
    }
}

/// Per-request retrieval output, ascending by distance. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub entries: Vec<RetrievedEntry>,
    /// Whether the search was bound to a known owner. Drives the sectioned prompt layout.
    pub owner_scoped: bool,
}

impl RetrievalResult {
    pub fn empty(owner_scoped: bool) -> Self {
        Self {
            entries: Vec::new(),
            owner_scoped,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_category(&self, category: ContentCategory) -> bool {
        self.entries.iter().any(|e| e.category == category)
    }
}

/// Category-scoped semantic search over the content index.
#[derive(Clone)]
pub struct RetrievalEngine {
    store: Arc<dyn VectorStore>,
    settings: RetrievalSettings,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn VectorStore>, settings: RetrievalSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Searches documents, profile, projects and (for a known visitor) prior conversation in
    /// that priority order, then merges by distance.
    ///
    /// Falls back to one unscoped query when no partition yields anything. Errors never escape:
    /// a failing partition contributes nothing and total failure yields an empty result.
    #[instrument(skip_all, fields(owner_id = owner_id.unwrap_or("-"), visitor_id = visitor_id.unwrap_or("-"), top_k))]
    pub async fn retrieve(
        &self,
        query: &str,
        owner_id: Option<&str>,
        visitor_id: Option<&str>,
        top_k: usize,
        include_conversation: bool,
    ) -> RetrievalResult {
        let started = Instant::now();
        let mut plan: Vec<(ContentFilter, usize)> = Vec::new();

        if let Some(owner_id) = owner_id {
            plan.push((
                ContentFilter::partition(ContentCategory::Document, owner_id),
                self.settings.document_top_k,
            ));
            plan.push((ContentFilter::partition(ContentCategory::Profile, owner_id), top_k));
            plan.push((ContentFilter::partition(ContentCategory::Project, owner_id), top_k));
        }
        if let (Some(visitor_id), true) = (visitor_id, include_conversation) {
            plan.push((
                ContentFilter::category(ContentCategory::Conversation).with_visitor(visitor_id),
                self.settings.conversation_top_k,
            ));
        }

        let mut entries: Vec<RetrievedEntry> = Vec::new();
        for (filter, limit) in &plan {
            let found = self.scoped_query(query, filter, *limit).await;
            entries.extend(found);
        }

        if entries.is_empty() {
            entries = self.unscoped_query(query, owner_id, top_k).await;
        }

        // Stable: ties keep merge order.
        entries.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));

        info!(
            entries = entries.len(),
            partitions = plan.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "retrieval finished"
        );

        RetrievalResult {
            entries,
            owner_scoped: owner_id.is_some(),
        }
    }

    async fn scoped_query(
        &self,
        query: &str,
        filter: &ContentFilter,
        limit: usize,
    ) -> Vec<RetrievedEntry> {
        let category = filter.category.map_or("any", ContentCategory::as_str);

        match self.store.exists(filter).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(category, "partition empty, skipping similarity query");
                return Vec::new();
            }
            Err(err) => {
                warn!(category, error = %err, "existence probe failed");
                return Vec::new();
            }
        }

        match self.store.query(query, limit, Some(filter)).await {
            Ok(hits) => {
                debug!(category, hits = hits.len(), "partition query finished");
                hits.into_iter().map(RetrievedEntry::from).collect()
            }
            Err(err) => {
                warn!(category, error = %err, "partition query failed");
                Vec::new()
            }
        }
    }

    async fn unscoped_query(
        &self,
        query: &str,
        owner_id: Option<&str>,
        top_k: usize,
    ) -> Vec<RetrievedEntry> {
        let total = match self.store.count(None).await {
            Ok(0) => return Vec::new(),
            Ok(total) => total,
            Err(err) => {
                warn!(error = %err, "collection count failed");
                return Vec::new();
            }
        };

        match self.store.query(query, top_k.min(total), None).await {
            Ok(hits) => hits
                .into_iter()
                .filter(|hit| owner_id.is_none_or(|owner| hit.unit.owner_id == owner))
                .map(RetrievedEntry::from)
                .collect(),
            Err(err) => {
                warn!(error = %err, "unscoped query failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{
        storage::types::content_unit::ContentUnit,
        utils::testing::MockVectorStore,
    };

    fn unit(id: &str, category: ContentCategory, owner: &str, text: &str) -> ContentUnit {
        ContentUnit::new(
            id.into(),
            category,
            "content",
            owner,
            text.into(),
            ContentExtra::default(),
        )
    }

    fn engine(store: Arc<MockVectorStore>) -> RetrievalEngine {
        RetrievalEngine::new(store, RetrievalSettings::default())
    }

    #[tokio::test]
    async fn test_document_wins_distance_ties() {
        let store = Arc::new(MockVectorStore::new());
        store
            .insert(unit("p", ContentCategory::Profile, "owner-1", "bio"), 0.3)
            .await;
        store
            .insert(unit("d", ContentCategory::Document, "owner-1", "doc"), 0.3)
            .await;
        store
            .insert(unit("j", ContentCategory::Project, "owner-1", "proj"), 0.3)
            .await;

        let result = engine(store)
            .retrieve("anything", Some("owner-1"), None, 8, true)
            .await;

        let order: Vec<ContentCategory> = result.entries.iter().map(|e| e.category).collect();
        assert_eq!(
            order,
            vec![
                ContentCategory::Document,
                ContentCategory::Profile,
                ContentCategory::Project
            ]
        );
        assert!(result.owner_scoped);
    }

    #[tokio::test]
    async fn test_merged_results_sorted_by_distance() {
        let store = Arc::new(MockVectorStore::new());
        store
            .insert(unit("d", ContentCategory::Document, "owner-1", "doc"), 0.7)
            .await;
        store
            .insert(unit("p", ContentCategory::Profile, "owner-1", "bio"), 0.1)
            .await;

        let result = engine(store)
            .retrieve("anything", Some("owner-1"), None, 8, true)
            .await;
        let distances: Vec<f32> = result.entries.iter().map(|e| e.distance).collect();
        assert_eq!(distances, vec![0.1, 0.7]);
    }

    #[tokio::test]
    async fn test_conversation_scoped_to_visitor_and_capped() {
        let store = Arc::new(MockVectorStore::new());
        for i in 0..5 {
            let mut conv = unit(
                &format!("c{i}"),
                ContentCategory::Conversation,
                "owner-1",
                "User asked: hi",
            );
            conv.extra.visitor_id = Some("visitor-1".into());
            store.insert(conv, 0.2).await;
        }
        let mut foreign = unit("x", ContentCategory::Conversation, "owner-1", "other visitor");
        foreign.extra.visitor_id = Some("visitor-2".into());
        store.insert(foreign, 0.0).await;

        let result = engine(store.clone())
            .retrieve("hi", Some("owner-1"), Some("visitor-1"), 8, true)
            .await;
        assert_eq!(result.entries.len(), 3);
        assert!(result
            .entries
            .iter()
            .all(|e| e.extra.visitor_id.as_deref() == Some("visitor-1")));

        let without = engine(store)
            .retrieve("hi", Some("owner-1"), Some("visitor-1"), 8, false)
            .await;
        // no partition matched, so the unscoped fallback answers
        assert!(!without.is_empty());
    }

    #[tokio::test]
    async fn test_empty_partitions_are_not_queried() {
        let store = Arc::new(MockVectorStore::new());
        store
            .insert(unit("p", ContentCategory::Profile, "owner-1", "bio"), 0.2)
            .await;

        engine(store.clone())
            .retrieve("anything", Some("owner-1"), None, 8, true)
            .await;

        let queried = store.queried_filters().await;
        assert_eq!(queried.len(), 1);
        assert_eq!(
            queried[0].as_ref().and_then(|f| f.category),
            Some(ContentCategory::Profile)
        );
    }

    #[tokio::test]
    async fn test_fallback_is_post_filtered_by_owner() {
        let store = Arc::new(MockVectorStore::new());
        let mut orphan = unit("o", ContentCategory::Conversation, "owner-1", "old chat");
        orphan.extra.visitor_id = Some("visitor-9".into());
        store.insert(orphan, 0.4).await;
        store
            .insert(unit("z", ContentCategory::Profile, "owner-2", "someone else"), 0.1)
            .await;

        let result = engine(store.clone())
            .retrieve("chat", Some("owner-1"), None, 8, true)
            .await;
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].text, "old chat");

        let unknown = engine(store)
            .retrieve("chat", Some("nobody"), None, 8, true)
            .await;
        assert!(unknown.is_empty());
    }

    #[tokio::test]
    async fn test_empty_store_and_failing_store_yield_empty() {
        let empty = engine(Arc::new(MockVectorStore::new()))
            .retrieve("anything", Some("owner-1"), Some("visitor-1"), 8, true)
            .await;
        assert!(empty.is_empty());

        let failing = engine(Arc::new(MockVectorStore::failing()))
            .retrieve("anything", Some("owner-1"), Some("visitor-1"), 8, true)
            .await;
        assert!(failing.is_empty());
    }
}
