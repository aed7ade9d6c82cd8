use std::sync::Arc;

use common::{
    storage::{db::SurrealDbClient, vector::VectorStore},
    utils::{config::AppConfig, llm::ChatModel},
};
use ingestion_pipeline::ContentIndexer;

use crate::conversation::ConversationOrchestrator;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub indexer: ContentIndexer,
    pub conversation: ConversationOrchestrator,
}

impl ApiState {
    /// Wires the shared services. The database is expected to be connected and initialized.
    pub fn new(
        config: &AppConfig,
        db: Arc<SurrealDbClient>,
        vector_store: Arc<dyn VectorStore>,
        chat_model: Arc<dyn ChatModel>,
    ) -> Self {
        let conversation = ConversationOrchestrator::new(
            Arc::clone(&db),
            Arc::clone(&vector_store),
            chat_model,
            config,
        );

        Self {
            db,
            config: config.clone(),
            indexer: ContentIndexer::new(vector_store),
            conversation,
        }
    }
}
