use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use common::{
    storage::{
        db::SurrealDbClient,
        types::{
            content_unit::ContentCategory, document::Document, owner::Owner, profile::Profile,
            project::Project,
        },
        vector::{ContentFilter, SurrealVectorStore, VectorStore},
    },
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use ingestion_pipeline::ContentIndexer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Rebuilds the content index from the stored profiles, projects and documents.
#[derive(Debug, Parser)]
#[command(name = "reindex")]
struct Args {
    /// Drop every profile, project and document unit before indexing
    #[arg(long, default_value_t = false)]
    clear: bool,
}

#[derive(Debug, Default)]
struct Tally {
    indexed: usize,
    failed: usize,
}

impl Tally {
    fn record(&mut self, ok: bool) {
        if ok {
            self.indexed += 1;
        } else {
            self.failed += 1;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = Args::parse();
    let config = get_config()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );
    db.ensure_initialized().await?;

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));
    let embedding_provider =
        Arc::new(EmbeddingProvider::from_config(&config, Some(openai_client)).await?);
    let store: Arc<dyn VectorStore> =
        Arc::new(SurrealVectorStore::new(Arc::clone(&db), embedding_provider));

    if args.clear {
        clear(store.as_ref()).await?;
    }

    let indexer = ContentIndexer::new(store);
    reindex_all(&db, &indexer).await
}

async fn clear(store: &dyn VectorStore) -> Result<()> {
    for category in [
        ContentCategory::Profile,
        ContentCategory::Project,
        ContentCategory::Document,
    ] {
        let removed = store
            .delete(&ContentFilter::category(category))
            .await
            .with_context(|| format!("clearing {category} units"))?;
        info!(%category, removed, "Cleared indexed units");
    }
    Ok(())
}

async fn reindex_all(db: &SurrealDbClient, indexer: &ContentIndexer) -> Result<()> {
    let mut profiles = Tally::default();
    for profile in db.get_all_stored_items::<Profile>().await? {
        profiles.record(indexer.index_profile(&profile, profile.owner_id()).await);
    }

    let mut projects = Tally::default();
    for owner in db.get_all_stored_items::<Owner>().await? {
        let owned = Project::list_for_owner(&owner.id, db).await?;
        if owned.is_empty() {
            continue;
        }
        projects.record(indexer.index_projects(&owned, &owner.id).await);
    }

    let mut documents = Tally::default();
    for document in db.get_all_stored_items::<Document>().await? {
        documents.record(indexer.index_document(&document, &document.owner_id).await);
    }

    info!(
        profiles_indexed = profiles.indexed,
        profiles_failed = profiles.failed,
        project_owners_indexed = projects.indexed,
        project_owners_failed = projects.failed,
        documents_indexed = documents.indexed,
        documents_failed = documents.failed,
        "Reindex finished"
    );

    let failed = profiles.failed + projects.failed + documents.failed;
    if failed > 0 {
        warn!(failed, "Some records could not be indexed");
    }
    Ok(())
}
