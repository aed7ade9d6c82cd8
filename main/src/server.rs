use std::sync::Arc;

use api_router::{api_routes, api_state::ApiState};
use axum::Router;
use common::{
    storage::{db::SurrealDbClient, vector::SurrealVectorStore},
    utils::{config::get_config, embedding::EmbeddingProvider, llm::OpenAiChatModel},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
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

    // Ensure db is initialized
    db.ensure_initialized().await?;

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    let embedding_provider = Arc::new(
        EmbeddingProvider::from_config(&config, Some(Arc::clone(&openai_client))).await?,
    );
    info!(
        embedding_backend = embedding_provider.backend_label(),
        embedding_dimension = embedding_provider.dimension(),
        embedding_model = ?embedding_provider.model_code(),
        "Embedding provider initialized"
    );

    let vector_store = Arc::new(SurrealVectorStore::new(Arc::clone(&db), embedding_provider));
    let chat_model = Arc::new(OpenAiChatModel::new(openai_client, &config));

    let api_state = ApiState::new(&config, db, vector_store, chat_model);
    let app = build_app(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_app(api_state: ApiState) -> Router {
    Router::new()
        .merge(api_routes(&api_state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(api_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use common::utils::{
        config::AppConfig,
        embedding::EmbeddingBackend,
        testing::MockChatModel,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    fn smoke_test_config(namespace: &str, database: &str) -> AppConfig {
        AppConfig {
            openai_api_key: "test-key".into(),
            surrealdb_address: "mem://".into(),
            surrealdb_username: "root".into(),
            surrealdb_password: "root".into(),
            surrealdb_namespace: namespace.into(),
            surrealdb_database: database.into(),
            http_port: 0,
            openai_base_url: "https://example.com".into(),
            embedding_backend: EmbeddingBackend::Hashed,
            embedding_dimensions: 64,
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn smoke_startup_with_in_memory_surrealdb() {
        let namespace = "test_ns";
        let database = format!("test_db_{}", Uuid::new_v4());
        let config = smoke_test_config(namespace, &database);

        let db = Arc::new(
            SurrealDbClient::memory(namespace, &database)
                .await
                .expect("failed to start in-memory surrealdb"),
        );
        db.ensure_initialized()
            .await
            .expect("failed to build indexes");

        // Use hashed embeddings for tests to avoid external dependencies
        let embedding_provider = Arc::new(
            EmbeddingProvider::from_config(&config, None)
                .await
                .expect("failed to create hashed embedding provider"),
        );
        let vector_store = Arc::new(SurrealVectorStore::new(Arc::clone(&db), embedding_provider));

        let api_state = ApiState::new(
            &config,
            db,
            vector_store,
            Arc::new(MockChatModel::replying("Hello there.")),
        );
        let app = build_app(api_state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/live")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);

        let ready_response = app
            .oneshot(
                Request::builder()
                    .uri("/ready")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("ready response");
        assert_eq!(ready_response.status(), StatusCode::OK);
    }
}
