use std::sync::Arc;

use api_router::{api_routes, api_state::ApiState};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::{
    storage::{
        db::SurrealDbClient,
        types::{
            document::Document,
            owner::Owner,
            project::{Project, ProjectInput},
        },
    },
    utils::{
        config::AppConfig,
        testing::{MockChatModel, MockVectorStore},
    },
};
use ingestion_pipeline::utils::file_text_extraction::EMPTY_EXTRACTION_PLACEHOLDER;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    db: Arc<SurrealDbClient>,
    store: Arc<MockVectorStore>,
    owner: Owner,
}

async fn test_app(reply: &str) -> TestApp {
    let db = Arc::new(
        SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb"),
    );
    db.ensure_initialized().await.expect("indexes");
    let owner = Owner::create("Ava", &db).await.expect("owner");

    let store = Arc::new(MockVectorStore::new());
    let state = ApiState::new(
        &AppConfig::default(),
        Arc::clone(&db),
        store.clone(),
        Arc::new(MockChatModel::replying(reply)),
    );
    let router = Router::new().merge(api_routes(&state)).with_state(state);

    TestApp {
        router,
        db,
        store,
        owner,
    }
}

fn json_request(method: &str, uri: &str, api_key: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

const BOUNDARY: &str = "portfolio-test-boundary";

struct Upload<'a> {
    file_name: &'a str,
    content_type: &'a str,
    bytes: &'a [u8],
}

fn multipart_request(api_key: &str, fields: &[(&str, &str)], upload: &Upload<'_>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            upload.file_name, upload.content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(upload.bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/documents/process")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("X-API-Key", api_key)
        .body(Body::from(body))
        .expect("request")
}

fn delete_request(uri: &str, api_key: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("X-API-Key", api_key)
        .body(Body::empty())
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn chat_returns_response_and_timing() {
    let app = test_app("I build distributed caches.").await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/chat",
            None,
            &json!({
                "message": "What do you do?",
                "visitor_id": "visitor-1",
                "visitor_name": "Sam",
                "target_user_id": app.owner.id,
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["response"], "I build distributed caches.");
    assert!(body["query_time_ms"].is_u64());

    let history = app
        .router
        .oneshot(
            Request::builder()
                .uri("/chat/history?visitor_id=visitor-1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(history.status(), StatusCode::OK);
    let body = body_json(history).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["history"][0]["message"], "What do you do?");
    assert_eq!(body["history"][0]["visitor_name"], "Sam");
}

#[tokio::test]
async fn chat_with_unknown_chatbot_is_not_found() {
    let app = test_app("unused").await;

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/chat",
            None,
            &json!({ "message": "hello", "chatbot_id": "no-such-bot" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn empty_message_gets_clarification() {
    let app = test_app("unused").await;

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/chat",
            None,
            &json!({ "message": "  ", "chatbot_id": "no-such-bot" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["response"],
        "It looks like your message was empty. What would you like to know about me?"
    );
}

#[tokio::test]
async fn owner_routes_require_api_key() {
    let app = test_app("unused").await;

    let missing = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/profile")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/profile")
                .header("Authorization", "Bearer pk_wrong")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let bearer = app
        .router
        .oneshot(
            Request::builder()
                .uri("/profile")
                .header("Authorization", format!("Bearer {}", app.owner.api_key))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(bearer.status(), StatusCode::OK);
    let body = body_json(bearer).await;
    assert_eq!(body["profile"]["bio"], "Not provided");
}

#[tokio::test]
async fn profile_update_is_stored_and_indexed() {
    let app = test_app("unused").await;

    let response = app
        .router
        .oneshot(json_request(
            "PUT",
            "/profile",
            Some(&app.owner.api_key),
            &json!({ "name": "Ava", "bio": "Backend engineer" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["profile"]["bio"], "Backend engineer");
    assert_eq!(body["vector_db_indexed"], true);

    let units = app.store.units().await;
    assert!(units.iter().any(|u| u.text == "Backend engineer"));
}

#[tokio::test]
async fn project_routes_enforce_ownership() {
    let app = test_app("unused").await;
    let other = Owner::create("Bo", &app.db).await.expect("owner");
    let foreign = Project::create(
        &other.id,
        ProjectInput {
            title: "Bo's project".into(),
            ..ProjectInput::default()
        },
        &app.db,
    )
    .await
    .expect("project");

    let forbidden = app
        .router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/profile/projects/{}", foreign.id),
            Some(&app.owner.api_key),
            &json!({ "title": "Hijacked" }),
        ))
        .await
        .expect("response");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let missing = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/profile/projects/does-not-exist")
                .header("X-API-Key", &app.owner.api_key)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let created = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/profile/projects",
            Some(&app.owner.api_key),
            &json!({ "title": "cachectl", "description": "A cache CLI" }),
        ))
        .await
        .expect("response");
    assert_eq!(created.status(), StatusCode::CREATED);
    let project_id = body_json(created).await["id"]
        .as_str()
        .expect("id")
        .to_string();

    let deleted = app
        .router
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/profile/projects/{project_id}"))
                .header("X-API-Key", &app.owner.api_key)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    assert!(app
        .store
        .units()
        .await
        .iter()
        .all(|u| u.extra.project_id.as_deref() != Some(project_id.as_str())));
}

#[tokio::test]
async fn probes_report_ok() {
    let app = test_app("unused").await;

    for uri in ["/live", "/ready"] {
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn document_upload_is_stored_indexed_and_deletable() {
    let app = test_app("unused").await;
    let text = "Ava specializes in distributed caching.";

    let response = app
        .router
        .clone()
        .oneshot(multipart_request(
            &app.owner.api_key,
            &[("title", "Caching notes"), ("owner_id", app.owner.id.as_str())],
            &Upload {
                file_name: "notes.txt",
                content_type: "text/plain",
                bytes: text.as_bytes(),
            },
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["extracted_chars"], text.chars().count());
    assert_eq!(body["vector_db_indexed"], true);
    let document_id = body["document_id"].as_str().expect("document id").to_string();

    let stored = app
        .db
        .get_item::<Document>(&document_id)
        .await
        .expect("lookup")
        .expect("document row");
    assert_eq!(stored.title, "Caching notes");
    assert!(app.store.units().await.iter().any(|u| {
        u.extra.document_id.as_deref() == Some(document_id.as_str()) && u.text == text
    }));

    let deleted = app
        .router
        .clone()
        .oneshot(delete_request(
            &format!("/documents/{document_id}"),
            &app.owner.api_key,
        ))
        .await
        .expect("response");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    assert!(app
        .store
        .units()
        .await
        .iter()
        .all(|u| u.extra.document_id.as_deref() != Some(document_id.as_str())));

    let again = app
        .router
        .oneshot(delete_request(
            &format!("/documents/{document_id}"),
            &app.owner.api_key,
        ))
        .await
        .expect("response");
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn document_upload_rejects_bad_requests() {
    let app = test_app("unused").await;
    let other = Owner::create("Bo", &app.db).await.expect("owner");
    let notes = Upload {
        file_name: "notes.txt",
        content_type: "text/plain",
        bytes: b"some notes",
    };

    let foreign = app
        .router
        .clone()
        .oneshot(multipart_request(
            &app.owner.api_key,
            &[("title", "Notes"), ("owner_id", other.id.as_str())],
            &notes,
        ))
        .await
        .expect("response");
    assert_eq!(foreign.status(), StatusCode::FORBIDDEN);

    let image = app
        .router
        .clone()
        .oneshot(multipart_request(
            &app.owner.api_key,
            &[("title", "Photo"), ("owner_id", app.owner.id.as_str())],
            &Upload {
                file_name: "photo.png",
                content_type: "image/png",
                bytes: b"\x89PNG",
            },
        ))
        .await
        .expect("response");
    assert_eq!(image.status(), StatusCode::BAD_REQUEST);

    let empty = app
        .router
        .clone()
        .oneshot(multipart_request(
            &app.owner.api_key,
            &[("title", "Empty"), ("owner_id", app.owner.id.as_str())],
            &Upload {
                file_name: "empty.txt",
                content_type: "text/plain",
                bytes: b"",
            },
        ))
        .await
        .expect("response");
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    assert!(app.db.get_all_stored_items::<Document>().await.expect("list").is_empty());
    assert!(app.store.units().await.is_empty());
}

#[tokio::test]
async fn document_without_text_indexes_placeholder() {
    let app = test_app("unused").await;

    let response = app
        .router
        .oneshot(multipart_request(
            &app.owner.api_key,
            &[("title", "Blank"), ("owner_id", app.owner.id.as_str())],
            &Upload {
                file_name: "blank.txt",
                content_type: "text/plain",
                bytes: b"   \n  ",
            },
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["extracted_chars"],
        EMPTY_EXTRACTION_PLACEHOLDER.chars().count()
    );
    assert!(app
        .store
        .units()
        .await
        .iter()
        .any(|u| u.subcategory == "content" && u.text == EMPTY_EXTRACTION_PLACEHOLDER));
}

#[tokio::test]
async fn deleting_foreign_document_is_forbidden() {
    let app = test_app("unused").await;
    let other = Owner::create("Bo", &app.db).await.expect("owner");
    let document = app
        .db
        .store_item(Document::new(
            other.id.clone(),
            "Bo's notes".into(),
            None,
            "notes.txt".into(),
            "private".into(),
        ))
        .await
        .expect("store")
        .expect("document");

    let response = app
        .router
        .oneshot(delete_request(
            &format!("/documents/{}", document.id),
            &app.owner.api_key,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app
        .db
        .get_item::<Document>(&document.id)
        .await
        .expect("lookup")
        .is_some());
}
