use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use futures::Stream;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use tandem_api::{build_router, AppState, Config};
use tandem_graph::Graph;
use tandem_llm::{ChatClient, ChatRequest, ChatResponse, StreamEvent as LlmEvent};
use tandem_persist::{MemoryCheckpointStore, MemorySessionStore};
use tandem_tools::ToolRegistry;

/// Chat client replaying a fixed script of plain-text answers.
struct FakeChat {
    script: Mutex<VecDeque<String>>,
}

impl FakeChat {
    fn new(script: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().map(String::from).collect()),
        })
    }

    fn next(&self) -> String {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("model called more times than scripted")
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
        Ok(ChatResponse {
            content: Some(self.next()),
            tool_calls: None,
            usage: None,
            finish_reason: None,
        })
    }

    async fn chat_stream(
        &self,
        _request: ChatRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<LlmEvent>> + Send>>> {
        let content = self.next();
        Ok(Box::pin(futures::stream::iter(vec![
            Ok(LlmEvent::Message { content }),
            Ok(LlmEvent::Done {
                finish_reason: None,
            }),
        ])))
    }
}

fn test_app(script: Vec<&str>) -> axum::Router {
    let config: Config = toml::from_str("").unwrap();
    let graph = Graph::new(
        FakeChat::new(script),
        Arc::new(ToolRegistry::new()),
        Arc::new(MemoryCheckpointStore::new()),
        config.graph_config(),
    );
    let state = AppState::new(
        config,
        graph,
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryCheckpointStore::new()),
    );
    build_router(state)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_reports_healthy() {
    let app = test_app(vec![]);
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn session_lifecycle_roundtrip() {
    let app = test_app(vec![]);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/agent/session/init",
            json!({"session_id": "s1", "employee_id": 42, "employee_name": "Eve"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Reinitializing the same id updates it in place.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/agent/session/init",
            json!({"session_id": "s1", "employee_id": 43, "employee_name": "Eva"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/v1/agent/session/s1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["employee_id"], 43);
    assert_eq!(body["employee_name"], "Eva");

    let response = app
        .clone()
        .oneshot(
            Request::delete("/api/v1/agent/session/s1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::get("/api/v1/agent/session/s1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let app = test_app(vec![]);
    let response = app
        .oneshot(post_json("/api/v1/chat", json!({"message": "   "})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_turn_streams_tokens_and_done() {
    let app = test_app(vec!["Hello! How can I help?"]);

    let response = app
        .oneshot(post_json(
            "/api/v1/chat",
            json!({"message": "hi", "session_id": "s1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body = body_string(response).await;
    assert!(body.contains("\"type\":\"token\""));
    assert!(body.contains("\"type\":\"done\""));
    assert!(body.contains("Hello! How can I help?"));
}

#[tokio::test]
async fn resume_without_pending_interrupt_is_an_error_event() {
    let app = test_app(vec![]);

    let response = app
        .oneshot(post_json(
            "/api/v1/chat/resume",
            json!({"thread_id": "no-such-thread", "resume_data": {"action": "approve"}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("\"type\":\"error\""));
    assert!(!body.contains("\"type\":\"done\""));
}

#[tokio::test]
async fn resume_data_must_be_an_object() {
    let app = test_app(vec![]);

    let response = app
        .oneshot(post_json(
            "/api/v1/chat/resume",
            json!({"thread_id": "t1", "resume_data": "approve"}),
        ))
        .await
        .unwrap();
    // A bare string fails deserialization before any graph work.
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn clear_memory_reports_deleted_count() {
    let app = test_app(vec![]);

    let response = app
        .oneshot(
            Request::delete("/api/v1/memory/some-thread")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["deleted_checkpoints"], 0);
}
