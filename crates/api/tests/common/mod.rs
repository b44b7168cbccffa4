#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use scripthub_api::config::ServerConfig;
use scripthub_api::router::build_app_router;
use scripthub_api::service::CommandService;
use scripthub_api::state::AppState;
use scripthub_core::command::CommandStatus;
use scripthub_core::memory::MemoryCommandStore;
use scripthub_engine::{Engine, EngineConfig};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: String::new(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 1,
        worker_count: 2,
        queue_capacity: 0,
        work_dir: None,
    }
}

/// The router plus the handles tests need to observe background work.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryCommandStore>,
    pub engine: Arc<Engine>,
}

/// Build the full application router over an in-memory store and a live
/// engine, with the same middleware stack production uses.
pub fn build_test_app() -> TestApp {
    build_test_app_in(None)
}

/// Like [`build_test_app`], with spawned commands running in `work_dir`.
pub fn build_test_app_in(work_dir: Option<PathBuf>) -> TestApp {
    let config = ServerConfig {
        work_dir,
        ..test_config()
    };
    let store = Arc::new(MemoryCommandStore::new());
    let engine = Arc::new(
        Engine::start(
            EngineConfig {
                workers: config.worker_count,
                queue_capacity: config.queue_capacity,
                working_dir: config.work_dir.clone(),
            },
            store.clone(),
        )
        .expect("engine should start"),
    );

    let state = AppState {
        pool: None,
        store: store.clone(),
        commands: Arc::new(CommandService::new(store.clone(), Arc::clone(&engine))),
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        engine,
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn delete(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll the store until `name` reaches `status` or five seconds pass.
pub async fn wait_for_status(store: &MemoryCommandStore, name: &str, status: CommandStatus) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if store.status_of(name).await == Some(status) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
