#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use peercode_core::memory::InMemorySessionStore;
use peercode_core::registry::{RegistrySettings, SessionRegistry};
use peercode_core::store::SessionStoreRef;
use tower::ServiceExt;

use peercode_api::config::{ServerConfig, StoreBackend};
use peercode_api::router::build_app_router;
use peercode_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults and the in-memory store.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        registry: RegistrySettings::default(),
        sweep_interval: None,
        store: StoreBackend::Memory,
    }
}

/// Build the full application router over a fresh in-memory store.
pub fn build_test_app() -> Router {
    build_test_app_with_store(Arc::new(InMemorySessionStore::new()))
}

/// Build the full application router over the given store.
pub fn build_test_app_with_store(store: SessionStoreRef) -> Router {
    let config = test_config();
    let registry = Arc::new(SessionRegistry::new(store, config.registry));
    let state = AppState { registry };
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, &body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
