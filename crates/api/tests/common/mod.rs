//! Shared fixtures for API integration tests: an instant in-process
//! generation provider and a full application router mirroring the
//! production middleware stack.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use vitrine_api::config::ServerConfig;
use vitrine_api::routes;
use vitrine_api::state::AppState;
use vitrine_core::retry::RetryPolicy;
use vitrine_events::EventBus;
use vitrine_pipeline::{JobOrchestrator, PipelineConfig};
use vitrine_provider::{GeneratedAsset, GenerationProvider, GenerationRequest, ProviderError};
use vitrine_store::{MemoryAssetStore, MemoryJobStore, StaticOwnerIndex};

/// Provider that succeeds instantly by echoing the prompt bytes.
pub struct InstantProvider;

#[async_trait]
impl GenerationProvider for InstantProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GeneratedAsset, ProviderError> {
        Ok(GeneratedAsset {
            content_type: request.unit_kind.content_type().to_string(),
            bytes: request.prompt.into_bytes(),
        })
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        provider_url: "http://localhost:8188".to_string(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryJobStore>,
    pub assets: Arc<MemoryAssetStore>,
}

/// Build the full application router with all middleware layers,
/// backed by in-memory stores and an instant provider.
///
/// This mirrors the router construction in `main.rs` so integration
/// tests exercise the same middleware stack (CORS, request ID,
/// timeout, tracing, panic recovery) that production uses.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryJobStore::new());
    let assets = Arc::new(MemoryAssetStore::new());
    let event_bus = Arc::new(EventBus::default());

    let pipeline_config = PipelineConfig {
        retry: RetryPolicy {
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
            ..RetryPolicy::default()
        },
        progress_tick: Duration::from_millis(10),
        ..PipelineConfig::default()
    };
    let orchestrator = Arc::new(JobOrchestrator::new(
        store.clone(),
        assets.clone(),
        Arc::new(InstantProvider),
        Arc::new(StaticOwnerIndex::allow_all()),
        Arc::clone(&event_bus),
        pipeline_config,
    ));

    let state = AppState {
        orchestrator,
        store: store.clone(),
        assets: assets.clone(),
        config: Arc::new(config),
        event_bus,
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let router = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    TestApp {
        router,
        store,
        assets,
    }
}

/// Issue a GET and parse the JSON body (null for empty bodies).
pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    read_json(response).await
}

/// Issue a POST with a JSON body and parse the JSON response.
pub async fn post_json(
    router: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read_json(response).await
}

async fn read_json(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}
