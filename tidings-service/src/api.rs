//! HTTP API for the Tidings service.
//!
//! This module provides the REST API endpoints for:
//! - Health and metrics monitoring
//! - The streaming chat endpoint
//! - Chat persistence

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::StoreBackend;
use crate::service::TidingsService;

pub mod auth;
pub mod chat;
pub mod chats;

use chat::chat_handler;
use chats::{
    create_chat_handler, delete_chat_handler, get_chat_handler, list_chats_handler,
    list_messages_handler, save_message_handler,
};

/// Application state
pub struct AppState {
    pub service: Arc<TidingsService>,
    pub start_time: Instant,
    /// Absent when no recorder was installed (tests)
    pub metrics: Option<PrometheusHandle>,
}

/// Build the API router
pub fn router(service: Arc<TidingsService>, metrics: Option<PrometheusHandle>) -> Router {
    let request_timeout = service.config.server.request_timeout();

    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
        metrics,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/chat", post(chat_handler))
        .route("/chats", get(list_chats_handler).post(create_chat_handler))
        .route(
            "/chats/{id}",
            get(get_chat_handler).delete(delete_chat_handler),
        )
        .route(
            "/chats/{id}/messages",
            get(list_messages_handler).post(save_message_handler),
        );

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health & Metrics ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        store: state.service.store.backend(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    store: StoreBackend,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
