use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{TraceLayer, DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, DefaultOnFailure},
};
use tracing::Level;

use common::types::Health;
use service::observability;

use crate::errors::ApiError;
use crate::registry::DraftRegistry;

pub mod drafts;

#[derive(Clone)]
pub struct ServerState {
    pub registry: Arc<DraftRegistry>,
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let body = observability::encode_metrics()
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

/// Build the full application router: health, metrics and draft routes.
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    let drafts = Router::new()
        .route(
            "/drafts/:table",
            get(drafts::load_draft).put(drafts::put_snapshot).delete(drafts::clear_draft),
        )
        .route("/drafts/:table/save", post(drafts::save_draft))
        .route("/drafts/:table/status", get(drafts::draft_status));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .merge(drafts)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // 每次请求创建 span，包含方法和路径等，日志级别为 INFO
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(
                    DefaultOnRequest::new()
                        .level(Level::DEBUG),
                )
                // 响应返回时打点，包含状态码与耗时
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                // 失败（5xx 等）时以 ERROR 记录
                .on_failure(
                    DefaultOnFailure::new()
                        .level(Level::ERROR),
                )
        )
}
