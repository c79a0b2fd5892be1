//! HTTP surface: read the latest result, trigger a run, inspect/toggle feeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::ingest::diagnostics::RunDiagnostics;
use crate::ingest::Pipeline;
use crate::metrics::Metrics;

const NEWS_CACHE_CONTROL: &str = "s-maxage=60, stale-while-revalidate=300";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

pub fn create_router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let mut router = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/news", get(news))
        .route("/api/refresh", post(refresh))
        .route("/api/feeds-config", get(feeds_config).post(update_feeds_config))
        .layer(CorsLayer::very_permissive())
        .with_state(state);
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }
    router
}

fn error_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

async fn news(State(state): State<AppState>) -> Response {
    match state.pipeline.store().latest().await {
        Ok(rs) => ([(header::CACHE_CONTROL, NEWS_CACHE_CONTROL)], Json(rs)).into_response(),
        Err(e) => {
            tracing::warn!(target: "api", error = %format!("{e:#}"), "reading stored result failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": format!("{e:#}") }),
            )
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResp {
    ok: bool,
    /// Unique relevant items before truncation.
    count: usize,
    updated_at: DateTime<Utc>,
    diagnostics: RunDiagnostics,
}

/// The run is spawned so a client disconnect cannot cancel it halfway.
async fn refresh(State(state): State<AppState>) -> Response {
    let pipeline = Arc::clone(&state.pipeline);
    let outcome = match tokio::spawn(async move { pipeline.run().await }).await {
        Ok(outcome) => outcome,
        Err(join) => {
            tracing::error!(target: "api", error = %join, "refresh task failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "ok": false, "error": join.to_string() }),
            );
        }
    };
    match outcome {
        Ok(report) => Json(RefreshResp {
            ok: true,
            count: report.diagnostics.unique_count,
            updated_at: report.result.updated_at,
            diagnostics: report.diagnostics,
        })
        .into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "ok": false,
                "error": e.to_string(),
                "diagnostics": e.report.diagnostics,
            }),
        ),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedsConfigResp {
    #[serde(skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    feeds: BTreeMap<String, bool>,
    total_feeds: usize,
    enabled_feeds: usize,
}

fn feeds_snapshot(state: &AppState, success: Option<bool>) -> FeedsConfigResp {
    let toggles = state.pipeline.toggles();
    FeedsConfigResp {
        success,
        feeds: toggles.as_map(),
        total_feeds: toggles.total(),
        enabled_feeds: toggles.enabled_count(),
    }
}

async fn feeds_config(State(state): State<AppState>) -> Json<FeedsConfigResp> {
    Json(feeds_snapshot(&state, None))
}

/// Body: `{ "feeds": { "<url>": true|false, ... } }`.
async fn update_feeds_config(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let updates: Option<BTreeMap<String, bool>> = body
        .get("feeds")
        .and_then(Value::as_object)
        .and_then(|m| {
            m.iter()
                .map(|(k, v)| v.as_bool().map(|b| (k.clone(), b)))
                .collect()
        });
    let Some(updates) = updates else {
        return error_response(
            StatusCode::BAD_REQUEST,
            json!({ "error": "Invalid feeds configuration" }),
        );
    };

    if let Err(unknown) = state.pipeline.toggles().apply(&updates) {
        return error_response(
            StatusCode::BAD_REQUEST,
            json!({ "error": format!("Invalid feeds: {}", unknown.join(", ")) }),
        );
    }
    tracing::info!(target: "api", changed = updates.len(), "feed toggles updated");
    Json(feeds_snapshot(&state, Some(true))).into_response()
}
