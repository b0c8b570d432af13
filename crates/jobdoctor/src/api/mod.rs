use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::models::{ErrorBody, ListReportsResponse, ReportListItem};
use crate::error::StoreError;
use crate::jobs::{JobId, PollerHandle};
use crate::reports::{JobReport, ReportStore};

pub mod models;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn ReportStore>,
    pub poller: PollerHandle,
}

/// Bind the admin listener up front so a bad or busy address fails startup
/// instead of surfacing only when the process exits. `None` = disabled.
pub async fn bind(addr: Option<&str>) -> anyhow::Result<Option<tokio::net::TcpListener>> {
    let Some(addr) = addr else {
        return Ok(None);
    };
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("admin api cannot listen on {addr}: {e}"))?;
    Ok(Some(listener))
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        // Reports
        .route("/reports", get(list_reports))
        .route("/reports/:id", get(get_report))
        // Poller
        .route("/stats", get(stats))
        .route("/metrics/prom", get(metrics_prom))
        // Health
        .route("/health", get(health))
        .with_state(state)
}

fn store_err(e: StoreError) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: format!("store error: {e}"),
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct ListReportsQuery {
    pub limit: Option<i64>,
}

pub async fn list_reports(
    State(state): State<ApiState>,
    Query(q): Query<ListReportsQuery>,
) -> Result<Json<ListReportsResponse>, (StatusCode, Json<ErrorBody>)> {
    let limit = q.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

    let reports = state.store.list_recent(limit).await.map_err(store_err)?;

    Ok(Json(ListReportsResponse {
        items: reports.iter().map(ReportListItem::from).collect(),
    }))
}

pub async fn get_report(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<JobReport>, (StatusCode, Json<ErrorBody>)> {
    match state.store.find_by_id(&JobId::new(id)).await {
        Ok(Some(report)) => Ok(Json(report)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "report not found".into(),
            }),
        )),
        Err(e) => Err(store_err(e)),
    }
}

pub async fn stats(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.poller.stats())
}

pub async fn metrics_prom(State(state): State<ApiState>) -> Response {
    (StatusCode::OK, state.poller.stats().to_prometheus()).into_response()
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
