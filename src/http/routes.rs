use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::BrokerError;
use crate::types::JobId;

use super::state::AppState;

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs", get(list_all).post(enqueue))
        .route("/jobs/dead", get(list_dead))
        .route("/jobs/lease", get(poll))
        .route("/jobs/:id/ack", post(ack))
        .route("/jobs/:id/fail", post(fail))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn enqueue(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, BrokerError> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let job_id = state.broker.enqueue(body.to_vec(), idempotency_key)?;
    Ok(Json(json!({ "job_id": job_id.to_string() })))
}

#[derive(Debug, Deserialize)]
struct PollQuery {
    worker_id: String,
}

async fn poll(
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> Result<impl IntoResponse, BrokerError> {
    match state
        .broker
        .poll(&query.worker_id, state.poll_deadline)
        .await
    {
        Ok(record) => Ok((StatusCode::OK, Json(record)).into_response()),
        Err(BrokerError::NoJobAvailable) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize)]
struct LeaseAction {
    worker_id: String,
    lease_id: u64,
}

#[derive(Debug, Serialize)]
struct SuccessBody {
    status: &'static str,
}

async fn ack(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<LeaseAction>,
) -> Result<impl IntoResponse, BrokerError> {
    let job_id = JobId::from(id);
    state.broker.ack(&body.worker_id, &job_id, body.lease_id)?;
    Ok(Json(SuccessBody { status: "success" }))
}

async fn fail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<LeaseAction>,
) -> Result<impl IntoResponse, BrokerError> {
    let job_id = JobId::from(id);
    state.broker.fail(&body.worker_id, &job_id, body.lease_id)?;
    Ok(Json(SuccessBody { status: "success" }))
}

async fn list_all(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.broker.list_all())
}

async fn list_dead(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.broker.list_dead())
}
