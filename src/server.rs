//! HTTP trigger endpoint
//!
//! Thin axum surface over the engine:
//!
//! - `POST /scan` — run one cycle on demand. 200 with the scan report
//!   (including the no-opportunity case), 400 on guardrail/simulation
//!   rejection, 402 on insufficient funds, 502 on RPC failure, 500
//!   otherwise. Every error body names the stage that aborted.
//! - `POST /deployments` — register/refresh deployed-contract metadata
//!   (upsert by contract address) from the external deploy tooling.
//! - `GET /health` — liveness probe.
//!
//! Author: AI-Generated
//! Created: 2026-08-05

use crate::engine::Engine;
use crate::errors::EngineError;
use crate::types::DeploymentRecord;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/scan", post(trigger_scan))
        .route("/deployments", post(register_deployment))
        .route("/health", get(health))
        .with_state(AppState { engine })
}

async fn trigger_scan(State(state): State<AppState>) -> Response {
    match state.engine.run_cycle().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn register_deployment(
    State(state): State<AppState>,
    Json(record): Json<DeploymentRecord>,
) -> Response {
    info!("registering deployment {}", record.contract_address);
    state.engine.persistence().upsert_deployment(&record);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "ok": true,
            "contractAddress": record.contract_address,
        })),
    )
        .into_response()
}

async fn health() -> &'static str {
    "ok"
}

fn error_response(err: &EngineError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::json!({
        "error": err.to_string(),
        "stage": err.stage(),
    });
    (status, Json(body)).into_response()
}
