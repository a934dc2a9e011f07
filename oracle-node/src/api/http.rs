//! REST handlers (§6). `/api/proposals` is static seed data — spec.md
//! explicitly allows this ("governance proposals... static seed data
//! acceptable") since the governance module itself is out of scope.

use super::AppState;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

pub async fn metrics_json(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::to_value(state.metrics.snapshot()).unwrap_or(Value::Null))
}

pub async fn metrics_prometheus(State(state): State<AppState>) -> String {
    state.metrics.render_prometheus()
}

pub async fn feeds(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.feeds.live_status()))
}

pub async fn jobs(State(state): State<AppState>) -> Json<Value> {
    let records = state.persistence.recent_records().await.unwrap_or_default();
    Json(json!(records))
}

#[derive(Serialize)]
struct Proposal {
    id: u32,
    title: &'static str,
    status: &'static str,
}

pub async fn proposals() -> Json<Value> {
    let seed = vec![
        Proposal { id: 1, title: "Lower median z-score threshold to 1.2", status: "open" },
        Proposal { id: 2, title: "Add BTC/USD feed", status: "passed" },
    ];
    Json(json!(seed))
}
