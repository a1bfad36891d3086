use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::json;
use urlvet_core::MetricsSnapshot;
use urlvet_model::ScanStatus;

use crate::errors::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
    /// Scans waiting for the submission pass, read live from the store.
    pub pending_submitted: i64,
}

pub async fn scan_stats(State(state): State<AppState>) -> AppResult<Json<ScanStats>> {
    let pending_submitted = state.scans.count_by_status(ScanStatus::Submitted).await?;
    Ok(Json(ScanStats {
        counters: state.metrics.snapshot(),
        pending_submitted,
    }))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
