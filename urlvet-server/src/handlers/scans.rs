use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::info;
use urlvet_model::{CreateScanRequest, PageOf, PageRequest, ScanRecord, User};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Submit a URL for scanning. Recent scans of the same URL are answered
/// from dedup/cache instead of a new provider round-trip.
pub async fn create_scan(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScanRequest>,
) -> AppResult<Json<ScanRecord>> {
    request.validate()?;

    let record = state.resolver.resolve(&request.url, user.id).await?;
    Ok(Json(record))
}

pub async fn list_scans(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(page): Query<PageRequest>,
) -> AppResult<Json<PageOf<ScanRecord>>> {
    let scans = state.scans.list_by_owner(user.id, page).await?;
    Ok(Json(scans))
}

/// Owner-scoped lookup. A scan owned by someone else is reported as
/// missing, never as forbidden.
pub async fn get_scan(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ScanRecord>> {
    state
        .scans
        .find_by_id_and_owner(id, user.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Scan not found"))
}

pub async fn delete_scan(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state.scans.delete_by_id_and_owner(id, user.id).await? {
        info!(scan_id = %id, user_id = %user.id, "scan deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Scan not found"))
    }
}
