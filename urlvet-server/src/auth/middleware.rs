use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use super::jwt::validate_token;
use crate::errors::AppError;
use crate::state::AppState;

/// Requires a valid bearer token and loads the owning user into the
/// request extensions for downstream handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&request)?;

    let claims = validate_token(&token, &state.config.auth.jwt_secret)
        .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await
        .map_err(|_| AppError::internal("Failed to load user"))?
        .ok_or_else(|| AppError::unauthorized("Unknown user"))?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn extract_bearer_token(request: &Request) -> Result<String, AppError> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .ok_or_else(|| AppError::unauthorized("Missing bearer token"))
}
