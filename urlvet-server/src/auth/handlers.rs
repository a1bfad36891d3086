use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
    Argon2,
};
use axum::{extract::State, Json};
use urlvet_core::ScanError;
use urlvet_model::{AuthResponse, LoginRequest, RegisterRequest, User};

use super::jwt::generate_access_token;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    request.validate()?;

    let email = request.email.trim().to_lowercase();
    if state.users.email_exists(&email).await? {
        return Err(AppError::conflict("Email is already in use"));
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(request.password.as_bytes(), &salt)
        .map_err(|_| AppError::internal("Failed to hash password"))?
        .to_string();

    let user = User::new(email, password_hash, request.first_name, request.last_name);

    state.users.create(&user).await.map_err(|e| match e {
        ScanError::Conflict(msg) => AppError::conflict(msg),
        _ => AppError::internal("Failed to create user"),
    })?;

    issue_token(&state, &user)
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = request.email.trim().to_lowercase();
    let user = state
        .users
        .find_by_email(&email)
        .await
        .map_err(|_| AppError::internal("Failed to load user"))?
        .ok_or_else(|| AppError::unauthorized("Invalid email or password"))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::internal("Stored password hash is invalid"))?;
    Argon2::default()
        .verify_password(request.password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::unauthorized("Invalid email or password"))?;

    issue_token(&state, &user)
}

fn issue_token(state: &AppState, user: &User) -> AppResult<Json<AuthResponse>> {
    let token = generate_access_token(
        user.id,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_secs,
    )
    .map_err(|_| AppError::internal("Failed to generate access token"))?;

    Ok(Json(AuthResponse {
        token,
        user_id: user.id,
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }))
}
