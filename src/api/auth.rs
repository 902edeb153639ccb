//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        session::{AuthResponse, Session},
        user::Credentials,
    },
    AppState,
};

use super::CurrentSession;

/// Create an account; every new account is a mechanic
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "auth",
    request_body = Credentials,
    responses(
        (status = 201, description = "Account created and signed in", body = AuthResponse),
        (status = 400, description = "Invalid username or password"),
        (status = 409, description = "Username already taken"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    credentials.validate()?;
    let response = state.services.auth.signup(&credentials).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Sign in with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = Credentials,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials or no role assigned"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> AppResult<Json<AuthResponse>> {
    let response = state.services.auth.login(&credentials).await?;
    Ok(Json(response))
}

/// Current session with the role as stored right now
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current session", body = Session),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(CurrentSession(session): CurrentSession) -> Json<Session> {
    Json(session)
}

/// Sign out, revoking the current token
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> AppResult<StatusCode> {
    state.services.auth.logout(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
