//! API handlers for the REX REST and realtime endpoints

pub mod auth;
pub mod catalog;
pub mod categories;
pub mod health;
pub mod openapi;
pub mod realtime;
pub mod requisitions;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, Request},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{error::AppError, models::session::Session, AppState};

/// Extractor for the session behind a bearer token.
///
/// The role is read from the database on every request; any failure to
/// resolve it rejects the request as unauthenticated.
pub struct CurrentSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Authentication("Missing or invalid authorization header".to_string()))?;

        let session = state.services.auth.resolve(bearer.token()).await?;
        Ok(CurrentSession(session))
    }
}

/// Span for one HTTP request.
///
/// Only the path is recorded: the realtime feed carries its bearer token in
/// the query string.
pub fn request_span<B>(request: &Request<B>) -> tracing::Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        version = ?request.version(),
    )
}
