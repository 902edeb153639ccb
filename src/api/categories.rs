//! Category endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::category::{Category, CategoryImport, CategoryImportResult, CategoryInput},
    AppState,
};

use super::CurrentSession;

/// List categories by name
#[utoipa::path(
    get,
    path = "/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Categories", body = Vec<Category>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_categories(
    State(state): State<AppState>,
    CurrentSession(_session): CurrentSession,
) -> AppResult<Json<Vec<Category>>> {
    let categories = state.services.categories.list().await?;
    Ok(Json(categories))
}

/// Create a category (admin only)
#[utoipa::path(
    post,
    path = "/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = CategoryInput,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 403, description = "Administrator privileges required"),
        (status = 409, description = "Category already exists")
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(data): Json<CategoryInput>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let category = state.services.categories.create(&session, data).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// Rename a category (admin only)
#[utoipa::path(
    put,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = CategoryInput,
    responses(
        (status = 200, description = "Category renamed", body = Category),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category already exists")
    )
)]
pub async fn rename_category(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    Json(data): Json<CategoryInput>,
) -> AppResult<Json<Category>> {
    let category = state.services.categories.rename(&session, id, data).await?;
    Ok(Json(category))
}

/// Delete a category (admin only)
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found")
    )
)]
pub async fn delete_category(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.categories.delete(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Bulk import category names (admin only)
#[utoipa::path(
    post,
    path = "/categories/import",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = CategoryImport,
    responses(
        (status = 200, description = "Number of new categories", body = CategoryImportResult),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn import_categories(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(data): Json<CategoryImport>,
) -> AppResult<Json<CategoryImportResult>> {
    let result = state.services.categories.import(&session, &data.content).await?;
    Ok(Json(result))
}
