//! Catalog endpoints: items, cascading lookup and CSV import

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::Multipart;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::catalog::{CatalogItem, CatalogItemInput, CatalogQuery, ColumnMapping, ImportPreview, ImportReport},
    services::lookup::{CascadeOptions, CatalogSelection},
    AppState,
};

use super::CurrentSession;

/// Multipart body of the import endpoints
#[derive(ToSchema)]
pub struct ImportUpload {
    /// CSV file
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Optional `ColumnMapping` as JSON; headers are auto-mapped when absent
    pub mapping: Option<String>,
}

/// List catalog items
#[utoipa::path(
    get,
    path = "/catalog/items",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(CatalogQuery),
    responses(
        (status = 200, description = "Catalog items", body = Vec<CatalogItem>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_items(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<CatalogQuery>,
) -> AppResult<Json<Vec<CatalogItem>>> {
    let items = state.services.catalog.list(&session, &query).await?;
    Ok(Json(items))
}

/// Options for a cascading area / equipment / category / item selection
#[utoipa::path(
    get,
    path = "/catalog/lookup",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(CatalogSelection),
    responses(
        (status = 200, description = "Options for each level", body = CascadeOptions),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn lookup(
    State(state): State<AppState>,
    CurrentSession(_session): CurrentSession,
    Query(selection): Query<CatalogSelection>,
) -> AppResult<Json<CascadeOptions>> {
    let options = state.services.catalog.lookup(&selection).await?;
    Ok(Json(options))
}

/// Get a catalog item by ID
#[utoipa::path(
    get,
    path = "/catalog/items/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Catalog item ID")),
    responses(
        (status = 200, description = "Catalog item", body = CatalogItem),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    CurrentSession(_session): CurrentSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CatalogItem>> {
    let item = state.services.catalog.get(id).await?;
    Ok(Json(item))
}

/// Create a catalog item (admin only)
#[utoipa::path(
    post,
    path = "/catalog/items",
    tag = "catalog",
    security(("bearer_auth" = [])),
    request_body = CatalogItemInput,
    responses(
        (status = 201, description = "Item created", body = CatalogItem),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(data): Json<CatalogItemInput>,
) -> AppResult<(StatusCode, Json<CatalogItem>)> {
    let item = state.services.catalog.create(&session, data).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Update a catalog item (admin only)
#[utoipa::path(
    put,
    path = "/catalog/items/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Catalog item ID")),
    request_body = CatalogItemInput,
    responses(
        (status = 200, description = "Item updated", body = CatalogItem),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn update_item(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    Json(data): Json<CatalogItemInput>,
) -> AppResult<Json<CatalogItem>> {
    let item = state.services.catalog.update(&session, id, data).await?;
    Ok(Json(item))
}

/// Delete a catalog item (admin only)
#[utoipa::path(
    delete,
    path = "/catalog/items/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Catalog item ID")),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn delete_item(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Headers, suggested column mapping and sample rows of a CSV (admin only)
#[utoipa::path(
    post,
    path = "/catalog/items/import/preview",
    tag = "catalog",
    security(("bearer_auth" = [])),
    request_body(content = ImportUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Import preview", body = ImportPreview),
        (status = 400, description = "Missing or unreadable file"),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn import_preview(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    multipart: Multipart,
) -> AppResult<Json<ImportPreview>> {
    let (text, _) = read_upload(multipart).await?;
    let preview = state.services.catalog.import_preview(&session, &text)?;
    Ok(Json(preview))
}

/// Import catalog items from a CSV (admin only)
#[utoipa::path(
    post,
    path = "/catalog/items/import",
    tag = "catalog",
    security(("bearer_auth" = [])),
    request_body(content = ImportUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Import report", body = ImportReport),
        (status = 400, description = "Missing file, unmapped fields or no valid rows"),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn import_items(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    multipart: Multipart,
) -> AppResult<Json<ImportReport>> {
    let (text, mapping) = read_upload(multipart).await?;
    let report = state.services.catalog.import(&session, &text, mapping).await?;
    Ok(Json(report))
}

/// Reads the `file` and optional `mapping` parts
async fn read_upload(mut multipart: Multipart) -> AppResult<(String, Option<ColumnMapping>)> {
    let mut text = None;
    let mut mapping = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let bytes = field.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
                let content = String::from_utf8(bytes.to_vec())
                    .map_err(|_| AppError::BadRequest("CSV file must be UTF-8 encoded".to_string()))?;
                text = Some(content.trim_start_matches('\u{feff}').to_string());
            }
            Some("mapping") => {
                let raw = field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !raw.trim().is_empty() {
                    let parsed: ColumnMapping = serde_json::from_str(&raw)
                        .map_err(|e| AppError::BadRequest(format!("Invalid column mapping: {}", e)))?;
                    mapping = Some(parsed);
                }
            }
            _ => {}
        }
    }

    let text = text.ok_or_else(|| AppError::BadRequest("Missing 'file' part".to_string()))?;
    Ok((text, mapping))
}
