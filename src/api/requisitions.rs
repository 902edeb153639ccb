//! Requisition endpoints: authoring, listing and workflow actions

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::requisition::{
        CreateRequisitions, EditRequisition, ReasonRequest, Requisition, RequisitionDetails,
        RequisitionHistory, RequisitionList, RequisitionQuery, StatusRequest, TransferRequest,
    },
    services::workflow::Action,
    AppState,
};

use super::CurrentSession;

/// List requisitions in a scope with filters
#[utoipa::path(
    get,
    path = "/requisitions",
    tag = "requisitions",
    security(("bearer_auth" = [])),
    params(RequisitionQuery),
    responses(
        (status = 200, description = "Requisitions, pending count and areas", body = RequisitionList),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Scope not allowed for this role")
    )
)]
pub async fn list_requisitions(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<RequisitionQuery>,
) -> AppResult<Json<RequisitionList>> {
    let list = state.services.requisitions.list(&session, &query).await?;
    Ok(Json(list))
}

/// Submit one requisition per line (mechanics only)
#[utoipa::path(
    post,
    path = "/requisitions",
    tag = "requisitions",
    security(("bearer_auth" = [])),
    request_body = CreateRequisitions,
    responses(
        (status = 201, description = "Requisitions created", body = Vec<Requisition>),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Mechanic role required")
    )
)]
pub async fn create_requisitions(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(data): Json<CreateRequisitions>,
) -> AppResult<(StatusCode, Json<Vec<Requisition>>)> {
    let created = state.services.requisitions.create(&session, data).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// The caller's own requisitions grouped by phase
#[utoipa::path(
    get,
    path = "/requisitions/history",
    tag = "requisitions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active, completed and cancelled requisitions", body = RequisitionHistory),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn history(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> AppResult<Json<RequisitionHistory>> {
    let history = state.services.requisitions.history(&session).await?;
    Ok(Json(history))
}

/// Requisition details with usernames and allowed actions
#[utoipa::path(
    get,
    path = "/requisitions/{id}",
    tag = "requisitions",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Requisition ID")),
    responses(
        (status = 200, description = "Requisition details", body = RequisitionDetails),
        (status = 404, description = "Requisition not found")
    )
)]
pub async fn get_requisition(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RequisitionDetails>> {
    let details = state.services.requisitions.details(&session, id).await?;
    Ok(Json(details))
}

/// Rewrite a pending requisition (creator only)
#[utoipa::path(
    put,
    path = "/requisitions/{id}",
    tag = "requisitions",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Requisition ID")),
    request_body = EditRequisition,
    responses(
        (status = 200, description = "Requisition updated", body = Requisition),
        (status = 403, description = "Not the creator"),
        (status = 409, description = "Requisition changed meanwhile"),
        (status = 422, description = "Requisition is no longer pending")
    )
)]
pub async fn update_requisition(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    Json(data): Json<EditRequisition>,
) -> AppResult<Json<Requisition>> {
    let updated = state.services.requisitions.edit(&session, id, data).await?;
    Ok(Json(updated))
}

/// Delete a pending requisition (creator only)
#[utoipa::path(
    delete,
    path = "/requisitions/{id}",
    tag = "requisitions",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Requisition ID")),
    responses(
        (status = 204, description = "Requisition deleted"),
        (status = 403, description = "Not the creator"),
        (status = 409, description = "Requisition changed meanwhile"),
        (status = 422, description = "Requisition is no longer pending")
    )
)]
pub async fn delete_requisition(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.requisitions.delete(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Take custody of a pending requisition
#[utoipa::path(
    post,
    path = "/requisitions/{id}/take",
    tag = "workflow",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Requisition ID")),
    responses(
        (status = 200, description = "Requisition in progress", body = Requisition),
        (status = 403, description = "Planner role required"),
        (status = 409, description = "Another planner acted first"),
        (status = 422, description = "Requisition is not pending")
    )
)]
pub async fn take(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Requisition>> {
    let updated = state.services.requisitions.transition(&session, id, Action::Take).await?;
    Ok(Json(updated))
}

/// Reject a pending requisition with a reason
#[utoipa::path(
    post,
    path = "/requisitions/{id}/reject",
    tag = "workflow",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Requisition ID")),
    request_body = ReasonRequest,
    responses(
        (status = 200, description = "Requisition rejected", body = Requisition),
        (status = 400, description = "Reason is required"),
        (status = 409, description = "Another planner acted first"),
        (status = 422, description = "Requisition is not pending")
    )
)]
pub async fn reject(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    Json(body): Json<ReasonRequest>,
) -> AppResult<Json<Requisition>> {
    let action = Action::Reject { reason: body.reason };
    let updated = state.services.requisitions.transition(&session, id, action).await?;
    Ok(Json(updated))
}

/// Move a requisition in custody to another status (assignee only)
#[utoipa::path(
    post,
    path = "/requisitions/{id}/status",
    tag = "workflow",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Requisition ID")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status changed", body = Requisition),
        (status = 403, description = "Not the assignee"),
        (status = 409, description = "Requisition changed meanwhile"),
        (status = 422, description = "Transition not allowed")
    )
)]
pub async fn advance(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusRequest>,
) -> AppResult<Json<Requisition>> {
    let action = Action::Advance { status: body.status };
    let updated = state.services.requisitions.transition(&session, id, action).await?;
    Ok(Json(updated))
}

/// Mark a requisition in custody as lapsed with a reason (assignee only)
#[utoipa::path(
    post,
    path = "/requisitions/{id}/lapse",
    tag = "workflow",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Requisition ID")),
    request_body = ReasonRequest,
    responses(
        (status = 200, description = "Requisition lapsed", body = Requisition),
        (status = 400, description = "Reason is required"),
        (status = 403, description = "Not the assignee"),
        (status = 409, description = "Requisition changed meanwhile")
    )
)]
pub async fn lapse(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    Json(body): Json<ReasonRequest>,
) -> AppResult<Json<Requisition>> {
    let action = Action::Lapse { reason: body.reason };
    let updated = state.services.requisitions.transition(&session, id, action).await?;
    Ok(Json(updated))
}

/// Hand custody to another planner (assignee only)
#[utoipa::path(
    post,
    path = "/requisitions/{id}/transfer",
    tag = "workflow",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Requisition ID")),
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Requisition transferred", body = Requisition),
        (status = 400, description = "Target is not another planner"),
        (status = 403, description = "Not the assignee"),
        (status = 409, description = "Requisition changed meanwhile")
    )
)]
pub async fn transfer(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    Json(body): Json<TransferRequest>,
) -> AppResult<Json<Requisition>> {
    let action = Action::Transfer { to: body.to };
    let updated = state.services.requisitions.transition(&session, id, action).await?;
    Ok(Json(updated))
}

/// Complete a requisition whose material is available
#[utoipa::path(
    post,
    path = "/requisitions/{id}/complete",
    tag = "workflow",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Requisition ID")),
    responses(
        (status = 200, description = "Requisition completed", body = Requisition),
        (status = 403, description = "Planner role required"),
        (status = 409, description = "Requisition changed meanwhile"),
        (status = 422, description = "Material is not available yet")
    )
)]
pub async fn complete(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Requisition>> {
    let updated = state.services.requisitions.transition(&session, id, Action::Complete).await?;
    Ok(Json(updated))
}

/// Close a requisition whose material is available without delivering it
#[utoipa::path(
    post,
    path = "/requisitions/{id}/close",
    tag = "workflow",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Requisition ID")),
    responses(
        (status = 200, description = "Requisition closed", body = Requisition),
        (status = 403, description = "Planner role required"),
        (status = 409, description = "Requisition changed meanwhile"),
        (status = 422, description = "Material is not available yet")
    )
)]
pub async fn close(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Requisition>> {
    let updated = state.services.requisitions.transition(&session, id, Action::Close).await?;
    Ok(Json(updated))
}
