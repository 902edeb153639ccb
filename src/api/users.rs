//! User role endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::user::{PlannerSummary, UpdateRole, UserRole, UserRoleList, UserRoleQuery},
    AppState,
};

use super::CurrentSession;

/// List accounts with their roles and per-role counts (admin only)
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserRoleQuery),
    responses(
        (status = 200, description = "Accounts and role counts", body = UserRoleList),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<UserRoleQuery>,
) -> AppResult<Json<UserRoleList>> {
    let list = state.services.users.list(&session, &query).await?;
    Ok(Json(list))
}

/// Switch an account between mechanic and planner (admin only)
#[utoipa::path(
    put,
    path = "/users/{id}/role",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateRole,
    responses(
        (status = 200, description = "Role updated", body = UserRole),
        (status = 403, description = "Administrator roles cannot be granted or changed"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User still holds requisitions")
    )
)]
pub async fn update_role(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRole>,
) -> AppResult<Json<UserRole>> {
    let updated = state.services.users.set_role(&session, id, body.role).await?;
    Ok(Json(updated))
}

/// Other planners, as transfer targets
#[utoipa::path(
    get,
    path = "/users/planners",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Planners other than the caller", body = Vec<PlannerSummary>),
        (status = 403, description = "Planner role required")
    )
)]
pub async fn list_planners(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> AppResult<Json<Vec<PlannerSummary>>> {
    let planners = state.services.users.planners(&session).await?;
    Ok(Json(planners))
}
