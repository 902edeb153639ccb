//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, catalog, categories, health, realtime, requisitions, users};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "REX API",
        version = "0.3.0",
        description = "Maintenance materials requisition REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&SecurityAddon),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::signup,
        auth::login,
        auth::me,
        auth::logout,
        // Requisitions
        requisitions::list_requisitions,
        requisitions::create_requisitions,
        requisitions::history,
        requisitions::get_requisition,
        requisitions::update_requisition,
        requisitions::delete_requisition,
        // Workflow
        requisitions::take,
        requisitions::reject,
        requisitions::advance,
        requisitions::lapse,
        requisitions::transfer,
        requisitions::complete,
        requisitions::close,
        // Realtime
        realtime::requisition_feed,
        // Catalog
        catalog::list_items,
        catalog::lookup,
        catalog::get_item,
        catalog::create_item,
        catalog::update_item,
        catalog::delete_item,
        catalog::import_preview,
        catalog::import_items,
        // Categories
        categories::list_categories,
        categories::create_category,
        categories::rename_category,
        categories::delete_category,
        categories::import_categories,
        // Users
        users::list_users,
        users::update_role,
        users::list_planners,
    ),
    components(
        schemas(
            // Auth
            crate::models::user::Credentials,
            crate::models::user::Role,
            crate::models::session::Session,
            crate::models::session::AuthResponse,
            // Requisitions
            crate::models::requisition::Requisition,
            crate::models::requisition::Priority,
            crate::models::requisition::Status,
            crate::models::requisition::ListScope,
            crate::models::requisition::RequisitionLine,
            crate::models::requisition::CreateRequisitions,
            crate::models::requisition::EditRequisition,
            crate::models::requisition::RequisitionList,
            crate::models::requisition::RequisitionHistory,
            crate::models::requisition::RequisitionDetails,
            crate::models::requisition::ReasonRequest,
            crate::models::requisition::StatusRequest,
            crate::models::requisition::TransferRequest,
            crate::services::workflow::ActionKind,
            // Catalog
            crate::models::catalog::CatalogItem,
            crate::models::catalog::CatalogItemInput,
            crate::models::catalog::ColumnMapping,
            crate::models::catalog::ImportPreview,
            crate::models::catalog::ImportReport,
            crate::services::lookup::CatalogSelection,
            crate::services::lookup::CascadeOptions,
            catalog::ImportUpload,
            // Categories
            crate::models::category::Category,
            crate::models::category::CategoryInput,
            crate::models::category::CategoryImport,
            crate::models::category::CategoryImportResult,
            // Users
            crate::models::user::UserRole,
            crate::models::user::RoleCounts,
            crate::models::user::UserRoleList,
            crate::models::user::UpdateRole,
            crate::models::user::PlannerSummary,
            // Health
            health::HealthResponse,
            health::ReadinessResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Sign-up, sign-in and session"),
        (name = "requisitions", description = "Requisition authoring and listing"),
        (name = "workflow", description = "Status and custody changes"),
        (name = "realtime", description = "Live requisition feed"),
        (name = "catalog", description = "Material catalog"),
        (name = "categories", description = "Item categories"),
        (name = "users", description = "Account roles")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
