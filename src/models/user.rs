//! User role model and account requests

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").unwrap());

/// Authorization role. Every account holds exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Role {
    #[serde(rename = "mechanic")]
    Mechanic,
    /// Maintenance planner (PCM)
    #[serde(rename = "pcm")]
    Planner,
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Mechanic => "mechanic",
            Role::Planner => "pcm",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mechanic" => Ok(Role::Mechanic),
            "pcm" | "planner" => Ok(Role::Planner),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

text_column!(Role);

/// Role binding for an authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserRole {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Login credentials (also used for sign-up)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct Credentials {
    #[validate(
        length(min = 3, max = 50, message = "Username must be 3 to 50 characters"),
        regex(path = *USERNAME_RE, message = "Username may only contain letters, digits and underscore")
    )]
    pub username: String,
    #[validate(length(min = 6, max = 100, message = "Password must be 6 to 100 characters"))]
    pub password: String,
}

/// Stored authentication record
#[derive(Debug, Clone, FromRow)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// User list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserRoleQuery {
    /// Only users holding this role
    pub role: Option<Role>,
    /// Case-insensitive username search
    pub search: Option<String>,
}

/// Per-role account counts
#[derive(Debug, Default, Clone, Serialize, ToSchema)]
pub struct RoleCounts {
    pub mechanic: i64,
    pub pcm: i64,
    pub admin: i64,
}

/// User list response
#[derive(Debug, Serialize, ToSchema)]
pub struct UserRoleList {
    pub users: Vec<UserRole>,
    pub counts: RoleCounts,
}

/// Update role request (admin only)
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRole {
    /// New role: "mechanic" or "pcm"
    pub role: Role,
}

/// Planner shown as a transfer target
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PlannerSummary {
    pub user_id: Uuid,
    pub username: String,
}
