//! Authenticated session and token claims

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::user::Role;
use crate::error::AppError;

/// JWT claims. Identity only: the role is always read from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Authenticated user id
    pub sub: Uuid,
    /// Token id, the revocation key
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}

/// A resolved session: identity plus the role currently stored for it.
///
/// Built per request and passed explicitly to every authorization decision.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Session {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    #[serde(skip)]
    pub token_id: Uuid,
    #[serde(skip)]
    pub expires_at: i64,
}

impl Session {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn require_mechanic(&self) -> Result<(), AppError> {
        if self.has_role(Role::Mechanic) {
            Ok(())
        } else {
            Err(AppError::Authorization("Mechanic role required".to_string()))
        }
    }

    pub fn require_planner(&self) -> Result<(), AppError> {
        if self.has_role(Role::Planner) {
            Ok(())
        } else {
            Err(AppError::Authorization("Planner role required".to_string()))
        }
    }

    /// Planners and administrators may see every requisition
    pub fn require_staff(&self) -> Result<(), AppError> {
        if matches!(self.role, Role::Planner | Role::Admin) {
            Ok(())
        } else {
            Err(AppError::Authorization("Planner or administrator role required".to_string()))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.has_role(Role::Admin) {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }
}

/// Sign-in / sign-up response
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: i64,
    pub session: Session,
}
