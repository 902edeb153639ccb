//! Authentication and session resolution

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        session::{AuthResponse, Session, SessionClaims},
        user::{Credentials, UserRole},
    },
    repository::Repository,
    services::redis::RedisService,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
    redis: RedisService,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig, redis: RedisService) -> Self {
        Self { repository, config, redis }
    }

    /// Synthetic e-mail a username signs in with
    pub fn email_for(&self, username: &str) -> String {
        synthetic_email(username, &self.config.email_domain)
    }

    /// Register a new account. Every account starts as a mechanic.
    pub async fn signup(&self, credentials: &Credentials) -> AppResult<AuthResponse> {
        let email = self.email_for(&credentials.username);
        let password_hash = hash_password(&credentials.password)?;

        let role = self
            .repository
            .users
            .create_account(&email, &password_hash, credentials.username.trim())
            .await?;

        tracing::info!(user_id = %role.user_id, username = %role.username, "Account created");
        self.issue(role)
    }

    /// Authenticate by username and password and return a bearer token
    pub async fn login(&self, credentials: &Credentials) -> AppResult<AuthResponse> {
        let email = self.email_for(&credentials.username);
        let invalid = || AppError::Authentication("Invalid username or password".to_string());

        let user = self
            .repository
            .users
            .get_auth_by_email(&email)
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&user.password_hash, &credentials.password)? {
            return Err(invalid());
        }

        let role = self
            .repository
            .users
            .get_role(user.id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = %user.id, "Sign-in refused: account has no role");
                AppError::Authentication("Account has no role assigned".to_string())
            })?;

        self.issue(role)
    }

    /// Resolve the session behind a bearer token.
    ///
    /// Fails closed: any problem (bad or revoked token, store failure, missing
    /// role row) is reported as not authenticated.
    pub async fn resolve(&self, token: &str) -> AppResult<Session> {
        let claims = SessionClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))?;

        match self.redis.is_token_revoked(claims.jti).await {
            Ok(false) => {}
            Ok(true) => {
                return Err(AppError::Authentication("Session has been signed out".to_string()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Revocation check failed, refusing session");
                return Err(AppError::Authentication("Session could not be verified".to_string()));
            }
        }

        let role = match self.repository.users.get_role(claims.sub).await {
            Ok(Some(role)) => role,
            Ok(None) => {
                return Err(AppError::Authentication("Account has no role assigned".to_string()))
            }
            Err(e) => {
                tracing::warn!(error = %e, user_id = %claims.sub, "Role lookup failed, refusing session");
                return Err(AppError::Authentication("Session could not be verified".to_string()));
            }
        };

        Ok(Session {
            user_id: role.user_id,
            username: role.username,
            role: role.role,
            token_id: claims.jti,
            expires_at: claims.exp,
        })
    }

    /// Sign out: the token stays revoked until its natural expiry
    pub async fn logout(&self, session: &Session) -> AppResult<()> {
        let remaining = session.expires_at - Utc::now().timestamp();
        if remaining > 0 {
            self.redis.revoke_token(session.token_id, remaining as u64).await?;
        }
        tracing::info!(user_id = %session.user_id, "Signed out");
        Ok(())
    }

    fn issue(&self, role: UserRole) -> AppResult<AuthResponse> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = SessionClaims {
            sub: role.user_id,
            jti: Uuid::new_v4(),
            iat: now,
            exp,
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok(AuthResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_at: exp,
            session: Session {
                user_id: role.user_id,
                username: role.username,
                role: role.role,
                token_id: claims.jti,
                expires_at: exp,
            },
        })
    }
}

/// `{username}@{domain}`, lower-cased
pub fn synthetic_email(username: &str, domain: &str) -> String {
    format!("{}@{}", username.trim().to_lowercase(), domain)
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
