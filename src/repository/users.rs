//! Users repository: authentication records and role bindings

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use super::{catalog::escape_like, map_unique_violation};
use crate::{
    error::AppResult,
    models::user::{AuthUser, PlannerSummary, Role, RoleCounts, UserRole, UserRoleQuery},
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create the auth record and its mechanic role row atomically
    pub async fn create_account(
        &self,
        email: &str,
        password_hash: &str,
        username: &str,
    ) -> AppResult<UserRole> {
        let mut tx = self.pool.begin().await?;
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO auth_users (id, email, password_hash, created_at) VALUES ($1, LOWER($2), $3, $4)",
        )
        .bind(user_id)
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "Username already taken"))?;

        let role = sqlx::query_as::<_, UserRole>(
            r#"
            INSERT INTO user_roles (user_id, username, role, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, username, role, created_at
            "#,
        )
        .bind(user_id)
        .bind(username)
        .bind(Role::Mechanic)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(role)
    }

    /// Get auth record by email (case-insensitive)
    pub async fn get_auth_by_email(&self, email: &str) -> AppResult<Option<AuthUser>> {
        let user = sqlx::query_as::<_, AuthUser>(
            "SELECT * FROM auth_users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// The single role row of an identity
    pub async fn get_role(&self, user_id: Uuid) -> AppResult<Option<UserRole>> {
        let role = sqlx::query_as::<_, UserRole>(
            "SELECT user_id, username, role, created_at FROM user_roles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    /// List role rows with optional role filter and username search
    pub async fn list(&self, query: &UserRoleQuery) -> AppResult<Vec<UserRole>> {
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(role) = query.role {
            params.push(role.as_str().to_string());
            conditions.push(format!("role = ${}", params.len()));
        }

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            params.push(format!("%{}%", escape_like(search)));
            conditions.push(format!("username ILIKE ${}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let select_query = format!(
            "SELECT user_id, username, role, created_at FROM user_roles {} ORDER BY username",
            where_clause
        );

        let mut builder = sqlx::query_as::<_, UserRole>(&select_query);
        for param in &params {
            builder = builder.bind(param);
        }

        Ok(builder.fetch_all(&self.pool).await?)
    }

    /// Number of accounts per role
    pub async fn role_counts(&self) -> AppResult<RoleCounts> {
        let rows = sqlx::query("SELECT role, COUNT(*) AS count FROM user_roles GROUP BY role")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = RoleCounts::default();
        for row in rows {
            let role: Role = row.get("role");
            let count: i64 = row.get("count");
            match role {
                Role::Mechanic => counts.mechanic = count,
                Role::Planner => counts.pcm = count,
                Role::Admin => counts.admin = count,
            }
        }
        Ok(counts)
    }

    /// Change a non-admin role row.
    ///
    /// `None` when the row is missing, held by an admin, or when demoting a
    /// user who still has requisitions in custody.
    pub async fn set_role(&self, user_id: Uuid, role: Role) -> AppResult<Option<UserRole>> {
        let row = sqlx::query_as::<_, UserRole>(
            r#"
            UPDATE user_roles SET role = $2
            WHERE user_id = $1 AND role <> 'admin'
              AND ($2 <> 'mechanic'
                   OR NOT EXISTS (SELECT 1 FROM requisitions WHERE assigned_to = $1))
            RETURNING user_id, username, role, created_at
            "#,
        )
        .bind(user_id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Planners other than `exclude`, by username
    pub async fn planners(&self, exclude: Uuid) -> AppResult<Vec<PlannerSummary>> {
        let rows = sqlx::query_as::<_, PlannerSummary>(
            "SELECT user_id, username FROM user_roles WHERE role = 'pcm' AND user_id <> $1 ORDER BY username",
        )
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Usernames for a set of ids; unknown ids are absent from the map
    pub async fn usernames(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>> {
        let rows = sqlx::query("SELECT user_id, username FROM user_roles WHERE user_id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<Uuid, _>("user_id"), row.get::<String, _>("username")))
            .collect())
    }
}
