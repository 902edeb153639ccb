//! User role administration service

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        session::Session,
        user::{PlannerSummary, Role, UserRole, UserRoleList, UserRoleQuery},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Accounts matching `query` plus per-role totals (admin only)
    pub async fn list(&self, session: &Session, query: &UserRoleQuery) -> AppResult<UserRoleList> {
        session.require_admin()?;
        let users = self.repository.users.list(query).await?;
        let counts = self.repository.users.role_counts().await?;
        Ok(UserRoleList { users, counts })
    }

    /// Switch an account between mechanic and planner (admin only)
    pub async fn set_role(&self, session: &Session, user_id: Uuid, role: Role) -> AppResult<UserRole> {
        session.require_admin()?;
        check_assignable(role)?;
        if role == Role::Mechanic {
            let held = self.repository.requisitions.count_held(user_id).await?;
            check_demotion(held)?;
        }

        match self.repository.users.set_role(user_id, role).await? {
            Some(updated) => {
                tracing::info!(
                    admin_id = %session.user_id,
                    user_id = %user_id,
                    role = %role,
                    "User role changed"
                );
                Ok(updated)
            }
            None => match self.repository.users.get_role(user_id).await? {
                Some(current) if current.role == Role::Admin => Err(AppError::Authorization(
                    "Administrator roles cannot be changed".to_string(),
                )),
                // Took custody of a requisition since the check above
                Some(_) => Err(AppError::Conflict(
                    "User now holds a requisition; transfer or release it first".to_string(),
                )),
                None => Err(AppError::NotFound(format!("User {} not found", user_id))),
            },
        }
    }

    /// Planners the caller may transfer custody to
    pub async fn planners(&self, session: &Session) -> AppResult<Vec<PlannerSummary>> {
        session.require_planner()?;
        self.repository.users.planners(session.user_id).await
    }
}

fn check_assignable(role: Role) -> AppResult<()> {
    if role == Role::Admin {
        return Err(AppError::Authorization(
            "The administrator role cannot be granted".to_string(),
        ));
    }
    Ok(())
}

/// A planner holding requisitions cannot become a mechanic: nobody else
/// could act on or transfer them.
fn check_demotion(held: i64) -> AppResult<()> {
    if held > 0 {
        return Err(AppError::Conflict(format!(
            "User still holds {} requisition(s); transfer or release them first",
            held
        )));
    }
    Ok(())
}
