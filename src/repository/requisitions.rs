//! Requisitions repository

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::requisition::{NewRequisition, Requisition, Status},
    realtime::feed::FeedScope,
    services::workflow::Transition,
};

#[derive(Clone)]
pub struct RequisitionsRepository {
    pool: Pool<Postgres>,
}

impl RequisitionsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Every requisition admitted by `scope`, newest first
    pub async fn list_scope(&self, scope: &FeedScope) -> AppResult<Vec<Requisition>> {
        let rows = match scope {
            FeedScope::All => {
                sqlx::query_as::<_, Requisition>(
                    "SELECT * FROM requisitions ORDER BY created_at DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
            FeedScope::CreatedBy(user_id) => {
                sqlx::query_as::<_, Requisition>(
                    "SELECT * FROM requisitions WHERE created_by = $1 ORDER BY created_at DESC",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            FeedScope::AssignedTo(user_id) => {
                sqlx::query_as::<_, Requisition>(
                    "SELECT * FROM requisitions WHERE assigned_to = $1 ORDER BY created_at DESC",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    /// Get requisition by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Requisition> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Requisition {} not found", id)))
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Requisition>> {
        let row = sqlx::query_as::<_, Requisition>("SELECT * FROM requisitions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Requisitions currently in `user_id`'s custody
    pub async fn count_held(&self, user_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM requisitions WHERE assigned_to = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Insert a submission batch atomically, one row per line
    pub async fn create_batch(&self, rows: &[NewRequisition]) -> AppResult<Vec<Requisition>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let mut created = Vec::with_capacity(rows.len());

        for row in rows {
            let requisition = sqlx::query_as::<_, Requisition>(
                r#"
                INSERT INTO requisitions (
                    id, area, equipment, item_description, item_code, quantity, priority,
                    problem_description, justification, cost_center, photos,
                    status, created_by, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&row.area)
            .bind(&row.equipment)
            .bind(&row.item_description)
            .bind(&row.item_code)
            .bind(row.quantity)
            .bind(row.priority)
            .bind(&row.problem_description)
            .bind(&row.justification)
            .bind(&row.cost_center)
            .bind(&row.photos)
            .bind(Status::Pending)
            .bind(row.created_by)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            created.push(requisition);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Rewrite the mutable fields of a pending requisition owned by `data.created_by`.
    ///
    /// Returns `None` when the row is gone, not pending, or owned by someone else.
    pub async fn update_pending(&self, id: Uuid, data: &NewRequisition) -> AppResult<Option<Requisition>> {
        let row = sqlx::query_as::<_, Requisition>(
            r#"
            UPDATE requisitions SET
                area = $3, equipment = $4, item_description = $5, item_code = $6,
                quantity = $7, priority = $8, problem_description = $9,
                justification = $10, cost_center = $11, photos = $12, updated_at = $13
            WHERE id = $1 AND created_by = $2 AND status = 'pendente'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.created_by)
        .bind(&data.area)
        .bind(&data.equipment)
        .bind(&data.item_description)
        .bind(&data.item_code)
        .bind(data.quantity)
        .bind(data.priority)
        .bind(&data.problem_description)
        .bind(&data.justification)
        .bind(&data.cost_center)
        .bind(&data.photos)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Delete a pending requisition owned by `created_by`; false when nothing matched
    pub async fn delete_pending(&self, id: Uuid, created_by: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM requisitions WHERE id = $1 AND created_by = $2 AND status = 'pendente'",
        )
        .bind(id)
        .bind(created_by)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Compare-and-set write of a planned transition.
    ///
    /// Matches only if status and assignee are still what the plan was made
    /// from; `None` means another writer got there first.
    pub async fn apply_transition(&self, id: Uuid, transition: &Transition) -> AppResult<Option<Requisition>> {
        let row = sqlx::query_as::<_, Requisition>(
            r#"
            UPDATE requisitions SET
                status = $4,
                assigned_to = $5,
                transferred_from = $6,
                rejection_reason = $7,
                updated_at = $8
            WHERE id = $1 AND status = $2 AND assigned_to IS NOT DISTINCT FROM $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(transition.from)
        .bind(transition.expected_assignee)
        .bind(transition.to)
        .bind(transition.assigned_to)
        .bind(transition.transferred_from)
        .bind(&transition.rejection_reason)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
