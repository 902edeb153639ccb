//! Catalog items repository

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::catalog::{CatalogItem, CatalogItemInput, CatalogQuery},
};

#[derive(Clone)]
pub struct CatalogRepository {
    pool: Pool<Postgres>,
}

impl CatalogRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List catalog items ordered by area, category and description
    pub async fn list(&self, query: &CatalogQuery) -> AppResult<Vec<CatalogItem>> {
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if !query.include_inactive {
            conditions.push("is_active".to_string());
        }

        if let Some(area) = query.area.as_deref().filter(|a| !a.is_empty()) {
            params.push(area.to_string());
            conditions.push(format!("area = ${}", params.len()));
        }

        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            params.push(category.to_string());
            conditions.push(format!("category = ${}", params.len()));
        }

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            params.push(format!("%{}%", escape_like(search)));
            conditions.push(format!(
                "(item_code ILIKE ${0} OR item_description ILIKE ${0} \
                 OR COALESCE(system_description, '') ILIKE ${0} OR equipment ILIKE ${0})",
                params.len()
            ));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let select_query = format!(
            "SELECT * FROM catalog_items {} ORDER BY area, category, item_description",
            where_clause
        );

        let mut builder = sqlx::query_as::<_, CatalogItem>(&select_query);
        for param in &params {
            builder = builder.bind(param);
        }

        Ok(builder.fetch_all(&self.pool).await?)
    }

    /// Active items only, the input of the cascading lookup
    pub async fn list_active(&self) -> AppResult<Vec<CatalogItem>> {
        self.list(&CatalogQuery::default()).await
    }

    /// Get catalog item by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<CatalogItem> {
        sqlx::query_as::<_, CatalogItem>("SELECT * FROM catalog_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Catalog item {} not found", id)))
    }

    /// Create a catalog item
    pub async fn create(&self, data: &CatalogItemInput) -> AppResult<CatalogItem> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, CatalogItem>(
            r#"
            INSERT INTO catalog_items (
                id, item_code, item_description, system_description,
                area, category, equipment, is_active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.item_code)
        .bind(&data.item_description)
        .bind(&data.system_description)
        .bind(&data.area)
        .bind(&data.category)
        .bind(&data.equipment)
        .bind(data.is_active)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Replace every editable field of a catalog item
    pub async fn update(&self, id: Uuid, data: &CatalogItemInput) -> AppResult<CatalogItem> {
        sqlx::query_as::<_, CatalogItem>(
            r#"
            UPDATE catalog_items SET
                item_code = $2, item_description = $3, system_description = $4,
                area = $5, category = $6, equipment = $7, is_active = $8, updated_at = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.item_code)
        .bind(&data.item_description)
        .bind(&data.system_description)
        .bind(&data.area)
        .bind(&data.category)
        .bind(&data.equipment)
        .bind(data.is_active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Catalog item {} not found", id)))
    }

    /// Delete a catalog item
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM catalog_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Catalog item {} not found", id)));
        }
        Ok(())
    }

    /// Which of `codes` already exist in the catalog
    pub async fn existing_codes(&self, codes: &[String]) -> AppResult<Vec<String>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT item_code FROM catalog_items WHERE item_code = ANY($1) ORDER BY item_code",
        )
        .bind(codes)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Insert imported items in one transaction
    pub async fn insert_batch(&self, items: &[CatalogItemInput]) -> AppResult<usize> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO catalog_items (
                    id, item_code, item_description, system_description,
                    area, category, equipment, is_active, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&item.item_code)
            .bind(&item.item_description)
            .bind(&item.system_description)
            .bind(&item.area)
            .bind(&item.category)
            .bind(&item.equipment)
            .bind(item.is_active)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(items.len())
    }
}

/// Escapes LIKE wildcards in user input
pub(crate) fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
