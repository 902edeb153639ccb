//! Repository layer for database operations

pub mod catalog;
pub mod categories;
pub mod requisitions;
pub mod users;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub requisitions: requisitions::RequisitionsRepository,
    pub catalog: catalog::CatalogRepository,
    pub categories: categories::CategoriesRepository,
    pub users: users::UsersRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            requisitions: requisitions::RequisitionsRepository::new(pool.clone()),
            catalog: catalog::CatalogRepository::new(pool.clone()),
            categories: categories::CategoriesRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Maps a unique violation to `Conflict`, everything else to `Database`
pub(crate) fn map_unique_violation(err: sqlx::Error, message: &str) -> crate::error::AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            crate::error::AppError::Conflict(message.to_string())
        }
        _ => crate::error::AppError::Database(err),
    }
}
