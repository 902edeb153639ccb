//! REX Maintenance Requisition Server
//!
//! REST and WebSocket API through which mechanics request maintenance
//! materials and planners take, advance and release those requisitions.

use std::sync::Arc;

use sqlx::PgPool;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod realtime;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub bus: Arc<realtime::ChangeBus>,
    pub pool: PgPool,
}
