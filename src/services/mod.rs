//! Business logic services

pub mod auth;
pub mod catalog;
pub mod catalog_import;
pub mod categories;
pub mod lookup;
pub mod redis;
pub mod requisitions;
pub mod users;
pub mod workflow;

use crate::{config::AuthConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub requisitions: requisitions::RequisitionsService,
    pub catalog: catalog::CatalogService,
    pub categories: categories::CategoriesService,
    pub users: users::UsersService,
    pub redis: redis::RedisService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig, redis_service: redis::RedisService) -> Self {
        Self {
            auth: auth::AuthService::new(repository.clone(), auth_config, redis_service.clone()),
            requisitions: requisitions::RequisitionsService::new(repository.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            categories: categories::CategoriesService::new(repository.clone()),
            users: users::UsersService::new(repository),
            redis: redis_service,
        }
    }
}
