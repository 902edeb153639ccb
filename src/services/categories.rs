//! Item category service

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        category::{new_category_names, split_category_names, Category, CategoryImportResult, CategoryInput},
        session::Session,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CategoriesService {
    repository: Repository,
}

impl CategoriesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> AppResult<Vec<Category>> {
        self.repository.categories.list().await
    }

    pub async fn create(&self, session: &Session, data: CategoryInput) -> AppResult<Category> {
        session.require_admin()?;
        let data = CategoryInput {
            name: data.name.trim().to_string(),
        };
        data.validate()?;

        let category = self.repository.categories.create(&data.name).await?;
        tracing::info!(category_id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn rename(&self, session: &Session, id: Uuid, data: CategoryInput) -> AppResult<Category> {
        session.require_admin()?;
        let data = CategoryInput {
            name: data.name.trim().to_string(),
        };
        data.validate()?;

        self.repository.categories.rename(id, &data.name).await
    }

    pub async fn delete(&self, session: &Session, id: Uuid) -> AppResult<()> {
        session.require_admin()?;
        self.repository.categories.delete(id).await?;
        tracing::info!(category_id = %id, "Category deleted");
        Ok(())
    }

    /// Bulk import; names already present (any case) are left out
    pub async fn import(&self, session: &Session, content: &str) -> AppResult<CategoryImportResult> {
        session.require_admin()?;

        let existing: Vec<String> = self
            .repository
            .categories
            .list()
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();
        let fresh = new_category_names(split_category_names(content), &existing);
        if fresh.is_empty() {
            return Ok(CategoryImportResult { imported: 0 });
        }

        let imported = self.repository.categories.insert_many(&fresh).await?;
        tracing::info!(imported, "Categories imported");
        Ok(CategoryImportResult { imported })
    }
}
