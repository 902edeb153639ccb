//! Catalog management service

use std::collections::BTreeSet;

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        catalog::{CatalogItem, CatalogItemInput, CatalogQuery, ColumnMapping, ImportPreview, ImportReport},
        session::Session,
    },
    repository::Repository,
    services::{
        catalog_import::{self, ExtractedItems},
        lookup::{cascade, CascadeOptions, CatalogSelection},
    },
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search items with filters
    pub async fn list(&self, session: &Session, query: &CatalogQuery) -> AppResult<Vec<CatalogItem>> {
        if query.include_inactive {
            session.require_admin()?;
        }
        self.repository.catalog.list(query).await
    }

    /// Option sets for a cascading selection over the active catalog
    pub async fn lookup(&self, selection: &CatalogSelection) -> AppResult<CascadeOptions> {
        let items = self.repository.catalog.list_active().await?;
        Ok(cascade(&items, selection))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<CatalogItem> {
        self.repository.catalog.get_by_id(id).await
    }

    pub async fn create(&self, session: &Session, data: CatalogItemInput) -> AppResult<CatalogItem> {
        session.require_admin()?;
        let data = data.normalized();
        data.validate()?;

        let item = self.repository.catalog.create(&data).await?;
        tracing::info!(item_id = %item.id, item_code = %item.item_code, "Catalog item created");
        Ok(item)
    }

    pub async fn update(&self, session: &Session, id: Uuid, data: CatalogItemInput) -> AppResult<CatalogItem> {
        session.require_admin()?;
        let data = data.normalized();
        data.validate()?;

        let item = self.repository.catalog.update(id, &data).await?;
        tracing::info!(item_id = %id, is_active = item.is_active, "Catalog item updated");
        Ok(item)
    }

    pub async fn delete(&self, session: &Session, id: Uuid) -> AppResult<()> {
        session.require_admin()?;
        self.repository.catalog.delete(id).await?;
        tracing::info!(item_id = %id, "Catalog item deleted");
        Ok(())
    }

    /// Headers and suggested column mapping of an uploaded CSV
    pub fn import_preview(&self, session: &Session, text: &str) -> AppResult<ImportPreview> {
        session.require_admin()?;
        catalog_import::preview(text)
    }

    /// Import a CSV with an explicit or automatic column mapping
    pub async fn import(
        &self,
        session: &Session,
        text: &str,
        mapping: Option<ColumnMapping>,
    ) -> AppResult<ImportReport> {
        session.require_admin()?;

        let table = catalog_import::parse_csv(text);
        let mapping = mapping.unwrap_or_else(|| catalog_import::auto_map(&table.headers));
        let extracted = catalog_import::extract_items(&table, &mapping)?;

        let codes: Vec<String> = extracted.items.iter().map(|i| i.item_code.clone()).collect();
        let existing = self.repository.catalog.existing_codes(&codes).await?;
        let imported = self.repository.catalog.insert_batch(&extracted.items).await?;

        let report = build_report(imported, extracted, existing);
        tracing::info!(
            user_id = %session.user_id,
            imported = report.imported,
            skipped = report.skipped,
            duplicates = report.duplicate_codes.len(),
            "Catalog CSV imported"
        );
        Ok(report)
    }
}

/// Duplicates are codes repeated in the file or already in the catalog
fn build_report(imported: usize, extracted: ExtractedItems, existing: Vec<String>) -> ImportReport {
    let duplicate_codes: BTreeSet<String> = extracted.duplicate_codes.into_iter().chain(existing).collect();
    ImportReport {
        imported,
        skipped: extracted.skipped,
        duplicate_codes: duplicate_codes.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_merges_duplicate_sources() {
        let extracted = ExtractedItems {
            items: vec![],
            skipped: 2,
            duplicate_codes: vec!["ROL-6205".to_string(), "COR-A42".to_string()],
        };
        let report = build_report(5, extracted, vec!["ROL-6205".to_string(), "FIL-001".to_string()]);

        assert_eq!(report.imported, 5);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.duplicate_codes, vec!["COR-A42", "FIL-001", "ROL-6205"]);
    }

    #[test]
    fn test_report_without_duplicates() {
        let report = build_report(1, ExtractedItems::default(), vec![]);
        assert!(report.duplicate_codes.is_empty());
    }
}
