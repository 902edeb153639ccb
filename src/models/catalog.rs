//! Catalog item model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Requestable catalog item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CatalogItem {
    pub id: Uuid,
    pub item_code: String,
    pub item_description: String,
    /// Description as known in the ERP; preferred for display when set
    pub system_description: Option<String>,
    pub area: String,
    pub category: String,
    pub equipment: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    /// Text shown to users and copied onto requisitions
    pub fn display_description(&self) -> &str {
        self.system_description
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.item_description)
    }
}

/// Create or replace a catalog item (admin only)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CatalogItemInput {
    #[validate(length(min = 1, max = 50, message = "Item code is required (max 50 characters)"))]
    pub item_code: String,
    #[validate(length(min = 1, max = 500, message = "Item description is required (max 500 characters)"))]
    pub item_description: String,
    #[validate(length(max = 500))]
    pub system_description: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Area is required"))]
    pub area: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    #[validate(length(min = 1, max = 200, message = "Equipment is required"))]
    pub equipment: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl CatalogItemInput {
    /// Trims every field; a blank system description becomes `None`
    pub fn normalized(self) -> Self {
        Self {
            item_code: self.item_code.trim().to_string(),
            item_description: self.item_description.trim().to_string(),
            system_description: super::requisition::non_blank(self.system_description),
            area: self.area.trim().to_string(),
            category: self.category.trim().to_string(),
            equipment: self.equipment.trim().to_string(),
            is_active: self.is_active,
        }
    }
}

/// Catalog list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct CatalogQuery {
    /// Include deactivated items (admin screens)
    #[serde(default)]
    pub include_inactive: bool,
    pub area: Option<String>,
    pub category: Option<String>,
    /// Matches code, description or equipment (case-insensitive)
    pub search: Option<String>,
}

/// Column mapping for CSV import: catalog field -> CSV header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ColumnMapping {
    pub item_code: Option<String>,
    pub item_description: Option<String>,
    pub system_description: Option<String>,
    pub area: Option<String>,
    pub category: Option<String>,
    pub equipment: Option<String>,
}

/// Parsed CSV shown before import
#[derive(Debug, Serialize, ToSchema)]
pub struct ImportPreview {
    pub headers: Vec<String>,
    pub mapping: ColumnMapping,
    /// Data rows found (header excluded)
    pub row_count: usize,
    /// First rows of the file, as parsed
    pub sample: Vec<Vec<String>>,
}

/// Outcome of a catalog import
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct ImportReport {
    pub imported: usize,
    /// Rows dropped for a missing code or description
    pub skipped: usize,
    /// Codes appearing more than once in the file or already in the catalog
    pub duplicate_codes: Vec<String>,
}
