//! Item category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Create or rename a category
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100, message = "Category name is required (max 100 characters)"))]
    pub name: String,
}

/// Bulk category import: one or more comma-separated names per line
#[derive(Debug, Deserialize, ToSchema)]
pub struct CategoryImport {
    pub content: String,
}

/// Result of a bulk category import
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryImportResult {
    pub imported: usize,
}

/// Splits import text into names: lines, then commas, trimmed, empties dropped
pub fn split_category_names(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .flat_map(|line| line.split(','))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Names not already present, compared case-insensitively, first spelling wins
pub fn new_category_names(names: Vec<String>, existing: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = existing.iter().map(|n| n.to_lowercase()).collect();
    let mut fresh = Vec::new();
    for name in names {
        let key = name.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            fresh.push(name);
        }
    }
    fresh
}
