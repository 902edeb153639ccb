//! Cascading catalog lookup: area -> equipment -> category -> item.
//!
//! Everything here is a pure function of the active catalog and the current
//! selection, so a stale child selection can never outlive its parent.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::catalog::CatalogItem;

/// Current choices of an authoring form
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct CatalogSelection {
    pub area: Option<String>,
    pub equipment: Option<String>,
    pub category: Option<String>,
    pub item_id: Option<Uuid>,
}

impl CatalogSelection {
    /// Choose an area, clearing every dependent choice
    pub fn with_area(self, area: impl Into<String>) -> Self {
        Self {
            area: Some(area.into()),
            ..Self::default()
        }
    }

    /// Choose an equipment, clearing category and item
    pub fn with_equipment(self, equipment: impl Into<String>) -> Self {
        Self {
            area: self.area,
            equipment: Some(equipment.into()),
            ..Self::default()
        }
    }

    /// Choose a category, clearing the item
    pub fn with_category(self, category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            item_id: None,
            ..self
        }
    }

    pub fn with_item(self, item_id: Uuid) -> Self {
        Self {
            item_id: Some(item_id),
            ..self
        }
    }
}

/// Option sets for every level plus the selection that survived validation
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CascadeOptions {
    pub areas: Vec<String>,
    pub equipments: Vec<String>,
    pub categories: Vec<String>,
    pub items: Vec<CatalogItem>,
    pub selection: CatalogSelection,
}

/// Derives the option sets for `selection` from active `items`.
///
/// Inactive items are ignored. A selection that is not valid for its parent
/// (or whose parent is unset) is dropped along with everything below it.
pub fn cascade(items: &[CatalogItem], selection: &CatalogSelection) -> CascadeOptions {
    let active: Vec<&CatalogItem> = items.iter().filter(|i| i.is_active).collect();

    let areas = distinct(active.iter().map(|i| i.area.as_str()));
    let area = keep_if_valid(selection.area.as_deref(), &areas);

    let equipments = match area {
        Some(area) => distinct(active.iter().filter(|i| i.area == area).map(|i| i.equipment.as_str())),
        None => Vec::new(),
    };
    let equipment = area.and(keep_if_valid(selection.equipment.as_deref(), &equipments));

    let categories = match (area, equipment) {
        (Some(area), Some(equipment)) => distinct(
            active
                .iter()
                .filter(|i| i.area == area && i.equipment == equipment)
                .map(|i| i.category.as_str()),
        ),
        _ => Vec::new(),
    };
    let category = equipment.and(keep_if_valid(selection.category.as_deref(), &categories));

    let mut matching: Vec<CatalogItem> = match (area, equipment, category) {
        (Some(area), Some(equipment), Some(category)) => active
            .iter()
            .filter(|i| i.area == area && i.equipment == equipment && i.category == category)
            .map(|i| (*i).clone())
            .collect(),
        _ => Vec::new(),
    };
    matching.sort_by(|a, b| {
        a.display_description()
            .cmp(b.display_description())
            .then_with(|| a.item_code.cmp(&b.item_code))
    });

    let item_id = category
        .and(selection.item_id)
        .filter(|id| matching.iter().any(|i| i.id == *id));

    CascadeOptions {
        selection: CatalogSelection {
            area: area.map(String::from),
            equipment: equipment.map(String::from),
            category: category.map(String::from),
            item_id,
        },
        areas,
        equipments,
        categories,
        items: matching,
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect()
}

fn keep_if_valid<'a>(choice: Option<&'a str>, options: &[String]) -> Option<&'a str> {
    choice.filter(|c| options.iter().any(|o| o == c))
}
