//! CSV parsing and column mapping for catalog imports

use std::collections::BTreeSet;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::catalog::{CatalogItemInput, ColumnMapping, ImportPreview},
};

const SAMPLE_ROWS: usize = 5;

/// Catalog fields that must each be mapped to a column, with their labels
const FIELDS: [(Field, &str); 6] = [
    (Field::ItemCode, "Código do Item"),
    (Field::ItemDescription, "Descrição do Item"),
    (Field::SystemDescription, "Descrição no Sistema"),
    (Field::Area, "Área / Setor"),
    (Field::Category, "Categoria"),
    (Field::Equipment, "Equipamento"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    ItemCode,
    ItemDescription,
    SystemDescription,
    Area,
    Category,
    Equipment,
}

impl Field {
    fn key(&self) -> &'static str {
        match self {
            Field::ItemCode => "item_code",
            Field::ItemDescription => "item_description",
            Field::SystemDescription => "system_description",
            Field::Area => "area",
            Field::Category => "category",
            Field::Equipment => "equipment",
        }
    }

    fn get<'a>(&self, mapping: &'a ColumnMapping) -> Option<&'a str> {
        let header = match self {
            Field::ItemCode => &mapping.item_code,
            Field::ItemDescription => &mapping.item_description,
            Field::SystemDescription => &mapping.system_description,
            Field::Area => &mapping.area,
            Field::Category => &mapping.category,
            Field::Equipment => &mapping.equipment,
        };
        header.as_deref().filter(|h| !h.is_empty())
    }

    fn set(&self, mapping: &mut ColumnMapping, header: String) {
        let slot = match self {
            Field::ItemCode => &mut mapping.item_code,
            Field::ItemDescription => &mut mapping.item_description,
            Field::SystemDescription => &mut mapping.system_description,
            Field::Area => &mut mapping.area,
            Field::Category => &mut mapping.category,
            Field::Equipment => &mut mapping.equipment,
        };
        *slot = Some(header);
    }
}

/// Parsed CSV content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Splits CSV text into a header row and data rows.
///
/// Blank lines are dropped. Cells are separated by `,` or `;` outside double
/// quotes and trimmed. Fewer than two lines yields an empty table.
pub fn parse_csv(text: &str) -> CsvTable {
    let lines: Vec<&str> = text
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .collect();

    if lines.len() < 2 {
        return CsvTable::default();
    }

    CsvTable {
        headers: parse_row(lines[0]),
        rows: lines[1..].iter().map(|line| parse_row(line)).collect(),
    }
}

fn parse_row(row: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in row.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' | ';' if !in_quotes => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

/// Guesses a header for each catalog field by name similarity
pub fn auto_map(headers: &[String]) -> ColumnMapping {
    let mut mapping = ColumnMapping::default();

    for (field, label) in FIELDS {
        let key = field.key();
        let spaced = key.replacen('_', " ", 1);
        let joined = key.replacen('_', "", 1);
        let label = label.to_lowercase();

        let found = headers.iter().find(|header| {
            let h = header.to_lowercase();
            h.contains(&spaced) || h.contains(&joined) || label.contains(&h) || h.contains(&label)
        });

        if let Some(header) = found {
            field.set(&mut mapping, header.clone());
        }
    }

    mapping
}

/// Headers, suggested mapping and a sample of rows
pub fn preview(text: &str) -> AppResult<ImportPreview> {
    let table = parse_csv(text);
    if table.headers.is_empty() {
        return Err(AppError::Validation(
            "CSV must contain a header row and at least one data row".to_string(),
        ));
    }

    Ok(ImportPreview {
        mapping: auto_map(&table.headers),
        row_count: table.rows.len(),
        sample: table.rows.iter().take(SAMPLE_ROWS).cloned().collect(),
        headers: table.headers,
    })
}

/// Items extracted from a CSV and what was left out
#[derive(Debug, Default)]
pub struct ExtractedItems {
    pub items: Vec<CatalogItemInput>,
    pub skipped: usize,
    /// Codes repeated within the file
    pub duplicate_codes: Vec<String>,
}

/// Builds catalog items from `table` using `mapping`.
///
/// Every field must be mapped to an existing header. Rows without a code or
/// description are skipped; finding no usable row is an error.
pub fn extract_items(table: &CsvTable, mapping: &ColumnMapping) -> AppResult<ExtractedItems> {
    let missing: Vec<&str> = FIELDS
        .iter()
        .filter(|(field, _)| field.get(mapping).is_none())
        .map(|(_, label)| *label)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Required fields not mapped: {}",
            missing.join(", ")
        )));
    }

    let mut indexes = [0usize; 6];
    for (slot, (field, _)) in indexes.iter_mut().zip(FIELDS.iter()) {
        let header = field.get(mapping).unwrap_or_default();
        *slot = table
            .headers
            .iter()
            .position(|h| h == header)
            .ok_or_else(|| AppError::Validation(format!("Column '{}' not found in CSV", header)))?;
    }
    let [code_idx, description_idx, system_idx, area_idx, category_idx, equipment_idx] = indexes;

    let cell = |row: &[String], idx: usize| row.get(idx).cloned().unwrap_or_default();

    let mut extracted = ExtractedItems::default();
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();

    for row in &table.rows {
        let item = CatalogItemInput {
            item_code: cell(row, code_idx),
            item_description: cell(row, description_idx),
            system_description: Some(cell(row, system_idx)),
            area: cell(row, area_idx),
            category: cell(row, category_idx),
            equipment: cell(row, equipment_idx),
            is_active: true,
        }
        .normalized();

        if let Err(e) = item.validate() {
            tracing::debug!(item_code = %item.item_code, error = %e, "Skipping invalid catalog row");
            extracted.skipped += 1;
            continue;
        }

        if !seen.insert(item.item_code.clone()) {
            duplicates.insert(item.item_code.clone());
        }
        extracted.items.push(item);
    }

    if extracted.items.is_empty() {
        return Err(AppError::Validation("No valid items found in CSV".to_string()));
    }

    extracted.duplicate_codes = duplicates.into_iter().collect();
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "Código do Item;Descrição do Item;Descrição no Sistema;Área / Setor;Categoria;Equipamento\n\
        ROL-6205;Rolamento 6205;\"ROLAMENTO RIGIDO; 6205\";Produção;Rolamentos;Torno CNC 01\n\
        \n\
        ;Sem código;;Produção;Rolamentos;Torno CNC 01\n\
        COR-A42;Correia A42;;Produção;Correias;Torno CNC 01\n\
        ROL-6205;Rolamento 6205 duplicado;;Produção;Rolamentos;Torno CNC 01\n";

    #[test]
    fn test_parse_csv_quotes_and_separators() {
        let table = parse_csv(CSV);
        assert_eq!(table.headers.len(), 6);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[0][2], "ROLAMENTO RIGIDO; 6205");
        assert_eq!(parse_row(" a , b;c "), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_csv_needs_two_lines() {
        assert_eq!(parse_csv("item_code,item_description\n\n"), CsvTable::default());
        assert_eq!(parse_csv(""), CsvTable::default());
    }

    #[test]
    fn test_auto_map_portuguese_labels() {
        let table = parse_csv(CSV);
        let mapping = auto_map(&table.headers);
        assert_eq!(mapping.item_code.as_deref(), Some("Código do Item"));
        assert_eq!(mapping.item_description.as_deref(), Some("Descrição do Item"));
        assert_eq!(mapping.system_description.as_deref(), Some("Descrição no Sistema"));
        assert_eq!(mapping.area.as_deref(), Some("Área / Setor"));
        assert_eq!(mapping.category.as_deref(), Some("Categoria"));
        assert_eq!(mapping.equipment.as_deref(), Some("Equipamento"));
    }

    #[test]
    fn test_auto_map_english_keys() {
        let headers: Vec<String> = ["Item Code", "itemdescription", "System Description", "AREA", "category", "Equipment"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mapping = auto_map(&headers);
        assert_eq!(mapping.item_code.as_deref(), Some("Item Code"));
        assert_eq!(mapping.item_description.as_deref(), Some("itemdescription"));
        assert_eq!(mapping.system_description.as_deref(), Some("System Description"));
        assert_eq!(mapping.area.as_deref(), Some("AREA"));
        assert_eq!(mapping.equipment.as_deref(), Some("Equipment"));
    }

    #[test]
    fn test_extract_skips_and_flags_duplicates() {
        let table = parse_csv(CSV);
        let mapping = auto_map(&table.headers);
        let extracted = extract_items(&table, &mapping).unwrap();
        assert_eq!(extracted.items.len(), 3);
        assert_eq!(extracted.skipped, 1);
        assert_eq!(extracted.duplicate_codes, vec!["ROL-6205"]);
        assert_eq!(
            extracted.items[0].system_description.as_deref(),
            Some("ROLAMENTO RIGIDO; 6205")
        );
        assert_eq!(extracted.items[1].system_description, None);
    }

    #[test]
    fn test_extract_skips_rows_failing_item_rules() {
        let long_code = "X".repeat(60);
        let csv = format!(
            "Código do Item;Descrição do Item;Descrição no Sistema;Área / Setor;Categoria;Equipamento\n\
             {};Código longo;;Produção;Rolamentos;Torno CNC 01\n\
             SEM-AREA;Sem área;;;Rolamentos;Torno CNC 01\n\
             COR-A42;Correia A42;;Produção;Correias;Torno CNC 01\n",
            long_code
        );
        let table = parse_csv(&csv);
        let mapping = auto_map(&table.headers);
        let extracted = extract_items(&table, &mapping).unwrap();
        assert_eq!(extracted.skipped, 2);
        assert_eq!(extracted.items.len(), 1);
        assert_eq!(extracted.items[0].item_code, "COR-A42");
        assert!(extracted.items.iter().all(|item| item.validate().is_ok()));
    }

    #[test]
    fn test_extract_requires_full_mapping() {
        let table = parse_csv(CSV);
        let mut mapping = auto_map(&table.headers);
        mapping.equipment = None;
        let err = extract_items(&table, &mapping).unwrap_err();
        assert!(err.to_string().contains("Equipamento"));
    }

    #[test]
    fn test_extract_without_valid_rows() {
        let table = parse_csv("Código do Item,Descrição do Item,Descrição no Sistema,Área / Setor,Categoria,Equipamento\n,,,,,\n");
        let mapping = auto_map(&table.headers);
        assert!(extract_items(&table, &mapping).is_err());
    }

    #[test]
    fn test_preview() {
        let preview = preview(CSV).unwrap();
        assert_eq!(preview.row_count, 4);
        assert_eq!(preview.sample.len(), 4);
        assert!(super::preview("only a header").is_err());
    }
}
