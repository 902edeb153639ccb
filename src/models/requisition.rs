//! Requisition model and related types

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

pub const MAX_PHOTOS: usize = 5;

/// Requisition urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Priority {
    #[serde(rename = "Baixa")]
    Low,
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Urgente")]
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Baixa",
            Priority::Normal => "Normal",
            Priority::Urgent => "Urgente",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Baixa" => Ok(Priority::Low),
            "Normal" => Ok(Priority::Normal),
            "Urgente" => Ok(Priority::Urgent),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

text_column!(Priority);

/// Workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Status {
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "em_andamento")]
    InProgress,
    #[serde(rename = "pre_liberacao")]
    PreRelease,
    #[serde(rename = "coleta_emitida")]
    CollectionIssued,
    #[serde(rename = "material_disponivel")]
    MaterialAvailable,
    #[serde(rename = "concluido")]
    Completed,
    #[serde(rename = "encerrada_sem_liberacao")]
    ClosedWithoutRelease,
    #[serde(rename = "rejeitado")]
    Rejected,
    #[serde(rename = "caducou")]
    Lapsed,
}

/// Grouping used by the history view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPhase {
    Active,
    Completed,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 9] = [
        Status::Pending,
        Status::InProgress,
        Status::PreRelease,
        Status::CollectionIssued,
        Status::MaterialAvailable,
        Status::Completed,
        Status::ClosedWithoutRelease,
        Status::Rejected,
        Status::Lapsed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pendente",
            Status::InProgress => "em_andamento",
            Status::PreRelease => "pre_liberacao",
            Status::CollectionIssued => "coleta_emitida",
            Status::MaterialAvailable => "material_disponivel",
            Status::Completed => "concluido",
            Status::ClosedWithoutRelease => "encerrada_sem_liberacao",
            Status::Rejected => "rejeitado",
            Status::Lapsed => "caducou",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Completed | Status::ClosedWithoutRelease | Status::Rejected | Status::Lapsed
        )
    }

    /// States in which a planner holds the requisition (`assigned_to` set)
    pub fn in_custody(&self) -> bool {
        matches!(self, Status::InProgress | Status::PreRelease | Status::CollectionIssued)
    }

    /// States that carry a rejection reason
    pub fn carries_reason(&self) -> bool {
        matches!(self, Status::Rejected | Status::Lapsed)
    }

    pub fn phase(&self) -> StatusPhase {
        match self {
            Status::Completed => StatusPhase::Completed,
            Status::Rejected | Status::Lapsed | Status::ClosedWithoutRelease => StatusPhase::Cancelled,
            _ => StatusPhase::Active,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .iter()
            .find(|status| status.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Invalid status: {}", s))
    }
}

text_column!(Status);

/// Requisition row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Requisition {
    pub id: Uuid,
    pub area: String,
    pub equipment: String,
    /// Display text copied from the catalog item at submission time
    pub item_description: String,
    pub item_code: Option<String>,
    pub quantity: i32,
    pub priority: Priority,
    pub problem_description: String,
    pub justification: Option<String>,
    pub cost_center: Option<String>,
    /// Encoded image payloads (data URLs)
    pub photos: Vec<String>,
    pub status: Status,
    pub assigned_to: Option<Uuid>,
    pub transferred_from: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row ready to be inserted (status is always pending)
#[derive(Debug, Clone)]
pub struct NewRequisition {
    pub area: String,
    pub equipment: String,
    pub item_description: String,
    pub item_code: Option<String>,
    pub quantity: i32,
    pub priority: Priority,
    pub problem_description: String,
    pub justification: Option<String>,
    pub cost_center: Option<String>,
    pub photos: Vec<String>,
    pub created_by: Uuid,
}

/// One requested catalog item
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct RequisitionLine {
    #[validate(length(min = 1, max = 100, message = "Area is required"))]
    pub area: String,
    #[validate(length(min = 1, max = 200, message = "Equipment is required"))]
    pub equipment: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub catalog_item_id: Uuid,
    #[validate(range(min = 1, max = 9999, message = "Quantity must be between 1 and 9999"))]
    pub quantity: i32,
}

/// Submission of one or more requisitions sharing a header
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRequisitions {
    pub priority: Priority,
    #[validate(length(min = 10, max = 2000, message = "Problem description must be 10 to 2000 characters"))]
    pub problem_description: String,
    pub justification: Option<String>,
    pub cost_center: Option<String>,
    #[serde(default)]
    #[validate(length(max = 5, message = "At most 5 photos per requisition"))]
    pub photos: Vec<String>,
    #[validate(length(min = 1, max = 20, message = "Between 1 and 20 items per submission"))]
    #[validate(nested)]
    pub items: Vec<RequisitionLine>,
}

/// Rewrite of a pending requisition by its author
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EditRequisition {
    #[validate(nested)]
    pub item: RequisitionLine,
    pub priority: Priority,
    #[validate(length(min = 10, max = 2000, message = "Problem description must be 10 to 2000 characters"))]
    pub problem_description: String,
    pub justification: Option<String>,
    pub cost_center: Option<String>,
    #[serde(default)]
    #[validate(length(max = 5, message = "At most 5 photos per requisition"))]
    pub photos: Vec<String>,
}

/// Which slice of requisitions to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ListScope {
    /// Every requisition (planner/admin inbox)
    All,
    /// Submitted by the caller
    #[default]
    Mine,
    /// Currently held by the caller
    Assigned,
}

/// Requisition list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct RequisitionQuery {
    pub scope: Option<ListScope>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub area: Option<String>,
    /// Matches equipment, item description or area (case-insensitive)
    pub search: Option<String>,
}

impl RequisitionQuery {
    /// Applies the status, priority, area and search filters
    pub fn matches(&self, requisition: &Requisition) -> bool {
        if self.status.is_some_and(|s| s != requisition.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != requisition.priority) {
            return false;
        }
        if let Some(area) = self.area.as_deref().filter(|a| !a.is_empty()) {
            if requisition.area != area {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => {
                let term = term.to_lowercase();
                [&requisition.equipment, &requisition.item_description, &requisition.area]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

/// Requisition list response
#[derive(Debug, Serialize, ToSchema)]
pub struct RequisitionList {
    pub requisitions: Vec<Requisition>,
    /// Pending requisitions within the listed scope
    pub pending_count: usize,
    /// Distinct areas present in the listed scope
    pub areas: Vec<String>,
}

/// Requisitions of one author grouped by phase
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct RequisitionHistory {
    pub active: Vec<Requisition>,
    pub completed: Vec<Requisition>,
    pub cancelled: Vec<Requisition>,
}

impl RequisitionHistory {
    pub fn group(requisitions: Vec<Requisition>) -> Self {
        let mut history = Self::default();
        for requisition in requisitions {
            match requisition.status.phase() {
                StatusPhase::Active => history.active.push(requisition),
                StatusPhase::Completed => history.completed.push(requisition),
                StatusPhase::Cancelled => history.cancelled.push(requisition),
            }
        }
        history
    }
}

/// Requisition with resolved usernames and the caller's allowed actions
#[derive(Debug, Serialize, ToSchema)]
pub struct RequisitionDetails {
    #[serde(flatten)]
    pub requisition: Requisition,
    pub created_by_username: Option<String>,
    pub assigned_to_username: Option<String>,
    pub transferred_from_username: Option<String>,
    pub allowed_actions: Vec<crate::services::workflow::ActionKind>,
}

/// Reject or lapse request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReasonRequest {
    pub reason: String,
}

/// Status change request for the current assignee
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusRequest {
    pub status: Status,
}

/// Transfer to another planner
#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferRequest {
    pub to: Uuid,
}

/// Checks every photo is a base64 payload, optionally wrapped in a data URL
pub fn validate_photos(photos: &[String]) -> AppResult<()> {
    if photos.len() > MAX_PHOTOS {
        return Err(AppError::Validation(format!(
            "At most {} photos per requisition",
            MAX_PHOTOS
        )));
    }

    for (index, photo) in photos.iter().enumerate() {
        let payload = match photo.strip_prefix("data:") {
            Some(rest) => {
                let (meta, data) = rest.split_once(',').ok_or_else(|| {
                    AppError::Validation(format!("Photo {} is not a valid data URL", index + 1))
                })?;
                if !meta.starts_with("image/") || !meta.ends_with(";base64") {
                    return Err(AppError::Validation(format!(
                        "Photo {} must be a base64 encoded image",
                        index + 1
                    )));
                }
                data
            }
            None => photo.as_str(),
        };

        if STANDARD.decode(payload.trim()).is_err() {
            return Err(AppError::Validation(format!(
                "Photo {} is not valid base64",
                index + 1
            )));
        }
    }

    Ok(())
}

/// Trims optional free text, mapping blank values to `None`
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_values() {
        assert_eq!(serde_json::to_string(&Status::Pending).unwrap(), "\"pendente\"");
        assert_eq!(
            serde_json::to_string(&Status::ClosedWithoutRelease).unwrap(),
            "\"encerrada_sem_liberacao\""
        );
        for status in Status::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("pending".parse::<Status>().is_err());
    }

    #[test]
    fn test_status_classes() {
        let terminal: Vec<_> = Status::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal.len(), 4);
        assert!(!Status::MaterialAvailable.is_terminal());
        assert!(!Status::MaterialAvailable.in_custody());
        assert!(Status::CollectionIssued.in_custody());
        assert!(Status::Lapsed.carries_reason());
        assert!(!Status::ClosedWithoutRelease.carries_reason());
    }

    #[test]
    fn test_priority_wire_values() {
        assert_eq!(serde_json::to_string(&Priority::Urgent).unwrap(), "\"Urgente\"");
        assert_eq!("Baixa".parse::<Priority>().unwrap(), Priority::Low);
    }

    fn sample() -> Requisition {
        Requisition {
            id: Uuid::new_v4(),
            area: "Produção".to_string(),
            equipment: "Torno CNC 01".to_string(),
            item_description: "Rolamento".to_string(),
            item_code: None,
            quantity: 1,
            priority: Priority::Normal,
            problem_description: "Ruído no eixo".to_string(),
            justification: None,
            cost_center: None,
            photos: vec![],
            status: Status::Pending,
            assigned_to: None,
            transferred_from: None,
            rejection_reason: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_query_matches() {
        let requisition = sample();
        assert!(RequisitionQuery::default().matches(&requisition));

        let search = RequisitionQuery { search: Some(" torno ".to_string()), ..Default::default() };
        assert!(search.matches(&requisition));

        let other_area = RequisitionQuery { area: Some("Utilidades".to_string()), ..Default::default() };
        assert!(!other_area.matches(&requisition));

        let urgent = RequisitionQuery { priority: Some(Priority::Urgent), ..Default::default() };
        assert!(!urgent.matches(&requisition));

        let pending = RequisitionQuery { status: Some(Status::Pending), ..Default::default() };
        assert!(pending.matches(&requisition));
    }

    #[test]
    fn test_history_grouping() {
        let base = sample();
        let with = |status| Requisition { id: Uuid::new_v4(), status, ..base.clone() };

        let history = RequisitionHistory::group(vec![
            with(Status::Pending),
            with(Status::MaterialAvailable),
            with(Status::Completed),
            with(Status::Rejected),
            with(Status::ClosedWithoutRelease),
        ]);
        assert_eq!(history.active.len(), 2);
        assert_eq!(history.completed.len(), 1);
        assert_eq!(history.cancelled.len(), 2);
    }

    #[test]
    fn test_validate_photos() {
        let data_url = format!("data:image/png;base64,{}", STANDARD.encode(b"\x89PNG"));
        assert!(validate_photos(&[data_url.clone()]).is_ok());
        assert!(validate_photos(&[STANDARD.encode(b"raw")]).is_ok());
        assert!(validate_photos(&["data:text/plain;base64,aGk=".to_string()]).is_err());
        assert!(validate_photos(&["not base64 !!".to_string()]).is_err());
        assert!(validate_photos(&vec![data_url; 6]).is_err());
    }

    #[test]
    fn test_create_validation() {
        let request = CreateRequisitions {
            priority: Priority::Urgent,
            problem_description: "short".to_string(),
            justification: None,
            cost_center: None,
            photos: vec![],
            items: vec![],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some(" CC-10 ".to_string())), Some("CC-10".to_string()));
        assert_eq!(non_blank(None), None);
    }
}
