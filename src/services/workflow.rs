//! Status and assignment state machine for requisitions.
//!
//! Pure planning: given the current row, the acting session and an action,
//! `plan` either refuses or returns the exact column values to write. The
//! caller persists the result with a compare-and-set on `from` and
//! `expected_assignee`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        requisition::{Requisition, Status},
        session::Session,
        user::Role,
    },
};

/// Identity and role of whoever performs an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl From<&Session> for Actor {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id,
            role: session.role,
        }
    }
}

impl Actor {
    fn is_planner(&self) -> bool {
        self.role == Role::Planner
    }
}

/// A workflow action requested on an existing requisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Assume custody of a pending requisition
    Take,
    Reject { reason: String },
    /// Move a held requisition to another status
    Advance { status: Status },
    Lapse { reason: String },
    Transfer { to: Uuid },
    /// Finish a released requisition
    Complete,
    /// Close a released requisition without delivery
    Close,
}

/// Action names exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Take,
    Reject,
    Advance,
    Lapse,
    Transfer,
    Complete,
    Close,
    Edit,
    Delete,
}

/// Column values to write, plus the guard they were planned from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: Status,
    pub expected_assignee: Option<Uuid>,
    pub to: Status,
    pub assigned_to: Option<Uuid>,
    pub transferred_from: Option<Uuid>,
    pub rejection_reason: Option<String>,
}

/// Statuses a holder may move a requisition to
pub const ADVANCE_TARGETS: [Status; 5] = [
    Status::InProgress,
    Status::PreRelease,
    Status::CollectionIssued,
    Status::MaterialAvailable,
    Status::ClosedWithoutRelease,
];

/// Plans `action` on `requisition` for `actor`
pub fn plan(requisition: &Requisition, actor: &Actor, action: Action) -> AppResult<Transition> {
    if !actor.is_planner() {
        return Err(AppError::Authorization(
            "Only planners can change a requisition's status".to_string(),
        ));
    }

    let from = requisition.status;
    if from.is_terminal() {
        return Err(AppError::InvalidTransition(format!(
            "Requisition is already closed ({})",
            from
        )));
    }

    let transition = |to: Status, assigned_to: Option<Uuid>, reason: Option<String>| Transition {
        from,
        expected_assignee: requisition.assigned_to,
        to,
        assigned_to,
        transferred_from: requisition.transferred_from,
        rejection_reason: reason,
    };

    match action {
        Action::Take => {
            require_status(from, Status::Pending, "take")?;
            Ok(transition(Status::InProgress, Some(actor.user_id), None))
        }
        Action::Reject { reason } => {
            require_status(from, Status::Pending, "reject")?;
            let reason = require_reason(&reason)?;
            Ok(transition(Status::Rejected, None, Some(reason)))
        }
        Action::Advance { status } => {
            require_holder(requisition, actor)?;
            if !ADVANCE_TARGETS.contains(&status) {
                return Err(AppError::InvalidTransition(format!(
                    "Cannot move a requisition to {} with a status update",
                    status
                )));
            }
            if status == from {
                return Err(AppError::InvalidTransition(format!(
                    "Requisition is already {}",
                    status
                )));
            }
            let assigned_to = if status.in_custody() {
                requisition.assigned_to
            } else {
                None
            };
            Ok(transition(status, assigned_to, None))
        }
        Action::Lapse { reason } => {
            require_holder(requisition, actor)?;
            let reason = require_reason(&reason)?;
            Ok(transition(Status::Lapsed, None, Some(reason)))
        }
        Action::Transfer { to } => {
            require_holder(requisition, actor)?;
            if to == actor.user_id {
                return Err(AppError::Validation(
                    "Cannot transfer a requisition to yourself".to_string(),
                ));
            }
            Ok(Transition {
                transferred_from: Some(actor.user_id),
                ..transition(Status::InProgress, Some(to), None)
            })
        }
        Action::Complete => {
            require_status(from, Status::MaterialAvailable, "complete")?;
            Ok(transition(Status::Completed, None, None))
        }
        Action::Close => {
            require_status(from, Status::MaterialAvailable, "close")?;
            Ok(transition(Status::ClosedWithoutRelease, None, None))
        }
    }
}

/// Edits are limited to the creator while the requisition is pending
pub fn check_author_change(requisition: &Requisition, actor: &Actor) -> AppResult<()> {
    if requisition.created_by != actor.user_id {
        return Err(AppError::Authorization(
            "Only the author can change this requisition".to_string(),
        ));
    }
    if requisition.status != Status::Pending {
        return Err(AppError::InvalidTransition(
            "Requisition can only be changed while pending".to_string(),
        ));
    }
    Ok(())
}

/// What `actor` may do with `requisition` right now
pub fn allowed_actions(requisition: &Requisition, actor: &Actor) -> Vec<ActionKind> {
    let mut actions = Vec::new();

    if check_author_change(requisition, actor).is_ok() {
        actions.extend([ActionKind::Edit, ActionKind::Delete]);
    }

    if !actor.is_planner() {
        return actions;
    }

    match requisition.status {
        Status::Pending => actions.extend([ActionKind::Take, ActionKind::Reject]),
        status if status.in_custody() && requisition.assigned_to == Some(actor.user_id) => {
            actions.extend([ActionKind::Advance, ActionKind::Lapse, ActionKind::Transfer])
        }
        Status::MaterialAvailable => actions.extend([ActionKind::Complete, ActionKind::Close]),
        _ => {}
    }

    actions
}

fn require_status(current: Status, expected: Status, verb: &str) -> AppResult<()> {
    if current == expected {
        Ok(())
    } else {
        Err(AppError::InvalidTransition(format!(
            "Cannot {} a requisition in status {}",
            verb, current
        )))
    }
}

fn require_holder(requisition: &Requisition, actor: &Actor) -> AppResult<()> {
    if !requisition.status.in_custody() {
        return Err(AppError::InvalidTransition(format!(
            "Requisition is not held by a planner (status {})",
            requisition.status
        )));
    }
    if requisition.assigned_to != Some(actor.user_id) {
        return Err(AppError::Authorization(
            "Only the assigned planner can do this".to_string(),
        ));
    }
    Ok(())
}

fn require_reason(reason: &str) -> AppResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::Validation("A reason is required".to_string()));
    }
    Ok(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::requisition::Priority;
    use chrono::Utc;
    use tokio_test::{assert_err, assert_ok};

    fn planner() -> Actor {
        Actor { user_id: Uuid::new_v4(), role: Role::Planner }
    }

    fn requisition(status: Status, assigned_to: Option<Uuid>) -> Requisition {
        Requisition {
            id: Uuid::new_v4(),
            area: "Produção".to_string(),
            equipment: "Torno CNC 01".to_string(),
            item_description: "Rolamento 6205".to_string(),
            item_code: Some("ROL-6205".to_string()),
            quantity: 2,
            priority: Priority::Urgent,
            problem_description: "Ruído excessivo no eixo".to_string(),
            justification: None,
            cost_center: None,
            photos: vec![],
            status,
            assigned_to,
            transferred_from: None,
            rejection_reason: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Applies a planned transition the way the repository would
    fn apply(mut req: Requisition, t: &Transition) -> Requisition {
        req.status = t.to;
        req.assigned_to = t.assigned_to;
        req.transferred_from = t.transferred_from;
        req.rejection_reason = t.rejection_reason.clone();
        req
    }

    fn assert_invariants(req: &Requisition) {
        assert_eq!(req.assigned_to.is_some(), req.status.in_custody(), "{:?}", req.status);
        if req.rejection_reason.is_some() {
            assert!(req.status.carries_reason());
        }
    }

    #[test]
    fn test_take_assigns_actor() {
        let a = planner();
        let pending = requisition(Status::Pending, None);
        let t = assert_ok!(plan(&pending, &a, Action::Take));
        assert_eq!(t.from, Status::Pending);
        assert_eq!(t.expected_assignee, None);
        assert_eq!(t.to, Status::InProgress);
        assert_eq!(t.assigned_to, Some(a.user_id));
        assert_invariants(&apply(pending, &t));
    }

    #[test]
    fn test_mechanic_cannot_take() {
        let mechanic = Actor { user_id: Uuid::new_v4(), role: Role::Mechanic };
        let err = plan(&requisition(Status::Pending, None), &mechanic, Action::Take).unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        let admin = Actor { user_id: Uuid::new_v4(), role: Role::Admin };
        assert_err!(plan(&requisition(Status::Pending, None), &admin, Action::Take));
    }

    #[test]
    fn test_reject_requires_reason() {
        let a = planner();
        let pending = requisition(Status::Pending, None);
        let err = plan(&pending, &a, Action::Reject { reason: "   ".to_string() }).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let t = assert_ok!(plan(&pending, &a, Action::Reject { reason: " Item obsoleto ".to_string() }));
        assert_eq!(t.to, Status::Rejected);
        assert_eq!(t.assigned_to, None);
        assert_eq!(t.rejection_reason.as_deref(), Some("Item obsoleto"));
        assert_invariants(&apply(pending, &t));
    }

    #[test]
    fn test_lapse_requires_reason_and_releases() {
        let a = planner();
        let held = requisition(Status::PreRelease, Some(a.user_id));
        assert_err!(plan(&held, &a, Action::Lapse { reason: String::new() }));

        let t = assert_ok!(plan(&held, &a, Action::Lapse { reason: "Sem estoque".to_string() }));
        assert_eq!(t.to, Status::Lapsed);
        assert_eq!(t.assigned_to, None);
        assert_invariants(&apply(held, &t));
    }

    #[test]
    fn test_only_assignee_advances() {
        let a = planner();
        let b = planner();
        let held = requisition(Status::InProgress, Some(a.user_id));

        let err = plan(&held, &b, Action::Advance { status: Status::PreRelease }).unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        let t = assert_ok!(plan(&held, &a, Action::Advance { status: Status::PreRelease }));
        assert_eq!(t.assigned_to, Some(a.user_id));
        assert_eq!(t.expected_assignee, Some(a.user_id));
    }

    #[test]
    fn test_material_available_releases_custody() {
        let a = planner();
        let held = requisition(Status::CollectionIssued, Some(a.user_id));
        let t = assert_ok!(plan(&held, &a, Action::Advance { status: Status::MaterialAvailable }));
        assert_eq!(t.to, Status::MaterialAvailable);
        assert_eq!(t.assigned_to, None);
        let released = apply(held, &t);
        assert_invariants(&released);

        // The releasing planner no longer holds it; any planner may finish it.
        assert_err!(plan(&released, &a, Action::Advance { status: Status::PreRelease }));
        let b = planner();
        let done = assert_ok!(plan(&released, &b, Action::Complete));
        assert_eq!(done.to, Status::Completed);
        let closed = assert_ok!(plan(&released, &b, Action::Close));
        assert_eq!(closed.to, Status::ClosedWithoutRelease);
    }

    #[test]
    fn test_close_without_release_from_custody() {
        let a = planner();
        let held = requisition(Status::InProgress, Some(a.user_id));
        let t = assert_ok!(plan(&held, &a, Action::Advance { status: Status::ClosedWithoutRelease }));
        assert_eq!(t.assigned_to, None);
        assert_invariants(&apply(held, &t));
    }

    #[test]
    fn test_advance_rejects_invalid_targets() {
        let a = planner();
        let held = requisition(Status::InProgress, Some(a.user_id));
        for target in [Status::Pending, Status::Completed, Status::Rejected, Status::Lapsed, Status::InProgress] {
            let err = plan(&held, &a, Action::Advance { status: target }).unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition(_)), "{:?}", target);
        }
    }

    #[test]
    fn test_transfer_resets_to_in_progress() {
        let a = planner();
        let b = planner();
        let held = requisition(Status::CollectionIssued, Some(a.user_id));
        let t = assert_ok!(plan(&held, &a, Action::Transfer { to: b.user_id }));
        assert_eq!(t.to, Status::InProgress);
        assert_eq!(t.assigned_to, Some(b.user_id));
        assert_eq!(t.transferred_from, Some(a.user_id));
        assert_invariants(&apply(held.clone(), &t));

        assert_err!(plan(&held, &a, Action::Transfer { to: a.user_id }));
        assert_err!(plan(&held, &b, Action::Transfer { to: a.user_id }));
    }

    #[test]
    fn test_transferred_from_survives_later_steps() {
        let a = planner();
        let b = planner();
        let held = requisition(Status::InProgress, Some(a.user_id));
        let moved = apply(held.clone(), &plan(&held, &a, Action::Transfer { to: b.user_id }).unwrap());
        let t = assert_ok!(plan(&moved, &b, Action::Advance { status: Status::PreRelease }));
        assert_eq!(t.transferred_from, Some(a.user_id));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let a = planner();
        for status in [Status::Completed, Status::ClosedWithoutRelease, Status::Rejected, Status::Lapsed] {
            let req = requisition(status, None);
            let err = plan(&req, &a, Action::Take).unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition(_)));
            assert!(allowed_actions(&req, &a).is_empty());
        }
    }

    #[test]
    fn test_author_changes_only_while_pending() {
        let mut req = requisition(Status::Pending, None);
        let author = Actor { user_id: req.created_by, role: Role::Mechanic };
        assert_ok!(check_author_change(&req, &author));
        assert_eq!(allowed_actions(&req, &author), vec![ActionKind::Edit, ActionKind::Delete]);

        let stranger = Actor { user_id: Uuid::new_v4(), role: Role::Mechanic };
        assert!(matches!(
            check_author_change(&req, &stranger).unwrap_err(),
            AppError::Authorization(_)
        ));

        req.status = Status::InProgress;
        req.assigned_to = Some(Uuid::new_v4());
        assert!(matches!(
            check_author_change(&req, &author).unwrap_err(),
            AppError::InvalidTransition(_)
        ));
        assert!(allowed_actions(&req, &author).is_empty());
    }

    #[test]
    fn test_allowed_actions_by_holder() {
        let a = planner();
        let b = planner();
        let held = requisition(Status::PreRelease, Some(a.user_id));
        assert_eq!(
            allowed_actions(&held, &a),
            vec![ActionKind::Advance, ActionKind::Lapse, ActionKind::Transfer]
        );
        assert!(allowed_actions(&held, &b).is_empty());
        assert_eq!(
            allowed_actions(&requisition(Status::Pending, None), &b),
            vec![ActionKind::Take, ActionKind::Reject]
        );
    }

    #[test]
    fn test_scenario_take_transfer_release() {
        let a = planner();
        let b = planner();
        let req = requisition(Status::Pending, None);

        let req = apply(req.clone(), &plan(&req, &a, Action::Take).unwrap());
        assert_eq!(req.status, Status::InProgress);
        assert_eq!(req.assigned_to, Some(a.user_id));

        let req = apply(req.clone(), &plan(&req, &a, Action::Transfer { to: b.user_id }).unwrap());
        assert_eq!(req.assigned_to, Some(b.user_id));
        assert_eq!(req.transferred_from, Some(a.user_id));
        assert_eq!(req.status, Status::InProgress);

        let req = apply(
            req.clone(),
            &plan(&req, &b, Action::Advance { status: Status::MaterialAvailable }).unwrap(),
        );
        assert_eq!(req.assigned_to, None);
        assert_invariants(&req);
    }
}
