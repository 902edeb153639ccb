//! Requisition authoring, listing and workflow service

use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        catalog::CatalogItem,
        requisition::{
            non_blank, validate_photos, CreateRequisitions, EditRequisition, ListScope, NewRequisition,
            Priority, Requisition, RequisitionDetails, RequisitionHistory, RequisitionLine, RequisitionList,
            RequisitionQuery, Status,
        },
        session::Session,
        user::Role,
    },
    realtime::{feed::FeedScope, subscription::RequisitionSource},
    repository::Repository,
    services::{
        lookup::{cascade, CatalogSelection},
        workflow::{self, Action, Actor},
    },
};

#[derive(Clone)]
pub struct RequisitionsService {
    repository: Repository,
}

impl RequisitionsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Submit one requisition per line, all sharing the header fields
    pub async fn create(&self, session: &Session, data: CreateRequisitions) -> AppResult<Vec<Requisition>> {
        session.require_mechanic()?;
        data.validate()?;
        validate_photos(&data.photos)?;

        let catalog = self.repository.catalog.list_active().await?;
        let header = Header {
            priority: data.priority,
            problem_description: data.problem_description.trim().to_string(),
            justification: non_blank(data.justification),
            cost_center: non_blank(data.cost_center),
            photos: data.photos,
        };

        let rows = data
            .items
            .iter()
            .enumerate()
            .map(|(index, line)| -> AppResult<NewRequisition> {
                let item = resolve_line(&catalog, line).map_err(|e| match e {
                    AppError::Validation(msg) => AppError::Validation(format!("Item {}: {}", index + 1, msg)),
                    other => other,
                })?;
                Ok(header.row(line, item, session.user_id))
            })
            .collect::<AppResult<Vec<_>>>()?;

        let created = self.repository.requisitions.create_batch(&rows).await?;
        tracing::info!(
            user_id = %session.user_id,
            count = created.len(),
            priority = %header.priority,
            "Requisitions submitted"
        );
        Ok(created)
    }

    /// Rewrite a pending requisition (author only)
    pub async fn edit(&self, session: &Session, id: Uuid, data: EditRequisition) -> AppResult<Requisition> {
        data.validate()?;
        validate_photos(&data.photos)?;

        let current = self.repository.requisitions.get_by_id(id).await?;
        workflow::check_author_change(&current, &Actor::from(session))?;

        let catalog = self.repository.catalog.list_active().await?;
        let item = resolve_line(&catalog, &data.item)?;
        let header = Header {
            priority: data.priority,
            problem_description: data.problem_description.trim().to_string(),
            justification: non_blank(data.justification),
            cost_center: non_blank(data.cost_center),
            photos: data.photos,
        };
        let row = header.row(&data.item, item, session.user_id);

        let updated = self
            .repository
            .requisitions
            .update_pending(id, &row)
            .await?
            .ok_or_else(|| {
                AppError::ConcurrentModification("Requisition was taken or changed meanwhile".to_string())
            })?;

        tracing::info!(requisition_id = %id, user_id = %session.user_id, "Requisition edited");
        Ok(updated)
    }

    /// Remove a pending requisition (author only)
    pub async fn delete(&self, session: &Session, id: Uuid) -> AppResult<()> {
        let current = self.repository.requisitions.get_by_id(id).await?;
        workflow::check_author_change(&current, &Actor::from(session))?;

        if !self.repository.requisitions.delete_pending(id, session.user_id).await? {
            return Err(AppError::ConcurrentModification(
                "Requisition was taken or changed meanwhile".to_string(),
            ));
        }

        tracing::info!(requisition_id = %id, user_id = %session.user_id, "Requisition deleted");
        Ok(())
    }

    /// List a scope with filters; counts and areas cover the whole scope
    pub async fn list(&self, session: &Session, query: &RequisitionQuery) -> AppResult<RequisitionList> {
        let scope = resolve_scope(session, query.scope)?;
        let all = self.repository.requisitions.list_scope(&scope).await?;

        let pending_count = all.iter().filter(|r| r.status == Status::Pending).count();
        let areas: Vec<String> = all
            .iter()
            .map(|r| r.area.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let requisitions = all.into_iter().filter(|r| query.matches(r)).collect();

        Ok(RequisitionList {
            requisitions,
            pending_count,
            areas,
        })
    }

    /// The caller's own requisitions grouped by phase
    pub async fn history(&self, session: &Session) -> AppResult<RequisitionHistory> {
        let mine = self
            .repository
            .requisitions
            .list_scope(&FeedScope::CreatedBy(session.user_id))
            .await?;
        Ok(RequisitionHistory::group(mine))
    }

    /// One requisition with usernames and what the caller may do with it
    pub async fn details(&self, session: &Session, id: Uuid) -> AppResult<RequisitionDetails> {
        let requisition = self.repository.requisitions.get_by_id(id).await?;
        if session.role == Role::Mechanic && requisition.created_by != session.user_id {
            return Err(AppError::NotFound(format!("Requisition {} not found", id)));
        }

        let ids: Vec<Uuid> = [
            Some(requisition.created_by),
            requisition.assigned_to,
            requisition.transferred_from,
        ]
        .into_iter()
        .flatten()
        .collect();
        let names = self.repository.users.usernames(&ids).await?;
        let name_of = |id: Option<Uuid>| id.and_then(|id| names.get(&id).cloned());

        Ok(RequisitionDetails {
            created_by_username: name_of(Some(requisition.created_by)),
            assigned_to_username: name_of(requisition.assigned_to),
            transferred_from_username: name_of(requisition.transferred_from),
            allowed_actions: workflow::allowed_actions(&requisition, &Actor::from(session)),
            requisition,
        })
    }

    /// Plan and persist a workflow action with a compare-and-set write
    pub async fn transition(&self, session: &Session, id: Uuid, action: Action) -> AppResult<Requisition> {
        let current = self.repository.requisitions.get_by_id(id).await?;
        let actor = Actor::from(session);

        if let Action::Transfer { to } = &action {
            let target = self.repository.users.get_role(*to).await?;
            if !matches!(target, Some(ref r) if r.role == Role::Planner) {
                return Err(AppError::Validation("Transfer target must be a planner".to_string()));
            }
        }

        let plan = workflow::plan(&current, &actor, action)?;
        let updated = self
            .repository
            .requisitions
            .apply_transition(id, &plan)
            .await?
            .ok_or_else(|| {
                tracing::info!(requisition_id = %id, user_id = %session.user_id, "Transition lost a race");
                AppError::ConcurrentModification(
                    "Requisition was changed by someone else; reload and try again".to_string(),
                )
            })?;

        tracing::info!(
            requisition_id = %id,
            user_id = %session.user_id,
            from = %plan.from,
            to = %plan.to,
            assigned_to = ?plan.assigned_to,
            "Requisition status changed"
        );
        Ok(updated)
    }
}

#[async_trait]
impl RequisitionSource for RequisitionsService {
    async fn load(&self, scope: &FeedScope) -> AppResult<Vec<Requisition>> {
        self.repository.requisitions.list_scope(scope).await
    }
}

/// Maps a requested list scope to the feed scope the session may see.
///
/// Without an explicit scope, mechanics see their own submissions and
/// planners or admins see everything.
pub fn resolve_scope(session: &Session, scope: Option<ListScope>) -> AppResult<FeedScope> {
    let scope = scope.unwrap_or(match session.role {
        Role::Mechanic => ListScope::Mine,
        Role::Planner | Role::Admin => ListScope::All,
    });

    match scope {
        ListScope::All => {
            session.require_staff()?;
            Ok(FeedScope::All)
        }
        ListScope::Mine => Ok(FeedScope::CreatedBy(session.user_id)),
        ListScope::Assigned => {
            session.require_planner()?;
            Ok(FeedScope::AssignedTo(session.user_id))
        }
    }
}

/// Checks a line against the cascading catalog and returns its item
fn resolve_line<'a>(catalog: &'a [CatalogItem], line: &RequisitionLine) -> AppResult<&'a CatalogItem> {
    let selection = CatalogSelection::default()
        .with_area(line.area.trim())
        .with_equipment(line.equipment.trim())
        .with_category(line.category.trim())
        .with_item(line.catalog_item_id);

    let options = cascade(catalog, &selection);
    if options.selection != selection {
        return Err(AppError::Validation(
            "Catalog item does not match the chosen area, equipment and category".to_string(),
        ));
    }

    catalog
        .iter()
        .find(|item| item.id == line.catalog_item_id)
        .ok_or_else(|| AppError::Validation("Catalog item not found".to_string()))
}

/// Fields shared by every requisition of one submission
struct Header {
    priority: Priority,
    problem_description: String,
    justification: Option<String>,
    cost_center: Option<String>,
    photos: Vec<String>,
}

impl Header {
    fn row(&self, line: &RequisitionLine, item: &CatalogItem, created_by: Uuid) -> NewRequisition {
        NewRequisition {
            area: item.area.clone(),
            equipment: item.equipment.clone(),
            item_description: item.display_description().to_string(),
            item_code: Some(item.item_code.clone()),
            quantity: line.quantity,
            priority: self.priority,
            problem_description: self.problem_description.clone(),
            justification: self.justification.clone(),
            cost_center: self.cost_center.clone(),
            photos: self.photos.clone(),
            created_by,
        }
    }
}
