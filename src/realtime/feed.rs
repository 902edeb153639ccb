//! Requisition list kept current from an initial load plus change events.
//!
//! [`RequisitionFeed`] is synchronous state: it never performs I/O. A driver
//! (see `subscription`) starts a load with [`RequisitionFeed::begin_load`],
//! feeds every received [`ChangeEvent`] to [`RequisitionFeed::apply`] and
//! hands the load result to [`RequisitionFeed::finish_load`].
//!
//! Merge rules:
//! - insert: prepend when the scope admits the row, replace in place when the
//!   id is already held
//! - update: replace in place; remove when the scope no longer admits it;
//!   insert at its `created_at` position when newly admitted
//! - delete: remove by id
//!
//! Rows are merged by id and the newer `updated_at` wins, so echoes and
//! redelivered events are harmless.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use super::bus::ChangeEvent;
use crate::{error::AppResult, models::requisition::Requisition};

/// Which requisitions a feed holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    /// Everything (planner and admin inbox)
    All,
    /// Submitted by one user
    CreatedBy(Uuid),
    /// Currently held by one planner
    AssignedTo(Uuid),
}

impl FeedScope {
    pub fn admits(&self, requisition: &Requisition) -> bool {
        match self {
            FeedScope::All => true,
            FeedScope::CreatedBy(user_id) => requisition.created_by == *user_id,
            FeedScope::AssignedTo(user_id) => requisition.assigned_to == Some(*user_id),
        }
    }
}

/// Identifies one load request; results for older tickets are discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

/// A single change to the held list
#[derive(Debug, Clone, PartialEq)]
pub enum FeedDelta {
    /// The row now sits at `index` (inserted or replaced)
    Upsert {
        index: usize,
        requisition: Arc<Requisition>,
    },
    Remove { id: Uuid },
}

/// What a subscriber should show next
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    /// Replace the whole list
    Snapshot(Vec<Arc<Requisition>>),
    Delta(FeedDelta),
    Error(String),
}

/// Last state seen for a row while a load is in flight
#[derive(Debug, Clone)]
enum Seen {
    Row(Arc<Requisition>),
    Deleted,
}

#[derive(Debug)]
pub struct RequisitionFeed {
    scope: FeedScope,
    items: Vec<Arc<Requisition>>,
    generation: u64,
    /// Rows changed since the in-flight load started
    in_flight: Option<HashMap<Uuid, Seen>>,
    loaded: bool,
    error: Option<String>,
    closed: bool,
}

impl RequisitionFeed {
    pub fn new(scope: FeedScope) -> Self {
        Self {
            scope,
            items: Vec::new(),
            generation: 0,
            in_flight: None,
            loaded: false,
            error: None,
            closed: false,
        }
    }

    pub fn scope(&self) -> FeedScope {
        self.scope
    }

    /// Held rows, newest first except where updates kept positions
    pub fn items(&self) -> &[Arc<Requisition>] {
        &self.items
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether a load has ever succeeded
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Start a (re)load. Supersedes any load already in flight.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.in_flight = Some(HashMap::new());
        LoadTicket(self.generation)
    }

    /// Complete the load identified by `ticket`.
    ///
    /// Returns `None` when the ticket is stale or the feed is closed.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: AppResult<Vec<Requisition>>,
    ) -> Option<FeedUpdate> {
        if self.closed || ticket.0 != self.generation {
            return None;
        }
        let seen = self.in_flight.take()?;

        match result {
            Ok(rows) => {
                let mut snapshot: Vec<Arc<Requisition>> = rows
                    .into_iter()
                    .filter(|r| self.scope.admits(r))
                    .map(Arc::new)
                    .collect();

                for (id, state) in seen {
                    let held = snapshot.iter().position(|r| r.id == id);
                    match state {
                        Seen::Deleted => {
                            if let Some(index) = held {
                                snapshot.remove(index);
                            }
                        }
                        Seen::Row(row) => {
                            if let Some(index) = held {
                                if snapshot[index].updated_at >= row.updated_at {
                                    continue;
                                }
                                snapshot.remove(index);
                            }
                            if self.scope.admits(&row) {
                                let index = created_at_position(&snapshot, &row);
                                snapshot.insert(index, row);
                            }
                        }
                    }
                }

                self.items = snapshot;
                self.loaded = true;
                self.error = None;
                Some(FeedUpdate::Snapshot(self.items.clone()))
            }
            Err(e) => {
                let message = e.to_string();
                if !self.loaded {
                    self.items.clear();
                }
                self.error = Some(message.clone());
                Some(FeedUpdate::Error(message))
            }
        }
    }

    /// Merge one change event; returns the resulting delta, if any
    pub fn apply(&mut self, event: &ChangeEvent) -> Option<FeedDelta> {
        if self.closed {
            return None;
        }

        if let Some(seen) = self.in_flight.as_mut() {
            match event {
                ChangeEvent::Insert(row) | ChangeEvent::Update(row) => {
                    let newer = match seen.get(&row.id) {
                        Some(Seen::Row(prev)) => prev.updated_at <= row.updated_at,
                        Some(Seen::Deleted) => false,
                        None => true,
                    };
                    if newer {
                        seen.insert(row.id, Seen::Row(row.clone()));
                    }
                }
                ChangeEvent::Delete { id } => {
                    seen.insert(*id, Seen::Deleted);
                }
                ChangeEvent::Resync => {}
            }
        }

        match event {
            ChangeEvent::Insert(row) => self.merge(row, true),
            ChangeEvent::Update(row) => self.merge(row, false),
            ChangeEvent::Delete { id } => self.remove(*id),
            ChangeEvent::Resync => None,
        }
    }

    /// Stop accepting events and load results
    pub fn close(&mut self) {
        self.closed = true;
        self.in_flight = None;
        self.items.clear();
    }

    fn merge(&mut self, row: &Arc<Requisition>, prepend: bool) -> Option<FeedDelta> {
        let admitted = self.scope.admits(row);

        match self.items.iter().position(|r| r.id == row.id) {
            Some(index) => {
                let held = &self.items[index];
                if held.updated_at > row.updated_at || **held == **row {
                    return None;
                }
                if admitted {
                    self.items[index] = row.clone();
                    Some(FeedDelta::Upsert {
                        index,
                        requisition: row.clone(),
                    })
                } else {
                    self.items.remove(index);
                    Some(FeedDelta::Remove { id: row.id })
                }
            }
            None if admitted => {
                let index = if prepend {
                    0
                } else {
                    created_at_position(&self.items, row)
                };
                self.items.insert(index, row.clone());
                Some(FeedDelta::Upsert {
                    index,
                    requisition: row.clone(),
                })
            }
            None => None,
        }
    }

    fn remove(&mut self, id: Uuid) -> Option<FeedDelta> {
        let index = self.items.iter().position(|r| r.id == id)?;
        self.items.remove(index);
        Some(FeedDelta::Remove { id })
    }
}

/// Index keeping `created_at` descending
fn created_at_position(items: &[Arc<Requisition>], row: &Requisition) -> usize {
    items
        .iter()
        .position(|r| r.created_at < row.created_at)
        .unwrap_or(items.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AppError,
        models::requisition::{Priority, Status},
    };
    use chrono::{Duration, TimeZone, Utc};

    fn row(created_by: Uuid, minute: u32) -> Requisition {
        let at = Utc.with_ymd_and_hms(2024, 5, 10, 8, minute, 0).unwrap();
        Requisition {
            id: Uuid::new_v4(),
            area: "Produção".to_string(),
            equipment: "Torno CNC 01".to_string(),
            item_description: "Rolamento 6205".to_string(),
            item_code: None,
            quantity: 2,
            priority: Priority::Urgent,
            problem_description: "Ruído excessivo no eixo".to_string(),
            justification: None,
            cost_center: None,
            photos: vec![],
            status: Status::Pending,
            assigned_to: None,
            transferred_from: None,
            rejection_reason: None,
            created_by,
            created_at: at,
            updated_at: at,
        }
    }

    fn touched(mut r: Requisition, status: Status, assigned_to: Option<Uuid>) -> Requisition {
        r.status = status;
        r.assigned_to = assigned_to;
        r.updated_at += Duration::seconds(30);
        r
    }

    fn loaded(scope: FeedScope, rows: Vec<Requisition>) -> RequisitionFeed {
        let mut feed = RequisitionFeed::new(scope);
        let ticket = feed.begin_load();
        feed.finish_load(ticket, Ok(rows)).unwrap();
        feed
    }

    fn ids(feed: &RequisitionFeed) -> Vec<Uuid> {
        feed.items().iter().map(|r| r.id).collect()
    }

    #[test]
    fn insert_prepends_when_admitted() {
        let me = Uuid::new_v4();
        let old = row(me, 0);
        let mut feed = loaded(FeedScope::CreatedBy(me), vec![old.clone()]);

        let new = row(me, 5);
        let delta = feed.apply(&ChangeEvent::Insert(Arc::new(new.clone())));
        assert!(matches!(delta, Some(FeedDelta::Upsert { index: 0, .. })));
        assert_eq!(ids(&feed), vec![new.id, old.id]);
    }

    #[test]
    fn insert_outside_scope_is_ignored() {
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        let mut feed = loaded(FeedScope::CreatedBy(x), vec![]);
        assert_eq!(feed.apply(&ChangeEvent::Insert(Arc::new(row(y, 1)))), None);
        assert!(feed.items().is_empty());
    }

    #[test]
    fn repeated_insert_is_idempotent() {
        let me = Uuid::new_v4();
        let mut feed = loaded(FeedScope::All, vec![]);
        let r = Arc::new(row(me, 1));
        assert!(feed.apply(&ChangeEvent::Insert(r.clone())).is_some());
        assert_eq!(feed.apply(&ChangeEvent::Insert(r.clone())), None);
        assert_eq!(feed.items().len(), 1);
    }

    #[test]
    fn update_replaces_in_place() {
        let me = Uuid::new_v4();
        let (a, b, c) = (row(me, 3), row(me, 2), row(me, 1));
        let mut feed = loaded(FeedScope::All, vec![a.clone(), b.clone(), c.clone()]);

        let planner = Uuid::new_v4();
        let b2 = touched(b.clone(), Status::InProgress, Some(planner));
        let delta = feed.apply(&ChangeEvent::Update(Arc::new(b2.clone())));
        assert!(matches!(delta, Some(FeedDelta::Upsert { index: 1, .. })));
        assert_eq!(ids(&feed), vec![a.id, b.id, c.id]);
        assert_eq!(feed.items()[1].status, Status::InProgress);
    }

    #[test]
    fn older_echo_is_ignored() {
        let me = Uuid::new_v4();
        let original = row(me, 1);
        let mut feed = loaded(FeedScope::All, vec![original.clone()]);

        let newer = touched(original.clone(), Status::Rejected, None);
        feed.apply(&ChangeEvent::Update(Arc::new(newer)));
        assert_eq!(feed.apply(&ChangeEvent::Update(Arc::new(original))), None);
        assert_eq!(feed.items()[0].status, Status::Rejected);
    }

    #[test]
    fn update_leaving_scope_removes() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let held = touched(row(Uuid::new_v4(), 1), Status::InProgress, Some(a));
        let mut feed = loaded(FeedScope::AssignedTo(a), vec![held.clone()]);

        let transferred = touched(held.clone(), Status::InProgress, Some(b));
        assert_eq!(
            feed.apply(&ChangeEvent::Update(Arc::new(transferred.clone()))),
            Some(FeedDelta::Remove { id: held.id })
        );
        assert!(feed.items().is_empty());

        let mut feed_b = loaded(FeedScope::AssignedTo(b), vec![]);
        assert!(matches!(
            feed_b.apply(&ChangeEvent::Update(Arc::new(transferred))),
            Some(FeedDelta::Upsert { index: 0, .. })
        ));
    }

    #[test]
    fn update_entering_scope_uses_created_at_position() {
        let me = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let newest = touched(row(creator, 9), Status::InProgress, Some(me));
        let oldest = touched(row(creator, 1), Status::InProgress, Some(me));
        let mut feed = loaded(FeedScope::AssignedTo(me), vec![newest.clone(), oldest.clone()]);

        let middle = touched(row(creator, 5), Status::InProgress, Some(me));
        assert!(matches!(
            feed.apply(&ChangeEvent::Update(Arc::new(middle.clone()))),
            Some(FeedDelta::Upsert { index: 1, .. })
        ));
        assert_eq!(ids(&feed), vec![newest.id, middle.id, oldest.id]);
    }

    #[test]
    fn delete_removes_by_id() {
        let me = Uuid::new_v4();
        let r = row(me, 1);
        let mut feed = loaded(FeedScope::All, vec![r.clone()]);
        assert_eq!(feed.apply(&ChangeEvent::Delete { id: r.id }), Some(FeedDelta::Remove { id: r.id }));
        assert_eq!(feed.apply(&ChangeEvent::Delete { id: r.id }), None);
    }

    #[test]
    fn events_during_load_are_reconciled() {
        let me = Uuid::new_v4();
        let stale = row(me, 1);
        let deleted = row(me, 2);
        let mut feed = RequisitionFeed::new(FeedScope::All);
        let ticket = feed.begin_load();

        let fresh = touched(stale.clone(), Status::InProgress, Some(Uuid::new_v4()));
        let inserted = row(me, 3);
        feed.apply(&ChangeEvent::Update(Arc::new(fresh.clone())));
        feed.apply(&ChangeEvent::Insert(Arc::new(inserted.clone())));
        feed.apply(&ChangeEvent::Delete { id: deleted.id });

        // The snapshot was read before those events landed.
        let update = feed
            .finish_load(ticket, Ok(vec![deleted.clone(), stale.clone()]))
            .unwrap();
        assert!(matches!(update, FeedUpdate::Snapshot(_)));
        assert_eq!(ids(&feed), vec![inserted.id, stale.id]);
        assert_eq!(feed.items()[1].status, Status::InProgress);
    }

    #[test]
    fn snapshot_newer_than_event_wins() {
        let me = Uuid::new_v4();
        let original = row(me, 1);
        let mut feed = RequisitionFeed::new(FeedScope::All);
        let ticket = feed.begin_load();
        feed.apply(&ChangeEvent::Update(Arc::new(original.clone())));

        let newer = touched(original.clone(), Status::Rejected, None);
        feed.finish_load(ticket, Ok(vec![newer])).unwrap();
        assert_eq!(feed.items()[0].status, Status::Rejected);
    }

    #[test]
    fn stale_ticket_is_ignored() {
        let me = Uuid::new_v4();
        let mut feed = RequisitionFeed::new(FeedScope::All);
        let first = feed.begin_load();
        let second = feed.begin_load();

        assert_eq!(feed.finish_load(first, Ok(vec![row(me, 1)])), None);
        assert!(feed.is_loading());
        assert!(feed.finish_load(second, Ok(vec![])).is_some());
        assert!(feed.items().is_empty());
    }

    #[test]
    fn closed_feed_ignores_everything() {
        let me = Uuid::new_v4();
        let mut feed = RequisitionFeed::new(FeedScope::All);
        let ticket = feed.begin_load();
        feed.close();
        assert_eq!(feed.finish_load(ticket, Ok(vec![row(me, 1)])), None);
        assert_eq!(feed.apply(&ChangeEvent::Insert(Arc::new(row(me, 2)))), None);
        assert!(feed.items().is_empty());
    }

    #[test]
    fn failed_initial_load_leaves_list_empty() {
        let me = Uuid::new_v4();
        let mut feed = RequisitionFeed::new(FeedScope::All);
        let ticket = feed.begin_load();
        feed.apply(&ChangeEvent::Insert(Arc::new(row(me, 1))));

        let update = feed
            .finish_load(ticket, Err(AppError::Internal("connection refused".into())))
            .unwrap();
        assert!(matches!(update, FeedUpdate::Error(_)));
        assert!(feed.items().is_empty());
        assert!(feed.error().is_some());
        assert!(!feed.is_loaded());
    }

    #[test]
    fn failed_reload_keeps_list() {
        let me = Uuid::new_v4();
        let mut feed = loaded(FeedScope::All, vec![row(me, 1)]);
        let ticket = feed.begin_load();
        feed.finish_load(ticket, Err(AppError::Internal("timeout".into())));
        assert_eq!(feed.items().len(), 1);
        assert!(feed.error().is_some());

        let ticket = feed.begin_load();
        feed.finish_load(ticket, Ok(vec![row(me, 1), row(me, 2)]));
        assert_eq!(feed.error(), None);
        assert_eq!(feed.items().len(), 2);
    }

    #[test]
    fn snapshot_is_filtered_by_scope() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let feed = loaded(FeedScope::CreatedBy(me), vec![row(me, 2), row(other, 1)]);
        assert_eq!(feed.items().len(), 1);
    }
}
