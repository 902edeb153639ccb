//! Bridges Postgres `NOTIFY` on `requisition_changes` to the change bus.
//!
//! The trigger sends `{"op": "INSERT" | "UPDATE" | "DELETE", "id": ...}`.
//! Rows are re-read by id so the bus always carries the committed state.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::postgres::{PgListener, PgPool};
use uuid::Uuid;

use super::{
    bus::{ChangeBus, ChangeEvent},
    subscription::Backoff,
};
use crate::{error::AppResult, models::requisition::Requisition, repository::Repository};

pub const CHANNEL: &str = "requisition_changes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Payload of one notification
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangeNotice {
    pub op: ChangeOp,
    pub id: Uuid,
}

impl ChangeNotice {
    pub fn parse(payload: &str) -> Option<Self> {
        serde_json::from_str(payload).ok()
    }
}

/// Connection carrying change notices
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChangeChannel: Send {
    /// Open a fresh connection; returns once `LISTEN` is active
    async fn connect(&mut self) -> AppResult<()>;
    /// Next notice payload; `None` when the connection dropped
    async fn recv(&mut self) -> AppResult<Option<String>>;
    /// Committed state of a changed row
    async fn fetch(&mut self, id: Uuid) -> AppResult<Option<Requisition>>;
}

/// [`ChangeChannel`] over a Postgres `LISTEN` connection
pub struct PgChangeChannel {
    pool: PgPool,
    repository: Repository,
    listener: Option<PgListener>,
}

impl PgChangeChannel {
    pub fn new(pool: PgPool, repository: Repository) -> Self {
        Self {
            pool,
            repository,
            listener: None,
        }
    }
}

#[async_trait]
impl ChangeChannel for PgChangeChannel {
    async fn connect(&mut self) -> AppResult<()> {
        self.listener = None;
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANNEL).await?;
        self.listener = Some(listener);
        Ok(())
    }

    async fn recv(&mut self) -> AppResult<Option<String>> {
        let Some(listener) = self.listener.as_mut() else {
            return Ok(None);
        };
        match listener.try_recv().await {
            Ok(Some(notification)) => Ok(Some(notification.payload().to_string())),
            Ok(None) => {
                self.listener = None;
                Ok(None)
            }
            Err(e) => {
                self.listener = None;
                Err(e.into())
            }
        }
    }

    async fn fetch(&mut self, id: Uuid) -> AppResult<Option<Requisition>> {
        self.repository.requisitions.find_by_id(id).await
    }
}

/// Owns the change channel and republishes every change on the bus
pub struct ChangeListener<C> {
    channel: C,
    bus: Arc<ChangeBus>,
    backoff: Backoff,
    resync_on_connect: bool,
}

impl<C: ChangeChannel> ChangeListener<C> {
    pub fn new(channel: C, bus: Arc<ChangeBus>, backoff: Backoff) -> Self {
        Self {
            channel,
            bus,
            backoff,
            resync_on_connect: false,
        }
    }

    /// Listen forever, reconnecting with backoff
    pub async fn run(mut self) {
        loop {
            match self.listen().await {
                Ok(()) => tracing::warn!(channel = CHANNEL, "Change listener connection lost"),
                Err(e) => tracing::error!(channel = CHANNEL, error = %e, "Change listener failed"),
            }

            let delay = self.backoff.next_delay();
            tracing::info!(retry_in_ms = delay.as_millis() as u64, "Reconnecting change listener");
            tokio::time::sleep(delay).await;
        }
    }

    /// One connection's lifetime; returns when the connection drops.
    ///
    /// Every connection after the first attempt is followed by a `Resync`,
    /// published only once `LISTEN` is active again so reloads cannot miss
    /// notices sent while nobody was listening.
    async fn listen(&mut self) -> AppResult<()> {
        let resync = std::mem::replace(&mut self.resync_on_connect, true);
        self.channel.connect().await?;
        tracing::info!(channel = CHANNEL, "Listening for requisition changes");
        self.backoff.reset();
        if resync {
            self.bus.publish(ChangeEvent::Resync);
        }

        while let Some(payload) = self.channel.recv().await? {
            let Some(notice) = ChangeNotice::parse(&payload) else {
                tracing::warn!(payload = %payload, "Ignoring malformed change notice");
                continue;
            };

            if let Some(event) = self.resolve(&notice).await {
                self.bus.publish(event);
            }
        }
        Ok(())
    }

    async fn resolve(&mut self, notice: &ChangeNotice) -> Option<ChangeEvent> {
        if notice.op == ChangeOp::Delete {
            return Some(ChangeEvent::Delete { id: notice.id });
        }

        match self.channel.fetch(notice.id).await {
            Ok(Some(row)) => {
                let row = Arc::new(row);
                Some(match notice.op {
                    ChangeOp::Insert => ChangeEvent::Insert(row),
                    _ => ChangeEvent::Update(row),
                })
            }
            // Deleted again before we read it; the delete notice follows.
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(id = %notice.id, error = %e, "Failed to read changed requisition");
                Some(ChangeEvent::Resync)
            }
        }
    }
}
