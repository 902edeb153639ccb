//! Drives a [`RequisitionFeed`]: loads snapshots, merges bus events and
//! retries failed loads with exponential backoff.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};

use super::{
    bus::ChangeEvent,
    feed::{FeedScope, FeedUpdate, RequisitionFeed},
};
use crate::{error::AppResult, models::requisition::Requisition};

/// Where snapshots come from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequisitionSource: Send + Sync {
    /// All requisitions admitted by `scope`, newest first
    async fn load(&self, scope: &FeedScope) -> AppResult<Vec<Requisition>>;
}

/// Exponential backoff between failed loads
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            current: initial,
        }
    }

    /// Delay before the next attempt; doubles up to the maximum
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// One live view over the requisition collection
pub struct FeedSubscription {
    feed: RequisitionFeed,
    source: Arc<dyn RequisitionSource>,
    rx: broadcast::Receiver<ChangeEvent>,
    backoff: Backoff,
    pending: VecDeque<FeedUpdate>,
    needs_load: bool,
    retry_delay: Option<Duration>,
}

impl FeedSubscription {
    /// `rx` must be subscribed before the first load so no change is missed
    pub fn new(
        scope: FeedScope,
        source: Arc<dyn RequisitionSource>,
        rx: broadcast::Receiver<ChangeEvent>,
        backoff: Backoff,
    ) -> Self {
        Self {
            feed: RequisitionFeed::new(scope),
            source,
            rx,
            backoff,
            pending: VecDeque::new(),
            needs_load: true,
            retry_delay: None,
        }
    }

    pub fn feed(&self) -> &RequisitionFeed {
        &self.feed
    }

    /// Next thing to show; `None` once the subscription is over
    pub async fn next_update(&mut self) -> Option<FeedUpdate> {
        loop {
            if let Some(update) = self.pending.pop_front() {
                return Some(update);
            }
            if self.feed.is_closed() {
                return None;
            }

            if self.needs_load {
                if let Some(delay) = self.retry_delay.take() {
                    tokio::time::sleep(delay).await;
                }
                self.load().await;
                continue;
            }

            match self.rx.recv().await {
                Ok(ChangeEvent::Resync) => {
                    tracing::debug!(scope = ?self.feed.scope(), "Resync requested, reloading");
                    self.needs_load = true;
                }
                Ok(event) => {
                    if let Some(delta) = self.feed.apply(&event) {
                        return Some(FeedUpdate::Delta(delta));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(scope = ?self.feed.scope(), skipped, "Feed lagged, reloading");
                    self.needs_load = true;
                }
                Err(RecvError::Closed) => self.close(),
            }
        }
    }

    /// Tear down; later calls to `next_update` return `None`
    pub fn close(&mut self) {
        self.feed.close();
        self.pending.clear();
    }

    /// Run one load while still merging events that arrive meanwhile
    async fn load(&mut self) {
        let ticket = self.feed.begin_load();
        let scope = self.feed.scope();
        let source = self.source.clone();
        let load = source.load(&scope);
        tokio::pin!(load);

        let mut reload_after = false;

        loop {
            tokio::select! {
                result = &mut load => {
                    match self.feed.finish_load(ticket, result) {
                        Some(FeedUpdate::Error(message)) => {
                            let delay = self.backoff.next_delay();
                            tracing::warn!(
                                scope = ?scope,
                                error = %message,
                                retry_in_ms = delay.as_millis() as u64,
                                "Feed load failed"
                            );
                            self.retry_delay = Some(delay);
                            self.needs_load = true;
                            self.pending.push_back(FeedUpdate::Error(message));
                        }
                        Some(update) => {
                            self.backoff.reset();
                            self.needs_load = reload_after;
                            self.pending.push_back(update);
                        }
                        None => {}
                    }
                    return;
                }
                event = self.rx.recv() => match event {
                    Ok(ChangeEvent::Resync) => reload_after = true,
                    Ok(event) => {
                        let delta = self.feed.apply(&event);
                        // Before the first snapshot the client holds nothing to patch.
                        if let (Some(delta), true) = (delta, self.feed.is_loaded()) {
                            self.pending.push_back(FeedUpdate::Delta(delta));
                        }
                    }
                    Err(RecvError::Lagged(_)) => reload_after = true,
                    Err(RecvError::Closed) => {
                        self.close();
                        return;
                    }
                }
            }
        }
    }
}
