//! WebSocket requisition feed.
//!
//! Each connection owns one [`FeedSubscription`]. Messages are JSON objects
//! tagged by `type`: `snapshot`, `upsert`, `remove` or `error`.

use std::{borrow::Cow, sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, time::Instant};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::requisition::{ListScope, Requisition},
    realtime::{Backoff, FeedDelta, FeedSubscription, FeedUpdate, RequisitionSource},
    services::requisitions::resolve_scope,
    AppState,
};

/// Outbound queue depth per connection
const OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeedParams {
    /// `all`, `mine` or `assigned`; defaults by role
    pub scope: Option<ListScope>,
    /// Bearer token (browsers cannot set headers on WebSocket requests)
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum FeedMessage<'a> {
    Snapshot { requisitions: Vec<&'a Requisition> },
    Upsert { index: usize, requisition: &'a Requisition },
    Remove { id: Uuid },
    Error { message: &'a str },
}

impl<'a> From<&'a FeedUpdate> for FeedMessage<'a> {
    fn from(update: &'a FeedUpdate) -> Self {
        match update {
            FeedUpdate::Snapshot(rows) => FeedMessage::Snapshot {
                requisitions: rows.iter().map(|r| r.as_ref()).collect(),
            },
            FeedUpdate::Delta(FeedDelta::Upsert { index, requisition }) => FeedMessage::Upsert {
                index: *index,
                requisition: requisition.as_ref(),
            },
            FeedUpdate::Delta(FeedDelta::Remove { id }) => FeedMessage::Remove { id: *id },
            FeedUpdate::Error(message) => FeedMessage::Error { message },
        }
    }
}

/// Live requisition feed over WebSocket
#[utoipa::path(
    get,
    path = "/realtime/requisitions",
    tag = "realtime",
    params(FeedParams),
    responses(
        (status = 101, description = "Switching to the WebSocket feed"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Scope not allowed for this role")
    )
)]
pub async fn requisition_feed(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> AppResult<Response> {
    let session = state.services.auth.resolve(&params.token).await?;
    let scope = resolve_scope(&session, params.scope)?;

    let feed = &state.config.feed;
    let source: Arc<dyn RequisitionSource> = Arc::new(state.services.requisitions.clone());
    let subscription = FeedSubscription::new(
        scope,
        source,
        state.bus.subscribe(),
        Backoff::new(feed.initial_backoff(), feed.max_backoff()),
    );
    let heartbeat = feed.heartbeat();

    tracing::info!(user_id = %session.user_id, scope = ?scope, "Feed subscription opened");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session.user_id, subscription, heartbeat)))
}

async fn handle_socket(socket: WebSocket, user_id: Uuid, mut subscription: FeedSubscription, heartbeat: Duration) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);

    // Sender: forward queued messages and keep the connection alive.
    let send_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + heartbeat, heartbeat);
        loop {
            let message = tokio::select! {
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
                _ = ticker.tick() => Message::Ping(Vec::new()),
            };
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() {
                tracing::debug!(user_id = %user_id, "Feed socket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let feed_task = tokio::spawn(async move {
        while let Some(update) = subscription.next_update().await {
            let text = match serde_json::to_string(&FeedMessage::from(&update)) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(user_id = %user_id, error = %e, "Failed to encode feed message");
                    continue;
                }
            };
            if tx.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        // Bus closed: end the connection from our side
        subscription.close();
        let _ = tx.send(close_frame()).await;
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => tracing::trace!(user_id = %user_id, "Pong received"),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(user_id = %user_id, error = %e, "Feed socket receive error");
                break;
            }
        }
    }

    feed_task.abort();
    send_task.abort();
    tracing::info!(user_id = %user_id, "Feed subscription closed");
}

/// Close frame sent when the change bus shuts down
fn close_frame() -> Message {
    Message::Close(Some(CloseFrame {
        code: close_code::AWAY,
        reason: Cow::from("Requisition feed ended"),
    }))
}
