//! WebSocket stream of a run's progress log.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use beeb_core::{log_subject, Subscription};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_MESSAGES_SENT};
use crate::state::AppState;

/// How long to keep relaying once the run has finished.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// WebSocket upgrade handler for `log.<id>`.
///
/// The subscription is made before the upgrade completes so nothing
/// published after the request is missed. The socket is closed shortly
/// after the run finishes.
pub async fn logs_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let subscription = state.bus().subscribe(log_subject(&id));
    let run_finished = state.runs().wait_finished(&id);
    ws.on_upgrade(move |socket| handle_socket(socket, id, subscription, run_finished))
}

/// Forwards every message on `subscription` to `sink` as a text frame.
///
/// Once `run_finished` resolves, messages already on the bus are drained
/// for [`DRAIN_GRACE`] and a close frame is sent. Returns the number of text
/// frames sent.
pub async fn relay_log<S, F>(mut subscription: Subscription, mut sink: S, run_finished: F) -> u64
where
    S: Sink<Message> + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(run_finished);
    let mut draining = false;
    let mut sent = 0;

    loop {
        let next = if draining {
            tokio::time::timeout(DRAIN_GRACE, subscription.next())
                .await
                .unwrap_or(None)
        } else {
            tokio::select! {
                msg = subscription.next() => msg,
                _ = &mut run_finished => {
                    draining = true;
                    continue;
                }
            }
        };
        let Some(msg) = next else {
            break;
        };
        if sink.send(Message::Text(msg.text().into())).await.is_err() {
            debug!(subject = %subscription.subject(), "WebSocket send failed, client disconnected");
            return sent;
        }
        WS_MESSAGES_SENT.inc();
        sent += 1;
    }

    if draining {
        debug!(subject = %subscription.subject(), "Run finished, closing log stream");
        let _ = sink.send(Message::Close(None)).await;
    }
    sent
}

async fn handle_socket<F>(socket: WebSocket, id: String, subscription: Subscription, run_finished: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let (sender, mut receiver) = socket.split();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!(workflow_id = %id, "Log stream client connected");

    let mut send_task = tokio::spawn(relay_log(subscription, sender, run_finished));

    // Drain client frames until it goes away
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("WebSocket client requested close");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    WS_CONNECTIONS_ACTIVE.dec();
    info!(workflow_id = %id, "Log stream client disconnected");
}
