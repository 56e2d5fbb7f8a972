//! WebSocket session lifecycle: a single connected client from upgrade
//! through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use globetrot_core::ConnectionId;
use globetrot_hub::{ClientConnection, Hub, Session};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::metrics::{WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL};

/// How long queued frames may take to flush after the session ends.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Run a WebSocket session for a client that was assigned `name`.
///
/// 1. Opens the hub session (registers, subscribes, sends `init`)
/// 2. Forwards queued outbound frames to the socket from a separate task
/// 3. Feeds inbound text (and UTF-8 binary) frames to the session
/// 4. Stops on a close frame, a socket error, or the hub closing the connection
/// 5. Closes the session and flushes what is left
#[instrument(skip_all, fields(name = %name))]
pub async fn run_ws_session(ws: WebSocket, hub: Arc<Hub>, name: String) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(hub.config().send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(ConnectionId::new(), send_tx));
    let close = connection.close_token();
    let conn_id = connection.id.clone();

    let mut session = Session::new(hub, connection.clone(), name);
    if let Err(e) = session.open() {
        warn!(conn_id = %conn_id, error = %e, "session rejected");
        drop(session);
        drop(connection);
        while let Some(text) = send_rx.recv().await {
            if send_text(&mut ws_tx, &text).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
        return;
    }

    let connection_start = Instant::now();
    info!(conn_id = %conn_id, "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Outbound forwarder: drains the connection queue until every sender is
    // gone, then says goodbye.
    let outbound = tokio::spawn(async move {
        while let Some(text) = send_rx.recv().await {
            if send_text(&mut ws_tx, &text).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    loop {
        let next = tokio::select! {
            () = close.cancelled() => {
                info!(conn_id = %conn_id, "connection closed by hub");
                break;
            }
            next = ws_rx.next() => next,
        };

        let msg = match next {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(conn_id = %conn_id, error = %e, "socket error");
                break;
            }
            None => break,
        };

        // Extract text from either Text or Binary frames
        let text = match msg {
            Message::Text(ref t) => t.to_string(),
            Message::Binary(ref data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    s.to_string()
                } else {
                    info!(conn_id = %conn_id, len = data.len(), "received non-UTF8 binary frame");
                    continue;
                }
            }
            Message::Close(_) => {
                info!(conn_id = %conn_id, "client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if let Err(e) = session.handle_text(&text) {
            warn!(conn_id = %conn_id, error = %e, "session refused frame");
            break;
        }
    }

    let _ = session.close();
    info!(conn_id = %conn_id, "client disconnected");
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection_start.elapsed().as_secs_f64());

    drop(session);
    drop(connection);
    let abort = outbound.abort_handle();
    if tokio::time::timeout(FLUSH_TIMEOUT, outbound).await.is_err() {
        debug!(conn_id = %conn_id, "outbound flush timed out");
        abort.abort();
    }
}

async fn send_text(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    text: &Arc<String>,
) -> Result<(), axum::Error> {
    ws_tx.send(Message::Text(String::clone(text).into())).await
}

