//! Per-connection handler: session setup, read loop, write loop.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The flow is:
//!   1. Register a session with the hub, getting an outbox
//!   2. Spawn a writer task that drains the outbox into the connection
//!   3. Loop: receive record → decode → hand to the hub
//!   4. On end of stream or transport error: disconnect, flush, close

use std::sync::Arc;

use tokio::sync::mpsc;
use veilroom_protocol::{Codec, Envelope, SessionId, parse_command};
use veilroom_transport::Connection;

use crate::RelayError;
use crate::server::ServerState;

/// Drop guard that disconnects a session when the handler exits.
///
/// This ensures cleanup happens even if the handler panics or returns
/// early. Since `Drop` is synchronous, we spawn a fire-and-forget task for
/// the async lock. A second disconnect for the same session is a no-op.
struct SessionGuard<C: Codec> {
    session_id: SessionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for SessionGuard<C> {
    fn drop(&mut self) {
        let session_id = self.session_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.hub.lock().await.disconnect(session_id);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<K, C>(
    conn: K,
    state: Arc<ServerState<C>>,
) -> Result<(), RelayError>
where
    K: Connection,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();

    let (outbox, inbox) = mpsc::unbounded_channel();
    let session_id = state.hub.lock().await.connect(outbox);
    let _guard = SessionGuard {
        session_id,
        state: Arc::clone(&state),
    };
    tracing::info!(%conn_id, %session_id, "session opened");

    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        inbox,
        Arc::clone(&state),
        session_id,
    ));

    let result = loop {
        let record = match conn.recv().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(%session_id, "connection closed by peer");
                break Ok(());
            }
            Err(e) => break Err(RelayError::Transport(e)),
        };

        // Blank lines are keep-alive noise, not malformed records.
        if record.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let parsed = parse_command(&state.codec, &record);
        state.hub.lock().await.process(session_id, parsed);
    };

    // Removing the session drops its outbox, which ends the writer once
    // everything already queued has been written.
    state.hub.lock().await.disconnect(session_id);
    if let Err(e) = writer.await {
        tracing::error!(%session_id, error = %e, "writer task failed");
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(%session_id, error = %e, "close failed");
    }

    result
}

/// Drains a session's outbox into its connection, in order.
async fn write_loop<K, C>(
    conn: Arc<K>,
    mut inbox: mpsc::UnboundedReceiver<Envelope>,
    state: Arc<ServerState<C>>,
    session_id: SessionId,
) where
    K: Connection,
    C: Codec,
{
    while let Some(envelope) = inbox.recv().await {
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(%session_id, error = %e, "failed to encode envelope");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%session_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
}
