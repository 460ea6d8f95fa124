//! WebSocket connection manager.
//!
//! Owns the single live transport connection and its lifecycle:
//! `Connecting -> Open -> Closed -> Connecting ...`, reconnecting
//! immediately and unconditionally on every close. There is no backoff
//! and no retry cap; a persistently failing server produces a tight
//! reconnect loop (see DESIGN.md).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dicechat_types::ServerEvent;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::controller::CommandSink;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Events surfaced to the controller.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Transport established; identity replay happens now.
    Opened,
    /// A decoded inbound frame.
    Frame(ServerEvent),
    /// Transport lost; a reconnect is already underway.
    Closed,
}

/// Why the per-connection session loop ended.
enum Disconnect {
    /// Server closed the stream or the transport errored; reconnect.
    Remote,
    /// Every outbound handle is gone; the client is shutting down.
    HandleDropped,
}

/// Cheap cloneable handle for the outbound send path.
///
/// `send` is fire-and-forget: while the connection is not open the text
/// is dropped silently rather than queued, so a premature send can never
/// block or buffer.
#[derive(Clone)]
pub struct ConnectionHandle {
    outbound: mpsc::UnboundedSender<String>,
    open: Arc<AtomicBool>,
}

impl ConnectionHandle {
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn send(&self, text: &str) {
        if !self.is_open() {
            tracing::debug!(
                target: "dicechat::connection",
                "dropping send while not open: {text}"
            );
            return;
        }
        if self.outbound.send(text.to_owned()).is_err() {
            tracing::debug!(target: "dicechat::connection", "connection task gone");
        }
    }
}

impl CommandSink for ConnectionHandle {
    fn send(&self, command: &str) {
        ConnectionHandle::send(self, command);
    }
}

/// Start the connection task against `ws_url`, delivering events to
/// `events`. The task runs until every handle and the event receiver
/// are dropped.
pub fn spawn(ws_url: Url, events: mpsc::UnboundedSender<ConnectionEvent>) -> ConnectionHandle {
    let open = Arc::new(AtomicBool::new(false));
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    tokio::spawn(run(ws_url, events, outbound_rx, open.clone()));

    ConnectionHandle {
        outbound: outbound_tx,
        open,
    }
}

async fn run(
    ws_url: Url,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    open: Arc<AtomicBool>,
) {
    let mut state = ConnectionState::Connecting;

    loop {
        tracing::debug!(target: "dicechat::connection", "connecting to {ws_url}");
        let stream = match connect_async(ws_url.as_str()).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                tracing::debug!(target: "dicechat::connection", "connect failed: {e}");
                transition(&mut state, ConnectionState::Closed);
                if events.send(ConnectionEvent::Closed).is_err() {
                    return;
                }
                // Immediate retry, no backoff.
                transition(&mut state, ConnectionState::Connecting);
                continue;
            }
        };

        transition(&mut state, ConnectionState::Open);
        open.store(true, Ordering::SeqCst);
        tracing::info!(target: "dicechat::connection", "connected to {ws_url}");
        if events.send(ConnectionEvent::Opened).is_err() {
            return;
        }

        let disconnect = drive(stream, &events, &mut outbound_rx).await;

        open.store(false, Ordering::SeqCst);
        transition(&mut state, ConnectionState::Closed);
        tracing::info!(target: "dicechat::connection", "disconnected from {ws_url}");
        if events.send(ConnectionEvent::Closed).is_err() {
            return;
        }

        match disconnect {
            Disconnect::Remote => transition(&mut state, ConnectionState::Connecting),
            Disconnect::HandleDropped => return,
        }
    }
}

/// Session loop for one live connection: pump outbound text and decode
/// inbound frames until the stream ends.
async fn drive(
    mut stream: WsStream,
    events: &mpsc::UnboundedSender<ConnectionEvent>,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
) -> Disconnect {
    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                let Some(text) = outgoing else {
                    return Disconnect::HandleDropped;
                };
                tracing::trace!(target: "dicechat::connection", "send: {text}");
                if let Err(e) = stream.send(Message::text(text)).await {
                    tracing::debug!(target: "dicechat::connection", "send failed: {e}");
                    return Disconnect::Remote;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerEvent>(text.as_str()) {
                            Ok(event) => {
                                if events.send(ConnectionEvent::Frame(event)).is_err() {
                                    return Disconnect::HandleDropped;
                                }
                            }
                            // Undecodable or unrecognized frames are skipped,
                            // not errors: newer servers may add event kinds.
                            Err(e) => tracing::debug!(
                                target: "dicechat::connection",
                                "ignoring undecodable frame: {e}"
                            ),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = stream.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => return Disconnect::Remote,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(target: "dicechat::connection", "stream error: {e}");
                        return Disconnect::Remote;
                    }
                }
            }
        }
    }
}

fn transition(state: &mut ConnectionState, next: ConnectionState) {
    tracing::debug!(target: "dicechat::connection", "state {state:?} -> {next:?}");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_while_closed_is_a_noop() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        // Nothing listens on this port; the task loops Connecting -> Closed.
        let url = Url::parse("ws://127.0.0.1:9/ws/").unwrap();
        let handle = spawn(url, events_tx);

        assert!(!handle.is_open());
        // Must not panic, block, or queue.
        handle.send("1d20");

        // The failing connect surfaces as a Closed event.
        match events_rx.recv().await {
            Some(ConnectionEvent::Closed) => {}
            other => panic!("expected Closed, got {other:?}"),
        }
    }

    #[test]
    fn test_transition_updates_state() {
        let mut state = ConnectionState::Connecting;
        transition(&mut state, ConnectionState::Open);
        assert_eq!(state, ConnectionState::Open);
        transition(&mut state, ConnectionState::Closed);
        assert_eq!(state, ConnectionState::Closed);
    }
}
