//! Per-connection reader and writer.
//!
//! Each accepted socket runs a reader and a writer concurrently. The reader
//! decodes inbound binary frames into envelopes, overwrites the sender with
//! the authenticated client id, and pushes them to the hub. The writer
//! drains the client's bounded outbound queue and keeps the connection
//! alive with periodic pings.
//!
//! Either side terminating ends the attach: the socket is released and a
//! nonce-guarded unregister is sent to the hub, so a stale attach can never
//! evict its replacement.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use wiremesh_core::{ClientId, Envelope, SessionNonce};

use crate::hub::{HubHandle, Registration, Unregister};
use crate::presence::Presence;

/// Time allowed to write one message to the client.
const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Time allowed between frames from the client; pongs count.
const PONG_WAIT: Duration = Duration::from_secs(60);

/// Ping interval; must stay under `PONG_WAIT`.
const PING_PERIOD: Duration = Duration::from_secs(54);

/// Time allowed for the final close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(10);

/// Socket write buffer size in bytes.
pub(crate) const WRITE_BUFFER_SIZE: usize = 1024;

/// Capacity of the per-client outbound queue, in envelopes.
const OUTBOUND_CAPACITY: usize = 256;

/// Run one client connection to completion.
///
/// Records presence, registers with the hub, then drives the reader and
/// writer until either terminates.
pub async fn serve(socket: WebSocket, id: ClientId, hub: HubHandle, presence: Presence) {
    let session = SessionNonce::generate();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);

    if let Err(err) = presence.add(&id).await {
        tracing::warn!(client_id = %id, error = %err, "presence add failed, closing socket");
        return;
    }

    let registered = hub
        .register(Registration {
            id: id.clone(),
            session,
            outbound: outbound_tx,
        })
        .await;
    if !registered {
        return;
    }

    tracing::debug!(client_id = %id, session = %session, "client connected");

    let (sink, stream) = socket.split();
    let reader = read_loop(stream, &id, &hub);
    let writer = write_loop(sink, outbound_rx);

    // Whichever side finishes first tears the other down; the socket halves
    // drop here, releasing the connection.
    tokio::select! {
        result = reader => {
            if let Err(reason) = result {
                tracing::debug!(client_id = %id, reason = %reason, "reader ended");
            }
        }
        result = writer => {
            if let Err(reason) = result {
                tracing::debug!(client_id = %id, reason = %reason, "writer ended");
            }
        }
    }

    hub.unregister(Unregister { id, session }).await;
}

/// Read frames until close, error, or a silent `PONG_WAIT` window.
async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    id: &ClientId,
    hub: &HubHandle,
) -> Result<(), String> {
    loop {
        let frame = match timeout(PONG_WAIT, stream.next()).await {
            Err(_) => return Err("read deadline exceeded".to_string()),
            Ok(None) => return Ok(()),
            Ok(Some(Err(err))) => return Err(format!("socket read error: {err}")),
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Binary(data) => {
                let mut envelope = match Envelope::from_bytes(&data) {
                    Ok(envelope) => envelope,
                    Err(err) => return Err(format!("envelope decode error: {err}")),
                };

                // Never trust a client-supplied sender.
                envelope.set_sender(id.clone());

                if !hub.inbound(envelope).await {
                    return Ok(());
                }
            }
            Message::Text(_) => return Err("unexpected text frame".to_string()),
            // Control frames refresh the read deadline by arriving at all.
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Ok(()),
        }
    }
}

/// Drain the outbound queue and ping on a timer until the queue closes or a
/// write fails.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Vec<u8>>,
) -> Result<(), String> {
    let mut ping = interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe = outbound_rx.recv() => match maybe {
                Some(frame) => {
                    match timeout(WRITE_WAIT, sink.send(Message::Binary(frame.into()))).await {
                        Err(_) => return Err("write deadline exceeded".to_string()),
                        Ok(Err(err)) => return Err(format!("socket write error: {err}")),
                        Ok(Ok(())) => {}
                    }
                }
                None => {
                    // The hub closed the queue; say goodbye if the socket
                    // still accepts it.
                    let _ = timeout(CLOSE_GRACE, sink.send(Message::Close(None))).await;
                    return Ok(());
                }
            },
            _ = ping.tick() => {
                match timeout(WRITE_WAIT, sink.send(Message::Ping(Vec::new().into()))).await {
                    Err(_) => return Err("ping deadline exceeded".to_string()),
                    Ok(Err(err)) => return Err(format!("ping write error: {err}")),
                    Ok(Ok(())) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_period_stays_under_pong_wait() {
        assert!(PING_PERIOD < PONG_WAIT);
        assert_eq!(PING_PERIOD.as_secs() * 10, PONG_WAIT.as_secs() * 9);
    }
}
