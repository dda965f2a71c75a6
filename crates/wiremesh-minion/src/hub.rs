//! The hub: a minion's single serial dispatcher.
//!
//! One task owns the client table and handles every routing event, selected
//! from five channels (register, unregister, inbound, peer, master). Exactly
//! one event is handled at a time, which gives the table mutual exclusion
//! without a lock.
//!
//! Backpressure is per-client and terminal: if a client's bounded outbound
//! queue is full at delivery time, the hub drops the client. The dropped
//! sender closes the queue, the client's writer observes the close and
//! disconnects the socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use wiremesh_core::{ClientId, Envelope, MinionId, SessionNonce};
use wiremesh_store::{keys, Store};

use crate::presence::Presence;
use crate::transport::Transport;

/// Capacity of each hub event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A request to attach a client to the hub.
pub struct Registration {
    /// The authenticated client id.
    pub id: ClientId,
    /// The session nonce of this attach.
    pub session: SessionNonce,
    /// Producer side of the client's bounded outbound queue.
    pub outbound: mpsc::Sender<Vec<u8>>,
}

/// A request to detach a client, honored only if the nonce still matches.
pub struct Unregister {
    /// The client id to detach.
    pub id: ClientId,
    /// The session nonce the requester was attached under.
    pub session: SessionNonce,
}

/// Hub-local view of one connected client.
struct LocalClient {
    session: SessionNonce,
    outbound: mpsc::Sender<Vec<u8>>,
}

/// One routing event, drained from whichever channel fired.
enum Event {
    Register(Registration),
    Unregister(Unregister),
    Inbound(Envelope),
    Peer(Envelope),
    Master(Vec<u8>),
    Shutdown,
}

/// Cloneable producer handle into the hub.
#[derive(Clone)]
pub struct HubHandle {
    register_tx: mpsc::Sender<Registration>,
    unregister_tx: mpsc::Sender<Unregister>,
    inbound_tx: mpsc::Sender<Envelope>,
    connections: Arc<AtomicUsize>,
}

impl HubHandle {
    /// Attach a client. Returns `false` if the hub is shutting down.
    pub async fn register(&self, registration: Registration) -> bool {
        self.register_tx.send(registration).await.is_ok()
    }

    /// Request a nonce-guarded detach.
    pub async fn unregister(&self, unregister: Unregister) {
        let _ = self.unregister_tx.send(unregister).await;
    }

    /// Forward an envelope received from a locally-connected client.
    /// Returns `false` if the hub is shutting down.
    pub async fn inbound(&self, envelope: Envelope) -> bool {
        self.inbound_tx.send(envelope).await.is_ok()
    }

    /// Number of clients currently attached.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }
}

/// The dispatcher. Owns the client table, the presence directory, and the
/// transport.
pub struct Hub {
    minion_id: MinionId,
    minion_key: String,
    registry: Store,
    presence: Presence,
    transport: Transport,
    clients: HashMap<ClientId, LocalClient>,
    connections: Arc<AtomicUsize>,
    register_rx: mpsc::Receiver<Registration>,
    unregister_rx: mpsc::Receiver<Unregister>,
    inbound_rx: mpsc::Receiver<Envelope>,
    peer_rx: mpsc::Receiver<Envelope>,
    master_rx: mpsc::Receiver<Vec<u8>>,
    shutdown: CancellationToken,
}

impl Hub {
    /// Create a hub and its producer handle.
    ///
    /// `broker` carries presence and inbox traffic; `registry` holds this
    /// minion's liveness hash (for the `connections` gauge).
    #[must_use]
    pub fn new(
        minion_id: &MinionId,
        broker: Store,
        registry: Store,
        minion_key: String,
        shutdown: CancellationToken,
    ) -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (unregister_tx, unregister_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (peer_tx, peer_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (master_tx, master_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let connections = Arc::new(AtomicUsize::new(0));
        let presence = Presence::new(minion_id, broker.clone());
        let transport = Transport::new(minion_id, broker, peer_tx, master_tx, shutdown.clone());

        let hub = Self {
            minion_id: *minion_id,
            minion_key,
            registry,
            presence,
            transport,
            clients: HashMap::new(),
            connections: Arc::clone(&connections),
            register_rx,
            unregister_rx,
            inbound_rx,
            peer_rx,
            master_rx,
            shutdown,
        };

        let handle = HubHandle {
            register_tx,
            unregister_tx,
            inbound_tx,
            connections,
        };

        (hub, handle)
    }

    /// The presence directory this hub writes through.
    #[must_use]
    pub fn presence(&self) -> Presence {
        self.presence.clone()
    }

    /// Start the transport and the dispatch loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot establish its consumer
    /// connections.
    pub async fn start(mut self) -> wiremesh_store::Result<JoinHandle<()>> {
        self.transport.start().await?;
        Ok(tokio::spawn(self.run()))
    }

    /// The dispatch loop: handle events one at a time until shutdown, then
    /// tear down.
    async fn run(mut self) {
        tracing::info!(minion_id = %self.minion_id, "hub dispatching");

        loop {
            let event = tokio::select! {
                () = self.shutdown.cancelled() => Event::Shutdown,
                maybe = self.register_rx.recv() => maybe.map_or(Event::Shutdown, Event::Register),
                maybe = self.unregister_rx.recv() => maybe.map_or(Event::Shutdown, Event::Unregister),
                maybe = self.inbound_rx.recv() => maybe.map_or(Event::Shutdown, Event::Inbound),
                maybe = self.peer_rx.recv() => maybe.map_or(Event::Shutdown, Event::Peer),
                maybe = self.master_rx.recv() => maybe.map_or(Event::Shutdown, Event::Master),
            };

            match event {
                Event::Register(registration) => self.handle_register(registration).await,
                Event::Unregister(unregister) => self.handle_unregister(unregister).await,
                Event::Inbound(envelope) => self.handle_inbound(envelope).await,
                Event::Peer(envelope) => self.handle_peer(&envelope).await,
                Event::Master(data) => Self::handle_master(&data),
                Event::Shutdown => break,
            }
        }

        self.stop().await;
    }

    /// Attach a client, unconditionally superseding any existing session
    /// with the same id. The displaced entry's sender drops here, closing
    /// its outbound queue.
    async fn handle_register(&mut self, registration: Registration) {
        tracing::debug!(client_id = %registration.id, session = %registration.session, "register");

        let replaced = self
            .clients
            .insert(
                registration.id,
                LocalClient {
                    session: registration.session,
                    outbound: registration.outbound,
                },
            )
            .is_some();

        if !replaced {
            self.sync_connection_gauge(1).await;
        }
    }

    /// Detach a client if the presented nonce still names the current
    /// session, and clear its presence entry.
    async fn handle_unregister(&mut self, unregister: Unregister) {
        if !remove_if_session_matches(&mut self.clients, &unregister.id, unregister.session) {
            return;
        }

        tracing::debug!(client_id = %unregister.id, "unregistered client");
        self.sync_connection_gauge(-1).await;

        if let Err(err) = self.presence.remove(&unregister.id).await {
            tracing::warn!(client_id = %unregister.id, error = %err, "presence remove failed");
        }
    }

    /// Route an envelope from a locally-connected client: locate the
    /// recipients, bucket them per minion, and forward each bucket through
    /// the transport. Unknown recipients (the empty bucket) are dropped.
    async fn handle_inbound(&mut self, mut envelope: Envelope) {
        let locations = match self.presence.locate(envelope.recipients()).await {
            Ok(locations) => locations,
            Err(err) => {
                tracing::warn!(error = %err, "presence lookup failed, dropping envelope");
                return;
            }
        };

        for (minion_id, members) in locations {
            if minion_id.is_empty() {
                continue;
            }

            envelope.set_recipients(members);

            let data = match envelope.to_bytes() {
                Ok(data) => data,
                Err(err) => {
                    tracing::warn!(error = %err, "envelope encode failed, dropping bucket");
                    continue;
                }
            };

            if let Err(err) = self.transport.send(&minion_id, &data).await {
                tracing::warn!(minion_id = %minion_id, error = %err, "peer send failed, dropping bucket");
            }
        }
    }

    /// Deliver a peer envelope to its locally-connected recipients. Clients
    /// whose outbound queue is full are evicted; recipients not on this
    /// minion are ignored.
    async fn handle_peer(&mut self, envelope: &Envelope) {
        let data = match envelope.to_outbound(Utc::now()) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(error = %err, "outbound encode failed, dropping envelope");
                return;
            }
        };

        let evicted = deliver_to_locals(&mut self.clients, envelope.recipients(), &data);

        for client_id in &evicted {
            tracing::warn!(client_id = %client_id, "outbound queue full, dropping client");
        }
        if !evicted.is_empty() {
            let delta = -i64::try_from(evicted.len()).unwrap_or(i64::MAX);
            self.sync_connection_gauge(delta).await;
        }
    }

    /// Master traffic extension point.
    fn handle_master(data: &[u8]) {
        tracing::debug!(len = data.len(), "master frame received");
    }

    /// Shutdown: stop the transport, close every outbound queue, and clear
    /// the presence entries in one transaction.
    async fn stop(&mut self) {
        tracing::info!(minion_id = %self.minion_id, "stopping hub");

        self.transport.stop().await;

        let ids: Vec<ClientId> = self.clients.keys().cloned().collect();
        self.clients.clear();
        self.connections.store(0, Ordering::Relaxed);

        if !ids.is_empty() {
            if let Err(err) = self.presence.remove_multi(&ids).await {
                tracing::error!(error = %err, "presence cleanup failed");
            }
        }

        tracing::info!(minion_id = %self.minion_id, "hub stopped");
    }

    /// Keep the local gauge and the registry `connections` field in step
    /// with the table.
    async fn sync_connection_gauge(&self, delta: i64) {
        self.connections
            .store(self.clients.len(), Ordering::Relaxed);

        if let Err(err) = self
            .registry
            .hincr_by(&self.minion_key, keys::FIELD_CONNECTIONS, delta)
            .await
        {
            tracing::warn!(error = %err, "connection gauge update failed");
        }
    }
}

/// Remove `id` from the table only if its current session is `session`.
/// Returns whether an entry was removed.
fn remove_if_session_matches(
    clients: &mut HashMap<ClientId, LocalClient>,
    id: &ClientId,
    session: SessionNonce,
) -> bool {
    if clients
        .get(id)
        .is_some_and(|client| client.session == session)
    {
        clients.remove(id);
        true
    } else {
        false
    }
}

/// Push `frame` into each local recipient's outbound queue without
/// blocking. Clients whose queue is full (or already closed) are removed
/// from the table and returned; missing recipients are ignored.
fn deliver_to_locals(
    clients: &mut HashMap<ClientId, LocalClient>,
    recipients: &[ClientId],
    frame: &[u8],
) -> Vec<ClientId> {
    let mut evicted = Vec::new();

    for client_id in recipients {
        if let Some(client) = clients.get(client_id) {
            if client.outbound.try_send(frame.to_vec()).is_err() {
                evicted.push(client_id.clone());
            }
        }
    }

    for client_id in &evicted {
        clients.remove(client_id);
    }

    evicted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(session: SessionNonce, capacity: usize) -> (LocalClient, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            LocalClient {
                session,
                outbound: tx,
            },
            rx,
        )
    }

    #[test]
    fn unregister_requires_matching_session() {
        let mut clients = HashMap::new();
        let current = SessionNonce::generate();
        let stale = SessionNonce::generate();
        let (entry, _rx) = client(current, 1);
        clients.insert(ClientId::from("1"), entry);

        // A stale reader cannot evict the replacement session.
        assert!(!remove_if_session_matches(
            &mut clients,
            &ClientId::from("1"),
            stale
        ));
        assert!(clients.contains_key(&ClientId::from("1")));

        assert!(remove_if_session_matches(
            &mut clients,
            &ClientId::from("1"),
            current
        ));
        assert!(clients.is_empty());
    }

    #[test]
    fn unregister_unknown_client_is_noop() {
        let mut clients = HashMap::new();
        assert!(!remove_if_session_matches(
            &mut clients,
            &ClientId::from("ghost"),
            SessionNonce::generate()
        ));
    }

    #[test]
    fn delivery_reaches_local_recipients() {
        let mut clients = HashMap::new();
        let (entry, mut rx) = client(SessionNonce::generate(), 4);
        clients.insert(ClientId::from("2"), entry);

        let evicted = deliver_to_locals(&mut clients, &[ClientId::from("2")], b"frame");
        assert!(evicted.is_empty());
        assert_eq!(rx.try_recv().unwrap(), b"frame");
    }

    #[test]
    fn missing_recipients_are_ignored() {
        let mut clients = HashMap::new();
        let (entry, mut rx) = client(SessionNonce::generate(), 4);
        clients.insert(ClientId::from("2"), entry);

        let evicted = deliver_to_locals(
            &mut clients,
            &[ClientId::from("99"), ClientId::from("2")],
            b"frame",
        );
        assert!(evicted.is_empty());
        assert_eq!(clients.len(), 1);
        assert_eq!(rx.try_recv().unwrap(), b"frame");
    }

    #[test]
    fn full_queue_evicts_client() {
        let mut clients = HashMap::new();
        let (entry, mut rx) = client(SessionNonce::generate(), 1);
        clients.insert(ClientId::from("2"), entry);

        // Fill the queue, then deliver once more.
        let first = deliver_to_locals(&mut clients, &[ClientId::from("2")], b"one");
        assert!(first.is_empty());
        let second = deliver_to_locals(&mut clients, &[ClientId::from("2")], b"two");

        assert_eq!(second, vec![ClientId::from("2")]);
        assert!(clients.is_empty());

        // The writer drains what was queued, then observes the close.
        assert_eq!(rx.try_recv().unwrap(), b"one");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_queue_evicts_client() {
        let mut clients = HashMap::new();
        let (tx, rx) = mpsc::channel(1);
        clients.insert(
            ClientId::from("2"),
            LocalClient {
                session: SessionNonce::generate(),
                outbound: tx,
            },
        );
        drop(rx);

        let evicted = deliver_to_locals(&mut clients, &[ClientId::from("2")], b"frame");
        assert_eq!(evicted, vec![ClientId::from("2")]);
        assert!(clients.is_empty());
    }
}
