//! Inter-minion transport over shared FIFO queues.
//!
//! Outbound, any node can [`Transport::send`] envelope bytes to a specific
//! minion's peer inbox (`RPUSH peer:<id>`); delivery is at-most-once with no
//! confirmation. Inbound, each minion runs one long-lived consumer per inbox
//! key (`peer:<self>`, `master:<self>`), each blocking on `BLPOP` over its
//! own dedicated store connection and forwarding into the hub's
//! corresponding channel.
//!
//! Shutdown cancels both consumers through the shared token and then deletes
//! the inbox keys, discarding any traffic still queued.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use wiremesh_core::{Envelope, MinionId};
use wiremesh_store::{keys, MultiplexedConnection, Result, Store};

/// Per-minion transport over the shared store.
pub struct Transport {
    minion_id: String,
    store: Store,
    peer_tx: mpsc::Sender<Envelope>,
    master_tx: mpsc::Sender<Vec<u8>>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Transport {
    /// Create a transport for `minion_id`, forwarding consumed traffic into
    /// the given hub channels.
    #[must_use]
    pub fn new(
        minion_id: &MinionId,
        store: Store,
        peer_tx: mpsc::Sender<Envelope>,
        master_tx: mpsc::Sender<Vec<u8>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            minion_id: minion_id.to_string(),
            store,
            peer_tx,
            master_tx,
            shutdown,
            tasks: Vec::new(),
        }
    }

    /// Start both inbox consumers, each on a dedicated store connection.
    ///
    /// # Errors
    ///
    /// Returns an error if a dedicated connection cannot be established.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!(minion_id = %self.minion_id, "starting transport");

        let peer_conn = self.store.dedicated().await?;
        let master_conn = self.store.dedicated().await?;

        self.tasks.push(tokio::spawn(consume_peer(
            peer_conn,
            keys::peer_inbox(&self.minion_id),
            self.peer_tx.clone(),
            self.shutdown.clone(),
        )));
        self.tasks.push(tokio::spawn(consume_master(
            master_conn,
            keys::master_inbox(&self.minion_id),
            self.master_tx.clone(),
            self.shutdown.clone(),
        )));

        Ok(())
    }

    /// Push envelope bytes onto another minion's peer inbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the push fails; the caller drops the envelope.
    pub async fn send(&self, minion_id: &str, data: &[u8]) -> Result<()> {
        self.store.rpush(&keys::peer_inbox(minion_id), data).await
    }

    /// Stop both consumers and discard pending inbox traffic.
    pub async fn stop(&mut self) {
        tracing::info!(minion_id = %self.minion_id, "stopping transport");

        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }

        for key in [
            keys::peer_inbox(&self.minion_id),
            keys::master_inbox(&self.minion_id),
        ] {
            if let Err(err) = self.store.del(&key).await {
                tracing::warn!(key = %key, error = %err, "failed to discard inbox");
            }
        }
    }
}

/// Consume the peer inbox, decoding envelopes into the hub peer channel.
async fn consume_peer(
    mut conn: MultiplexedConnection,
    key: String,
    peer_tx: mpsc::Sender<Envelope>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            popped = Store::blpop(&mut conn, &key) => match popped {
                Ok(Some(data)) => match Envelope::from_bytes(&data) {
                    Ok(envelope) => {
                        if peer_tx.send(envelope).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "dropping undecodable peer frame");
                    }
                },
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "peer inbox consumer stopping");
                    return;
                }
            },
        }
    }
}

/// Consume the master inbox, forwarding raw bytes into the hub master
/// channel.
async fn consume_master(
    mut conn: MultiplexedConnection,
    key: String,
    master_tx: mpsc::Sender<Vec<u8>>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            popped = Store::blpop(&mut conn, &key) => match popped {
                Ok(Some(data)) => {
                    if master_tx.send(data).await.is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "master inbox consumer stopping");
                    return;
                }
            },
        }
    }
}
