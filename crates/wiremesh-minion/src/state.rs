//! Minion application state.
//!
//! Shared state available to all HTTP handlers.

use std::sync::Arc;

use wiremesh_auth::TokenVerifier;
use wiremesh_core::MinionId;
use wiremesh_store::Store;

use crate::hub::HubHandle;
use crate::presence::Presence;

/// Shared application state for the minion HTTP surface.
#[derive(Clone)]
pub struct AppState {
    /// This node's id.
    pub minion_id: MinionId,

    /// This node's registry key (`minion:<id>`).
    pub minion_key: String,

    /// The liveness registry store.
    pub registry: Store,

    /// Producer handle into the hub.
    pub hub: HubHandle,

    /// The presence directory.
    pub presence: Presence,

    /// Bearer-token verifier.
    pub verifier: Arc<TokenVerifier>,

    /// Per-minion connection ceiling.
    pub max_connections: usize,

    /// Maximum inbound frame size in bytes.
    pub max_message_size: usize,
}
