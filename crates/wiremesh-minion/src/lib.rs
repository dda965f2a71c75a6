//! Minion node for the wiremesh fabric.
//!
//! A minion terminates client WebSocket connections and routes envelopes
//! between them, forwarding cross-node traffic through the shared store.
//! The moving parts:
//!
//! - **Hub** ([`hub`]): the single serial dispatcher that owns the client
//!   table and handles every routing event
//! - **Client** ([`client`]): per-connection reader/writer tasks
//! - **Presence** ([`presence`]): the fleet-wide client-to-minion directory
//! - **Transport** ([`transport`]): per-minion inbox consumers and peer
//!   delivery over shared FIFO queues
//! - **Node** ([`node`]): cluster join, liveness check-in, and lifecycle
//!
//! The binary entry point lives in `main.rs`; everything here is also usable
//! as a library for integration testing.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod error;
pub mod hub;
pub mod node;
pub mod presence;
pub mod routes;
pub mod state;
pub mod transport;

pub use config::MinionConfig;
pub use error::{ApiError, NodeError};
pub use state::AppState;
