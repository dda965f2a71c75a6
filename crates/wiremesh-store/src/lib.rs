//! Coordination store client for wiremesh.
//!
//! Every node role coordinates through a shared Redis deployment: the
//! client-to-minion presence directory, the per-minion liveness registry,
//! the peer/master message inboxes, and the master leader lease all live
//! there. This crate wraps the [`redis`] driver with the small operation set
//! the fabric needs:
//!
//! - connection establishment with indefinite exponential-backoff retry
//! - plain key, hash, and list operations on a shared multiplexed connection
//! - atomic multi-key operations (`MULTI`/`EXEC`) for presence and fan-out
//! - `SET NX EX` for the single-key leader lease
//! - cursor-iterated, de-duplicated `SCAN` for fleet discovery
//! - dedicated connections for `BLPOP` consumers, so a blocked consumer
//!   never starves the shared connection
//!
//! # Example
//!
//! ```no_run
//! use wiremesh_store::Store;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::connect(":6379").await?;
//! store.set("client:42", "minion-1").await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod backoff;
pub mod client;
pub mod error;
pub mod keys;

pub use backoff::ExponentialBackoff;
pub use client::Store;
pub use error::{Result, StoreError};

/// The connection type handed to blocking consumers by [`Store::dedicated`].
pub use redis::aio::MultiplexedConnection;
