//! Master node for the wiremesh fabric.
//!
//! Any number of master candidates may run; exactly one holds the leader
//! lease at a time. The lease is a single TTL-bounded key in the shared
//! store, acquired with `SET NX EX` and maintained by periodic `EXPIRE`
//! refreshes ([`lease`]).
//!
//! Every candidate, leader or not, serves the admin HTTP surface
//! ([`routes`]): fleet introspection over the minion registry and message
//! injection into per-minion master inboxes ([`registry`]).

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod lease;
pub mod node;
pub mod registry;
pub mod routes;

pub use config::MasterConfig;
pub use error::AdminError;
pub use lease::Lease;
pub use registry::{Minion, Registry};
