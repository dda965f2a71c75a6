//! Core types for wiremesh.
//!
//! This crate provides the foundational types shared by every node role in
//! the wiremesh messaging fabric:
//!
//! - **Identifiers**: Strongly-typed IDs for clients, minion nodes, and
//!   socket sessions
//! - **Envelope**: The routed message unit and its binary wire codec
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use wiremesh_core::{ClientId, Envelope, EnvelopeKind, MinionId};
//!
//! // Every boot gets a fresh minion id
//! let minion_id = MinionId::generate();
//!
//! // Build and encode an envelope addressed to client "2"
//! let envelope = Envelope::new(
//!     EnvelopeKind::Chat,
//!     b"hi".to_vec(),
//!     vec![ClientId::from("2")],
//! );
//! let bytes = envelope.to_bytes().unwrap();
//! assert_eq!(Envelope::from_bytes(&bytes).unwrap(), envelope);
//! # let _ = minion_id;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod envelope;
pub mod error;
pub mod ids;

pub use envelope::{Envelope, EnvelopeKind};
pub use error::{CoreError, Result};
pub use ids::{ClientId, IdError, MinionId, SessionNonce};
