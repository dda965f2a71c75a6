//! Bearer-token authentication for wiremesh.
//!
//! Clients authenticate socket attaches with an opaque bearer token: an
//! HS256 JWT signed with the fleet-shared `SECRET`, whose `sub` claim is the
//! client id. This crate verifies tokens and yields the authenticated
//! [`wiremesh_core::ClientId`], the only source of client identity in the
//! fabric; a client-supplied id is never trusted.
//!
//! # Example
//!
//! ```
//! use wiremesh_auth::TokenVerifier;
//!
//! let verifier = TokenVerifier::new(b"secret");
//! # #[cfg(any(test, feature = "test-utils"))]
//! # {
//! let token = wiremesh_auth::issue_token(b"secret", "client-7", 3600).unwrap();
//! let client_id = verifier.verify(&token).unwrap();
//! assert_eq!(client_id.as_str(), "client-7");
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod token;

pub use error::{AuthError, Result};
pub use token::TokenVerifier;

#[cfg(any(test, feature = "test-utils"))]
pub use token::issue_token;
