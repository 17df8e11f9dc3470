//! Relay Core - Shared types for the line relay
//!
//! This crate provides the core domain types shared by the daemon
//! (relayd) and the wire protocol (relay-protocol).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod identity;
pub mod state;

// Re-exports for convenience
pub use error::{IdentityError, IdentityResult};
pub use identity::{ClientId, CLIENT_ID_ALPHABET, CLIENT_ID_LENGTH};
pub use state::{ConnectionState, HeartbeatMode};
