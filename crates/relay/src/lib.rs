//! Relay client library.
//!
//! An interactive line client for the relay daemon:
//! - `client` - connect, forward stdin lines, print timestamped broadcasts
//! - `error` - client error types with user-facing messages
//! - `cli` - command-line entry point for the `relay` binary

pub mod cli;
pub mod client;
pub mod error;
