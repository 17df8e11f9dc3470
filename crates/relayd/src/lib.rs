//! Relay Daemon - line-oriented TCP broadcast server
//!
//! This crate provides the core infrastructure for the relay daemon:
//! - `registry` - Client registry actor owning the set of live connections
//! - `server` - TCP server and per-connection relay loops
//! - `heartbeat` - Idle/Active keepalive timer driven by registry size
//! - `config` - Layered daemon configuration
//! - `cli` - Command-line entry point for the `relayd` binary
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       relayd daemon                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   RelayServer   │────▶│     RegistryActor           │   │
//! │  │  (TcpListener)  │     │  (client set owner)         │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ join/leave events │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│     │   HeartbeatScheduler        │   │
//! │  │  (per client)   │     │   (idle log / keepalive)    │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod cli;
pub mod config;
pub mod heartbeat;
pub mod registry;
pub mod server;
