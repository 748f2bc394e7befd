//! # Relay
//!
//! `relay` is a minimalist, in-memory broadcast relay built with Rust.
//! Clients connect over WebSockets; every message any of them sends is
//! rebroadcast to every connected client, the sender included, in arrival
//! order. Nothing is stored and nothing is addressed.
//!
//! ## Core Modules
//!
//! The library is structured into several modules, each with a distinct responsibility:
//!
//! - `hub`: The single task that owns membership and fans payloads out.
//! - `client`: A connected WebSocket and the two pumps driving it.
//! - `config`: Handles loading and managing server configuration.
//! - `transport`: Accepts connections and applies the handshake policy.
//! - `console`: A terminal chat client for talking to a running relay.
//! - `cli`: Command-line interface of the `relay` binary.
//! - `utils`: Shared error types and logging setup.

pub mod cli;
pub mod client;
pub mod config;
pub mod console;
pub mod hub;
pub mod transport;
pub mod utils;
