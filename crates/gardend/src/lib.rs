//! Garden relay daemon - connection hub and WebSocket server
//!
//! This crate provides the infrastructure behind `gardend`:
//! - `hub` - Hub actor owning the peer registry and the shared countdown
//! - `server` - WebSocket server routing `/config`, `/screen` and `/client`
//! - `relay` - Forwarding of client input frames to the screens
//! - `effects` - Screen-side effects triggered by config commands
//! - `config` - Daemon configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       gardend daemon                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │   RelayServer   │────▶│          HubActor           │    │
//! │  │   (WebSocket)   │     │ (registry + countdown owner)│    │
//! │  └────────┬────────┘     └──────────────┬──────────────┘    │
//! │           │                             │                   │
//! │           │ connections                 │ effects           │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │ConnectionHandler│────▶│        ScreenFanout         │    │
//! │  │   (per peer)    │relay│  (broadcast to screens)     │    │
//! │  └─────────────────┘     └─────────────────────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate is panic-free:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod effects;
pub mod hub;
pub mod registry;
pub mod relay;
pub mod server;
