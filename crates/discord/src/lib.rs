//! Discord Integration - gateway bot interface
//!
//! This crate provides the chat-platform interface for gaffer:
//! - **Gateway** (`gateway`) - transport abstraction, reconnect loop, runner
//! - **Slash Commands** (`commands`) - `/offer`, `/view`, `/release`
//! - **Events** (`events`) - typed interaction envelopes and dispatch
//! - **Embeds** (`embeds`) - offer/signed document and listing builders
//! - **REST** (`rest`) - API egress: messages, roles, members, follow-ups
//! - **Presence** (`presence`) - rotating status publisher
//! - **Service** (`service`) - the contract offer/view/release flows
//!
//! # Architecture
//!
//! ```text
//! Gateway Events → EventDispatcher → Handlers → HubService → REST egress
//!                       ↓
//!                 Embed documents ← Reply
//! ```
//!
//! # Key Types
//!
//! - `GatewayRunner` - event loop with reconnection logic
//! - `EventDispatcher` - routes interactions to registered handlers
//! - `HubService` - offer issue/accept, membership query, release
//! - `DiscordApi` - REST seam implemented by `RestClient`

pub mod commands;
pub mod embeds;
pub mod events;
pub mod gateway;
pub mod presence;
pub mod rest;
pub mod service;
