//! Support Chat Core - Shared domain types.
//!
//! This crate provides the types and pure functions shared by the support chat
//! components:
//! - `client` - HTTP client, state store, and sync engine
//! - `cli` - Terminal front end
//!
//! # Architecture
//!
//! The core crate contains only types and functions - no I/O, no HTTP clients,
//! no timers. Everything here is deterministic, which keeps it trivially
//! testable and usable from any front end.
//!
//! # Modules
//!
//! - [`types`] - Ids, admins, messages, and unread counters
//! - [`timeline`] - Time formatting and day-bucket grouping for rendering

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod timeline;
pub mod types;

pub use types::*;
