//! Core types for the support chat.
//!
//! This module provides type-safe wrappers for the chat domain concepts.

pub mod admin;
pub mod id;
pub mod message;
pub mod unread;

pub use admin::{Admin, filter_admins};
pub use id::*;
pub use message::{Message, SenderType, conversation_with};
pub use unread::UnreadCounts;
