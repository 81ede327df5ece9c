//! # Radar Core
//!
//! Core types, collaborator traits, and errors for the Radar messaging client.
//!
//! The hosted backend owns the real unread state. This crate describes the
//! contracts the client consumes so the reconciliation logic can run
//! against either the REST adapter or in-memory mocks.
//!
//! ## Key Traits
//!
//! - [`UnreadBackend`]: aggregate count endpoint and read/delivered mutations
//! - [`RealtimeSource`]: "message inserted" notifications
//! - [`ErrorReporter`]: where swallowed failures go
//!
//! ## Key Types
//!
//! - [`UserId`], [`CounterpartId`]: opaque backend identifiers
//! - [`Session`]: logged-out or logged-in
//! - [`InboundMessageEvent`]: one realtime notification
//! - [`UnreadCounts`]: per-conversation unread counters

pub mod counts;
pub mod error;
pub mod event;
pub mod identity;
pub mod mock;
pub mod traits;

// Re-export main types
pub use counts::*;
pub use error::*;
pub use event::*;
pub use identity::*;
pub use mock::*;
pub use traits::*;
