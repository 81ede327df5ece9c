//! # Radar Messaging
//!
//! Unread-count reconciliation for the Radar messaging client.
//!
//! The backend owns the real unread state. This crate keeps a local copy for
//! badges and conversation lists, merging realtime inserts, periodic
//! authoritative refreshes, and local read actions.
//!
//! ## Features
//!
//! - Optimistic per-conversation counters driven by realtime events
//! - Coalesced authoritative refresh with replace-not-merge semantics
//! - Active-conversation suppression (messages in the open thread are read
//!   immediately)
//! - Session driver with identity tracking, polling, and realtime reconnect
//!
//! ## Example
//!
//! ```rust,ignore
//! use radar_messaging::{MessagingSession, ReconcilerConfig, UnreadReconciler};
//! use radar_core::{Session, TracingReporter};
//!
//! let reconciler = UnreadReconciler::new(
//!     backend,
//!     Arc::new(TracingReporter),
//!     ReconcilerConfig::default(),
//! );
//!
//! let (identity_tx, identity_rx) = tokio::sync::watch::channel(Session::LoggedOut);
//! let handle = MessagingSession::start(reconciler.clone(), realtime, identity_rx);
//!
//! identity_tx.send(Session::logged_in(user_id))?;
//!
//! // Opening a thread
//! reconciler.set_active_conversation(Some(counterpart.clone()));
//! reconciler.mark_conversation_read(&counterpart).await;
//!
//! println!("{} unread", reconciler.total_unread());
//!
//! handle.stop().await;
//! ```

pub mod backoff;
pub mod config;
pub mod reconciler;
pub mod session;

// Re-exports
pub use backoff::ExponentialBackoff;
pub use config::{BackoffConfig, ReconcilerConfig};
pub use reconciler::{UnreadEvent, UnreadReconciler};
pub use session::{MessagingSession, SubscriptionHandle};
