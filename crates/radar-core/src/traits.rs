//! Collaborator traits
//!
//! The reconciler only talks to the hosted backend through these traits, so
//! the same logic runs against the REST adapter and the in-memory mocks.
//!
//! ## Key Traits
//!
//! - [`UnreadBackend`]: aggregate count endpoint plus the mark-delivered and
//!   mark-read mutations
//! - [`RealtimeSource`]: "message inserted" notifications for a user
//! - [`ErrorReporter`]: sink for failures the reconciler swallows

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::counts::UnreadCountEntry;
use crate::error::{BackendResult, ReconcilerError};
use crate::event::InboundMessageEvent;
use crate::identity::{CounterpartId, UserId};

/// Remote procedures that own the unread state on the server
///
/// All calls act on behalf of the user the backend session is bound to.
/// The mutations are idempotent.
#[async_trait]
pub trait UnreadBackend: Send + Sync {
    /// Fetch the authoritative unread count per counterpart
    ///
    /// Counterparts with nothing unread may be omitted.
    async fn fetch_unread_counts(&self) -> BackendResult<Vec<UnreadCountEntry>>;

    /// Mark every message from `counterpart` as delivered
    async fn mark_delivered(&self, counterpart: &CounterpartId) -> BackendResult<()>;

    /// Mark every message from `counterpart` as read
    async fn mark_read(&self, counterpart: &CounterpartId) -> BackendResult<()>;
}

/// Source of "message inserted" notifications
#[async_trait]
pub trait RealtimeSource: Send + Sync {
    /// Subscribe to messages addressed to `user`
    async fn subscribe(&self, user: &UserId) -> BackendResult<RealtimeSubscription>;
}

/// Sink for failures that never cross the reconciler API
pub trait ErrorReporter: Send + Sync {
    /// Record a failure
    fn report(&self, error: &ReconcilerError);
}

type CloseHook = Box<dyn FnOnce() + Send + 'static>;

/// A live realtime subscription
///
/// Dropping the subscription releases it: the receiver is closed and the
/// source's close hook runs.
pub struct RealtimeSubscription {
    events: mpsc::Receiver<InboundMessageEvent>,
    on_close: Option<CloseHook>,
}

impl RealtimeSubscription {
    /// Wrap a receiver of events
    pub fn new(events: mpsc::Receiver<InboundMessageEvent>) -> Self {
        Self {
            events,
            on_close: None,
        }
    }

    /// Run `hook` when the subscription is released
    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the source has closed the stream.
    pub async fn recv(&mut self) -> Option<InboundMessageEvent> {
        self.events.recv().await
    }
}

impl std::fmt::Debug for RealtimeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeSubscription")
            .field("has_close_hook", &self.on_close.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        self.events.close();
        if let Some(hook) = self.on_close.take() {
            hook();
        }
    }
}

/// Reporter that writes failures to the tracing log
///
/// A missing backend function is logged as a setup warning rather than a
/// runtime error.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &ReconcilerError) {
        let counterpart = error.counterpart.as_ref().map(|c| c.short_id().to_string());
        if error.is_setup_required() {
            tracing::warn!(
                operation = %error.operation,
                counterpart = ?counterpart,
                error = %error.source,
                "Messaging backend setup required"
            );
        } else {
            tracing::error!(
                operation = %error.operation,
                counterpart = ?counterpart,
                error = %error.source,
                "Messaging operation failed"
            );
        }
    }
}
