//! Error types for the Radar client

use std::fmt;

use thiserror::Error;

use crate::identity::CounterpartId;

/// Errors returned by the hosted backend collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The remote function is not deployed yet
    #[error("backend setup required: function `{function}` is not provisioned")]
    SetupRequired { function: String },

    /// Transport failure (connect, timeout, reset)
    #[error("network error: {0}")]
    Network(String),

    /// Non-success response from the backend
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The session token was rejected
    #[error("unauthorized")]
    Unauthorized,

    /// Response body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// The realtime stream closed
    #[error("realtime subscription closed")]
    SubscriptionClosed,
}

impl BackendError {
    /// Check if this error means the backend is missing a function
    pub fn is_setup_required(&self) -> bool {
        matches!(self, BackendError::SetupRequired { .. })
    }
}

/// The reconciler operation a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Fetching the authoritative counts
    Refresh,
    /// Marking a conversation delivered
    MarkDelivered,
    /// Marking a conversation read
    MarkRead,
    /// Subscribing to the realtime source
    Subscribe,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Refresh => "refresh",
            Operation::MarkDelivered => "mark_delivered",
            Operation::MarkRead => "mark_read",
            Operation::Subscribe => "subscribe",
        };
        f.write_str(name)
    }
}

/// A failure reported by the reconciler
///
/// These never cross the public reconciler API; they go to the injected
/// [`ErrorReporter`](crate::traits::ErrorReporter).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed{}: {source}", counterpart_suffix(.counterpart))]
pub struct ReconcilerError {
    /// Which operation failed
    pub operation: Operation,
    /// The conversation involved, if any
    pub counterpart: Option<CounterpartId>,
    /// The underlying backend failure
    #[source]
    pub source: BackendError,
}

fn counterpart_suffix(counterpart: &Option<CounterpartId>) -> String {
    match counterpart {
        Some(id) => format!(" for {}", id.short_id()),
        None => String::new(),
    }
}

impl ReconcilerError {
    /// Create an error for an operation without a conversation
    pub fn new(operation: Operation, source: BackendError) -> Self {
        Self {
            operation,
            counterpart: None,
            source,
        }
    }

    /// Create an error for an operation on a conversation
    pub fn for_counterpart(
        operation: Operation,
        counterpart: CounterpartId,
        source: BackendError,
    ) -> Self {
        Self {
            operation,
            counterpart: Some(counterpart),
            source,
        }
    }

    /// Check if the failure means the backend is not provisioned
    pub fn is_setup_required(&self) -> bool {
        self.source.is_setup_required()
    }
}

/// Result type for backend calls
pub type BackendResult<T> = Result<T, BackendError>;
