//! In-memory collaborators for testing
//!
//! Provides stand-ins for the hosted backend so reconciler logic can be
//! exercised headlessly, with call recording and failure injection.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use radar_core::{ChannelRealtime, MockBackend, RecordingReporter, UnreadCountEntry};
//!
//! let backend = Arc::new(MockBackend::new());
//! backend.set_counts(vec![UnreadCountEntry::new("alice", 3)]);
//!
//! // Hold the next fetch in flight
//! let gate = backend.pause_fetches();
//! // ... issue concurrent refreshes ...
//! gate.open();
//!
//! assert_eq!(backend.fetch_calls(), 1);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore, mpsc};

use crate::counts::UnreadCountEntry;
use crate::error::{BackendError, BackendResult, Operation, ReconcilerError};
use crate::event::InboundMessageEvent;
use crate::identity::{CounterpartId, UserId};
use crate::traits::{ErrorReporter, RealtimeSource, RealtimeSubscription, UnreadBackend};

/// A call received by [`MockBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `fetch_unread_counts`
    FetchCounts,
    /// `mark_delivered`
    MarkDelivered(CounterpartId),
    /// `mark_read`
    MarkRead(CounterpartId),
}

/// Injected failures, one slot per endpoint
#[derive(Debug, Default)]
struct Failures {
    fetch: Option<BackendError>,
    mark_delivered: Option<BackendError>,
    mark_read: Option<BackendError>,
}

/// In-memory backend that serves a fixed set of counts
///
/// The mutations do not touch the served counts; tests control server truth
/// explicitly through [`MockBackend::set_counts`].
#[derive(Default)]
pub struct MockBackend {
    counts: Mutex<Vec<UnreadCountEntry>>,
    calls: Mutex<Vec<MockCall>>,
    failures: Mutex<Failures>,
    fetch_gate: Mutex<Option<Arc<Semaphore>>>,
    fetch_count: AtomicUsize,
    fetch_started: Notify,
}

impl MockBackend {
    /// Create a backend that reports nothing unread
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend serving the given counts
    pub fn with_counts(counts: Vec<UnreadCountEntry>) -> Self {
        let backend = Self::new();
        backend.set_counts(counts);
        backend
    }

    /// Replace the counts served by the aggregate endpoint
    pub fn set_counts(&self, counts: Vec<UnreadCountEntry>) {
        *self.counts.lock() = counts;
    }

    /// Make every fetch fail with `error` until cleared
    pub fn fail_fetch(&self, error: Option<BackendError>) {
        self.failures.lock().fetch = error;
    }

    /// Make every mark-delivered call fail with `error` until cleared
    pub fn fail_mark_delivered(&self, error: Option<BackendError>) {
        self.failures.lock().mark_delivered = error;
    }

    /// Make every mark-read call fail with `error` until cleared
    pub fn fail_mark_read(&self, error: Option<BackendError>) {
        self.failures.lock().mark_read = error;
    }

    /// Hold fetches in flight until the returned gate is opened or dropped
    pub fn pause_fetches(&self) -> FetchGate {
        let semaphore = Arc::new(Semaphore::new(0));
        *self.fetch_gate.lock() = Some(semaphore.clone());
        FetchGate { semaphore }
    }

    /// Number of requests made to the aggregate endpoint
    pub fn fetch_calls(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` fetches have started
    pub async fn wait_for_fetches(&self, n: usize) {
        while self.fetch_calls() < n {
            self.fetch_started.notified().await;
        }
    }

    /// Every call received, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Counterparts passed to `mark_delivered`, in order
    pub fn delivered_calls(&self) -> Vec<CounterpartId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::MarkDelivered(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Counterparts passed to `mark_read`, in order
    pub fn read_calls(&self) -> Vec<CounterpartId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::MarkRead(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl UnreadBackend for MockBackend {
    async fn fetch_unread_counts(&self) -> BackendResult<Vec<UnreadCountEntry>> {
        self.record(MockCall::FetchCounts);
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.fetch_started.notify_one();

        let gate = self.fetch_gate.lock().clone();
        if let Some(gate) = gate {
            // Closed gate lets every waiter through
            let _ = gate.acquire().await;
        }

        if let Some(error) = self.failures.lock().fetch.clone() {
            return Err(error);
        }
        Ok(self.counts.lock().clone())
    }

    async fn mark_delivered(&self, counterpart: &CounterpartId) -> BackendResult<()> {
        self.record(MockCall::MarkDelivered(counterpart.clone()));
        match self.failures.lock().mark_delivered.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn mark_read(&self, counterpart: &CounterpartId) -> BackendResult<()> {
        self.record(MockCall::MarkRead(counterpart.clone()));
        match self.failures.lock().mark_read.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Holds [`MockBackend`] fetches in flight
#[derive(Debug)]
pub struct FetchGate {
    semaphore: Arc<Semaphore>,
}

impl FetchGate {
    /// Let every held and future fetch complete
    pub fn open(self) {
        drop(self);
    }
}

impl Drop for FetchGate {
    fn drop(&mut self) {
        self.semaphore.close();
    }
}

type Subscribers = Arc<Mutex<HashMap<UserId, Vec<(u64, mpsc::Sender<InboundMessageEvent>)>>>>;

/// Channel-backed realtime source
///
/// Events pushed with [`ChannelRealtime::push`] go to every live
/// subscription of the event's receiver.
pub struct ChannelRealtime {
    subscribers: Subscribers,
    next_id: AtomicUsize,
    subscribe_count: AtomicUsize,
    fail_subscribe: Mutex<Option<BackendError>>,
    buffer_size: usize,
}

impl Default for ChannelRealtime {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRealtime {
    /// Create a source with the default buffer size
    pub fn new() -> Self {
        Self::with_buffer_size(64)
    }

    /// Create a source with a specific per-subscription buffer size
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicUsize::new(0),
            subscribe_count: AtomicUsize::new(0),
            fail_subscribe: Mutex::new(None),
            buffer_size,
        }
    }

    /// Deliver an event to the receiver's subscriptions
    ///
    /// Returns how many subscriptions accepted it.
    pub fn push(&self, event: InboundMessageEvent) -> usize {
        let subscribers = self.subscribers.lock();
        let Some(senders) = subscribers.get(&event.receiver_id) else {
            return 0;
        };
        senders
            .iter()
            .filter(|(_, tx)| tx.try_send(event.clone()).is_ok())
            .count()
    }

    /// Number of live subscriptions for a user
    pub fn subscriber_count(&self, user: &UserId) -> usize {
        self.subscribers
            .lock()
            .get(user)
            .map(|senders| senders.iter().filter(|(_, tx)| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Number of `subscribe` calls made so far
    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_count.load(Ordering::SeqCst)
    }

    /// Make every subscribe call fail with `error` until cleared
    pub fn fail_subscribe(&self, error: Option<BackendError>) {
        *self.fail_subscribe.lock() = error;
    }

    /// Drop every subscription from the source side (simulates a disconnect)
    pub fn disconnect_all(&self) {
        self.subscribers.lock().clear();
    }
}

#[async_trait]
impl RealtimeSource for ChannelRealtime {
    async fn subscribe(&self, user: &UserId) -> BackendResult<RealtimeSubscription> {
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fail_subscribe.lock().clone() {
            return Err(error);
        }

        let (tx, rx) = mpsc::channel(self.buffer_size);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as u64;
        self.subscribers
            .lock()
            .entry(user.clone())
            .or_default()
            .push((id, tx));

        let subscribers = self.subscribers.clone();
        let user = user.clone();
        Ok(RealtimeSubscription::new(rx).on_close(move || {
            let mut subscribers = subscribers.lock();
            if let Some(senders) = subscribers.get_mut(&user) {
                senders.retain(|(sub_id, _)| *sub_id != id);
                if senders.is_empty() {
                    subscribers.remove(&user);
                }
            }
        }))
    }
}

/// Reporter that keeps every failure for later assertions
#[derive(Debug, Default)]
pub struct RecordingReporter {
    errors: Mutex<Vec<ReconcilerError>>,
}

impl RecordingReporter {
    /// Create an empty reporter
    pub fn new() -> Self {
        Self::default()
    }

    /// All reported failures, in order
    pub fn errors(&self) -> Vec<ReconcilerError> {
        self.errors.lock().clone()
    }

    /// Number of failures reported for an operation
    pub fn count(&self, operation: Operation) -> usize {
        self.errors
            .lock()
            .iter()
            .filter(|e| e.operation == operation)
            .count()
    }

    /// Check if nothing was reported
    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, error: &ReconcilerError) {
        self.errors.lock().push(error.clone());
    }
}
