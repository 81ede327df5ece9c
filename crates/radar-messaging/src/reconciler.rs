//! Unread-count reconciler
//!
//! Keeps a client-side [`UnreadCounts`] that eventually matches the
//! backend. Three signals feed it:
//!
//! - realtime "message inserted" events, applied optimistically
//! - the aggregate count endpoint, which replaces local state wholesale
//! - local read actions, which zero a conversation once the backend accepts them
//!
//! Optimistic increments are not de-duplicated. A duplicate delivery counts
//! twice until the next authoritative refresh overwrites it, and a refresh
//! that resolves after newer events were applied overwrites those too.
//!
//! No public operation returns an error. Failures go to the injected
//! [`ErrorReporter`].

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use radar_core::{
    CounterpartId, ErrorReporter, InboundMessageEvent, Operation, ReconcilerError, Session,
    UnreadBackend, UnreadCounts, UserId,
};
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::config::ReconcilerConfig;

/// Change notification for views
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnreadEvent {
    /// One or more counters changed
    CountsChanged {
        /// Sum of all counters after the change
        total: u64,
    },
    /// The first authoritative refresh of the session finished
    Ready,
    /// The signed-in user changed and all state was discarded
    SessionReset {
        /// The new user, if any
        user_id: Option<UserId>,
    },
}

/// State owned by the reconciler
#[derive(Debug, Default)]
struct State {
    session: Session,
    /// Bumped on every user change; async work started under an older
    /// generation must not touch state
    generation: u64,
    counts: UnreadCounts,
    active: Option<CounterpartId>,
    ready: bool,
}

type SharedRefresh = Shared<BoxFuture<'static, ()>>;

struct Inner {
    backend: Arc<dyn UnreadBackend>,
    reporter: Arc<dyn ErrorReporter>,
    config: ReconcilerConfig,
    state: Mutex<State>,
    /// At most one outstanding refresh, tagged with its session generation
    in_flight: Mutex<Option<(u64, SharedRefresh)>>,
    events: broadcast::Sender<UnreadEvent>,
}

/// Reconciles local unread counters with the backend
///
/// Cloning is cheap and yields a handle to the same state, so one instance
/// can be created by the composition root and handed to every view.
#[derive(Clone)]
pub struct UnreadReconciler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for UnreadReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("UnreadReconciler")
            .field("session", &state.session)
            .field("total", &state.counts.total())
            .field("ready", &state.ready)
            .finish_non_exhaustive()
    }
}

impl UnreadReconciler {
    /// Create a reconciler with no signed-in user
    pub fn new(
        backend: Arc<dyn UnreadBackend>,
        reporter: Arc<dyn ErrorReporter>,
        config: ReconcilerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_channel_capacity.max(1));

        Self {
            inner: Arc::new(Inner {
                backend,
                reporter,
                config,
                state: Mutex::new(State::default()),
                in_flight: Mutex::new(None),
                events,
            }),
        }
    }

    /// The configuration this reconciler was built with
    pub fn config(&self) -> &ReconcilerConfig {
        &self.inner.config
    }

    /// Get a subscription to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<UnreadEvent> {
        self.inner.events.subscribe()
    }

    /// Current session
    pub fn session(&self) -> Session {
        self.inner.state.lock().session.clone()
    }

    /// Unread count for one conversation
    pub fn unread_count(&self, counterpart: &CounterpartId) -> u32 {
        self.inner.state.lock().counts.get(counterpart)
    }

    /// Sum of all unread counters
    pub fn total_unread(&self) -> u64 {
        self.inner.state.lock().counts.total()
    }

    /// Copy of every counter
    pub fn snapshot(&self) -> UnreadCounts {
        self.inner.state.lock().counts.clone()
    }

    /// The conversation currently open in the UI
    pub fn active_conversation(&self) -> Option<CounterpartId> {
        self.inner.state.lock().active.clone()
    }

    /// Whether the first refresh of this session has finished
    ///
    /// Also true after a failed first refresh, so views never wait forever.
    pub fn is_ready(&self) -> bool {
        self.inner.state.lock().ready
    }

    /// Switch to a new identity
    ///
    /// A different user discards every counter, the active conversation, and
    /// the ready flag, then runs the initial refresh. Signing out leaves the
    /// counters empty without fetching. Re-applying the current user is a
    /// no-op.
    pub async fn set_session(&self, session: Session) {
        if self.begin_session(session) {
            self.refresh_unread_counts().await;
        }
    }

    /// Apply an identity change without fetching
    ///
    /// Returns true when the new session still needs its initial refresh.
    pub(crate) fn begin_session(&self, session: Session) -> bool {
        let reset = {
            let mut state = self.inner.state.lock();
            if state.session.user_id() == session.user_id() {
                if !session.is_logged_in() && !state.ready {
                    state.ready = true;
                    drop(state);
                    self.emit(UnreadEvent::Ready);
                }
                return false;
            }

            state.generation += 1;
            state.session = session.clone();
            state.counts.clear();
            state.active = None;
            state.ready = !session.is_logged_in();
            state.generation
        };

        info!(
            user = ?session.user_id().map(|u| u.short_id()),
            generation = reset,
            "Messaging session reset"
        );
        self.emit(UnreadEvent::SessionReset {
            user_id: session.user_id().cloned(),
        });
        self.emit(UnreadEvent::CountsChanged { total: 0 });

        if !session.is_logged_in() {
            self.emit(UnreadEvent::Ready);
        }
        session.is_logged_in()
    }

    /// Replace every counter with the backend's authoritative counts
    ///
    /// Concurrent callers share one request. On failure the previous counters
    /// stay, the failure is reported, and the session is still marked ready.
    /// While signed out this clears the counters instead of fetching.
    pub async fn refresh_unread_counts(&self) {
        let generation = {
            let mut state = self.inner.state.lock();
            if !state.session.is_logged_in() {
                let changed = !state.counts.is_empty();
                state.counts.clear();
                let became_ready = !state.ready;
                state.ready = true;
                drop(state);
                if changed {
                    self.emit(UnreadEvent::CountsChanged { total: 0 });
                }
                if became_ready {
                    self.emit(UnreadEvent::Ready);
                }
                return;
            }
            state.generation
        };

        let refresh = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.as_ref() {
                Some((tagged, refresh)) if *tagged == generation => {
                    trace!(generation, "Joining in-flight refresh");
                    refresh.clone()
                }
                _ => {
                    let this = self.clone();
                    let refresh = async move { this.run_refresh(generation).await }
                        .boxed()
                        .shared();
                    *in_flight = Some((generation, refresh.clone()));
                    refresh
                }
            }
        };

        refresh.await;
    }

    async fn run_refresh(&self, generation: u64) {
        debug!(generation, "Fetching unread counts");
        let result = self.inner.backend.fetch_unread_counts().await;

        {
            let mut in_flight = self.inner.in_flight.lock();
            if matches!(in_flight.as_ref(), Some((tagged, _)) if *tagged == generation) {
                *in_flight = None;
            }
        }

        let mut state = self.inner.state.lock();
        if state.generation != generation {
            debug!(generation, "Discarding refresh for a previous session");
            return;
        }

        let became_ready = !state.ready;
        state.ready = true;

        match result {
            Ok(entries) => {
                state.counts.replace_with(entries);
                let total = state.counts.total();
                let conversations = state.counts.len();
                drop(state);

                debug!(total, conversations, "Unread counts refreshed");
                self.emit(UnreadEvent::CountsChanged { total });
            }
            Err(error) => {
                drop(state);
                self.report_error(ReconcilerError::new(Operation::Refresh, error));
            }
        }

        if became_ready {
            self.emit(UnreadEvent::Ready);
        }
    }

    /// Tell the backend every message from `counterpart` was delivered
    ///
    /// Counters are not touched. Failures are reported, not retried. Like
    /// [`mark_conversation_read`](Self::mark_conversation_read), this is
    /// skipped while signed out: there is no user to mark on behalf of.
    pub async fn mark_conversation_delivered(&self, counterpart: &CounterpartId) {
        if !self.inner.state.lock().session.is_logged_in() {
            debug!(counterpart = %counterpart.short_id(), "Not signed in, skipping mark delivered");
            return;
        }

        if let Err(error) = self.inner.backend.mark_delivered(counterpart).await {
            self.report_error(ReconcilerError::for_counterpart(
                Operation::MarkDelivered,
                counterpart.clone(),
                error,
            ));
        }
    }

    /// Mark a conversation read
    ///
    /// The local counter drops to zero only once the backend accepts the
    /// call; on failure it keeps showing the unread messages. Skipped while
    /// signed out, without calling the backend or reporting.
    pub async fn mark_conversation_read(&self, counterpart: &CounterpartId) {
        let generation = {
            let state = self.inner.state.lock();
            if !state.session.is_logged_in() {
                debug!(counterpart = %counterpart.short_id(), "Not signed in, skipping mark read");
                return;
            }
            state.generation
        };

        match self.inner.backend.mark_read(counterpart).await {
            Ok(()) => {
                let mut state = self.inner.state.lock();
                if state.generation != generation {
                    return;
                }
                let previous = state.counts.zero(counterpart);
                let total = state.counts.total();
                drop(state);

                if previous > 0 {
                    debug!(counterpart = %counterpart.short_id(), previous, "Conversation read");
                    self.emit(UnreadEvent::CountsChanged { total });
                }
            }
            Err(error) => {
                self.report_error(ReconcilerError::for_counterpart(
                    Operation::MarkRead,
                    counterpart.clone(),
                    error,
                ));
            }
        }
    }

    /// Record which conversation the UI has open
    pub fn set_active_conversation(&self, counterpart: Option<CounterpartId>) {
        trace!(counterpart = ?counterpart.as_ref().map(|c| c.short_id()), "Active conversation");
        self.inner.state.lock().active = counterpart;
    }

    /// Apply one realtime event
    ///
    /// The counter changes before this returns. Receipts (delivered, and read
    /// for the open conversation) are sent from a spawned task, so this must
    /// be called inside a Tokio runtime.
    pub fn handle_inbound(&self, event: InboundMessageEvent) {
        let counterpart = event.counterpart();

        let (active, total) = {
            let mut state = self.inner.state.lock();
            let Some(user) = state.session.user_id() else {
                trace!("Ignoring inbound event while signed out");
                return;
            };
            if event.is_from(user) {
                return;
            }
            if event.receiver_id != *user {
                debug!(
                    sender = %event.sender_id.short_id(),
                    receiver = %event.receiver_id.short_id(),
                    "Ignoring event addressed to another user"
                );
                return;
            }

            let active = state.active.as_ref() == Some(&counterpart);
            if active {
                state.counts.zero(&counterpart);
            } else {
                state.counts.increment(&counterpart);
            }
            (active, state.counts.total())
        };

        trace!(
            sender = %counterpart.short_id(),
            message = ?event.id,
            active,
            "Inbound message"
        );
        self.emit(UnreadEvent::CountsChanged { total });

        let this = self.clone();
        tokio::spawn(async move {
            this.mark_conversation_delivered(&counterpart).await;
            if active {
                this.mark_conversation_read(&counterpart).await;
            }
        });
    }

    pub(crate) fn report_error(&self, error: ReconcilerError) {
        self.inner.reporter.report(&error);
    }

    fn emit(&self, event: UnreadEvent) {
        // No receivers is fine
        let _ = self.inner.events.send(event);
    }
}
