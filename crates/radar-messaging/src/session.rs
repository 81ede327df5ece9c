//! Session driver
//!
//! Runs the reconciler for whoever is signed in:
//! - initial refresh, then realtime subscription, on every identity change
//! - inbound events forwarded to the reconciler
//! - periodic authoritative refresh
//! - resubscription with exponential backoff when the realtime stream drops,
//!   followed by a refresh to pick up anything missed while disconnected
//!
//! The driver is independent of any UI lifecycle. [`MessagingSession::start`]
//! returns a [`SubscriptionHandle`]; stopping or dropping the handle releases
//! the realtime subscription.
//!
//! Refreshes run on their own tasks. The loop never waits on the aggregate
//! endpoint, so a slow fetch does not hold back events, identity changes or
//! shutdown.

use std::sync::Arc;

use radar_core::{
    BackendError, InboundMessageEvent, Operation, RealtimeSource, RealtimeSubscription,
    ReconcilerError, Session, UserId,
};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backoff::ExponentialBackoff;
use crate::reconciler::UnreadReconciler;

/// Entry point for running a messaging session
pub struct MessagingSession;

impl MessagingSession {
    /// Spawn the session driver
    ///
    /// `identity` is the identity endpoint: the driver re-initializes every
    /// time the user id it carries changes. Must be called inside a Tokio
    /// runtime.
    pub fn start(
        reconciler: UnreadReconciler,
        realtime: Arc<dyn RealtimeSource>,
        identity: watch::Receiver<Session>,
    ) -> SubscriptionHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let driver = SessionDriver::new(reconciler, realtime, identity, shutdown_rx);

        let task = tokio::spawn(async move {
            driver.run().await;
        });

        SubscriptionHandle {
            shutdown_tx,
            task: Some(task),
        }
    }
}

/// Handle to a running session driver
///
/// Dropping the handle signals the driver to stop without waiting for it.
#[derive(Debug)]
pub struct SubscriptionHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Stop the driver and wait for it to release the subscription
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Messaging session task failed");
            }
        }
    }

    /// Check if the driver is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.shutdown_tx.send(());
        }
    }
}

struct SessionDriver {
    reconciler: UnreadReconciler,
    realtime: Arc<dyn RealtimeSource>,
    identity: watch::Receiver<Session>,
    shutdown_rx: broadcast::Receiver<()>,
    subscription: Option<RealtimeSubscription>,
    backoff: ExponentialBackoff,
    retry_at: Option<Instant>,
}

impl SessionDriver {
    fn new(
        reconciler: UnreadReconciler,
        realtime: Arc<dyn RealtimeSource>,
        identity: watch::Receiver<Session>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let backoff = ExponentialBackoff::new(reconciler.config().realtime_retry.clone());
        Self {
            reconciler,
            realtime,
            identity,
            shutdown_rx,
            subscription: None,
            backoff,
            retry_at: None,
        }
    }

    async fn run(mut self) {
        let mut refresh = self.reconciler.config().refresh_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        info!(
            refresh_secs = ?refresh.as_ref().map(|i| i.period().as_secs()),
            "Messaging session started"
        );

        let initial = self.identity.borrow_and_update().clone();
        self.apply_session(initial).await;

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    break;
                }
                changed = self.identity.changed() => {
                    if changed.is_err() {
                        info!("Identity source closed");
                        break;
                    }
                    let session = self.identity.borrow_and_update().clone();
                    self.apply_session(session).await;
                }
                event = next_event(&mut self.subscription) => {
                    match event {
                        Some(event) => self.reconciler.handle_inbound(event),
                        None => self.on_stream_closed(),
                    }
                }
                _ = wait_until(self.retry_at) => {
                    self.retry_at = None;
                    if self.subscribe().await {
                        // Events may have been missed while disconnected
                        self.spawn_refresh();
                    }
                }
                _ = tick(&mut refresh) => {
                    debug!("Periodic unread refresh");
                    self.spawn_refresh();
                }
            }
        }

        self.subscription = None;
        info!("Messaging session stopped");
    }

    /// Re-initialize for a (possibly) new identity
    async fn apply_session(&mut self, session: Session) {
        if self.reconciler.session().user_id() == session.user_id() && self.is_connected() {
            return;
        }

        // Release the previous user's stream before touching state
        self.subscription = None;
        self.retry_at = None;
        self.backoff.reset();

        if self.reconciler.begin_session(session.clone()) {
            self.spawn_refresh();
        }

        if session.is_logged_in() {
            self.subscribe().await;
        }
    }

    /// Refresh in the background; concurrent refreshes share one request
    fn spawn_refresh(&self) {
        let reconciler = self.reconciler.clone();
        tokio::spawn(async move {
            reconciler.refresh_unread_counts().await;
        });
    }

    fn is_connected(&self) -> bool {
        self.subscription.is_some() || self.retry_at.is_some()
    }

    /// Subscribe for the current user; schedules a retry on failure
    async fn subscribe(&mut self) -> bool {
        let Some(user) = self.reconciler.session().user_id().cloned() else {
            return false;
        };

        match self.realtime.subscribe(&user).await {
            Ok(subscription) => {
                // The identity may have changed while subscribing
                if self.reconciler.session().user_id() != Some(&user) {
                    return false;
                }
                debug!(user = %user.short_id(), "Realtime subscription established");
                self.subscription = Some(subscription);
                self.backoff.reset();
                true
            }
            Err(error) => {
                self.schedule_retry(&user, error);
                false
            }
        }
    }

    fn on_stream_closed(&mut self) {
        self.subscription = None;
        if let Some(user) = self.reconciler.session().user_id().cloned() {
            self.schedule_retry(&user, BackendError::SubscriptionClosed);
        }
    }

    fn schedule_retry(&mut self, user: &UserId, error: BackendError) {
        let delay = self.backoff.advance();
        warn!(
            user = %user.short_id(),
            attempt = self.backoff.attempts(),
            retry_in_ms = delay.as_millis() as u64,
            "Realtime subscription lost"
        );
        self.reconciler
            .report_error(ReconcilerError::new(Operation::Subscribe, error));
        self.retry_at = Some(Instant::now() + delay);
    }
}

async fn next_event(subscription: &mut Option<RealtimeSubscription>) -> Option<InboundMessageEvent> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
