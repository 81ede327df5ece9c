//! Integration tests for UnreadReconciler
//!
//! Exercises the counter state machine against the in-memory backend:
//! optimistic increments, active-thread suppression, read zeroing,
//! authoritative refresh, coalescing, and failure reporting.

use std::sync::Arc;

use radar_core::{
    BackendError, CounterpartId, InboundMessageEvent, MockBackend, MockCall, Operation,
    RecordingReporter, Session, UnreadCountEntry,
};
use radar_messaging::{ReconcilerConfig, UnreadEvent, UnreadReconciler};

const ME: &str = "me";

struct Harness {
    backend: Arc<MockBackend>,
    reporter: Arc<RecordingReporter>,
    reconciler: UnreadReconciler,
}

impl Harness {
    fn new(counts: Vec<UnreadCountEntry>) -> Self {
        let backend = Arc::new(MockBackend::with_counts(counts));
        let reporter = Arc::new(RecordingReporter::new());
        let reconciler = UnreadReconciler::new(
            backend.clone(),
            reporter.clone(),
            ReconcilerConfig::default(),
        );
        Self {
            backend,
            reporter,
            reconciler,
        }
    }

    /// Harness already signed in as `ME`
    async fn signed_in(counts: Vec<UnreadCountEntry>) -> Self {
        let h = Self::new(counts);
        h.reconciler.set_session(Session::logged_in(ME)).await;
        h.backend.clear_calls();
        h
    }

    fn count(&self, who: &str) -> u32 {
        self.reconciler.unread_count(&CounterpartId::new(who))
    }

    fn inbound(&self, from: &str) {
        self.reconciler
            .handle_inbound(InboundMessageEvent::new(from, ME));
    }

    fn assert_total_consistent(&self) {
        let snapshot = self.reconciler.snapshot();
        let sum: u64 = snapshot.iter().map(|(_, c)| u64::from(c)).sum();
        assert_eq!(self.reconciler.total_unread(), sum);
    }
}

/// Let spawned receipt tasks run
async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

fn id(s: &str) -> CounterpartId {
    CounterpartId::new(s)
}

#[tokio::test]
async fn test_initial_refresh_populates_counts() {
    let h = Harness::signed_in(vec![UnreadCountEntry::new("alice", 3)]).await;

    assert_eq!(h.count("alice"), 3);
    assert_eq!(h.reconciler.total_unread(), 3);
    assert!(h.reconciler.is_ready());
}

#[tokio::test]
async fn test_inbound_increments_by_one() {
    let h = Harness::signed_in(vec![]).await;

    h.inbound("bob");
    assert_eq!(h.count("bob"), 1);

    h.inbound("bob");
    assert_eq!(h.count("bob"), 2);
    h.assert_total_consistent();

    settle().await;
    assert_eq!(h.backend.delivered_calls(), vec![id("bob"), id("bob")]);
    assert!(h.backend.read_calls().is_empty());
}

#[tokio::test]
async fn test_duplicate_delivery_counts_twice_until_refresh() {
    let h = Harness::signed_in(vec![]).await;
    let event = InboundMessageEvent::new("bob", ME).with_id("msg-1");

    h.reconciler.handle_inbound(event.clone());
    h.reconciler.handle_inbound(event);
    assert_eq!(h.count("bob"), 2);

    h.backend.set_counts(vec![UnreadCountEntry::new("bob", 1)]);
    h.reconciler.refresh_unread_counts().await;
    assert_eq!(h.count("bob"), 1);
}

#[tokio::test]
async fn test_active_conversation_is_read_immediately() {
    let h = Harness::signed_in(vec![UnreadCountEntry::new("bob", 4)]).await;
    h.reconciler.set_active_conversation(Some(id("bob")));

    h.inbound("bob");
    assert_eq!(h.count("bob"), 0);

    settle().await;
    assert_eq!(
        h.backend.calls(),
        vec![MockCall::MarkDelivered(id("bob")), MockCall::MarkRead(id("bob"))]
    );
}

#[tokio::test]
async fn test_active_thread_stays_zero_when_mark_read_fails() {
    let h = Harness::signed_in(vec![]).await;
    h.backend
        .fail_mark_read(Some(BackendError::Network("offline".into())));
    h.reconciler.set_active_conversation(Some(id("bob")));

    h.inbound("bob");
    settle().await;

    assert_eq!(h.count("bob"), 0);
    assert_eq!(h.reporter.count(Operation::MarkRead), 1);
}

#[tokio::test]
async fn test_inbound_from_other_thread_while_one_is_active() {
    let h = Harness::signed_in(vec![]).await;
    h.reconciler.set_active_conversation(Some(id("bob")));

    h.inbound("carol");
    settle().await;

    assert_eq!(h.count("carol"), 1);
    assert!(h.backend.read_calls().is_empty());
}

#[tokio::test]
async fn test_self_sent_messages_never_count() {
    let h = Harness::signed_in(vec![UnreadCountEntry::new("alice", 1)]).await;

    h.reconciler
        .handle_inbound(InboundMessageEvent::new(ME, ME));
    settle().await;

    assert_eq!(h.reconciler.total_unread(), 1);
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn test_mark_read_zeroes_on_success() {
    let h = Harness::signed_in(vec![UnreadCountEntry::new("alice", 3)]).await;

    h.reconciler.mark_conversation_read(&id("alice")).await;

    assert_eq!(h.count("alice"), 0);
    assert_eq!(h.backend.read_calls(), vec![id("alice")]);
    assert!(h.reporter.is_empty());
}

#[tokio::test]
async fn test_mark_read_failure_keeps_badge() {
    let h = Harness::signed_in(vec![UnreadCountEntry::new("alice", 3)]).await;
    h.backend
        .fail_mark_read(Some(BackendError::Network("timeout".into())));

    h.reconciler.mark_conversation_read(&id("alice")).await;

    assert_eq!(h.count("alice"), 3);
    let errors = h.reporter.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].operation, Operation::MarkRead);
    assert_eq!(errors[0].counterpart, Some(id("alice")));
}

#[tokio::test]
async fn test_mark_read_on_zero_stays_zero() {
    let h = Harness::signed_in(vec![]).await;

    h.reconciler.mark_conversation_read(&id("nobody")).await;
    h.reconciler.mark_conversation_read(&id("nobody")).await;

    assert_eq!(h.count("nobody"), 0);
    assert_eq!(h.reconciler.total_unread(), 0);
}

#[tokio::test]
async fn test_mark_delivered_does_not_touch_counts() {
    let h = Harness::signed_in(vec![UnreadCountEntry::new("alice", 2)]).await;

    h.reconciler.mark_conversation_delivered(&id("alice")).await;
    assert_eq!(h.count("alice"), 2);

    h.backend
        .fail_mark_delivered(Some(BackendError::Http {
            status: 500,
            message: "boom".into(),
        }));
    h.reconciler.mark_conversation_delivered(&id("alice")).await;

    assert_eq!(h.count("alice"), 2);
    assert_eq!(h.reporter.count(Operation::MarkDelivered), 1);
}

#[tokio::test]
async fn test_receipts_are_skipped_while_signed_out() {
    let h = Harness::new(vec![]);
    h.reconciler.set_session(Session::LoggedOut).await;

    h.reconciler.mark_conversation_delivered(&id("alice")).await;
    h.reconciler.mark_conversation_read(&id("alice")).await;

    assert!(h.backend.calls().is_empty());
    assert!(h.reporter.is_empty());
}

#[tokio::test]
async fn test_refresh_replaces_instead_of_merging() {
    let h = Harness::signed_in(vec![]).await;
    for _ in 0..5 {
        h.inbound("carol");
    }
    assert_eq!(h.count("carol"), 5);

    h.backend.set_counts(vec![
        UnreadCountEntry::new("alice", 2),
        UnreadCountEntry::new("bob", 0),
    ]);
    h.reconciler.refresh_unread_counts().await;

    assert_eq!(h.count("alice"), 2);
    assert_eq!(h.count("bob"), 0);
    assert_eq!(h.count("carol"), 0);
    h.assert_total_consistent();
}

#[tokio::test]
async fn test_refresh_failure_keeps_previous_counts_and_marks_ready() {
    let h = Harness::new(vec![UnreadCountEntry::new("alice", 1)]);
    h.backend
        .fail_fetch(Some(BackendError::Network("offline".into())));

    h.reconciler.set_session(Session::logged_in(ME)).await;

    assert!(h.reconciler.is_ready());
    assert_eq!(h.reconciler.total_unread(), 0);
    assert_eq!(h.reporter.count(Operation::Refresh), 1);

    // Stale-but-available after a later failure
    h.backend.fail_fetch(None);
    h.reconciler.refresh_unread_counts().await;
    assert_eq!(h.count("alice"), 1);

    h.backend
        .fail_fetch(Some(BackendError::Network("offline".into())));
    h.reconciler.refresh_unread_counts().await;
    assert_eq!(h.count("alice"), 1);
    assert_eq!(h.reporter.count(Operation::Refresh), 2);
}

#[tokio::test]
async fn test_setup_required_is_reported_distinctly() {
    let h = Harness::new(vec![]);
    h.backend.fail_fetch(Some(BackendError::SetupRequired {
        function: "get_unread_message_counts".into(),
    }));

    h.reconciler.set_session(Session::logged_in(ME)).await;

    let errors = h.reporter.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_setup_required());
}

#[tokio::test]
async fn test_concurrent_refreshes_share_one_request() {
    let h = Harness::signed_in(vec![UnreadCountEntry::new("alice", 7)]).await;
    let before = h.backend.fetch_calls();
    let gate = h.backend.pause_fetches();

    let opener = async {
        h.backend.wait_for_fetches(before + 1).await;
        tokio::task::yield_now().await;
        gate.open();
    };

    tokio::join!(
        h.reconciler.refresh_unread_counts(),
        h.reconciler.refresh_unread_counts(),
        h.reconciler.refresh_unread_counts(),
        opener,
    );

    assert_eq!(h.backend.fetch_calls(), before + 1);
    assert_eq!(h.count("alice"), 7);
}

#[tokio::test]
async fn test_sequential_refreshes_each_fetch() {
    let h = Harness::signed_in(vec![]).await;
    let before = h.backend.fetch_calls();

    h.reconciler.refresh_unread_counts().await;
    h.reconciler.refresh_unread_counts().await;

    assert_eq!(h.backend.fetch_calls(), before + 2);
}

#[tokio::test]
async fn test_refresh_overwrites_increments_applied_while_in_flight() {
    let h = Harness::signed_in(vec![]).await;
    let before = h.backend.fetch_calls();
    let gate = h.backend.pause_fetches();

    let racer = async {
        h.backend.wait_for_fetches(before + 1).await;
        h.inbound("bob");
        assert_eq!(h.count("bob"), 1);
        gate.open();
    };

    tokio::join!(h.reconciler.refresh_unread_counts(), racer);

    // Server truth (nothing unread) wins
    assert_eq!(h.count("bob"), 0);
}

#[tokio::test]
async fn test_refresh_for_previous_session_is_discarded() {
    let h = Harness::signed_in(vec![UnreadCountEntry::new("alice", 9)]).await;
    let before = h.backend.fetch_calls();
    let gate = h.backend.pause_fetches();

    let sign_out = async {
        h.backend.wait_for_fetches(before + 1).await;
        h.reconciler.set_session(Session::LoggedOut).await;
        gate.open();
    };

    tokio::join!(h.reconciler.refresh_unread_counts(), sign_out);

    assert_eq!(h.reconciler.total_unread(), 0);
    assert!(h.reconciler.snapshot().is_empty());
}

#[tokio::test]
async fn test_sign_out_resets_and_ignores_events() {
    let h = Harness::signed_in(vec![UnreadCountEntry::new("alice", 2)]).await;
    h.reconciler.set_active_conversation(Some(id("alice")));

    h.reconciler.set_session(Session::LoggedOut).await;

    assert_eq!(h.reconciler.total_unread(), 0);
    assert_eq!(h.reconciler.active_conversation(), None);

    h.inbound("bob");
    settle().await;
    assert_eq!(h.reconciler.total_unread(), 0);
    assert!(h.backend.calls().is_empty());

    // Nothing is processed until a new identity refreshes
    h.backend.set_counts(vec![UnreadCountEntry::new("dave", 1)]);
    h.reconciler.set_session(Session::logged_in("someone-else")).await;
    assert_eq!(h.count("dave"), 1);
}

#[tokio::test]
async fn test_user_switch_discards_previous_counts() {
    let h = Harness::signed_in(vec![]).await;
    h.inbound("bob");
    assert_eq!(h.count("bob"), 1);

    h.reconciler.set_session(Session::logged_in("other")).await;

    assert_eq!(h.count("bob"), 0);
    assert!(h.reconciler.is_ready());
}

#[tokio::test]
async fn test_ready_only_after_first_refresh() {
    let h = Harness::new(vec![]);
    let gate = h.backend.pause_fetches();

    let check = async {
        h.backend.wait_for_fetches(1).await;
        assert!(!h.reconciler.is_ready());
        gate.open();
    };

    tokio::join!(h.reconciler.set_session(Session::logged_in(ME)), check);
    assert!(h.reconciler.is_ready());
}

#[tokio::test]
async fn test_counts_changed_notifications_track_total() {
    let h = Harness::signed_in(vec![]).await;
    let mut rx = h.reconciler.subscribe();

    h.inbound("bob");
    h.inbound("carol");
    h.reconciler.mark_conversation_read(&id("bob")).await;

    assert_eq!(rx.recv().await.unwrap(), UnreadEvent::CountsChanged { total: 1 });
    assert_eq!(rx.recv().await.unwrap(), UnreadEvent::CountsChanged { total: 2 });
    assert_eq!(rx.recv().await.unwrap(), UnreadEvent::CountsChanged { total: 1 });
}
