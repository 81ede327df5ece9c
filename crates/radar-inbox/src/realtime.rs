//! Realtime source for polling-only operation

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use radar_core::{
    BackendResult, InboundMessageEvent, RealtimeSource, RealtimeSubscription, UserId,
};
use tokio::sync::mpsc;
use tracing::debug;

/// A [`RealtimeSource`] whose streams stay open but never deliver
///
/// Used when no push channel is configured: the session driver then
/// relies on its periodic refresh alone.
#[derive(Debug, Default)]
pub struct PollingOnly {
    open: Arc<Mutex<Vec<(u64, mpsc::Sender<InboundMessageEvent>)>>>,
    next_id: Mutex<u64>,
}

impl PollingOnly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of streams currently held open
    pub fn open_streams(&self) -> usize {
        self.open.lock().len()
    }
}

#[async_trait]
impl RealtimeSource for PollingOnly {
    async fn subscribe(&self, user: &UserId) -> BackendResult<RealtimeSubscription> {
        let (tx, rx) = mpsc::channel(1);
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            *next
        };
        self.open.lock().push((id, tx));
        debug!(user = %user.short_id(), "Polling-only subscription opened");

        let open = self.open.clone();
        Ok(RealtimeSubscription::new(rx).on_close(move || {
            open.lock().retain(|(stream, _)| *stream != id);
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_stream_stays_open_until_dropped() {
        let source = PollingOnly::new();
        let mut subscription = source.subscribe(&UserId::new("me")).await.unwrap();
        assert_eq!(source.open_streams(), 1);

        let next = tokio::time::timeout(Duration::from_millis(20), subscription.recv()).await;
        assert!(next.is_err(), "stream should neither deliver nor close");

        drop(subscription);
        assert_eq!(source.open_streams(), 0);
    }
}
