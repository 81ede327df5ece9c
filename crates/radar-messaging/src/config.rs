//! Configuration for the unread-count reconciler

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for an [`UnreadReconciler`](crate::UnreadReconciler) and
/// its session driver
///
/// Durations are written as whole seconds in config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Period of the authoritative refresh while a session runs
    ///
    /// `None` disables polling; counts are then only refreshed on login,
    /// identity change, and realtime reconnect.
    #[serde(with = "option_secs", rename = "refresh_interval_secs")]
    pub refresh_interval: Option<Duration>,
    /// Capacity of the change-notification broadcast channel
    pub event_channel_capacity: usize,
    /// Backoff between realtime resubscription attempts
    pub realtime_retry: BackoffConfig,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Some(Duration::from_secs(60)),
            event_channel_capacity: 256,
            realtime_retry: BackoffConfig::default(),
        }
    }
}

impl ReconcilerConfig {
    /// Set the periodic refresh interval
    pub fn with_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the change-notification channel capacity
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Set the realtime resubscription backoff
    pub fn with_realtime_retry(mut self, retry: BackoffConfig) -> Self {
        self.realtime_retry = retry;
        self
    }
}

/// Exponential backoff parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// First delay
    #[serde(with = "secs", rename = "initial_secs")]
    pub initial: Duration,
    /// Delay clamp
    #[serde(with = "secs", rename = "max_secs")]
    pub max: Duration,
    /// Multiplier applied after each attempt
    pub factor: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 2,
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod option_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    // Zero disables, same as leaving the key out
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.filter(|&s| s > 0).map(Duration::from_secs))
    }
}
