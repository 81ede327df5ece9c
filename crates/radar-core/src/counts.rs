//! Per-conversation unread counters
//!
//! Counters are unsigned, so a count can never go below zero. A counterpart
//! with no entry has zero unread messages; entries are removed rather than
//! stored as zero so that "absent" and "zero" mean the same thing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::identity::CounterpartId;

/// One row returned by the aggregate count endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCountEntry {
    /// The other participant of the conversation
    #[serde(alias = "sender_id")]
    pub counterpart_id: CounterpartId,
    /// Unread messages from that participant
    pub unread_count: u32,
}

impl UnreadCountEntry {
    /// Create a new entry
    pub fn new(counterpart_id: impl Into<CounterpartId>, unread_count: u32) -> Self {
        Self {
            counterpart_id: counterpart_id.into(),
            unread_count,
        }
    }
}

/// Map from counterpart to unread count
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCounts {
    counts: HashMap<CounterpartId, u32>,
}

impl UnreadCounts {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Unread count for a counterpart (zero when absent)
    pub fn get(&self, counterpart: &CounterpartId) -> u32 {
        self.counts.get(counterpart).copied().unwrap_or(0)
    }

    /// Add one unread message for a counterpart and return the new count
    pub fn increment(&mut self, counterpart: &CounterpartId) -> u32 {
        let entry = self.counts.entry(counterpart.clone()).or_insert(0);
        *entry = entry.saturating_add(1);
        *entry
    }

    /// Reset a counterpart to zero
    ///
    /// Returns the count it had before.
    pub fn zero(&mut self, counterpart: &CounterpartId) -> u32 {
        self.counts.remove(counterpart).unwrap_or(0)
    }

    /// Replace every counter with the given authoritative values
    ///
    /// Counterparts missing from `entries` end up at zero. Duplicate rows for
    /// the same counterpart are summed.
    pub fn replace_with<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = UnreadCountEntry>,
    {
        self.counts.clear();
        for entry in entries {
            if entry.unread_count == 0 {
                continue;
            }
            let slot = self.counts.entry(entry.counterpart_id).or_insert(0);
            *slot = slot.saturating_add(entry.unread_count);
        }
    }

    /// Drop all counters
    pub fn clear(&mut self) {
        self.counts.clear();
    }

    /// Sum of all counters
    pub fn total(&self) -> u64 {
        self.counts.values().map(|&c| u64::from(c)).sum()
    }

    /// Number of conversations with unread messages
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Check if nothing is unread
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate over conversations with unread messages
    pub fn iter(&self) -> impl Iterator<Item = (&CounterpartId, u32)> {
        self.counts.iter().map(|(id, &count)| (id, count))
    }

    /// Entries sorted by counterpart, for stable output
    pub fn sorted(&self) -> Vec<UnreadCountEntry> {
        let mut entries: Vec<_> = self
            .counts
            .iter()
            .map(|(id, &count)| UnreadCountEntry::new(id.clone(), count))
            .collect();
        entries.sort_by(|a, b| a.counterpart_id.cmp(&b.counterpart_id));
        entries
    }
}

impl FromIterator<UnreadCountEntry> for UnreadCounts {
    fn from_iter<T: IntoIterator<Item = UnreadCountEntry>>(iter: T) -> Self {
        let mut counts = Self::new();
        counts.replace_with(iter);
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> CounterpartId {
        CounterpartId::new(s)
    }

    #[test]
    fn test_absent_is_zero() {
        let counts = UnreadCounts::new();
        assert_eq!(counts.get(&id("alice")), 0);
        assert_eq!(counts.total(), 0);
        assert!(counts.is_empty());
    }

    #[test]
    fn test_increment_and_zero() {
        let mut counts = UnreadCounts::new();
        assert_eq!(counts.increment(&id("bob")), 1);
        assert_eq!(counts.increment(&id("bob")), 2);
        assert_eq!(counts.total(), 2);

        assert_eq!(counts.zero(&id("bob")), 2);
        assert_eq!(counts.get(&id("bob")), 0);

        // Zeroing twice never underflows
        assert_eq!(counts.zero(&id("bob")), 0);
        assert_eq!(counts.get(&id("bob")), 0);
    }

    #[test]
    fn test_replace_drops_absent_counterparts() {
        let mut counts = UnreadCounts::new();
        for _ in 0..5 {
            counts.increment(&id("carol"));
        }

        counts.replace_with(vec![
            UnreadCountEntry::new("alice", 2),
            UnreadCountEntry::new("bob", 0),
        ]);

        assert_eq!(counts.get(&id("alice")), 2);
        assert_eq!(counts.get(&id("bob")), 0);
        assert_eq!(counts.get(&id("carol")), 0);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn test_duplicate_rows_are_summed() {
        let counts: UnreadCounts = vec![
            UnreadCountEntry::new("alice", 2),
            UnreadCountEntry::new("alice", 1),
        ]
        .into_iter()
        .collect();
        assert_eq!(counts.get(&id("alice")), 3);
    }

    #[test]
    fn test_increment_saturates() {
        let mut counts: UnreadCounts = vec![UnreadCountEntry::new("alice", u32::MAX)]
            .into_iter()
            .collect();
        assert_eq!(counts.increment(&id("alice")), u32::MAX);
    }

    #[test]
    fn test_sorted_output() {
        let counts: UnreadCounts = vec![
            UnreadCountEntry::new("zed", 1),
            UnreadCountEntry::new("amy", 4),
        ]
        .into_iter()
        .collect();
        let sorted = counts.sorted();
        assert_eq!(sorted[0].counterpart_id, id("amy"));
        assert_eq!(sorted[1].counterpart_id, id("zed"));
    }

    #[test]
    fn test_entry_accepts_sender_id_alias() {
        let entry: UnreadCountEntry =
            serde_json::from_str(r#"{"sender_id": "bob", "unread_count": 4}"#).unwrap();
        assert_eq!(entry, UnreadCountEntry::new("bob", 4));
    }
}
