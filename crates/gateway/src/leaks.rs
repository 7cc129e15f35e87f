//! Record of blobs that may have been orphaned.
//!
//! A blob lands here when a post-commit delete fails, when a compensating
//! delete fails, or when a metadata write timed out and the blob could not be
//! safely removed. Nothing reconciles these entries automatically.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// The flow that left a blob behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// One possibly orphaned blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakedBlob {
    pub locator: String,
    pub flow: Flow,
    /// Absent when a create failed before the row had an id.
    pub contact_id: Option<i64>,
    pub error: String,
    pub recorded_at: DateTime<Utc>,
}

/// Bounded, oldest-evicted ledger of [`LeakedBlob`]s.
#[derive(Debug)]
pub struct LeakLedger {
    entries: Mutex<VecDeque<LeakedBlob>>,
    capacity: usize,
}

impl LeakLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
        }
    }

    pub fn record(
        &self,
        locator: &str,
        flow: Flow,
        contact_id: Option<i64>,
        error: impl Into<String>,
    ) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(LeakedBlob {
            locator: locator.to_owned(),
            flow,
            contact_id,
            error: error.into(),
            recorded_at: Utc::now(),
        });
    }

    /// Entries oldest first.
    pub fn entries(&self) -> Vec<LeakedBlob> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let ledger = LeakLedger::new(8);
        ledger.record("memory://contactos/1_a.png", Flow::Update, Some(4), "boom");
        ledger.record("memory://contactos/2_b.png", Flow::Create, None, "boom");
        let entries = ledger.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].locator, "memory://contactos/1_a.png");
        assert_eq!(entries[0].flow, Flow::Update);
        assert_eq!(entries[0].contact_id, Some(4));
        assert_eq!(entries[1].contact_id, None);
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let ledger = LeakLedger::new(2);
        for i in 0..5 {
            ledger.record(&format!("memory://contactos/{i}_a.png"), Flow::Delete, Some(i), "x");
        }
        let ids: Vec<Option<i64>> = ledger.entries().iter().map(|e| e.contact_id).collect();
        assert_eq!(ids, vec![Some(3), Some(4)]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let ledger = LeakLedger::new(0);
        ledger.record("memory://contactos/1_a.png", Flow::Delete, Some(1), "x");
        assert!(ledger.is_empty());
    }

    #[test]
    fn flow_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Flow::Update).unwrap(), "update");
        assert_eq!(Flow::Delete.to_string(), "delete");
    }
}
