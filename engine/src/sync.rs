//! Sync reconciliation loop.
//!
//! The store does not talk to any remote system. A [`SyncTarget`] supplied
//! by the caller pushes records; this module drives one pass of the loop:
//!
//! 1. Collect pending records, ordered by key
//! 2. Push each one to the target
//! 3. On success, acknowledge the pushed version
//! 4. On failure, record the error and leave the record pending
//!
//! Retrying is the caller's concern: failed and superseded records are
//! simply picked up again by the next pass.

use crate::{Collection, Record, RecordKey};
use serde::Serialize;
use std::fmt::Display;

/// Destination for pending records.
pub trait SyncTarget {
    type Error: Display;

    /// Push one record to the remote system.
    fn push(&mut self, record: &Record) -> Result<(), Self::Error>;
}

impl<F, E> SyncTarget for F
where
    F: FnMut(&Record) -> Result<(), E>,
    E: Display,
{
    type Error = E;

    fn push(&mut self, record: &Record) -> Result<(), E> {
        self(record)
    }
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Pushed and acknowledged
    pub synced: Vec<RecordKey>,
    /// Push failed; error recorded, record still pending
    pub failed: Vec<RecordKey>,
    /// Pushed, but rewritten during the push; the newer version stays pending
    pub superseded: Vec<RecordKey>,
    /// Pushed, but removed during the push; nothing is left pending
    pub removed: Vec<RecordKey>,
}

impl SyncReport {
    /// Number of records pushed in this pass.
    pub fn attempted(&self) -> usize {
        self.synced.len() + self.failed.len() + self.superseded.len() + self.removed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.superseded.is_empty()
    }
}

impl Collection {
    /// Run one reconciliation pass against `target`.
    pub fn sync_with<T: SyncTarget>(&self, target: &mut T) -> SyncReport {
        let mut report = SyncReport::default();

        for (key, record) in self.pending_entries() {
            match target.push(&record) {
                Ok(()) => {
                    if self.mark_synced_version(&key, record.version) {
                        report.synced.push(key);
                    } else if self.get(&key).is_none() {
                        report.removed.push(key);
                    } else {
                        report.superseded.push(key);
                    }
                }
                Err(e) => {
                    self.mark_sync_failed(&key, e.to_string());
                    report.failed.push(key);
                }
            }
        }

        tracing::info!(
            synced = report.synced.len(),
            failed = report.failed.len(),
            superseded = report.superseded.len(),
            removed = report.removed.len(),
            "sync pass complete"
        );
        report
    }
}
