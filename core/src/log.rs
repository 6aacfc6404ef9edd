//! Instrumentation of calls made to the Mailin service.
//!
//! # Design
//! `CallLog` is a cheap, cloneable handle to an append-only list of call
//! records. The facade receives one at construction; tests keep a clone to
//! count round-trips. `start_call` appends a record and returns a
//! `CallHandle` naming it, and `end_call` consumes that handle, so several
//! threads sharing one log each finalize their own record. There is no
//! "current call" cursor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::query::{Action, Query};
use crate::response::Response;

/// Outcome of a finished call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub duration: Duration,
    pub success: bool,
    pub error: String,
    pub data: Map<String, Value>,
}

impl CallOutcome {
    /// Duration in milliseconds, rounded to two decimals.
    pub fn duration_ms(&self) -> f64 {
        (self.duration.as_secs_f64() * 100_000.0).round() / 100.0
    }
}

/// One call to the service. `outcome` is `None` while the call is in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub sequence: usize,
    pub action: Action,
    /// The normalized query with the API key masked.
    pub query: Vec<(String, String)>,
    pub started: Instant,
    pub outcome: Option<CallOutcome>,
}

/// Token returned by [`CallLog::start_call`], consumed by [`CallLog::end_call`].
#[derive(Debug)]
#[must_use = "a started call must be ended"]
pub struct CallHandle {
    sequence: usize,
    epoch: u64,
}

impl CallHandle {
    pub fn sequence(&self) -> usize {
        self.sequence
    }
}

#[derive(Debug, Default)]
struct Entries {
    records: Vec<CallRecord>,
    /// Bumped by `clear` so handles from before it are ignored.
    epoch: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Entries>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_call(&self, query: &Query) -> CallHandle {
        let mut entries = self.entries.lock();
        let sequence = entries.records.len();
        let epoch = entries.epoch;
        entries.records.push(CallRecord {
            sequence,
            action: query.action(),
            query: query.redacted(),
            started: Instant::now(),
            outcome: None,
        });
        tracing::debug!(target: "mailin", sequence, action = %query.action(), "call started");
        CallHandle { sequence, epoch }
    }

    pub fn end_call(&self, handle: CallHandle, response: &Response) {
        let mut entries = self.entries.lock();
        if entries.epoch != handle.epoch {
            return;
        }
        let Some(record) = entries.records.get_mut(handle.sequence) else {
            return;
        };
        let outcome = CallOutcome {
            duration: record.started.elapsed(),
            success: response.is_successful(),
            error: response.error_message(),
            data: response.data().clone(),
        };
        tracing::debug!(
            target: "mailin",
            sequence = handle.sequence,
            action = %record.action,
            success = outcome.success,
            duration_ms = outcome.duration_ms(),
            "call finished"
        );
        record.outcome = Some(outcome);
    }

    /// Number of calls started so far.
    pub fn count(&self) -> usize {
        self.entries.lock().records.len()
    }

    /// A snapshot of every record.
    pub fn records(&self) -> Vec<CallRecord> {
        self.entries.lock().records.clone()
    }

    pub fn last(&self) -> Option<CallRecord> {
        self.entries.lock().records.last().cloned()
    }

    /// Success flag of the latest call, `None` if there is none or it has
    /// not finished.
    pub fn last_status(&self) -> Option<bool> {
        self.last_outcome().map(|outcome| outcome.success)
    }

    /// Error message of the latest finished call, or an empty string.
    pub fn last_error(&self) -> String {
        self.last_outcome().map(|outcome| outcome.error).unwrap_or_default()
    }

    /// Response data of the latest finished call, or an empty map.
    pub fn last_data(&self) -> Map<String, Value> {
        self.last_outcome().map(|outcome| outcome.data).unwrap_or_default()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.records.clear();
        entries.epoch += 1;
    }

    fn last_outcome(&self) -> Option<CallOutcome> {
        self.entries.lock().records.last().and_then(|record| record.outcome.clone())
    }
}
