//! Engine and job notifications.
//!
//! Every notification gets a sequence number and a timestamp, is fanned out
//! over a `tokio::sync::broadcast` channel, and is kept in a short history so
//! a page that connects mid-job can replay what it missed.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::ids::JobId;
use crate::media::MediaKind;

/// Events kept for replay.
const HISTORY_LEN: usize = 100;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    // -- Engine lifecycle ----------------------------------------------------
    EngineReady {
        version: Option<String>,
    },
    EngineFailed {
        error: String,
    },

    // -- Job lifecycle -------------------------------------------------------
    JobStarted {
        job_id: JobId,
        kind: MediaKind,
        file_name: String,
    },
    JobProgress {
        job_id: JobId,
        ratio: f64,
        message: String,
    },
    JobSucceeded {
        job_id: JobId,
        file_name: String,
        size: u64,
    },
    JobNoOutput {
        job_id: JobId,
    },
    JobFailed {
        job_id: JobId,
        error: String,
    },
}

impl EventPayload {
    /// Whether this event ends a job.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::JobSucceeded { .. } | Self::JobNoOutput { .. } | Self::JobFailed { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Increases by one per event on a bus, starting at 1.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Fan-out of [`Event`]s plus a bounded replay history.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    history: Mutex<VecDeque<Event>>,
    next_seq: AtomicU64,
}

impl EventBus {
    /// `capacity` bounds how far a slow subscriber may fall behind before it
    /// sees `Lagged`.
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity).0,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_LEN)),
            next_seq: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Stamp `payload`, record it and send it to current subscribers.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = {
            let mut history = self.history.lock();
            // Sequence is assigned under the lock so history stays ordered.
            let event = Event {
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                timestamp: Utc::now(),
                payload,
            };
            history.truncate(HISTORY_LEN - 1);
            history.push_front(event.clone());
            event
        };

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Up to `n` past events, newest first.
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        self.history.lock().iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
