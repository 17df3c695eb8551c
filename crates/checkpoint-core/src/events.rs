use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::log::LogEntry;
use crate::timer::TimerStatus;

/// Every timer state change produces an Event.
/// The timer service broadcasts them; the coordinator and CLI consume them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerStopped {
        at: DateTime<Utc>,
    },
    TimerReset {
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    /// One-second progress update while running.
    Tick {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Remaining time reached zero. Raised once per interval.
    TimerCompleted {
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot(TimerStatus),
}

/// Changes to the log store, delivered to subscribers after a successful persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    Created { entry: LogEntry },
    Updated { entry: LogEntry },
    Deleted { id: Uuid },
    Cleared,
    Imported { count: usize },
}
