//! # Checkpoint Core Library
//!
//! Core logic for Checkpoint, an interval timer that reminds you to log what
//! you worked on. Everything the `checkpoint` CLI does goes through this
//! crate.
//!
//! ## Architecture
//!
//! - **Timer**: a wall-clock countdown state machine ([`TimerEngine`]) and an
//!   async driver ([`TimerService`]) that ticks it once per second
//! - **Log**: the ordered work-log collection ([`LogStore`]) with CSV/JSON export
//! - **Coordinator**: opens a log prompt when an interval completes and
//!   pauses the timer around it
//! - **Storage**: SQLite key-value persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: countdown state machine
//! - [`LogStore`]: work-log entries, persisted through a [`LogBackend`]
//! - [`Database`]: SQLite backend for entries, interval choice and timer state
//! - [`Config`]: application configuration management

pub mod coordinator;
pub mod error;
pub mod events;
pub mod interval;
pub mod log;
pub mod storage;
pub mod timer;

pub use coordinator::{Coordinator, OpenPrompt, PromptReason};
pub use error::{
    ConfigError, CoreError, DatabaseError, DecodingError, PersistenceError, ValidationError,
};
pub use events::{Event, StoreEvent};
pub use interval::{Interval, IntervalCatalog};
pub use log::{ExportFormat, LogBackend, LogEntry, LogStore, MemoryBackend};
pub use storage::{Config, Database};
pub use timer::{
    CompletionPolicy, PersistedTimer, TimerEngine, TimerHandle, TimerService, TimerState,
    TimerStatus,
};
