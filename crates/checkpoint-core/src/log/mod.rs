//! Work-log entries, their store, and export formats.

mod entry;
pub mod export;
mod store;

pub use entry::{validate_fields, LogEntry};
pub use export::ExportFormat;
pub use store::{LogBackend, LogStore, MemoryBackend, SubscriptionId};
