mod clock;
mod engine;
mod format;
mod service;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use engine::{CompletionPolicy, PersistedTimer, TimerEngine, TimerState, TimerStatus};
pub use format::{format_remaining, format_time_spent};
pub use service::{TimerHandle, TimerService};
