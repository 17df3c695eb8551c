pub mod config;
pub mod interval;
pub mod log;
pub mod run;
pub mod timer;

use std::time::Duration;

use checkpoint_core::timer::{Clock, TimerEngine};
use checkpoint_core::{Config, Database, Interval};
use serde::Serialize;

/// Interval selected with `interval set`, or the configured default.
pub(crate) fn selected_interval(db: &Database, config: &Config) -> Interval {
    let catalog = config.catalog();
    let id = db.load_interval_id(&catalog, &config.timer.interval_id);
    catalog.resolve(&id).clone()
}

/// Restore the saved timer, or build an idle one for the selected interval.
///
/// The configured completion policy always wins over the stored one.
pub(crate) fn load_engine<C: Clock>(db: &Database, config: &Config, clock: C) -> TimerEngine<C> {
    let mut engine = match db.load_timer() {
        Some(saved) => TimerEngine::restore(saved, clock),
        None => TimerEngine::with_clock(selected_interval(db, config).duration(), clock),
    };
    engine.set_policy(config.timer.completion_policy);
    engine
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn minutes_to_duration(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}
