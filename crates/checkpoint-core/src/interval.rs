//! Catalog of selectable work-session lengths.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_INTERVAL_ID: &str = "30min";

/// A named session length the user can pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub id: String,
    pub label: String,
    pub duration_secs: u64,
}

impl Interval {
    fn minutes(id: &str, label: &str, minutes: u64) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            duration_secs: minutes.saturating_mul(60),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

/// Fixed list of intervals with one designated default.
#[derive(Debug, Clone)]
pub struct IntervalCatalog {
    intervals: Vec<Interval>,
}

impl IntervalCatalog {
    /// Standard catalog. `include_debug` prepends the 1-minute option.
    pub fn new(include_debug: bool) -> Self {
        let mut intervals = vec![
            Interval::minutes("15min", "15 Minutes", 15),
            Interval::minutes("30min", "30 Minutes", 30),
            Interval::minutes("45min", "45 Minutes", 45),
            Interval::minutes("60min", "1 Hour", 60),
            Interval::minutes("90min", "90 Minutes", 90),
            Interval::minutes("120min", "2 Hours", 120),
        ];
        if include_debug {
            intervals.insert(0, Interval::minutes("1min", "1 Minute", 1));
        }
        Self { intervals }
    }

    pub fn all(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn get(&self, id: &str) -> Option<&Interval> {
        self.intervals.iter().find(|i| i.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn default_interval(&self) -> &Interval {
        self.get(DEFAULT_INTERVAL_ID).unwrap_or(&self.intervals[0])
    }

    /// Look up by id, falling back to the default for unknown ids.
    pub fn resolve(&self, id: &str) -> &Interval {
        self.get(id).unwrap_or_else(|| self.default_interval())
    }
}

impl Default for IntervalCatalog {
    fn default() -> Self {
        Self::new(cfg!(debug_assertions))
    }
}
