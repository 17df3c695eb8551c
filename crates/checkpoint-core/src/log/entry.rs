use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::timer::format_time_spent;

/// One record of work performed.
///
/// Entries are values: editing produces a replacement with the same `id`.
/// The serialized form (camelCase keys, `timeSpent` in seconds) is used
/// both for storage and for JSON export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub project: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<u64>,
}

impl LogEntry {
    /// Validate the form fields and build a new entry stamped with the
    /// current time.
    pub fn new(
        project: &str,
        description: &str,
        time_spent: Option<Duration>,
    ) -> Result<Self, ValidationError> {
        Self::with_date(project, description, Utc::now(), time_spent)
    }

    pub fn with_date(
        project: &str,
        description: &str,
        date: DateTime<Utc>,
        time_spent: Option<Duration>,
    ) -> Result<Self, ValidationError> {
        let (project, description) = validate_fields(project, description)?;
        Ok(Self {
            id: Uuid::new_v4(),
            date,
            project,
            description,
            time_spent: time_spent.map(|d| d.as_secs()),
        })
    }

    /// Replacement entry carrying the same id.
    pub fn edited(
        &self,
        project: &str,
        description: &str,
        date: DateTime<Utc>,
        time_spent: Option<Duration>,
    ) -> Result<Self, ValidationError> {
        let (project, description) = validate_fields(project, description)?;
        Ok(Self {
            id: self.id,
            date,
            project,
            description,
            time_spent: time_spent.map(|d| d.as_secs()),
        })
    }

    pub fn time_spent(&self) -> Option<Duration> {
        self.time_spent.map(Duration::from_secs)
    }

    pub fn time_spent_minutes(&self) -> Option<u64> {
        self.time_spent.map(|secs| secs / 60)
    }

    pub fn formatted_time_spent(&self) -> String {
        self.time_spent
            .map(format_time_spent)
            .unwrap_or_else(|| "-".into())
    }

    /// Case-insensitive substring match on project or description.
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.project.to_lowercase().contains(needle_lower)
            || self.description.to_lowercase().contains(needle_lower)
    }
}

/// Trim both fields; the project is checked first.
pub fn validate_fields(
    project: &str,
    description: &str,
) -> Result<(String, String), ValidationError> {
    let project = project.trim();
    if project.is_empty() {
        return Err(ValidationError::EmptyProject);
    }
    let description = description.trim();
    if description.is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    Ok((project.to_string(), description.to_string()))
}
