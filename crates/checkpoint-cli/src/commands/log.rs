use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};
use checkpoint_core::{Config, CoreError, Database, ExportFormat, LogEntry, LogStore};
use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use super::{minutes_to_duration, print_json};

#[derive(Subcommand)]
pub enum LogAction {
    /// Record a work-log entry
    Add {
        /// Project name
        #[arg(long)]
        project: String,
        /// What you worked on
        #[arg(long)]
        description: String,
        /// Time spent in minutes
        #[arg(long)]
        minutes: Option<u64>,
    },
    /// List entries, newest first
    List {
        /// Only entries whose project or description contains this text
        #[arg(long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one entry as JSON
    Show {
        /// Entry ID
        id: Uuid,
    },
    /// Edit an entry; omitted fields keep their current value
    Edit {
        /// Entry ID
        id: Uuid,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// New timestamp (RFC 3339, e.g. 2025-09-01T09:00:00Z)
        #[arg(long)]
        date: Option<DateTime<Utc>>,
        /// Time spent in minutes
        #[arg(long, conflicts_with = "clear_time")]
        minutes: Option<u64>,
        /// Remove the recorded time spent
        #[arg(long)]
        clear_time: bool,
    },
    /// Delete an entry
    Delete {
        /// Entry ID
        id: Uuid,
    },
    /// Delete all entries
    Clear {
        /// Confirm deleting everything
        #[arg(long)]
        yes: bool,
    },
    /// Export all entries
    Export {
        /// csv or json (defaults to export.default_format)
        #[arg(long)]
        format: Option<ExportFormat>,
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Merge entries from a JSON export; entries already present are skipped
    Import {
        /// Path to a JSON export
        path: PathBuf,
    },
}

pub fn run(action: LogAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = LogStore::open(Database::open()?);

    match action {
        LogAction::Add {
            project,
            description,
            minutes,
        } => {
            let entry = store.create(&project, &description, minutes.map(minutes_to_duration))?;
            print_json(&entry)?;
        }
        LogAction::List { search, json } => {
            let entries = store.filter(search.as_deref().unwrap_or(""));
            if json {
                print_json(&entries)?;
            } else if entries.is_empty() {
                println!("No log entries.");
            } else {
                for entry in entries {
                    print_row(entry);
                }
            }
        }
        LogAction::Show { id } => {
            let entry = store.get(id).ok_or(CoreError::NotFound { id })?;
            print_json(entry)?;
        }
        LogAction::Edit {
            id,
            project,
            description,
            date,
            minutes,
            clear_time,
        } => {
            let current = store.get(id).ok_or(CoreError::NotFound { id })?;
            let time_spent = if clear_time {
                None
            } else {
                minutes.map(minutes_to_duration).or(current.time_spent())
            };
            let edited = current.edited(
                project.as_deref().unwrap_or(&current.project),
                description.as_deref().unwrap_or(&current.description),
                date.unwrap_or(current.date),
                time_spent,
            )?;
            let entry = store.update(edited)?;
            print_json(&entry)?;
        }
        LogAction::Delete { id } => {
            if !store.delete(id)? {
                return Err(CoreError::NotFound { id }.into());
            }
            print_json(&json!({ "deleted": id }))?;
        }
        LogAction::Clear { yes } => {
            if !yes {
                return Err(format!(
                    "refusing to delete {} entries without --yes",
                    store.len()
                )
                .into());
            }
            let count = store.len();
            store.delete_all()?;
            print_json(&json!({ "deleted": count }))?;
        }
        LogAction::Export { format, output } => {
            let format = match format {
                Some(format) => format,
                None => Config::load()?.export.default_format,
            };
            let content = match format {
                ExportFormat::Csv => store.export_csv(),
                ExportFormat::Json => store.export_json()?,
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, content)?;
                    eprintln!("Exported {} entries to {}", store.len(), path.display());
                }
                None => {
                    print!("{content}");
                    if !content.ends_with('\n') {
                        println!();
                    }
                }
            }
        }
        LogAction::Import { path } => {
            let text = std::fs::read_to_string(&path)?;
            let imported = store.import_json(&text)?;
            print_json(&json!({ "imported": imported, "total": store.len() }))?;
        }
    }
    Ok(())
}

fn print_row(entry: &LogEntry) {
    let local = entry.date.with_timezone(&Local);
    println!(
        "{}  {:<20}  {:>7}  {}",
        local.format("%Y-%m-%d %H:%M"),
        entry.project,
        entry.formatted_time_spent(),
        entry.description
    );
    println!("    {}", entry.id);
}
