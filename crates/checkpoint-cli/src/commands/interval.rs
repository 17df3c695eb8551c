use checkpoint_core::timer::SystemClock;
use checkpoint_core::{Config, Database};
use clap::Subcommand;
use serde_json::json;

use super::{load_engine, print_json, selected_interval};

#[derive(Subcommand)]
pub enum IntervalAction {
    /// List the available intervals
    List,
    /// Show the selected interval
    Show,
    /// Select an interval by id (e.g. "45min")
    Set {
        /// Interval id
        id: String,
    },
}

pub fn run(action: IntervalAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;

    match action {
        IntervalAction::List => {
            let selected = selected_interval(&db, &config);
            let rows: Vec<_> = config
                .catalog()
                .all()
                .iter()
                .map(|interval| {
                    json!({
                        "id": interval.id,
                        "label": interval.label,
                        "duration_secs": interval.duration_secs,
                        "selected": interval.id == selected.id,
                    })
                })
                .collect();
            print_json(&rows)?;
        }
        IntervalAction::Show => {
            print_json(&selected_interval(&db, &config))?;
        }
        IntervalAction::Set { id } => {
            let catalog = config.catalog();
            let Some(interval) = catalog.get(&id) else {
                let known: Vec<&str> = catalog.all().iter().map(|i| i.id.as_str()).collect();
                return Err(format!("unknown interval: {id} (available: {})", known.join(", ")).into());
            };
            db.save_interval_id(&interval.id)?;

            // The armed timer follows the new selection.
            let mut engine = load_engine(&db, &config, SystemClock);
            engine.tick();
            engine.reset(interval.duration());
            db.save_timer(&engine.persisted())?;

            print_json(interval)?;
        }
    }
    Ok(())
}
