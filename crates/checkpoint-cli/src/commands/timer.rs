use checkpoint_core::timer::SystemClock;
use checkpoint_core::{Config, Database};
use clap::Subcommand;
use tracing::info;

use super::{load_engine, minutes_to_duration, print_json, selected_interval};

const MAX_RESET_MINUTES: u64 = 24 * 60;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the countdown (or resume it if paused)
    Start,
    /// Pause the countdown
    Pause,
    /// Resume a paused countdown
    Resume,
    /// Stop and re-arm to the full interval
    Stop,
    /// Re-arm to the selected interval, keeping the running/paused state
    Reset {
        /// Custom length in minutes instead of the selected interval (at most a day)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_RESET_MINUTES))]
        minutes: Option<u64>,
    },
    /// Print current timer state as JSON
    Status,
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let mut engine = load_engine(&db, &config, SystemClock);

    // Catch up on time that passed since the last command. Only the
    // command's own result goes to stdout.
    if let Some(completed) = engine.tick() {
        info!(?completed, "Interval completed since last command");
    }

    let event = match action {
        TimerAction::Start => engine.start(),
        TimerAction::Pause => engine.pause(),
        TimerAction::Resume => engine.resume(),
        TimerAction::Stop => engine.stop(),
        TimerAction::Reset { minutes } => {
            let duration = match minutes {
                Some(m) => minutes_to_duration(m),
                None => selected_interval(&db, &config).duration(),
            };
            engine.reset(duration)
        }
        TimerAction::Status => None,
    };

    match event {
        Some(event) => print_json(&event)?,
        None => print_json(&engine.snapshot())?,
    }

    db.save_timer(&engine.persisted())?;
    Ok(())
}
