//! Foreground timer loop.
//!
//! Ticks are drawn on one status line. When an interval completes, the
//! configured notification is printed and the user is asked for a project
//! and description on stdin. Single-letter commands control the timer
//! between prompts. Ctrl-C saves the timer state and exits.

use std::io::Write;

use checkpoint_core::timer::{format_remaining, format_time_spent, SystemClock};
use checkpoint_core::{
    Config, Coordinator, CoreError, Database, Event, LogStore, OpenPrompt, PromptReason,
    TimerService,
};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::load_engine;

const HELP: &str = "commands: [s]tart  [p]ause  [r]esume  [x] stop  [l]og now  [q]uit";

#[derive(Args)]
pub struct RunArgs {
    /// Do not start the timer on launch
    #[arg(long)]
    no_start: bool,
}

/// Which field the open prompt is waiting for.
enum Form {
    Project,
    Description { project: String },
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_loop(args))
}

async fn run_loop(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let engine = load_engine(&db, &config, SystemClock);
    let (timer, task) = TimerService::spawn(engine);
    let mut events = timer.subscribe();
    let mut coord = Coordinator::new(timer.clone(), LogStore::open(db));

    println!("{HELP}");
    let status = timer.status().await?;
    if !args.no_start && !status.is_running {
        timer.start().await?;
    } else {
        status_line(&format!("{} ({:?})", status.display, status.state));
    }

    let mut form: Option<Form> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                println!();
                break;
            }

            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Timer events dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                show_event(&event, &config);
                if let Some(prompt) = coord.handle_event(&event).await? {
                    if stdin_open {
                        form = Some(open_form(&prompt));
                    } else {
                        debug!("stdin closed; skipping work log prompt");
                        coord.cancel().await?;
                    }
                }
                if !matches!(event, Event::Tick { .. }) {
                    coord.store().backend().save_timer(&timer.persisted().await?)?;
                }
            }

            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    debug!("stdin closed; timer keeps running until Ctrl-C");
                    stdin_open = false;
                    if form.take().is_some() {
                        coord.cancel().await?;
                    }
                    continue;
                };
                match form.take() {
                    Some(current) => form = fill_form(&mut coord, current, line.trim()).await?,
                    None => {
                        if handle_command(&mut coord, line.trim(), &mut form).await? {
                            break;
                        }
                    }
                }
            }
        }
    }

    let saved = timer.shutdown().await?;
    coord.store().backend().save_timer(&saved)?;
    task.await?;
    debug!(state = ?saved.state, "Timer state saved");
    Ok(())
}

fn show_event(event: &Event, config: &Config) {
    match event {
        Event::Tick { remaining_secs, .. } => {
            status_line(&format_remaining(*remaining_secs as i64));
        }
        Event::TimerStarted { duration_secs, .. } => {
            println!("\nStarted {} interval", format_time_spent(*duration_secs));
        }
        Event::TimerPaused { remaining_secs, .. } => {
            println!("\nPaused at {}", format_remaining(*remaining_secs as i64));
        }
        Event::TimerResumed { remaining_secs, .. } => {
            println!("\nResumed at {}", format_remaining(*remaining_secs as i64));
        }
        Event::TimerStopped { .. } => println!("\nStopped"),
        Event::TimerReset { duration_secs, .. } => {
            println!("\nReset to {}", format_remaining(*duration_secs as i64));
        }
        Event::TimerCompleted { .. } => {
            if config.notifications.enabled {
                println!("\n\x07{}\n{}", config.notifications.title, config.notifications.body);
            }
        }
        Event::StateSnapshot(_) => {}
    }
}

fn status_line(text: &str) {
    print!("\r{text}   ");
    let _ = std::io::stdout().flush();
}

fn open_form(prompt: &OpenPrompt) -> Form {
    let spent = prompt
        .time_spent
        .map(|d| format_time_spent(d.as_secs()))
        .unwrap_or_else(|| "-".into());
    match prompt.reason {
        PromptReason::IntervalCompleted => println!("Interval complete ({spent})."),
        PromptReason::Manual => println!("Logging work ({spent} so far)."),
    }
    ask("Project (blank to skip)");
    Form::Project
}

fn ask(label: &str) {
    print!("{label}: ");
    let _ = std::io::stdout().flush();
}

/// Feed one line into the open prompt. Returns the form state to keep.
async fn fill_form(
    coord: &mut Coordinator<Database>,
    form: Form,
    line: &str,
) -> Result<Option<Form>, CoreError> {
    match form {
        Form::Project if line.is_empty() => {
            coord.cancel().await?;
            println!("Skipped.");
            Ok(None)
        }
        Form::Project => {
            ask("Description");
            Ok(Some(Form::Description {
                project: line.to_string(),
            }))
        }
        Form::Description { project } => match coord.submit(&project, line).await {
            Ok(entry) => {
                println!("Logged {} ({})", entry.project, entry.formatted_time_spent());
                Ok(None)
            }
            Err(CoreError::Validation(e)) => {
                println!("{e}");
                ask("Description");
                Ok(Some(Form::Description { project }))
            }
            Err(CoreError::Persistence(e)) => {
                // Prompt stays open; let the user retry.
                println!("{e}");
                ask("Project (blank to skip)");
                Ok(Some(Form::Project))
            }
            Err(e) => Err(e),
        },
    }
}

/// Run a single-letter timer command. Returns true to quit.
async fn handle_command(
    coord: &mut Coordinator<Database>,
    input: &str,
    form: &mut Option<Form>,
) -> Result<bool, CoreError> {
    let timer = coord.timer().clone();
    match input {
        "s" | "start" => {
            timer.start().await?;
        }
        "p" | "pause" => {
            timer.pause().await?;
        }
        "r" | "resume" => {
            timer.resume().await?;
        }
        "x" | "stop" => {
            timer.stop().await?;
        }
        "l" | "log" => {
            if let Some(prompt) = coord.log_work_now().await? {
                *form = Some(open_form(&prompt));
            }
        }
        "q" | "quit" => return Ok(true),
        "" => {}
        _ => println!("{HELP}"),
    }
    Ok(false)
}
