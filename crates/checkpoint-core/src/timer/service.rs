//! Async driver for [`TimerEngine`].
//!
//! A single tokio task owns the engine. Callers talk to it through a
//! cloneable [`TimerHandle`] (commands over mpsc, replies over oneshot) and
//! observe it through a broadcast channel of [`Event`]s. Dropping a
//! subscription receiver unsubscribes.
//!
//! The 1 Hz ticker only exists while the engine is running. Every
//! transition replaces or drops it, and commands are polled before ticks,
//! so a pause/stop/reset always cancels the pending tick before it fires.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, trace};

use super::clock::Clock;
use super::engine::{CompletionPolicy, PersistedTimer, TimerEngine, TimerState, TimerStatus};
use crate::error::{CoreError, Result};
use crate::events::Event;

const TICK_PERIOD: Duration = Duration::from_secs(1);
const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 64;

enum Command {
    Start(oneshot::Sender<Option<Event>>),
    Pause(oneshot::Sender<Option<Event>>),
    Resume(oneshot::Sender<Option<Event>>),
    Stop(oneshot::Sender<Option<Event>>),
    Reset(Duration, oneshot::Sender<Option<Event>>),
    SetPolicy(CompletionPolicy, oneshot::Sender<()>),
    Status(oneshot::Sender<TimerStatus>),
    Persisted(oneshot::Sender<PersistedTimer>),
    Shutdown(oneshot::Sender<PersistedTimer>),
}

/// Handle to a running timer task.
#[derive(Clone)]
pub struct TimerHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<Event>,
}

/// Spawns timer tasks.
pub struct TimerService;

impl TimerService {
    /// Move `engine` into a new task on the current tokio runtime.
    ///
    /// A restored engine that is already running starts ticking immediately.
    pub fn spawn<C: Clock>(engine: TimerEngine<C>) -> (TimerHandle, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let task = tokio::spawn(run(engine, cmd_rx, event_tx.clone()));
        (
            TimerHandle {
                commands: cmd_tx,
                events: event_tx,
            },
            task,
        )
    }
}

impl TimerHandle {
    /// Register for timer events. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub async fn start(&self) -> Result<Option<Event>> {
        self.request(Command::Start).await
    }

    pub async fn pause(&self) -> Result<Option<Event>> {
        self.request(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<Option<Event>> {
        self.request(Command::Resume).await
    }

    pub async fn stop(&self) -> Result<Option<Event>> {
        self.request(Command::Stop).await
    }

    pub async fn reset(&self, duration: Duration) -> Result<Option<Event>> {
        self.request(|tx| Command::Reset(duration, tx)).await
    }

    pub async fn set_policy(&self, policy: CompletionPolicy) -> Result<()> {
        self.request(|tx| Command::SetPolicy(policy, tx)).await
    }

    pub async fn status(&self) -> Result<TimerStatus> {
        self.request(Command::Status).await
    }

    pub async fn persisted(&self) -> Result<PersistedTimer> {
        self.request(Command::Persisted).await
    }

    /// Stop the task and return the final engine state for persistence.
    pub async fn shutdown(&self) -> Result<PersistedTimer> {
        self.request(Command::Shutdown).await
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| CoreError::TimerUnavailable)?;
        rx.await.map_err(|_| CoreError::TimerUnavailable)
    }
}

async fn run<C: Clock>(
    mut engine: TimerEngine<C>,
    mut commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<Event>,
) {
    let mut ticker = if engine.state() == TimerState::Running {
        Some(arm_ticker())
    } else {
        None
    };

    loop {
        tokio::select! {
            biased;

            cmd = commands.recv() => {
                let Some(cmd) = cmd else {
                    debug!("All timer handles dropped; stopping timer task");
                    break;
                };
                let transition = match cmd {
                    Command::Start(reply) => Some((reply, engine.start())),
                    Command::Pause(reply) => Some((reply, engine.pause())),
                    Command::Resume(reply) => Some((reply, engine.resume())),
                    Command::Stop(reply) => Some((reply, engine.stop())),
                    Command::Reset(duration, reply) => Some((reply, engine.reset(duration))),
                    Command::SetPolicy(policy, reply) => {
                        engine.set_policy(policy);
                        let _ = reply.send(());
                        None
                    }
                    Command::Status(reply) => {
                        let _ = reply.send(engine.status());
                        None
                    }
                    Command::Persisted(reply) => {
                        let _ = reply.send(engine.persisted());
                        None
                    }
                    Command::Shutdown(reply) => {
                        debug!("Timer task shutting down");
                        let _ = reply.send(engine.persisted());
                        break;
                    }
                };

                if let Some((reply, event)) = transition {
                    if let Some(event) = &event {
                        // Any transition cancels the pending tick.
                        ticker = if engine.is_running() { Some(arm_ticker()) } else { None };
                        let _ = events.send(event.clone());
                    }
                    let _ = reply.send(event);
                }
            }

            _ = next_tick(&mut ticker) => {
                match engine.tick() {
                    Some(completed) => {
                        let _ = events.send(Event::Tick { remaining_secs: 0, at: Utc::now() });
                        let _ = events.send(completed);
                        if !engine.is_running() {
                            ticker = None;
                        }
                    }
                    None => {
                        let remaining_secs = engine.remaining_secs();
                        trace!(remaining_secs, "Tick");
                        let _ = events.send(Event::Tick { remaining_secs, at: Utc::now() });
                    }
                }
            }
        }
    }
}

fn arm_ticker() -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
