//! Glue between the timer and the log store.
//!
//! The timer knows nothing about prompts. The coordinator opens a log
//! prompt on completion (or on "log work now"), keeps the timer paused while
//! the prompt is open, and resumes or restarts it once the prompt closes.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::Result;
use crate::events::Event;
use crate::log::{LogBackend, LogEntry, LogStore};
use crate::timer::{TimerHandle, TimerState};

/// Why a log prompt was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptReason {
    IntervalCompleted,
    Manual,
}

/// What to do with the timer once the prompt closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterPrompt {
    /// We paused a running timer; resume it.
    Resume,
    /// The interval finished; start a fresh one.
    Restart,
    /// The timer was idle or paused by the user; leave it.
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenPrompt {
    pub reason: PromptReason,
    /// Work time to record with the entry.
    pub time_spent: Option<Duration>,
    after: AfterPrompt,
}

pub struct Coordinator<B: LogBackend> {
    timer: TimerHandle,
    store: LogStore<B>,
    prompt: Option<OpenPrompt>,
}

impl<B: LogBackend> Coordinator<B> {
    pub fn new(timer: TimerHandle, store: LogStore<B>) -> Self {
        Self {
            timer,
            store,
            prompt: None,
        }
    }

    pub fn timer(&self) -> &TimerHandle {
        &self.timer
    }

    pub fn store(&self) -> &LogStore<B> {
        &self.store
    }

    pub fn prompt(&self) -> Option<&OpenPrompt> {
        self.prompt.as_ref()
    }

    /// React to a timer event. Returns the prompt to show, if one was opened.
    pub async fn handle_event(&mut self, event: &Event) -> Result<Option<OpenPrompt>> {
        let Event::TimerCompleted { duration_secs, .. } = event else {
            return Ok(None);
        };
        if self.prompt.is_some() {
            return Ok(None);
        }

        let status = self.timer.status().await?;
        let after = match status.state {
            // Restart policy: the next interval is already counting.
            TimerState::Running => {
                self.timer.pause().await?;
                AfterPrompt::Resume
            }
            TimerState::Completed => AfterPrompt::Restart,
            TimerState::Idle | TimerState::Paused => AfterPrompt::Leave,
        };
        let prompt = OpenPrompt {
            reason: PromptReason::IntervalCompleted,
            time_spent: Some(Duration::from_secs(*duration_secs)),
            after,
        };
        info!(?after, "Interval completed; prompting for log entry");
        self.prompt = Some(prompt);
        Ok(Some(prompt))
    }

    /// Open a prompt on demand. Returns `None` if one is already open.
    pub async fn log_work_now(&mut self) -> Result<Option<OpenPrompt>> {
        if self.prompt.is_some() {
            return Ok(None);
        }

        let status = self.timer.status().await?;
        let elapsed = status.total_secs.saturating_sub(status.remaining_secs);
        let (after, time_spent) = match status.state {
            TimerState::Running => {
                self.timer.pause().await?;
                (AfterPrompt::Resume, Some(elapsed))
            }
            TimerState::Paused => (AfterPrompt::Leave, Some(elapsed)),
            TimerState::Completed => (AfterPrompt::Restart, Some(status.total_secs)),
            TimerState::Idle => (AfterPrompt::Leave, None),
        };
        let prompt = OpenPrompt {
            reason: PromptReason::Manual,
            time_spent: time_spent.map(Duration::from_secs),
            after,
        };
        debug!(?after, "Manual log prompt opened");
        self.prompt = Some(prompt);
        Ok(Some(prompt))
    }

    /// Save the prompt's entry, close it, and resume the timer.
    ///
    /// On error the prompt stays open and the timer stays paused, so the
    /// user can correct the form or retry.
    pub async fn submit(&mut self, project: &str, description: &str) -> Result<LogEntry> {
        let time_spent = self.prompt.and_then(|p| p.time_spent);
        let entry = self.store.create(project, description, time_spent)?;
        self.close().await?;
        Ok(entry)
    }

    /// Close the prompt without saving and resume the timer.
    pub async fn cancel(&mut self) -> Result<()> {
        self.close().await
    }

    async fn close(&mut self) -> Result<()> {
        let Some(prompt) = self.prompt.take() else {
            return Ok(());
        };
        match prompt.after {
            AfterPrompt::Resume => {
                self.timer.resume().await?;
            }
            AfterPrompt::Restart => {
                self.timer.start().await?;
            }
            AfterPrompt::Leave => {}
        }
        debug!(after = ?prompt.after, "Log prompt closed");
        Ok(())
    }
}
