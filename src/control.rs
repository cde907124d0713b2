//! External control surface: start, stop, pause, resume, status.
//!
//! Start/stop manage the single in-process run. Pause and resume go through
//! the persisted scheduler state, so they also affect runs started later by
//! other invocations sharing the same state file.

use crate::browser::{chromium, PageDriver};
use crate::config::AutomationConfig;
use crate::events::{EventBus, RunEvent};
use crate::extract::CardExtractor;
use crate::fallback::FallbackStrategy;
use crate::history::{HistoryStore, NullHistory, SqliteHistory};
use crate::limiter::{DailyProgress, JsonFileStore, RateLimiter};
use crate::matcher::MatchScorer;
use crate::orchestrator::{Progress, RunReport, SessionOrchestrator};
use anyhow::{bail, Result};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Point-in-time view of the automation for status consumers.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub running: bool,
    pub current_posting: Option<String>,
    pub daily: DailyProgress,
}

struct ActiveRun {
    cancel: CancellationToken,
    progress: Arc<Progress>,
    handle: tokio::task::JoinHandle<RunReport>,
}

/// Owns at most one run at a time and the scheduler controls around it.
pub struct Controller {
    config: AutomationConfig,
    events: Arc<EventBus>,
    active: Option<ActiveRun>,
}

impl Controller {
    pub fn new(config: AutomationConfig) -> Self {
        Self {
            config,
            events: Arc::new(EventBus::default()),
            active: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    fn limiter(&self) -> RateLimiter {
        RateLimiter::new(
            self.config.schedule.clone(),
            Box::new(JsonFileStore::new(self.config.state_file())),
        )
    }

    fn history(&self) -> Box<dyn HistoryStore> {
        match SqliteHistory::open(&self.config.history_file()) {
            Ok(store) => Box::new(store),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "history db unavailable, records for this run will be lost");
                Box::new(NullHistory)
            }
        }
    }

    /// Start a run with the default browser acquisition strategies.
    pub fn start(&mut self) -> Result<()> {
        self.start_with(chromium::acquisition_strategies(self.config.headless))
    }

    /// Start a run with caller-provided acquisition strategies.
    pub fn start_with(
        &mut self,
        strategies: Vec<FallbackStrategy<'static, Box<dyn PageDriver>>>,
    ) -> Result<()> {
        if let Some(active) = &self.active {
            if !active.handle.is_finished() {
                bail!("a run is already active");
            }
        }

        let mut orchestrator = SessionOrchestrator::new(
            self.config.clone(),
            self.limiter(),
            MatchScorer::new(),
            Box::new(CardExtractor::new(self.config.site.clone())),
            self.history(),
            self.events.clone(),
        );
        let cancel = orchestrator.cancel_token();
        let progress = orchestrator.progress();
        let handle = tokio::spawn(async move { orchestrator.run(strategies).await });
        self.active = Some(ActiveRun {
            cancel,
            progress,
            handle,
        });
        Ok(())
    }

    /// Cancel the active run (if any) and wait for its report.
    pub async fn stop(&mut self) -> Result<Option<RunReport>> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };
        active.cancel.cancel();
        let report = active.handle.await?;
        Ok(Some(report))
    }

    /// Wait for the active run to finish on its own.
    pub async fn wait(&mut self) -> Result<Option<RunReport>> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };
        let report = active.handle.await?;
        Ok(Some(report))
    }

    /// Pause scheduling for `minutes`, persisted across processes.
    pub fn pause(&self, minutes: i64) {
        self.limiter().pause(minutes);
    }

    /// Clear any scheduling pause.
    pub fn resume(&self) {
        self.limiter().resume();
    }

    pub fn status(&self) -> StatusReport {
        let (running, current_posting) = match &self.active {
            Some(active) if !active.handle.is_finished() => (
                active.progress.running.load(Ordering::SeqCst),
                active.progress.current_posting.lock().unwrap().clone(),
            ),
            _ => (false, None),
        };
        StatusReport {
            running,
            current_posting,
            daily: self.limiter().daily_progress(),
        }
    }
}
