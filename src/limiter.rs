//! Persisted rate limiter and scheduling gate.
//!
//! State is reloaded from the store before every decision, so an external
//! `pause`/`resume` (or a concurrent process, if the caller allows one) is
//! picked up immediately. A date mismatch against the wall clock is the only
//! reset path. Recording persists immediately after the increment: a crash
//! between send and persist may under-count, never over-count — acceptable
//! for an advisory limiter.

use crate::config::ScheduleConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

/// Durable scheduler state, one JSON document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulerState {
    pub date: NaiveDate,
    pub applications_sent_today: u32,
    pub last_application_time: Option<DateTime<Local>>,
    pub session_start_time: Option<DateTime<Local>>,
    pub paused_until: Option<DateTime<Local>>,
}

impl SchedulerState {
    fn fresh(date: NaiveDate) -> Self {
        Self {
            date,
            applications_sent_today: 0,
            last_application_time: None,
            session_start_time: None,
            paused_until: None,
        }
    }
}

/// Storage seam for the scheduler state.
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<Option<SchedulerState>>;
    fn save(&self, state: &SchedulerState) -> Result<()>;
}

/// JSON file store with atomic replace (write temp, rename over).
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<SchedulerState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read state: {}", self.path.display()))?;
        let state = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse state: {}", self.path.display()))?;
        Ok(Some(state))
    }

    fn save(&self, state: &SchedulerState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write state: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace state: {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Option<SchedulerState>>,
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<SchedulerState>> {
        Ok(self.inner.lock().unwrap().clone())
    }

    fn save(&self, state: &SchedulerState) -> Result<()> {
        *self.inner.lock().unwrap() = Some(state.clone());
        Ok(())
    }
}

/// Outcome of a `can_act_now` check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: String,
}

impl Decision {
    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }

    fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }
}

/// Daily progress snapshot for status consumers.
#[derive(Clone, Debug, Serialize)]
pub struct DailyProgress {
    pub sent: u32,
    pub daily_limit: u32,
    pub remaining: u32,
    pub can_act_now: bool,
    pub reason: String,
    pub next_optimal_time: Option<DateTime<Local>>,
    pub paused_until: Option<DateTime<Local>>,
    pub session_minutes: i64,
}

/// The persisted scheduler gate.
pub struct RateLimiter {
    config: ScheduleConfig,
    store: Box<dyn StateStore>,
    state: SchedulerState,
}

impl RateLimiter {
    pub fn new(config: ScheduleConfig, store: Box<dyn StateStore>) -> Self {
        Self {
            config,
            store,
            state: SchedulerState::fresh(Local::now().date_naive()),
        }
    }

    /// Reload from the store, resetting on date rollover. Persistence
    /// failures downgrade to a warning; the in-memory state still governs
    /// the current run.
    fn reload(&mut self, now: DateTime<Local>) {
        match self.store.load() {
            Ok(Some(state)) => self.state = state,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "failed to load scheduler state, keeping in-memory copy");
            }
        }
        if self.state.date != now.date_naive() {
            tracing::info!(old = %self.state.date, new = %now.date_naive(), "new day, resetting daily counters");
            self.state = SchedulerState::fresh(now.date_naive());
            self.persist();
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.state) {
            tracing::warn!(error = %format!("{e:#}"), "failed to persist scheduler state, cross-run tracking may drift");
        }
    }

    /// May an application be attempted right now?
    pub fn can_act_now(&mut self) -> Decision {
        self.can_act_at(Local::now())
    }

    pub(crate) fn can_act_at(&mut self, now: DateTime<Local>) -> Decision {
        self.reload(now);

        if let Some(paused_until) = self.state.paused_until {
            if now < paused_until {
                return Decision::deny(format!(
                    "Automation paused until {}",
                    paused_until.format("%H:%M:%S")
                ));
            }
        }

        if self.state.applications_sent_today >= self.config.daily_limit {
            if self.config.auto_pause_on_limit {
                return Decision::deny("Daily application limit reached");
            }
            return Decision::allow("Daily limit reached but auto-pause disabled");
        }

        // No window containing `now` denies; an empty table never matches,
        // so clearing the windows disables automation entirely.
        if !self
            .config
            .optimal_windows
            .iter()
            .any(|w| w.contains(now.time()))
        {
            return Decision::deny("Not an optimal time for applications");
        }

        if self.config.weekdays_only && now.weekday().number_from_monday() >= 6 {
            return Decision::deny("Weekend - automation disabled");
        }

        if let Some(session_start) = self.state.session_start_time {
            let session_minutes = (now - session_start).num_minutes();
            if session_minutes > self.config.max_session_minutes {
                return Decision::deny("Maximum session duration reached");
            }
        }

        Decision::allow("Ready to apply")
    }

    /// Record that an application was sent. Never blocked — only the
    /// caller's decision to call it is gated.
    pub fn record_application(&mut self) {
        self.record_application_at(Local::now());
    }

    pub(crate) fn record_application_at(&mut self, now: DateTime<Local>) {
        self.state.applications_sent_today += 1;
        self.state.last_application_time = Some(now);
        if self.state.session_start_time.is_none() {
            self.state.session_start_time = Some(now);
        }
        self.persist();
        tracing::info!(
            sent_today = self.state.applications_sent_today,
            "application recorded"
        );
    }

    /// Pause all automated actions for `minutes`. Reloads first so the
    /// pause does not clobber counters written by another process.
    pub fn pause(&mut self, minutes: i64) {
        let now = Local::now();
        self.reload(now);
        let until = now + Duration::minutes(minutes);
        self.state.paused_until = Some(until);
        self.persist();
        tracing::info!(until = %until.format("%H:%M:%S"), "automation paused");
    }

    /// Clear any pause.
    pub fn resume(&mut self) {
        self.reload(Local::now());
        self.state.paused_until = None;
        self.persist();
        tracing::info!("automation resumed");
    }

    /// The next moment inside a configured window: now when already inside
    /// one, today's next window start, or the earliest window tomorrow.
    /// `None` when no windows are configured.
    pub fn next_optimal_time(&self) -> Option<DateTime<Local>> {
        self.next_optimal_from(Local::now())
    }

    pub(crate) fn next_optimal_from(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        if self.config.optimal_windows.is_empty() {
            return None;
        }
        let mut windows = self.config.optimal_windows.clone();
        windows.sort_by_key(|w| w.start);

        for window in &windows {
            if window.contains(now.time()) {
                return Some(now);
            }
            if now.time() < window.start {
                return now.date_naive().and_time(window.start).and_local_timezone(Local).single();
            }
        }
        let tomorrow = now.date_naive() + Duration::days(1);
        tomorrow
            .and_time(windows[0].start)
            .and_local_timezone(Local)
            .single()
    }

    /// Snapshot for status consumers.
    pub fn daily_progress(&mut self) -> DailyProgress {
        let now = Local::now();
        let decision = self.can_act_at(now);
        let session_minutes = self
            .state
            .session_start_time
            .map(|s| (now - s).num_minutes())
            .unwrap_or(0);
        DailyProgress {
            sent: self.state.applications_sent_today,
            daily_limit: self.config.daily_limit,
            remaining: self
                .config
                .daily_limit
                .saturating_sub(self.state.applications_sent_today),
            can_act_now: decision.allowed,
            reason: decision.reason,
            next_optimal_time: self.next_optimal_from(now),
            paused_until: self.state.paused_until,
            session_minutes,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &SchedulerState {
        &self.state
    }
}
