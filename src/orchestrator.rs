// Copyright 2026 Jobpilot Contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-run session orchestration.
//!
//! One [`SessionOrchestrator`] owns one run end to end: acquire a browser
//! through ordered fallback, authenticate, search, extract and score
//! postings, then apply under the rate limiter's gate. Per-posting failures
//! are recorded and skipped; only authentication and acquisition failures
//! end the run. The browser is released on every exit path and a
//! [`RunEvent::RunSummary`] is emitted no matter how the run ends.

use crate::browser::{wait_for_any, PageDriver};
use crate::config::{AutomationConfig, CompanySize};
use crate::error::RunError;
use crate::events::{now_timestamp, EventBus, RunEvent};
use crate::extract::{ExtractionAdapter, Posting};
use crate::fallback::{self, FallbackStrategy};
use crate::history::{ApplicationRecord, HistoryStore, SearchRecord};
use crate::limiter::RateLimiter;
use crate::matcher::{MatchResult, MatchScorer};
use anyhow::{bail, Context, Result};
use chrono::Local;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

const MAX_LOGIN_ATTEMPTS: u32 = 3;
const MAX_FORM_PAGES: u32 = 5;

/// Lifecycle of a run. Forward-only; `Failed` is reachable from any
/// active state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    SessionStarting,
    Authenticating,
    Searching,
    Listing,
    Applying,
    Closing,
    Closed,
    Failed,
}

/// Why an otherwise healthy run stopped applying.
#[derive(Clone, Debug, PartialEq, Eq)]
enum CloseReason {
    /// Every candidate was processed.
    Completed,
    /// External cancellation between postings.
    Cancelled,
    /// The rate limiter denied the next attempt.
    Denied(String),
}

/// Terminal report for one run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub run_id: String,
    pub jobs_found: usize,
    pub applications_sent: usize,
    pub success_rate: f64,
    pub errors_count: usize,
    pub duration_secs: u64,
    pub outcome: String,
}

/// Live progress shared with the control surface.
#[derive(Default)]
pub struct Progress {
    pub running: AtomicBool,
    pub current_posting: Mutex<Option<String>>,
}

#[derive(Default)]
struct Counters {
    jobs_found: usize,
    applications_sent: usize,
    errors_count: usize,
}

/// Drives one automation run against a job board.
pub struct SessionOrchestrator {
    config: AutomationConfig,
    limiter: RateLimiter,
    scorer: MatchScorer,
    extractor: Box<dyn ExtractionAdapter>,
    history: Box<dyn HistoryStore>,
    events: Arc<EventBus>,
    cancel: CancellationToken,
    progress: Arc<Progress>,
    run_id: String,
    state: SessionState,
}

impl SessionOrchestrator {
    pub fn new(
        config: AutomationConfig,
        limiter: RateLimiter,
        scorer: MatchScorer,
        extractor: Box<dyn ExtractionAdapter>,
        history: Box<dyn HistoryStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            limiter,
            scorer,
            extractor,
            history,
            events,
            cancel: CancellationToken::new(),
            progress: Arc::new(Progress::default()),
            run_id: uuid::Uuid::new_v4().to_string(),
            state: SessionState::Idle,
        }
    }

    /// Token that stops the run between postings when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> Arc<Progress> {
        self.progress.clone()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Execute the full run. Never panics out: acquisition or
    /// authentication failure produces a `failed:` outcome, everything
    /// else completes with the counters it got to.
    pub async fn run(
        &mut self,
        strategies: Vec<FallbackStrategy<'static, Box<dyn PageDriver>>>,
    ) -> RunReport {
        let started = tokio::time::Instant::now();
        self.state = SessionState::SessionStarting;
        self.progress.running.store(true, Ordering::SeqCst);
        self.events.emit(RunEvent::SessionStarted {
            run_id: self.run_id.clone(),
            keywords: self.config.job_keywords.clone(),
            timestamp: now_timestamp(),
        });

        let mut counters = Counters::default();
        let outcome = match fallback::acquire_any(strategies).await {
            Err(e) => {
                let err = RunError::ResourceAcquisition(e);
                tracing::error!(error = %err, "could not acquire a browser");
                self.state = SessionState::Failed;
                format!("failed: {err}")
            }
            Ok(mut driver) => {
                let result = self.drive(driver.as_mut(), &mut counters).await;
                self.state = SessionState::Closing;
                if let Err(e) = driver.close().await {
                    tracing::warn!(error = %format!("{e:#}"), "browser close failed");
                }
                match result {
                    Ok(CloseReason::Completed) => {
                        self.state = SessionState::Closed;
                        "completed".to_string()
                    }
                    Ok(CloseReason::Cancelled) => {
                        self.state = SessionState::Closed;
                        "cancelled".to_string()
                    }
                    Ok(CloseReason::Denied(reason)) => {
                        self.state = SessionState::Closed;
                        format!("denied: {reason}")
                    }
                    Err(e) => {
                        self.state = SessionState::Failed;
                        format!("failed: {e}")
                    }
                }
            }
        };

        if let Err(e) = self.history.record_search(&SearchRecord {
            keywords: self.config.job_keywords.join(" "),
            jobs_found: counters.jobs_found as u32,
            applications_sent: counters.applications_sent as u32,
            searched_at: Local::now(),
        }) {
            tracing::warn!(error = %format!("{e:#}"), "failed to record search history");
        }

        self.progress.running.store(false, Ordering::SeqCst);
        *self.progress.current_posting.lock().unwrap() = None;

        let success_rate = if counters.jobs_found > 0 {
            counters.applications_sent as f64 / counters.jobs_found as f64 * 100.0
        } else {
            0.0
        };
        let report = RunReport {
            run_id: self.run_id.clone(),
            jobs_found: counters.jobs_found,
            applications_sent: counters.applications_sent,
            success_rate,
            errors_count: counters.errors_count,
            duration_secs: started.elapsed().as_secs(),
            outcome,
        };
        self.events.emit(RunEvent::RunSummary {
            run_id: report.run_id.clone(),
            jobs_found: report.jobs_found,
            applications_sent: report.applications_sent,
            success_rate: report.success_rate,
            errors_count: report.errors_count,
            duration_secs: report.duration_secs,
            outcome: report.outcome.clone(),
        });
        tracing::info!(
            jobs_found = report.jobs_found,
            applications_sent = report.applications_sent,
            outcome = %report.outcome,
            "run finished"
        );
        report
    }

    async fn drive(
        &mut self,
        driver: &mut dyn PageDriver,
        counters: &mut Counters,
    ) -> Result<CloseReason, RunError> {
        self.state = SessionState::Authenticating;
        self.login(driver).await?;

        self.state = SessionState::Searching;
        let query_url = self
            .build_search_url()
            .map_err(|e| RunError::InvalidConfig(format!("bad search URL: {e:#}")))?;
        if let Err(e) = driver
            .navigate(&query_url, self.config.timeouts.page_load_ms)
            .await
        {
            tracing::warn!(error = %format!("{e:#}"), "search navigation failed");
            counters.errors_count += 1;
            return Ok(CloseReason::Completed);
        }
        let listings_present = wait_for_any(
            &*driver,
            &self.config.site.listing_markers,
            self.config.timeouts.element_wait_ms,
        )
        .await
        .ok()
        .flatten()
        .is_some();
        if !listings_present {
            // Soft condition: the page may still render cards the extractor
            // can find.
            tracing::warn!("no listing marker appeared on the results page");
        }
        self.events.emit(RunEvent::SearchResult {
            run_id: self.run_id.clone(),
            query_url,
            listings_present,
        });

        self.state = SessionState::Listing;
        for _ in 0..self.config.scroll_rounds {
            if let Err(e) = driver.scroll_to_bottom().await {
                tracing::debug!(error = %format!("{e:#}"), "scroll failed");
                break;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        let postings = match self
            .extractor
            .extract(driver, self.config.max_postings)
            .await
        {
            Ok(postings) => postings,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "posting extraction failed");
                counters.errors_count += 1;
                Vec::new()
            }
        };
        counters.jobs_found = postings.len();

        let mut candidates: Vec<(Posting, MatchResult)> = Vec::new();
        for posting in postings {
            let matched = if posting.supports_quick_apply || !self.config.quick_apply_only {
                Some(self.scorer.score(&self.config.profile, &posting))
            } else {
                None
            };
            self.events.emit(RunEvent::PostingFound {
                run_id: self.run_id.clone(),
                posting: posting.clone(),
                matched: matched.clone(),
            });
            if let Some(result) = matched {
                if result.score >= self.config.min_match_score {
                    candidates.push((posting, result));
                } else {
                    tracing::debug!(
                        posting = %posting.id,
                        score = result.score,
                        "below match threshold, skipping"
                    );
                }
            }
        }

        self.state = SessionState::Applying;
        for (posting, matched) in candidates {
            if self.cancel.is_cancelled() {
                tracing::info!("cancellation requested, stopping before next posting");
                return Ok(CloseReason::Cancelled);
            }
            let decision = self.limiter.can_act_now();
            if !decision.allowed {
                tracing::info!(reason = %decision.reason, "rate limiter denied next application");
                return Ok(CloseReason::Denied(decision.reason));
            }

            *self.progress.current_posting.lock().unwrap() = Some(posting.id.clone());
            self.events.emit(RunEvent::ApplicationAttempt {
                run_id: self.run_id.clone(),
                posting_id: posting.id.clone(),
                title: posting.title.clone(),
                company: posting.company.clone(),
            });

            match self.apply_one(driver, &posting).await {
                Ok((true, verified, message)) => {
                    self.limiter.record_application();
                    counters.applications_sent += 1;
                    if let Err(e) = self.history.record_application(&ApplicationRecord {
                        posting_id: posting.id.clone(),
                        title: posting.title.clone(),
                        company: posting.company.clone(),
                        match_score: Some(matched.score),
                        success: true,
                        verified,
                        applied_at: Local::now(),
                    }) {
                        tracing::warn!(error = %format!("{e:#}"), "failed to record application history");
                    }
                    self.events.emit(RunEvent::ApplicationResult {
                        run_id: self.run_id.clone(),
                        posting_id: posting.id.clone(),
                        success: true,
                        verified,
                        message,
                    });
                    self.cooldown().await;
                }
                Ok((false, _, message)) => {
                    counters.errors_count += 1;
                    self.events.emit(RunEvent::ApplicationResult {
                        run_id: self.run_id.clone(),
                        posting_id: posting.id.clone(),
                        success: false,
                        verified: false,
                        message,
                    });
                }
                Err(e) => {
                    counters.errors_count += 1;
                    tracing::warn!(posting = %posting.id, error = %format!("{e:#}"), "application attempt failed");
                    self.events.emit(RunEvent::ApplicationResult {
                        run_id: self.run_id.clone(),
                        posting_id: posting.id.clone(),
                        success: false,
                        verified: false,
                        message: format!("{e:#}"),
                    });
                }
            }
            *self.progress.current_posting.lock().unwrap() = None;
        }

        Ok(CloseReason::Completed)
    }

    /// Authenticate, retrying transient failures with jittered backoff. A
    /// verification challenge ends the run immediately.
    async fn login(&self, driver: &mut dyn PageDriver) -> Result<(), RunError> {
        let site = &self.config.site;
        for attempt in 1..=MAX_LOGIN_ATTEMPTS {
            let step: Result<()> = async {
                driver
                    .navigate(&site.login_url, self.config.timeouts.page_load_ms)
                    .await
                    .context("login page navigation failed")?;
                if !type_any(&*driver, &site.username_fields, &self.config.credentials.username)
                    .await?
                {
                    bail!("no username field matched");
                }
                if !type_any(&*driver, &site.password_fields, &self.config.credentials.password)
                    .await?
                {
                    bail!("no password field matched");
                }
                if !click_any(&*driver, &site.login_buttons).await? {
                    bail!("no login button matched");
                }
                Ok(())
            }
            .await;

            if let Err(e) = step {
                tracing::warn!(attempt, error = %format!("{e:#}"), "login step failed");
            } else {
                let logged_in = wait_for_any(
                    &*driver,
                    &site.logged_in_markers,
                    self.config.timeouts.login_wait_ms,
                )
                .await
                .ok()
                .flatten()
                .is_some();
                if logged_in {
                    self.events.emit(RunEvent::LoginResult {
                        run_id: self.run_id.clone(),
                        success: true,
                        attempts: attempt,
                        message: "logged in".into(),
                    });
                    return Ok(());
                }
                for marker in &site.challenge_markers {
                    if driver.count(marker).await.unwrap_or(0) > 0 {
                        let message =
                            "verification challenge detected, manual login required".to_string();
                        self.events.emit(RunEvent::LoginResult {
                            run_id: self.run_id.clone(),
                            success: false,
                            attempts: attempt,
                            message: message.clone(),
                        });
                        return Err(RunError::Authentication {
                            challenge: true,
                            message,
                        });
                    }
                }
                tracing::warn!(attempt, "no logged-in indicator appeared");
            }

            if attempt < MAX_LOGIN_ATTEMPTS {
                let backoff = rand::thread_rng().gen_range(2..=5);
                tokio::time::sleep(Duration::from_secs(backoff)).await;
            }
        }

        let message = format!("login failed after {MAX_LOGIN_ATTEMPTS} attempts");
        self.events.emit(RunEvent::LoginResult {
            run_id: self.run_id.clone(),
            success: false,
            attempts: MAX_LOGIN_ATTEMPTS,
            message: message.clone(),
        });
        Err(RunError::Authentication {
            challenge: false,
            message,
        })
    }

    /// Assemble the search URL from config. Keywords and location go in as
    /// proper query pairs; site filter fragments are appended verbatim.
    fn build_search_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.config.site.search_url).context("invalid search_url")?;
        url.query_pairs_mut()
            .append_pair("keywords", &self.config.job_keywords.join(" "));
        if let Some(location) = &self.config.location {
            url.query_pairs_mut()
                .append_pair(&self.config.site.location_param, location);
        }

        let mut fragments = Vec::new();
        if self.config.quick_apply_only {
            if let Some(f) = &self.config.site.quick_apply_filter {
                fragments.push(f.clone());
            }
        }
        if let Some(level) = &self.config.experience_level {
            if let Some(f) = self.config.site.experience_filters.get(level) {
                fragments.push(f.clone());
            }
        }
        if let Some(size) = self.config.company_size {
            let key = match size {
                CompanySize::Startup => "startup",
                CompanySize::Medium => "medium",
                CompanySize::Large => "large",
                CompanySize::Enterprise => "enterprise",
            };
            if let Some(f) = self.config.site.company_size_filters.get(key) {
                fragments.push(f.clone());
            }
        }
        if !fragments.is_empty() {
            let extra = fragments.join("&");
            let query = match url.query() {
                Some(q) => format!("{q}&{extra}"),
                None => extra,
            };
            url.set_query(Some(&query));
        }
        Ok(url.into())
    }

    /// One in-flow application: open the posting, start the form, walk up to
    /// [`MAX_FORM_PAGES`] pages, submit, judge the outcome.
    ///
    /// Returns `(success, verified, message)`. `verified` is true only when
    /// an explicit success indicator appeared after submit.
    async fn apply_one(
        &self,
        driver: &mut dyn PageDriver,
        posting: &Posting,
    ) -> Result<(bool, bool, String)> {
        let site = &self.config.site;
        let url = posting
            .url
            .as_deref()
            .context("posting has no URL to open")?;
        driver
            .navigate(url, self.config.timeouts.page_load_ms)
            .await
            .context("posting navigation failed")?;

        if !click_any(&*driver, &site.apply_buttons).await? {
            bail!("no apply control found on the posting page");
        }
        tokio::time::sleep(Duration::from_millis(1_000)).await;

        for page in 1..=MAX_FORM_PAGES {
            for rule in &site.form_fields {
                if !type_any(&*driver, &rule.selectors, &rule.value).await? {
                    tracing::debug!(page, value = %rule.value, "form field not present on this page");
                }
            }

            if click_any(&*driver, &site.next_buttons).await? {
                tokio::time::sleep(Duration::from_millis(800)).await;
                continue;
            }

            if click_any(&*driver, &site.submit_buttons).await? {
                let confirmed = wait_for_any(
                    &*driver,
                    &site.success_markers,
                    self.config.timeouts.element_wait_ms,
                )
                .await?
                .is_some();
                if confirmed {
                    return Ok((true, true, "application confirmed".into()));
                }
                for marker in &site.error_markers {
                    if driver.count(marker).await.unwrap_or(0) > 0 {
                        return Ok((false, false, "submission reported an error".into()));
                    }
                }
                // Optimistic: submit went through and nothing complained.
                return Ok((true, false, "submitted without explicit confirmation".into()));
            }

            bail!("form page {page} has neither a continue nor a submit control");
        }

        Ok((
            false,
            false,
            format!("form exceeded {MAX_FORM_PAGES} pages, abandoning"),
        ))
    }

    /// Pause between successful applications. Base interval from config,
    /// plus up to 30 seconds of jitter.
    async fn cooldown(&self) {
        let base = self.config.schedule.cooldown_seconds;
        if base == 0 {
            return;
        }
        let secs = rand::thread_rng().gen_range(base..base + 30);
        tracing::debug!(secs, "cooldown between applications");
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}

/// Type `value` into the first selector that matches, in order.
async fn type_any(driver: &dyn PageDriver, selectors: &[String], value: &str) -> Result<bool> {
    let strategies: Vec<FallbackStrategy<'_, bool>> = selectors
        .iter()
        .map(|selector| {
            let selector = selector.clone();
            let value = value.to_string();
            FallbackStrategy::new(format!("type via {selector}"), move || async move {
                driver.type_text(&selector, &value).await
            })
        })
        .collect();
    Ok(fallback::acquire(strategies, |typed| *typed).await.is_ok())
}

/// Click the first selector that matches, in order.
async fn click_any(driver: &dyn PageDriver, selectors: &[String]) -> Result<bool> {
    let strategies: Vec<FallbackStrategy<'_, bool>> = selectors
        .iter()
        .map(|selector| {
            let selector = selector.clone();
            FallbackStrategy::new(format!("click via {selector}"), move || async move {
                driver.click(&selector).await
            })
        })
        .collect();
    Ok(fallback::acquire(strategies, |clicked| *clicked)
        .await
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ScheduleConfig, SiteProfile, TimeWindow};
    use crate::history::NullHistory;
    use crate::limiter::MemoryStore;
    use async_trait::async_trait;
    use chrono::NaiveTime;
    use std::collections::HashSet;

    /// A window covering the whole day, so tests pass at any wall time.
    fn all_day() -> Vec<TimeWindow> {
        vec![TimeWindow {
            start: NaiveTime::MIN,
            end: NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap(),
        }]
    }

    /// Driver fake driven by selector sets: `present` answers `count`,
    /// `clickable` answers `click`, `typeable` answers `type_text`.
    struct FakeDriver {
        present: HashSet<String>,
        clickable: HashSet<String>,
        typeable: HashSet<String>,
        clicks: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
        /// When set, cancel this token after the first submit click.
        cancel_after_submit: Option<CancellationToken>,
    }

    impl FakeDriver {
        fn happy_path(site: &SiteProfile) -> Self {
            let mut present = HashSet::new();
            present.insert(site.logged_in_markers[0].clone());
            present.insert(site.listing_markers[0].clone());
            present.insert(site.success_markers[0].clone());
            let mut clickable = HashSet::new();
            clickable.insert(site.login_buttons[0].clone());
            clickable.insert(site.apply_buttons[0].clone());
            clickable.insert(site.submit_buttons[0].clone());
            let mut typeable = HashSet::new();
            typeable.insert(site.username_fields[0].clone());
            typeable.insert(site.password_fields[0].clone());
            Self {
                present,
                clickable,
                typeable,
                clicks: Arc::new(Mutex::new(Vec::new())),
                closed: Arc::new(AtomicBool::new(false)),
                cancel_after_submit: None,
            }
        }
    }

    #[async_trait]
    impl PageDriver for FakeDriver {
        async fn navigate(&mut self, _url: &str, _timeout_ms: u64) -> Result<()> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn eval_json(&self, _script: &str) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
        async fn count(&self, selector: &str) -> Result<usize> {
            Ok(usize::from(self.present.contains(selector)))
        }
        async fn read_text(&self, _selector: &str) -> Result<Option<String>> {
            Ok(None)
        }
        async fn read_attr(&self, _selector: &str, _attr: &str) -> Result<Option<String>> {
            Ok(None)
        }
        async fn click(&self, selector: &str) -> Result<bool> {
            if !self.clickable.contains(selector) {
                return Ok(false);
            }
            self.clicks.lock().unwrap().push(selector.to_string());
            if let Some(token) = &self.cancel_after_submit {
                if selector.contains("form-submit") || selector.contains("Submit") {
                    token.cancel();
                }
            }
            Ok(true)
        }
        async fn type_text(&self, selector: &str, _value: &str) -> Result<bool> {
            Ok(self.typeable.contains(selector))
        }
        async fn scroll_to_bottom(&self) -> Result<()> {
            Ok(())
        }
        async fn close(self: Box<Self>) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StubExtractor {
        postings: Vec<Posting>,
    }

    #[async_trait]
    impl ExtractionAdapter for StubExtractor {
        async fn extract(
            &self,
            _driver: &mut dyn PageDriver,
            _limit: usize,
        ) -> Result<Vec<Posting>> {
            Ok(self.postings.clone())
        }
    }

    fn posting(id: &str, description: &str) -> Posting {
        Posting {
            id: id.into(),
            title: "Data Analyst".into(),
            company: "Acme".into(),
            location: "Remote".into(),
            salary_text: None,
            url: Some(format!("https://example.invalid/jobs/view/{id}")),
            description_text: Some(description.into()),
            supports_quick_apply: true,
        }
    }

    fn test_config() -> AutomationConfig {
        let mut config: AutomationConfig = serde_json::from_value(serde_json::json!({
            "credentials": { "username": "u@example.com", "password": "secret" },
            "job_keywords": ["data analyst"],
        }))
        .unwrap();
        // Weekday gate off and a full-day window so tests pass at any wall
        // time.
        config.schedule = ScheduleConfig {
            daily_limit: 10,
            optimal_windows: all_day(),
            weekdays_only: false,
            max_session_minutes: 120,
            auto_pause_on_limit: true,
            cooldown_seconds: 0,
        };
        config.profile.skills = ["python", "sql"].iter().map(|s| s.to_string()).collect();
        config.profile.experience_years = 5;
        config.min_match_score = 70.0;
        config
    }

    fn orchestrator(config: AutomationConfig, postings: Vec<Posting>) -> SessionOrchestrator {
        let limiter = RateLimiter::new(config.schedule.clone(), Box::<MemoryStore>::default());
        SessionOrchestrator::new(
            config,
            limiter,
            MatchScorer::new(),
            Box::new(StubExtractor { postings }),
            Box::new(NullHistory),
            Arc::new(EventBus::default()),
        )
    }

    fn driver_strategy(
        driver: FakeDriver,
    ) -> Vec<FallbackStrategy<'static, Box<dyn PageDriver>>> {
        vec![FallbackStrategy::new("fake", move || async move {
            Ok(Box::new(driver) as Box<dyn PageDriver>)
        })]
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_filters_applications() {
        let config = test_config();
        // First posting requires skills the profile has, second requires a
        // stack it lacks, putting it under the threshold.
        let postings = vec![
            posting("good", "We need python and sql experience."),
            posting("bad", "Requires java, kubernetes, aws, docker, and react skills."),
        ];
        let mut orch = orchestrator(config.clone(), postings);
        let driver = FakeDriver::happy_path(&config.site);
        let closed = driver.closed.clone();

        let report = orch.run(driver_strategy(driver)).await;
        assert_eq!(report.jobs_found, 2);
        assert_eq!(report.applications_sent, 1);
        assert_eq!(report.outcome, "completed");
        assert_eq!(report.errors_count, 0);
        assert_eq!(orch.state(), SessionState::Closed);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_denial_stops_midway() {
        let mut config = test_config();
        config.schedule.daily_limit = 1;
        let postings = vec![
            posting("p1", "python and sql"),
            posting("p2", "python and sql"),
        ];
        let mut orch = orchestrator(config.clone(), postings);
        let driver = FakeDriver::happy_path(&config.site);

        let report = orch.run(driver_strategy(driver)).await;
        assert_eq!(report.applications_sent, 1);
        assert_eq!(report.outcome, "denied: Daily application limit reached");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_spaces_out_applications() {
        let mut config = test_config();
        config.schedule.cooldown_seconds = 40;
        let postings = vec![
            posting("p1", "python and sql"),
            posting("p2", "python and sql"),
        ];
        let mut orch = orchestrator(config.clone(), postings);
        let driver = FakeDriver::happy_path(&config.site);

        let started = tokio::time::Instant::now();
        let report = orch.run(driver_strategy(driver)).await;
        assert_eq!(report.applications_sent, 2);
        assert_eq!(report.outcome, "completed");
        // One cooldown of at least the base interval after each application.
        assert!(started.elapsed() >= Duration::from_secs(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_between_postings() {
        let config = test_config();
        let postings = vec![
            posting("p1", "python and sql"),
            posting("p2", "python and sql"),
        ];
        let mut orch = orchestrator(config.clone(), postings);
        let mut driver = FakeDriver::happy_path(&config.site);
        driver.cancel_after_submit = Some(orch.cancel_token());
        let closed = driver.closed.clone();

        let report = orch.run(driver_strategy(driver)).await;
        assert_eq!(report.applications_sent, 1);
        assert_eq!(report.outcome, "cancelled");
        // The browser is still released on the cancellation path.
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquisition_exhaustion_still_reports() {
        let config = test_config();
        let mut orch = orchestrator(config, vec![posting("p1", "python")]);
        let mut events = orch.events.subscribe();

        let strategies: Vec<FallbackStrategy<'static, Box<dyn PageDriver>>> = vec![
            FallbackStrategy::new("broken", || async { anyhow::bail!("no binary") }),
        ];
        let report = orch.run(strategies).await;
        assert!(report.outcome.starts_with("failed: resource acquisition exhausted"));
        assert_eq!(report.applications_sent, 0);

        // Summary event is emitted even on the failure path.
        let mut saw_summary = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, RunEvent::RunSummary { .. }) {
                saw_summary = true;
            }
        }
        assert!(saw_summary);
    }

    #[tokio::test(start_paused = true)]
    async fn test_challenge_fails_run_without_retry_storm() {
        let mut config = test_config();
        config.site.logged_in_markers = vec!["#never".into()];
        let mut orch = orchestrator(config.clone(), vec![posting("p1", "python")]);
        let mut driver = FakeDriver::happy_path(&config.site);
        driver.present.clear();
        driver.present.insert(config.site.challenge_markers[0].clone());

        let report = orch.run(driver_strategy(driver)).await;
        assert!(report.outcome.contains("verification challenge"));
        assert_eq!(report.jobs_found, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_posting_failure_continues_run() {
        let config = test_config();
        let mut bad = posting("no-url", "python and sql");
        bad.url = None;
        let postings = vec![bad, posting("ok", "python and sql")];
        let mut orch = orchestrator(config.clone(), postings);
        let driver = FakeDriver::happy_path(&config.site);

        let report = orch.run(driver_strategy(driver)).await;
        assert_eq!(report.jobs_found, 2);
        assert_eq!(report.applications_sent, 1);
        assert_eq!(report.errors_count, 1);
        assert_eq!(report.outcome, "completed");
    }

    #[test]
    fn test_search_url_includes_filters() {
        let mut config = test_config();
        config.location = Some("Berlin".into());
        config.site.quick_apply_filter = Some("f_AL=true".into());
        config
            .site
            .experience_filters
            .insert("mid".into(), "f_E=3".into());
        config.experience_level = Some("mid".into());
        let orch = orchestrator(config, Vec::new());

        let url = orch.build_search_url().unwrap();
        assert!(url.contains("keywords=data+analyst"));
        assert!(url.contains("location=Berlin"));
        assert!(url.contains("f_AL=true"));
        assert!(url.contains("f_E=3"));
    }
}
