//! Run configuration: credentials, search settings, scheduling windows, and
//! the site locator profile.
//!
//! Everything is loaded and validated once, up front. No module-level
//! defaults: the loaded [`AutomationConfig`] is passed explicitly to every
//! component that needs it. Concrete DOM selector strings live only in
//! [`SiteProfile`] — the orchestration core never hardcodes them.

use crate::error::RunError;
use crate::matcher::UserProfile;
use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Login credentials for the job board.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Bounded timeouts for every page-wait operation. Nothing waits unboundedly.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Navigation / page load.
    pub page_load_ms: u64,
    /// Single element lookup or wait.
    pub element_wait_ms: u64,
    /// Post-login indicator polling window.
    pub login_wait_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_load_ms: 30_000,
            element_wait_ms: 15_000,
            login_wait_ms: 20_000,
        }
    }
}

/// Rough company size buckets used for search filters and profile matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanySize {
    Startup,
    Medium,
    Large,
    Enterprise,
}

/// A time-of-day interval during which automated actions are permitted.
/// Closed interval: `start <= now <= end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t <= self.end
    }
}

/// "HH:MM" serialization for window boundaries.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(d)?;
        NaiveTime::parse_from_str(&s, "%H:%M").map_err(serde::de::Error::custom)
    }
}

/// Scheduling policy enforced by the rate limiter.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub daily_limit: u32,
    pub optimal_windows: Vec<TimeWindow>,
    pub weekdays_only: bool,
    pub max_session_minutes: i64,
    pub auto_pause_on_limit: bool,
    /// Base delay between successful applications, in seconds. Zero disables.
    pub cooldown_seconds: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let window = |a: &str, b: &str| TimeWindow {
            start: NaiveTime::parse_from_str(a, "%H:%M").unwrap(),
            end: NaiveTime::parse_from_str(b, "%H:%M").unwrap(),
        };
        Self {
            daily_limit: 10,
            optimal_windows: vec![
                window("09:00", "11:00"),
                window("14:00", "16:00"),
                window("19:00", "21:00"),
            ],
            weekdays_only: true,
            max_session_minutes: 120,
            auto_pause_on_limit: true,
            cooldown_seconds: 60,
        }
    }
}

/// A form field the apply loop should fill: candidate selectors tried in
/// order, and the value to type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormFieldRule {
    pub selectors: Vec<String>,
    pub value: String,
}

/// All site-specific knowledge: URLs, query parameter fragments, and ordered
/// candidate selector lists for every element the orchestrator touches.
///
/// The defaults below are deliberately generic markup patterns; a real
/// deployment overrides them per site from the config file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub login_url: String,
    /// Base URL for the search page; the query string is appended.
    pub search_url: String,
    /// Query fragment appended when only quick-apply postings are wanted,
    /// e.g. `"f_LF=f_AL"`.
    pub quick_apply_filter: Option<String>,
    /// Query parameter name for the location filter.
    pub location_param: String,
    /// Experience level name → query fragment.
    pub experience_filters: std::collections::HashMap<String, String>,
    /// Company size name → query fragment.
    pub company_size_filters: std::collections::HashMap<String, String>,

    pub username_fields: Vec<String>,
    pub password_fields: Vec<String>,
    pub login_buttons: Vec<String>,
    /// Any one of these present means we are logged in.
    pub logged_in_markers: Vec<String>,
    /// Any one present means a verification/challenge page — not retryable.
    pub challenge_markers: Vec<String>,

    /// Expected on a loaded results page; absence is a soft warning only.
    pub listing_markers: Vec<String>,
    /// Candidate selectors for one listing card, tried until one yields
    /// non-empty results.
    pub card_selectors: Vec<String>,
    pub title_selectors: Vec<String>,
    pub company_selectors: Vec<String>,
    pub location_selectors: Vec<String>,
    pub salary_selectors: Vec<String>,
    pub link_selectors: Vec<String>,
    pub description_selectors: Vec<String>,
    /// Present inside a card when the posting supports in-flow application.
    pub quick_apply_markers: Vec<String>,

    pub apply_buttons: Vec<String>,
    pub next_buttons: Vec<String>,
    pub submit_buttons: Vec<String>,
    pub success_markers: Vec<String>,
    pub error_markers: Vec<String>,
    /// Fields the apply loop fills on each form page.
    pub form_fields: Vec<FormFieldRule>,
}

impl Default for SiteProfile {
    fn default() -> Self {
        let v = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            login_url: "https://example.invalid/login".into(),
            search_url: "https://example.invalid/jobs/search".into(),
            quick_apply_filter: None,
            location_param: "location".into(),
            experience_filters: Default::default(),
            company_size_filters: Default::default(),
            username_fields: v(&["input[name='session_key']", "input[type='email']", "#username"]),
            password_fields: v(&["input[name='session_password']", "input[type='password']", "#password"]),
            login_buttons: v(&["button[type='submit']", "input[type='submit']"]),
            logged_in_markers: v(&["nav.global-nav", "[data-logged-in]", "a[href*='/profile']"]),
            challenge_markers: v(&["#captcha", ".challenge", "[data-verification]"]),
            listing_markers: v(&["[data-job-card]", ".jobs-search-results"]),
            card_selectors: v(&["[data-job-card]", ".job-card-container", "li.result-card", "article.job-card"]),
            title_selectors: v(&[".job-card-title", "h3", "a[href*='/jobs/view/']"]),
            company_selectors: v(&[".job-card-company", "h4", "a[href*='/company/']"]),
            location_selectors: v(&[".job-card-location", ".metadata-location"]),
            salary_selectors: v(&[".job-card-salary", ".metadata-salary"]),
            link_selectors: v(&["a[href*='/jobs/view/']", "a.job-card-link"]),
            description_selectors: v(&[".job-card-description", ".job-snippet"]),
            quick_apply_markers: v(&["[data-quick-apply]", "button.quick-apply"]),
            apply_buttons: v(&["button[data-quick-apply]", "button.jobs-apply-button", "button[aria-label*='apply' i]"]),
            next_buttons: v(&["button[aria-label='Continue']", "button[data-form-next]"]),
            submit_buttons: v(&["button[aria-label='Submit application']", "button[data-form-submit]"]),
            success_markers: v(&["[data-application-sent]", ".application-success"]),
            error_markers: v(&["[data-application-error]", ".application-error", ".artdeco-inline-feedback--error"]),
            form_fields: Vec::new(),
        }
    }
}

/// Top-level configuration consumed by a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AutomationConfig {
    pub credentials: Credentials,
    pub job_keywords: Vec<String>,
    #[serde(default = "default_true")]
    pub quick_apply_only: bool,
    #[serde(default = "default_daily_limit")]
    pub max_applications_per_day: u32,
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub company_size: Option<CompanySize>,
    /// Postings scoring below this are never applied to.
    #[serde(default = "default_min_score")]
    pub min_match_score: f64,
    /// How many scroll rounds to force lazy listing content.
    #[serde(default = "default_scroll_rounds")]
    pub scroll_rounds: u32,
    /// Cap on extracted postings per run.
    #[serde(default = "default_max_postings")]
    pub max_postings: usize,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub site: SiteProfile,
    #[serde(default)]
    pub profile: UserProfile,
    /// Scheduler state file. Defaults to `~/.jobpilot/scheduler_state.json`.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    /// Application history database. Defaults to `~/.jobpilot/history.db`.
    #[serde(default)]
    pub history_file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}
fn default_daily_limit() -> u32 {
    10
}
fn default_min_score() -> f64 {
    70.0
}
fn default_scroll_rounds() -> u32 {
    3
}
fn default_max_postings() -> usize {
    20
}

/// Per-user data directory, `~/.jobpilot`.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".jobpilot")
}

impl AutomationConfig {
    /// Load and validate a config file (JSON).
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Minimum viability: at least one keyword and a positive daily limit.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.job_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(RunError::InvalidConfig(
                "at least one job keyword is required".into(),
            ));
        }
        if self.max_applications_per_day == 0 {
            return Err(RunError::InvalidConfig(
                "max_applications_per_day must be at least 1".into(),
            ));
        }
        if self.schedule.daily_limit == 0 {
            return Err(RunError::InvalidConfig(
                "schedule.daily_limit must be at least 1".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.min_match_score) {
            return Err(RunError::InvalidConfig(
                "min_match_score must be within 0..=100".into(),
            ));
        }
        Ok(())
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| data_dir().join("scheduler_state.json"))
    }

    pub fn history_file(&self) -> PathBuf {
        self.history_file
            .clone()
            .unwrap_or_else(|| data_dir().join("history.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> AutomationConfig {
        serde_json::from_value(serde_json::json!({
            "credentials": { "username": "u@example.com", "password": "secret" },
            "job_keywords": ["Data Analyst"],
        }))
        .unwrap()
    }

    #[test]
    fn test_minimal_config_defaults() {
        let c = minimal();
        assert!(c.quick_apply_only);
        assert_eq!(c.max_applications_per_day, 10);
        assert_eq!(c.min_match_score, 70.0);
        assert_eq!(c.schedule.optimal_windows.len(), 3);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_empty_keywords_rejected() {
        let mut c = minimal();
        c.job_keywords = vec!["  ".into()];
        assert!(matches!(c.validate(), Err(RunError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let mut c = minimal();
        c.max_applications_per_day = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_window_hhmm_roundtrip() {
        let w = TimeWindow {
            start: NaiveTime::parse_from_str("09:00", "%H:%M").unwrap(),
            end: NaiveTime::parse_from_str("11:30", "%H:%M").unwrap(),
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"start":"09:00","end":"11:30"}"#);
        let back: TimeWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);
    }

    #[test]
    fn test_window_contains_is_closed_interval() {
        let w = TimeWindow {
            start: NaiveTime::parse_from_str("09:00", "%H:%M").unwrap(),
            end: NaiveTime::parse_from_str("11:00", "%H:%M").unwrap(),
        };
        assert!(w.contains(NaiveTime::parse_from_str("09:00", "%H:%M").unwrap()));
        assert!(w.contains(NaiveTime::parse_from_str("11:00", "%H:%M").unwrap()));
        assert!(!w.contains(NaiveTime::parse_from_str("11:01", "%H:%M").unwrap()));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let c = Credentials {
            username: "u@example.com".into(),
            password: "hunter2".into(),
        };
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("***"));
    }
}
