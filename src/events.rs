// Copyright 2026 Jobpilot Contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed run events on a broadcast bus.
//!
//! The [`EventBus`] is a `tokio::sync::broadcast` channel carrying
//! [`RunEvent`] values. Any consumer — CLI printer, dashboard, history
//! writer, log file — subscribes independently. When no subscribers exist,
//! events are silently dropped.

use crate::extract::Posting;
use crate::matcher::MatchResult;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every event a run emits. Serialized to JSON for external consumers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    /// A new automation run has started.
    SessionStarted {
        run_id: String,
        keywords: Vec<String>,
        timestamp: String,
    },
    /// Login finished (successfully or not).
    LoginResult {
        run_id: String,
        success: bool,
        attempts: u32,
        message: String,
    },
    /// The search page was loaded.
    SearchResult {
        run_id: String,
        query_url: String,
        listings_present: bool,
    },
    /// A posting was extracted; scored when it was quick-apply capable.
    PostingFound {
        run_id: String,
        posting: Posting,
        matched: Option<MatchResult>,
    },
    /// An application is about to be attempted.
    ApplicationAttempt {
        run_id: String,
        posting_id: String,
        title: String,
        company: String,
    },
    /// One application attempt finished.
    ///
    /// `verified = false` on a success means no explicit success indicator
    /// appeared; the submit was judged successful only by the absence of an
    /// error indicator.
    ApplicationResult {
        run_id: String,
        posting_id: String,
        success: bool,
        verified: bool,
        message: String,
    },
    /// The run finished, in any state.
    RunSummary {
        run_id: String,
        jobs_found: usize,
        applications_sent: usize,
        success_rate: f64,
        errors_count: usize,
        duration_secs: u64,
        outcome: String,
    },
}

/// The central event bus for a run.
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// RFC 3339 timestamp for the current local time.
pub fn now_timestamp() -> String {
    chrono::Local::now().to_rfc3339()
}
