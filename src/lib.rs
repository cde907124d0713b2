// Copyright 2026 Jobpilot Contributors
// SPDX-License-Identifier: Apache-2.0

//! Jobpilot — job-board application automation.
//!
//! One run authenticates against a job board, searches for postings matching
//! the configured keywords, scores each posting against the user's profile,
//! and submits applications through the board's in-flow form — all under a
//! persisted rate limiter that enforces daily limits, time-of-day windows,
//! and session caps across process restarts.
//!
//! The crate is organized around a few seams:
//!
//! - [`fallback`] — generic ordered-fallback resource acquisition, used for
//!   browser launch and DOM locator resolution alike.
//! - [`browser`] — the [`browser::PageDriver`] capability trait and its
//!   Chromium implementation.
//! - [`limiter`] — the persisted scheduling gate.
//! - [`matcher`] — profile-vs-posting scoring.
//! - [`orchestrator`] — the single-run state machine tying it together.
//! - [`control`] — start/stop/pause/resume/status around a run.

pub mod browser;
pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod extract;
pub mod fallback;
pub mod history;
pub mod limiter;
pub mod matcher;
pub mod orchestrator;
