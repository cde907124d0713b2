//! Execute one automation run in the foreground.

use crate::control::Controller;
use crate::events::RunEvent;
use anyhow::{bail, Result};
use std::path::Path;

pub async fn run(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = super::load_config(config_path)?;
    let mut controller = Controller::new(config);
    let mut events = controller.subscribe();

    controller.start()?;

    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if json {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!(error = %e, "event serialization failed"),
                }
            } else {
                print_event(&event);
            }
            if matches!(event, RunEvent::RunSummary { .. }) {
                break;
            }
        }
    });

    let report = controller
        .wait()
        .await?
        .unwrap_or_else(|| unreachable!("start() was called"));
    let _ = printer.await;

    // Exit 0 covers no-jobs and limit-reached runs; only a broken run is an
    // error exit.
    if report.outcome.starts_with("failed:") {
        bail!("{}", report.outcome);
    }
    Ok(())
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::SessionStarted { keywords, .. } => {
            println!("Session started for keywords: {}", keywords.join(", "));
        }
        RunEvent::LoginResult {
            success,
            attempts,
            message,
            ..
        } => {
            let mark = if *success { "[OK]" } else { "[!!]" };
            println!("{mark} Login ({attempts} attempt(s)): {message}");
        }
        RunEvent::SearchResult {
            query_url,
            listings_present,
            ..
        } => {
            let mark = if *listings_present { "[OK]" } else { "[??]" };
            println!("{mark} Search: {query_url}");
        }
        RunEvent::PostingFound {
            posting, matched, ..
        } => match matched {
            Some(m) => println!(
                "  {} at {} — score {:.1}",
                posting.title, posting.company, m.score
            ),
            None => println!("  {} at {} — not scorable", posting.title, posting.company),
        },
        RunEvent::ApplicationAttempt { title, company, .. } => {
            println!("  Applying: {title} at {company}...");
        }
        RunEvent::ApplicationResult {
            success,
            verified,
            message,
            ..
        } => {
            let mark = match (success, verified) {
                (true, true) => "[OK]",
                (true, false) => "[~~]",
                (false, _) => "[!!]",
            };
            println!("  {mark} {message}");
        }
        RunEvent::RunSummary {
            jobs_found,
            applications_sent,
            success_rate,
            errors_count,
            duration_secs,
            outcome,
            ..
        } => {
            println!();
            println!("Run finished: {outcome}");
            println!(
                "  {jobs_found} jobs found, {applications_sent} applications sent ({success_rate:.1}%)"
            );
            println!("  {errors_count} errors, {duration_secs}s elapsed");
        }
    }
}
