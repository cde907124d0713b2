//! Show scheduler status and daily progress.

use crate::control::Controller;
use anyhow::Result;
use std::path::Path;

/// Status reflects the persisted scheduler state, so it is accurate even
/// when the run happens in another process.
pub async fn run(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = super::load_config(config_path)?;
    let controller = Controller::new(config);
    let status = controller.status();

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Jobpilot Status");
    println!("===============");
    println!(
        "Applications today: {}/{} ({} remaining)",
        status.daily.sent, status.daily.daily_limit, status.daily.remaining
    );
    println!(
        "Can apply now:      {} ({})",
        if status.daily.can_act_now { "yes" } else { "no" },
        status.daily.reason
    );
    if let Some(paused) = status.daily.paused_until {
        println!("Paused until:       {}", paused.format("%H:%M:%S"));
    }
    if let Some(next) = status.daily.next_optimal_time {
        println!("Next optimal time:  {}", next.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}
