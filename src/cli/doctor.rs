//! Environment readiness check.

use crate::browser::chromium;
use crate::config::data_dir;
use anyhow::Result;
use std::path::Path;

/// Check browser availability, config, and data directory.
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    println!("Jobpilot Doctor");
    println!("===============");
    println!();

    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    let mut browser_found = false;
    for (source, path) in chromium::resolvable_binaries() {
        match path {
            Some(p) => {
                println!("[OK] {source}: {}", p.display());
                browser_found = true;
            }
            None => println!("[--] {source}: not found"),
        }
    }
    if !browser_found {
        println!("[!!] No browser binary found. Install Chrome/Chromium or set JOBPILOT_BROWSER_PATH.");
    }
    println!();

    let cfg = super::config_path(config_path);
    let config_ok = match super::load_config(config_path) {
        Ok(config) => {
            println!("[OK] Config valid: {}", cfg.display());
            println!("     {} keyword(s), daily limit {}", config.job_keywords.len(), config.schedule.daily_limit);
            true
        }
        Err(e) => {
            println!("[!!] Config problem at {}: {e:#}", cfg.display());
            false
        }
    };
    println!();

    let data = data_dir();
    if data.exists() || std::fs::create_dir_all(&data).is_ok() {
        println!("[OK] Data directory: {}", data.display());
    } else {
        println!("[!!] Data directory not writable: {}", data.display());
    }

    println!();
    if browser_found && config_ok {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}
