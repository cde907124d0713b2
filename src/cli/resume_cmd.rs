//! Clear a scheduling pause.

use crate::control::Controller;
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path)?;
    Controller::new(config).resume();
    println!("Resumed.");
    Ok(())
}
