//! Latest command for the goversion CLI.
//!
//! Prints the latest stable Go release and, when `go` is on PATH, the
//! version of the local toolchain.
//!
//! ## Usage
//!
//! ```bash
//! goversion latest
//! ```

use anyhow::{Context, Result};
use log::debug;

use crate::config::Config;
use crate::toolchain::fetch_releases;
use crate::toolchain::local::go_env;
use crate::toolchain::release::latest_stable;

/// Executes the latest command.
///
/// # Errors
///
/// Returns an error if the release list cannot be fetched or is empty.
pub async fn execute() -> Result<()> {
    let config = Config::from_env()?;
    let releases = fetch_releases(&config, false)
        .await
        .context("get latest version")?;
    let latest = latest_stable(&releases).context("release list is empty")?;

    println!("latest version: {}", latest.version);

    match go_env("GOVERSION") {
        Ok(current) if !current.is_empty() => {
            println!("current version: {current}");
            if current == latest.version {
                println!("Go is up to date.");
            } else {
                println!("Run 'goversion upgrade' to install {}.", latest.version);
            }
        }
        Ok(_) => {}
        Err(e) => debug!("local Go version unavailable: {e:#}"),
    }

    Ok(())
}
