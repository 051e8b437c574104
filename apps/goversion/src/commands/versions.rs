//! Versions command for the goversion CLI.
//!
//! Lists Go releases from the release metadata endpoint, newest first.
//!
//! ## Usage
//!
//! ```bash
//! goversion versions         # Current stable releases
//! goversion versions --all   # Every release, including betas and RCs
//! goversion versions --json  # Output in JSON format
//! ```
//!
//! ## Output Format
//!
//! ```text
//! go1.23rc1 (unstable)
//! go1.22.3 (stable) *
//! go1.21.10 (stable) *
//!
//!   * = archive available for linux-amd64
//! ```

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::config::Config;
use crate::toolchain::{GoRelease, Platform, fetch_releases};

/// Arguments for the versions command.
#[derive(Args)]
pub struct VersionsArgs {
    /// Include every historical release, not only the current ones.
    #[clap(long, short = 'a')]
    pub all: bool,

    /// Show versions in JSON format.
    #[clap(long, short = 'j')]
    pub json: bool,
}

/// Version information for JSON output.
#[derive(Debug, Clone, Serialize)]
struct VersionInfo {
    version: String,
    stable: bool,
    archive: Option<String>,
}

/// Executes the versions command.
///
/// # Errors
///
/// Returns an error if the platform is unsupported or the release list
/// cannot be fetched.
pub async fn execute(args: &VersionsArgs) -> Result<()> {
    let config = Config::from_env()?;
    let releases = fetch_releases(&config, args.all)
        .await
        .context("get remote versions")?;

    if args.json {
        output_json(&releases, config.platform)?;
    } else {
        output_text(&releases, config.platform);
    }
    Ok(())
}

fn output_json(releases: &[GoRelease], platform: Platform) -> Result<()> {
    let infos: Vec<VersionInfo> = releases
        .iter()
        .map(|r| VersionInfo {
            version: r.version.clone(),
            stable: r.stable,
            archive: r.archive_for(platform).map(|f| f.filename.clone()),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&infos)?);
    Ok(())
}

fn output_text(releases: &[GoRelease], platform: Platform) {
    if releases.is_empty() {
        println!("No versions available.");
        return;
    }

    let mut any_available = false;
    for release in releases {
        let stability = if release.stable { "(stable)" } else { "(unstable)" };
        let marker = if release.archive_for(platform).is_some() {
            any_available = true;
            " *"
        } else {
            ""
        };
        println!("{} {stability}{marker}", release.version);
    }

    if any_available {
        println!();
        println!("  * = archive available for {platform}");
    }
}
