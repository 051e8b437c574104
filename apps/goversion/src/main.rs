#![warn(clippy::pedantic)]

//! # goversion
//!
//! Upgrades the global Go installation and manages side-by-side Go versions.
//!
//! ## Subcommands
//!
//! - `latest` - Show the latest stable release and the local version
//! - `upgrade` - Replace the global installation with a new release
//! - `list` - List side-by-side versions in `$GOPATH/bin`
//! - `versions` - List remote releases
//! - `install` - Install a side-by-side version
//!
//! ## Examples
//!
//! Upgrade to the latest stable release:
//! ```bash
//! sudo goversion upgrade
//! ```
//!
//! Upgrade a user-owned installation without prompts:
//! ```bash
//! goversion upgrade --yes --root ~/sdk/go
//! ```

mod commands;
mod config;
mod errors;
mod toolchain;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{install, latest, list, upgrade, versions};
use errors::GoversionError;
use std::io::Write;

/// Go toolchain upgrade and version manager.
#[derive(Parser)]
#[command(
    name = "goversion",
    author,
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GOVERSION_GIT_COMMIT"), ")"),
    about = "Upgrade Go and manage side-by-side Go versions",
    after_help = "\
ENVIRONMENT VARIABLES:
    GOVERSION_WORKERS        Concurrent range requests (default: 4 x CPU count)
    GOVERSION_ROOT           Installation root (default: /usr/local/go)
    GOVERSION_RELEASE_URL    Release metadata endpoint (default: https://go.dev/dl/?mode=json)
    GOVERSION_DOWNLOAD_BASE  Archive download base (default: https://dl.google.com/go/)
    GOVERSION_CACHE_DIR      Release metadata cache directory
    RUST_LOG                 Log filter (default: info)"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the goversion CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Show the latest stable Go release.
    ///
    /// Also prints the version of the `go` command on PATH, if any.
    Latest,

    /// Upgrade the global Go installation.
    ///
    /// Downloads the release archive with concurrent range requests,
    /// extracts it, and replaces the installation root after confirmation.
    Upgrade(upgrade::UpgradeArgs),

    /// List side-by-side Go versions installed in $GOPATH/bin.
    List,

    /// List available Go releases.
    Versions(versions::VersionsArgs),

    /// Install a side-by-side Go version via golang.org/dl.
    Install(install::InstallArgs),
}

#[tokio::main]
async fn main() {
    init_logger();
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Logs to stderr as `[LEVEL] message`; `RUST_LOG` overrides the `info` default.
fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

/// Handles an error and returns the appropriate exit code.
///
/// For `ProcessExitCode` errors, returns the embedded exit code without
/// printing an error message (the subprocess already printed its output).
/// For all other errors, prints the error and returns exit code 1.
fn handle_error(e: &anyhow::Error) -> i32 {
    if let Some(GoversionError::ProcessExitCode { code }) = e.downcast_ref::<GoversionError>() {
        return *code;
    }
    eprintln!("Error: {e:?}");
    1
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Latest => latest::execute().await,
        Commands::Upgrade(args) => upgrade::execute(&args).await,
        Commands::List => list::execute(),
        Commands::Versions(args) => versions::execute(&args).await,
        Commands::Install(args) => install::execute(&args),
    }
}
