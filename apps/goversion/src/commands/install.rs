//! Install command for the goversion CLI.
//!
//! Installs a side-by-side Go version using the `golang.org/dl` wrappers,
//! leaving the global installation untouched.
//!
//! ## Usage
//!
//! ```bash
//! goversion install go1.21.10
//! goversion install 1.22rc1
//! ```

use anyhow::{Context, Result};
use clap::Args;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::errors::GoversionError;
use crate::toolchain::local::gopath;
use crate::toolchain::release::normalize_version;

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Version to install (e.g., "go1.21.10" or "1.21.10").
    pub version: String,
}

/// Executes the install command.
///
/// # Process
///
/// 1. `go install golang.org/dl/VERSION@latest` builds the wrapper
/// 2. `VERSION download` fetches the toolchain into `~/sdk/VERSION`
///
/// # Errors
///
/// Returns an error if `go` is not on PATH, or
/// [`GoversionError::ProcessExitCode`] if either step exits non-zero.
pub fn execute(args: &InstallArgs) -> Result<()> {
    let version = normalize_version(&args.version);
    let go = which::which("go").map_err(|_| GoversionError::ToolNotFound {
        tool: "go".to_string(),
    })?;

    let target = format!("golang.org/dl/{version}@latest");
    info!("run: go install {target}");
    run_step(
        Command::new(&go).args(["install", &target]),
        &format!("install {version}"),
    )?;

    let wrapper = wrapper_path(&version);
    info!("run: {version} download");
    run_step(
        Command::new(&wrapper).arg("download"),
        &format!("download {version}"),
    )?;

    info!("install success");
    println!("Run '{version} version' to use it.");
    Ok(())
}

/// The wrapper binary in `$GOPATH/bin`, or the bare name for a PATH lookup.
fn wrapper_path(version: &str) -> PathBuf {
    gopath()
        .ok()
        .flatten()
        .map(|p| p.join("bin").join(version))
        .filter(|p| p.is_file())
        .unwrap_or_else(|| PathBuf::from(version))
}

/// Runs a subprocess with inherited stdio, naming `step` if it fails.
fn run_step(cmd: &mut Command, step: &str) -> Result<()> {
    let program = Path::new(cmd.get_program()).display().to_string();
    let status = cmd
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("{step}: failed to execute {program}"))?;

    if !status.success() {
        let code = status.code().unwrap_or(1);
        error!("{step}: {program} exited with code {code}");
        return Err(GoversionError::process_exit_code(code).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn failing_step_carries_exit_code() {
        let err = run_step(Command::new("sh").args(["-c", "exit 3"]), "install go1.0")
            .expect_err("exit 3");
        assert!(matches!(
            err.downcast_ref::<GoversionError>(),
            Some(GoversionError::ProcessExitCode { code: 3 })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn successful_step_is_ok() {
        run_step(Command::new("sh").args(["-c", "exit 0"]), "noop").expect("exit 0");
    }

    #[test]
    fn missing_program_names_the_step() {
        let err = run_step(
            &mut Command::new("/nonexistent/goversion-test-binary"),
            "download go1.0",
        )
        .expect_err("missing binary");
        assert!(err.to_string().starts_with("download go1.0"));
    }
}
