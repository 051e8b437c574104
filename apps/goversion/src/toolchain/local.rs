//! Locally installed Go toolchains.
//!
//! Side-by-side versions are installed as `goX.Y.Z` wrapper binaries in
//! `$GOPATH/bin` by `golang.org/dl`. This module finds them and queries the
//! `go` command on PATH.

use anyhow::{Context, Result, bail};
use regex::Captures;
use regex::Regex;
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use crate::errors::GoversionError;

/// Release stage ordering: betas before release candidates before releases.
const STAGE_BETA: u8 = 0;
const STAGE_RC: u8 = 1;
const STAGE_RELEASE: u8 = 2;

/// Sort key for a wrapper name: `(major, minor, patch, stage, stage number)`.
type VersionKey = (u64, u64, u64, u8, u64);

fn wrapper_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^go(\d+)(?:\.(\d+))?(?:(rc|beta)(\d+)|\.(\d+))?$").ok())
        .as_ref()
}

/// Parses a wrapper binary name such as `go1.21.3` or `go1.22rc1`.
fn version_key(name: &str) -> Option<VersionKey> {
    let caps = wrapper_pattern()?.captures(name)?;
    let number = |caps: &Captures<'_>, i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };

    let (stage, stage_number) = match caps.get(3).map(|m| m.as_str()) {
        Some("beta") => (STAGE_BETA, number(&caps, 4)),
        Some(_) => (STAGE_RC, number(&caps, 4)),
        None => (STAGE_RELEASE, 0),
    };
    Some((
        number(&caps, 1),
        number(&caps, 2),
        number(&caps, 5),
        stage,
        stage_number,
    ))
}

/// Whether `name` looks like a Go version wrapper binary.
#[must_use]
pub fn is_version_wrapper(name: &str) -> bool {
    version_key(name).is_some()
}

/// Sorts wrapper names newest first.
pub fn sort_newest_first(names: &mut [String]) {
    names.sort_by_key(|name| Reverse(version_key(name)));
}

/// Lists the version wrappers in `bin_dir`, newest first.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn installed_versions(bin_dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(bin_dir)
        .with_context(|| format!("read {}", bin_dir.display()))?;

    let mut versions: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_version_wrapper(name))
        .collect();
    sort_newest_first(&mut versions);
    Ok(versions)
}

/// Runs `go env NAME` and returns its trimmed output.
///
/// # Errors
///
/// Returns [`GoversionError::ToolNotFound`] if `go` is not on PATH, or an
/// error if the command fails.
pub fn go_env(name: &str) -> Result<String> {
    let go = which::which("go").map_err(|_| GoversionError::ToolNotFound {
        tool: "go".to_string(),
    })?;

    let output = Command::new(&go)
        .args(["env", name])
        .output()
        .with_context(|| format!("run {} env {name}", go.display()))?;
    if !output.status.success() {
        bail!(
            "go env {name}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Resolves the first `GOPATH` entry, from the environment or `go env GOPATH`.
///
/// # Errors
///
/// Returns an error if `GOPATH` is unset and `go env GOPATH` cannot be run.
pub fn gopath() -> Result<Option<PathBuf>> {
    let from_env = std::env::var_os("GOPATH")
        .filter(|value| !value.is_empty())
        .and_then(|value| std::env::split_paths(&value).next());
    if let Some(path) = from_env {
        return Ok(Some(path));
    }

    let value = go_env("GOPATH")?;
    Ok(std::env::split_paths(&value)
        .next()
        .filter(|p| !p.as_os_str().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn recognizes_wrapper_names() {
        for name in ["go1.21.3", "go1.22", "go1.22rc1", "go1.21beta2", "go1.9"] {
            assert!(is_version_wrapper(name), "{name}");
        }
        for name in ["go", "gofmt", "gopls", "go1.21.3.exe", "go1.x", "staticcheck"] {
            assert!(!is_version_wrapper(name), "{name}");
        }
    }

    #[test]
    fn sorts_by_release_numbers_not_text() {
        let mut names: Vec<String> = [
            "go1.9.7",
            "go1.21.10",
            "go1.21.3",
            "go1.22rc1",
            "go1.22beta1",
            "go1.22.0",
            "go1.21",
        ]
        .map(String::from)
        .to_vec();
        sort_newest_first(&mut names);
        assert_eq!(
            names,
            [
                "go1.22.0",
                "go1.22rc1",
                "go1.22beta1",
                "go1.21.10",
                "go1.21.3",
                "go1.21",
                "go1.9.7",
            ]
        );
    }

    #[test]
    fn installed_versions_filters_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        for name in ["go1.21.3", "go1.22.1", "gopls", "dlv", "go1.20rc2"] {
            std::fs::write(temp.path().join(name), b"").expect("write");
        }

        let versions = installed_versions(temp.path()).expect("list");
        assert_eq!(versions, ["go1.22.1", "go1.21.3", "go1.20rc2"]);
    }

    #[test]
    fn installed_versions_reports_missing_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = installed_versions(&temp.path().join("bin")).expect_err("missing");
        assert!(err.to_string().contains("bin"));
    }

    #[test]
    #[serial]
    fn gopath_prefers_environment() {
        let saved = std::env::var_os("GOPATH");
        // SAFETY: serialized with every other environment test.
        unsafe { std::env::set_var("GOPATH", "/home/gopher/go") };

        let result = gopath();

        unsafe {
            match saved {
                Some(v) => std::env::set_var("GOPATH", v),
                None => std::env::remove_var("GOPATH"),
            }
        }
        assert_eq!(
            result.expect("gopath"),
            Some(PathBuf::from("/home/gopher/go"))
        );
    }
}
