//! Build script for the goversion CLI.
//!
//! Exposes the short git commit as `GOVERSION_GIT_COMMIT` for `--version`.

use std::process::Command;

fn main() {
    let commit = git_commit();
    println!("cargo:rustc-env=GOVERSION_GIT_COMMIT={commit}");

    if let Some(toplevel) = git_toplevel() {
        println!("cargo:rerun-if-changed={toplevel}/.git/HEAD");
    }
}

/// Top-level directory of the enclosing git checkout.
fn git_toplevel() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .ok()?;

    if output.status.success() {
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !path.is_empty() {
            return Some(path);
        }
    }
    None
}

/// Short commit hash, or `unknown` outside a checkout.
fn git_commit() -> String {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output();

    if let Ok(output) = output
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !hash.is_empty() {
            return hash;
        }
    }

    "unknown".to_string()
}
