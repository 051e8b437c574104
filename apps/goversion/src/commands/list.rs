//! List command for the goversion CLI.
//!
//! Displays the side-by-side Go versions installed in `$GOPATH/bin`,
//! newest first.
//!
//! ## Usage
//!
//! ```bash
//! goversion list
//! ```
//!
//! ## Output Format
//!
//! ```text
//! go1.22.3
//! go1.21.10
//! go1.21rc2
//! ```

use anyhow::Result;

use crate::toolchain::local::{gopath, installed_versions};

/// Executes the list command.
///
/// # Errors
///
/// Returns an error if `GOPATH` cannot be determined or its `bin` directory
/// cannot be read.
pub fn execute() -> Result<()> {
    let Some(gopath) = gopath()? else {
        println!("GOPATH is not set.");
        return Ok(());
    };

    let bin = gopath.join("bin");
    let versions = if bin.is_dir() {
        installed_versions(&bin)?
    } else {
        Vec::new()
    };

    if versions.is_empty() {
        println!("No Go versions installed in {}.", bin.display());
        println!();
        println!("Run 'goversion install <version>' to install one.");
        return Ok(());
    }

    for version in &versions {
        println!("{version}");
    }
    Ok(())
}
