//! Command modules for the goversion CLI.
//!
//! ## Global Toolchain
//!
//! - [`latest`] - Show the latest stable release and the local version
//! - [`upgrade`] - Replace the global installation with a new release
//!
//! ## Side-by-side Versions
//!
//! - [`list`] - List version wrappers installed in `$GOPATH/bin`
//! - [`versions`] - List remote releases
//! - [`install`] - Install a version wrapper via `golang.org/dl`

pub mod install;
pub mod latest;
pub mod list;
pub mod upgrade;
pub mod versions;
