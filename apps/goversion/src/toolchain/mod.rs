//! Go toolchain download and installation.
//!
//! ## Module Structure
//!
//! - [`platform`] - OS and architecture detection
//! - [`release`] - Release metadata fetching and caching
//! - [`probe`] - Size and range-support probe for an archive URL
//! - [`chunk`] - Byte-range planning
//! - [`download`] - Concurrent range and sequential downloaders
//! - [`progress`] - Shared progress sink and terminal renderer
//! - [`archive`] - Gzip tar extraction
//! - [`prompt`] - Confirmation gates
//! - [`install`] - The upgrade pipeline
//! - [`local`] - Locally installed version wrappers

pub mod archive;
pub mod chunk;
pub mod download;
pub mod install;
pub mod local;
pub mod platform;
pub mod probe;
pub mod progress;
pub mod prompt;
pub mod release;

pub use install::{InstallManager, InstallOutcome};
pub use platform::Platform;
pub use progress::{ProgressSink, terminal_progress};
pub use prompt::{AssumeYes, Confirm, TerminalPrompt};
pub use release::{GoRelease, fetch_releases};
