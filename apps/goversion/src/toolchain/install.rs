//! Upgrade pipeline: probe, download, extract, then replace the install root.
//!
//! Every step runs only after the previous one succeeded. Two confirmation
//! gates guard the pipeline: one before any network transfer and one before
//! the installation root is touched. A third is asked when the root's parent
//! directory does not look writable. Declining any of them returns
//! [`InstallOutcome::Declined`] with nothing modified.
//!
//! The swap is remove-then-move. A crash between the two steps leaves no
//! installation at all, which the overwrite prompt spells out.
//!
//! Temporary archives and extracted trees are not cleaned up when a later
//! step fails.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use reqwest::Client;
use tokio::runtime::{Handle, RuntimeFlavor};

use super::archive;
use super::download::{self, ConcurrentDownloader, SequentialDownloader, Strategy};
use super::probe;
use super::progress::ProgressSink;
use super::prompt::Confirm;
use crate::config::Config;
use crate::errors::InstallError;

/// Prefix for temporary archive files.
const TEMP_PREFIX: &str = "goversion-";

/// Result of a pipeline run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The new tree is in place at `root`.
    Installed {
        /// Version label of the installed release.
        version: String,
        /// The replaced installation root.
        root: PathBuf,
    },
    /// A confirmation prompt was declined; nothing was modified.
    Declined,
}

/// Runs the upgrade pipeline against one installation root.
pub struct InstallManager<C> {
    config: Config,
    client: Client,
    confirm: C,
    progress: Arc<ProgressSink>,
    temp_dir: PathBuf,
}

impl<C: Confirm> InstallManager<C> {
    /// Creates a manager that asks `confirm` before destructive steps.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        config: Config,
        confirm: C,
        progress: Arc<ProgressSink>,
    ) -> Result<Self, InstallError> {
        let client = download::http_client(config.request_timeout)?;
        Ok(Self {
            config,
            client,
            confirm,
            progress,
            temp_dir: std::env::temp_dir(),
        })
    }

    /// Places temporary archives under `dir` instead of the system temp directory.
    #[cfg(test)]
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Installs the archive at `url` as `version` into the configured root.
    ///
    /// # Errors
    ///
    /// Returns an [`InstallError`] naming the failed step. Steps that already
    /// completed are not rolled back.
    pub async fn install(&self, url: &str, version: &str) -> Result<InstallOutcome, InstallError> {
        if !self.ask(&format!("Do you upgrade go to {version}?"))? {
            info!("cancel");
            return Ok(InstallOutcome::Declined);
        }
        info!("target URL is {url}");

        let bytes = self.download(url).await?;
        let archive_path = self.write_archive(url, &bytes)?;
        drop(bytes);

        let extracted = archive::extract(&archive_path)?;
        let tree = extracted.join(&self.config.archive_root);
        if !tree.is_dir() {
            return Err(InstallError::MissingTree { path: tree });
        }

        let root = &self.config.install_root;
        let overwrite = format!(
            "Do you really overwrite {}? It is removed before the new tree is moved in; \
             an interruption in between leaves no Go installation.",
            root.display()
        );
        if !self.ask(&overwrite)? {
            info!("cancel");
            return Ok(InstallOutcome::Declined);
        }

        let parent = parent_of(root);
        if !is_writable(parent) {
            let privilege = format!(
                "{} does not look writable by the current user. Continue anyway?",
                parent.display()
            );
            if !self.ask(&privilege)? {
                info!("cancel");
                return Ok(InstallOutcome::Declined);
            }
        }

        replace_root(&tree, root)?;
        info!("upgrade success: {version} installed at {}", root.display());

        Ok(InstallOutcome::Installed {
            version: version.to_string(),
            root: root.clone(),
        })
    }

    /// Runs the blocking confirmation without stalling other runtime tasks.
    fn ask(&self, prompt: &str) -> Result<bool, InstallError> {
        let confirm = || self.confirm.confirm(prompt);
        let answer = match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(confirm)
            }
            // `block_in_place` panics on a current-thread runtime.
            _ => confirm(),
        };
        answer.map_err(|source| InstallError::Prompt { source })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, InstallError> {
        let target = probe::probe(&self.client, url).await?;
        let bytes = match Strategy::for_target(&target) {
            Strategy::Concurrent => {
                ConcurrentDownloader::new(
                    self.client.clone(),
                    self.config.workers,
                    Arc::clone(&self.progress),
                )
                .download(&target)
                .await?
            }
            Strategy::Sequential => {
                SequentialDownloader::new(self.client.clone(), Arc::clone(&self.progress))
                    .download(url)
                    .await?
            }
        };
        Ok(bytes)
    }

    /// Writes the download to a uniquely named file that keeps the archive name.
    fn write_archive(&self, url: &str, bytes: &[u8]) -> Result<PathBuf, InstallError> {
        let suffix = format!("-{}", archive_file_name(url));
        let mut file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(&suffix)
            .tempfile_in(&self.temp_dir)
            .map_err(|source| InstallError::TempFile { source })?;
        file.write_all(bytes)
            .and_then(|()| file.flush())
            .map_err(|source| InstallError::TempFile { source })?;

        let (_, path) = file
            .keep()
            .map_err(|e| InstallError::TempFile { source: e.error })?;
        debug!("archive written to {}", path.display());
        Ok(path)
    }
}

/// Last path segment of `url` without query or fragment.
fn archive_file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => "go.tar.gz",
    }
}

fn parent_of(root: &Path) -> &Path {
    root.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Whether files can be created in `dir` or, if it is missing, its nearest existing ancestor.
fn is_writable(dir: &Path) -> bool {
    dir.ancestors()
        .find(|p| p.exists())
        .is_some_and(|existing| tempfile::tempfile_in(existing).is_ok())
}

/// Removes `root` and moves `tree` into its place.
fn replace_root(tree: &Path, root: &Path) -> Result<(), InstallError> {
    match std::fs::remove_dir_all(root) {
        Ok(()) => debug!("removed {}", root.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(InstallError::remove(root.to_path_buf(), e)),
    }

    std::fs::create_dir_all(parent_of(root))
        .map_err(|e| InstallError::moving(tree.to_path_buf(), root.to_path_buf(), e))?;

    match std::fs::rename(tree, root) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            warn!(
                "{} and {} are on different filesystems; copying",
                tree.display(),
                root.display()
            );
            copy_tree(tree, root)
                .and_then(|()| std::fs::remove_dir_all(tree))
                .map_err(|e| InstallError::moving(tree.to_path_buf(), root.to_path_buf(), e))
        }
        Err(e) => Err(InstallError::moving(
            tree.to_path_buf(),
            root.to_path_buf(),
            e,
        )),
    }
}

/// Recursively copies `from` to the new directory `to`, keeping permissions.
fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::create_dir(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = to.join(entry.file_name());
        if file_type.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else if file_type.is_symlink() {
            copy_symlink(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    std::fs::set_permissions(to, std::fs::metadata(from)?.permissions())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(std::fs::read_link(from)?, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::copy(from, to).map(|_| ())
}
