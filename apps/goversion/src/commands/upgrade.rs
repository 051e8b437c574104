//! Upgrade command for the goversion CLI.
//!
//! Replaces the global Go installation (default `/usr/local/go`) with the
//! latest stable release or a specific version.
//!
//! ## Usage
//!
//! ```bash
//! goversion upgrade                 # Latest stable release
//! goversion upgrade 1.22.3          # Specific release
//! goversion upgrade --yes --root ~/sdk/go --workers 8
//! ```

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::errors::GoversionError;
use crate::toolchain::release::{
    download_url, fetch_releases, find_release, latest_stable, normalize_version, version_label,
};
use crate::toolchain::{
    AssumeYes, Confirm, InstallManager, InstallOutcome, ProgressSink, TerminalPrompt,
    terminal_progress,
};

/// Arguments for the upgrade command.
#[derive(Args)]
pub struct UpgradeArgs {
    /// Version to install (e.g., "1.22.3" or "go1.22.3").
    ///
    /// If omitted, installs the latest stable release.
    pub version: Option<String>,

    /// Answer yes to every confirmation prompt.
    #[clap(long, short = 'y')]
    pub yes: bool,

    /// Number of concurrent range requests.
    #[clap(long, short = 'w')]
    pub workers: Option<usize>,

    /// Installation root to replace.
    #[clap(long)]
    pub root: Option<PathBuf>,
}

/// A resolved archive to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArchive {
    /// Version label shown in prompts.
    pub version: String,
    /// Archive download URL.
    pub url: String,
}

/// Executes the upgrade command.
///
/// # Process
///
/// 1. Resolve the release and its archive for this platform
/// 2. Confirm, then probe and download the archive
/// 3. Extract it next to the temporary archive file
/// 4. Confirm, then replace the installation root
///
/// # Errors
///
/// Returns an error if the release cannot be resolved or any pipeline step
/// fails. Declining a prompt is not an error.
pub async fn execute(args: &UpgradeArgs) -> Result<()> {
    let config = Config::from_env()?
        .with_workers(args.workers)
        .with_install_root(args.root.clone());

    let archive = resolve_archive(&config, args.version.as_deref()).await?;
    let progress = Arc::new(ProgressSink::new(terminal_progress()));

    let outcome = if args.yes {
        install(config, AssumeYes, progress, &archive).await?
    } else {
        install(config, TerminalPrompt, progress, &archive).await?
    };

    match outcome {
        InstallOutcome::Installed { version, root } => {
            println!("Go {version} installed at {}.", root.display());
        }
        InstallOutcome::Declined => println!("Upgrade cancelled."),
    }
    Ok(())
}

async fn install<C: Confirm>(
    config: Config,
    confirm: C,
    progress: Arc<ProgressSink>,
    archive: &ResolvedArchive,
) -> Result<InstallOutcome> {
    let manager = InstallManager::new(config, confirm, progress)?;
    manager
        .install(&archive.url, &archive.version)
        .await
        .with_context(|| format!("upgrade go to {}", archive.version))
}

/// Finds the archive URL for `version`, or for the latest stable release.
///
/// # Errors
///
/// Returns an error if the release list cannot be fetched, the version does
/// not exist, or the release has no archive for the configured platform.
pub async fn resolve_archive(config: &Config, version: Option<&str>) -> Result<ResolvedArchive> {
    let releases = fetch_releases(config, version.is_some())
        .await
        .context("get download URL")?;

    let release = match version {
        None => latest_stable(&releases).context("release list is empty")?,
        Some(v) => find_release(&releases, v)
            .ok_or_else(|| GoversionError::release_not_found(normalize_version(v)))?,
    };

    let file = release
        .archive_for(config.platform)
        .ok_or_else(|| GoversionError::NoArchive {
            version: release.version.clone(),
            platform: config.platform.to_string(),
        })?;

    let url = download_url(config, file);
    let version = version_label(&file.filename)
        .map_or_else(|| release.version.clone(), str::to_string);
    Ok(ResolvedArchive { version, url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::Platform;

    const RELEASES: &str = r#"[
        {"version": "go1.22.3", "stable": true, "files": [
            {"filename": "go1.22.3.linux-amd64.tar.gz", "os": "linux", "arch": "amd64",
             "version": "go1.22.3", "sha256": "", "size": 1, "kind": "archive"}
        ]},
        {"version": "go1.21.10", "stable": true, "files": [
            {"filename": "go1.21.10.darwin-arm64.tar.gz", "os": "darwin", "arch": "arm64",
             "version": "go1.21.10", "sha256": "", "size": 1, "kind": "archive"}
        ]}
    ]"#;

    fn config_for(server: &mockito::ServerGuard) -> Config {
        let mut config = Config::new(Platform::LinuxAmd64);
        config.release_url = format!("{}/dl/?mode=json", server.url());
        config.download_base = format!("{}/files/", server.url());
        config.cache_dir = None;
        config
    }

    async fn serve(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/dl/")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(RELEASES)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn resolves_latest_stable_archive() {
        let mut server = mockito::Server::new_async().await;
        let _m = serve(&mut server).await;
        let config = config_for(&server);

        let archive = resolve_archive(&config, None).await.expect("resolve");
        assert_eq!(archive.version, "go1.22.3");
        assert_eq!(
            archive.url,
            format!("{}/files/go1.22.3.linux-amd64.tar.gz", server.url())
        );
    }

    #[tokio::test]
    async fn unknown_version_is_release_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = serve(&mut server).await;
        let config = config_for(&server);

        let err = resolve_archive(&config, Some("1.99.0"))
            .await
            .expect_err("unknown");
        assert!(matches!(
            err.downcast_ref::<GoversionError>(),
            Some(GoversionError::ReleaseNotFound { version }) if version == "go1.99.0"
        ));
    }

    #[tokio::test]
    async fn release_without_platform_archive_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _m = serve(&mut server).await;
        let config = config_for(&server);

        let err = resolve_archive(&config, Some("go1.21.10"))
            .await
            .expect_err("no linux archive");
        assert!(matches!(
            err.downcast_ref::<GoversionError>(),
            Some(GoversionError::NoArchive { .. })
        ));
    }
}
