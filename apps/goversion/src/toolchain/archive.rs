//! Gzip tar extraction for downloaded Go archives.
//!
//! The archive is decompressed completely before anything touches the disk,
//! so a corrupt download fails with [`ExtractError::Decompress`] and leaves
//! no partial tree behind. The tar stream is then unpacked in entry order
//! into a fresh directory named after the archive file.

use flate2::read::GzDecoder;
use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;

use crate::errors::ExtractError;

/// Suffixes stripped from the archive file name to name the destination.
const ARCHIVE_SUFFIXES: [&str; 2] = [".tar.gz", ".tgz"];

/// Permission bits kept from tar headers.
const MODE_MASK: u32 = 0o7777;

/// Returns the directory an archive is extracted into.
///
/// The destination sits next to the archive and is named by stripping the
/// archive suffix, so `/tmp/123-go1.22.3.linux-amd64.tar.gz` extracts into
/// `/tmp/123-go1.22.3.linux-amd64`.
///
/// # Errors
///
/// Returns [`ExtractError::ArchiveName`] if the file name has no known suffix.
pub fn destination_for(archive: &Path) -> Result<PathBuf, ExtractError> {
    let name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ExtractError::ArchiveName {
            path: archive.to_path_buf(),
        })?;

    ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
        .map(|stem| archive.with_file_name(stem))
        .ok_or_else(|| ExtractError::ArchiveName {
            path: archive.to_path_buf(),
        })
}

/// Extracts a gzip tar archive and returns the directory holding its tree.
///
/// # Errors
///
/// Returns an error if:
/// - The archive cannot be opened or is not valid gzip
/// - The destination directory already exists or cannot be created
/// - An entry path is absolute or escapes the destination
/// - A directory or file cannot be created or written
pub fn extract(archive: &Path) -> Result<PathBuf, ExtractError> {
    let destination = destination_for(archive)?;

    let file = File::open(archive).map_err(|source| ExtractError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let tar_bytes = decompress(file).map_err(|source| ExtractError::Decompress {
        path: archive.to_path_buf(),
        source,
    })?;
    debug!(
        "decompressed {} into {} bytes",
        archive.display(),
        tar_bytes.len()
    );

    create_destination(&destination)?;
    unpack(&tar_bytes, &destination)?;

    info!("extracted {} to {}", archive.display(), destination.display());
    Ok(destination)
}

fn decompress(reader: impl Read) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    GzDecoder::new(reader).read_to_end(&mut buffer)?;
    Ok(buffer)
}

fn create_destination(path: &Path) -> Result<(), ExtractError> {
    let mut builder = std::fs::DirBuilder::new();
    set_dir_mode(&mut builder, 0o755);
    builder.create(path).map_err(|source| {
        if source.kind() == io::ErrorKind::AlreadyExists {
            ExtractError::DestinationExists {
                path: path.to_path_buf(),
            }
        } else {
            ExtractError::CreateDestination {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Unpacks an uncompressed tar stream into an existing directory.
fn unpack(tar_bytes: &[u8], destination: &Path) -> Result<(), ExtractError> {
    let mut archive = Archive::new(tar_bytes);
    let entries = archive
        .entries()
        .map_err(|source| ExtractError::ReadEntry { source })?;

    for entry in entries {
        let mut entry = entry.map_err(|source| ExtractError::ReadEntry { source })?;
        let entry_path = entry
            .path()
            .map_err(|source| ExtractError::ReadEntry { source })?
            .into_owned();

        if !is_contained(&entry_path) {
            return Err(ExtractError::UnsafePath { path: entry_path });
        }

        let mode = entry
            .header()
            .mode()
            .map_err(|source| ExtractError::ReadEntry { source })?
            & MODE_MASK;
        let output_path = destination.join(&entry_path);
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            create_dir(&output_path, mode)?;
        } else if entry_type.is_file() {
            write_file(&mut entry, &output_path, mode)?;
        } else {
            warn!(
                "skipping {} ({entry_type:?} entries are not extracted)",
                entry_path.display()
            );
        }
    }

    Ok(())
}

/// Entry paths must be relative and free of `..`.
fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn create_dir(path: &Path, mode: u32) -> Result<(), ExtractError> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    set_dir_mode(&mut builder, mode);
    match builder.create(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(source) => {
            return Err(ExtractError::CreateDir {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    // Also covers directories already created as parents of earlier files.
    apply_mode(path, mode).map_err(|source| ExtractError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(entry: &mut impl Read, path: &Path, mode: u32) -> Result<(), ExtractError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ExtractError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    set_file_mode(&mut options, mode);
    let mut file = options.open(path).map_err(|source| ExtractError::CreateFile {
        path: path.to_path_buf(),
        source,
    })?;

    io::copy(entry, &mut file).map_err(|source| ExtractError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    // The creation mode is filtered by the umask.
    apply_mode(path, mode).map_err(|source| ExtractError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn set_dir_mode(builder: &mut std::fs::DirBuilder, mode: u32) {
    use std::os::unix::fs::DirBuilderExt;
    builder.mode(mode);
}

#[cfg(not(unix))]
fn set_dir_mode(_builder: &mut std::fs::DirBuilder, _mode: u32) {}

#[cfg(unix)]
fn set_file_mode(options: &mut std::fs::OpenOptions, mode: u32) {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(mode);
}

#[cfg(not(unix))]
fn set_file_mode(_options: &mut std::fs::OpenOptions, _mode: u32) {}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn apply_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
