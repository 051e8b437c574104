//! Platform detection for Go release archives.
//!
//! Go publishes gzip tar archives named `goX.Y.Z.<os>-<arch>.tar.gz`. This
//! module maps the compile-time target onto Go's `GOOS`/`GOARCH` names so
//! the matching archive can be picked from the release metadata.
//!
//! ## Supported Platforms
//!
//! - Linux `x86_64` (`linux-amd64`)
//! - Linux ARM64 (`linux-arm64`)
//! - macOS `x86_64` (`darwin-amd64`)
//! - macOS ARM64 (`darwin-arm64`)

use anyhow::{Result, bail};
use std::fmt;

/// A target with a published gzip tar Go archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(dead_code)]
pub enum Platform {
    /// Linux on `x86_64`
    LinuxAmd64,
    /// Linux on ARM64
    LinuxArm64,
    /// macOS on `x86_64`
    DarwinAmd64,
    /// macOS on ARM64 (Apple Silicon)
    DarwinArm64,
}

impl Platform {
    /// Detects the current platform based on compile-time configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the current OS/architecture combination has no
    /// gzip tar distribution.
    pub fn detect() -> Result<Self> {
        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        {
            return Ok(Self::LinuxAmd64);
        }

        #[cfg(all(target_os = "linux", target_arch = "aarch64"))]
        {
            return Ok(Self::LinuxArm64);
        }

        #[cfg(all(target_os = "macos", target_arch = "x86_64"))]
        {
            return Ok(Self::DarwinAmd64);
        }

        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        {
            return Ok(Self::DarwinArm64);
        }

        #[allow(unreachable_code)]
        {
            bail!(
                "Unsupported platform: {} on {}. \
                 Supported platforms are: linux-amd64, linux-arm64, darwin-amd64, darwin-arm64",
                std::env::consts::OS,
                std::env::consts::ARCH
            );
        }
    }

    /// Returns the `GOOS` value for this platform.
    #[must_use = "returns the OS string without side effects"]
    pub fn os(self) -> &'static str {
        match self {
            Self::LinuxAmd64 | Self::LinuxArm64 => "linux",
            Self::DarwinAmd64 | Self::DarwinArm64 => "darwin",
        }
    }

    /// Returns the `GOARCH` value for this platform.
    #[must_use = "returns the architecture string without side effects"]
    pub fn arch(self) -> &'static str {
        match self {
            Self::LinuxAmd64 | Self::DarwinAmd64 => "amd64",
            Self::LinuxArm64 | Self::DarwinArm64 => "arm64",
        }
    }

    /// Returns the `<os>-<arch>` identifier used in archive file names.
    #[must_use = "returns the platform string without side effects"]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinuxAmd64 => "linux-amd64",
            Self::LinuxArm64 => "linux-arm64",
            Self::DarwinAmd64 => "darwin-amd64",
            Self::DarwinArm64 => "darwin-arm64",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Platform; 4] = [
        Platform::LinuxAmd64,
        Platform::LinuxArm64,
        Platform::DarwinAmd64,
        Platform::DarwinArm64,
    ];

    #[test]
    fn as_str_joins_os_and_arch() {
        for platform in ALL {
            assert_eq!(
                platform.as_str(),
                format!("{}-{}", platform.os(), platform.arch())
            );
        }
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(format!("{}", Platform::LinuxAmd64), "linux-amd64");
        assert_eq!(format!("{}", Platform::DarwinArm64), "darwin-arm64");
    }

    #[test]
    fn detect_returns_platform_on_supported_system() {
        let result = Platform::detect();
        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        assert!(matches!(result, Ok(Platform::LinuxAmd64)));

        #[cfg(all(target_os = "linux", target_arch = "aarch64"))]
        assert!(matches!(result, Ok(Platform::LinuxArm64)));

        #[cfg(all(target_os = "macos", target_arch = "x86_64"))]
        assert!(matches!(result, Ok(Platform::DarwinAmd64)));

        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        assert!(matches!(result, Ok(Platform::DarwinArm64)));

        #[cfg(target_os = "windows")]
        assert!(result.is_err());
    }
}
