//! Platform variant detection.
//!
//! A variant is the tuple (os family, os version, architecture, build
//! configuration) that selects which prebuilt artifact applies to this host.

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;

/// Debug or release build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuildConfig {
    Debug,
    Release,
}

impl BuildConfig {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildConfig::Debug => "debug",
            BuildConfig::Release => "release",
        }
    }
}

impl fmt::Display for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The host platform tuple a prebuilt artifact is keyed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub os_family: String,
    pub os_version: String,
    pub arch: String,
    pub build_config: BuildConfig,
}

impl Variant {
    /// Detect the current host variant.
    ///
    /// On Linux, OS family and version come from `/etc/os-release`
    /// (`ID` and `VERSION_ID`); elsewhere, from platform constants.
    pub fn detect(build_config: BuildConfig) -> Self {
        let (os_family, os_version) = detect_os();
        Variant {
            os_family,
            os_version,
            arch: normalize_arch(std::env::consts::ARCH),
            build_config,
        }
    }

    /// Relative install path for this variant,
    /// `<os>/<os-version>/<arch>/<build>`.
    pub fn install_subpath(&self) -> PathBuf {
        PathBuf::from(&self.os_family)
            .join(&self.os_version)
            .join(&self.arch)
            .join(self.build_config.as_str())
    }

    /// Release-asset file name for a package at a given tag.
    pub fn asset_file_name(&self, package: &str, tag: &str) -> String {
        format!(
            "{package}-{}-{}-{}-{}-{tag}.tar.gz",
            self.os_family, self.os_version, self.arch, self.build_config
        )
    }

    /// Same asset name for the opposite build configuration. Used by the
    /// index command to report packages that only publish one configuration.
    pub fn counterpart(&self) -> Variant {
        let build_config = match self.build_config {
            BuildConfig::Debug => BuildConfig::Release,
            BuildConfig::Release => BuildConfig::Debug,
        };
        Variant {
            build_config,
            ..self.clone()
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.os_family, self.os_version, self.arch, self.build_config
        )
    }
}

fn detect_os() -> (String, String) {
    if cfg!(target_os = "linux") {
        if let Ok(text) = std::fs::read_to_string("/etc/os-release") {
            return parse_os_release(&text);
        }
    }
    (std::env::consts::OS.to_string(), "unknown".to_string())
}

fn parse_os_release(text: &str) -> (String, String) {
    let mut id = std::env::consts::OS.to_string();
    let mut version_id = "unknown".to_string();
    for line in text.lines() {
        if let Some(value) = line.strip_prefix("ID=") {
            id = value.trim_matches('"').to_string();
        } else if let Some(value) = line.strip_prefix("VERSION_ID=") {
            version_id = value.trim_matches('"').to_string();
        }
    }
    (id, version_id)
}

/// Map the toolchain's architecture name onto the name artifacts use.
pub fn normalize_arch(arch: &str) -> String {
    match arch {
        "amd64" | "x64" | "x86_64" => "x86_64",
        "i386" | "i486" | "i586" | "i686" | "x86" => "x86",
        "aarch64" | "arm64" => "arm64",
        "armv7l" | "armv7" | "arm" => "arm",
        other => other,
    }
    .to_string()
}
