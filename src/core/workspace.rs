//! Workspace discovery and directory layout.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::variant::Variant;

/// Name of the workspace configuration file.
pub const CONFIG_FILE_NAME: &str = "caravel.toml";

/// A located workspace root. All package paths derive from here.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Walk up from `start` until a directory containing `caravel.toml`
    /// is found.
    pub fn find(start: &Path) -> Result<Self> {
        let mut dir = start.to_path_buf();
        loop {
            if dir.join(CONFIG_FILE_NAME).is_file() {
                return Ok(Workspace { root: dir });
            }
            if !dir.pop() {
                bail!(
                    "no {} found in `{}` or any parent directory",
                    CONFIG_FILE_NAME,
                    start.display()
                );
            }
        }
    }

    /// Wrap an already-known root without probing for the config file.
    pub fn at(root: PathBuf) -> Self {
        Workspace { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Directory holding source checkouts, one per package.
    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    /// Root of the unpacked-artifact tree.
    pub fn install_root(&self) -> PathBuf {
        self.root.join("install")
    }

    pub fn package_source_dir(&self, name: &str) -> PathBuf {
        self.src_dir().join(name)
    }

    /// Install directory for a package under a specific variant.
    pub fn installed_dir(&self, name: &str, variant: &Variant) -> PathBuf {
        self.install_root().join(name).join(variant.install_subpath())
    }

    /// Package names with a source checkout, sorted for determinism.
    pub fn discover_source_packages(&self) -> Result<Vec<String>> {
        let src = self.src_dir();
        if !src.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&src)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Package names with at least one installed variant, sorted.
    pub fn discover_installed_packages(&self) -> Result<Vec<String>> {
        let install = self.install_root();
        if !install.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&install)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
