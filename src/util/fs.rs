//! Filesystem helpers.

use std::io::Cursor;
use std::path::Path;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;

/// Create a directory and all parents if missing.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory `{}`", path.display()))
}

/// Remove a directory tree if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory `{}`", path.display()))?;
    }
    Ok(())
}

/// Unpack a gzipped tarball held in memory into `dest`.
///
/// Entries that would escape `dest` are rejected.
pub fn extract_tar_gz(data: &[u8], dest: &Path) -> Result<()> {
    ensure_dir(dest)?;

    let decoder = GzDecoder::new(Cursor::new(data));
    let mut archive = tar::Archive::new(decoder);

    for entry in archive.entries().context("failed to read archive")? {
        let mut entry = entry.context("failed to read archive entry")?;
        let path = entry.path().context("invalid path in archive")?;

        if path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            bail!("archive entry `{}` escapes the target directory", path.display());
        }

        let target = dest.join(&path);
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        entry
            .unpack(&target)
            .with_context(|| format!("failed to unpack `{}`", target.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn make_tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            // Write the path bytes directly so fixtures can contain `..`
            // components, which the checked `append_data` API refuses.
            {
                let gnu = header.as_gnu_mut().unwrap();
                gnu.name[..name.len()].copy_from_slice(name.as_bytes());
            }
            header.set_cksum();
            builder.append(&header, contents.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_extract_tar_gz() {
        let dir = TempDir::new().unwrap();
        let data = make_tar_gz(&[("release.toml", "version = \"1.0.0\"\n"), ("lib/a.so", "x")]);

        extract_tar_gz(&data, dir.path()).unwrap();

        let manifest = std::fs::read_to_string(dir.path().join("release.toml")).unwrap();
        assert!(manifest.contains("1.0.0"));
        assert!(dir.path().join("lib/a.so").is_file());
    }

    #[test]
    fn test_extract_rejects_parent_escape() {
        let dir = TempDir::new().unwrap();
        let data = make_tar_gz(&[("../evil.txt", "nope")]);
        assert!(extract_tar_gz(&data, dir.path()).is_err());
    }
}
