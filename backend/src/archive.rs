//! Archive extraction behind a small capability trait.
//!
//! The production implementation shells out to the system `unzip`, the same
//! utility the ops tooling already relies on. Everything going through
//! [`extract_archive`] is subject to the path-safety contract: every entry
//! name must resolve strictly inside the destination directory, otherwise
//! the whole archive is rejected before a single byte is written. A
//! malicious backup with a `../../etc/passwd` entry must die here.

use log::info;
use std::path::{Component, Path};
use std::process::Command;

/// Capability interface for unpacking an uploaded backup archive.
///
/// Implementations only unpack; the safety check lives in
/// [`extract_archive`] so it cannot be skipped by swapping extractors.
pub trait ArchiveExtractor {
    /// Entry names contained in the archive, without extracting anything.
    fn list_entries(&self, archive: &Path) -> Result<Vec<String>, String>;

    /// Unpacks the archive into `dest`, which already exists.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), String>;
}

/// Extractor backed by the system `unzip` binary.
pub struct SystemUnzip;

impl ArchiveExtractor for SystemUnzip {
    fn list_entries(&self, archive: &Path) -> Result<Vec<String>, String> {
        let output = Command::new("unzip")
            .arg("-Z1")
            .arg(archive)
            .output()
            .map_err(|e| format!("cannot run unzip: {}", e))?;

        if !output.status.success() {
            return Err(format!(
                "unzip -Z1 failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), String> {
        let output = Command::new("unzip")
            .arg("-o")
            .arg(archive)
            .arg("-d")
            .arg(dest)
            .output()
            .map_err(|e| format!("cannot run unzip: {}", e))?;

        if !output.status.success() {
            return Err(format!(
                "unzip failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(())
    }
}

/// True when the entry name, joined onto the extraction directory, cannot
/// resolve outside of it.
///
/// Purely lexical: absolute entries, drive-ish prefixes and any `..`
/// component are rejected. The check runs before extraction, so there is
/// nothing on disk to canonicalize yet.
pub fn entry_is_safe(entry: &str) -> bool {
    let path = Path::new(entry);
    if path.is_absolute() {
        return false;
    }
    path.components().all(|c| match c {
        Component::Normal(_) | Component::CurDir => true,
        Component::ParentDir | Component::RootDir | Component::Prefix(_) => false,
    })
}

/// Validates every entry of `archive` and then unpacks it into `dest`.
/// Returns the entry list on success.
pub fn extract_archive(
    extractor: &dyn ArchiveExtractor,
    archive: &Path,
    dest: &Path,
) -> Result<Vec<String>, String> {
    let entries = extractor.list_entries(archive)?;

    for entry in &entries {
        if !entry_is_safe(entry) {
            return Err(format!("archive entry escapes extraction dir: {}", entry));
        }
    }

    extractor.extract(archive, dest)?;
    info!("extracted {} entries into {}", entries.len(), dest.display());
    Ok(entries)
}
