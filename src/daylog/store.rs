use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::daylog::aggregate::DailySummary;
use crate::error::DaylogError;

pub const SUMMARY_PREFIX: &str = "activity";

pub fn summary_path(backups_dir: &Path, date: &str) -> PathBuf {
    backups_dir.join(format!("{SUMMARY_PREFIX}-{date}.json"))
}

/// Write `contents` next to `path` and rename it into place.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn save_summary(backups_dir: &Path, summary: &DailySummary) -> Result<PathBuf> {
    let path = summary_path(backups_dir, &summary.date);
    let mut json = serde_json::to_string_pretty(summary)?;
    json.push('\n');
    write_atomic(&path, json.as_bytes())?;
    Ok(path)
}

pub fn load_summary(backups_dir: &Path, date: &str) -> Result<DailySummary> {
    let path = summary_path(backups_dir, date);
    if !path.is_file() {
        return Err(DaylogError::ArtifactNotFound {
            kind: "activity summary",
            path: path.display().to_string(),
        }
        .into());
    }
    let raw =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: DailySummary = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(parsed)
}
