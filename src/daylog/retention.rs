use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::daylog::store::SUMMARY_PREFIX;

const SECS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, Default)]
pub struct RetentionOutcome {
    pub days: u64,
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl RetentionOutcome {
    pub fn summary_line(&self) -> String {
        format!(
            "retention days={} removed={} failed={}",
            self.days,
            self.removed.len(),
            self.failed.len()
        )
    }
}

fn is_summary_file(path: &Path) -> bool {
    path.is_file()
        && path.extension().and_then(|e| e.to_str()) == Some("json")
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&format!("{SUMMARY_PREFIX}-")))
}

/// Delete stored summaries whose mtime is more than `days` before `now`.
/// `days == 0` keeps everything. Per-file failures are collected, not raised.
pub fn sweep_at(backups_dir: &Path, days: u64, now: SystemTime) -> Result<RetentionOutcome> {
    let mut outcome = RetentionOutcome {
        days,
        ..RetentionOutcome::default()
    };
    if days == 0 || !backups_dir.is_dir() {
        return Ok(outcome);
    }
    let cutoff = now
        .checked_sub(Duration::from_secs(days.saturating_mul(SECS_PER_DAY)))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut candidates = Vec::new();
    for entry in fs::read_dir(backups_dir)
        .with_context(|| format!("failed to read {}", backups_dir.display()))?
    {
        let path = entry?.path();
        if is_summary_file(&path) {
            candidates.push(path);
        }
    }
    candidates.sort();

    for path in candidates {
        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(err) => {
                outcome.failed.push((path, err.to_string()));
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => outcome.removed.push(path),
            Err(err) => outcome.failed.push((path, err.to_string())),
        }
    }
    Ok(outcome)
}

pub fn sweep(backups_dir: &Path, days: u64) -> Result<RetentionOutcome> {
    sweep_at(backups_dir, days, SystemTime::now())
}
