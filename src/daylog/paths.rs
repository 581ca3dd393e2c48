use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DaylogPaths {
    pub daylog_home: PathBuf,
    pub source_dir: PathBuf,
    pub backups_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl DaylogPaths {
    /// Default layout rooted at `home`, with the source logs under
    /// `home/projects`. Env overrides are not consulted.
    #[cfg(test)]
    pub fn under(home: &Path) -> Self {
        Self {
            daylog_home: home.to_path_buf(),
            source_dir: home.join("projects"),
            backups_dir: home.join("backups"),
            reports_dir: home.join("reports"),
            templates_dir: home.join("templates"),
            logs_dir: home.join("logs"),
        }
    }
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<DaylogPaths> {
    let home = required_home_dir()?;
    let daylog_home = env_or_default_path("DAYLOG_HOME", home.join("daylog"));

    let source_dir = env_or_default_path("DAYLOG_SOURCE_DIR", home.join(".claude/projects"));
    let backups_dir = env_or_default_path("DAYLOG_BACKUPS_DIR", daylog_home.join("backups"));
    let reports_dir = env_or_default_path("DAYLOG_REPORTS_DIR", daylog_home.join("reports"));
    let templates_dir =
        env_or_default_path("DAYLOG_TEMPLATES_DIR", daylog_home.join("templates"));
    let logs_dir = env_or_default_path("DAYLOG_LOGS_DIR", daylog_home.join("logs"));

    Ok(DaylogPaths {
        daylog_home,
        source_dir,
        backups_dir,
        reports_dir,
        templates_dir,
        logs_dir,
    })
}
