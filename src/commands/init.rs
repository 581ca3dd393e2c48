use anyhow::{Context, Result};
use std::fs;

use crate::assets::install_templates;
use crate::commands::{CommandReport, audit_or_warn};
use crate::daylog::config::config_path;
use crate::daylog::paths::resolve_paths;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub force: bool,
}

pub fn run(opts: &InitOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("init");

    for dir in [
        &paths.daylog_home,
        &paths.backups_dir,
        &paths.reports_dir,
        &paths.logs_dir,
    ] {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        report.detail(format!("dir={}", dir.display()));
    }

    let outcome = install_templates(&paths.templates_dir, opts.force)?;
    for path in &outcome.written {
        report.detail(format!("template_written={}", path.display()));
    }
    for path in &outcome.kept {
        report.detail(format!("template_kept={} (use --force to replace)", path.display()));
    }
    report.detail(format!("config_path={}", config_path(&paths).display()));

    audit_or_warn(
        &paths,
        "init",
        "ok",
        &format!(
            "templates written={} kept={}",
            outcome.written.len(),
            outcome.kept.len()
        ),
    );
    Ok(report)
}
