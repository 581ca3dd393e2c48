use anyhow::Result;
use std::path::Path;

use crate::assistant::discover::discover_assistant;
use crate::commands::CommandReport;
use crate::daylog::audit::audit_log_path;
use crate::daylog::config::{SummarizerMode, config_path, load_config};
use crate::daylog::paths::resolve_paths;
use crate::daylog::report::list_templates;

mod generated {
    include!(concat!(env!("OUT_DIR"), "/daylog_env_allowlist.rs"));
}

use generated::GENERATED_DAYLOG_ENV_ALLOWLIST;

/// `DAYLOG_*` names in `vars` that the binary never reads.
pub fn unknown_daylog_vars<I>(vars: I, allowlist: &[&str]) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = vars
        .into_iter()
        .filter(|k| k.starts_with("DAYLOG_") && !allowlist.contains(&k.as_str()))
        .collect();
    out.sort();
    out.dedup();
    out
}

fn presence(path: &Path) -> &'static str {
    if path.exists() { "present" } else { "missing" }
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    for (label, path) in [
        ("daylog_home", &paths.daylog_home),
        ("source_dir", &paths.source_dir),
        ("backups_dir", &paths.backups_dir),
        ("reports_dir", &paths.reports_dir),
        ("templates_dir", &paths.templates_dir),
        ("logs_dir", &paths.logs_dir),
    ] {
        report.detail(format!("{label}={} ({})", path.display(), presence(path)));
    }
    report.detail(format!("audit_log={}", audit_log_path(&paths).display()));
    let cfg_path = config_path(&paths);
    report.detail(format!("config={} ({})", cfg_path.display(), presence(&cfg_path)));

    if !paths.source_dir.is_dir() {
        report.issue(format!(
            "source log directory missing: {} (set DAYLOG_SOURCE_DIR)",
            paths.source_dir.display()
        ));
    }
    match list_templates(&paths.templates_dir) {
        Ok(names) if names.is_empty() => report.issue("no templates installed; run `daylog init`"),
        Ok(names) => report.detail(format!("templates={}", names.join(","))),
        Err(err) => report.error(&err),
    }

    match load_config(&paths) {
        Ok(cfg) => {
            report.detail(format!("summarizer.mode={}", cfg.summarizer.mode.label()));
            if cfg.summarizer.mode == SummarizerMode::Keyword {
                report.detail("assistant=disabled (keyword classifier)");
            } else {
                let home = dirs::home_dir();
                match discover_assistant(cfg.summarizer.command.as_deref(), home.as_deref()) {
                    Ok(Some(found)) => report.detail(format!(
                        "assistant={} source={}",
                        found.bin.display(),
                        found.source.label()
                    )),
                    Ok(None) => report.detail("assistant=keyword fallback (not found)"),
                    Err(err) => report.issue(format!("assistant unavailable: {err:#}")),
                }
            }
            report.detail(format!(
                "summarizer.timeout_secs={}",
                cfg.summarizer.timeout_secs
            ));
            report.detail(format!("retention.days={}", cfg.retention.days));
            report.detail(format!(
                "projects.decoding={}",
                cfg.projects.decoding.label()
            ));
            report.detail(format!(
                "report.default_template={} report.top_projects={}",
                cfg.report.default_template, cfg.report.top_projects
            ));
        }
        Err(err) => report.error(&err),
    }

    let unknown = unknown_daylog_vars(
        std::env::vars().map(|(k, _)| k),
        GENERATED_DAYLOG_ENV_ALLOWLIST,
    );
    for key in unknown {
        report.issue(format!("unknown env var {key} (not read by daylog)"));
    }

    Ok(report)
}
