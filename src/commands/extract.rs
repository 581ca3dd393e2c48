use anyhow::Result;

use crate::commands::{CommandReport, audit_or_warn};
use crate::daylog::aggregate::aggregate;
use crate::daylog::config::load_config;
use crate::daylog::paths::resolve_paths;
use crate::daylog::retention;
use crate::daylog::store::save_summary;
use crate::daylog::util::resolve_date;
use crate::daylog::warn::{self, WarnEvent};

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub date: Option<String>,
    pub dry_run: bool,
}

pub fn run(opts: &ExtractOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("extract");

    let date = match resolve_date(opts.date.as_deref()) {
        Ok(date) => date,
        Err(err) => {
            report.error(&anyhow::Error::from(err));
            return Ok(report);
        }
    };
    let cfg = match load_config(&paths) {
        Ok(cfg) => cfg,
        Err(err) => {
            report.error(&err);
            return Ok(report);
        }
    };

    report.detail(format!("date={date}"));
    report.detail(format!("source_dir={}", paths.source_dir.display()));

    let aggregation = match aggregate(&paths.source_dir, &date, cfg.projects.decoding) {
        Ok(aggregation) => aggregation,
        Err(err) => {
            audit_or_warn(&paths, "extract", "failed", &format!("{err:#}"));
            report.error(&err);
            return Ok(report);
        }
    };
    let summary = &aggregation.summary;
    let stats = &aggregation.stats;

    for (path, project) in &summary.projects {
        report.detail(format!(
            "project={path} sessions={} entries={}",
            project.session_count, project.total_entries
        ));
    }
    for decoded in &stats.ambiguous_projects {
        warn::emit(WarnEvent {
            code: "AMBIGUOUS_PROJECT_PATH",
            stage: "extract",
            action: "decode-project",
            target: &decoded.dir_name,
            reason: "decoded path does not exist",
            err: &decoded.path,
        });
        report.detail(format!(
            "ambiguous_project dir={} decoded={}",
            decoded.dir_name, decoded.path
        ));
    }
    for (path, dirs) in &stats.merged_dirs {
        report.detail(format!("merged_project path={path} dirs={}", dirs.join(",")));
    }
    for session in &stats.rekeyed_sessions {
        report.detail(format!("rekeyed_session id={session}"));
    }
    for unreadable in &stats.unreadable {
        warn::emit(WarnEvent {
            code: "UNREADABLE_LOG",
            stage: "extract",
            action: "skip-log",
            target: &unreadable.path,
            reason: "log could not be read",
            err: &unreadable.reason,
        });
        report.detail(format!("unreadable_log path={}", unreadable.path));
    }
    if stats.lines_dropped > 0 {
        warn::emit(WarnEvent {
            code: "MALFORMED_LINES",
            stage: "extract",
            action: "drop-lines",
            target: &paths.source_dir.display().to_string(),
            reason: &format!("{} unparseable lines skipped", stats.lines_dropped),
            err: stats.first_parse_error.as_deref().unwrap_or("na"),
        });
    }

    report.detail(format!(
        "projects_scanned={} files_scanned={} lines_matched={} lines_dropped={}",
        stats.projects_scanned, stats.files_scanned, stats.lines_matched, stats.lines_dropped
    ));
    report.detail(format!(
        "total_projects={} total_sessions={} total_interactions={}",
        summary.summary.total_projects,
        summary.total_sessions(),
        summary.summary.total_interactions
    ));

    if opts.dry_run {
        report.detail("extract.dry_run=true");
        return Ok(report);
    }

    let saved = match save_summary(&paths.backups_dir, summary) {
        Ok(saved) => saved,
        Err(err) => {
            audit_or_warn(&paths, "extract", "failed", &format!("{err:#}"));
            report.error(&err);
            return Ok(report);
        }
    };
    report.detail(format!("summary_path={}", saved.display()));
    audit_or_warn(
        &paths,
        "extract",
        "ok",
        &format!(
            "date={date} projects={} interactions={} path={}",
            summary.summary.total_projects,
            summary.summary.total_interactions,
            saved.display()
        ),
    );

    match retention::sweep(&paths.backups_dir, cfg.retention.days) {
        Ok(outcome) => {
            for (path, err) in &outcome.failed {
                warn::emit(WarnEvent {
                    code: "RETENTION_DELETE_FAILED",
                    stage: "retention",
                    action: "remove-summary",
                    target: &path.display().to_string(),
                    reason: "stale summary could not be removed",
                    err: err.as_str(),
                });
            }
            let line = outcome.summary_line();
            audit_or_warn(&paths, "retention", "ok", &line);
            report.detail(line);
        }
        Err(err) => {
            let err_text = format!("{err:#}");
            warn::emit(WarnEvent {
                code: "RETENTION_FAILED",
                stage: "retention",
                action: "sweep",
                target: &paths.backups_dir.display().to_string(),
                reason: "retention sweep skipped",
                err: &err_text,
            });
            audit_or_warn(&paths, "retention", "failed", &err_text);
        }
    }

    Ok(report)
}
