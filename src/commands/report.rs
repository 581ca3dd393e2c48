use anyhow::Result;
use std::collections::BTreeMap;

use crate::commands::{CommandReport, audit_or_warn};
use crate::daylog::config::load_config;
use crate::daylog::messages::extract_messages;
use crate::daylog::paths::resolve_paths;
use crate::daylog::report::{
    build_report_data, list_templates, load_template, project_display_name, write_report,
};
use crate::daylog::store::load_summary;
use crate::daylog::summarize::{choose_summarizer, summarize_activity};
use crate::daylog::template::render;
use crate::daylog::util::resolve_date;
use crate::daylog::warn::{self, WarnEvent};
use crate::error::DaylogError;

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub date: Option<String>,
    pub template: Option<String>,
    pub stdout: bool,
}

/// Command report plus the rendered document when `--stdout` was requested.
pub struct ReportRun {
    pub report: CommandReport,
    pub rendered: Option<String>,
}

impl From<CommandReport> for ReportRun {
    fn from(report: CommandReport) -> Self {
        Self {
            report,
            rendered: None,
        }
    }
}

pub fn run(opts: &ReportOptions) -> Result<ReportRun> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("report");

    let date = match resolve_date(opts.date.as_deref()) {
        Ok(date) => date,
        Err(err) => {
            report.error(&anyhow::Error::from(err));
            return Ok(report.into());
        }
    };
    let cfg = match load_config(&paths) {
        Ok(cfg) => cfg,
        Err(err) => {
            report.error(&err);
            return Ok(report.into());
        }
    };
    let template_name = opts
        .template
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&cfg.report.default_template)
        .to_string();
    report.detail(format!("date={date}"));
    report.detail(format!("template={template_name}"));

    let stored = match load_summary(&paths.backups_dir, &date) {
        Ok(summary) => summary,
        Err(err) => {
            report.error(&err);
            if matches!(
                err.downcast_ref::<DaylogError>(),
                Some(DaylogError::ArtifactNotFound { .. })
            ) {
                report.issue(format!("run `daylog extract {date}` first"));
            }
            return Ok(report.into());
        }
    };
    let problems = stored.verify();
    let summary = if problems.is_empty() {
        stored
    } else {
        for problem in &problems {
            warn::emit(WarnEvent {
                code: "SUMMARY_MISMATCH",
                stage: "report",
                action: "verify-summary",
                target: &date,
                reason: "using recomputed totals",
                err: problem,
            });
        }
        report.detail(format!("summary_recomputed=true problems={}", problems.len()));
        stored.recomputed()
    };

    let template = match load_template(&paths.templates_dir, &template_name) {
        Ok(body) => body,
        Err(err) => {
            report.error(&err);
            let available = list_templates(&paths.templates_dir).unwrap_or_default();
            if available.is_empty() {
                report.issue("no templates installed; run `daylog init`");
            } else {
                report.issue(format!("available templates: {}", available.join(", ")));
            }
            return Ok(report.into());
        }
    };

    let home = dirs::home_dir();
    let choice = choose_summarizer(&cfg.summarizer, home.as_deref());
    report.detail(choice.note.clone());

    let mut summaries = BTreeMap::new();
    for (path, project) in &summary.projects {
        let name = project_display_name(path);
        let extracted = extract_messages(project, &cfg.summarizer);
        let activity = summarize_activity(
            name,
            &extracted.lines(),
            choice.tool.as_deref(),
            &cfg.summarizer.keywords,
        );
        if !extracted.is_empty()
            && let Some(reason) = activity.fallback_reason.as_deref()
        {
            warn::emit(WarnEvent {
                code: "SUMMARIZER_FALLBACK",
                stage: "summarize",
                action: "keyword-fallback",
                target: path,
                reason: "assistant summary unavailable",
                err: reason,
            });
            audit_or_warn(&paths, "summarize", "fallback", &format!("{path}: {reason}"));
        }
        report.detail(format!(
            "summary project={path} source={} bullets={}",
            activity.source.label(),
            activity.bullets.len()
        ));
        summaries.insert(path.clone(), activity);
    }

    let data = build_report_data(&summary, &summaries, cfg.report.top_projects);
    let rendered = match render(&template, &data.scalars, &data.blocks) {
        Ok(rendered) => rendered,
        Err(err) => {
            let err = anyhow::Error::from(err);
            audit_or_warn(&paths, "report", "failed", &format!("{err:#}"));
            report.error(&err);
            return Ok(report.into());
        }
    };

    if opts.stdout {
        report.detail("report.stdout=true");
        return Ok(ReportRun {
            report,
            rendered: Some(rendered),
        });
    }

    let outcome = match write_report(&date, &rendered, &paths.reports_dir) {
        Ok(outcome) => outcome,
        Err(err) => {
            report.error(&err);
            return Ok(report.into());
        }
    };
    let target = outcome.path.display().to_string();
    if outcome.overwritten {
        warn::emit(WarnEvent {
            code: "REPORT_OVERWRITTEN",
            stage: "report",
            action: "write-report",
            target: &target,
            reason: "existing report replaced",
            err: "na",
        });
    }
    report.detail(format!("report_path={target}"));
    audit_or_warn(
        &paths,
        "report",
        "ok",
        &format!("date={date} template={template_name} path={target}"),
    );

    Ok(report.into())
}
