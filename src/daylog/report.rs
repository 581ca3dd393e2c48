use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::daylog::aggregate::{DailySummary, ProjectSummary};
use crate::daylog::store::write_atomic;
use crate::daylog::summarize::{ActivitySummary, SummarySource};
use crate::error::DaylogError;

pub const REPORT_PREFIX: &str = "daily";
pub const TEMPLATE_EXTENSION: &str = "md";
pub const NO_ACTIVITY_ROW: &str = "- No activity recorded for this date.";

/// Display name for a decoded project path: its last component.
pub fn project_display_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .find(|part| !part.is_empty())
        .unwrap_or(path)
}

#[derive(Debug, Clone, Default)]
pub struct ReportData {
    pub scalars: BTreeMap<String, String>,
    pub blocks: BTreeMap<String, Vec<String>>,
}

fn summarizer_label(summaries: &BTreeMap<String, ActivitySummary>) -> &'static str {
    let assistant = summaries
        .values()
        .filter(|s| s.source == SummarySource::Assistant)
        .count();
    match assistant {
        0 => SummarySource::Keyword.label(),
        n if n == summaries.len() => SummarySource::Assistant.label(),
        _ => "mixed",
    }
}

fn project_row(path: &str, project: &ProjectSummary) -> String {
    format!(
        "- `{path}`: {} sessions, {} interactions (last activity {})",
        project.session_count,
        project.total_entries,
        project.last_timestamp()
    )
}

fn top_project_rows(summary: &DailySummary, limit: usize) -> Vec<String> {
    let mut ranked: Vec<(&String, &ProjectSummary)> = summary.projects.iter().collect();
    ranked.sort_by(|a, b| b.1.total_entries.cmp(&a.1.total_entries).then(a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(path, project)| {
            format!(
                "- **{}**: {} interactions across {} sessions",
                project_display_name(path),
                project.total_entries,
                project.session_count
            )
        })
        .collect()
}

fn session_rows(summary: &DailySummary) -> Vec<String> {
    let mut out = Vec::new();
    for (path, project) in &summary.projects {
        for (id, session) in &project.sessions {
            out.push(format!(
                "- {} / {id}: {} entries (last {})",
                project_display_name(path),
                session.entry_count,
                session.last_timestamp
            ));
        }
    }
    out
}

fn work_item_rows(
    summary: &DailySummary,
    summaries: &BTreeMap<String, ActivitySummary>,
) -> Vec<String> {
    if summary.projects.is_empty() {
        return vec![NO_ACTIVITY_ROW.to_string()];
    }
    let mut out = Vec::new();
    for (path, project) in &summary.projects {
        out.push(format!("### {}", project_display_name(path)));
        let bullets = summaries
            .get(path)
            .map(|s| s.bullets.as_slice())
            .unwrap_or(&[]);
        if bullets.is_empty() {
            out.push(format!(
                "- {} interactions, no notable changes detected",
                project.total_entries
            ));
        } else {
            out.extend(bullets.iter().map(|b| format!("- {b}")));
        }
    }
    out
}

fn weekday(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%A").to_string())
        .unwrap_or_default()
}

/// Scalars and block rows for one day's report.
pub fn build_report_data(
    summary: &DailySummary,
    summaries: &BTreeMap<String, ActivitySummary>,
    top_projects: usize,
) -> ReportData {
    let mut scalars = BTreeMap::new();
    scalars.insert("DATE".to_string(), summary.date.clone());
    scalars.insert("WEEKDAY".to_string(), weekday(&summary.date));
    scalars.insert("GENERATED_AT".to_string(), summary.generated_at.clone());
    scalars.insert(
        "RENDERED_AT".to_string(),
        Local::now().format("%Y-%m-%d %H:%M").to_string(),
    );
    scalars.insert(
        "TOTAL_PROJECTS".to_string(),
        summary.summary.total_projects.to_string(),
    );
    scalars.insert(
        "TOTAL_SESSIONS".to_string(),
        summary.total_sessions().to_string(),
    );
    scalars.insert(
        "TOTAL_INTERACTIONS".to_string(),
        summary.summary.total_interactions.to_string(),
    );
    scalars.insert(
        "SUMMARIZER".to_string(),
        summarizer_label(summaries).to_string(),
    );

    let mut blocks = BTreeMap::new();
    blocks.insert(
        "TOP_PROJECTS".to_string(),
        top_project_rows(summary, top_projects),
    );
    blocks.insert(
        "PROJECTS".to_string(),
        summary
            .projects
            .iter()
            .map(|(path, project)| project_row(path, project))
            .collect(),
    );
    blocks.insert("SESSIONS".to_string(), session_rows(summary));
    blocks.insert(
        "WORK_ITEMS".to_string(),
        work_item_rows(summary, summaries),
    );

    ReportData { scalars, blocks }
}

pub fn template_path(templates_dir: &Path, name: &str) -> PathBuf {
    templates_dir.join(format!("{name}.{TEMPLATE_EXTENSION}"))
}

pub fn list_templates(templates_dir: &Path) -> Result<Vec<String>> {
    if !templates_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    let read_dir = fs::read_dir(templates_dir)
        .with_context(|| format!("failed to read {}", templates_dir.display()))?;
    for entry in read_dir {
        let path = entry?.path();
        if !path.is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION)
        {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Template names are single path components; separators and `..` would
/// reach outside the templates directory.
fn check_template_name(name: &str) -> Result<(), DaylogError> {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(DaylogError::InvalidTemplateName(name.to_string()));
    }
    Ok(())
}

pub fn load_template(templates_dir: &Path, name: &str) -> Result<String> {
    check_template_name(name)?;
    let path = template_path(templates_dir, name);
    if !path.is_file() {
        return Err(DaylogError::ArtifactNotFound {
            kind: "template",
            path: path.display().to_string(),
        }
        .into());
    }
    fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
}

pub fn report_path(output_dir: &Path, date: &str) -> PathBuf {
    output_dir.join(format!("{REPORT_PREFIX}-{date}.{TEMPLATE_EXTENSION}"))
}

#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub path: PathBuf,
    pub overwritten: bool,
}

/// Write the rendered report to its dated path, replacing any earlier file.
pub fn write_report(date: &str, rendered: &str, output_dir: &Path) -> Result<WriteOutcome> {
    let path = report_path(output_dir, date);
    let overwritten = path.exists();
    write_atomic(&path, rendered.as_bytes())?;
    Ok(WriteOutcome { path, overwritten })
}

#[cfg(test)]
mod tests {
    use super::{
        NO_ACTIVITY_ROW, build_report_data, list_templates, load_template,
        project_display_name, write_report,
    };
    use crate::daylog::aggregate::{DailySummary, ProjectSummary, Session};
    use crate::daylog::entry::LogEntry;
    use crate::daylog::summarize::{ActivitySummary, SummarySource};
    use crate::daylog::template::render;
    use crate::error::DaylogError;
    use std::collections::BTreeMap;
    use std::fs;

    fn project(entries: usize) -> ProjectSummary {
        let list = (0..entries)
            .map(|i| {
                LogEntry::parse_line(&format!(
                    r#"{{"type":"user","timestamp":"2024-01-15T10:0{i}:00Z","content":"x"}}"#
                ))
                .expect("entry")
            })
            .collect();
        let mut sessions = BTreeMap::new();
        sessions.insert("s1".to_string(), Session::from_entries(list));
        ProjectSummary::from_sessions(sessions)
    }

    fn summary_with(projects: Vec<(&str, usize)>) -> DailySummary {
        let map = projects
            .into_iter()
            .map(|(path, n)| (path.to_string(), project(n)))
            .collect();
        DailySummary::from_projects("2024-01-15", "2024-01-15T12:00:00Z", map)
    }

    #[test]
    fn display_name_is_last_component() {
        assert_eq!(project_display_name("/Users/me/webapp"), "webapp");
        assert_eq!(project_display_name("/Users/me/webapp/"), "webapp");
        assert_eq!(project_display_name("plain"), "plain");
    }

    #[test]
    fn empty_day_renders_no_activity_placeholder() {
        let summary = summary_with(Vec::new());
        let data = build_report_data(&summary, &BTreeMap::new(), 5);
        assert_eq!(data.scalars["TOTAL_PROJECTS"], "0");
        assert_eq!(data.scalars["TOTAL_INTERACTIONS"], "0");
        assert_eq!(data.scalars["WEEKDAY"], "Monday");
        assert!(data.blocks["TOP_PROJECTS"].is_empty());

        let template = "# {{DATE}}\n## Top\n{{#TOP_PROJECTS}}\n{{/TOP_PROJECTS}}\n## Work\n{{#WORK_ITEMS}}\n{{/WORK_ITEMS}}\n";
        let out = render(template, &data.scalars, &data.blocks).expect("render");
        assert_eq!(
            out,
            format!("# 2024-01-15\n## Top\n## Work\n{NO_ACTIVITY_ROW}\n")
        );
    }

    #[test]
    fn top_projects_rank_by_interactions_then_path() {
        let summary = summary_with(vec![("/w/b", 2), ("/w/a", 2), ("/w/c", 5)]);
        let data = build_report_data(&summary, &BTreeMap::new(), 2);
        assert_eq!(
            data.blocks["TOP_PROJECTS"],
            vec![
                "- **c**: 5 interactions across 1 sessions",
                "- **a**: 2 interactions across 1 sessions",
            ]
        );
        assert_eq!(data.blocks["PROJECTS"].len(), 3);
        assert_eq!(data.blocks["SESSIONS"].len(), 3);
        assert_eq!(data.scalars["TOTAL_SESSIONS"], "3");
    }

    #[test]
    fn work_items_use_summaries_and_label_source() {
        let summary = summary_with(vec![("/w/app", 3), ("/w/lib", 1)]);
        let mut summaries = BTreeMap::new();
        summaries.insert(
            "/w/app".to_string(),
            ActivitySummary {
                bullets: vec!["Shipped login".to_string()],
                source: SummarySource::Assistant,
                fallback_reason: None,
            },
        );
        summaries.insert(
            "/w/lib".to_string(),
            ActivitySummary {
                bullets: Vec::new(),
                source: SummarySource::Keyword,
                fallback_reason: None,
            },
        );
        let data = build_report_data(&summary, &summaries, 5);
        assert_eq!(
            data.blocks["WORK_ITEMS"],
            vec![
                "### app",
                "- Shipped login",
                "### lib",
                "- 1 interactions, no notable changes detected",
            ]
        );
        assert_eq!(data.scalars["SUMMARIZER"], "mixed");
    }

    #[test]
    fn write_report_overwrites_and_says_so() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let out_dir = tmp.path().join("reports");

        let first = write_report("2024-01-15", "one", &out_dir).expect("first");
        assert!(!first.overwritten);
        let second = write_report("2024-01-15", "two", &out_dir).expect("second");
        assert!(second.overwritten);
        assert_eq!(first.path, second.path);
        assert_eq!(fs::read_to_string(&second.path).expect("read"), "two");
        assert!(second.path.ends_with("daily-2024-01-15.md"));
    }

    #[test]
    fn templates_are_listed_and_loaded_by_name() {
        let tmp = tempfile::tempdir().expect("tempdir");
        fs::write(tmp.path().join("simple.md"), "{{DATE}}").expect("write");
        fs::write(tmp.path().join("weekly.md"), "w").expect("write");
        fs::write(tmp.path().join("notes.txt"), "n").expect("write");

        assert_eq!(
            list_templates(tmp.path()).expect("list"),
            vec!["simple", "weekly"]
        );
        assert_eq!(load_template(tmp.path(), "simple").expect("load"), "{{DATE}}");
        for name in ["../simple", "..", "nested/simple", "a\\b"] {
            let err = load_template(tmp.path(), name).expect_err("escaping name");
            assert!(matches!(
                err.downcast_ref::<DaylogError>(),
                Some(DaylogError::InvalidTemplateName(_))
            ));
        }
        let err = load_template(tmp.path(), "fancy").expect_err("missing");
        assert!(matches!(
            err.downcast_ref::<DaylogError>(),
            Some(DaylogError::ArtifactNotFound { kind: "template", .. })
        ));
    }
}
