use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::daylog::config::ProjectDecoding;
use crate::daylog::entry::LogEntry;
use crate::error::DaylogError;

pub const UNKNOWN_TIMESTAMP: &str = "unknown";
pub const SESSION_LOG_EXTENSION: &str = "jsonl";

/// Calendar-day membership by substring match on the timestamp field.
///
/// Exact day semantics rely on timestamps starting with `YYYY-MM-DD`.
#[derive(Debug, Clone)]
pub struct DateFilter {
    date: String,
}

impl DateFilter {
    pub fn new(date: impl Into<String>) -> Self {
        Self { date: date.into() }
    }

    pub fn matches_timestamp(&self, timestamp: &str) -> bool {
        timestamp.contains(&self.date)
    }

    /// Cheap pre-check on the raw line before paying for a JSON parse.
    pub fn may_match_line(&self, raw: &str) -> bool {
        raw.contains(&self.date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub entries: Vec<LogEntry>,
    pub entry_count: usize,
    pub last_timestamp: String,
}

impl Session {
    pub fn from_entries(entries: Vec<LogEntry>) -> Self {
        let last_timestamp = entries
            .last()
            .map(|e| e.timestamp.trim())
            .filter(|ts| !ts.is_empty())
            .unwrap_or(UNKNOWN_TIMESTAMP)
            .to_string();
        Self {
            entry_count: entries.len(),
            entries,
            last_timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub sessions: BTreeMap<String, Session>,
    pub session_count: usize,
    pub total_entries: usize,
}

impl ProjectSummary {
    pub fn from_sessions(sessions: BTreeMap<String, Session>) -> Self {
        let total_entries = sessions.values().map(|s| s.entry_count).sum();
        Self {
            session_count: sessions.len(),
            total_entries,
            sessions,
        }
    }

    /// Most recent `last_timestamp` across sessions.
    pub fn last_timestamp(&self) -> &str {
        self.sessions
            .values()
            .map(|s| s.last_timestamp.as_str())
            .filter(|ts| *ts != UNKNOWN_TIMESTAMP)
            .max()
            .unwrap_or(UNKNOWN_TIMESTAMP)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Totals {
    pub total_projects: usize,
    pub total_interactions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: String,
    pub generated_at: String,
    pub projects: BTreeMap<String, ProjectSummary>,
    pub summary: Totals,
}

impl DailySummary {
    pub fn from_projects(
        date: impl Into<String>,
        generated_at: impl Into<String>,
        projects: BTreeMap<String, ProjectSummary>,
    ) -> Self {
        let summary = Totals {
            total_projects: projects.len(),
            total_interactions: projects.values().map(|p| p.total_entries).sum(),
        };
        Self {
            date: date.into(),
            generated_at: generated_at.into(),
            projects,
            summary,
        }
    }

    pub fn total_sessions(&self) -> usize {
        self.projects.values().map(|p| p.session_count).sum()
    }

    /// Recompute every derived count from the entries and list mismatches
    /// against the declared values.
    pub fn verify(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (path, project) in &self.projects {
            if project.sessions.is_empty() {
                problems.push(format!("project {path} has no sessions"));
            }
            for (id, session) in &project.sessions {
                if session.entry_count != session.entries.len() {
                    problems.push(format!(
                        "session {path}/{id} entry_count={} entries={}",
                        session.entry_count,
                        session.entries.len()
                    ));
                }
                if session.entries.is_empty() {
                    problems.push(format!("session {path}/{id} has no entries"));
                }
            }
            let recomputed = ProjectSummary::from_sessions(project.sessions.clone());
            if recomputed.session_count != project.session_count
                || recomputed.total_entries != project.total_entries
            {
                problems.push(format!(
                    "project {path} declares sessions={} entries={} but holds sessions={} entries={}",
                    project.session_count,
                    project.total_entries,
                    recomputed.session_count,
                    recomputed.total_entries
                ));
            }
        }
        let recomputed = self.recomputed();
        if recomputed.summary != self.summary {
            problems.push(format!(
                "summary declares projects={} interactions={} but holds projects={} interactions={}",
                self.summary.total_projects,
                self.summary.total_interactions,
                recomputed.summary.total_projects,
                recomputed.summary.total_interactions
            ));
        }
        problems
    }

    /// Rebuild all derived counts from the entries, dropping empty sessions
    /// and projects.
    pub fn recomputed(&self) -> Self {
        let projects = self
            .projects
            .iter()
            .filter_map(|(path, project)| {
                let sessions: BTreeMap<String, Session> = project
                    .sessions
                    .iter()
                    .filter(|(_, s)| !s.entries.is_empty())
                    .map(|(id, s)| (id.clone(), Session::from_entries(s.entries.clone())))
                    .collect();
                if sessions.is_empty() {
                    None
                } else {
                    Some((path.clone(), ProjectSummary::from_sessions(sessions)))
                }
            })
            .collect();
        Self::from_projects(self.date.clone(), self.generated_at.clone(), projects)
    }
}

/// A project directory name decoded into the path it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedProject {
    pub dir_name: String,
    pub path: String,
    /// The decoded path could not be confirmed on this machine; a real path
    /// containing `-` would have been split into extra components.
    pub ambiguous: bool,
}

pub fn decode_project_path(dir_name: &str, decoding: ProjectDecoding) -> String {
    match decoding {
        ProjectDecoding::Verbatim => dir_name.to_string(),
        ProjectDecoding::HyphenToSlash => {
            let replaced = dir_name.replace('-', "/");
            if replaced.starts_with('/') {
                replaced
            } else {
                format!("/{replaced}")
            }
        }
    }
}

pub fn decode_project(dir_name: &str, decoding: ProjectDecoding) -> DecodedProject {
    let path = decode_project_path(dir_name, decoding);
    let ambiguous = decoding == ProjectDecoding::HyphenToSlash && !Path::new(&path).exists();
    DecodedProject {
        dir_name: dir_name.to_string(),
        path,
        ambiguous,
    }
}

/// Counters gathered while scanning; not part of the persisted summary.
#[derive(Debug, Clone, Default)]
pub struct AggregateStats {
    pub projects_scanned: usize,
    pub files_scanned: usize,
    pub lines_matched: usize,
    pub lines_dropped: usize,
    pub first_parse_error: Option<String>,
    pub ambiguous_projects: Vec<DecodedProject>,
    /// Decoded path → directory names that produced it.
    pub merged_dirs: BTreeMap<String, Vec<String>>,
    /// Session ids that collided inside a merged project and were re-keyed
    /// as `<dir_name>/<session_id>`.
    pub rekeyed_sessions: Vec<String>,
    /// Session logs or project directories that could not be read.
    pub unreadable: Vec<UnreadableLog>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableLog {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Aggregation {
    pub summary: DailySummary,
    pub stats: AggregateStats,
}

fn sorted_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let read_dir =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in read_dir {
        out.push(entry?.path());
    }
    out.sort();
    Ok(out)
}

fn session_id_for(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(SESSION_LOG_EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

fn filter_session_file(
    path: &Path,
    filter: &DateFilter,
    stats: &mut AggregateStats,
) -> Result<Vec<LogEntry>> {
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (idx, line) in reader.split(b'\n').enumerate() {
        let raw = line.with_context(|| format!("failed to read line from {}", path.display()))?;
        let decoded = String::from_utf8_lossy(&raw);
        let trimmed = decoded.trim();
        if trimmed.is_empty() || !filter.may_match_line(trimmed) {
            continue;
        }

        match LogEntry::parse_line(trimmed) {
            Ok(entry) if filter.matches_timestamp(&entry.timestamp) => entries.push(entry),
            Ok(_) => {}
            Err(reason) => {
                stats.lines_dropped += 1;
                if stats.first_parse_error.is_none() {
                    let err = DaylogError::ParseError {
                        file: path.display().to_string(),
                        line: idx + 1,
                        reason,
                    };
                    stats.first_parse_error = Some(err.to_string());
                }
            }
        }
    }

    Ok(entries)
}

fn aggregate_project(
    project_dir: &Path,
    filter: &DateFilter,
    stats: &mut AggregateStats,
) -> BTreeMap<String, Session> {
    let mut sessions = BTreeMap::new();
    let children = match sorted_children(project_dir) {
        Ok(children) => children,
        Err(err) => {
            stats.unreadable.push(UnreadableLog {
                path: project_dir.display().to_string(),
                reason: format!("{err:#}"),
            });
            return sessions;
        }
    };
    for path in children {
        let Some(session_id) = session_id_for(&path) else {
            continue;
        };
        stats.files_scanned += 1;
        match filter_session_file(&path, filter, stats) {
            Ok(entries) if !entries.is_empty() => {
                stats.lines_matched += entries.len();
                sessions.insert(session_id, Session::from_entries(entries));
            }
            Ok(_) => {}
            Err(err) => stats.unreadable.push(UnreadableLog {
                path: path.display().to_string(),
                reason: format!("{err:#}"),
            }),
        }
    }
    sessions
}

fn merge_sessions(
    slot: &mut BTreeMap<String, Session>,
    dir_name: &str,
    sessions: BTreeMap<String, Session>,
    stats: &mut AggregateStats,
) {
    for (id, session) in sessions {
        if slot.contains_key(&id) {
            let rekeyed = format!("{dir_name}/{id}");
            stats.rekeyed_sessions.push(rekeyed.clone());
            slot.insert(rekeyed, session);
        } else {
            slot.insert(id, session);
        }
    }
}

/// Scan `logs_root` for per-project session logs and keep entries for `date`.
pub fn aggregate(logs_root: &Path, date: &str, decoding: ProjectDecoding) -> Result<Aggregation> {
    if !logs_root.is_dir() {
        return Err(DaylogError::SourceNotFound(logs_root.display().to_string()).into());
    }

    let filter = DateFilter::new(date);
    let mut stats = AggregateStats::default();
    let mut projects: BTreeMap<String, BTreeMap<String, Session>> = BTreeMap::new();

    for project_dir in sorted_children(logs_root)? {
        if !project_dir.is_dir() {
            continue;
        }
        let Some(dir_name) = project_dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        stats.projects_scanned += 1;

        let sessions = aggregate_project(&project_dir, &filter, &mut stats);
        if sessions.is_empty() {
            continue;
        }

        let decoded = decode_project(dir_name, decoding);
        stats
            .merged_dirs
            .entry(decoded.path.clone())
            .or_default()
            .push(decoded.dir_name.clone());
        let slot = projects.entry(decoded.path.clone()).or_default();
        merge_sessions(slot, dir_name, sessions, &mut stats);
        if decoded.ambiguous {
            stats.ambiguous_projects.push(decoded);
        }
    }
    stats.merged_dirs.retain(|_, dirs| dirs.len() > 1);

    let projects = projects
        .into_iter()
        .map(|(path, sessions)| (path, ProjectSummary::from_sessions(sessions)))
        .collect();
    let generated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    Ok(Aggregation {
        summary: DailySummary::from_projects(date, generated_at, projects),
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        DailySummary, DateFilter, ProjectSummary, Session, UNKNOWN_TIMESTAMP, aggregate,
        decode_project_path,
    };
    use crate::daylog::config::ProjectDecoding;
    use crate::daylog::entry::LogEntry;
    use crate::error::DaylogError;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;

    fn line(kind: &str, ts: &str, text: &str) -> String {
        format!(
            "{{\"type\":\"{kind}\",\"timestamp\":\"{ts}\",\"message\":{{\"content\":\"{text}\"}}}}\n"
        )
    }

    fn write_session(root: &Path, project: &str, session: &str, lines: &[String]) {
        let dir = root.join(project);
        fs::create_dir_all(&dir).expect("mkdir project");
        fs::write(dir.join(format!("{session}.jsonl")), lines.concat()).expect("write session");
    }

    #[test]
    fn hyphen_decoding_adds_leading_slash() {
        assert_eq!(
            decode_project_path("foo-bar", ProjectDecoding::HyphenToSlash),
            "/foo/bar"
        );
        assert_eq!(
            decode_project_path("-Users-me-app", ProjectDecoding::HyphenToSlash),
            "/Users/me/app"
        );
        assert_eq!(
            decode_project_path("-Users-me-app", ProjectDecoding::Verbatim),
            "-Users-me-app"
        );
    }

    #[test]
    fn date_filter_is_substring_based() {
        let filter = DateFilter::new("2024-01-15");
        assert!(filter.matches_timestamp("2024-01-15T23:59:59.000Z"));
        assert!(!filter.matches_timestamp("2024-01-16T00:00:00.000Z"));
    }

    #[test]
    fn splits_one_session_across_two_dates() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut lines = Vec::new();
        for i in 0..3 {
            lines.push(line("user", &format!("2024-01-15T10:0{i}:00Z"), "fix parser"));
        }
        for i in 0..2 {
            lines.push(line("assistant", &format!("2024-01-16T11:0{i}:00Z"), "done"));
        }
        write_session(tmp.path(), "foo-bar", "abc", &lines);

        let day1 = aggregate(tmp.path(), "2024-01-15", ProjectDecoding::HyphenToSlash)
            .expect("aggregate")
            .summary;
        assert_eq!(day1.projects.len(), 1);
        let project = &day1.projects["/foo/bar"];
        assert_eq!(project.session_count, 1);
        assert_eq!(project.total_entries, 3);
        assert_eq!(project.sessions["abc"].last_timestamp, "2024-01-15T10:02:00Z");

        let day2 = aggregate(tmp.path(), "2024-01-16", ProjectDecoding::HyphenToSlash)
            .expect("aggregate")
            .summary;
        assert_eq!(day2.projects["/foo/bar"].total_entries, 2);
        assert_eq!(day2.summary.total_interactions, 2);
    }

    #[test]
    fn empty_day_yields_zero_totals_and_skips_projects() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_session(
            tmp.path(),
            "foo",
            "s1",
            &[line("user", "2024-01-15T10:00:00Z", "hello")],
        );
        fs::write(tmp.path().join("stray.txt"), "not a project").expect("write stray");

        let agg = aggregate(tmp.path(), "2023-12-31", ProjectDecoding::HyphenToSlash)
            .expect("aggregate");
        assert!(agg.summary.projects.is_empty());
        assert_eq!(agg.summary.summary.total_projects, 0);
        assert_eq!(agg.summary.summary.total_interactions, 0);
        assert_eq!(agg.stats.projects_scanned, 1);
    }

    #[test]
    fn malformed_lines_are_dropped_and_counted() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let lines = vec![
            line("user", "2024-01-15T10:00:00Z", "ok"),
            "{\"type\":\"user\",\"timestamp\":\"2024-01-15T10:01:00Z\", broken\n".to_string(),
            line("assistant", "2024-01-15T10:02:00Z", "fine"),
        ];
        write_session(tmp.path(), "foo", "s1", &lines);

        let agg = aggregate(tmp.path(), "2024-01-15", ProjectDecoding::HyphenToSlash)
            .expect("aggregate");
        assert_eq!(agg.summary.summary.total_interactions, 2);
        assert_eq!(agg.stats.lines_dropped, 1);
        let first = agg.stats.first_parse_error.expect("parse error recorded");
        assert!(first.contains("line 2"));
    }

    #[test]
    fn non_jsonl_files_and_nested_dirs_are_ignored() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_session(
            tmp.path(),
            "foo",
            "s1",
            &[line("user", "2024-01-15T10:00:00Z", "a")],
        );
        fs::write(
            tmp.path().join("foo/notes.md"),
            line("user", "2024-01-15T10:00:00Z", "b"),
        )
        .expect("write notes");
        fs::create_dir_all(tmp.path().join("foo/nested")).expect("mkdir nested");

        let agg = aggregate(tmp.path(), "2024-01-15", ProjectDecoding::HyphenToSlash)
            .expect("aggregate");
        assert_eq!(agg.stats.files_scanned, 1);
        assert_eq!(agg.summary.projects["/foo"].session_count, 1);
    }

    #[test]
    fn merged_dirs_keep_colliding_sessions_apart() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_session(
            tmp.path(),
            "foo-bar",
            "s1",
            &[
                line("user", "2024-01-15T10:00:00Z", "a"),
                line("assistant", "2024-01-15T10:01:00Z", "b"),
            ],
        );
        write_session(
            tmp.path(),
            "-foo-bar",
            "s1",
            &[
                line("user", "2024-01-15T11:00:00Z", "c"),
                line("assistant", "2024-01-15T11:01:00Z", "d"),
                line("user", "2024-01-15T11:02:00Z", "e"),
            ],
        );

        let agg = aggregate(tmp.path(), "2024-01-15", ProjectDecoding::HyphenToSlash)
            .expect("aggregate");
        assert_eq!(
            agg.stats.merged_dirs["/foo/bar"],
            vec!["-foo-bar".to_string(), "foo-bar".to_string()]
        );
        assert_eq!(agg.stats.lines_matched, 5);
        assert_eq!(agg.summary.summary.total_interactions, 5);

        let project = &agg.summary.projects["/foo/bar"];
        assert_eq!(project.session_count, 2);
        assert_eq!(project.sessions["s1"].entry_count, 3);
        assert_eq!(project.sessions["foo-bar/s1"].entry_count, 2);
        assert_eq!(agg.stats.rekeyed_sessions, vec!["foo-bar/s1".to_string()]);
        assert!(agg.summary.verify().is_empty());
    }

    #[test]
    fn unreadable_session_log_is_skipped_and_recorded() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_session(
            tmp.path(),
            "foo",
            "s1",
            &[line("user", "2024-01-15T10:00:00Z", "a")],
        );
        // A directory with the log extension cannot be read as a file.
        fs::create_dir_all(tmp.path().join("foo/s2.jsonl")).expect("mkdir");

        let agg = aggregate(tmp.path(), "2024-01-15", ProjectDecoding::HyphenToSlash)
            .expect("one unreadable log does not abort the scan");
        assert_eq!(agg.summary.summary.total_interactions, 1);
        assert_eq!(agg.stats.unreadable.len(), 1);
        assert!(agg.stats.unreadable[0].path.ends_with("s2.jsonl"));
    }

    #[test]
    fn missing_root_is_source_not_found() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = aggregate(
            &tmp.path().join("absent"),
            "2024-01-15",
            ProjectDecoding::HyphenToSlash,
        )
        .expect_err("missing root");
        assert!(matches!(
            err.downcast_ref::<DaylogError>(),
            Some(DaylogError::SourceNotFound(_))
        ));
    }

    #[test]
    fn totals_match_recomputation() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_session(
            tmp.path(),
            "alpha",
            "s1",
            &[
                line("user", "2024-01-15T08:00:00Z", "a"),
                line("user", "2024-01-15T08:01:00Z", "b"),
            ],
        );
        write_session(
            tmp.path(),
            "alpha",
            "s2",
            &[line("user", "2024-01-15T09:00:00Z", "c")],
        );
        write_session(
            tmp.path(),
            "beta",
            "s3",
            &[line("assistant", "2024-01-15T10:00:00Z", "d")],
        );

        let summary = aggregate(tmp.path(), "2024-01-15", ProjectDecoding::HyphenToSlash)
            .expect("aggregate")
            .summary;
        assert!(summary.verify().is_empty());
        let sum: usize = summary.projects.values().map(|p| p.total_entries).sum();
        assert_eq!(summary.summary.total_interactions, sum);
        assert_eq!(summary.summary.total_interactions, 4);
        assert_eq!(summary.total_sessions(), 3);
    }

    #[test]
    fn reruns_differ_only_in_generated_at() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_session(
            tmp.path(),
            "b-proj",
            "z",
            &[line("user", "2024-01-15T08:00:00Z", "a")],
        );
        write_session(
            tmp.path(),
            "a-proj",
            "y",
            &[line("user", "2024-01-15T08:00:00Z", "b")],
        );

        let mut first = aggregate(tmp.path(), "2024-01-15", ProjectDecoding::HyphenToSlash)
            .expect("first")
            .summary;
        let mut second = aggregate(tmp.path(), "2024-01-15", ProjectDecoding::HyphenToSlash)
            .expect("second")
            .summary;
        first.generated_at.clear();
        second.generated_at.clear();
        assert_eq!(
            serde_json::to_string(&first).expect("json"),
            serde_json::to_string(&second).expect("json")
        );
    }

    #[test]
    fn verify_flags_tampered_totals() {
        let entry = LogEntry::parse_line(
            r#"{"type":"user","timestamp":"2024-01-15T08:00:00Z","content":"x"}"#,
        )
        .expect("entry");
        let mut sessions = BTreeMap::new();
        sessions.insert("s".to_string(), Session::from_entries(vec![entry]));
        let mut projects = BTreeMap::new();
        projects.insert("/p".to_string(), ProjectSummary::from_sessions(sessions));
        let mut summary = DailySummary::from_projects("2024-01-15", "now", projects);
        assert!(summary.verify().is_empty());

        summary.summary.total_interactions = 9;
        assert_eq!(summary.verify().len(), 1);
        assert_eq!(summary.recomputed().summary.total_interactions, 1);
    }

    #[test]
    fn empty_last_timestamp_falls_back_to_sentinel() {
        let session = Session::from_entries(Vec::new());
        assert_eq!(session.last_timestamp, UNKNOWN_TIMESTAMP);
        assert_eq!(session.entry_count, 0);
    }
}
