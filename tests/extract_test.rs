use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn entry(kind: &str, ts: &str, text: &str) -> String {
    format!("{{\"type\":\"{kind}\",\"timestamp\":\"{ts}\",\"message\":{{\"content\":\"{text}\"}}}}\n")
}

fn write_session(source: &Path, project: &str, session: &str, lines: &[String]) {
    let dir = source.join(project);
    fs::create_dir_all(&dir).expect("mkdir project");
    fs::write(dir.join(format!("{session}.jsonl")), lines.concat()).expect("write session");
}

fn seed_source(source: &Path) {
    write_session(
        source,
        "-nonexistent-daylog-foo-bar",
        "s1",
        &[
            entry("user", "2024-01-15T09:00:00Z", "Fix the login bug"),
            entry("assistant", "2024-01-15T09:01:00Z", "Fixed the login bug"),
            entry("user", "2024-01-14T09:00:00Z", "yesterday"),
        ],
    );
    write_session(
        source,
        "-nonexistent-daylog-foo-bar",
        "s2",
        &[entry("user", "2024-01-15T11:00:00Z", "Add a test")],
    );
}

#[test]
fn extract_writes_summary_and_reports_progress() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path().join("home");
    let source = tmp.path().join("projects");
    seed_source(&source);
    fs::write(
        source.join("-nonexistent-daylog-foo-bar").join("s3.jsonl"),
        "not json at 2024-01-15\n",
    )
    .expect("write malformed");

    assert_cmd::cargo::cargo_bin_cmd!("daylog")
        .env("DAYLOG_HOME", &home)
        .env("DAYLOG_SOURCE_DIR", &source)
        .env("DAYLOG_SUMMARIZER", "keyword")
        .args(["extract", "2024-01-15"])
        .assert()
        .success()
        .stdout(predicate::str::contains("extract: ok"))
        .stdout(predicate::str::contains(
            "project=/nonexistent/daylog/foo/bar sessions=2 entries=3",
        ))
        .stdout(predicate::str::contains("lines_dropped=1"))
        .stdout(predicate::str::contains("retention days=30 removed=0 failed=0"))
        .stderr(predicate::str::contains("code=AMBIGUOUS_PROJECT_PATH"))
        .stderr(predicate::str::contains("code=MALFORMED_LINES"));

    let summary_path = home.join("backups/activity-2024-01-15.json");
    let raw = fs::read_to_string(&summary_path).expect("summary written");
    let doc: serde_json::Value = serde_json::from_str(&raw).expect("summary json");
    assert_eq!(doc["summary"]["total_projects"], 1);
    assert_eq!(doc["summary"]["total_interactions"], 3);
    assert_eq!(
        doc["projects"]["/nonexistent/daylog/foo/bar"]["session_count"],
        2
    );

    let audit = fs::read_to_string(home.join("logs/audit.log")).expect("audit log");
    assert!(audit.contains("\"phase\":\"extract\""));
    assert!(audit.contains("\"phase\":\"retention\""));
}

#[test]
fn extract_fails_when_source_is_missing() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path().join("home");

    assert_cmd::cargo::cargo_bin_cmd!("daylog")
        .env("DAYLOG_HOME", &home)
        .env("DAYLOG_SOURCE_DIR", tmp.path().join("absent"))
        .env("DAYLOG_SUMMARIZER", "keyword")
        .args(["extract", "2024-01-15"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("SOURCE_NOT_FOUND"));

    assert!(!home.join("backups/activity-2024-01-15.json").exists());
}

#[test]
fn extract_rejects_malformed_date() {
    let tmp = tempdir().expect("tempdir");
    let source = tmp.path().join("projects");
    fs::create_dir_all(&source).expect("mkdir source");

    assert_cmd::cargo::cargo_bin_cmd!("daylog")
        .env("DAYLOG_HOME", tmp.path().join("home"))
        .env("DAYLOG_SOURCE_DIR", &source)
        .args(["extract", "15/01/2024"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("INVALID_DATE"));
}

#[test]
fn dry_run_writes_nothing() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path().join("home");
    let source = tmp.path().join("projects");
    seed_source(&source);

    assert_cmd::cargo::cargo_bin_cmd!("daylog")
        .env("DAYLOG_HOME", &home)
        .env("DAYLOG_SOURCE_DIR", &source)
        .args(["--json", "extract", "2024-01-15", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ok\": true"))
        .stdout(predicate::str::contains("extract.dry_run=true"));

    assert!(!home.join("backups").exists());
}

#[test]
fn empty_day_still_produces_a_summary() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path().join("home");
    let source = tmp.path().join("projects");
    seed_source(&source);

    assert_cmd::cargo::cargo_bin_cmd!("daylog")
        .env("DAYLOG_HOME", &home)
        .env("DAYLOG_SOURCE_DIR", &source)
        .args(["extract", "2023-12-31"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "total_projects=0 total_sessions=0 total_interactions=0",
        ));

    assert!(home.join("backups/activity-2023-12-31.json").is_file());
}
