use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::daylog::paths::DaylogPaths;
use crate::error::DaylogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummarizerMode {
    /// Use the external assistant when discoverable, keyword fallback otherwise.
    Auto,
    /// Never spawn the assistant.
    Keyword,
}

impl SummarizerMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" | "assistant" | "claude" => Some(Self::Auto),
            "keyword" | "keywords" | "local" | "off" => Some(Self::Keyword),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Keyword => "keyword",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectDecoding {
    HyphenToSlash,
    Verbatim,
}

impl ProjectDecoding {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hyphen-to-slash" | "hyphen" | "slash" => Some(Self::HyphenToSlash),
            "verbatim" | "raw" | "none" => Some(Self::Verbatim),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::HyphenToSlash => "hyphen-to-slash",
            Self::Verbatim => "verbatim",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub mode: SummarizerMode,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    pub keywords: Vec<String>,
    pub completion_phrases: Vec<String>,
    pub success_phrases: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            mode: SummarizerMode::Auto,
            command: None,
            args: strings(&["--print"]),
            timeout_secs: 90,
            keywords: strings(&[
                "implement",
                "create",
                "add",
                "fix",
                "improve",
                "refactor",
                "update",
                "test",
                "debug",
                "optimiz",
            ]),
            completion_phrases: strings(&[
                "implemented",
                "created",
                "added",
                "fixed",
                "improved",
                "updated",
                "completed",
                "refactored",
                "done",
                "✅",
            ]),
            success_phrases: strings(&[
                "success",
                "passed",
                "completed",
                "created",
                "updated",
                "written",
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub days: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { days: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectsConfig {
    pub decoding: ProjectDecoding,
}

impl Default for ProjectsConfig {
    fn default() -> Self {
        Self {
            decoding: ProjectDecoding::HyphenToSlash,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub default_template: String,
    pub top_projects: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_template: "simple".to_string(),
            top_projects: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DaylogConfig {
    pub summarizer: SummarizerConfig,
    pub retention: RetentionConfig,
    pub projects: ProjectsConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialDaylogConfig {
    summarizer: Option<SummarizerConfig>,
    retention: Option<RetentionConfig>,
    projects: Option<ProjectsConfig>,
    report: Option<ReportConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn validate(cfg: &DaylogConfig) -> Result<()> {
    if cfg.summarizer.timeout_secs == 0 {
        return Err(anyhow!("invalid summarizer timeout: must be >= 1 second"));
    }
    if cfg.summarizer.keywords.iter().all(|k| k.trim().is_empty()) {
        return Err(anyhow!("invalid summarizer keywords: need at least one"));
    }
    if cfg.report.top_projects == 0 {
        return Err(anyhow!("invalid report top_projects: must be >= 1"));
    }
    if cfg.report.default_template.trim().is_empty() {
        return Err(anyhow!("invalid report default_template: cannot be empty"));
    }
    Ok(())
}

pub fn config_path(paths: &DaylogPaths) -> PathBuf {
    match env_non_empty("DAYLOG_CONFIG_PATH") {
        Some(custom) => PathBuf::from(custom),
        None => paths.daylog_home.join("daylog.toml"),
    }
}

fn merge_file_config(base: &mut DaylogConfig, paths: &DaylogPaths) -> Result<()> {
    let path = config_path(paths);
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)
        .map_err(|err| anyhow!("failed to read daylog config {}: {err}", path.display()))?;
    let parsed: PartialDaylogConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse daylog config {}: {err}", path.display()))?;
    if let Some(summarizer) = parsed.summarizer {
        base.summarizer = summarizer;
    }
    if let Some(retention) = parsed.retention {
        base.retention = retention;
    }
    if let Some(projects) = parsed.projects {
        base.projects = projects;
    }
    if let Some(report) = parsed.report {
        base.report = report;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut DaylogConfig) -> Result<()> {
    if let Some(raw) = env_non_empty("DAYLOG_SUMMARIZER") {
        cfg.summarizer.mode = SummarizerMode::parse(&raw)
            .ok_or_else(|| anyhow!("invalid DAYLOG_SUMMARIZER `{raw}`; use `auto` or `keyword`"))?;
    }
    if let Some(bin) = env_non_empty("DAYLOG_ASSISTANT_BIN") {
        cfg.summarizer.command = Some(bin);
    }
    cfg.summarizer.timeout_secs = env_or_u64(
        "DAYLOG_SUMMARIZER_TIMEOUT_SECS",
        cfg.summarizer.timeout_secs,
    );
    cfg.retention.days = env_or_u64("DAYLOG_RETENTION_DAYS", cfg.retention.days);
    if let Some(raw) = env_non_empty("DAYLOG_PROJECT_DECODING") {
        cfg.projects.decoding = ProjectDecoding::parse(&raw).ok_or_else(|| {
            anyhow!("invalid DAYLOG_PROJECT_DECODING `{raw}`; use `hyphen-to-slash` or `verbatim`")
        })?;
    }
    cfg.report.default_template =
        env_or_string("DAYLOG_DEFAULT_TEMPLATE", &cfg.report.default_template);
    Ok(())
}

fn layered_config(paths: &DaylogPaths) -> Result<DaylogConfig> {
    let mut cfg = DaylogConfig::default();
    merge_file_config(&mut cfg, paths)?;
    apply_env_overrides(&mut cfg)?;
    validate(&cfg)?;
    Ok(cfg)
}

pub fn load_config(paths: &DaylogPaths) -> Result<DaylogConfig> {
    layered_config(paths).map_err(|err| DaylogError::InvalidConfig(format!("{err:#}")).into())
}
