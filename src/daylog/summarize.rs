use anyhow::Result;
use std::collections::BTreeSet;
use std::path::Path;

use crate::assistant::discover::discover_assistant;
use crate::assistant::runner::CommandSummarizer;
use crate::daylog::config::{SummarizerConfig, SummarizerMode};
use crate::daylog::util::truncate_with_ellipsis;

pub const MAX_BULLET_CHARS: usize = 80;
pub const MAX_TOOL_BULLETS: usize = 5;
pub const MAX_KEYWORD_BULLETS: usize = 3;
const MAX_PROMPT_LINES: usize = 400;

/// Turns a prompt into free text. The only seam between the report pipeline
/// and an external summarization tool.
pub trait Summarizer {
    fn summarize(&self, prompt: &str) -> Result<String>;

    fn label(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySource {
    Assistant,
    Keyword,
}

impl SummarySource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::Keyword => "keyword",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivitySummary {
    pub bullets: Vec<String>,
    pub source: SummarySource,
    /// Why the external tool was not used, when it was configured.
    pub fallback_reason: Option<String>,
}

pub fn build_prompt(project_name: &str, messages: &[String]) -> String {
    let mut prompt = format!(
        "Summarize today's work on the project `{project_name}` as at most {MAX_TOOL_BULLETS} short bullet points.\n\
         Each bullet must start with \"- \", describe one concrete piece of work, and stay under {MAX_BULLET_CHARS} characters.\n\
         Reply with the bullets only.\n\nActivity log:\n"
    );
    for line in messages.iter().take(MAX_PROMPT_LINES) {
        prompt.push_str("- ");
        prompt.push_str(line);
        prompt.push('\n');
    }
    prompt
}

fn strip_bullet(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    ["- ", "* ", "• "]
        .iter()
        .find_map(|marker| trimmed.strip_prefix(marker))
        .map(str::trim)
        .filter(|rest| !rest.is_empty())
}

/// Keep lines that start with a bullet marker, capped and length-limited.
pub fn parse_bullets(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(strip_bullet)
        .take(MAX_TOOL_BULLETS)
        .map(|b| truncate_with_ellipsis(b, MAX_BULLET_CHARS))
        .collect()
}

/// Select message lines mentioning a work keyword.
pub fn keyword_bullets(messages: &[String], keywords: &[String]) -> Vec<String> {
    let needles: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for line in messages {
        let lower = line.to_lowercase();
        if !needles.iter().any(|k| lower.contains(k.as_str())) {
            continue;
        }
        let bullet = truncate_with_ellipsis(line.trim(), MAX_BULLET_CHARS);
        if !seen.insert(bullet.clone()) {
            continue;
        }
        out.push(bullet);
        if out.len() >= MAX_KEYWORD_BULLETS {
            break;
        }
    }
    out
}

/// Condense one project's messages into bullets. Never fails: any problem
/// with the external tool degrades to the keyword classifier.
pub fn summarize_activity(
    project_name: &str,
    messages: &[String],
    tool: Option<&dyn Summarizer>,
    keywords: &[String],
) -> ActivitySummary {
    let mut fallback_reason = None;
    if let Some(tool) = tool {
        if messages.is_empty() {
            fallback_reason = Some("no messages to summarize".to_string());
        } else {
            match tool.summarize(&build_prompt(project_name, messages)) {
                Ok(output) => {
                    let bullets = parse_bullets(&output);
                    if !bullets.is_empty() {
                        return ActivitySummary {
                            bullets,
                            source: SummarySource::Assistant,
                            fallback_reason: None,
                        };
                    }
                    fallback_reason = Some(format!("{} returned no bullets", tool.label()));
                }
                Err(err) => fallback_reason = Some(format!("{err:#}")),
            }
        }
    }

    ActivitySummary {
        bullets: keyword_bullets(messages, keywords),
        source: SummarySource::Keyword,
        fallback_reason,
    }
}

/// The summarizer chosen for a run, plus a note describing the choice.
pub struct SummarizerChoice {
    pub tool: Option<Box<dyn Summarizer>>,
    pub note: String,
}

pub fn choose_summarizer(cfg: &SummarizerConfig, home: Option<&Path>) -> SummarizerChoice {
    if cfg.mode == SummarizerMode::Keyword {
        return SummarizerChoice {
            tool: None,
            note: "summarizer=keyword (disabled by config)".to_string(),
        };
    }

    match discover_assistant(cfg.command.as_deref(), home) {
        Ok(Some(found)) => SummarizerChoice {
            note: format!(
                "summarizer=assistant bin={} source={}",
                found.bin.display(),
                found.source.label()
            ),
            tool: Some(Box::new(CommandSummarizer::new(
                found.bin,
                cfg.args.clone(),
                cfg.timeout_secs,
            ))),
        },
        Ok(None) => SummarizerChoice {
            tool: None,
            note: "summarizer=keyword (assistant not found)".to_string(),
        },
        Err(err) => SummarizerChoice {
            tool: None,
            note: format!("summarizer=keyword (assistant unavailable: {err:#})"),
        },
    }
}
