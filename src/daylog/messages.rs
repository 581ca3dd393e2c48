use crate::daylog::aggregate::ProjectSummary;
use crate::daylog::config::SummarizerConfig;
use crate::daylog::entry::{EntryKind, LogEntry};

pub const MAX_USER_LINES: usize = 200;
pub const MAX_ASSISTANT_LINES: usize = 200;
pub const MAX_TOOL_RESULT_LINES: usize = 100;

/// Text lines pulled from one project's entries, grouped by origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectMessages {
    pub user: Vec<String>,
    pub assistant: Vec<String>,
    pub tool_results: Vec<String>,
}

impl ProjectMessages {
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.assistant.is_empty() && self.tool_results.is_empty()
    }

    /// Categories concatenated in prompt order.
    pub fn lines(&self) -> Vec<String> {
        let mut out =
            Vec::with_capacity(self.user.len() + self.assistant.len() + self.tool_results.len());
        out.extend(self.user.iter().cloned());
        out.extend(self.assistant.iter().cloned());
        out.extend(self.tool_results.iter().cloned());
        out
    }
}

fn contains_any(text: &str, phrases: &[String]) -> bool {
    let lower = text.to_lowercase();
    phrases
        .iter()
        .map(|p| p.trim().to_lowercase())
        .any(|p| !p.is_empty() && lower.contains(&p))
}

fn push_lines(text: &str, out: &mut Vec<String>, cap: usize) {
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if out.len() >= cap {
            return;
        }
        out.push(line.to_string());
    }
}

fn collect_entry(entry: &LogEntry, cfg: &SummarizerConfig, out: &mut ProjectMessages) {
    match entry.kind {
        EntryKind::User => push_lines(&entry.content.text(), &mut out.user, MAX_USER_LINES),
        EntryKind::Assistant => {
            let text = entry.content.text();
            if contains_any(&text, &cfg.completion_phrases) {
                push_lines(&text, &mut out.assistant, MAX_ASSISTANT_LINES);
            }
        }
        EntryKind::Other => {}
    }

    for block in entry.content.blocks().iter().filter(|b| b.is_tool_result()) {
        if let Some(text) = block.tool_result_text()
            && contains_any(&text, &cfg.success_phrases)
        {
            push_lines(&text, &mut out.tool_results, MAX_TOOL_RESULT_LINES);
        }
    }
}

/// Group a project's entries (sessions in id order, entries in file order).
pub fn extract_messages(project: &ProjectSummary, cfg: &SummarizerConfig) -> ProjectMessages {
    let mut out = ProjectMessages::default();
    for session in project.sessions.values() {
        for entry in &session.entries {
            collect_entry(entry, cfg, &mut out);
        }
    }
    out
}
