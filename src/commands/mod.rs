pub mod extract;
pub mod init;
pub mod report;
pub mod status;
pub mod templates;

use serde::Serialize;

use crate::daylog::audit;
use crate::daylog::paths::DaylogPaths;
use crate::daylog::warn::{self, WarnEvent};
use crate::error::DaylogError;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    /// Record a failure, prefixing the error code when it is a `DaylogError`.
    pub fn error(&mut self, err: &anyhow::Error) {
        match err.downcast_ref::<DaylogError>() {
            Some(known) => self.issue(format!("{}: {known}", known.code())),
            None => self.issue(format!("{err:#}")),
        }
    }
}

/// Append an audit event; a failing audit log only produces a warning.
pub fn audit_or_warn(paths: &DaylogPaths, phase: &str, status: &str, message: &str) {
    if let Err(err) = audit::append_event(paths, phase, status, message) {
        warn::emit(WarnEvent {
            code: "AUDIT_WRITE_FAILED",
            stage: phase,
            action: "append-audit",
            target: &audit::audit_log_path(paths).display().to_string(),
            reason: "audit log not writable",
            err: &format!("{err:#}"),
        });
    }
}
