use anyhow::Result;
use std::path::PathBuf;
use std::process::Command;

use crate::daylog::summarize::Summarizer;
use crate::daylog::util::run_command_with_stdin;
use crate::error::DaylogError;

/// Runs the assistant CLI non-interactively with the prompt on stdin.
#[derive(Debug, Clone)]
pub struct CommandSummarizer {
    pub bin: PathBuf,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl CommandSummarizer {
    pub fn new(bin: PathBuf, args: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            bin,
            args,
            timeout_secs,
        }
    }
}

impl Summarizer for CommandSummarizer {
    fn summarize(&self, prompt: &str) -> Result<String> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(&self.args);
        let out = run_command_with_stdin(&mut cmd, prompt, self.timeout_secs).map_err(|err| {
            DaylogError::ExternalToolError(format!("{}: {err:#}", self.bin.display()))
        })?;

        if !out.status.success() {
            return Err(DaylogError::ExternalToolError(format!(
                "{} exited with {}: {}",
                self.bin.display(),
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            ))
            .into());
        }

        let text = String::from_utf8_lossy(&out.stdout).to_string();
        if text.trim().is_empty() {
            return Err(DaylogError::ExternalToolError(format!(
                "{} produced no output",
                self.bin.display()
            ))
            .into());
        }
        Ok(text)
    }

    fn label(&self) -> &str {
        "assistant"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::CommandSummarizer;
    use crate::daylog::summarize::Summarizer;
    use crate::error::DaylogError;
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, Instant};

    fn write_script(path: &Path, body: &str) {
        fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).expect("chmod");
    }

    #[test]
    fn returns_stdout_of_successful_run() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let bin = tmp.path().join("fake");
        write_script(&bin, "cat >/dev/null\necho '- shipped the parser'");

        let runner = CommandSummarizer::new(bin, Vec::new(), 5);
        let out = runner.summarize("prompt").expect("summarize");
        assert_eq!(out.trim(), "- shipped the parser");
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let bin = tmp.path().join("fake");
        write_script(&bin, "echo boom >&2\nexit 3");

        let runner = CommandSummarizer::new(bin, Vec::new(), 5);
        let err = runner.summarize("prompt").expect_err("failure");
        assert!(format!("{err:#}").contains("boom"));
    }

    #[test]
    fn empty_output_is_an_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let bin = tmp.path().join("fake");
        write_script(&bin, "cat >/dev/null");

        let runner = CommandSummarizer::new(bin, Vec::new(), 5);
        assert!(runner.summarize("prompt").is_err());
    }

    #[test]
    fn background_child_holding_stdout_cannot_outlive_timeout() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let bin = tmp.path().join("fake");
        write_script(&bin, "cat >/dev/null\nsleep 6 &\necho '- done'");

        let runner = CommandSummarizer::new(bin, Vec::new(), 1);
        let started = Instant::now();
        let err = runner.summarize("prompt").expect_err("pipe held past deadline");
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(matches!(
            err.downcast_ref::<DaylogError>(),
            Some(DaylogError::ExternalToolError(_))
        ));
    }
}
