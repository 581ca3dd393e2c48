use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::io::{Read, Write};
use std::process::{Command, Output, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::error::DaylogError;

pub const ELLIPSIS: char = '…';

/// Return the current Unix epoch in seconds.
pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Today's local calendar date as `YYYY-MM-DD`.
pub fn today_local() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Validate a `YYYY-MM-DD` argument, defaulting to today when absent.
pub fn resolve_date(raw: Option<&str>) -> Result<String, DaylogError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(today_local());
    };
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Ok(date.format("%Y-%m-%d").to_string()),
        Err(_) => Err(DaylogError::InvalidDate(raw.to_string())),
    }
}

/// Truncate `input` so the result is at most `max_chars` Unicode characters,
/// stripping control characters and ending in `…` when truncated.
pub fn truncate_with_ellipsis(input: &str, max_chars: usize) -> String {
    let clean: String = input.chars().filter(|c| !c.is_control()).collect();
    if clean.chars().count() <= max_chars {
        return clean;
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut s: String = clean.chars().take(max_chars - 1).collect();
    s.push(ELLIPSIS);
    s
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

fn collect_by(
    reader: Option<Receiver<Vec<u8>>>,
    deadline: Instant,
    stream: &str,
    timeout_secs: u64,
) -> Result<Vec<u8>> {
    let Some(rx) = reader else {
        return Ok(Vec::new());
    };
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(buf) => Ok(buf),
        Err(RecvTimeoutError::Disconnected) => Ok(Vec::new()),
        // A descendant that inherited the pipe keeps it open after the child exits.
        Err(RecvTimeoutError::Timeout) => {
            anyhow::bail!("command {stream} still open after {timeout_secs}s")
        }
    }
}

/// Spawn `cmd`, feed `stdin_text` to it, and wait at most `timeout_secs` for
/// it to exit and close its output pipes.
///
/// Pipes are serviced on helper threads so a chatty child cannot stall on a
/// full pipe while the deadline is being polled. The stdin writer is never
/// joined.
pub fn run_command_with_stdin(
    cmd: &mut Command,
    stdin_text: &str,
    timeout_secs: u64,
) -> Result<Output> {
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    let mut child = cmd.spawn().context("failed to spawn command")?;

    if let Some(mut pipe) = child.stdin.take() {
        let payload = stdin_text.as_bytes().to_vec();
        // A child that exits without reading stdin closes the pipe early.
        thread::spawn(move || {
            let _ = pipe.write_all(&payload);
        });
    }
    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let deadline = Instant::now() + Duration::from_secs(timeout_secs);
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            anyhow::bail!("command timed out after {}s", timeout_secs);
        }
        thread::sleep(Duration::from_millis(50));
    };

    let stdout = collect_by(stdout_reader, deadline, "stdout", timeout_secs)?;
    let stderr = collect_by(stderr_reader, deadline, "stderr", timeout_secs)?;
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}
