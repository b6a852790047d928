//! Terminal rendering of controller state: status lines, failure text, incremental output.

use std::io::{self, Write};

use client_core::FormState;
use shared::{
    domain::MIN_INPUT_CHARS,
    error::{ErrorCode, ExcuseError},
};

pub fn describe_failure(err: &ExcuseError) -> String {
    match err {
        ExcuseError::Validation { .. } => invalid_input_message(),
        ExcuseError::Busy => "An excuse is already being generated; wait for it to finish.".into(),
        ExcuseError::RequestFailed { status } => classify_request_failure(status),
        ExcuseError::StreamReadFailed { reason } => {
            format!("The excuse was cut off ({reason}); the part that arrived is shown above.")
        }
    }
}

fn classify_request_failure(status: &str) -> String {
    let lower = status.to_ascii_lowercase();
    if lower.contains("failed to reach")
        || lower.contains("connection refused")
        || lower.contains("dns")
        || lower.contains("timed out")
    {
        "Generation server unreachable; check the server URL and retry.".to_string()
    } else {
        format!("Could not generate an excuse: {status}")
    }
}

/// Whether the submission got as far as the backend, so there may be output to close off.
pub fn reached_backend(err: &ExcuseError) -> bool {
    matches!(
        err.code(),
        ErrorCode::RequestFailed | ErrorCode::StreamReadFailed
    )
}

pub fn invalid_input_message() -> String {
    format!("Your input needs to be at least {MIN_INPUT_CHARS} characters.")
}

/// Status shown next to the form. The loading indicator follows the lock.
pub fn status_line(state: &FormState) -> Option<String> {
    if state.is_loading() {
        Some("Generating excuse...".to_string())
    } else if state.is_invalid {
        Some(invalid_input_message())
    } else {
        None
    }
}

/// Remembers how much of the generated text was already written out.
#[derive(Debug, Default)]
pub struct OutputCursor {
    written: usize,
}

impl OutputCursor {
    /// Returns the part of `text` not yet written.
    pub fn advance<'a>(&mut self, text: &'a str) -> &'a str {
        let fresh = text.get(self.written..).unwrap_or_default();
        self.written = text.len();
        fresh
    }
}

/// Writes generated text as it arrives. The first failed write (closed pipe, full disk)
/// closes the sink and later output is dropped.
#[derive(Debug)]
pub struct OutputSink<W> {
    out: W,
    closed: bool,
}

impl<W: Write> OutputSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, closed: false }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn write(&mut self, text: &str) {
        if self.closed || text.is_empty() {
            return;
        }
        if let Err(err) = self.try_write(text) {
            tracing::debug!("cli: output closed, dropping the rest of the excuse: {err}");
            self.closed = true;
        }
    }

    fn try_write(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum InputLine<'a> {
    Blank,
    Quit,
    Category(&'a str),
    Excuse(&'a str),
}

pub fn parse_input_line(line: &str) -> InputLine<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return InputLine::Blank;
    }
    if trimmed == ":quit" || trimmed == ":q" {
        return InputLine::Quit;
    }
    if let Some(rest) = trimmed.strip_prefix(":category") {
        return InputLine::Category(rest.trim());
    }
    // the raw line is submitted, the length check must see untrimmed input
    InputLine::Excuse(line.trim_end_matches(['\r', '\n']))
}
