use colored::*;
use std::io::Write;
use std::sync::Mutex;

/// Operator-visible output shared by every worker
///
/// `line` carries tailed output and progress notices, `error` carries
/// reported failures. Implementations write each call as one unit so lines
/// from different targets never tear.
pub trait OutputSink: Send + Sync {
    fn line(&self, text: &str);
    fn error(&self, text: &str);
}

/// Writes lines to stdout and errors to stderr, flushing after each write
#[derive(Debug, Default)]
pub struct TerminalSink;

impl OutputSink for TerminalSink {
    fn line(&self, text: &str) {
        if !write_unit(&mut std::io::stdout().lock(), text) {
            tracing::debug!("stdout closed, dropping line");
        }
    }

    fn error(&self, text: &str) {
        let marked = format!("{} {}", "✗".red().bold(), text);
        if !write_unit(&mut std::io::stderr().lock(), &marked) {
            tracing::debug!("stderr closed, dropping error: {}", text);
        }
    }
}

/// Write `text` as one line and flush; false when the stream is gone
fn write_unit<W: Write>(out: &mut W, text: &str) -> bool {
    writeln!(out, "{}", text).and_then(|_| out.flush()).is_ok()
}

/// Keeps everything in memory; used to inspect output in tests
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl OutputSink for MemorySink {
    fn line(&self, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(text.to_string());
        }
    }

    fn error(&self, text: &str) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(text.to_string());
        }
    }
}
