//! Injected `(tag, message)` log sinks.
//!
//! The proxy core pushes one message per notable event (state transition,
//! accepted client, per-connection error) to whatever sink its owner hands
//! it. It never buffers or persists these itself.

use chrono::{DateTime, Local, TimeZone};
use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Mutex;

/// Receiver of the proxy's notable events.
pub trait LogSink: Send + Sync {
    fn emit(&self, tag: &str, message: &str);
}

/// Forwards every event to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, tag: &str, message: &str) {
        tracing::info!(tag, "{message}");
    }
}

/// Keeps the most recent lines for a status display, and traces them too.
#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: Mutex::new(VecDeque::new()),
        }
    }

    /// Buffered lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// All buffered lines joined with newlines.
    pub fn text(&self) -> String {
        self.lines()
            .into_iter()
            .map(|line| line + "\n")
            .collect()
    }

    fn push(&self, line: String) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push_back(line);
        while lines.len() > self.capacity {
            lines.pop_front();
        }
    }
}

impl LogSink for LogBuffer {
    fn emit(&self, tag: &str, message: &str) {
        tracing::info!(tag, "{message}");
        self.push(format_line(&Local::now(), tag, message));
    }
}

/// `[HH:MM:SS] TAG: message`, clock time in the timestamp's own zone.
fn format_line<Tz>(at: &DateTime<Tz>, tag: &str, message: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("[{}] {tag}: {message}", at.format("%H:%M:%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::FixedOffset;

    #[test]
    fn lines_are_timestamped_and_tagged() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let at = tokyo.with_ymd_and_hms(2024, 3, 1, 10, 1, 1).unwrap();
        assert_eq!(
            format_line(&at, "ProxyService", "Proxy stopped"),
            "[10:01:01] ProxyService: Proxy stopped"
        );
    }

    #[test]
    fn buffered_lines_use_local_clock_time() {
        let buffer = LogBuffer::new(1);
        let before = Local::now();
        buffer.emit("T", "tick");
        let after = Local::now();

        let line = &buffer.lines()[0];
        let stamp = &line[1..9];
        assert!(
            stamp == before.format("%H:%M:%S").to_string()
                || stamp == after.format("%H:%M:%S").to_string(),
            "unexpected timestamp in {line:?}"
        );
    }

    #[test]
    fn buffer_keeps_only_the_newest_lines() {
        let buffer = LogBuffer::new(3);
        for i in 0..5 {
            buffer.emit("T", &format!("event {i}"));
        }
        let lines = buffer.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("T: event 2"));
        assert!(lines[2].ends_with("T: event 4"));
        assert_eq!(buffer.text().lines().count(), 3);
    }
}
