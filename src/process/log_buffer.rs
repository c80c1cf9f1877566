use chrono::{DateTime, Utc};
use std::collections::VecDeque;

pub const DEFAULT_LOG_LINES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub stream: OutputStream,
    pub text: String,
}

/// Ring of the most recent output lines of one process.
#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    next_seq: u64,
    dropped: u64,
    lines: VecDeque<LogLine>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_LINES)
    }
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            next_seq: 1,
            dropped: 0,
            lines: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_LINES)),
        }
    }

    pub fn push_line(&mut self, stream: OutputStream, text: String) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.lines.push_back(LogLine {
            seq,
            at: Utc::now(),
            stream,
            text,
        });
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lines evicted so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// The last `limit` lines, oldest first.
    pub fn tail(&self, limit: usize) -> Vec<LogLine> {
        let start = self.lines.len().saturating_sub(limit);
        self.lines.iter().skip(start).cloned().collect()
    }

    /// Up to `limit` lines with a sequence number above `cursor`, plus the new
    /// cursor.
    pub fn after(&self, cursor: u64, limit: usize) -> (Vec<LogLine>, u64) {
        let mut out = Vec::new();
        let mut last = cursor;
        for line in self.lines.iter().filter(|line| line.seq > cursor) {
            if out.len() >= limit {
                break;
            }
            last = line.seq;
            out.push(line.clone());
        }
        (out, last)
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.text.contains(needle))
    }

    pub fn render_tail(&self, limit: usize) -> String {
        self.tail(limit)
            .into_iter()
            .map(|line| format!("[{}] {}", line.stream.as_str(), line.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_evicts_oldest_lines_beyond_capacity() {
        let mut buffer = LogBuffer::with_capacity(3);
        for idx in 0..5 {
            buffer.push_line(OutputStream::Stdout, format!("line {idx}"));
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.dropped(), 2);
        let texts: Vec<_> = buffer.tail(10).into_iter().map(|l| l.text).collect();
        assert_eq!(texts, vec!["line 2", "line 3", "line 4"]);
        assert!(!buffer.contains("line 0"));
    }

    #[test]
    fn after_cursor_pages_through_lines() {
        let mut buffer = LogBuffer::with_capacity(10);
        for idx in 0..4 {
            buffer.push_line(OutputStream::Stderr, format!("e{idx}"));
        }
        let (first, cursor) = buffer.after(0, 2);
        assert_eq!(first.len(), 2);
        assert_eq!(cursor, 2);
        let (rest, cursor) = buffer.after(cursor, 10);
        assert_eq!(rest.len(), 2);
        assert_eq!(cursor, 4);
        let (none, same) = buffer.after(cursor, 10);
        assert!(none.is_empty());
        assert_eq!(same, 4);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut buffer = LogBuffer::with_capacity(0);
        buffer.push_line(OutputStream::Stdout, "a".to_string());
        buffer.push_line(OutputStream::Stdout, "b".to_string());
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.render_tail(5), "[stdout] b");
    }
}
