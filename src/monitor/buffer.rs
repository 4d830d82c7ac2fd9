//! Bounded log history for the active stream.

use regex::Regex;
use std::collections::VecDeque;

/// Lines kept for the selected container
pub const LOG_BUFFER_CAPACITY: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Arrival position, strictly increasing for the lifetime of the buffer
    pub seq: u64,
    pub text: String,
}

/// Fixed-capacity FIFO ring. Appending past capacity evicts the oldest line
/// in the same call, so length never exceeds capacity.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<LogLine>,
    capacity: usize,
    next_seq: u64,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(LOG_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            next_seq: 1,
        }
    }

    pub fn push(&mut self, text: String) -> u64 {
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.lines.push_back(LogLine { seq, text });
        seq
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[allow(unused)]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[allow(unused)]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    /// Lines whose text matches `filter`, oldest first
    pub fn matching<'a>(&'a self, filter: Option<&'a Regex>) -> impl Iterator<Item = &'a LogLine> + 'a {
        self.lines
            .iter()
            .filter(move |line| filter.is_none_or(|re| re.is_match(&line.text)))
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}
