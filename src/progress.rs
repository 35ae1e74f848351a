//! Progress events emitted by long-running operations
//!
//! Every operation (backup run, clean, rebuild, restore) reports progress as
//! an ordered stream of [`Update`] values. "Major" updates carry a
//! `(current, total)` ratio and mark coarse steps; "minor" updates are
//! per-file detail that interleaves between majors but never reorders
//! relative to them. Any consumer - the CLI, a test, a future UI - drains
//! the stream at its own pace.

/// One progress event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// Human-readable message; trailing newlines are stripped
    pub message: String,
    /// Steps completed so far
    pub current: usize,
    /// Total steps for this phase
    pub total: usize,
    /// Whether this is fine-grained detail rather than a coarse step
    pub minor: bool,
}

impl Update {
    /// A coarse step with an explicit `(current, total)` ratio
    pub fn major(message: impl Into<String>, current: usize, total: usize) -> Self {
        Self {
            message: trimmed(message),
            current,
            total,
            minor: false,
        }
    }

    /// A status message with no meaningful ratio (reported as complete)
    pub fn status(message: impl Into<String>) -> Self {
        Self::major(message, 1, 1)
    }

    /// Fine-grained detail, e.g. one file within a copy step
    pub fn minor(message: impl Into<String>) -> Self {
        Self {
            message: trimmed(message),
            current: 1,
            total: 1,
            minor: true,
        }
    }

    /// Completion of this phase as a percentage, rounded to two decimals
    pub fn completion(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.current as f64 / self.total as f64 * 10000.0).round() / 100.0
    }

    /// Whether this is a minor (detail) update
    pub fn is_minor(&self) -> bool {
        self.minor
    }
}

fn trimmed(message: impl Into<String>) -> String {
    let mut message = message.into();
    while message.ends_with('\n') {
        message.pop();
    }
    message
}
