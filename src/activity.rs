//! Activity log — a capped, append-only ring of human-readable event lines.
//!
//! This is the user-facing side panel, not diagnostics (that is `tracing`).
//! Every pipeline operation appends one line here; the buffer keeps only the
//! most recent [`ACTIVITY_LOG_CAP`] entries (FIFO — oldest dropped first).

use std::collections::VecDeque;

use tracing::debug;

/// Maximum number of retained entries.
pub const ACTIVITY_LOG_CAP: usize = 50;

#[derive(Debug)]
pub struct ActivityLog {
    entries: VecDeque<String>,
    cap: usize,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::with_cap(ACTIVITY_LOG_CAP)
    }

    /// Custom cap, for tests.
    pub fn with_cap(cap: usize) -> Self {
        Self { entries: VecDeque::new(), cap }
    }

    /// Append an entry, then drop oldest entries until the cap holds.
    pub fn append(&mut self, entry: impl Into<String>) {
        let entry = entry.into();
        debug!(%entry, "activity");
        self.entries.push_back(entry);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    /// Current entries, oldest to newest.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncate `text` to at most `max` characters for display, appending an
/// ellipsis when something was cut. Counts characters, not bytes, so
/// multi-byte input never splits.
pub(crate) fn truncate_for_log(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_snapshot_preserve_order() {
        let mut log = ActivityLog::new();
        log.append("first");
        log.append("second");
        assert_eq!(log.snapshot(), vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn cap_keeps_most_recent_entries() {
        let mut log = ActivityLog::new();
        for i in 0..120 {
            log.append(format!("entry {i}"));
        }
        let snap = log.snapshot();
        assert_eq!(snap.len(), ACTIVITY_LOG_CAP);
        assert_eq!(snap.first().unwrap(), "entry 70");
        assert_eq!(snap.last().unwrap(), "entry 119");
    }

    #[test]
    fn small_cap_evicts_fifo() {
        let mut log = ActivityLog::with_cap(3);
        for s in ["a", "b", "c", "d", "e"] {
            log.append(s);
        }
        assert_eq!(log.snapshot(), vec!["c", "d", "e"]);
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate_for_log("short", 50), "short");
        let long = "x".repeat(60);
        let cut = truncate_for_log(&long, 50);
        assert_eq!(cut.chars().count(), 51);
        assert!(cut.ends_with('…'));

        // 10 multi-byte chars, limit 5 — must not split a code point.
        let cut = truncate_for_log("éééééééééé", 5);
        assert_eq!(cut, "ééééé…");
    }
}
