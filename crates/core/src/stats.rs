use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::DeleteMode;

/// Counters for one scan run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanStats {
    pub books_added: usize,
    pub books_skipped: usize,
    pub books_deleted: usize,
    pub books_in_archives: usize,
    /// Candidates dropped because their stream or metadata could not be read.
    pub books_failed: usize,
    pub archives_scanned: usize,
    pub archives_skipped: usize,
    pub bad_archives: usize,
    pub duplicates_resolved: usize,
    pub delete_mode: DeleteMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScanStats {
    pub fn start(delete_mode: DeleteMode) -> Self {
        Self {
            books_added: 0,
            books_skipped: 0,
            books_deleted: 0,
            books_in_archives: 0,
            books_failed: 0,
            archives_scanned: 0,
            archives_skipped: 0,
            bad_archives: 0,
            duplicates_resolved: 0,
            delete_mode,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Elapsed time, measured up to now while the run is still going.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }

    /// Human readable summary, one line per counter.
    pub fn summary(&self) -> Vec<String> {
        let deleted_label = match self.delete_mode {
            DeleteMode::Logical => "Books deleted    ",
            DeleteMode::Physical => "Book rows deleted",
        };
        vec![
            format!("Books added      : {}", self.books_added),
            format!("Books skipped    : {}", self.books_skipped),
            format!("{deleted_label}: {}", self.books_deleted),
            format!("Books in archives: {}", self.books_in_archives),
            format!("Books failed     : {}", self.books_failed),
            format!("Archives scanned : {}", self.archives_scanned),
            format!("Archives skipped : {}", self.archives_skipped),
            format!("Bad archives     : {}", self.bad_archives),
            format!("Duplicates fixed : {}", self.duplicates_resolved),
            format!("Time elapsed     : {}", format_elapsed(self.elapsed())),
        ]
    }

    pub fn log_summary(&self) {
        for line in self.summary() {
            info!("{line}");
        }
    }
}

/// Format a duration as "H hours, M minutes, S seconds".
pub fn format_elapsed(elapsed: chrono::Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;
    format!("{hours} hours, {minutes} minutes, {seconds} seconds")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_is_zeroed() {
        let stats = ScanStats::start(DeleteMode::Logical);
        assert_eq!(stats.books_added, 0);
        assert_eq!(stats.bad_archives, 0);
        assert!(stats.finished_at.is_none());
    }

    #[test]
    fn test_finish_sets_timestamp() {
        let mut stats = ScanStats::start(DeleteMode::Logical);
        stats.finish();
        let finished = stats.finished_at.unwrap();
        assert!(finished >= stats.started_at);
        assert!(stats.elapsed() >= chrono::Duration::zero());
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(
            format_elapsed(chrono::Duration::seconds(3 * 3600 + 25 * 60 + 7)),
            "3 hours, 25 minutes, 7 seconds"
        );
        assert_eq!(format_elapsed(chrono::Duration::seconds(59)), "0 hours, 0 minutes, 59 seconds");
        assert_eq!(format_elapsed(chrono::Duration::milliseconds(-5)), "0 hours, 0 minutes, 0 seconds");
    }

    #[test]
    fn test_summary_label_follows_delete_mode() {
        let mut stats = ScanStats::start(DeleteMode::Physical);
        stats.books_deleted = 4;
        let summary = stats.summary();
        assert!(summary.iter().any(|l| l == "Book rows deleted: 4"));

        stats.delete_mode = DeleteMode::Logical;
        let summary = stats.summary();
        assert!(summary.iter().any(|l| l == "Books deleted    : 4"));
    }
}
