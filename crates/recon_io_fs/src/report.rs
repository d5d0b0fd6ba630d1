//! Archive report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::spec::{EnumMoveKind, SpecArchiveError};

/// Aggregate counters and diagnostics for one `archive_files` run.
#[derive(Debug, Default, Clone)]
pub struct ReportArchive {
    /// Number of files handed to the archive step.
    pub cnt_requested: u64,
    /// Files committed by same-filesystem rename.
    pub cnt_moved: u64,
    /// Files committed by the copy + remove fallback.
    pub cnt_copied: u64,
    /// Files archived under a suffixed name.
    pub cnt_renamed: u64,
    /// Files left in place (conflict skip or dry-run).
    pub cnt_skipped: u64,
    /// Final archive locations, in request order.
    pub paths_archived: Vec<PathBuf>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
    /// Per-file failures.
    pub errors: Vec<SpecArchiveError>,
}

impl ReportArchive {
    /// Number of collected hard errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Files that actually left the inbox.
    pub fn archived_count(&self) -> u64 {
        self.cnt_moved + self.cnt_copied
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_requested".to_string(), self.cnt_requested);
        dict_counts.insert("cnt_moved".to_string(), self.cnt_moved);
        dict_counts.insert("cnt_copied".to_string(), self.cnt_copied);
        dict_counts.insert("cnt_renamed".to_string(), self.cnt_renamed);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_errors".to_string(), self.error_count() as u64);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} requested={} moved={} copied={} renamed={} skipped={} errors={} warnings={}",
            self.cnt_requested,
            self.cnt_moved,
            self.cnt_copied,
            self.cnt_renamed,
            self.cnt_skipped,
            self.error_count(),
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[ARCHIVE]"))
    }
}

/// Mutable accumulator for archive statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportArchiveBuilder {
    report: ReportArchive,
}

impl ReportArchiveBuilder {
    /// Count files entering the archive step.
    pub fn add_requested(&mut self, value: u64) {
        self.report.cnt_requested += value;
    }

    /// Record one committed move.
    pub fn add_archived(&mut self, path_dst: PathBuf, kind: EnumMoveKind) {
        match kind {
            EnumMoveKind::Renamed => self.report.cnt_moved += 1,
            EnumMoveKind::Copied => self.report.cnt_copied += 1,
        }
        self.report.paths_archived.push(path_dst);
    }

    /// Record that the destination name was suffixed to dodge a conflict.
    pub fn add_renamed(&mut self) {
        self.report.cnt_renamed += 1;
    }

    /// Increment skipped count by one.
    pub fn add_skipped(&mut self) {
        self.report.cnt_skipped += 1;
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        self.report.warnings.push(warning);
    }

    /// Add one path-scoped error.
    pub fn add_error(&mut self, path: PathBuf, exception: String) {
        self.report
            .errors
            .push(SpecArchiveError { path, exception });
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportArchive {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::ReportArchiveBuilder;
    use crate::spec::EnumMoveKind;

    #[test]
    fn report_archive_counts_and_format() {
        let mut builder = ReportArchiveBuilder::default();
        builder.add_requested(4);
        builder.add_archived(PathBuf::from("/p/a.csv"), EnumMoveKind::Renamed);
        builder.add_archived(PathBuf::from("/p/b_2.json"), EnumMoveKind::Copied);
        builder.add_renamed();
        builder.add_skipped();
        builder.add_error(PathBuf::from("/in/c.csv"), "boom".to_string());
        builder.add_warning("w".to_string());
        let report = builder.build();

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_requested"], 4);
        assert_eq!(dict_counts["cnt_moved"], 1);
        assert_eq!(dict_counts["cnt_copied"], 1);
        assert_eq!(dict_counts["cnt_renamed"], 1);
        assert_eq!(dict_counts["cnt_skipped"], 1);
        assert_eq!(dict_counts["cnt_errors"], 1);
        assert_eq!(report.archived_count(), 2);
        assert_eq!(
            report.to_string(),
            "[ARCHIVE] requested=4 moved=1 copied=1 renamed=1 skipped=1 errors=1 warnings=1"
        );
    }
}
