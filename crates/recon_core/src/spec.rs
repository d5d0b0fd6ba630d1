//! Configuration models, feed records and top-level error types.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::PolarsError;
use recon_io_fs::{EnumArchiveConflictStrategy, FsError};
use recon_io_xlsx::XlsxWriteError;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::conf::{default_debit_indicators, default_event_patterns, default_ledger_patterns};

////////////////////////////////////////////////////////////////////////////////
// #region FeedLayout

/// Header names of the ledger export. Matched case-insensitively after trim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecLedgerColumns {
    pub account_number: String,
    pub amount: String,
    pub post_date: String,
    pub activity_ts: String,
    pub transaction_code: String,
    pub reference_number: String,
    /// Optional debit/credit indicator column. When set, the amount is read as
    /// an absolute value and negated for debit indicators.
    pub debit_credit: Option<String>,
}

impl Default for SpecLedgerColumns {
    fn default() -> Self {
        Self {
            account_number: "account_number".to_string(),
            amount: "amount".to_string(),
            post_date: "post_date".to_string(),
            activity_ts: "activity_timestamp".to_string(),
            transaction_code: "transaction_code".to_string(),
            reference_number: "reference_number".to_string(),
            debit_credit: None,
        }
    }
}

/// Field names in event objects. Dotted names walk nested objects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecEventFields {
    pub account_id: String,
    pub amount: String,
    pub trace_number: String,
    pub post_date: String,
    pub status: String,
    pub event_type: String,
    pub received_at: String,
    pub entered_at: String,
    pub committed_at: String,
}

impl Default for SpecEventFields {
    fn default() -> Self {
        Self {
            account_id: "account_id".to_string(),
            amount: "amount".to_string(),
            trace_number: "trace_number".to_string(),
            post_date: "post_date".to_string(),
            status: "status".to_string(),
            event_type: "event_type".to_string(),
            received_at: "received_at".to_string(),
            entered_at: "entered_at".to_string(),
            committed_at: "committed_at".to_string(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ConfigSections

/// `[paths]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecPathsConfig {
    pub dir_inbox: PathBuf,
    pub dir_processed: PathBuf,
    pub dir_output: PathBuf,
}

impl Default for SpecPathsConfig {
    fn default() -> Self {
        Self {
            dir_inbox: PathBuf::from("inbox"),
            dir_processed: PathBuf::from("processed"),
            dir_output: PathBuf::from("output"),
        }
    }
}

/// `[ledger]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecLedgerFeedOptions {
    /// Basename globs selecting ledger files in the inbox.
    pub patterns_include: Vec<String>,
    /// Single ASCII field delimiter.
    pub delimiter: char,
    pub columns: SpecLedgerColumns,
    /// Indicator values (case-insensitive) that mark a debit.
    pub debit_indicators: Vec<String>,
    /// Fail on the first bad row instead of skipping it.
    pub if_strict: bool,
}

impl Default for SpecLedgerFeedOptions {
    fn default() -> Self {
        Self {
            patterns_include: default_ledger_patterns(),
            delimiter: ',',
            columns: SpecLedgerColumns::default(),
            debit_indicators: default_debit_indicators(),
            if_strict: false,
        }
    }
}

/// `[events]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecEventFeedOptions {
    /// Basename globs selecting event files in the inbox.
    pub patterns_include: Vec<String>,
    pub fields: SpecEventFields,
    /// Statuses kept after collapsing (case-insensitive). Empty keeps everything.
    pub status_keep: Vec<String>,
    /// Merge events sharing one composite key.
    pub if_collapse: bool,
    /// Fail on the first bad event instead of skipping it.
    pub if_strict: bool,
}

impl Default for SpecEventFeedOptions {
    fn default() -> Self {
        Self {
            patterns_include: default_event_patterns(),
            fields: SpecEventFields::default(),
            status_keep: Vec::new(),
            if_collapse: true,
            if_strict: false,
        }
    }
}

/// `[report]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecReportOptions {
    /// File name prefix; a `_{YYYYMMDD_HHMMSS}.xlsx` stamp is appended.
    pub report_prefix: String,
    pub sheet_recon: String,
    pub sheet_pivot: String,
    pub sheet_summary: String,
    /// Render missing cells as `NA` instead of blank.
    pub keep_missing_values: bool,
    pub if_chart: bool,
}

impl Default for SpecReportOptions {
    fn default() -> Self {
        Self {
            report_prefix: "recon_report".to_string(),
            sheet_recon: "Reconciliation".to_string(),
            sheet_pivot: "Pivot".to_string(),
            sheet_summary: "Summary".to_string(),
            keep_missing_values: false,
            if_chart: true,
        }
    }
}

/// `[archive]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecArchiveConfig {
    pub if_enabled: bool,
    pub rule_conflict: EnumArchiveConflictStrategy,
    pub num_workers_max: Option<usize>,
    pub if_dry_run: bool,
}

impl Default for SpecArchiveConfig {
    fn default() -> Self {
        Self {
            if_enabled: true,
            rule_conflict: EnumArchiveConflictStrategy::Rename,
            num_workers_max: None,
            if_dry_run: false,
        }
    }
}

/// Whole job configuration, usually loaded from `recon.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecReconConfig {
    pub paths: SpecPathsConfig,
    pub ledger: SpecLedgerFeedOptions,
    pub events: SpecEventFeedOptions,
    pub report: SpecReportOptions,
    pub archive: SpecArchiveConfig,
}

impl SpecReconConfig {
    /// Parse a TOML document. Missing sections and keys take defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ReconError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ReconError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Reject settings the feed readers cannot honor.
    pub fn validate(&self) -> Result<(), ReconError> {
        if !self.ledger.delimiter.is_ascii() {
            return Err(ReconError::InvalidConfig(format!(
                "ledger.delimiter must be a single ASCII character, got {:?}",
                self.ledger.delimiter
            )));
        }
        if self.report.report_prefix.trim().is_empty() {
            return Err(ReconError::InvalidConfig(
                "report.report_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Records

/// One posted ledger row after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecLedgerRecord {
    pub account_number: String,
    /// Signed amount; debits are negative.
    pub amount: Decimal,
    pub post_date: NaiveDate,
    pub activity_at: Option<DateTime<Utc>>,
    pub transaction_code: String,
    pub reference_number: String,
    pub source_file: String,
}

/// One message event after parsing (or after collapsing several).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecEventRecord {
    pub account_id: String,
    pub amount: Decimal,
    pub trace_number: String,
    pub post_date: NaiveDate,
    pub status: String,
    pub event_type: String,
    pub received_at: Option<DateTime<Utc>>,
    pub entered_at: Option<DateTime<Utc>>,
    pub committed_at: Option<DateTime<Utc>>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Reconciliation job failures.
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("dataframe error: {0}")]
    Polars(#[from] PolarsError),
    #[error("config error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Xlsx(#[from] XlsxWriteError),
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("{source_name}: required column {column:?} not found")]
    MissingColumn { source_name: String, column: String },
    #[error("{} line {line}: {message}", .path.display())]
    InvalidRow {
        path: PathBuf,
        line: u64,
        message: String,
    },
    #[error("no input: {0}")]
    NoInput(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_sections() {
        let config = SpecReconConfig::from_toml_str(
            r#"
[paths]
dir_inbox = "/data/inbox"

[ledger]
delimiter = "|"

[ledger.columns]
debit_credit = "dr_cr"

[events]
status_keep = ["COMMITTED"]

[archive]
rule_conflict = "skip"
"#,
        )
        .expect("parse");

        assert_eq!(config.paths.dir_inbox, PathBuf::from("/data/inbox"));
        assert_eq!(config.paths.dir_processed, PathBuf::from("processed"));
        assert_eq!(config.ledger.delimiter, '|');
        assert_eq!(config.ledger.columns.amount, "amount");
        assert_eq!(config.ledger.columns.debit_credit.as_deref(), Some("dr_cr"));
        assert_eq!(config.events.status_keep, vec!["COMMITTED".to_string()]);
        assert!(config.events.if_collapse);
        assert_eq!(config.archive.rule_conflict, EnumArchiveConflictStrategy::Skip);
        assert!(config.archive.if_enabled);
        assert_eq!(config.report.sheet_pivot, "Pivot");
    }

    #[test]
    fn config_rejects_non_ascii_delimiter() {
        let err = SpecReconConfig::from_toml_str("[ledger]\ndelimiter = \"§\"\n")
            .expect_err("non-ascii");
        assert!(matches!(err, ReconError::InvalidConfig(_)));
    }

    #[test]
    fn empty_config_is_default() {
        let config = SpecReconConfig::from_toml_str("").expect("parse");
        assert_eq!(config, SpecReconConfig::default());
    }
}
