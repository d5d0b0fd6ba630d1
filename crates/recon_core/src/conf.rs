//! Reconciliation constants and default presets.

// Ledger frame columns.
pub const C_COL_ACCOUNT_NUMBER: &str = "account_number";
pub const C_COL_AMOUNT: &str = "amount";
pub const C_COL_AMOUNT_CENTS: &str = "amount_cents";
pub const C_COL_POST_DATE: &str = "post_date";
pub const C_COL_ACTIVITY_TS: &str = "activity_ts";
pub const C_COL_ACTIVITY_MS: &str = "activity_ms";
pub const C_COL_TRANSACTION_CODE: &str = "transaction_code";
pub const C_COL_REFERENCE_NUMBER: &str = "reference_number";
pub const C_COL_SOURCE_FILE: &str = "source_file";

// Event frame columns.
pub const C_COL_EVENT_ACCOUNT_ID: &str = "event_account_id";
pub const C_COL_EVENT_AMOUNT_CENTS: &str = "event_amount_cents";
pub const C_COL_TRACE_NUMBER: &str = "trace_number";
pub const C_COL_EVENT_POST_DATE: &str = "event_post_date";
pub const C_COL_EVENT_STATUS: &str = "event_status";
pub const C_COL_EVENT_TYPE: &str = "event_type";
pub const C_COL_RECEIVED_TS: &str = "received_ts";
pub const C_COL_RECEIVED_MS: &str = "received_ms";
pub const C_COL_ENTERED_TS: &str = "entered_ts";
pub const C_COL_ENTERED_MS: &str = "entered_ms";
pub const C_COL_COMMITTED_TS: &str = "committed_ts";
pub const C_COL_COMMITTED_MS: &str = "committed_ms";

// Columns added by the join and the timing pass.
pub const C_COL_EVENT_MATCHED: &str = "event_matched";
pub const C_COL_ENTRY_TIME: &str = "entry_time";
pub const C_COL_ENTRY_TIME_MS: &str = "entry_time_ms";
pub const C_COL_COMMIT_TIME: &str = "commit_time";
pub const C_COL_COMMIT_TIME_MS: &str = "commit_time_ms";
pub const C_COL_TOTAL_ELAPSED: &str = "total_elapsed";
pub const C_COL_TOTAL_ELAPSED_MS: &str = "total_elapsed_ms";
pub const C_COL_DELAY_MINUTES: &str = "delay_minutes";

/// Ledger columns that must be present before the join.
pub const L_COLS_LEDGER_REQUIRED: [&str; 6] = [
    C_COL_ACCOUNT_NUMBER,
    C_COL_AMOUNT_CENTS,
    C_COL_POST_DATE,
    C_COL_ACTIVITY_MS,
    C_COL_TRANSACTION_CODE,
    C_COL_REFERENCE_NUMBER,
];
/// Event columns that must be present before the join.
pub const L_COLS_EVENT_REQUIRED: [&str; 7] = [
    C_COL_EVENT_ACCOUNT_ID,
    C_COL_EVENT_AMOUNT_CENTS,
    C_COL_TRACE_NUMBER,
    C_COL_EVENT_POST_DATE,
    C_COL_RECEIVED_MS,
    C_COL_ENTERED_MS,
    C_COL_COMMITTED_MS,
];

/// Merged-frame column and the workbook header it is shown under, in order.
pub const TUP_REPORT_COLUMNS: [(&str, &str); 16] = [
    (C_COL_ACCOUNT_NUMBER, "Account Number"),
    (C_COL_AMOUNT, "Amount"),
    (C_COL_POST_DATE, "Post Date"),
    (C_COL_ACTIVITY_TS, "Activity Timestamp"),
    (C_COL_TRANSACTION_CODE, "Transaction Code"),
    (C_COL_REFERENCE_NUMBER, "Reference Number"),
    (C_COL_EVENT_TYPE, "Event Type"),
    (C_COL_EVENT_STATUS, "Event Status"),
    (C_COL_RECEIVED_TS, "Received At"),
    (C_COL_ENTERED_TS, "Entered At"),
    (C_COL_COMMITTED_TS, "Committed At"),
    (C_COL_ENTRY_TIME, "Entry Time"),
    (C_COL_COMMIT_TIME, "Commit Time"),
    (C_COL_TOTAL_ELAPSED, "Total Elapsed"),
    (C_COL_DELAY_MINUTES, "Delay (min)"),
    (C_COL_EVENT_MATCHED, "Matched"),
];

/// Row-order column attached before the join and dropped afterwards.
pub const C_COL_ROW_NR: &str = "__row_nr";
/// Label used for a blank transaction code in the pivot.
pub const C_LABEL_BLANK_CODE: &str = "(blank)";
/// Label of the pivot column counting rows without a delay.
pub const C_LABEL_MISSING_DELAY: &str = "N/A";
/// Label of pivot total row/column.
pub const C_LABEL_GRAND_TOTAL: &str = "Grand Total";

/// Milliseconds per minute, the delay bucket width.
pub const N_MS_PER_MINUTE: i64 = 60_000;
/// Numeric epoch values below this are seconds, otherwise milliseconds.
pub const N_EPOCH_SECONDS_MAX: f64 = 1e11;
/// Integer digits a bare text number needs to be read as an epoch value.
pub const N_EPOCH_TEXT_DIGITS_MIN: usize = 10;

/// Accepted timestamp layouts, tried in order after RFC 3339.
pub const TUP_TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d-%H.%M.%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];
/// Accepted post-date layouts. Two-digit years go before `%Y`, which would
/// otherwise read `24` as year 24.
pub const TUP_DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%Y%m%d", "%d-%b-%Y"];
/// Display layout for normalized timestamps.
pub const C_TIMESTAMP_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
/// Suffix layout for report file names.
pub const C_REPORT_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub(crate) fn default_ledger_patterns() -> Vec<String> {
    vec!["*.csv".to_string(), "*.txt".to_string(), "*.dat".to_string()]
}

pub(crate) fn default_event_patterns() -> Vec<String> {
    vec![
        "*.json".to_string(),
        "*.jsonl".to_string(),
        "*.ndjson".to_string(),
    ]
}

pub(crate) fn default_debit_indicators() -> Vec<String> {
    vec!["D".to_string(), "DR".to_string(), "DEBIT".to_string()]
}
