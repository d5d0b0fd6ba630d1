//! Ledger and event feed readers, event collapsing and frame builders.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::{Column, DataFrame, PolarsResult};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use tracing::{debug, warn};

use crate::conf::{
    C_COL_ACCOUNT_NUMBER, C_COL_ACTIVITY_MS, C_COL_ACTIVITY_TS, C_COL_AMOUNT, C_COL_AMOUNT_CENTS,
    C_COL_COMMITTED_MS, C_COL_COMMITTED_TS, C_COL_ENTERED_MS, C_COL_ENTERED_TS,
    C_COL_EVENT_ACCOUNT_ID, C_COL_EVENT_AMOUNT_CENTS, C_COL_EVENT_POST_DATE, C_COL_EVENT_STATUS,
    C_COL_EVENT_TYPE, C_COL_POST_DATE, C_COL_RECEIVED_MS, C_COL_RECEIVED_TS,
    C_COL_REFERENCE_NUMBER, C_COL_SOURCE_FILE, C_COL_TRACE_NUMBER, C_COL_TRANSACTION_CODE,
};
use crate::report::ReportIngest;
use crate::spec::{
    ReconError, SpecEventFeedOptions, SpecEventRecord, SpecLedgerFeedOptions, SpecLedgerRecord,
};
use crate::util::{
    derive_amount_cents, derive_json_text, derive_json_timestamp, format_timestamp,
    lookup_json_path, normalize_header, parse_amount, parse_post_date, parse_timestamp,
};

const C_POST_DATE_FORMAT: &str = "%Y-%m-%d";

fn derive_source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

////////////////////////////////////////////////////////////////////////////////
// #region LedgerFeed

/// Header positions resolved once per file.
struct LedgerLayout {
    idx_account: usize,
    idx_amount: usize,
    idx_post_date: usize,
    idx_reference: usize,
    idx_activity: Option<usize>,
    idx_code: Option<usize>,
    idx_debit_credit: Option<usize>,
}

impl LedgerLayout {
    fn resolve(
        headers: &csv::StringRecord,
        options: &SpecLedgerFeedOptions,
        source_name: &str,
        report: &mut ReportIngest,
    ) -> Result<Self, ReconError> {
        let dict_headers: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(n_idx, name)| (normalize_header(name), n_idx))
            .collect();
        let locate = |name: &str| dict_headers.get(&normalize_header(name)).copied();
        let require = |name: &str| {
            locate(name).ok_or_else(|| ReconError::MissingColumn {
                source_name: source_name.to_string(),
                column: name.to_string(),
            })
        };

        let cols = &options.columns;
        let idx_debit_credit = match cols.debit_credit.as_deref() {
            Some(name) => Some(require(name)?),
            None => None,
        };
        let layout = Self {
            idx_account: require(&cols.account_number)?,
            idx_amount: require(&cols.amount)?,
            idx_post_date: require(&cols.post_date)?,
            idx_reference: require(&cols.reference_number)?,
            idx_activity: locate(&cols.activity_ts),
            idx_code: locate(&cols.transaction_code),
            idx_debit_credit,
        };

        for (idx, name) in [
            (layout.idx_activity, &cols.activity_ts),
            (layout.idx_code, &cols.transaction_code),
        ] {
            if idx.is_none() {
                let msg = format!("{source_name}: optional column {name:?} not found");
                warn!("{msg}");
                report.warn(msg);
            }
        }
        Ok(layout)
    }
}

fn derive_field(record: &csv::StringRecord, idx: usize) -> &str {
    record.get(idx).map(str::trim).unwrap_or("")
}

fn parse_ledger_row(
    record: &csv::StringRecord,
    layout: &LedgerLayout,
    options: &SpecLedgerFeedOptions,
    source_name: &str,
) -> Result<(SpecLedgerRecord, Option<String>), String> {
    let c_account = derive_field(record, layout.idx_account);
    let c_amount = derive_field(record, layout.idx_amount);
    let c_post_date = derive_field(record, layout.idx_post_date);
    let c_reference = derive_field(record, layout.idx_reference);
    for (c_value, c_name) in [
        (c_account, "account number"),
        (c_amount, "amount"),
        (c_post_date, "post date"),
        (c_reference, "reference number"),
    ] {
        if c_value.is_empty() {
            return Err(format!("missing {c_name}"));
        }
    }

    let mut amount = parse_amount(c_amount).ok_or_else(|| format!("invalid amount {c_amount:?}"))?;
    if let Some(idx) = layout.idx_debit_credit {
        let c_indicator = derive_field(record, idx);
        let if_debit = options
            .debit_indicators
            .iter()
            .any(|v| v.trim().eq_ignore_ascii_case(c_indicator));
        amount = if if_debit { -amount.abs() } else { amount.abs() };
    }
    let post_date =
        parse_post_date(c_post_date).ok_or_else(|| format!("invalid post date {c_post_date:?}"))?;

    let mut warning = None;
    let activity_at = match layout.idx_activity.map(|idx| derive_field(record, idx)) {
        Some(c_ts) if !c_ts.is_empty() => {
            let ts = parse_timestamp(c_ts);
            if ts.is_none() {
                warning = Some(format!("unparsable activity timestamp {c_ts:?}"));
            }
            ts
        }
        _ => None,
    };

    let record = SpecLedgerRecord {
        account_number: c_account.to_string(),
        amount,
        post_date,
        activity_at,
        transaction_code: layout
            .idx_code
            .map(|idx| derive_field(record, idx).to_string())
            .unwrap_or_default(),
        reference_number: c_reference.to_string(),
        source_file: source_name.to_string(),
    };
    Ok((record, warning))
}

/// Read one delimited ledger export.
///
/// Bad rows are skipped with a warning unless `options.if_strict`, in which
/// case the first one fails the read.
pub fn read_ledger_feed<P: AsRef<Path>>(
    path: P,
    options: &SpecLedgerFeedOptions,
) -> Result<(Vec<SpecLedgerRecord>, ReportIngest), ReconError> {
    let path = path.as_ref();
    let source_name = derive_source_name(path);
    let mut report = ReportIngest::default();

    let n_delimiter = u8::try_from(options.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| {
            ReconError::InvalidConfig(format!(
                "ledger.delimiter must be a single ASCII character, got {:?}",
                options.delimiter
            ))
        })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(n_delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let layout = LedgerLayout::resolve(&headers, options, &source_name, &mut report)?;

    let mut l_records = Vec::new();
    for (n_idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let n_line_default = n_idx as u64 + 2;
        let parsed = match result {
            Ok(record) => {
                let n_line = record.position().map_or(n_line_default, |p| p.line());
                if record.iter().all(|v| v.trim().is_empty()) {
                    continue;
                }
                parse_ledger_row(&record, &layout, options, &source_name)
                    .map(|parsed| (n_line, parsed))
                    .map_err(|msg| (n_line, msg))
            }
            Err(err) => Err((
                err.position().map_or(n_line_default, |p| p.line()),
                err.to_string(),
            )),
        };

        report.cnt_read += 1;
        match parsed {
            Ok((n_line, (record, warning))) => {
                if let Some(msg) = warning {
                    let msg = format!("{source_name} line {n_line}: {msg}");
                    warn!("{msg}");
                    report.warn(msg);
                }
                l_records.push(record);
                report.cnt_kept += 1;
            }
            Err((n_line, message)) => {
                if options.if_strict {
                    return Err(ReconError::InvalidRow {
                        path: path.to_path_buf(),
                        line: n_line,
                        message,
                    });
                }
                let msg = format!("{source_name} line {n_line}: {message}, row skipped");
                warn!("{msg}");
                report.warn(msg);
                report.cnt_skipped += 1;
            }
        }
    }

    debug!(
        file = %source_name,
        read = report.cnt_read,
        kept = report.cnt_kept,
        skipped = report.cnt_skipped,
        "ledger feed read"
    );
    Ok((l_records, report))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region EventFeed

/// Split a feed document into its JSON values with their 1-based positions.
///
/// A document that parses whole is an array of events or a single event;
/// anything else is read as newline-delimited JSON.
fn split_event_document(
    raw: &str,
    path: &Path,
    if_strict: bool,
    report: &mut ReportIngest,
) -> Result<Vec<(u64, Value)>, ReconError> {
    let c_trimmed = raw.trim_start_matches('\u{feff}').trim();
    if c_trimmed.is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(c_trimmed) {
        Ok(Value::Array(l_values)) => {
            return Ok((1u64..).zip(l_values).collect());
        }
        Ok(value @ Value::Object(_)) => return Ok(vec![(1, value)]),
        Ok(_) => {}
        Err(source) if c_trimmed.starts_with('[') => {
            return Err(ReconError::Json {
                path: path.to_path_buf(),
                source,
            });
        }
        Err(_) => {}
    }

    let mut l_values = Vec::new();
    for (n_idx, c_line) in raw.lines().enumerate() {
        let c_line = c_line.trim().trim_start_matches('\u{feff}');
        if c_line.is_empty() {
            continue;
        }
        let n_line = n_idx as u64 + 1;
        match serde_json::from_str::<Value>(c_line) {
            Ok(value) => l_values.push((n_line, value)),
            Err(source) if if_strict => {
                return Err(ReconError::Json {
                    path: path.to_path_buf(),
                    source,
                });
            }
            Err(err) => {
                report.cnt_read += 1;
                report.cnt_skipped += 1;
                let msg = format!("{} line {n_line}: {err}, event skipped", path.display());
                warn!("{msg}");
                report.warn(msg);
            }
        }
    }
    Ok(l_values)
}

fn derive_json_amount(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(n) => {
            let c_value = n.to_string();
            Decimal::from_str(&c_value)
                .or_else(|_| Decimal::from_scientific(&c_value))
                .ok()
        }
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

fn parse_event_object(
    value: &Value,
    options: &SpecEventFeedOptions,
    l_warnings: &mut Vec<String>,
) -> Result<SpecEventRecord, String> {
    if !value.is_object() {
        return Err("event is not a JSON object".to_string());
    }
    let fields = &options.fields;
    let text_of = |name: &str| derive_json_text(lookup_json_path(value, name));
    let required = |name: &str| text_of(name).ok_or_else(|| format!("missing {name}"));

    let account_id = required(&fields.account_id)?;
    let trace_number = required(&fields.trace_number)?;
    let amount = derive_json_amount(lookup_json_path(value, &fields.amount))
        .ok_or_else(|| format!("missing or invalid {}", fields.amount))?;
    let c_post_date = required(&fields.post_date)?;
    let post_date = parse_post_date(&c_post_date)
        .ok_or_else(|| format!("invalid post date {c_post_date:?}"))?;

    let mut timestamp_of = |name: &str| -> Option<DateTime<Utc>> {
        match derive_json_timestamp(lookup_json_path(value, name)) {
            Ok(ts) => ts,
            Err(msg) => {
                l_warnings.push(format!("{name}: {msg}"));
                None
            }
        }
    };
    let received_at = timestamp_of(&fields.received_at);
    let entered_at = timestamp_of(&fields.entered_at);
    let committed_at = timestamp_of(&fields.committed_at);

    Ok(SpecEventRecord {
        account_id,
        amount,
        trace_number,
        post_date,
        status: text_of(&fields.status).unwrap_or_default(),
        event_type: text_of(&fields.event_type).unwrap_or_default(),
        received_at,
        entered_at,
        committed_at,
    })
}

/// Read one JSON event feed (array or newline-delimited).
///
/// Every well-formed event is returned; the status filter runs after
/// collapsing, in [`filter_events_by_status`].
pub fn read_event_feed<P: AsRef<Path>>(
    path: P,
    options: &SpecEventFeedOptions,
) -> Result<(Vec<SpecEventRecord>, ReportIngest), ReconError> {
    let path = path.as_ref();
    let source_name = derive_source_name(path);
    let mut report = ReportIngest::default();

    let raw = fs::read_to_string(path)?;
    let l_values = split_event_document(&raw, path, options.if_strict, &mut report)?;

    let mut l_records = Vec::with_capacity(l_values.len());
    for (n_pos, value) in l_values {
        report.cnt_read += 1;
        let mut l_warnings = Vec::new();
        match parse_event_object(&value, options, &mut l_warnings) {
            Ok(record) => {
                for msg in l_warnings {
                    let msg = format!("{source_name} event {n_pos}: {msg}");
                    warn!("{msg}");
                    report.warn(msg);
                }
                l_records.push(record);
                report.cnt_kept += 1;
            }
            Err(message) => {
                if options.if_strict {
                    return Err(ReconError::InvalidRow {
                        path: path.to_path_buf(),
                        line: n_pos,
                        message,
                    });
                }
                let msg = format!("{source_name} event {n_pos}: {message}, event skipped");
                warn!("{msg}");
                report.warn(msg);
                report.cnt_skipped += 1;
            }
        }
    }

    debug!(
        file = %source_name,
        read = report.cnt_read,
        kept = report.cnt_kept,
        skipped = report.cnt_skipped,
        "event feed read"
    );
    Ok((l_records, report))
}

fn pick_earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}

fn pick_latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    }
}

type TypeEventKey = (String, Option<i64>, String, NaiveDate);

/// Merge events sharing (account, amount in cents, trace number, post date).
///
/// Keeps the earliest received and entered times, the latest committed time,
/// and the status/type of the last event in input order. Output follows the
/// first appearance of each key.
pub fn collapse_events(records: Vec<SpecEventRecord>) -> Vec<SpecEventRecord> {
    let mut dict_pos: HashMap<TypeEventKey, usize> = HashMap::with_capacity(records.len());
    let mut l_out: Vec<SpecEventRecord> = Vec::with_capacity(records.len());
    for record in records {
        let key = (
            record.account_id.clone(),
            derive_amount_cents(record.amount),
            record.trace_number.clone(),
            record.post_date,
        );
        match dict_pos.get(&key) {
            Some(&n_pos) => {
                let merged = &mut l_out[n_pos];
                merged.received_at = pick_earliest(merged.received_at, record.received_at);
                merged.entered_at = pick_earliest(merged.entered_at, record.entered_at);
                merged.committed_at = pick_latest(merged.committed_at, record.committed_at);
                merged.status = record.status;
                merged.event_type = record.event_type;
            }
            None => {
                dict_pos.insert(key, l_out.len());
                l_out.push(record);
            }
        }
    }
    l_out
}

/// Keep events whose status is in `status_keep` (case-insensitive).
///
/// An empty list keeps everything. Returns the kept events and the number
/// dropped.
pub fn filter_events_by_status(
    records: Vec<SpecEventRecord>,
    status_keep: &[String],
) -> (Vec<SpecEventRecord>, u64) {
    if status_keep.is_empty() {
        return (records, 0);
    }
    let l_status_keep: Vec<String> = status_keep
        .iter()
        .map(|s| s.trim().to_ascii_uppercase())
        .collect();
    let n_before = records.len();
    let l_kept: Vec<SpecEventRecord> = records
        .into_iter()
        .filter(|r| l_status_keep.contains(&r.status.trim().to_ascii_uppercase()))
        .collect();
    let n_dropped = (n_before - l_kept.len()) as u64;
    (l_kept, n_dropped)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Frames

fn split_timestamps(
    values: impl Iterator<Item = Option<DateTime<Utc>>>,
) -> (Vec<Option<String>>, Vec<Option<i64>>) {
    values
        .map(|ts| (ts.as_ref().map(format_timestamp), ts.map(|t| t.timestamp_millis())))
        .unzip()
}

/// Ledger records as the canonical ledger frame.
pub fn build_ledger_frame(records: &[SpecLedgerRecord]) -> PolarsResult<DataFrame> {
    let (l_activity_ts, l_activity_ms) = split_timestamps(records.iter().map(|r| r.activity_at));
    DataFrame::new(vec![
        Column::new(
            C_COL_ACCOUNT_NUMBER.into(),
            records.iter().map(|r| r.account_number.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            C_COL_AMOUNT.into(),
            records.iter().map(|r| r.amount.to_f64()).collect::<Vec<_>>(),
        ),
        Column::new(
            C_COL_AMOUNT_CENTS.into(),
            records
                .iter()
                .map(|r| derive_amount_cents(r.amount))
                .collect::<Vec<_>>(),
        ),
        Column::new(
            C_COL_POST_DATE.into(),
            records
                .iter()
                .map(|r| r.post_date.format(C_POST_DATE_FORMAT).to_string())
                .collect::<Vec<_>>(),
        ),
        Column::new(C_COL_ACTIVITY_TS.into(), l_activity_ts),
        Column::new(C_COL_ACTIVITY_MS.into(), l_activity_ms),
        Column::new(
            C_COL_TRANSACTION_CODE.into(),
            records.iter().map(|r| r.transaction_code.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            C_COL_REFERENCE_NUMBER.into(),
            records.iter().map(|r| r.reference_number.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            C_COL_SOURCE_FILE.into(),
            records.iter().map(|r| r.source_file.as_str()).collect::<Vec<_>>(),
        ),
    ])
}

/// Event records as the canonical event frame.
pub fn build_event_frame(records: &[SpecEventRecord]) -> PolarsResult<DataFrame> {
    let (l_received_ts, l_received_ms) = split_timestamps(records.iter().map(|r| r.received_at));
    let (l_entered_ts, l_entered_ms) = split_timestamps(records.iter().map(|r| r.entered_at));
    let (l_committed_ts, l_committed_ms) =
        split_timestamps(records.iter().map(|r| r.committed_at));
    DataFrame::new(vec![
        Column::new(
            C_COL_EVENT_ACCOUNT_ID.into(),
            records.iter().map(|r| r.account_id.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            C_COL_EVENT_AMOUNT_CENTS.into(),
            records
                .iter()
                .map(|r| derive_amount_cents(r.amount))
                .collect::<Vec<_>>(),
        ),
        Column::new(
            C_COL_TRACE_NUMBER.into(),
            records.iter().map(|r| r.trace_number.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            C_COL_EVENT_POST_DATE.into(),
            records
                .iter()
                .map(|r| r.post_date.format(C_POST_DATE_FORMAT).to_string())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            C_COL_EVENT_STATUS.into(),
            records.iter().map(|r| r.status.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            C_COL_EVENT_TYPE.into(),
            records.iter().map(|r| r.event_type.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(C_COL_RECEIVED_TS.into(), l_received_ts),
        Column::new(C_COL_RECEIVED_MS.into(), l_received_ms),
        Column::new(C_COL_ENTERED_TS.into(), l_entered_ts),
        Column::new(C_COL_ENTERED_MS.into(), l_entered_ms),
        Column::new(C_COL_COMMITTED_TS.into(), l_committed_ts),
        Column::new(C_COL_COMMITTED_MS.into(), l_committed_ms),
    ])
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal_macros::dec;

    use super::*;

    static N_TEST_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TestDir {
        path: PathBuf,
    }

    impl TestDir {
        fn new(tag: &str) -> Self {
            let n_id = N_TEST_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "recon_core_ingest_{tag}_{}_{n_id}",
                std::process::id()
            ));
            let _ = fs::remove_dir_all(&path);
            fs::create_dir_all(&path).expect("create test dir");
            Self { path }
        }

        fn write(&self, name: &str, content: &str) -> PathBuf {
            let path = self.path.join(name);
            fs::write(&path, content).expect("write fixture");
            path
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn event(account: &str, trace: &str, status: &str) -> SpecEventRecord {
        SpecEventRecord {
            account_id: account.to_string(),
            amount: dec!(10.00),
            trace_number: trace.to_string(),
            post_date: NaiveDate::from_ymd_opt(2024, 3, 1).expect("date"),
            status: status.to_string(),
            event_type: "CREDIT".to_string(),
            received_at: None,
            entered_at: None,
            committed_at: None,
        }
    }

    #[test]
    fn ledger_reads_and_skips_bad_rows() {
        let dir = TestDir::new("ledger");
        let path = dir.write(
            "ledger.csv",
            "Account_Number, Amount ,Post_Date,Activity_Timestamp,Transaction_Code,Reference_Number\n\
             1001,\"1,234.56\",2024-03-01,2024-03-01 10:00:00.250,ACH,R1\n\
             1002,(12.50),03/01/2024,,WIRE,R2\n\
             1003,abc,2024-03-01,,ACH,R3\n\
             ,5.00,2024-03-01,,ACH,R4\n\
             1005,5.00,2024-03-01,soon,ACH,R5\n\
             \n",
        );
        let (l_records, report) =
            read_ledger_feed(&path, &SpecLedgerFeedOptions::default()).expect("read");

        assert_eq!(l_records.len(), 3);
        assert_eq!(report.cnt_read, 5);
        assert_eq!(report.cnt_kept, 3);
        assert_eq!(report.cnt_skipped, 2);
        assert_eq!(l_records[0].amount, dec!(1234.56));
        assert!(l_records[0].activity_at.is_some());
        assert_eq!(l_records[1].amount, dec!(-12.50));
        assert_eq!(l_records[1].activity_at, None);
        assert_eq!(l_records[1].source_file, "ledger.csv");
        // Unparsable activity keeps the row.
        assert_eq!(l_records[2].reference_number, "R5");
        assert_eq!(l_records[2].activity_at, None);
        assert_eq!(report.warnings.len(), 3);
    }

    #[test]
    fn ledger_strict_fails_on_first_bad_row() {
        let dir = TestDir::new("strict");
        let path = dir.write(
            "ledger.csv",
            "account_number,amount,post_date,reference_number\n1,1.00,2024-03-01,R1\n2,x,2024-03-01,R2\n",
        );
        let options = SpecLedgerFeedOptions {
            if_strict: true,
            ..Default::default()
        };
        let err = read_ledger_feed(&path, &options).expect_err("strict");
        assert!(matches!(err, ReconError::InvalidRow { line: 3, .. }), "{err}");
    }

    #[test]
    fn ledger_missing_header_fails() {
        let dir = TestDir::new("header");
        let path = dir.write("ledger.csv", "account_number,amount,post_date\n1,1.00,2024-03-01\n");
        let err = read_ledger_feed(&path, &SpecLedgerFeedOptions::default()).expect_err("header");
        assert!(
            matches!(&err, ReconError::MissingColumn { column, .. } if column == "reference_number"),
            "{err}"
        );
    }

    #[test]
    fn ledger_pipe_delimited_with_debit_indicator() {
        let dir = TestDir::new("pipe");
        let path = dir.write(
            "ledger.txt",
            "account_number|amount|dr_cr|post_date|reference_number|transaction_code\n\
             1|10.00|DR|20240301|R1|ACH\n\
             2|-3.00|c|20240301|R2|ACH\n",
        );
        let mut options = SpecLedgerFeedOptions {
            delimiter: '|',
            ..Default::default()
        };
        options.columns.debit_credit = Some("DR_CR".to_string());
        let (l_records, report) = read_ledger_feed(&path, &options).expect("read");
        assert_eq!(l_records[0].amount, dec!(-10.00));
        assert_eq!(l_records[1].amount, dec!(3.00));
        // Missing activity column is reported once.
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn events_from_array_with_nested_fields() {
        let dir = TestDir::new("array");
        let path = dir.write(
            "events.json",
            r#"[
  {"account_id": "1001", "amount": 1234.56, "trace_number": "R1", "post_date": "2024-03-01",
   "status": "committed", "event_type": "CREDIT",
   "timing": {"received_at": "2024-03-01T09:59:00Z", "entered_at": 1709287150, "committed_at": "2024-03-01 10:00:00"}},
  {"account_id": "1002", "amount": "-12.50", "trace_number": "R2", "post_date": "2024-03-01", "status": "REJECTED"},
  {"account_id": "1003", "trace_number": "R3", "post_date": "2024-03-01"},
  7
]"#,
        );
        let mut options = SpecEventFeedOptions::default();
        options.fields.received_at = "timing.received_at".to_string();
        options.fields.entered_at = "timing.entered_at".to_string();
        options.fields.committed_at = "timing.committed_at".to_string();

        let (l_records, report) = read_event_feed(&path, &options).expect("read");
        assert_eq!(l_records.len(), 2);
        assert_eq!(report.cnt_read, 4);
        assert_eq!(report.cnt_kept, 2);
        assert_eq!(report.cnt_skipped, 2);
        assert_eq!(l_records[1].status, "REJECTED");
        let record = &l_records[0];
        assert_eq!(record.amount, dec!(1234.56));
        assert!(record.received_at.is_some());
        assert_eq!(
            record.entered_at.map(|t| t.timestamp()),
            Some(1_709_287_150)
        );
        assert!(record.committed_at.is_some());
    }

    #[test]
    fn ledger_rejects_non_ascii_delimiter() {
        let dir = TestDir::new("delim");
        let path = dir.write("ledger.csv", "account_number,amount,post_date,reference_number\n");
        let options = SpecLedgerFeedOptions {
            delimiter: '§',
            ..Default::default()
        };
        let err = read_ledger_feed(&path, &options).expect_err("delimiter");
        assert!(matches!(err, ReconError::InvalidConfig(_)), "{err}");
    }

    #[test]
    fn ledger_compact_activity_value_is_not_an_epoch() {
        let dir = TestDir::new("compact");
        let path = dir.write(
            "ledger.csv",
            "account_number,amount,post_date,activity_timestamp,reference_number\n\
             1,1.00,2024-03-01,20240301,R1\n",
        );
        let (l_records, report) =
            read_ledger_feed(&path, &SpecLedgerFeedOptions::default()).expect("read");
        assert_eq!(l_records.len(), 1);
        assert_eq!(l_records[0].activity_at, None);
        assert!(
            report.warnings.iter().any(|w| w.contains("\"20240301\"")),
            "{:?}",
            report.warnings
        );
    }

    #[test]
    fn events_from_ndjson_skip_bad_lines() {
        let dir = TestDir::new("ndjson");
        let path = dir.write(
            "events.jsonl",
            "{\"account_id\":\"1\",\"amount\":1,\"trace_number\":\"T1\",\"post_date\":\"2024-03-01\"}\n\
             \n\
             {not json}\n\
             {\"account_id\":\"2\",\"amount\":2,\"trace_number\":\"T2\",\"post_date\":\"2024-03-01\",\"received_at\":\"never\"}\n",
        );
        let (l_records, report) =
            read_event_feed(&path, &SpecEventFeedOptions::default()).expect("read");
        assert_eq!(l_records.len(), 2);
        assert_eq!(report.cnt_read, 3);
        assert_eq!(report.cnt_skipped, 1);
        assert_eq!(l_records[1].received_at, None);
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn events_invalid_array_is_an_error() {
        let dir = TestDir::new("badarray");
        let path = dir.write("events.json", "[{\"account_id\": 1,]");
        let err = read_event_feed(&path, &SpecEventFeedOptions::default()).expect_err("json");
        assert!(matches!(err, ReconError::Json { .. }), "{err}");
    }

    #[test]
    fn collapse_merges_by_key() {
        let ts = |s: &str| parse_timestamp(s);
        let mut e1 = event("1", "T1", "RECEIVED");
        e1.received_at = ts("2024-03-01 10:00:05");
        e1.committed_at = ts("2024-03-01 10:00:30");
        let mut e2 = event("1", "T1", "COMMITTED");
        e2.received_at = ts("2024-03-01 10:00:01");
        e2.entered_at = ts("2024-03-01 10:00:10");
        e2.committed_at = ts("2024-03-01 10:00:20");
        let e3 = event("2", "T1", "RECEIVED");

        let l_out = collapse_events(vec![e1, e3, e2]);
        assert_eq!(l_out.len(), 2);
        assert_eq!(l_out[0].account_id, "1");
        assert_eq!(l_out[0].status, "COMMITTED");
        assert_eq!(l_out[0].received_at, ts("2024-03-01 10:00:01"));
        assert_eq!(l_out[0].entered_at, ts("2024-03-01 10:00:10"));
        assert_eq!(l_out[0].committed_at, ts("2024-03-01 10:00:30"));
        assert_eq!(l_out[1].account_id, "2");
    }

    #[test]
    fn status_filter_after_collapse_keeps_lifecycle_times() {
        let ts = |s: &str| parse_timestamp(s);
        let mut e_received = event("1", "T1", "RECEIVED");
        e_received.received_at = ts("2024-03-01 10:00:00");
        let mut e_committed = event("1", "T1", "committed");
        e_committed.entered_at = ts("2024-03-01 10:00:02");
        e_committed.committed_at = ts("2024-03-01 10:00:03");
        let e_rejected = event("2", "T2", "REJECTED");

        let l_collapsed = collapse_events(vec![e_received, e_committed, e_rejected]);
        let (l_kept, n_dropped) =
            filter_events_by_status(l_collapsed, &[" COMMITTED ".to_string()]);
        assert_eq!(n_dropped, 1);
        assert_eq!(l_kept.len(), 1);
        assert_eq!(l_kept[0].received_at, ts("2024-03-01 10:00:00"));
        assert_eq!(l_kept[0].entered_at, ts("2024-03-01 10:00:02"));

        let (l_all, n_none) = filter_events_by_status(l_kept.clone(), &[]);
        assert_eq!((l_all.len(), n_none), (1, 0));
    }

    #[test]
    fn frames_have_canonical_columns() {
        let df_events = build_event_frame(&[event("1", "T1", "OK")]).expect("events");
        assert_eq!(df_events.width(), 12);
        let ca_cents = df_events.column(C_COL_EVENT_AMOUNT_CENTS).unwrap().i64().unwrap();
        assert_eq!(ca_cents.get(0), Some(1_000));

        let df_empty = build_ledger_frame(&[]).expect("ledger");
        assert_eq!(df_empty.height(), 0);
        assert_eq!(df_empty.width(), 9);
        assert!(df_empty.column(C_COL_ACTIVITY_MS).unwrap().i64().is_ok());
    }
}
