//! Run reports and the reconciliation workbook.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use polars::prelude::{Column, DataFrame};
use recon_io_xlsx::{
    EnumChartKind, SpecCellRange, SpecChartSeries, SpecXlsxChart, SpecXlsxReport,
    SpecXlsxSheetWriteOptions, SpecXlsxWriteOptions, XlsxWriter, derive_default_xlsx_formats,
};
use tracing::{debug, warn};

use crate::conf::TUP_REPORT_COLUMNS;
use crate::pivot::SpecDelayPivot;
use crate::spec::{ReconError, SpecReportOptions};
use crate::timing::{SpecDurationMaxima, format_minutes_seconds};

////////////////////////////////////////////////////////////////////////////////
// #region IngestReport

/// Counters for one feed file (or several, after [`ReportIngest::merge`]).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportIngest {
    /// Data rows/objects seen.
    pub cnt_read: u64,
    /// Records returned to the caller.
    pub cnt_kept: u64,
    /// Rows rejected as malformed.
    pub cnt_skipped: u64,
    /// Row-level warnings.
    pub warnings: Vec<String>,
}

impl ReportIngest {
    pub(crate) fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Fold another file's counters into this one.
    pub fn merge(&mut self, other: ReportIngest) {
        self.cnt_read += other.cnt_read;
        self.cnt_kept += other.cnt_kept;
        self.cnt_skipped += other.cnt_skipped;
        self.warnings.extend(other.warnings);
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReconReport

/// Summary of one reconciliation run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportRecon {
    pub cnt_files_ledger: u64,
    pub cnt_files_events: u64,
    /// Ledger rows that made it into the ledger frame.
    pub cnt_rows_posted: u64,
    /// Malformed ledger rows skipped.
    pub cnt_rows_skipped: u64,
    pub cnt_events_read: u64,
    /// Events entering the join (after collapse and filter).
    pub cnt_events_kept: u64,
    /// Events removed by the status filter or malformed.
    pub cnt_events_dropped: u64,
    pub cnt_matched: u64,
    pub cnt_unmatched: u64,
    pub cnt_rows_merged: u64,
    pub maxima: SpecDurationMaxima,
    pub warnings: Vec<String>,
}

impl ReportRecon {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_files_ledger".to_string(), self.cnt_files_ledger);
        dict_counts.insert("cnt_files_events".to_string(), self.cnt_files_events);
        dict_counts.insert("cnt_rows_posted".to_string(), self.cnt_rows_posted);
        dict_counts.insert("cnt_rows_skipped".to_string(), self.cnt_rows_skipped);
        dict_counts.insert("cnt_events_read".to_string(), self.cnt_events_read);
        dict_counts.insert("cnt_events_kept".to_string(), self.cnt_events_kept);
        dict_counts.insert("cnt_events_dropped".to_string(), self.cnt_events_dropped);
        dict_counts.insert("cnt_matched".to_string(), self.cnt_matched);
        dict_counts.insert("cnt_unmatched".to_string(), self.cnt_unmatched);
        dict_counts.insert("cnt_rows_merged".to_string(), self.cnt_rows_merged);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} posted={} matched={} unmatched={} merged={} skipped={} events_kept={} \
             events_dropped={} warnings={}",
            self.cnt_rows_posted,
            self.cnt_matched,
            self.cnt_unmatched,
            self.cnt_rows_merged,
            self.cnt_rows_skipped,
            self.cnt_events_kept,
            self.cnt_events_dropped,
            self.warning_count()
        )
    }

    /// Metric/value rows for the summary sheet and the CLI table.
    pub fn to_summary_rows(&self) -> Vec<(String, String)> {
        let mut l_rows: Vec<(String, String)> = vec![
            ("Ledger files", self.cnt_files_ledger.to_string()),
            ("Event files", self.cnt_files_events.to_string()),
            ("Posted rows", self.cnt_rows_posted.to_string()),
            ("Skipped ledger rows", self.cnt_rows_skipped.to_string()),
            ("Events read", self.cnt_events_read.to_string()),
            ("Events kept", self.cnt_events_kept.to_string()),
            ("Events dropped", self.cnt_events_dropped.to_string()),
            ("Matched rows", self.cnt_matched.to_string()),
            ("Unmatched rows", self.cnt_unmatched.to_string()),
            ("Merged rows", self.cnt_rows_merged.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        for (c_label, n_max) in [
            ("Max entry time", self.maxima.entry_ms),
            ("Max commit time", self.maxima.commit_ms),
            ("Max total elapsed", self.maxima.total_ms),
        ] {
            let c_value = n_max.map(format_minutes_seconds).unwrap_or_default();
            l_rows.push((c_label.to_string(), c_value));
        }
        l_rows.push(("Warnings".to_string(), self.warning_count().to_string()));
        l_rows
    }
}

impl fmt::Display for ReportRecon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[RECON]"))
    }
}

/// Mutable accumulator for reconciliation statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportReconBuilder {
    report: ReportRecon,
}

impl ReportReconBuilder {
    /// Fold one ledger file's ingest counters.
    pub fn add_ledger_ingest(&mut self, report_ingest: ReportIngest) {
        self.report.cnt_files_ledger += 1;
        self.report.cnt_rows_posted += report_ingest.cnt_kept;
        self.report.cnt_rows_skipped += report_ingest.cnt_skipped;
        self.report.warnings.extend(report_ingest.warnings);
    }

    /// Fold one event file's ingest counters.
    pub fn add_event_ingest(&mut self, report_ingest: ReportIngest) {
        self.report.cnt_files_events += 1;
        self.report.cnt_events_read += report_ingest.cnt_read;
        self.report.cnt_events_dropped += report_ingest.cnt_skipped;
        self.report.warnings.extend(report_ingest.warnings);
    }

    /// Collapsed events removed by the status filter.
    pub fn add_events_filtered(&mut self, value: u64) {
        self.report.cnt_events_dropped += value;
    }

    /// Events handed to the join after collapsing and filtering.
    pub fn set_events_kept(&mut self, value: u64) {
        self.report.cnt_events_kept = value;
    }

    /// Record join outcome counts.
    pub fn set_join_counts(&mut self, cnt_rows_merged: u64, cnt_matched: u64) {
        self.report.cnt_rows_merged = cnt_rows_merged;
        self.report.cnt_matched = cnt_matched;
        self.report.cnt_unmatched = cnt_rows_merged.saturating_sub(cnt_matched);
    }

    pub fn set_maxima(&mut self, maxima: SpecDurationMaxima) {
        self.report.maxima = maxima;
    }

    pub fn add_warning(&mut self, warning: String) {
        self.report.warnings.push(warning);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportRecon {
        self.report
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Workbook

/// Display frame: the merged frame's report columns under human headers.
///
/// Columns absent from `df_merged` are skipped.
pub fn derive_report_frame(df_merged: &DataFrame) -> Result<DataFrame, ReconError> {
    let l_cols: Vec<Column> = TUP_REPORT_COLUMNS
        .iter()
        .filter_map(|(c_src, c_header)| {
            df_merged
                .column(c_src)
                .ok()
                .map(|col| col.clone().with_name((*c_header).into()))
        })
        .collect();
    Ok(DataFrame::new(l_cols)?)
}

fn derive_summary_frame(report: &ReportRecon) -> Result<DataFrame, ReconError> {
    let (l_metrics, l_values): (Vec<String>, Vec<String>) =
        report.to_summary_rows().into_iter().unzip();
    Ok(DataFrame::new(vec![
        Column::new("Metric".into(), l_metrics),
        Column::new("Value".into(), l_values),
    ])?)
}

/// Column chart of counts per delay bucket, one series per transaction code.
///
/// `None` when the pivot has no buckets or no codes.
fn plan_pivot_chart(pivot: &SpecDelayPivot, sheet_name: &str) -> Option<SpecXlsxChart> {
    let n_codes = pivot.row_labels.len();
    let n_buckets = pivot.col_labels.len();
    if n_codes == 0 || n_buckets == 0 {
        return None;
    }

    let series = (1..=n_codes)
        .map(|n_row| SpecChartSeries {
            cell_name: (n_row, 0),
            values: SpecCellRange {
                row_first: n_row,
                col_first: 1,
                row_last: n_row,
                col_last: n_buckets,
            },
        })
        .collect();

    Some(SpecXlsxChart {
        sheet_name: sheet_name.to_string(),
        kind: EnumChartKind::Column,
        title: "Transactions by delay".to_string(),
        name_x_axis: "Delay (minutes)".to_string(),
        name_y_axis: "Count".to_string(),
        categories: SpecCellRange {
            row_first: 0,
            col_first: 1,
            row_last: 0,
            col_last: n_buckets,
        },
        series,
        // Below the pivot: header + body + grand-total row + one spacer.
        cell_anchor: (n_codes + 3, 0),
    })
}

/// Write the reconciliation, pivot and summary sheets to `path_out`.
pub fn write_recon_workbook<P: AsRef<Path>>(
    path_out: P,
    df_merged: &DataFrame,
    pivot: &SpecDelayPivot,
    report: &ReportRecon,
    options: &SpecReportOptions,
) -> Result<Vec<SpecXlsxReport>, ReconError> {
    let path_out = path_out.as_ref();
    if let Some(path_parent) = path_out.parent()
        && !path_parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(path_parent)?;
    }

    let mut writer = XlsxWriter::new(
        path_out,
        derive_default_xlsx_formats(),
        SpecXlsxWriteOptions {
            keep_missing_values: options.keep_missing_values,
            ..SpecXlsxWriteOptions::default()
        },
    );

    let df_report = derive_report_frame(df_merged)?;
    writer.write_sheet_from_dataframe(
        &df_report,
        &options.sheet_recon,
        &SpecXlsxSheetWriteOptions {
            if_freeze_header: true,
            ..SpecXlsxSheetWriteOptions::default()
        },
    )?;

    let df_pivot = pivot.to_dataframe()?;
    let report_pivot = writer.write_sheet_from_dataframe(
        &df_pivot,
        &options.sheet_pivot,
        &SpecXlsxSheetWriteOptions {
            if_freeze_header: true,
            col_freeze: 1,
            ..SpecXlsxSheetWriteOptions::default()
        },
    )?;
    if options.if_chart
        && let Some(spec_slice) = report_pivot.sheets.first()
        && let Some(spec_chart) = plan_pivot_chart(pivot, &spec_slice.sheet_name)
    {
        writer.insert_column_chart(&spec_chart)?;
    }

    let df_summary = derive_summary_frame(report)?;
    writer.write_sheet_from_dataframe(
        &df_summary,
        &options.sheet_summary,
        &SpecXlsxSheetWriteOptions::default(),
    )?;

    writer.close()?;
    let l_reports = writer.report();
    for c_warning in l_reports.iter().flat_map(|r| &r.warnings) {
        warn!(path = %path_out.display(), "{c_warning}");
    }
    debug!(path = %path_out.display(), "workbook saved");
    Ok(l_reports)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
