//! Duration columns, duration display and run maxima.

use polars::prelude::*;

use crate::conf::{
    C_COL_ACTIVITY_MS, C_COL_COMMIT_TIME, C_COL_COMMIT_TIME_MS, C_COL_COMMITTED_MS,
    C_COL_DELAY_MINUTES, C_COL_ENTERED_MS, C_COL_ENTRY_TIME, C_COL_ENTRY_TIME_MS,
    C_COL_RECEIVED_MS, C_COL_TOTAL_ELAPSED, C_COL_TOTAL_ELAPSED_MS, N_MS_PER_MINUTE,
};
use crate::spec::ReconError;

/// Format milliseconds as `H:MM:SS.mmm`.
///
/// Hours are not padded and not capped at 24. Negative inputs get a leading `-`.
pub fn format_duration_millis(value: i64) -> String {
    let c_sign = if value < 0 { "-" } else { "" };
    let n_abs = value.unsigned_abs();
    let n_ms = n_abs % 1_000;
    let n_sec_total = n_abs / 1_000;
    let n_sec = n_sec_total % 60;
    let n_min = (n_sec_total / 60) % 60;
    let n_hour = n_sec_total / 3_600;
    format!("{c_sign}{n_hour}:{n_min:02}:{n_sec:02}.{n_ms:03}")
}

/// Optional variant: `None` formats as the empty string.
pub fn format_duration_opt(value: Option<i64>) -> String {
    value.map(format_duration_millis).unwrap_or_default()
}

/// Format milliseconds as `{M} min {S.mmm} sec`, minutes being whole minutes.
pub fn format_minutes_seconds(value: i64) -> String {
    let c_sign = if value < 0 { "-" } else { "" };
    let n_abs = value.unsigned_abs();
    let n_min = n_abs / 60_000;
    let n_rem_ms = n_abs % 60_000;
    format!(
        "{c_sign}{n_min} min {}.{:03} sec",
        n_rem_ms / 1_000,
        n_rem_ms % 1_000
    )
}

/// Difference `end - start` when both ends are present.
fn derive_span(start: Option<i64>, end: Option<i64>) -> Option<i64> {
    end?.checked_sub(start?)
}

fn collect_i64(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>, ReconError> {
    Ok(df.column(name)?.i64()?.into_iter().collect())
}

/// Append entry/commit/total durations and the delay bucket to `df_merged`.
///
/// - entry  = entered - received
/// - commit = committed - entered
/// - total  = ledger activity - received
/// - delay  = floor(total / 1 minute)
///
/// Each `*_ms` column is `Int64` (null when an endpoint is missing); the
/// display columns hold `H:MM:SS.mmm` or `""`.
pub fn derive_timing_columns(df_merged: &mut DataFrame) -> Result<(), ReconError> {
    let l_received = collect_i64(df_merged, C_COL_RECEIVED_MS)?;
    let l_entered = collect_i64(df_merged, C_COL_ENTERED_MS)?;
    let l_committed = collect_i64(df_merged, C_COL_COMMITTED_MS)?;
    let l_activity = collect_i64(df_merged, C_COL_ACTIVITY_MS)?;

    let n_rows = df_merged.height();
    let mut l_entry = Vec::with_capacity(n_rows);
    let mut l_commit = Vec::with_capacity(n_rows);
    let mut l_total = Vec::with_capacity(n_rows);
    for n_idx in 0..n_rows {
        l_entry.push(derive_span(l_received[n_idx], l_entered[n_idx]));
        l_commit.push(derive_span(l_entered[n_idx], l_committed[n_idx]));
        l_total.push(derive_span(l_received[n_idx], l_activity[n_idx]));
    }
    let l_delay: Vec<Option<i64>> = l_total
        .iter()
        .map(|v| v.map(|n| n.div_euclid(N_MS_PER_MINUTE)))
        .collect();

    for (c_text, c_ms, l_values) in [
        (C_COL_ENTRY_TIME, C_COL_ENTRY_TIME_MS, l_entry),
        (C_COL_COMMIT_TIME, C_COL_COMMIT_TIME_MS, l_commit),
        (C_COL_TOTAL_ELAPSED, C_COL_TOTAL_ELAPSED_MS, l_total),
    ] {
        let l_text: Vec<String> = l_values.iter().copied().map(format_duration_opt).collect();
        df_merged.with_column(Series::new(c_ms.into(), l_values))?;
        df_merged.with_column(Series::new(c_text.into(), l_text))?;
    }
    df_merged.with_column(Series::new(C_COL_DELAY_MINUTES.into(), l_delay))?;
    Ok(())
}

/// Largest observed entry, commit and total durations, in milliseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpecDurationMaxima {
    pub entry_ms: Option<i64>,
    pub commit_ms: Option<i64>,
    pub total_ms: Option<i64>,
}

/// Maxima over a frame already passed through [`derive_timing_columns`].
pub fn derive_duration_maxima(df_merged: &DataFrame) -> Result<SpecDurationMaxima, ReconError> {
    let max_of = |name: &str| -> Result<Option<i64>, ReconError> {
        Ok(df_merged.column(name)?.i64()?.max())
    };
    Ok(SpecDurationMaxima {
        entry_ms: max_of(C_COL_ENTRY_TIME_MS)?,
        commit_ms: max_of(C_COL_COMMIT_TIME_MS)?,
        total_ms: max_of(C_COL_TOTAL_ELAPSED_MS)?,
    })
}
