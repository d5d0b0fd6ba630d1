//! Left join of posted transactions against message events.

use polars::prelude::*;
use tracing::debug;

use crate::conf::{
    C_COL_ACCOUNT_NUMBER, C_COL_AMOUNT_CENTS, C_COL_EVENT_ACCOUNT_ID, C_COL_EVENT_AMOUNT_CENTS,
    C_COL_EVENT_MATCHED, C_COL_EVENT_POST_DATE, C_COL_POST_DATE, C_COL_REFERENCE_NUMBER,
    C_COL_ROW_NR, C_COL_TRACE_NUMBER, L_COLS_EVENT_REQUIRED, L_COLS_LEDGER_REQUIRED,
};
use crate::spec::ReconError;
use crate::timing::derive_timing_columns;

fn validate_columns(
    df: &DataFrame,
    l_required: &[&str],
    source_name: &str,
) -> Result<(), ReconError> {
    let l_names = df.get_column_names_str();
    match l_required.iter().find(|c| !l_names.contains(c)) {
        Some(c_missing) => Err(ReconError::MissingColumn {
            source_name: source_name.to_string(),
            column: (*c_missing).to_string(),
        }),
        None => Ok(()),
    }
}

/// Match every posted row to at most one event on
/// (account, amount in cents, reference/trace number, post date).
///
/// Every ledger row appears in the output, in input order, with
/// `event_matched` set. Durations are derived afterwards, so unmatched rows
/// carry empty duration strings. With duplicate event keys a ledger row
/// appears once per matching event.
pub fn reconcile_frames(
    df_ledger: &DataFrame,
    df_events: &DataFrame,
) -> Result<DataFrame, ReconError> {
    validate_columns(df_ledger, &L_COLS_LEDGER_REQUIRED, "ledger frame")?;
    validate_columns(df_events, &L_COLS_EVENT_REQUIRED, "event frame")?;

    let lf_ledger = df_ledger.with_row_index(C_COL_ROW_NR.into(), None)?.lazy();
    let lf_events = df_events
        .clone()
        .lazy()
        .with_column(lit(true).alias(C_COL_EVENT_MATCHED));

    let df_joined = lf_ledger
        .join(
            lf_events,
            [
                col(C_COL_ACCOUNT_NUMBER),
                col(C_COL_AMOUNT_CENTS),
                col(C_COL_REFERENCE_NUMBER),
                col(C_COL_POST_DATE),
            ],
            [
                col(C_COL_EVENT_ACCOUNT_ID),
                col(C_COL_EVENT_AMOUNT_CENTS),
                col(C_COL_TRACE_NUMBER),
                col(C_COL_EVENT_POST_DATE),
            ],
            JoinArgs::new(JoinType::Left),
        )
        .with_column(col(C_COL_EVENT_MATCHED).fill_null(lit(false)))
        .collect()?;

    let mut df_merged = df_joined
        .sort([C_COL_ROW_NR], SortMultipleOptions::default().with_maintain_order(true))?
        .drop(C_COL_ROW_NR)?;
    derive_timing_columns(&mut df_merged)?;

    debug!(
        rows_ledger = df_ledger.height(),
        rows_events = df_events.height(),
        rows_merged = df_merged.height(),
        "frames reconciled"
    );
    Ok(df_merged)
}

/// Number of rows with `event_matched = true`.
pub fn count_matched(df_merged: &DataFrame) -> Result<u64, ReconError> {
    Ok(df_merged
        .column(C_COL_EVENT_MATCHED)?
        .bool()?
        .sum()
        .map_or(0, u64::from))
}
