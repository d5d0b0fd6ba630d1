//! Counts of merged rows by transaction code and delay minute.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use polars::prelude::{Column, DataFrame, PolarsResult};

use crate::conf::{
    C_COL_DELAY_MINUTES, C_COL_TRANSACTION_CODE, C_LABEL_BLANK_CODE, C_LABEL_GRAND_TOTAL,
    C_LABEL_MISSING_DELAY,
};
use crate::spec::ReconError;

/// Header of the pivot's row-label column.
pub const C_PIVOT_ROW_HEADER: &str = "Transaction Code";

/// Delay bucket of one merged row. Numeric buckets sort before `Missing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumDelayBucket {
    Minutes(i64),
    Missing,
}

impl fmt::Display for EnumDelayBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minutes(n) => write!(f, "{n}"),
            Self::Missing => f.write_str(C_LABEL_MISSING_DELAY),
        }
    }
}

/// Cross-tab of row counts.
///
/// `counts[r][c]` counts rows with code `row_labels[r]` and delay
/// `col_labels[c]`. Totals are kept alongside for the report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecDelayPivot {
    /// Sorted transaction codes; blank codes appear as `(blank)`.
    pub row_labels: Vec<String>,
    /// Sorted numeric buckets, then `N/A` if any row lacks a delay.
    pub col_labels: Vec<EnumDelayBucket>,
    pub counts: Vec<Vec<u64>>,
    pub row_totals: Vec<u64>,
    pub col_totals: Vec<u64>,
    pub grand_total: u64,
}

impl SpecDelayPivot {
    /// Tally `(code, delay)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Option<S>, Option<i64>)>,
        S: AsRef<str>,
    {
        let mut dict_counts: BTreeMap<String, BTreeMap<EnumDelayBucket, u64>> = BTreeMap::new();
        let mut set_buckets: BTreeSet<EnumDelayBucket> = BTreeSet::new();
        for (code, delay) in pairs {
            let c_code = code
                .as_ref()
                .map(AsRef::<str>::as_ref)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(C_LABEL_BLANK_CODE)
                .to_string();
            let bucket = delay.map_or(EnumDelayBucket::Missing, EnumDelayBucket::Minutes);
            set_buckets.insert(bucket);
            *dict_counts.entry(c_code).or_default().entry(bucket).or_default() += 1;
        }

        let col_labels: Vec<EnumDelayBucket> = set_buckets.into_iter().collect();
        let mut pivot = SpecDelayPivot {
            col_labels,
            ..Default::default()
        };
        pivot.col_totals = vec![0; pivot.col_labels.len()];
        for (c_code, dict_row) in dict_counts {
            let l_counts: Vec<u64> = pivot
                .col_labels
                .iter()
                .map(|bucket| dict_row.get(bucket).copied().unwrap_or(0))
                .collect();
            for (n_total, n_count) in pivot.col_totals.iter_mut().zip(&l_counts) {
                *n_total += n_count;
            }
            let n_row_total: u64 = l_counts.iter().sum();
            pivot.grand_total += n_row_total;
            pivot.row_totals.push(n_row_total);
            pivot.row_labels.push(c_code);
            pivot.counts.push(l_counts);
        }
        pivot
    }

    /// Count for one cell, 0 when either label is absent.
    pub fn count(&self, code: &str, bucket: EnumDelayBucket) -> u64 {
        let n_row = self.row_labels.iter().position(|c| c == code);
        let n_col = self.col_labels.iter().position(|b| *b == bucket);
        match (n_row, n_col) {
            (Some(r), Some(c)) => self.counts[r][c],
            _ => 0,
        }
    }

    /// Totals agree with the body in both directions.
    pub fn is_consistent(&self) -> bool {
        let if_rows_ok = self
            .counts
            .iter()
            .zip(&self.row_totals)
            .all(|(l_row, n_total)| l_row.iter().sum::<u64>() == *n_total);
        let if_cols_ok = (0..self.col_labels.len()).all(|n_col| {
            self.counts.iter().map(|l_row| l_row[n_col]).sum::<u64>() == self.col_totals[n_col]
        });
        if_rows_ok
            && if_cols_ok
            && self.row_totals.iter().sum::<u64>() == self.grand_total
            && self.col_totals.iter().sum::<u64>() == self.grand_total
    }

    /// Render as a frame: code column, one column per bucket, `Grand Total`
    /// column, then a final `Grand Total` row.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut l_codes: Vec<String> = self.row_labels.clone();
        l_codes.push(C_LABEL_GRAND_TOTAL.to_string());

        let mut l_cols: Vec<Column> = Vec::with_capacity(self.col_labels.len() + 2);
        l_cols.push(Column::new(C_PIVOT_ROW_HEADER.into(), l_codes));
        for (n_col, bucket) in self.col_labels.iter().enumerate() {
            let mut l_values: Vec<i64> = self
                .counts
                .iter()
                .map(|l_row| l_row[n_col] as i64)
                .collect();
            l_values.push(self.col_totals[n_col] as i64);
            l_cols.push(Column::new(bucket.to_string().into(), l_values));
        }
        let mut l_totals: Vec<i64> = self.row_totals.iter().map(|n| *n as i64).collect();
        l_totals.push(self.grand_total as i64);
        l_cols.push(Column::new(C_LABEL_GRAND_TOTAL.into(), l_totals));
        DataFrame::new(l_cols)
    }
}

/// Pivot of a merged frame carrying transaction code and delay columns.
pub fn build_delay_pivot(df_merged: &DataFrame) -> Result<SpecDelayPivot, ReconError> {
    let ca_codes = df_merged.column(C_COL_TRANSACTION_CODE)?.str()?;
    let ca_delay = df_merged.column(C_COL_DELAY_MINUTES)?.i64()?;
    Ok(SpecDelayPivot::from_pairs(
        ca_codes.into_iter().zip(ca_delay.into_iter()),
    ))
}
