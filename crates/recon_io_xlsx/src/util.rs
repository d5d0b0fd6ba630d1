//! Stateless helper utilities used by the XLSX writer kernel.

use std::collections::{BTreeMap, BTreeSet};

use crate::conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
use crate::spec::{
    EnumCellValue, EnumColumnKind, SpecSheetSlice, SpecXlsxReport, SpecXlsxRowChunkPolicy,
    SpecXlsxValuePolicy, XlsxWriteError,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

fn convert_non_finite(
    x: f64,
    if_keep_missing_values: bool,
    value_policy: &SpecXlsxValuePolicy,
) -> EnumCellValue {
    if !if_keep_missing_values {
        return EnumCellValue::None;
    }
    let c_text = if x.is_nan() {
        &value_policy.nan_str
    } else if x.is_sign_positive() {
        &value_policy.posinf_str
    } else {
        &value_policy.neginf_str
    };
    EnumCellValue::String(c_text.clone())
}

/// Normalize one raw cell for a column of `kind`.
///
/// Text columns stringify numbers. Numeric columns parse numeric-looking
/// strings and route NaN/Inf through `value_policy`. Integer columns keep
/// non-integral values as text rather than silently truncating.
pub fn convert_cell_value(
    value: &EnumCellValue,
    kind: EnumColumnKind,
    if_keep_missing_values: bool,
    value_policy: &SpecXlsxValuePolicy,
) -> EnumCellValue {
    let n_value = match (value, kind) {
        (EnumCellValue::None, _) => {
            return if if_keep_missing_values {
                EnumCellValue::String(value_policy.missing_value_str.clone())
            } else {
                EnumCellValue::None
            };
        }
        (EnumCellValue::String(s), EnumColumnKind::Text) => {
            return EnumCellValue::String(s.clone());
        }
        (EnumCellValue::Number(n), EnumColumnKind::Text) => {
            return EnumCellValue::String(n.to_string());
        }
        (EnumCellValue::Number(n), _) => *n,
        (EnumCellValue::String(s), _) => match s.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => return EnumCellValue::String(s.clone()),
        },
    };

    if !n_value.is_finite() {
        return convert_non_finite(n_value, if_keep_missing_values, value_policy);
    }
    if kind == EnumColumnKind::Integer && n_value.fract() != 0.0 {
        return EnumCellValue::String(n_value.to_string());
    }
    EnumCellValue::Number(n_value)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnUtils

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[String]) -> Result<(), XlsxWriteError> {
    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }
    if dict_pos.len() == columns.len() {
        return Ok(());
    }

    let c_msg = dict_pos
        .iter()
        .filter(|(_, l_pos)| l_pos.len() > 1)
        .map(|(c_name, l_pos)| format!("{c_name:?} x{} at indices {l_pos:?}", l_pos.len()))
        .collect::<Vec<_>>()
        .join("; ");
    Err(XlsxWriteError::DuplicateColumns(c_msg))
}

/// Resolve mixed refs (`name` or numeric string index) to sorted unique indices.
pub fn select_sorted_indices_from_refs(
    columns: &[String],
    refs: Option<&[String]>,
) -> Result<BTreeSet<usize>, XlsxWriteError> {
    let mut set_idx = BTreeSet::new();
    for ref_col in refs.unwrap_or_default() {
        if let Some(n_idx) = columns.iter().position(|c_name| c_name == ref_col) {
            set_idx.insert(n_idx);
            continue;
        }
        match ref_col.parse::<usize>() {
            Ok(n_idx) if n_idx < columns.len() => {
                set_idx.insert(n_idx);
            }
            _ => return Err(XlsxWriteError::ColumnNotFound(ref_col.clone())),
        }
    }
    Ok(set_idx)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RowChunking

/// Derive row chunk size from dataframe width and chunk policy.
pub fn calculate_row_chunk_size(width_df: usize, policy: &SpecXlsxRowChunkPolicy) -> usize {
    let n_size = match policy.fixed_size {
        Some(n_fixed_size) => n_fixed_size,
        None if width_df >= policy.width_large => policy.size_large,
        None => policy.size_default,
    };
    n_size.max(1)
}

/// Generate `(row_start, row_len)` chunks for `n_rows_total`.
pub fn generate_row_chunks(n_rows_total: usize, size_rows_chunk: usize) -> Vec<(usize, usize)> {
    let size_rows_chunk = size_rows_chunk.max(1);
    (0..n_rows_total)
        .step_by(size_rows_chunk)
        .map(|n_start| (n_start, size_rows_chunk.min(n_rows_total - n_start)))
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    // Excel rejects names that start or end with an apostrophe.
    let c_name = c_name.trim().trim_matches('\'').trim();
    if c_name.is_empty() {
        return "Sheet".to_string();
    }
    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Create suffixed sheet name (`base_1`, `base_2`, ...), respecting length cap.
pub fn create_sheet_identifier(base_name: &str, part_idx_1based: usize) -> String {
    let c_suffix = format!("_{part_idx_1based}");
    let n_len_base_max = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_suffix.len()).max(1);
    let c_base: String = base_name.chars().take(n_len_base_max).collect();
    format!("{c_base}{c_suffix}")
}

fn split_span(n_total: usize, n_span_max: usize) -> Vec<(usize, usize)> {
    let mut l_spans: Vec<(usize, usize)> = (0..n_total)
        .step_by(n_span_max)
        .map(|n_start| (n_start, usize::min(n_total, n_start + n_span_max)))
        .collect();
    if l_spans.is_empty() {
        l_spans.push((0, 0));
    }
    l_spans
}

/// Split a `height_df x width_df` body under a one-row header into
/// Excel-compliant sheet slices, columns first, then rows.
pub fn plan_sheet_slices(
    height_df: usize,
    width_df: usize,
    sheet_name: &str,
    report: &mut SpecXlsxReport,
) -> Vec<SpecSheetSlice> {
    let l_col_spans = split_span(width_df, N_NCOLS_EXCEL_MAX);
    let l_row_spans = split_span(height_df, N_NROWS_EXCEL_MAX - 1);
    let n_parts_total = l_col_spans.len() * l_row_spans.len();

    let mut l_sheet_parts = Vec::with_capacity(n_parts_total);
    for (col_start, col_end) in &l_col_spans {
        for (row_start, row_end) in &l_row_spans {
            let c_sheet_name = if n_parts_total == 1 {
                sheet_name.to_string()
            } else {
                create_sheet_identifier(sheet_name, l_sheet_parts.len() + 1)
            };
            l_sheet_parts.push(SpecSheetSlice {
                sheet_name: c_sheet_name,
                row_start_inclusive: *row_start,
                row_end_exclusive: *row_end,
                col_start_inclusive: *col_start,
                col_end_exclusive: *col_end,
            });
        }
    }

    if n_parts_total > 1 {
        report.warn(format!(
            "Excel limit overflow: split into {n_parts_total} sheets (columns-first, then rows)."
        ));
    }
    l_sheet_parts
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WidthEstimation

/// Estimate displayed width units for one normalized cell value.
pub fn estimate_width_len(value: &EnumCellValue, kind: EnumColumnKind) -> usize {
    match value {
        EnumCellValue::None => 0,
        EnumCellValue::String(s) => estimate_unicode_string_width(s),
        EnumCellValue::Number(n) => match kind {
            EnumColumnKind::Integer => format!("{n:.0}").len(),
            EnumColumnKind::Decimal => {
                // `#,##0.00`: two decimals plus thousands separators.
                let c_digits = format!("{:.2}", n.abs());
                let n_int_digits = c_digits.len().saturating_sub(3);
                c_digits.len() + n_int_digits.saturating_sub(1) / 3 + usize::from(*n < 0.0)
            }
            EnumColumnKind::Text => n.to_string().len(),
        },
    }
}

pub(crate) fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> EnumCellValue {
        EnumCellValue::String(v.to_string())
    }

    #[test]
    fn convert_cell_value_by_column_kind() {
        let policy = SpecXlsxValuePolicy::default();

        assert_eq!(
            convert_cell_value(&EnumCellValue::Number(3.0), EnumColumnKind::Text, false, &policy),
            s("3")
        );
        assert_eq!(
            convert_cell_value(&s("42"), EnumColumnKind::Integer, false, &policy),
            EnumCellValue::Number(42.0)
        );
        assert_eq!(
            convert_cell_value(
                &EnumCellValue::Number(1.5),
                EnumColumnKind::Integer,
                false,
                &policy
            ),
            s("1.5")
        );
        assert_eq!(
            convert_cell_value(&s("abc"), EnumColumnKind::Decimal, false, &policy),
            s("abc")
        );
    }

    #[test]
    fn convert_cell_value_missing_and_non_finite() {
        let policy = SpecXlsxValuePolicy::default();

        assert_eq!(
            convert_cell_value(&EnumCellValue::None, EnumColumnKind::Text, false, &policy),
            EnumCellValue::None
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::None, EnumColumnKind::Text, true, &policy),
            s("NA")
        );
        assert_eq!(
            convert_cell_value(
                &EnumCellValue::Number(f64::NEG_INFINITY),
                EnumColumnKind::Decimal,
                true,
                &policy
            ),
            s("-Inf")
        );
        assert_eq!(
            convert_cell_value(
                &EnumCellValue::Number(f64::NAN),
                EnumColumnKind::Decimal,
                false,
                &policy
            ),
            EnumCellValue::None
        );
    }

    #[test]
    fn validate_unique_columns_reports_duplicates() {
        let l_cols = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let err = validate_unique_columns(&l_cols).expect_err("duplicate");
        assert!(err.to_string().contains("\"a\" x2 at indices [0, 2]"));
        assert!(validate_unique_columns(&l_cols[..2]).is_ok());
    }

    #[test]
    fn select_indices_by_name_or_position() {
        let l_cols = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        let refs = vec!["z".to_string(), "0".to_string()];
        let set_idx = select_sorted_indices_from_refs(&l_cols, Some(&refs)).expect("refs");
        assert_eq!(set_idx.into_iter().collect::<Vec<_>>(), vec![0, 2]);

        let refs_bad = vec!["missing".to_string()];
        assert!(select_sorted_indices_from_refs(&l_cols, Some(&refs_bad)).is_err());
        assert!(select_sorted_indices_from_refs(&l_cols, None).expect("none").is_empty());
    }

    #[test]
    fn row_chunks_cover_all_rows() {
        assert_eq!(generate_row_chunks(5, 2), vec![(0, 2), (2, 2), (4, 1)]);
        assert!(generate_row_chunks(0, 10).is_empty());

        let policy = SpecXlsxRowChunkPolicy {
            fixed_size: Some(0),
            ..SpecXlsxRowChunkPolicy::default()
        };
        assert_eq!(calculate_row_chunk_size(3, &policy), 1);
    }

    #[test]
    fn sanitize_and_suffix_sheet_names() {
        assert_eq!(sanitize_sheet_name("Recon: 2024/03", "_"), "Recon_ 2024_03");
        assert_eq!(sanitize_sheet_name("  ", "_"), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40), "_").len(), 31);

        let c_name = create_sheet_identifier(&"y".repeat(40), 12);
        assert_eq!(c_name.len(), 31);
        assert!(c_name.ends_with("_12"));
    }

    #[test]
    fn plan_single_slice_without_warning() {
        let mut report = SpecXlsxReport::default();
        let l_slices = plan_sheet_slices(10, 3, "Data", &mut report);
        assert_eq!(l_slices.len(), 1);
        assert_eq!(l_slices[0].sheet_name, "Data");
        assert_eq!(l_slices[0].row_end_exclusive, 10);
        assert!(report.warnings.is_empty());

        let l_slices = plan_sheet_slices(0, 20_000, "Wide", &mut report);
        assert_eq!(l_slices.len(), 2);
        assert_eq!(l_slices[1].sheet_name, "Wide_2");
        assert_eq!(l_slices[1].col_start_inclusive, N_NCOLS_EXCEL_MAX);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn width_estimate_for_decimal_includes_separators() {
        assert_eq!(
            estimate_width_len(&EnumCellValue::Number(1234567.5), EnumColumnKind::Decimal),
            "1,234,567.50".len()
        );
        assert_eq!(
            estimate_width_len(&EnumCellValue::Number(-12.0), EnumColumnKind::Decimal),
            "-12.00".len()
        );
        assert_eq!(estimate_width_len(&s("abc"), EnumColumnKind::Text), 3);
    }
}
