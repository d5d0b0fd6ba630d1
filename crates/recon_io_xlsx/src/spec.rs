//! Shared XLSX specification models and error type.

use polars::prelude::PolarsError;
use rust_xlsxwriter::XlsxError;
use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification. `None` fields inherit when merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,
    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

/// Named format presets used by one writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxFormats {
    /// Text cells.
    pub fmt_text: SpecCellFormat,
    /// Integer cells.
    pub fmt_integer: SpecCellFormat,
    /// Decimal cells.
    pub fmt_decimal: SpecCellFormat,
    /// Header row.
    pub fmt_header: SpecCellFormat,
}

/// Normalized cell value during conversion/write pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
}

/// How one column is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumColumnKind {
    Text,
    Integer,
    Decimal,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Value conversion policy for missing/NaN/Inf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxValuePolicy {
    /// Replacement text for missing value when keep-missing is enabled.
    pub missing_value_str: String,
    /// Replacement text for NaN.
    pub nan_str: String,
    /// Replacement text for positive infinity.
    pub posinf_str: String,
    /// Replacement text for negative infinity.
    pub neginf_str: String,
}

impl Default for SpecXlsxValuePolicy {
    fn default() -> Self {
        Self {
            missing_value_str: "NA".to_string(),
            nan_str: "NaN".to_string(),
            posinf_str: "Inf".to_string(),
            neginf_str: "-Inf".to_string(),
        }
    }
}

/// Policy for selecting row chunk size in write pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxRowChunkPolicy {
    /// Width threshold for wide tables.
    pub width_large: usize,
    /// Chunk size used when width >= `width_large`.
    pub size_large: usize,
    /// Default chunk size.
    pub size_default: usize,
    /// Force exact chunk size when set.
    pub fixed_size: Option<usize>,
}

impl Default for SpecXlsxRowChunkPolicy {
    fn default() -> Self {
        Self {
            width_large: 2_000,
            size_large: 1_000,
            size_default: 10_000,
            fixed_size: None,
        }
    }
}

/// Autofit rule for column width inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumAutofitColumnsRule {
    /// Disable autofit.
    None,
    /// Infer width from header cells only.
    Header,
    /// Infer width from body cells only.
    Body,
    /// Infer width from both header and body cells (default).
    #[default]
    All,
}

/// Autofit policy for per-sheet write call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Autofit width inference rule.
    pub rule_columns: EnumAutofitColumnsRule,
    /// Max body rows inspected when body-based inference is active.
    pub height_body_inferred_max: Option<usize>,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            rule_columns: EnumAutofitColumnsRule::All,
            height_body_inferred_max: Some(5_000),
            width_cell_min: 8,
            width_cell_max: 48,
            width_cell_padding: 2,
        }
    }
}

/// Writer-wide options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxWriteOptions {
    /// Value conversion policy.
    pub value_policy: SpecXlsxValuePolicy,
    /// Keep missing/NaN/Inf as text instead of blank.
    pub keep_missing_values: bool,
    /// Infer numeric columns from dtypes.
    pub infer_numeric_cols: bool,
    /// Row chunking policy.
    pub row_chunk_policy: SpecXlsxRowChunkPolicy,
}

impl Default for SpecXlsxWriteOptions {
    fn default() -> Self {
        Self {
            value_policy: SpecXlsxValuePolicy::default(),
            keep_missing_values: false,
            infer_numeric_cols: true,
            row_chunk_policy: SpecXlsxRowChunkPolicy::default(),
        }
    }
}

/// Per-sheet call options.
#[derive(Default, Debug, Clone)]
pub struct SpecXlsxSheetWriteOptions {
    /// Integer columns by name/index-string.
    pub cols_integer: Option<Vec<String>>,
    /// Decimal columns by name/index-string.
    pub cols_decimal: Option<Vec<String>>,
    /// Columns forced to text even when numeric.
    pub cols_text: Option<Vec<String>>,
    /// Number of frozen columns.
    pub col_freeze: usize,
    /// Freeze the header row.
    pub if_freeze_header: bool,
    /// Override writer-level keep-missing behavior.
    pub if_keep_missing_values: Option<bool>,
    /// Column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ChartSpecification

/// Chart flavor supported by [`crate::writer::XlsxWriter::insert_column_chart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumChartKind {
    /// Vertical bars.
    #[default]
    Column,
    /// Horizontal bars.
    Bar,
}

/// Inclusive cell range on one sheet, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecCellRange {
    pub row_first: usize,
    pub col_first: usize,
    pub row_last: usize,
    pub col_last: usize,
}

/// One data series: a name cell and a value range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecChartSeries {
    /// `(row, col)` of the cell holding the series label.
    pub cell_name: (usize, usize),
    /// Value range.
    pub values: SpecCellRange,
}

/// Chart placed on an already-written sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxChart {
    /// Sheet holding both the data and the chart.
    pub sheet_name: String,
    /// Chart flavor.
    pub kind: EnumChartKind,
    /// Chart title.
    pub title: String,
    /// Category axis label.
    pub name_x_axis: String,
    /// Value axis label.
    pub name_y_axis: String,
    /// Category labels shared by all series.
    pub categories: SpecCellRange,
    /// Data series.
    pub series: Vec<SpecChartSeries>,
    /// Top-left anchor cell `(row, col)`.
    pub cell_anchor: (usize, usize),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Concrete sheet part emitted to workbook (after Excel-limit slicing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetSlice {
    /// Actual unique sheet name in workbook.
    pub sheet_name: String,
    /// Inclusive source row start.
    pub row_start_inclusive: usize,
    /// Exclusive source row end.
    pub row_end_exclusive: usize,
    /// Inclusive source column start.
    pub col_start_inclusive: usize,
    /// Exclusive source column end.
    pub col_end_exclusive: usize,
}

/// Per-write call report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxReport {
    /// Sheet slices produced by the write call.
    pub sheets: Vec<SpecSheetSlice>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

/// Errors raised by the writer kernel.
#[derive(Debug, Error)]
pub enum XlsxWriteError {
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("dataframe access error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Cannot write after close().")]
    Closed,
    #[error("Duplicate column names detected: {0}")]
    DuplicateColumns(String),
    #[error("Column not found: {0:?}")]
    ColumnNotFound(String),
    #[error("Sheet not found: {0:?}")]
    SheetNotFound(String),
    #[error("{0}")]
    InvalidPolicy(String),
    #[error("{0}")]
    IndexOverflow(String),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
