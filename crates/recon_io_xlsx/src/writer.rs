//! XLSX writer kernel that renders polars DataFrames into a workbook.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use polars::prelude::{AnyValue, Column, DataFrame};
use rust_xlsxwriter::{Chart, ChartType, Format, FormatAlign, FormatBorder, Workbook, Worksheet};

use crate::conf::N_LEN_EXCEL_SHEET_NAME_MAX;
use crate::spec::{
    EnumAutofitColumnsRule, EnumCellValue, EnumChartKind, EnumColumnKind, SpecAutofitCellsPolicy,
    SpecCellFormat, SpecSheetSlice, SpecXlsxChart, SpecXlsxFormats, SpecXlsxReport,
    SpecXlsxSheetWriteOptions, SpecXlsxWriteOptions, XlsxWriteError,
};
use crate::util::{
    calculate_row_chunk_size, convert_cell_value, estimate_unicode_string_width,
    estimate_width_len, generate_row_chunks, plan_sheet_slices, sanitize_sheet_name,
    select_sorted_indices_from_refs, validate_unique_columns,
};

/// Stateful workbook writer.
///
/// The workbook is buffered in memory until [`Self::close`] is called.
pub struct XlsxWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    formats: SpecXlsxFormats,
    write_options: SpecXlsxWriteOptions,
    set_sheet_names_existing: BTreeSet<String>,
    l_reports: Vec<SpecXlsxReport>,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create writer bound to output path and format/options presets.
    pub fn new<P: AsRef<Path>>(
        path_file_out: P,
        formats: SpecXlsxFormats,
        write_options: SpecXlsxWriteOptions,
    ) -> Self {
        Self {
            path_file_out: path_file_out.as_ref().to_path_buf(),
            workbook: Workbook::new(),
            formats,
            write_options,
            set_sheet_names_existing: BTreeSet::new(),
            l_reports: Vec::new(),
            if_closed: false,
        }
    }

    /// Snapshot of per-sheet write reports.
    pub fn report(&self) -> Vec<SpecXlsxReport> {
        self.l_reports.clone()
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<(), XlsxWriteError> {
        if self.if_closed {
            return Ok(());
        }
        self.workbook.save(&self.path_file_out)?;
        self.if_closed = true;
        Ok(())
    }

    /// Write `df_data` as one logical sheet (several physical sheets past
    /// Excel limits). Returns the report for this call.
    pub fn write_sheet_from_dataframe(
        &mut self,
        df_data: &DataFrame,
        sheet_name: &str,
        options: &SpecXlsxSheetWriteOptions,
    ) -> Result<SpecXlsxReport, XlsxWriteError> {
        if self.if_closed {
            return Err(XlsxWriteError::Closed);
        }
        validate_policy_autofit(&options.policy_autofit)?;

        let l_colnames: Vec<String> = df_data
            .get_column_names_str()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        validate_unique_columns(&l_colnames)?;

        let l_kinds = self.plan_column_kinds(df_data, &l_colnames, options)?;
        let mut report = SpecXlsxReport::default();
        let l_sheet_parts = plan_sheet_slices(
            df_data.height(),
            l_colnames.len(),
            &sanitize_sheet_name(sheet_name, "_"),
            &mut report,
        );

        for sheet_slice in l_sheet_parts {
            let sheet_name_unique = self.derive_unique_sheet_name(&sheet_slice.sheet_name);
            self.write_sheet_slice(
                df_data,
                &l_colnames,
                &l_kinds,
                &sheet_slice,
                &sheet_name_unique,
                options,
            )?;
            report.sheets.push(SpecSheetSlice {
                sheet_name: sheet_name_unique,
                ..sheet_slice
            });
        }

        self.l_reports.push(report.clone());
        Ok(report)
    }

    /// Add a column/bar chart to a sheet written earlier through this writer.
    pub fn insert_column_chart(
        &mut self,
        spec_chart: &SpecXlsxChart,
    ) -> Result<(), XlsxWriteError> {
        if self.if_closed {
            return Err(XlsxWriteError::Closed);
        }
        if !self.set_sheet_names_existing.contains(&spec_chart.sheet_name) {
            return Err(XlsxWriteError::SheetNotFound(spec_chart.sheet_name.clone()));
        }

        let mut chart = Chart::new(match spec_chart.kind {
            EnumChartKind::Column => ChartType::Column,
            EnumChartKind::Bar => ChartType::Bar,
        });
        let c_sheet = spec_chart.sheet_name.as_str();
        let rng_cat = spec_chart.categories;
        for spec_series in &spec_chart.series {
            let rng_val = spec_series.values;
            chart
                .add_series()
                .set_name((
                    c_sheet,
                    cast_row_num(spec_series.cell_name.0)?,
                    cast_col_num(spec_series.cell_name.1)?,
                ))
                .set_categories((
                    c_sheet,
                    cast_row_num(rng_cat.row_first)?,
                    cast_col_num(rng_cat.col_first)?,
                    cast_row_num(rng_cat.row_last)?,
                    cast_col_num(rng_cat.col_last)?,
                ))
                .set_values((
                    c_sheet,
                    cast_row_num(rng_val.row_first)?,
                    cast_col_num(rng_val.col_first)?,
                    cast_row_num(rng_val.row_last)?,
                    cast_col_num(rng_val.col_last)?,
                ));
        }
        chart.title().set_name(spec_chart.title.as_str());
        chart.x_axis().set_name(spec_chart.name_x_axis.as_str());
        chart.y_axis().set_name(spec_chart.name_y_axis.as_str());

        let worksheet = self.workbook.worksheet_from_name(c_sheet)?;
        worksheet.insert_chart(
            cast_row_num(spec_chart.cell_anchor.0)?,
            cast_col_num(spec_chart.cell_anchor.1)?,
            &chart,
        )?;
        Ok(())
    }

    fn plan_column_kinds(
        &self,
        df_data: &DataFrame,
        l_colnames: &[String],
        options: &SpecXlsxSheetWriteOptions,
    ) -> Result<Vec<EnumColumnKind>, XlsxWriteError> {
        let set_integer =
            select_sorted_indices_from_refs(l_colnames, options.cols_integer.as_deref())?;
        let set_decimal =
            select_sorted_indices_from_refs(l_colnames, options.cols_decimal.as_deref())?;
        let set_text = select_sorted_indices_from_refs(l_colnames, options.cols_text.as_deref())?;

        let l_kinds = df_data
            .get_columns()
            .iter()
            .enumerate()
            .map(|(n_idx, col)| {
                if set_text.contains(&n_idx) {
                    EnumColumnKind::Text
                } else if set_integer.contains(&n_idx) {
                    EnumColumnKind::Integer
                } else if set_decimal.contains(&n_idx) {
                    EnumColumnKind::Decimal
                } else if !self.write_options.infer_numeric_cols || !col.dtype().is_numeric() {
                    EnumColumnKind::Text
                } else if col.dtype().is_integer() {
                    EnumColumnKind::Integer
                } else {
                    EnumColumnKind::Decimal
                }
            })
            .collect();
        Ok(l_kinds)
    }

    fn write_sheet_slice(
        &mut self,
        df_data: &DataFrame,
        l_colnames: &[String],
        l_kinds: &[EnumColumnKind],
        sheet_slice: &SpecSheetSlice,
        sheet_name_unique: &str,
        options: &SpecXlsxSheetWriteOptions,
    ) -> Result<(), XlsxWriteError> {
        let if_keep_missing_values = options
            .if_keep_missing_values
            .unwrap_or(self.write_options.keep_missing_values);
        let value_policy = &self.write_options.value_policy;
        let policy_autofit = &options.policy_autofit;

        let n_col_start = sheet_slice.col_start_inclusive;
        let n_width = sheet_slice.col_end_exclusive - n_col_start;
        let n_height = sheet_slice.row_end_exclusive - sheet_slice.row_start_inclusive;
        let l_kinds_slice = &l_kinds[n_col_start..sheet_slice.col_end_exclusive];

        let fmt_header = derive_rust_xlsx_format(&self.formats.fmt_header);
        let l_fmt_by_col: Vec<Format> = l_kinds_slice
            .iter()
            .map(|kind| {
                derive_rust_xlsx_format(match kind {
                    EnumColumnKind::Text => &self.formats.fmt_text,
                    EnumColumnKind::Integer => &self.formats.fmt_integer,
                    EnumColumnKind::Decimal => &self.formats.fmt_decimal,
                })
            })
            .collect();
        let l_cols_slice: Vec<Column> = df_data.get_columns()
            [n_col_start..sheet_slice.col_end_exclusive]
            .iter()
            .map(|col| col.slice(sheet_slice.row_start_inclusive as i64, n_height))
            .collect();

        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(sheet_name_unique)?;

        let mut l_width_header = vec![0usize; n_width];
        let mut l_width_body = vec![0usize; n_width];
        for (n_idx_col, c_name) in l_colnames[n_col_start..sheet_slice.col_end_exclusive]
            .iter()
            .enumerate()
        {
            worksheet.write_string_with_format(0, cast_col_num(n_idx_col)?, c_name, &fmt_header)?;
            l_width_header[n_idx_col] = estimate_unicode_string_width(c_name);
        }

        let if_autofit_body = matches!(
            policy_autofit.rule_columns,
            EnumAutofitColumnsRule::Body | EnumAutofitColumnsRule::All
        );
        let n_rows_autofit = policy_autofit.height_body_inferred_max.unwrap_or(usize::MAX);
        let n_rows_chunk =
            calculate_row_chunk_size(n_width, &self.write_options.row_chunk_policy);

        for (n_row_chunk_start, n_rows_chunk_len) in generate_row_chunks(n_height, n_rows_chunk) {
            for n_row_local in n_row_chunk_start..n_row_chunk_start + n_rows_chunk_len {
                let n_row_sheet = cast_row_num(n_row_local + 1)?;
                for (n_idx_col, col) in l_cols_slice.iter().enumerate() {
                    let kind = l_kinds_slice[n_idx_col];
                    let value = convert_cell_value(
                        &derive_cell_value_from_any_value(col.get(n_row_local)?),
                        kind,
                        if_keep_missing_values,
                        value_policy,
                    );
                    if if_autofit_body && n_row_local < n_rows_autofit {
                        l_width_body[n_idx_col] =
                            l_width_body[n_idx_col].max(estimate_width_len(&value, kind));
                    }
                    write_cell_with_format(
                        worksheet,
                        n_row_sheet,
                        cast_col_num(n_idx_col)?,
                        &value,
                        &l_fmt_by_col[n_idx_col],
                    )?;
                }
            }
        }

        if options.if_freeze_header || options.col_freeze > 0 {
            worksheet.set_freeze_panes(
                u32::from(options.if_freeze_header),
                cast_col_num(options.col_freeze)?,
            )?;
        }

        if policy_autofit.rule_columns != EnumAutofitColumnsRule::None {
            let n_min = policy_autofit.width_cell_min;
            let n_max = policy_autofit.width_cell_max.min(255);
            for n_idx_col in 0..n_width {
                let n_width_recorded = match policy_autofit.rule_columns {
                    EnumAutofitColumnsRule::Header => l_width_header[n_idx_col],
                    EnumAutofitColumnsRule::Body => l_width_body[n_idx_col],
                    _ => l_width_header[n_idx_col].max(l_width_body[n_idx_col]),
                };
                let n_width_final =
                    (n_width_recorded + policy_autofit.width_cell_padding).clamp(n_min, n_max);
                worksheet.set_column_width(cast_col_num(n_idx_col)?, n_width_final as f64)?;
            }
        }
        Ok(())
    }

    fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if self.set_sheet_names_existing.insert(name.to_string()) {
            return name.to_string();
        }

        let base_name: String = name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX - 3).collect();
        let mut n_idx = 2usize;
        loop {
            let candidate: String = format!("{base_name}__{n_idx}")
                .chars()
                .take(N_LEN_EXCEL_SHEET_NAME_MAX)
                .collect();
            if self.set_sheet_names_existing.insert(candidate.clone()) {
                return candidate;
            }
            n_idx += 1;
        }
    }
}

fn validate_policy_autofit(policy_autofit: &SpecAutofitCellsPolicy) -> Result<(), XlsxWriteError> {
    if policy_autofit.width_cell_min == 0 {
        return Err(XlsxWriteError::InvalidPolicy(
            "policy_autofit.width_cell_min must be >= 1.".to_string(),
        ));
    }
    if policy_autofit.width_cell_max < policy_autofit.width_cell_min {
        return Err(XlsxWriteError::InvalidPolicy(
            "policy_autofit.width_cell_max must be >= policy_autofit.width_cell_min.".to_string(),
        ));
    }
    Ok(())
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => EnumCellValue::String(if val { "Yes" } else { "No" }.to_string()),
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::String(value.to_string()),
    }
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), XlsxWriteError> {
    match value {
        EnumCellValue::None => {
            worksheet.write_blank(row, col, format)?;
        }
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(row, col, val, format)?;
        }
        EnumCellValue::Number(val) => {
            worksheet.write_number_with_format(row, col, *val, format)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    for val in [&spec.align, &spec.valign].into_iter().flatten() {
        if let Some(align) = derive_format_align(val) {
            format = format.set_align(align);
        }
    }
    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }
    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, XlsxWriteError> {
    u32::try_from(value)
        .map_err(|_| XlsxWriteError::IndexOverflow(format!("row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> Result<u16, XlsxWriteError> {
    u16::try_from(value)
        .map_err(|_| XlsxWriteError::IndexOverflow(format!("column index overflow: {value}")))
}
