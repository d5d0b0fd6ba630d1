//! `recon_io_xlsx`:
//! DataFrame to XLSX writer kernel used by the reconciliation report.
//!
//! - `conf`   : Excel limits and default format presets
//! - `spec`   : formats/options/chart specs/errors
//! - `util`   : pure helper functions
//! - `writer` : stateful workbook writer
pub mod conf;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
    derive_default_xlsx_formats,
};
pub use spec::{
    EnumAutofitColumnsRule, EnumCellValue, EnumChartKind, EnumColumnKind, SpecAutofitCellsPolicy,
    SpecCellFormat, SpecCellRange, SpecChartSeries, SpecSheetSlice, SpecXlsxChart,
    SpecXlsxFormats, SpecXlsxReport, SpecXlsxRowChunkPolicy, SpecXlsxSheetWriteOptions,
    SpecXlsxValuePolicy, SpecXlsxWriteOptions, XlsxWriteError,
};
pub use util::sanitize_sheet_name;
pub use writer::XlsxWriter;
