//! XLSX constants and default preset factories.

use crate::spec::{SpecCellFormat, SpecXlsxFormats};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Build default format presets used by [`crate::writer::XlsxWriter`].
pub fn derive_default_xlsx_formats() -> SpecXlsxFormats {
    let fmt_base = SpecCellFormat {
        font_name: Some("Calibri".to_string()),
        font_size: Some(11),
        align: Some("left".to_string()),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    };

    SpecXlsxFormats {
        fmt_text: fmt_base.clone(),
        fmt_integer: fmt_base.with_(SpecCellFormat {
            align: Some("right".to_string()),
            num_format: Some("0".to_string()),
            ..Default::default()
        }),
        fmt_decimal: fmt_base.with_(SpecCellFormat {
            align: Some("right".to_string()),
            num_format: Some("#,##0.00".to_string()),
            ..Default::default()
        }),
        fmt_header: fmt_base.with_(SpecCellFormat {
            bold: Some(true),
            align: Some("center".to_string()),
            border: Some(1),
            bg_color: Some("#D9E1F2".to_string()),
            ..Default::default()
        }),
    }
}
