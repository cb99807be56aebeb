//! XLSX constants and default option factories.

use crate::spec::SpecExcelOptions;

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [char; 7] = ['*', ':', '?', '/', '\\', '[', ']'];

/// MIME type attached to the generated workbook blob.
pub const C_MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
/// Extension appended to download names that carry none.
pub const C_EXT_XLSX: &str = ".xlsx";
/// Length of the generated fallback file stem (first UUID group).
pub const N_LEN_FILE_ID: usize = 8;
/// Scheme prefix of object URLs handed out by the in-memory blob registry.
pub const C_OBJECT_URL_SCHEME: &str = "blob:";

/// Build default builder options.
pub fn derive_default_excel_options() -> SpecExcelOptions {
    SpecExcelOptions::default()
}
