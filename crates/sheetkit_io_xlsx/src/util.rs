//! Stateless helper utilities shared by the builder and the writer kernel.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::conf::{C_EXT_XLSX, N_LEN_EXCEL_SHEET_NAME_MAX, N_LEN_FILE_ID, TUP_EXCEL_ILLEGAL};
use crate::spec::{ExcelExportError, SpecColumn};

////////////////////////////////////////////////////////////////////////////////
// #region CellValueMapping

/// Falsy test for a raw cell value: null, `false`, zero and empty string.
pub fn is_falsy_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(val) => !val,
        Value::Number(val) => val.as_f64().is_some_and(|n| n == 0.0),
        Value::String(val) => val.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Plain string conversion of a raw cell value.
///
/// Integral numbers print without a fractional part, arrays join their
/// elements with `,` (null elements render empty), objects render as compact
/// JSON.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(val) => val.to_string(),
        Value::Number(val) => {
            if let Some(n) = val.as_i64() {
                n.to_string()
            } else if let Some(n) = val.as_u64() {
                n.to_string()
            } else if let Some(n) = val.as_f64() {
                stringify_f64(n)
            } else {
                val.to_string()
            }
        }
        Value::String(val) => val.clone(),
        Value::Array(vals) => vals
            .iter()
            .map(stringify_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Shortest round-trip text of `n`, switching to exponent form outside
/// `[1e-6, 1e21)` the way number-to-string does in a browser.
fn stringify_f64(n: f64) -> String {
    let n_abs = n.abs();
    if n_abs == 0.0 || !n.is_finite() || (1e-6..1e21).contains(&n_abs) {
        return format!("{n}");
    }
    let c_exp = format!("{n:e}");
    match c_exp.split_once('e') {
        Some((c_mantissa, c_power)) if !c_power.starts_with('-') => {
            format!("{c_mantissa}e+{c_power}")
        }
        _ => c_exp,
    }
}

/// Default value mapper: falsy values become `""`, the rest are stringified.
pub fn map_cell_value_default(value: &Value) -> String {
    if is_falsy_value(value) {
        return String::new();
    }
    stringify_value(value)
}

/// Render the cell of `column` for `row`.
///
/// A missing key, or a row that is not an object, reads as null.
pub fn derive_cell_text(row: &Value, column: &SpecColumn) -> String {
    let value = row.get(&column.key).unwrap_or(&Value::Null);
    match &column.value_mapper {
        Some(mapper) => mapper(value),
        None => map_cell_value_default(value),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FileNameResolution

/// Whether `file_name` carries an extension, i.e. contains `.` anywhere.
pub fn has_file_extension(file_name: &str) -> bool {
    file_name.contains('.')
}

/// Short file stem from a generated identifier (its first `-` group).
pub fn derive_file_id(raw_id: &str) -> String {
    raw_id
        .split('-')
        .next()
        .unwrap_or(raw_id)
        .chars()
        .take(N_LEN_FILE_ID)
        .collect()
}

/// Pick the download file name: explicit > default > generated id.
///
/// Empty names count as absent. `.xlsx` is appended when the chosen name has
/// no `.` in it.
pub fn resolve_download_file_name(
    file_name: Option<&str>,
    file_name_default: Option<&str>,
    generate_id: impl FnOnce() -> String,
) -> String {
    let c_file_name = file_name
        .filter(|name| !name.is_empty())
        .or_else(|| file_name_default.filter(|name| !name.is_empty()))
        .map(ToString::to_string)
        .unwrap_or_else(|| derive_file_id(&generate_id()));

    if has_file_extension(&c_file_name) {
        c_file_name
    } else {
        format!("{c_file_name}{C_EXT_XLSX}")
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Excel-safe, workbook-unique worksheet name for `name`.
///
/// Illegal characters become `_`, surrounding blanks are trimmed, an empty
/// result falls back to `Sheet`, and the name is cut to the Excel length
/// limit. A name already in `existing` (compared case-insensitively, as Excel
/// does) gets a `__2`, `__3`, ... suffix; the base is shortened by the full
/// suffix length so suffixes are never cut off. The returned name is recorded
/// in `existing`.
pub fn derive_excel_sheet_name(name: &str, existing: &mut BTreeSet<String>) -> String {
    let c_cleaned: String = name
        .chars()
        .map(|chr| if TUP_EXCEL_ILLEGAL.contains(&chr) { '_' } else { chr })
        .collect();
    let c_base = match c_cleaned.trim() {
        "" => "Sheet",
        c_trimmed => c_trimmed,
    };

    let c_name = truncate_chars(c_base, N_LEN_EXCEL_SHEET_NAME_MAX);
    if existing.insert(c_name.to_lowercase()) {
        return c_name;
    }

    let mut n_idx = 2usize;
    loop {
        let c_suffix = format!("__{n_idx}");
        let n_len_base = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_suffix.len());
        let candidate = format!("{}{c_suffix}", truncate_chars(c_base, n_len_base));
        if existing.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n_idx += 1;
    }
}

fn truncate_chars(text: &str, n_chars_max: usize) -> String {
    text.chars().take(n_chars_max).collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region IndexCasting

/// Cast a zero-based row index to the writer's row type.
pub fn cast_row_num(value: usize) -> Result<u32, ExcelExportError> {
    u32::try_from(value)
        .map_err(|_| ExcelExportError::IndexOverflow(format!("row index overflow: {value}")))
}

/// Cast a zero-based column index to the writer's column type.
pub fn cast_col_num(value: usize) -> Result<u16, ExcelExportError> {
    u16::try_from(value)
        .map_err(|_| ExcelExportError::IndexOverflow(format!("column index overflow: {value}")))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
