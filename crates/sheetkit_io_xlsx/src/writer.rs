//! XLSX writer kernel that renders registered sheets into a workbook buffer.

use std::collections::BTreeSet;

use rust_xlsxwriter::{Workbook, Worksheet};
use tracing::{debug, warn};

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::spec::{ExcelExportError, SpecDownloadReport, SpecSheet, SpecSheetSummary};
use crate::util::{cast_col_num, cast_row_num, derive_cell_text, derive_excel_sheet_name};

/// Stateful workbook writer.
///
/// The workbook is buffered in memory until [`Self::finish`] serializes it.
pub struct XlsxWorkbookWriter {
    workbook: Workbook,
    if_sanitize_sheet_names: bool,
    set_sheet_names_existing: BTreeSet<String>,
    report: SpecDownloadReport,
}

impl XlsxWorkbookWriter {
    /// Create an empty writer.
    ///
    /// With `if_sanitize_sheet_names` unset, sheet names reach the
    /// serialization library verbatim and invalid ones fail the write.
    pub fn new(if_sanitize_sheet_names: bool) -> Self {
        Self {
            workbook: Workbook::new(),
            if_sanitize_sheet_names,
            set_sheet_names_existing: BTreeSet::new(),
            report: SpecDownloadReport::default(),
        }
    }

    /// Append one worksheet: header row from column names, then mapped rows.
    pub fn write_sheet(&mut self, sheet: &SpecSheet) -> Result<(), ExcelExportError> {
        validate_sheet_extent(sheet)?;

        let c_sheet_name = self.derive_sheet_name(&sheet.sheet_name);
        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(&c_sheet_name)?;

        write_header(worksheet, sheet)?;
        write_body(worksheet, sheet)?;

        debug!(
            sheet_name = %c_sheet_name,
            n_rows = sheet.rows.len(),
            n_cols = sheet.columns.len(),
            "worksheet written"
        );
        self.report.sheets.push(SpecSheetSummary {
            sheet_name: c_sheet_name,
            n_rows: sheet.rows.len(),
            n_cols: sheet.columns.len(),
        });
        Ok(())
    }

    /// Serialize the workbook and return its bytes with the write report.
    ///
    /// The report's `file_name` is left empty; naming belongs to the caller.
    pub fn finish(mut self) -> Result<(Vec<u8>, SpecDownloadReport), ExcelExportError> {
        let v_bytes = self.workbook.save_to_buffer()?;
        self.report.n_bytes = v_bytes.len();
        Ok((v_bytes, self.report))
    }

    fn derive_sheet_name(&mut self, sheet_name: &str) -> String {
        if !self.if_sanitize_sheet_names {
            return sheet_name.to_string();
        }

        let c_sheet_name = derive_excel_sheet_name(sheet_name, &mut self.set_sheet_names_existing);
        if c_sheet_name != sheet_name {
            warn!(sheet_name, renamed = %c_sheet_name, "sheet name rewritten for Excel");
            self.report
                .warn(format!("Sheet {sheet_name:?} written as {c_sheet_name:?}."));
        }
        c_sheet_name
    }
}

/// Render `sheets` in order into one `.xlsx` buffer.
pub fn write_workbook_buffer(
    sheets: &[SpecSheet],
    if_sanitize_sheet_names: bool,
) -> Result<(Vec<u8>, SpecDownloadReport), ExcelExportError> {
    let mut writer = XlsxWorkbookWriter::new(if_sanitize_sheet_names);
    for sheet in sheets {
        writer.write_sheet(sheet)?;
    }
    writer.finish()
}

fn validate_sheet_extent(sheet: &SpecSheet) -> Result<(), ExcelExportError> {
    let n_rows = sheet.rows.len() + 1;
    let n_cols = sheet.columns.len();
    if n_rows > N_NROWS_EXCEL_MAX || n_cols > N_NCOLS_EXCEL_MAX {
        return Err(ExcelExportError::ExcelLimitExceeded {
            sheet_name: sheet.sheet_name.clone(),
            n_rows,
            n_cols,
        });
    }
    Ok(())
}

fn write_header(worksheet: &mut Worksheet, sheet: &SpecSheet) -> Result<(), ExcelExportError> {
    for (col_idx, column) in sheet.columns.iter().enumerate() {
        write_text(worksheet, 0, col_idx, &column.column_name)?;
    }
    Ok(())
}

fn write_body(worksheet: &mut Worksheet, sheet: &SpecSheet) -> Result<(), ExcelExportError> {
    for (col_idx, column) in sheet.columns.iter().enumerate() {
        for (row_idx, row) in sheet.rows.iter().enumerate() {
            write_text(worksheet, row_idx + 1, col_idx, &derive_cell_text(row, column))?;
        }
    }
    Ok(())
}

// Empty text leaves the cell blank.
fn write_text(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    text: &str,
) -> Result<(), ExcelExportError> {
    if text.is_empty() {
        return Ok(());
    }
    worksheet.write_string(cast_row_num(row_idx)?, cast_col_num(col_idx)?, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::spec::SpecColumn;
    use crate::testing::read_workbook;

    fn derive_users_sheet() -> SpecSheet {
        SpecSheet {
            sheet_name: "Users".to_string(),
            columns: vec![
                SpecColumn::new("Name", "name"),
                SpecColumn::new("Age", "age").with_value_mapper(|v| format!("{v}y")),
            ],
            rows: vec![json!({"name": "Ann", "age": 30})],
        }
    }

    #[test]
    fn test_write_workbook_buffer_renders_header_and_mapped_rows() {
        let (v_bytes, report) = write_workbook_buffer(&[derive_users_sheet()], false).unwrap();

        assert_eq!(report.n_bytes, v_bytes.len());
        assert_eq!(
            report.sheets,
            vec![SpecSheetSummary {
                sheet_name: "Users".to_string(),
                n_rows: 1,
                n_cols: 2,
            }]
        );

        let l_sheets = read_workbook(&v_bytes);
        assert_eq!(l_sheets.len(), 1);
        assert_eq!(l_sheets[0].0, "Users");
        assert_eq!(
            l_sheets[0].1,
            vec![
                vec!["Name".to_string(), "Age".to_string()],
                vec!["Ann".to_string(), "30y".to_string()],
            ]
        );
    }

    #[test]
    fn test_write_workbook_buffer_leaves_falsy_cells_blank() {
        let sheet = SpecSheet {
            sheet_name: "Flags".to_string(),
            columns: vec![SpecColumn::new("Id", "id"), SpecColumn::new("On", "on")],
            rows: vec![json!({"id": 1, "on": false}), json!({"id": 2, "on": true})],
        };

        let (v_bytes, _) = write_workbook_buffer(&[sheet], false).unwrap();
        let l_sheets = read_workbook(&v_bytes);
        assert_eq!(
            l_sheets[0].1,
            vec![
                vec!["Id".to_string(), "On".to_string()],
                vec!["1".to_string(), "".to_string()],
                vec!["2".to_string(), "true".to_string()],
            ]
        );
    }

    #[test]
    fn test_write_workbook_buffer_rejects_invalid_name_without_sanitize() {
        let mut sheet = derive_users_sheet();
        sheet.sheet_name = "Q1/Q2".to_string();

        let err = write_workbook_buffer(&[sheet], false).unwrap_err();
        assert!(matches!(err, ExcelExportError::Xlsx(_)));
    }

    #[test]
    fn test_write_workbook_buffer_sanitizes_and_reports_renames() {
        let mut sheet_a = derive_users_sheet();
        sheet_a.sheet_name = "Q1/Q2".to_string();
        let mut sheet_b = derive_users_sheet();
        sheet_b.sheet_name = "Q1:Q2".to_string();

        let (v_bytes, report) = write_workbook_buffer(&[sheet_a, sheet_b], true).unwrap();

        let l_names: Vec<&str> = report.sheets.iter().map(|s| s.sheet_name.as_str()).collect();
        assert_eq!(l_names, vec!["Q1_Q2", "Q1_Q2__2"]);
        assert_eq!(report.warnings.len(), 2);

        let l_sheets = read_workbook(&v_bytes);
        assert_eq!(l_sheets[1].0, "Q1_Q2__2");
    }

    #[test]
    fn test_write_workbook_buffer_sanitizes_colliding_long_names() {
        let c_sheet_name = "y".repeat(40);
        let l_sheets: Vec<SpecSheet> = (0..12)
            .map(|_| {
                let mut sheet = derive_users_sheet();
                sheet.sheet_name = c_sheet_name.clone();
                sheet
            })
            .collect();

        let (v_bytes, report) = write_workbook_buffer(&l_sheets, true).unwrap();

        let l_names: Vec<String> = read_workbook(&v_bytes)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(l_names.len(), 12);
        assert_eq!(l_names[0], "y".repeat(31));
        assert_eq!(l_names[11], format!("{}__12", "y".repeat(27)));
        assert_eq!(report.warnings.len(), 12);
    }

    #[test]
    fn test_write_sheet_with_no_rows_writes_header_only() {
        let mut sheet = derive_users_sheet();
        sheet.rows.clear();

        let (v_bytes, report) = write_workbook_buffer(&[sheet], false).unwrap();
        assert_eq!(report.sheets[0].n_rows, 0);
        assert_eq!(
            read_workbook(&v_bytes)[0].1,
            vec![vec!["Name".to_string(), "Age".to_string()]]
        );
    }
}
