//! Test helpers reading generated workbooks back.

use std::io::Cursor;

use calamine::{Reader, Xlsx, open_workbook_from_rs};

/// `(sheet_name, rows)` per worksheet in workbook order, cells as text.
pub fn read_workbook(v_bytes: &[u8]) -> Vec<(String, Vec<Vec<String>>)> {
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(Cursor::new(v_bytes.to_vec())).expect("readable xlsx buffer");

    workbook
        .sheet_names()
        .into_iter()
        .map(|sheet_name| {
            let range = workbook
                .worksheet_range(&sheet_name)
                .expect("worksheet present");
            let l_rows = range
                .rows()
                .map(|row| row.iter().map(ToString::to_string).collect())
                .collect();
            (sheet_name, l_rows)
        })
        .collect()
}
