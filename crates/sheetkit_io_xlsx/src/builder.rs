//! Fluent workbook builder: sheet registry, row mutation and download.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::conf::{C_MIME_XLSX, derive_default_excel_options};
use crate::download::{BlobRegistry, FileSaveSink, IdSource, ObjectUrlGuard, UuidIdSource};
use crate::spec::{
    EnumMissingSheetPolicy, ExcelExportError, SpecBlob, SpecColumn, SpecDownloadReport,
    SpecExcelOptions, SpecRowBatch, SpecSheet, SpecSheetData,
};
use crate::util::resolve_download_file_name;
use crate::writer::write_workbook_buffer;

/// In-memory workbook definition with chaining mutators.
///
/// Sheets keep their first definition position; redefining a name replaces
/// its columns and rows in place.
pub struct WorkbookBuilder {
    options: SpecExcelOptions,
    l_sheets: Vec<SpecSheet>,
    dict_sheet_idx: BTreeMap<String, usize>,
    l_sheet_names_missing: Vec<String>,
    id_source: Arc<dyn IdSource>,
}

impl WorkbookBuilder {
    /// Empty builder.
    pub fn new(options: SpecExcelOptions) -> Self {
        Self {
            options,
            l_sheets: Vec::new(),
            dict_sheet_idx: BTreeMap::new(),
            l_sheet_names_missing: Vec::new(),
            id_source: Arc::new(UuidIdSource),
        }
    }

    /// Builder pre-populated with `sheets` in order.
    pub fn with_sheets(
        options: SpecExcelOptions,
        sheets: impl IntoIterator<Item = SpecSheetData>,
    ) -> Self {
        let mut builder = Self::new(options);
        for sheet in sheets {
            builder.add_sheet(sheet);
        }
        builder
    }

    /// Replace the identifier source used for generated file names.
    pub fn with_id_source(mut self, id_source: Arc<dyn IdSource>) -> Self {
        self.id_source = id_source;
        self
    }

    /// Builder options.
    pub fn options(&self) -> &SpecExcelOptions {
        &self.options
    }

    /// Builder-level default file name.
    pub fn file_name_default(&self) -> Option<&str> {
        self.options.file_name_default.as_deref()
    }

    /// Sheet names in output order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.l_sheets
            .iter()
            .map(|sheet| sheet.sheet_name.as_str())
            .collect()
    }

    /// Registered sheet by name.
    pub fn sheet(&self, sheet_name: &str) -> Option<&SpecSheet> {
        self.dict_sheet_idx
            .get(sheet_name)
            .map(|n_idx| &self.l_sheets[*n_idx])
    }

    /// Sheet names recorded by failed mutations under
    /// [`EnumMissingSheetPolicy::Defer`].
    pub fn missing_sheets(&self) -> &[String] {
        &self.l_sheet_names_missing
    }

    /// Acknowledge the recorded misses so [`Self::download`] may run again.
    ///
    /// Defining the missing sheet afterwards does not clear the record by
    /// itself; the mutation that missed is not replayed.
    pub fn clear_missing_sheets(&mut self) -> &mut Self {
        self.l_sheet_names_missing.clear();
        self
    }

    /// Register a sheet. `rows` defaults to empty.
    pub fn define_sheet(
        &mut self,
        sheet_name: impl Into<String>,
        columns: Vec<SpecColumn>,
        rows: Option<Vec<Value>>,
    ) -> &mut Self {
        self.insert_sheet(SpecSheet {
            sheet_name: sheet_name.into(),
            columns,
            rows: rows.unwrap_or_default(),
        });
        self
    }

    /// Register a sheet from its caller-facing definition.
    pub fn add_sheet(&mut self, sheet: SpecSheetData) -> &mut Self {
        self.insert_sheet(sheet.into());
        self
    }

    /// Overwrite the rows of `sheet_name`.
    ///
    /// An undefined sheet is handled by the missing-sheet policy and never
    /// breaks the chain.
    pub fn replace_rows(&mut self, sheet_name: &str, rows: Vec<Value>) -> &mut Self {
        let result = self.set_sheet_rows(sheet_name, rows);
        self.handle_missing_sheet(sheet_name, result);
        self
    }

    /// Overwrite the rows of `sheet_name`, failing on an undefined sheet.
    pub fn try_replace_rows(
        &mut self,
        sheet_name: &str,
        rows: Vec<Value>,
    ) -> Result<&mut Self, ExcelExportError> {
        self.set_sheet_rows(sheet_name, rows)?;
        Ok(self)
    }

    /// Append one row or a batch after the existing rows of `sheet_name`.
    ///
    /// Same missing-sheet handling as [`Self::replace_rows`].
    pub fn append_rows(&mut self, sheet_name: &str, rows: impl Into<SpecRowBatch>) -> &mut Self {
        let result = self.extend_sheet_rows(sheet_name, rows.into());
        self.handle_missing_sheet(sheet_name, result);
        self
    }

    /// Append rows, failing on an undefined sheet.
    pub fn try_append_rows(
        &mut self,
        sheet_name: &str,
        rows: impl Into<SpecRowBatch>,
    ) -> Result<&mut Self, ExcelExportError> {
        self.extend_sheet_rows(sheet_name, rows.into())?;
        Ok(self)
    }

    /// Serialize all sheets in output order without downloading.
    pub fn write_buffer(&self) -> Result<(Vec<u8>, SpecDownloadReport), ExcelExportError> {
        write_workbook_buffer(&self.l_sheets, self.options.if_sanitize_sheet_names)
    }

    /// Serialize the workbook and hand it to `sink` under the resolved name.
    ///
    /// The blob is registered with `registry` only for the duration of the
    /// save call and revoked afterwards, also when the sink fails.
    ///
    /// Misses recorded under [`EnumMissingSheetPolicy::Defer`] fail every
    /// call with [`ExcelExportError::MissingSheets`] until they are cleared
    /// with [`Self::clear_missing_sheets`].
    pub fn download(
        &self,
        file_name: Option<&str>,
        registry: &dyn BlobRegistry,
        sink: &dyn FileSaveSink,
    ) -> Result<SpecDownloadReport, ExcelExportError> {
        if !self.l_sheet_names_missing.is_empty() {
            return Err(ExcelExportError::MissingSheets(
                self.l_sheet_names_missing.clone(),
            ));
        }

        let (v_bytes, mut report) = self.write_buffer()?;
        report.file_name = resolve_download_file_name(file_name, self.file_name_default(), || {
            self.id_source.generate_id()
        });

        let object_url = ObjectUrlGuard::create(
            registry,
            SpecBlob {
                bytes: v_bytes,
                mime_type: C_MIME_XLSX.to_string(),
            },
        );
        sink.save(registry, object_url.url(), &report.file_name)?;
        drop(object_url);

        debug!(
            file_name = %report.file_name,
            n_bytes = report.n_bytes,
            n_sheets = report.sheets.len(),
            "workbook downloaded"
        );
        Ok(report)
    }

    fn insert_sheet(&mut self, sheet: SpecSheet) {
        match self.dict_sheet_idx.get(&sheet.sheet_name).copied() {
            Some(n_idx) => {
                warn!(sheet_name = %sheet.sheet_name, "sheet redefined; previous definition replaced");
                self.l_sheets[n_idx] = sheet;
            }
            None => {
                self.dict_sheet_idx
                    .insert(sheet.sheet_name.clone(), self.l_sheets.len());
                self.l_sheets.push(sheet);
            }
        }
    }

    fn locate_sheet_mut(&mut self, sheet_name: &str) -> Result<&mut SpecSheet, ExcelExportError> {
        let n_idx = *self
            .dict_sheet_idx
            .get(sheet_name)
            .ok_or_else(|| ExcelExportError::SheetNotFound(sheet_name.to_string()))?;
        Ok(&mut self.l_sheets[n_idx])
    }

    fn set_sheet_rows(&mut self, sheet_name: &str, rows: Vec<Value>) -> Result<(), ExcelExportError> {
        self.locate_sheet_mut(sheet_name)?.rows = rows;
        Ok(())
    }

    fn extend_sheet_rows(
        &mut self,
        sheet_name: &str,
        rows: SpecRowBatch,
    ) -> Result<(), ExcelExportError> {
        self.locate_sheet_mut(sheet_name)?.rows.extend(rows.0);
        Ok(())
    }

    fn handle_missing_sheet(&mut self, sheet_name: &str, result: Result<(), ExcelExportError>) {
        let Err(err) = result else {
            return;
        };
        error!(sheet_name, error = %err, "rows not applied: sheet is not defined");
        if self.options.missing_sheet_policy == EnumMissingSheetPolicy::Defer {
            self.l_sheet_names_missing.push(sheet_name.to_string());
        }
    }
}

/// Create a builder with an optional default file name and initial sheets.
pub fn excel(
    file_name: Option<&str>,
    default_workbook: impl IntoIterator<Item = SpecSheetData>,
) -> WorkbookBuilder {
    WorkbookBuilder::with_sheets(
        SpecExcelOptions {
            file_name_default: file_name.map(ToString::to_string),
            ..derive_default_excel_options()
        },
        default_workbook,
    )
}
