//! Shared sheet/workbook specification models and the crate error type.

use std::fmt;
use std::sync::Arc;

use polars::prelude::PolarsError;
use rust_xlsxwriter::XlsxError;
use serde_json::Value;
use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region ColumnSpecification

/// Converts one raw cell value into its display string.
pub type ValueMapper = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Declarative mapping from a row field to one rendered column.
#[derive(Clone)]
pub struct SpecColumn {
    /// Header text written in the first row.
    pub column_name: String,
    /// Row field that supplies the cell value.
    pub key: String,
    /// Custom stringification; the falsy-aware default is used when `None`.
    pub value_mapper: Option<ValueMapper>,
}

impl SpecColumn {
    /// Column using the default value mapper.
    pub fn new(column_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            key: key.into(),
            value_mapper: None,
        }
    }

    /// Return the column with `mapper` as its value mapper.
    pub fn with_value_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.value_mapper = Some(Arc::new(mapper));
        self
    }
}

impl fmt::Debug for SpecColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecColumn")
            .field("column_name", &self.column_name)
            .field("key", &self.key)
            .field("value_mapper", &self.value_mapper.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetSpecification

/// Caller-facing sheet definition; `rows` defaults to empty.
#[derive(Debug, Clone)]
pub struct SpecSheetData {
    /// Unique sheet name, also used as worksheet name.
    pub sheet_name: String,
    /// Ordered column mapping.
    pub columns: Vec<SpecColumn>,
    /// Initial rows.
    pub rows: Option<Vec<Value>>,
}

impl SpecSheetData {
    /// Sheet definition without rows.
    pub fn new(sheet_name: impl Into<String>, columns: Vec<SpecColumn>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            columns,
            rows: None,
        }
    }

    /// Return the definition with initial `rows`.
    pub fn with_rows(mut self, rows: Vec<Value>) -> Self {
        self.rows = Some(rows);
        self
    }
}

/// Registered sheet held by the builder.
#[derive(Debug, Clone)]
pub struct SpecSheet {
    /// Unique sheet name.
    pub sheet_name: String,
    /// Ordered column mapping.
    pub columns: Vec<SpecColumn>,
    /// Row objects in output order.
    pub rows: Vec<Value>,
}

impl From<SpecSheetData> for SpecSheet {
    fn from(data: SpecSheetData) -> Self {
        Self {
            sheet_name: data.sheet_name,
            columns: data.columns,
            rows: data.rows.unwrap_or_default(),
        }
    }
}

/// Rows handed to `append_rows`: one row or a batch.
///
/// A JSON array converts into a batch of its elements; any other value is a
/// single row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecRowBatch(pub Vec<Value>);

impl From<Value> for SpecRowBatch {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(rows) => Self(rows),
            row => Self(vec![row]),
        }
    }
}

impl From<Vec<Value>> for SpecRowBatch {
    fn from(rows: Vec<Value>) -> Self {
        Self(rows)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// What `replace_rows`/`append_rows` do with an unregistered sheet name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumMissingSheetPolicy {
    /// Log the failure and keep chaining (default).
    #[default]
    Log,
    /// Log, remember the name, and fail the next download.
    Defer,
}

/// Builder-wide options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecExcelOptions {
    /// File name used when `download` gets none.
    pub file_name_default: Option<String>,
    /// Missing-sheet handling for the chaining mutators.
    pub missing_sheet_policy: EnumMissingSheetPolicy,
    /// Rewrite illegal/too-long sheet names instead of failing serialization.
    pub if_sanitize_sheet_names: bool,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DownloadModels

/// Serialized workbook with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBlob {
    /// Raw file bytes.
    pub bytes: Vec<u8>,
    /// MIME type announced to the sink.
    pub mime_type: String,
}

/// Per-worksheet summary of one serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetSummary {
    /// Worksheet name as written.
    pub sheet_name: String,
    /// Data rows written (header excluded).
    pub n_rows: usize,
    /// Columns written.
    pub n_cols: usize,
}

/// Result of one `download` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecDownloadReport {
    /// Resolved file name handed to the sink.
    pub file_name: String,
    /// Size of the serialized workbook.
    pub n_bytes: usize,
    /// Worksheets in output order.
    pub sheets: Vec<SpecSheetSummary>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecDownloadReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Errors raised while building, serializing or saving a workbook.
#[derive(Debug, Error)]
pub enum ExcelExportError {
    /// `replace_rows`/`append_rows` targeted an unregistered sheet.
    #[error("Sheet not found: {0:?}")]
    SheetNotFound(String),
    /// Deferred missing-sheet failures reported at download time.
    #[error("Rows were targeted at undefined sheets: {0:?}")]
    MissingSheets(Vec<String>),
    /// Sheet does not fit into one Excel worksheet.
    #[error(
        "Excel limit overflow in sheet {sheet_name:?}: {n_rows} rows x {n_cols} columns (header included)"
    )]
    ExcelLimitExceeded {
        /// Offending sheet.
        sheet_name: String,
        /// Rows including the header row.
        n_rows: usize,
        /// Columns.
        n_cols: usize,
    },
    /// Row/column index does not fit Excel's index types.
    #[error("{0}")]
    IndexOverflow(String),
    /// Serialization library failure.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] XlsxError),
    /// DataFrame access/decoding failure.
    #[error("dataframe conversion error: {0}")]
    Frame(#[from] PolarsError),
    /// Row serialization failure.
    #[error("row serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// Sink asked for an object URL the registry does not hold.
    #[error("Object URL not registered: {0}")]
    BlobNotFound(String),
    /// Sink could not persist the file.
    #[error("Failed to save {file_name:?}: {source}")]
    Save {
        /// Resolved file name.
        file_name: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
