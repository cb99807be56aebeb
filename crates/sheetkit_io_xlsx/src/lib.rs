//! `sheetkit_io_xlsx` v1:
//! In-memory workbook builder with an injected download step.
//!
//! Modules:
//! - `conf`     : constants and default presets
//! - `spec`     : specs/models/options/errors
//! - `util`     : pure helper functions
//! - `writer`   : `rust_xlsxwriter` serialization kernel
//! - `download` : blob registry, file-save sinks, id source
//! - `frame`    : row sources (serde values, polars DataFrames)
//! - `builder`  : fluent `WorkbookBuilder`
pub mod builder;
pub mod conf;
pub mod download;
pub mod frame;
pub mod spec;
pub mod util;
pub mod writer;

#[cfg(test)]
mod testing;

pub use builder::{WorkbookBuilder, excel};
pub use conf::{C_EXT_XLSX, C_MIME_XLSX, N_LEN_EXCEL_SHEET_NAME_MAX};
pub use download::{
    BlobRegistry, DirectorySaveSink, FileSaveSink, IdSource, MemoryBlobRegistry, MemorySaveSink,
    ObjectUrlGuard, SpecSavedFile, UuidIdSource,
};
pub use frame::{rows_from_dataframe, rows_from_ipc_bytes, rows_from_serializable};
pub use spec::{
    EnumMissingSheetPolicy, ExcelExportError, SpecBlob, SpecColumn, SpecDownloadReport,
    SpecExcelOptions, SpecRowBatch, SpecSheet, SpecSheetData, SpecSheetSummary, ValueMapper,
};
pub use util::{map_cell_value_default, resolve_download_file_name};
pub use writer::{XlsxWorkbookWriter, write_workbook_buffer};
