//! `branchwise_xlsx` v1:
//! Split a tabular export by its branch column into one XLSX workbook.
//!
//! Stages, one module each:
//! - `loader`    : delimited bytes -> dataframe
//! - `partition` : grouping column validation and category partitioning
//! - `count`     : per-category counts with a trailing total
//! - `assemble`  : sheet plan (`Overview`, `All Data`, one sheet per category)
//! - `summary`   : overview sheet layout
//! - `writer`    : pure-Rust XLSX writer kernel
//! - `pipeline`  : per-input orchestration and batch runner
//!
//! Shared pieces:
//! - `conf` : constants and default presets
//! - `spec` : specs/models/options/errors
//! - `util` : pure helper functions
pub mod assemble;
pub mod conf;
pub mod count;
pub mod loader;
pub mod partition;
pub mod pipeline;
pub mod spec;
pub mod summary;
pub mod util;
pub mod writer;

pub use conf::{C_COLUMN_GROUP, C_SUBJECT_PLACEHOLDER, N_LEN_EXCEL_SHEET_NAME_MAX};
pub use pipeline::{process_batch, process_input};
pub use spec::{
    BranchWiseError, EnumCountOrder, EnumInputOutcome, SpecBranchWiseOptions,
    SpecBranchWiseOutput, SpecBranchWiseReport, SpecInputFile, SpecXlsxWriteOptions,
};
pub use writer::{XlsxWriter, render_document};
