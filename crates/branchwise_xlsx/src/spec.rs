//! Shared branch-wise models, options and errors.

use std::collections::BTreeMap;

use polars::prelude::{DataFrame, IdxSize};

use crate::conf::{
    C_COLUMN_GROUP, C_LABEL_TOTAL, C_MISSING_KEY, C_SUBJECT_PLACEHOLDER, EnumFmtKey,
    N_WIDTH_OVERVIEW_COLUMN, select_default_xlsx_format,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell style specification; `None` fields inherit from the format it is merged onto.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Bold-only style.
    pub fn bold() -> Self {
        Self {
            bold: Some(true),
            ..Default::default()
        }
    }

    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

/// Normalized cell value during conversion/write pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<usize> for EnumCellValue {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DocumentModel

/// One explicit cell write at a zero-based coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecSheetCell {
    /// Zero-based row index.
    pub row: u32,
    /// Zero-based column index.
    pub col: u16,
    /// Scalar cell value.
    pub value: EnumCellValue,
    /// Optional style; `None` writes an unstyled cell.
    pub format: Option<SpecCellFormat>,
}

impl SpecSheetCell {
    /// Unstyled cell.
    pub fn new(row: u32, col: u16, value: impl Into<EnumCellValue>) -> Self {
        Self {
            row,
            col,
            value: value.into(),
            format: None,
        }
    }

    /// Attach a style.
    pub fn with_format(mut self, format: SpecCellFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// Role of one sheet inside a branch-wise document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumSheetKind {
    /// Summary sheet, first in the document.
    Overview,
    /// Every normalized record.
    AllData,
    /// Records of one category.
    Category {
        /// Category key the sheet was derived from.
        key: String,
    },
}

/// Sheet payload.
#[derive(Debug, Clone)]
pub enum EnumSheetContent {
    /// Records rendered under a header row of column names.
    Table(DataFrame),
    /// Explicit cell writes at fixed coordinates.
    Cells(Vec<SpecSheetCell>),
}

/// One named sheet of a [`SpecDocument`].
#[derive(Debug, Clone)]
pub struct SpecSheet {
    /// Unique, Excel-legal sheet name.
    pub sheet_name: String,
    /// Sheet role.
    pub kind: EnumSheetKind,
    /// Sheet payload.
    pub content: EnumSheetContent,
    /// Fixed column widths keyed by zero-based column index.
    pub column_widths: BTreeMap<u16, f64>,
}

impl SpecSheet {
    /// Number of records (table sheets) or explicit cells (grid sheets).
    pub fn height(&self) -> usize {
        match &self.content {
            EnumSheetContent::Table(df) => df.height(),
            EnumSheetContent::Cells(cells) => cells.len(),
        }
    }

    /// Borrow the table payload, if any.
    pub fn table(&self) -> Option<&DataFrame> {
        match &self.content {
            EnumSheetContent::Table(df) => Some(df),
            EnumSheetContent::Cells(_) => None,
        }
    }

    /// Borrow the explicit cells, if any.
    pub fn cells(&self) -> Option<&[SpecSheetCell]> {
        match &self.content {
            EnumSheetContent::Table(_) => None,
            EnumSheetContent::Cells(cells) => Some(cells),
        }
    }
}

/// Ordered multi-sheet output for one input.
#[derive(Debug, Clone)]
pub struct SpecDocument {
    /// Display name of the input the document was built from.
    pub display_name: String,
    /// Sheets in workbook order.
    pub sheets: Vec<SpecSheet>,
}

impl SpecDocument {
    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.sheet_name.as_str()).collect()
    }

    /// Find a sheet by exact name.
    pub fn sheet(&self, sheet_name: &str) -> Option<&SpecSheet> {
        self.sheets.iter().find(|s| s.sheet_name == sheet_name)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CategoryModel

/// One category key plus the source-row indices that carry it, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCategoryGroup {
    /// Normalized category key.
    pub key: String,
    /// Zero-based row indices into the normalized table.
    pub row_indices: Vec<IdxSize>,
}

impl SpecCategoryGroup {
    /// Number of rows in this group.
    pub fn len(&self) -> usize {
        self.row_indices.len()
    }

    /// Whether the group holds no rows.
    pub fn is_empty(&self) -> bool {
        self.row_indices.is_empty()
    }
}

/// Partition result: normalized table plus groups in first-seen order.
#[derive(Debug, Clone)]
pub struct SpecPartition {
    /// Table whose grouping column holds category keys.
    pub df_normalized: DataFrame,
    /// Groups in first-seen key order.
    pub groups: Vec<SpecCategoryGroup>,
}

/// One `(label, count)` row of the summary count table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCountRow {
    /// Category key or [`C_LABEL_TOTAL`].
    pub label: String,
    /// Row count.
    pub count: usize,
}

impl SpecCountRow {
    /// Whether this is the trailing total row.
    pub fn is_total(&self) -> bool {
        self.label == C_LABEL_TOTAL
    }
}

/// Ordering of category rows in the count table. The total row is always last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumCountOrder {
    /// Descending count; ties keep first-seen order (default).
    #[default]
    Frequency,
    /// First-seen order, same as sheet emission.
    FirstSeen,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Value conversion policy for missing/NaN/Inf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxValuePolicy {
    /// Replacement text for missing value when keep-missing is enabled.
    pub missing_value_str: String,
    /// Replacement text for NaN.
    pub nan_str: String,
    /// Replacement text for positive infinity.
    pub posinf_str: String,
    /// Replacement text for negative infinity.
    pub neginf_str: String,
}

impl Default for SpecXlsxValuePolicy {
    fn default() -> Self {
        Self {
            missing_value_str: "NA".to_string(),
            nan_str: "NaN".to_string(),
            posinf_str: "Inf".to_string(),
            neginf_str: "-Inf".to_string(),
        }
    }
}

/// Autofit rule for data-sheet column width inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumAutofitColumnsRule {
    /// Leave Excel's default widths (default).
    #[default]
    None,
    /// Infer width from header cells only.
    Header,
    /// Infer width from both header and body cells.
    All,
}

/// Autofit policy for data sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Autofit width inference rule.
    pub rule_columns: EnumAutofitColumnsRule,
    /// Max body rows inspected when body-based inference is active.
    pub height_body_inferred_max: Option<usize>,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            rule_columns: EnumAutofitColumnsRule::None,
            height_body_inferred_max: Some(20_000),
            width_cell_min: 8,
            width_cell_max: 60,
            width_cell_padding: 2,
        }
    }
}

/// Writer options for rendering a [`SpecDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxWriteOptions {
    /// Value conversion policy.
    pub value_policy: SpecXlsxValuePolicy,
    /// Keep missing/NaN/Inf as text instead of blank.
    pub keep_missing_values: bool,
    /// Autofit policy applied to table sheets.
    pub policy_autofit: SpecAutofitCellsPolicy,
    /// Data-sheet text cells.
    pub fmt_text: SpecCellFormat,
    /// Data-sheet integer cells.
    pub fmt_integer: SpecCellFormat,
    /// Data-sheet decimal cells.
    pub fmt_decimal: SpecCellFormat,
    /// Data-sheet header row.
    pub fmt_header: SpecCellFormat,
}

impl Default for SpecXlsxWriteOptions {
    fn default() -> Self {
        Self {
            value_policy: SpecXlsxValuePolicy::default(),
            keep_missing_values: false,
            policy_autofit: SpecAutofitCellsPolicy::default(),
            fmt_text: select_default_xlsx_format(EnumFmtKey::Text),
            fmt_integer: select_default_xlsx_format(EnumFmtKey::Integer),
            fmt_decimal: select_default_xlsx_format(EnumFmtKey::Decimal),
            fmt_header: select_default_xlsx_format(EnumFmtKey::Header),
        }
    }
}

/// Pipeline-wide options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBranchWiseOptions {
    /// Grouping column, matched exactly and case-sensitively.
    pub column_group: String,
    /// Text written to the summary's subject field.
    pub subject_name: String,
    /// CSV field separator.
    pub separator: u8,
    /// Category key used for missing grouping values.
    pub missing_key_str: String,
    /// Count table ordering.
    pub rule_count_order: EnumCountOrder,
    /// Width of the summary's first two columns.
    pub width_overview_column: u16,
    /// Workbook rendering options.
    pub write_options: SpecXlsxWriteOptions,
}

impl Default for SpecBranchWiseOptions {
    fn default() -> Self {
        Self {
            column_group: C_COLUMN_GROUP.to_string(),
            subject_name: C_SUBJECT_PLACEHOLDER.to_string(),
            separator: b',',
            missing_key_str: C_MISSING_KEY.to_string(),
            rule_count_order: EnumCountOrder::Frequency,
            width_overview_column: N_WIDTH_OVERVIEW_COLUMN,
            write_options: SpecXlsxWriteOptions::default(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// One emitted sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetReport {
    /// Final sheet name.
    pub sheet_name: String,
    /// Sheet role.
    pub kind: EnumSheetKind,
    /// Record count (table sheets) or cell count (grid sheets).
    pub height: usize,
}

/// Per-input report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecBranchWiseReport {
    /// Sheets in workbook order.
    pub sheets: Vec<SpecSheetReport>,
    /// Count table as written to the summary.
    pub counts: Vec<SpecCountRow>,
    /// Non-fatal warnings (renamed or truncated sheets).
    pub warnings: Vec<String>,
}

impl SpecBranchWiseReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region InputsAndOutcomes

/// One uploaded item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecInputFile {
    /// File name as uploaded, extension included.
    pub file_name: String,
    /// Raw content.
    pub content: Vec<u8>,
}

impl SpecInputFile {
    /// Bundle a name and its bytes.
    pub fn new(file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }
}

/// Finished workbook for one input.
#[derive(Debug, Clone)]
pub struct SpecBranchWiseOutput {
    /// Uploaded file name.
    pub source_name: String,
    /// Input name without its final extension.
    pub display_name: String,
    /// `BranchWise_<display name>.xlsx`.
    pub file_name: String,
    /// Serialized workbook.
    pub content: Vec<u8>,
    /// Sheets, counts and warnings.
    pub report: SpecBranchWiseReport,
}

impl SpecBranchWiseOutput {
    /// Success notice for the presentation layer.
    pub fn notice(&self) -> String {
        format!("Processed: {}", self.source_name)
    }
}

/// Tagged per-input result of a batch run.
#[derive(Debug)]
pub enum EnumInputOutcome {
    /// Workbook produced.
    Success(SpecBranchWiseOutput),
    /// Input rejected or failed.
    Failure {
        /// Uploaded file name.
        source_name: String,
        /// Cause.
        error: BranchWiseError,
    },
}

impl EnumInputOutcome {
    /// Uploaded file name, either way.
    pub fn source_name(&self) -> &str {
        match self {
            Self::Success(output) => &output.source_name,
            Self::Failure { source_name, .. } => source_name,
        }
    }

    /// Whether a workbook was produced.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Human-readable line for the presentation layer.
    pub fn message(&self) -> String {
        match self {
            Self::Success(output) => output.notice(),
            Self::Failure { error, .. } => error.to_string(),
        }
    }
}

/// Per-input failure kinds.
#[derive(Debug, thiserror::Error)]
pub enum BranchWiseError {
    /// Content is not readable as delimited tabular data.
    #[error("Error processing {source_name}: {message}")]
    Parse {
        /// Uploaded file name.
        source_name: String,
        /// Underlying reader error text.
        message: String,
    },
    /// Required grouping column absent.
    #[error("Column '{column}' not found in {source_name}. Skipping.")]
    MissingColumn {
        /// Uploaded file name.
        source_name: String,
        /// Required column name.
        column: String,
    },
    /// Group or count totals disagree with the table; indicates a defect.
    #[error(
        "Internal consistency fault while processing {source_name}: \
         {n_rows_counted} rows counted, {n_rows_table} rows in table"
    )]
    InternalConsistency {
        /// Uploaded file name.
        source_name: String,
        /// Rows in the normalized table.
        n_rows_table: usize,
        /// Rows accounted for by groups or counts.
        n_rows_counted: usize,
    },
    /// Workbook serializer rejected the document.
    #[error("Error processing {source_name}: {message}")]
    Render {
        /// Uploaded file name.
        source_name: String,
        /// Serializer error text.
        message: String,
    },
}

impl BranchWiseError {
    /// Whether the failure stems from the input rather than a defect.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::InternalConsistency { .. })
    }

    /// Uploaded file name the error refers to.
    pub fn source_name(&self) -> &str {
        match self {
            Self::Parse { source_name, .. }
            | Self::MissingColumn { source_name, .. }
            | Self::InternalConsistency { source_name, .. }
            | Self::Render { source_name, .. } => source_name,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
