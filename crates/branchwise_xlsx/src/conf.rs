//! Branch-wise workbook constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::SpecCellFormat;

/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];
/// Sheet name Excel reserves for itself (compared case-insensitively).
pub const C_EXCEL_RESERVED_SHEET_NAME: &str = "History";

/// Required grouping column.
pub const C_COLUMN_GROUP: &str = "Select Branch";
/// Summary sheet name (always the first sheet).
pub const C_SHEET_OVERVIEW: &str = "Overview";
/// Full-data sheet name (always the second sheet).
pub const C_SHEET_ALL_DATA: &str = "All Data";
/// Fallback used when a category key sanitizes to an empty sheet name.
pub const C_SHEET_NAME_BLANK: &str = "Blank";

/// Label of the trailing count row.
pub const C_LABEL_TOTAL: &str = "Total";
/// Default subject placeholder written to the summary sheet.
pub const C_SUBJECT_PLACEHOLDER: &str = "<Enter subject here>";
/// Text used as the category key of missing grouping values.
pub const C_MISSING_KEY: &str = "nan";

/// Output file name prefix; full name is `BranchWise_<display name>.xlsx`.
pub const C_OUTPUT_FILE_PREFIX: &str = "BranchWise_";
/// Output file extension.
pub const C_OUTPUT_FILE_EXTENSION: &str = "xlsx";

////////////////////////////////////////////////////////////////////////////////
// #region OverviewLayout

/// Summary title label.
pub const C_LABEL_OVERVIEW_TITLE: &str = "Overview";
/// Label next to the display name.
pub const C_LABEL_TEST_TITLE: &str = "Test Title:";
/// Label next to the subject placeholder.
pub const C_LABEL_SUBJECT_NAME: &str = "Subject Name:";
/// Section heading above the count table.
pub const C_LABEL_COUNT_SECTION: &str = "Branch-wise Count";
/// Count table header, first column.
pub const C_LABEL_COUNT_HEADER_KEY: &str = "Branch";
/// Count table header, second column.
pub const C_LABEL_COUNT_HEADER_VALUE: &str = "Count";

/// Zero-based row of the title cell (A1).
pub const N_ROW_OVERVIEW_TITLE: u32 = 0;
/// Zero-based row of the test-title field (row 3).
pub const N_ROW_OVERVIEW_TEST_TITLE: u32 = 2;
/// Zero-based row of the subject field (row 5).
pub const N_ROW_OVERVIEW_SUBJECT: u32 = 4;
/// Zero-based row of the count section heading (row 7).
pub const N_ROW_OVERVIEW_COUNT_SECTION: u32 = 6;
/// Zero-based row of the count table header (row 8).
pub const N_ROW_OVERVIEW_COUNT_HEADER: u32 = 7;
/// Zero-based row of the first count row (row 9).
pub const N_ROW_OVERVIEW_COUNT_START: u32 = 8;
/// Title font size in points.
pub const N_FONT_SIZE_OVERVIEW_TITLE: i64 = 16;
/// Fixed display width of overview columns A and B.
pub const N_WIDTH_OVERVIEW_COLUMN: u16 = 20;
/// Number of leading overview columns that get the fixed width.
pub const N_NCOLS_OVERVIEW_SIZED: u16 = 2;

// #endregion
////////////////////////////////////////////////////////////////////////////////

/// Canonical format preset keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumFmtKey {
    /// Generic text cell format.
    Text,
    /// Integer number format.
    Integer,
    /// Decimal number format.
    Decimal,
    /// Data-sheet header cell format.
    Header,
}

impl EnumFmtKey {
    /// Preset map key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Header => "header",
        }
    }
}

/// Build default named format presets used by [`crate::writer::XlsxWriter`].
///
/// Data cells keep Excel's general look so records read back unmodified; the
/// header row is bold, centered and thinly bordered.
pub fn derive_default_xlsx_formats() -> BTreeMap<String, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat::default();

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert(EnumFmtKey::Text.as_str().to_string(), cfg_base_fmt_spec.clone());
    dict_fmt.insert(
        EnumFmtKey::Header.as_str().to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            align: Some("center".to_string()),
            border: Some(1),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumFmtKey::Integer.as_str().to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumFmtKey::Decimal.as_str().to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("General".to_string()),
            ..Default::default()
        }),
    );

    dict_fmt
}

/// Look up one preset, falling back to an unstyled format.
pub fn select_default_xlsx_format(key: EnumFmtKey) -> SpecCellFormat {
    derive_default_xlsx_formats()
        .remove(key.as_str())
        .unwrap_or_default()
}
