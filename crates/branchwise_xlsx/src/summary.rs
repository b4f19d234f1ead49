//! Summary formatter for the `Overview` sheet.
//!
//! Layout is a pure function of (display name, subject, count rows). Coordinates
//! are fixed and form the contract for anything inspecting the workbook:
//!
//! | Row | A                     | B            |
//! |-----|-----------------------|--------------|
//! | 1   | `Overview` (bold, 16) |              |
//! | 3   | `Test Title:`         | display name |
//! | 5   | `Subject Name:`       | subject      |
//! | 7   | `Branch-wise Count`   |              |
//! | 8   | `Branch` (bold)       | `Count` (bold) |
//! | 9.. | label                 | count        |
//!
//! The trailing `Total` row is bold in both columns. Columns A and B get a fixed
//! width.

use std::collections::BTreeMap;

use crate::conf::{
    C_LABEL_COUNT_HEADER_KEY, C_LABEL_COUNT_HEADER_VALUE, C_LABEL_COUNT_SECTION,
    C_LABEL_OVERVIEW_TITLE, C_LABEL_SUBJECT_NAME, C_LABEL_TEST_TITLE, N_FONT_SIZE_OVERVIEW_TITLE,
    N_NCOLS_OVERVIEW_SIZED, N_ROW_OVERVIEW_COUNT_HEADER, N_ROW_OVERVIEW_COUNT_SECTION,
    N_ROW_OVERVIEW_COUNT_START, N_ROW_OVERVIEW_SUBJECT, N_ROW_OVERVIEW_TEST_TITLE,
    N_ROW_OVERVIEW_TITLE,
};
use crate::spec::{
    EnumSheetContent, EnumSheetKind, SpecCellFormat, SpecCountRow, SpecDocument, SpecSheetCell,
};

/// Planned writes for the overview sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecSummaryLayout {
    /// Cell writes in row-major order.
    pub cells: Vec<SpecSheetCell>,
    /// Column widths keyed by zero-based column index.
    pub column_widths: BTreeMap<u16, f64>,
}

/// Plan every overview write.
pub fn plan_summary_layout(
    display_name: &str,
    subject_name: &str,
    count_rows: &[SpecCountRow],
    width_column: u16,
) -> SpecSummaryLayout {
    let fmt_bold = SpecCellFormat::bold();
    let fmt_title = fmt_bold.with_(SpecCellFormat {
        font_size: Some(N_FONT_SIZE_OVERVIEW_TITLE),
        ..Default::default()
    });

    let mut l_cells = vec![
        SpecSheetCell::new(N_ROW_OVERVIEW_TITLE, 0, C_LABEL_OVERVIEW_TITLE).with_format(fmt_title),
        SpecSheetCell::new(N_ROW_OVERVIEW_TEST_TITLE, 0, C_LABEL_TEST_TITLE),
        SpecSheetCell::new(N_ROW_OVERVIEW_TEST_TITLE, 1, display_name),
        SpecSheetCell::new(N_ROW_OVERVIEW_SUBJECT, 0, C_LABEL_SUBJECT_NAME),
        SpecSheetCell::new(N_ROW_OVERVIEW_SUBJECT, 1, subject_name),
        SpecSheetCell::new(N_ROW_OVERVIEW_COUNT_SECTION, 0, C_LABEL_COUNT_SECTION)
            .with_format(fmt_bold.clone()),
        SpecSheetCell::new(N_ROW_OVERVIEW_COUNT_HEADER, 0, C_LABEL_COUNT_HEADER_KEY)
            .with_format(fmt_bold.clone()),
        SpecSheetCell::new(N_ROW_OVERVIEW_COUNT_HEADER, 1, C_LABEL_COUNT_HEADER_VALUE)
            .with_format(fmt_bold.clone()),
    ];

    for (n_offset, row) in (0u32..).zip(count_rows) {
        let n_row = N_ROW_OVERVIEW_COUNT_START + n_offset;
        let mut cell_label = SpecSheetCell::new(n_row, 0, row.label.as_str());
        let mut cell_count = SpecSheetCell::new(n_row, 1, row.count);
        if row.is_total() {
            cell_label = cell_label.with_format(fmt_bold.clone());
            cell_count = cell_count.with_format(fmt_bold.clone());
        }
        l_cells.push(cell_label);
        l_cells.push(cell_count);
    }

    let column_widths = (0..N_NCOLS_OVERVIEW_SIZED)
        .map(|n_col| (n_col, f64::from(width_column)))
        .collect();

    SpecSummaryLayout {
        cells: l_cells,
        column_widths,
    }
}

/// Install `layout` into the document's overview sheet; other sheets are untouched.
pub fn apply_summary_layout(
    document: &mut SpecDocument,
    layout: SpecSummaryLayout,
) -> Result<(), String> {
    let sheet = document
        .sheets
        .iter_mut()
        .find(|sheet| sheet.kind == EnumSheetKind::Overview)
        .ok_or_else(|| "Document has no overview sheet.".to_string())?;

    sheet.content = EnumSheetContent::Cells(layout.cells);
    sheet.column_widths = layout.column_widths;
    Ok(())
}
