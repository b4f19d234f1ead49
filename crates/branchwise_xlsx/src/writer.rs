//! XLSX writer kernel that renders a [`SpecDocument`] into workbook bytes.

use std::collections::BTreeMap;

use polars::prelude::{AnyValue, DataFrame};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};

use crate::spec::{
    EnumAutofitColumnsRule, EnumCellValue, EnumSheetContent, EnumSheetKind,
    SpecAutofitCellsPolicy, SpecCellFormat, SpecDocument, SpecSheetCell, SpecSheetReport,
    SpecXlsxWriteOptions,
};
use crate::util::{
    SheetNameRegistry, convert_bool_to_str, convert_cell_value, estimate_unicode_string_width,
    estimate_width_len,
};

/// Stateful in-memory workbook writer.
pub struct XlsxWriter {
    workbook: Workbook,
    write_options: SpecXlsxWriteOptions,
    registry: SheetNameRegistry,
    l_reports: Vec<SpecSheetReport>,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create an empty writer; the workbook stays in memory until [`Self::close`].
    pub fn new(write_options: SpecXlsxWriteOptions) -> Self {
        Self {
            workbook: Workbook::new(),
            write_options,
            registry: SheetNameRegistry::new(),
            l_reports: Vec::new(),
            if_closed: false,
        }
    }

    /// Return immutable snapshot of per-sheet write reports.
    pub fn report(&self) -> Vec<SpecSheetReport> {
        self.l_reports.clone()
    }

    /// Serialize the workbook. Further writes are rejected afterwards.
    pub fn close(&mut self) -> Result<Vec<u8>, String> {
        if self.if_closed {
            return Err("Workbook already closed.".to_string());
        }
        let v_bytes = self
            .workbook
            .save_to_buffer()
            .map_err(derive_xlsx_error_text)?;
        self.if_closed = true;
        Ok(v_bytes)
    }

    /// Write every sheet of `document` in order.
    pub fn write_document(&mut self, document: &SpecDocument) -> Result<(), String> {
        for sheet in &document.sheets {
            match &sheet.content {
                EnumSheetContent::Table(df) => {
                    self.write_sheet_from_dataframe(df, &sheet.sheet_name, sheet.kind.clone())?;
                }
                EnumSheetContent::Cells(cells) => {
                    self.write_sheet_from_cells(
                        cells,
                        &sheet.sheet_name,
                        sheet.kind.clone(),
                        &sheet.column_widths,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Write one sheet of explicit cells.
    pub fn write_sheet_from_cells(
        &mut self,
        cells: &[SpecSheetCell],
        sheet_name: &str,
        kind: EnumSheetKind,
        column_widths: &BTreeMap<u16, f64>,
    ) -> Result<(), String> {
        let worksheet = self.add_named_worksheet(sheet_name)?;

        for cell in cells {
            let format = cell.format.as_ref().map(derive_rust_xlsx_format);
            write_cell(worksheet, cell.row, cell.col, &cell.value, format.as_ref())?;
        }
        for (n_col, n_width) in column_widths {
            worksheet
                .set_column_width(*n_col, *n_width)
                .map_err(derive_xlsx_error_text)?;
        }

        self.l_reports.push(SpecSheetReport {
            sheet_name: sheet_name.to_string(),
            kind,
            height: cells.len(),
        });
        Ok(())
    }

    /// Write one sheet from an in-memory dataframe: header row, then records.
    pub fn write_sheet_from_dataframe(
        &mut self,
        df_data: &DataFrame,
        sheet_name: &str,
        kind: EnumSheetKind,
    ) -> Result<(), String> {
        validate_policy_autofit(&self.write_options.policy_autofit)?;

        let if_keep_missing_values = self.write_options.keep_missing_values;
        let value_policy = self.write_options.value_policy.clone();
        let policy_autofit = self.write_options.policy_autofit.clone();

        let l_colnames_df: Vec<String> = df_data
            .get_column_names_str()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        let l_cols = df_data.get_columns();

        let l_fmt_data_by_col: Vec<Format> = l_cols
            .iter()
            .map(|col| {
                let dtype = col.dtype();
                if dtype.is_integer() {
                    derive_rust_xlsx_format(&self.write_options.fmt_integer)
                } else if dtype.is_float() {
                    derive_rust_xlsx_format(&self.write_options.fmt_decimal)
                } else {
                    derive_rust_xlsx_format(&self.write_options.fmt_text)
                }
            })
            .collect();
        let l_if_integer_col: Vec<bool> = l_cols.iter().map(|c| c.dtype().is_integer()).collect();
        let fmt_header = derive_rust_xlsx_format(&self.write_options.fmt_header);

        let worksheet = self.add_named_worksheet(sheet_name)?;

        let if_autofit_columns = policy_autofit.rule_columns != EnumAutofitColumnsRule::None;
        let mut l_width_by_col = vec![0usize; l_colnames_df.len()];

        for (n_idx_col, c_name) in l_colnames_df.iter().enumerate() {
            worksheet
                .write_string_with_format(0, cast_col_num(n_idx_col)?, c_name, &fmt_header)
                .map_err(derive_xlsx_error_text)?;
            if if_autofit_columns {
                l_width_by_col[n_idx_col] = estimate_unicode_string_width(c_name);
            }
        }

        let if_autofit_body = policy_autofit.rule_columns == EnumAutofitColumnsRule::All;
        let n_rows_autofit_max = policy_autofit
            .height_body_inferred_max
            .unwrap_or(usize::MAX);

        for n_row in 0..df_data.height() {
            let if_measure_row = if_autofit_body && n_row < n_rows_autofit_max;
            for (n_idx_col, col) in l_cols.iter().enumerate() {
                let value_raw = derive_cell_value_from_any_value(
                    col.get(n_row)
                        .map_err(|err| format!("Failed to access cell value: {err}"))?,
                );
                let value = convert_cell_value(&value_raw, if_keep_missing_values, &value_policy);

                if if_measure_row {
                    l_width_by_col[n_idx_col] = usize::max(
                        l_width_by_col[n_idx_col],
                        estimate_width_len(&value, l_if_integer_col[n_idx_col]),
                    );
                }

                write_cell(
                    worksheet,
                    cast_row_num(n_row + 1)?,
                    cast_col_num(n_idx_col)?,
                    &value,
                    Some(&l_fmt_data_by_col[n_idx_col]),
                )?;
            }
        }

        if if_autofit_columns {
            let n_min = usize::max(1, policy_autofit.width_cell_min);
            let n_max = usize::min(255, usize::max(n_min, policy_autofit.width_cell_max));
            let n_pad = policy_autofit.width_cell_padding;

            for (n_idx_col, n_width_recorded) in l_width_by_col.iter().enumerate() {
                let n_width_final = usize::min(n_max, usize::max(n_min, n_width_recorded + n_pad));
                worksheet
                    .set_column_width(cast_col_num(n_idx_col)?, n_width_final as f64)
                    .map_err(derive_xlsx_error_text)?;
            }
        }

        self.l_reports.push(SpecSheetReport {
            sheet_name: sheet_name.to_string(),
            kind,
            height: df_data.height(),
        });
        Ok(())
    }

    fn add_named_worksheet(&mut self, sheet_name: &str) -> Result<&mut Worksheet, String> {
        if self.if_closed {
            return Err("Cannot write after close().".to_string());
        }
        if !self.registry.reserve(sheet_name) {
            return Err(format!("Duplicate sheet name: {sheet_name:?}"));
        }
        let worksheet = self.workbook.add_worksheet();
        worksheet
            .set_name(sheet_name)
            .map_err(derive_xlsx_error_text)?;
        Ok(worksheet)
    }
}

/// Render a whole document to XLSX bytes plus per-sheet reports.
pub fn render_document(
    document: &SpecDocument,
    write_options: &SpecXlsxWriteOptions,
) -> Result<(Vec<u8>, Vec<SpecSheetReport>), String> {
    let mut writer = XlsxWriter::new(write_options.clone());
    writer.write_document(document)?;
    let v_bytes = writer.close()?;
    Ok((v_bytes, writer.report()))
}

fn validate_policy_autofit(policy_autofit: &SpecAutofitCellsPolicy) -> Result<(), String> {
    if policy_autofit.width_cell_min == 0 {
        return Err("policy_autofit.width_cell_min must be >= 1.".to_string());
    }
    if policy_autofit.width_cell_max < policy_autofit.width_cell_min {
        return Err(
            "policy_autofit.width_cell_max must be >= policy_autofit.width_cell_min.".to_string(),
        );
    }
    Ok(())
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => EnumCellValue::String(convert_bool_to_str(val).to_string()),
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::String(value.to_string()),
    }
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &EnumCellValue,
    format: Option<&Format>,
) -> Result<(), String> {
    match (value, format) {
        (EnumCellValue::None, Some(fmt)) => {
            worksheet
                .write_blank(row, col, fmt)
                .map_err(derive_xlsx_error_text)?;
        }
        (EnumCellValue::None, None) => {}
        (EnumCellValue::String(val), Some(fmt)) => {
            worksheet
                .write_string_with_format(row, col, val, fmt)
                .map_err(derive_xlsx_error_text)?;
        }
        (EnumCellValue::String(val), None) => {
            worksheet
                .write_string(row, col, val)
                .map_err(derive_xlsx_error_text)?;
        }
        (EnumCellValue::Number(val), Some(fmt)) => {
            worksheet
                .write_number_with_format(row, col, *val, fmt)
                .map_err(derive_xlsx_error_text)?;
        }
        (EnumCellValue::Number(val), None) => {
            worksheet
                .write_number(row, col, *val)
                .map_err(derive_xlsx_error_text)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

fn derive_xlsx_error_text(err: XlsxError) -> String {
    format!("xlsx write error: {err}")
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use calamine::{Reader, Xlsx, open_workbook_from_rs};
    use polars::prelude::*;

    use super::*;
    use crate::spec::SpecAutofitCellsPolicy;

    fn open_bytes(v_bytes: Vec<u8>) -> Xlsx<Cursor<Vec<u8>>> {
        open_workbook_from_rs(Cursor::new(v_bytes)).expect("open xlsx")
    }

    fn read_text(wb: &mut Xlsx<Cursor<Vec<u8>>>, sheet: &str, row: u32, col: u32) -> String {
        let range = wb.worksheet_range(sheet).expect("sheet");
        range
            .get_value((row, col))
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    #[test]
    fn test_dataframe_sheet_has_header_and_records() {
        let df = df!(
            "Name" => ["asha", "bo"],
            "Score" => [91i64, 78],
            "Ratio" => [0.5f64, 1.25]
        )
        .expect("df");

        let mut writer = XlsxWriter::new(SpecXlsxWriteOptions::default());
        writer
            .write_sheet_from_dataframe(&df, "All Data", EnumSheetKind::AllData)
            .expect("write");
        let v_bytes = writer.close().expect("close");

        let mut wb = open_bytes(v_bytes);
        assert_eq!(wb.sheet_names(), vec!["All Data".to_string()]);
        assert_eq!(read_text(&mut wb, "All Data", 0, 0), "Name");
        assert_eq!(read_text(&mut wb, "All Data", 0, 2), "Ratio");
        assert_eq!(read_text(&mut wb, "All Data", 2, 0), "bo");
        assert_eq!(read_text(&mut wb, "All Data", 1, 1), "91");
        assert_eq!(read_text(&mut wb, "All Data", 2, 2), "1.25");
    }

    #[test]
    fn test_cells_sheet_writes_coordinates_and_widths() {
        let cells = vec![
            SpecSheetCell::new(0, 0, "Overview").with_format(SpecCellFormat::bold()),
            SpecSheetCell::new(8, 1, 5usize),
        ];
        let mut dict_widths = BTreeMap::new();
        dict_widths.insert(0u16, 20.0);

        let mut writer = XlsxWriter::new(SpecXlsxWriteOptions::default());
        writer
            .write_sheet_from_cells(&cells, "Overview", EnumSheetKind::Overview, &dict_widths)
            .expect("write");
        assert_eq!(writer.report()[0].height, 2);

        let mut wb = open_bytes(writer.close().expect("close"));
        assert_eq!(read_text(&mut wb, "Overview", 0, 0), "Overview");
        assert_eq!(read_text(&mut wb, "Overview", 8, 1), "5");
    }

    fn create_full_cell_format() -> SpecCellFormat {
        SpecCellFormat {
            font_name: Some("Arial".to_string()),
            font_size: Some(11),
            bold: None,
            italic: Some(true),
            align: Some("left".to_string()),
            valign: Some("vcenter".to_string()),
            border: Some(1),
            text_wrap: Some(true),
            num_format: Some("0.00".to_string()),
            bg_color: Some("#FFFF00".to_string()),
            font_color: Some("#C00000".to_string()),
        }
    }

    #[test]
    fn test_every_cell_format_field_reaches_the_xlsx_format() {
        let fmt_expected = Format::new()
            .set_font_name("Arial")
            .set_font_size(11)
            .set_italic()
            .set_align(FormatAlign::Left)
            .set_align(FormatAlign::VerticalCenter)
            .set_num_format("0.00")
            .set_background_color("#FFFF00")
            .set_font_color("#C00000")
            .set_border(FormatBorder::Thin)
            .set_text_wrap();
        assert_eq!(derive_rust_xlsx_format(&create_full_cell_format()), fmt_expected);
        assert_eq!(derive_rust_xlsx_format(&SpecCellFormat::default()), Format::new());
    }

    #[test]
    fn test_styled_data_formats_render() {
        let df = df!("Name" => ["asha"], "Ratio" => [0.25f64]).expect("df");
        let fmt_full = create_full_cell_format();
        let options = SpecXlsxWriteOptions {
            fmt_text: fmt_full.clone(),
            fmt_decimal: fmt_full.clone(),
            fmt_header: fmt_full.with_(SpecCellFormat::bold()),
            ..Default::default()
        };
        let mut writer = XlsxWriter::new(options);
        writer
            .write_sheet_from_dataframe(&df, "Data", EnumSheetKind::AllData)
            .expect("write");

        let mut wb = open_bytes(writer.close().expect("close"));
        assert_eq!(read_text(&mut wb, "Data", 0, 0), "Name");
        assert_eq!(read_text(&mut wb, "Data", 1, 0), "asha");
        assert_eq!(read_text(&mut wb, "Data", 1, 1), "0.25");
    }

    #[test]
    fn test_duplicate_names_are_rejected_case_insensitively() {
        let df = df!("a" => [1i64]).expect("df");
        let mut writer = XlsxWriter::new(SpecXlsxWriteOptions::default());
        writer
            .write_sheet_from_dataframe(&df, "CSE", EnumSheetKind::AllData)
            .expect("first");
        let err = writer
            .write_sheet_from_dataframe(&df, "cse", EnumSheetKind::AllData)
            .unwrap_err();
        assert!(err.contains("Duplicate sheet name"));
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut writer = XlsxWriter::new(SpecXlsxWriteOptions::default());
        writer
            .write_sheet_from_cells(&[], "Overview", EnumSheetKind::Overview, &BTreeMap::new())
            .expect("write");
        writer.close().expect("close");
        assert!(writer.close().is_err());
        assert!(
            writer
                .write_sheet_from_cells(&[], "Other", EnumSheetKind::Overview, &BTreeMap::new())
                .is_err()
        );
    }

    #[test]
    fn test_missing_values_render_blank_by_default() {
        let df = df!("a" => [Some("x"), None]).expect("df");
        let mut writer = XlsxWriter::new(SpecXlsxWriteOptions::default());
        writer
            .write_sheet_from_dataframe(&df, "Data", EnumSheetKind::AllData)
            .expect("write");
        let mut wb = open_bytes(writer.close().expect("close"));
        assert_eq!(read_text(&mut wb, "Data", 1, 0), "x");
        assert_eq!(read_text(&mut wb, "Data", 2, 0), "");
    }

    #[test]
    fn test_invalid_autofit_policy_is_rejected() {
        let df = df!("a" => [1i64]).expect("df");
        let options = SpecXlsxWriteOptions {
            policy_autofit: SpecAutofitCellsPolicy {
                rule_columns: EnumAutofitColumnsRule::All,
                width_cell_min: 10,
                width_cell_max: 5,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut writer = XlsxWriter::new(options);
        assert!(
            writer
                .write_sheet_from_dataframe(&df, "Data", EnumSheetKind::AllData)
                .is_err()
        );
    }

    #[test]
    fn test_autofit_all_still_renders() {
        let df = df!("Name" => ["a very long value indeed"]).expect("df");
        let options = SpecXlsxWriteOptions {
            policy_autofit: SpecAutofitCellsPolicy {
                rule_columns: EnumAutofitColumnsRule::All,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut writer = XlsxWriter::new(options);
        writer
            .write_sheet_from_dataframe(&df, "Data", EnumSheetKind::AllData)
            .expect("write");
        assert!(!writer.close().expect("close").is_empty());
    }
}
