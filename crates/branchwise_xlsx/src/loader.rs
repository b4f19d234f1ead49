//! Tabular loader: CSV bytes into a polars `DataFrame`.

use std::io::Cursor;

use polars::prelude::{CsvReadOptions, DataFrame, SerReader};
use tracing::debug;

use crate::spec::BranchWiseError;

const V_UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Load one uploaded CSV payload.
///
/// Column types are inferred over every row so numeric columns stay numeric in
/// the rendered sheets. Rows shorter than the header are padded with missing
/// values; longer rows are rejected.
pub fn load_table_from_csv_bytes(
    content: &[u8],
    source_name: &str,
    separator: u8,
) -> Result<DataFrame, BranchWiseError> {
    let df = read_csv_dataframe(content, separator).map_err(|message| {
        BranchWiseError::Parse {
            source_name: source_name.to_string(),
            message,
        }
    })?;
    debug!(
        source_name,
        n_rows = df.height(),
        n_cols = df.width(),
        "loaded table"
    );
    Ok(df)
}

/// Parse CSV bytes with a header row.
pub fn read_csv_dataframe(content: &[u8], separator: u8) -> Result<DataFrame, String> {
    let v_content = content.strip_prefix(V_UTF8_BOM).unwrap_or(content);

    let c_text = std::str::from_utf8(v_content).map_err(|err| {
        format!(
            "Unreadable encoding: invalid UTF-8 at byte {}.",
            err.valid_up_to()
        )
    })?;
    if c_text.trim().is_empty() {
        return Err("No columns to parse from file.".to_string());
    }

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .map_parse_options(|parse_options| parse_options.with_separator(separator))
        .into_reader_with_file_handle(Cursor::new(v_content.to_vec()))
        .finish()
        .map_err(|err| format!("Failed to read CSV: {err}"))
}
