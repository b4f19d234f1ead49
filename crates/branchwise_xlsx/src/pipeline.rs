//! Per-input orchestration and batch runner.

use tracing::{error, info, warn};

use crate::assemble::assemble_document;
use crate::count::{derive_count_rows, validate_count_rows};
use crate::loader::load_table_from_csv_bytes;
use crate::partition::partition_categories;
use crate::spec::{
    BranchWiseError, EnumInputOutcome, SpecBranchWiseOptions, SpecBranchWiseOutput,
    SpecBranchWiseReport, SpecInputFile,
};
use crate::summary::{apply_summary_layout, plan_summary_layout};
use crate::util::{derive_display_name, derive_output_file_name};
use crate::writer::render_document;

/// Turn one uploaded table into a branch-wise workbook.
///
/// Stages: load, partition, count, assemble, summarize, render. Any failure
/// is reported against `input.file_name`; nothing is shared between inputs.
pub fn process_input(
    input: &SpecInputFile,
    options: &SpecBranchWiseOptions,
) -> Result<SpecBranchWiseOutput, BranchWiseError> {
    let source_name = input.file_name.as_str();
    let display_name = derive_display_name(source_name);

    let df = load_table_from_csv_bytes(&input.content, source_name, options.separator)?;
    let partition = partition_categories(
        &df,
        &options.column_group,
        &options.missing_key_str,
        source_name,
    )?;

    let count_rows = derive_count_rows(&partition.groups, options.rule_count_order);
    validate_count_rows(
        &count_rows,
        &partition.groups,
        partition.df_normalized.height(),
        source_name,
    )?;

    let map_render_err = |message: String| BranchWiseError::Render {
        source_name: source_name.to_string(),
        message,
    };

    let mut report = SpecBranchWiseReport::default();
    let mut document =
        assemble_document(&partition, &display_name, &mut report).map_err(map_render_err)?;

    let layout = plan_summary_layout(
        &display_name,
        &options.subject_name,
        &count_rows,
        options.width_overview_column,
    );
    apply_summary_layout(&mut document, layout).map_err(map_render_err)?;

    let (content, l_sheet_reports) =
        render_document(&document, &options.write_options).map_err(map_render_err)?;

    report.sheets = l_sheet_reports;
    report.counts = count_rows;

    for c_warning in &report.warnings {
        warn!(source_name, "{c_warning}");
    }
    info!(
        source_name,
        n_rows = partition.df_normalized.height(),
        n_sheets = report.sheets.len(),
        n_bytes = content.len(),
        "processed input"
    );

    Ok(SpecBranchWiseOutput {
        source_name: source_name.to_string(),
        file_name: derive_output_file_name(&display_name),
        display_name,
        content,
        report,
    })
}

/// Process every input independently, in submission order.
///
/// A failing input never stops the batch; its outcome carries the error.
pub fn process_batch(
    inputs: &[SpecInputFile],
    options: &SpecBranchWiseOptions,
) -> Vec<EnumInputOutcome> {
    inputs
        .iter()
        .map(|input| match process_input(input, options) {
            Ok(output) => EnumInputOutcome::Success(output),
            Err(error) => {
                if error.is_user_error() {
                    warn!(source_name = input.file_name.as_str(), "{error}");
                } else {
                    error!(source_name = input.file_name.as_str(), "{error}");
                }
                EnumInputOutcome::Failure {
                    source_name: input.file_name.clone(),
                    error,
                }
            }
        })
        .collect()
}
