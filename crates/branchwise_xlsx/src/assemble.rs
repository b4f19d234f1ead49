//! Document assembler: placeholder overview, full data, one sheet per category.

use std::collections::BTreeMap;

use polars::prelude::{DataFrame, IdxCa};
use tracing::{debug, warn};

use crate::conf::{C_SHEET_ALL_DATA, C_SHEET_OVERVIEW};
use crate::spec::{
    EnumSheetContent, EnumSheetKind, SpecBranchWiseReport, SpecCategoryGroup, SpecDocument,
    SpecPartition, SpecSheet,
};
use crate::util::{SheetNameRegistry, sanitize_sheet_name};

/// Assemble the document for one partitioned table.
///
/// Sheet order: `Overview` (empty), `All Data`, then categories in first-seen
/// order. Category sheet names are sanitized, capped at 31 characters and made
/// unique case-insensitively; every adjustment is recorded in `report`.
pub fn assemble_document(
    partition: &SpecPartition,
    display_name: &str,
    report: &mut SpecBranchWiseReport,
) -> Result<SpecDocument, String> {
    let mut registry = SheetNameRegistry::new();
    registry.reserve(C_SHEET_OVERVIEW);
    registry.reserve(C_SHEET_ALL_DATA);

    let mut l_sheets = Vec::with_capacity(partition.groups.len() + 2);
    l_sheets.push(SpecSheet {
        sheet_name: C_SHEET_OVERVIEW.to_string(),
        kind: EnumSheetKind::Overview,
        content: EnumSheetContent::Cells(Vec::new()),
        column_widths: BTreeMap::new(),
    });
    l_sheets.push(SpecSheet {
        sheet_name: C_SHEET_ALL_DATA.to_string(),
        kind: EnumSheetKind::AllData,
        content: EnumSheetContent::Table(partition.df_normalized.clone()),
        column_widths: BTreeMap::new(),
    });

    for group in &partition.groups {
        let sheet_name = derive_category_sheet_name(&mut registry, &group.key, report);
        let df_group = select_group_rows(&partition.df_normalized, group)?;
        debug!(
            key = group.key.as_str(),
            sheet_name = sheet_name.as_str(),
            n_rows = df_group.height(),
            "assembled category sheet"
        );
        l_sheets.push(SpecSheet {
            sheet_name,
            kind: EnumSheetKind::Category {
                key: group.key.clone(),
            },
            content: EnumSheetContent::Table(df_group),
            column_widths: BTreeMap::new(),
        });
    }

    Ok(SpecDocument {
        display_name: display_name.to_string(),
        sheets: l_sheets,
    })
}

fn derive_category_sheet_name(
    registry: &mut SheetNameRegistry,
    key: &str,
    report: &mut SpecBranchWiseReport,
) -> String {
    let c_name_sanitized = sanitize_sheet_name(key, "_");
    if c_name_sanitized != key {
        report.warn(format!(
            "Category {key:?} written to sheet {c_name_sanitized:?} (Excel sheet name rules)."
        ));
    }

    let c_name_unique = registry.derive_unique_sheet_name(&c_name_sanitized);
    if c_name_unique != c_name_sanitized {
        warn!(
            key,
            sheet_name = c_name_unique.as_str(),
            "sheet name collision resolved with suffix"
        );
        report.warn(format!(
            "Category {key:?} collides with an existing sheet name; renamed to {c_name_unique:?}."
        ));
    }
    c_name_unique
}

/// Rows of one group, in source order, with every column.
pub fn select_group_rows(df: &DataFrame, group: &SpecCategoryGroup) -> Result<DataFrame, String> {
    let idx = IdxCa::from_vec("idx".into(), group.row_indices.clone());
    df.take(&idx)
        .map_err(|err| format!("Failed to select rows for {:?}: {err}", group.key))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use polars::prelude::*;

    use super::*;
    use crate::conf::N_LEN_EXCEL_SHEET_NAME_MAX;
    use crate::partition::partition_categories;

    fn assemble_from(df: &DataFrame) -> (SpecDocument, SpecBranchWiseReport) {
        let partition = partition_categories(df, "Select Branch", "nan", "in.csv").expect("ok");
        let mut report = SpecBranchWiseReport::default();
        let doc = assemble_document(&partition, "in", &mut report).expect("assemble");
        (doc, report)
    }

    #[test]
    fn test_sheet_order_and_contents() {
        let df = df!(
            "Roll" => [1i64, 2, 3, 4],
            "Select Branch" => ["ECE", " CSE", "ECE ", "MECH"]
        )
        .expect("df");
        let (doc, report) = assemble_from(&df);

        assert_eq!(
            doc.sheet_names(),
            vec!["Overview", "All Data", "ECE", "CSE", "MECH"]
        );
        assert!(report.warnings.is_empty());

        let sheet_overview = &doc.sheets[0];
        assert_eq!(sheet_overview.kind, EnumSheetKind::Overview);
        assert_eq!(sheet_overview.cells().map(<[_]>::len), Some(0));

        let df_all = doc.sheet("All Data").and_then(SpecSheet::table).expect("all");
        assert_eq!(df_all.height(), 4);
        assert_eq!(df_all.get_column_names_str(), vec!["Roll", "Select Branch"]);

        let df_ece = doc.sheet("ECE").and_then(SpecSheet::table).expect("ece");
        let l_rolls: Vec<Option<i64>> = df_ece
            .column("Roll")
            .expect("col")
            .as_materialized_series()
            .i64()
            .expect("i64")
            .into_iter()
            .collect();
        assert_eq!(l_rolls, vec![Some(1), Some(3)]);
        assert_eq!(df_ece.get_column_names_str(), vec!["Roll", "Select Branch"]);
    }

    #[test]
    fn test_header_only_table_yields_empty_all_data() {
        let df = DataFrame::new(vec![
            Column::new("Select Branch".into(), Vec::<String>::new()),
            Column::new("Name".into(), Vec::<String>::new()),
        ])
        .expect("df");
        let (doc, _) = assemble_from(&df);
        assert_eq!(doc.sheet_names(), vec!["Overview", "All Data"]);
        assert_eq!(doc.sheets[1].height(), 0);
    }

    #[test]
    fn test_case_variants_get_distinct_sheets() {
        let df = df!("Select Branch" => [" CSE ", "ECE", "cse"]).expect("df");
        let (doc, report) = assemble_from(&df);
        assert_eq!(
            doc.sheet_names(),
            vec!["Overview", "All Data", "CSE", "ECE", "cse__2"]
        );
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_truncation_collisions_never_overwrite() {
        let c_prefix = "Electronics and Communication Eng";
        let df = df!(
            "Select Branch" => [
                format!("{c_prefix} A"),
                format!("{c_prefix} B"),
                "Overview".to_string(),
                "all data".to_string(),
                "CSE/IT".to_string(),
            ]
        )
        .expect("df");
        let (doc, report) = assemble_from(&df);

        let l_names = doc.sheet_names();
        assert_eq!(l_names.len(), 7);
        let set_lower: BTreeSet<String> = l_names.iter().map(|n| n.to_lowercase()).collect();
        assert_eq!(set_lower.len(), l_names.len());
        assert!(
            l_names
                .iter()
                .all(|n| n.chars().count() <= N_LEN_EXCEL_SHEET_NAME_MAX)
        );
        assert!(l_names.contains(&"CSE_IT"));
        assert!(l_names.contains(&"Overview__2"));
        assert!(l_names.contains(&"all data__2"));
        assert!(!report.warnings.is_empty());

        let n_rows_categories: usize = doc.sheets[2..].iter().map(SpecSheet::height).sum();
        assert_eq!(n_rows_categories, df.height());
    }
}
