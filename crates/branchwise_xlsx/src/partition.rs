//! Schema validation and category partitioning of the grouping column.

use std::collections::HashMap;

use polars::prelude::{DataFrame, DataType, IdxSize, NamedFrom, Series};
use tracing::debug;

use crate::spec::{BranchWiseError, SpecCategoryGroup, SpecPartition};
use crate::util::{convert_bool_to_str, normalize_category_key};

/// Ensure `column_group` exists (exact, case-sensitive match).
pub fn validate_grouping_column(
    df: &DataFrame,
    column_group: &str,
    source_name: &str,
) -> Result<(), BranchWiseError> {
    let if_present = df
        .get_column_names_str()
        .into_iter()
        .any(|c_name| c_name == column_group);
    if if_present {
        return Ok(());
    }
    Err(BranchWiseError::MissingColumn {
        source_name: source_name.to_string(),
        column: column_group.to_string(),
    })
}

/// Coerce the grouping column to text and trim it; missing values become `missing_key_str`.
///
/// Booleans keep their source spelling (`True`/`False`) rather than polars' lowercase cast.
pub fn derive_category_keys(
    df: &DataFrame,
    column_group: &str,
    missing_key_str: &str,
) -> Result<Vec<String>, String> {
    let series = df
        .column(column_group)
        .map_err(|err| format!("Failed to access column {column_group:?}: {err}"))?
        .as_materialized_series();

    let c_missing_key = normalize_category_key(missing_key_str);

    if series.dtype() == &DataType::Boolean {
        let ca_bool = series
            .bool()
            .map_err(|err| format!("Failed to read {column_group:?} as boolean: {err}"))?;
        return Ok(ca_bool
            .into_iter()
            .map(|value| match value {
                Some(val) => convert_bool_to_str(val).to_string(),
                None => c_missing_key.clone(),
            })
            .collect());
    }

    let series_text = series
        .cast(&DataType::String)
        .map_err(|err| format!("Failed to cast {column_group:?} to text: {err}"))?;
    let ca_text = series_text
        .str()
        .map_err(|err| format!("Failed to read {column_group:?} as text: {err}"))?;

    Ok(ca_text
        .into_iter()
        .map(|value| match value {
            Some(val) => normalize_category_key(val),
            None => c_missing_key.clone(),
        })
        .collect())
}

/// Group row indices by key, keeping first-seen key order and source row order.
pub fn plan_category_groups(keys: &[String]) -> Vec<SpecCategoryGroup> {
    let mut l_groups: Vec<SpecCategoryGroup> = Vec::new();
    let mut dict_pos: HashMap<&str, usize> = HashMap::new();

    for (n_idx_row, c_key) in keys.iter().enumerate() {
        let n_idx_group = *dict_pos.entry(c_key.as_str()).or_insert_with(|| {
            l_groups.push(SpecCategoryGroup {
                key: c_key.clone(),
                row_indices: Vec::new(),
            });
            l_groups.len() - 1
        });
        l_groups[n_idx_group].row_indices.push(n_idx_row as IdxSize);
    }

    l_groups
}

/// Normalize the grouping column in place and partition the rows.
pub fn partition_categories(
    df: &DataFrame,
    column_group: &str,
    missing_key_str: &str,
    source_name: &str,
) -> Result<SpecPartition, BranchWiseError> {
    validate_grouping_column(df, column_group, source_name)?;

    let map_parse_err = |message: String| BranchWiseError::Parse {
        source_name: source_name.to_string(),
        message,
    };

    let l_keys = derive_category_keys(df, column_group, missing_key_str).map_err(map_parse_err)?;
    let groups = plan_category_groups(&l_keys);

    let mut df_normalized = df.clone();
    df_normalized
        .with_column(Series::new(column_group.into(), &l_keys))
        .map_err(|err| map_parse_err(format!("Failed to replace {column_group:?}: {err}")))?;

    debug!(
        source_name,
        n_rows = df_normalized.height(),
        n_groups = groups.len(),
        "partitioned categories"
    );

    Ok(SpecPartition {
        df_normalized,
        groups,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use polars::prelude::*;

    use super::*;
    use crate::loader::load_table_from_csv_bytes;

    fn derive_keys_of(groups: &[SpecCategoryGroup]) -> Vec<&str> {
        groups.iter().map(|g| g.key.as_str()).collect()
    }

    #[test]
    fn test_validate_reports_missing_column_by_input_name() {
        let df = df!("Branch" => ["CSE"]).expect("df");
        let err = validate_grouping_column(&df, "Select Branch", "quiz.csv").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Column 'Select Branch' not found in quiz.csv. Skipping."
        );
    }

    #[test]
    fn test_validate_is_case_and_spacing_sensitive() {
        let df = df!("select branch" => ["CSE"], "Select  Branch" => ["ECE"]).expect("df");
        assert!(validate_grouping_column(&df, "Select Branch", "x.csv").is_err());
    }

    #[test]
    fn test_partition_trims_and_keeps_case_sensitive_first_seen_order() {
        let df = df!("Select Branch" => [" CSE ", "ECE", "cse"]).expect("df");
        let partition =
            partition_categories(&df, "Select Branch", "nan", "branches.csv").expect("partition");

        assert_eq!(derive_keys_of(&partition.groups), vec!["CSE", "ECE", "cse"]);
        assert!(partition.groups.iter().all(|g| g.len() == 1));

        let l_values: Vec<Option<&str>> = partition
            .df_normalized
            .column("Select Branch")
            .expect("col")
            .as_materialized_series()
            .str()
            .expect("str")
            .into_iter()
            .collect();
        assert_eq!(l_values, vec![Some("CSE"), Some("ECE"), Some("cse")]);
    }

    #[test]
    fn test_partition_preserves_row_order_within_groups() {
        let df = df!(
            "Select Branch" => ["ECE", "CSE", " ECE", "MECH", "CSE ", "ECE"],
            "Roll" => [1i64, 2, 3, 4, 5, 6]
        )
        .expect("df");
        let partition =
            partition_categories(&df, "Select Branch", "nan", "rolls.csv").expect("partition");

        assert_eq!(derive_keys_of(&partition.groups), vec!["ECE", "CSE", "MECH"]);
        assert_eq!(partition.groups[0].row_indices, vec![0, 2, 5]);
        assert_eq!(partition.groups[1].row_indices, vec![1, 4]);
        assert_eq!(partition.groups[2].row_indices, vec![3]);
    }

    #[test]
    fn test_partition_covers_every_row_exactly_once() {
        let df = df!(
            "Select Branch" => ["a", "b", " a", "c", "b", "b", "a ", "d"]
        )
        .expect("df");
        let partition = partition_categories(&df, "Select Branch", "nan", "x.csv").expect("ok");

        let mut l_all: Vec<IdxSize> = partition
            .groups
            .iter()
            .flat_map(|g| g.row_indices.iter().copied())
            .collect();
        assert_eq!(l_all.len(), df.height());
        l_all.sort_unstable();
        let set_all: BTreeSet<IdxSize> = l_all.iter().copied().collect();
        assert_eq!(set_all.len(), df.height());
        assert_eq!(l_all, (0..df.height() as IdxSize).collect::<Vec<_>>());
    }

    #[test]
    fn test_partition_coerces_numeric_keys_to_text() {
        let df = load_table_from_csv_bytes(
            b"Select Branch,Name\n101,a\n202,b\n101,c\n",
            "codes.csv",
            b',',
        )
        .expect("load");
        let partition = partition_categories(&df, "Select Branch", "nan", "codes.csv").expect("ok");
        assert_eq!(derive_keys_of(&partition.groups), vec!["101", "202"]);
        assert_eq!(
            partition
                .df_normalized
                .column("Select Branch")
                .expect("col")
                .dtype(),
            &DataType::String
        );
    }

    #[test]
    fn test_partition_maps_missing_values_to_missing_key() {
        let df = load_table_from_csv_bytes(
            b"Select Branch,Name\nCSE,a\n,b\n",
            "gaps.csv",
            b',',
        )
        .expect("load");
        let partition = partition_categories(&df, "Select Branch", "nan", "gaps.csv").expect("ok");
        assert_eq!(derive_keys_of(&partition.groups), vec!["CSE", "nan"]);
    }

    #[test]
    fn test_partition_keeps_boolean_spelling() {
        let df = load_table_from_csv_bytes(
            b"Select Branch,N\nTrue,1\nFalse,2\nTrue,3\n",
            "flags.csv",
            b',',
        )
        .expect("load");
        let partition = partition_categories(&df, "Select Branch", "nan", "flags.csv").expect("ok");
        assert_eq!(derive_keys_of(&partition.groups), vec!["True", "False"]);

        let l_values: Vec<Option<&str>> = partition
            .df_normalized
            .column("Select Branch")
            .expect("col")
            .as_materialized_series()
            .str()
            .expect("str")
            .into_iter()
            .collect();
        assert_eq!(l_values, vec![Some("True"), Some("False"), Some("True")]);
    }

    #[test]
    fn test_partition_keeps_other_columns_untouched() {
        let df = df!("Name" => ["  x  "], "Select Branch" => [" CSE"]).expect("df");
        let partition = partition_categories(&df, "Select Branch", "nan", "x.csv").expect("ok");
        let c_name = partition
            .df_normalized
            .column("Name")
            .expect("col")
            .as_materialized_series()
            .str()
            .expect("str")
            .get(0)
            .map(ToString::to_string);
        assert_eq!(c_name.as_deref(), Some("  x  "));
        assert_eq!(
            partition.df_normalized.get_column_names_str(),
            vec!["Name", "Select Branch"]
        );
    }
}
