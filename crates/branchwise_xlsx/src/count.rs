//! Aggregate counter: per-category counts with a trailing total row.

use tracing::error;

use crate::conf::C_LABEL_TOTAL;
use crate::spec::{BranchWiseError, EnumCountOrder, SpecCategoryGroup, SpecCountRow};

/// Build the count table; the last row is always the total.
pub fn derive_count_rows(
    groups: &[SpecCategoryGroup],
    rule_count_order: EnumCountOrder,
) -> Vec<SpecCountRow> {
    let mut l_rows: Vec<SpecCountRow> = groups
        .iter()
        .map(|group| SpecCountRow {
            label: group.key.clone(),
            count: group.len(),
        })
        .collect();

    if rule_count_order == EnumCountOrder::Frequency {
        // Stable: equal counts stay in first-seen order.
        l_rows.sort_by(|a, b| b.count.cmp(&a.count));
    }

    let n_total = l_rows.iter().map(|row| row.count).sum();
    l_rows.push(SpecCountRow {
        label: C_LABEL_TOTAL.to_string(),
        count: n_total,
    });
    l_rows
}

/// Check that groups and counts account for every table row exactly once.
pub fn validate_count_rows(
    count_rows: &[SpecCountRow],
    groups: &[SpecCategoryGroup],
    n_rows_table: usize,
    source_name: &str,
) -> Result<(), BranchWiseError> {
    let n_rows_grouped: usize = groups.iter().map(SpecCategoryGroup::len).sum();

    let n_rows_mismatch = match count_rows.split_last() {
        Some((row_total, l_rows)) if row_total.is_total() => {
            let n_sum: usize = l_rows.iter().map(|row| row.count).sum();
            if n_sum != row_total.count || row_total.count != n_rows_table {
                Some(row_total.count)
            } else if n_rows_grouped != n_rows_table {
                Some(n_rows_grouped)
            } else {
                None
            }
        }
        _ => Some(0),
    };

    if let Some(n_rows_counted) = n_rows_mismatch {
        error!(
            source_name,
            n_rows_table, n_rows_counted, "count table disagrees with table rows"
        );
        return Err(BranchWiseError::InternalConsistency {
            source_name: source_name.to_string(),
            n_rows_table,
            n_rows_counted,
        });
    }
    Ok(())
}
