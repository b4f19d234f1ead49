//! Stateless helper utilities shared by the branch-wise pipeline stages.

use std::collections::BTreeSet;
use std::path::Path;

use crate::conf::{
    C_EXCEL_RESERVED_SHEET_NAME, C_OUTPUT_FILE_EXTENSION, C_OUTPUT_FILE_PREFIX,
    C_SHEET_NAME_BLANK, N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL,
};
use crate::spec::{EnumCellValue, SpecXlsxValuePolicy};

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Convert `NaN`/`Inf` to policy string; return error for finite values.
pub fn convert_nan_inf_to_str(
    x: f64,
    value_policy: &SpecXlsxValuePolicy,
) -> Result<String, String> {
    if x.is_nan() {
        return Ok(value_policy.nan_str.clone());
    }
    if x.is_infinite() {
        return Ok(if x.is_sign_positive() {
            value_policy.posinf_str.clone()
        } else {
            value_policy.neginf_str.clone()
        });
    }
    Err("Input is neither NaN nor Inf.".to_string())
}

/// Normalize one data cell before it is written.
///
/// Text stays text, finite numbers stay numbers. Missing and non-finite values
/// become blank, or policy text when `if_keep_missing_values` is set.
pub fn convert_cell_value(
    value: &EnumCellValue,
    if_keep_missing_values: bool,
    value_policy: &SpecXlsxValuePolicy,
) -> EnumCellValue {
    match value {
        EnumCellValue::None => {
            if if_keep_missing_values {
                EnumCellValue::String(value_policy.missing_value_str.clone())
            } else {
                EnumCellValue::None
            }
        }
        EnumCellValue::String(s) => EnumCellValue::String(s.clone()),
        EnumCellValue::Number(n) => {
            if n.is_finite() {
                EnumCellValue::Number(*n)
            } else if if_keep_missing_values {
                EnumCellValue::String(
                    convert_nan_inf_to_str(*n, value_policy)
                        .unwrap_or_else(|_| value_policy.nan_str.clone()),
                )
            } else {
                EnumCellValue::None
            }
        }
    }
}

/// Text form of a boolean cell, matching the source tool's spelling.
pub fn convert_bool_to_str(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CategoryKeys

/// Normalize a grouping value to its category key.
///
/// Idempotent: normalizing a key returns it unchanged.
pub fn normalize_category_key(value: &str) -> String {
    value.trim().to_string()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = trim_sheet_name_edges(&c_name).to_string();
    if c_name.is_empty() {
        c_name = C_SHEET_NAME_BLANK.to_string();
    }

    let c_name_capped: String = c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect();
    trim_sheet_name_edges(&c_name_capped).to_string()
}

// Excel rejects names that start or end with an apostrophe.
fn trim_sheet_name_edges(name: &str) -> &str {
    name.trim().trim_matches('\'').trim()
}

/// Create suffixed sheet name (`base__2`, `base__3`, ...), respecting length cap.
pub fn create_sheet_identifier(base_name: &str, part_idx: usize) -> String {
    let c_sheet_name_suffix = format!("__{part_idx}");
    let n_len_base_name_max =
        N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_sheet_name_suffix.chars().count());

    let c_sheet_name_base: String = base_name
        .chars()
        .take(usize::max(1, n_len_base_name_max))
        .collect();

    format!("{c_sheet_name_base}{c_sheet_name_suffix}")
}

/// Case-insensitive sheet name registry for one workbook.
///
/// Excel treats `CSE` and `cse` as the same sheet, so names are compared lowercased.
#[derive(Debug, Clone)]
pub struct SheetNameRegistry {
    set_sheet_names_existing: BTreeSet<String>,
}

impl Default for SheetNameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetNameRegistry {
    /// Registry that already blocks Excel's own reserved name.
    pub fn new() -> Self {
        let mut set_sheet_names_existing = BTreeSet::new();
        set_sheet_names_existing.insert(C_EXCEL_RESERVED_SHEET_NAME.to_lowercase());
        Self {
            set_sheet_names_existing,
        }
    }

    /// Whether `name` is already taken.
    pub fn contains(&self, name: &str) -> bool {
        self.set_sheet_names_existing.contains(&name.to_lowercase())
    }

    /// Claim `name` as-is; `false` when it is already taken.
    pub fn reserve(&mut self, name: &str) -> bool {
        self.set_sheet_names_existing.insert(name.to_lowercase())
    }

    /// Claim `name`, or the first free suffixed variant of it.
    pub fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if self.reserve(name) {
            return name.to_string();
        }

        let mut n_idx = 2usize;
        loop {
            let candidate = create_sheet_identifier(name, n_idx);
            if self.reserve(&candidate) {
                return candidate;
            }
            n_idx += 1;
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FileNames

/// Input file name without its final extension.
pub fn derive_display_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string())
}

/// `BranchWise_<display name>.xlsx`.
pub fn derive_output_file_name(display_name: &str) -> String {
    format!("{C_OUTPUT_FILE_PREFIX}{display_name}.{C_OUTPUT_FILE_EXTENSION}")
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WidthEstimation

/// Estimate displayed width units of a text cell; non-ASCII glyphs count wider.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

/// Estimate displayed width units for one normalized cell value.
pub fn estimate_width_len(value: &EnumCellValue, if_is_integer_col: bool) -> usize {
    match value {
        EnumCellValue::None => 0,
        EnumCellValue::String(s) => estimate_unicode_string_width(s),
        EnumCellValue::Number(n) => {
            if if_is_integer_col {
                (*n as i64).to_string().len()
            } else {
                n.to_string().len()
            }
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_category_key_is_idempotent() {
        for raw in [" CSE ", "\tECE\n", "cse", "", "  ", "Mech  Eng"] {
            let key = normalize_category_key(raw);
            assert_eq!(normalize_category_key(&key), key);
        }
        assert_eq!(normalize_category_key(" CSE "), "CSE");
        assert_eq!(normalize_category_key("Mech  Eng"), "Mech  Eng");
    }

    #[test]
    fn test_sanitize_sheet_name_replaces_illegal_and_caps_length() {
        assert_eq!(sanitize_sheet_name("CSE/IT", "_"), "CSE_IT");
        assert_eq!(sanitize_sheet_name("a[b]:c*d?e\\f", "_"), "a_b__c_d_e_f");
        assert_eq!(sanitize_sheet_name("'quoted'", "_"), "quoted");
        assert_eq!(sanitize_sheet_name("   ", "_"), "Blank");

        let c_long = "Electronics and Communication Engineering";
        let c_name = sanitize_sheet_name(c_long, "_");
        assert_eq!(c_name.chars().count(), N_LEN_EXCEL_SHEET_NAME_MAX);
        assert!(c_long.starts_with(&c_name));
    }

    #[test]
    fn test_create_sheet_identifier_respects_length_cap() {
        let c_long = "x".repeat(40);
        let c_name = create_sheet_identifier(&c_long, 12);
        assert_eq!(c_name.chars().count(), N_LEN_EXCEL_SHEET_NAME_MAX);
        assert!(c_name.ends_with("__12"));
        assert_eq!(create_sheet_identifier("CSE", 2), "CSE__2");
    }

    #[test]
    fn test_registry_is_case_insensitive_and_blocks_history() {
        let mut registry = SheetNameRegistry::new();
        assert_eq!(registry.derive_unique_sheet_name("CSE"), "CSE");
        assert_eq!(registry.derive_unique_sheet_name("cse"), "cse__2");
        assert_eq!(registry.derive_unique_sheet_name("Cse"), "Cse__3");
        assert_eq!(registry.derive_unique_sheet_name("history"), "history__2");
        assert!(registry.contains("CSE__2"));
    }

    #[test]
    fn test_registry_suffix_on_truncated_collision() {
        let mut registry = SheetNameRegistry::new();
        let c_a = sanitize_sheet_name(&format!("{}A", "y".repeat(31)), "_");
        let c_b = sanitize_sheet_name(&format!("{}B", "y".repeat(31)), "_");
        assert_eq!(c_a, c_b);

        let c_first = registry.derive_unique_sheet_name(&c_a);
        let c_second = registry.derive_unique_sheet_name(&c_b);
        assert_ne!(c_first, c_second);
        assert!(c_second.chars().count() <= N_LEN_EXCEL_SHEET_NAME_MAX);
    }

    #[test]
    fn test_display_and_output_file_names() {
        assert_eq!(derive_display_name("midterm_scores.csv"), "midterm_scores");
        assert_eq!(derive_display_name("a.b.csv"), "a.b");
        assert_eq!(derive_display_name("noext"), "noext");
        assert_eq!(
            derive_output_file_name("midterm_scores"),
            "BranchWise_midterm_scores.xlsx"
        );
    }

    #[test]
    fn test_convert_cell_value_blanks_non_finite_by_default() {
        let policy = SpecXlsxValuePolicy::default();
        assert_eq!(
            convert_cell_value(&EnumCellValue::Number(f64::NAN), false, &policy),
            EnumCellValue::None
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::Number(f64::INFINITY), true, &policy),
            EnumCellValue::String("Inf".to_string())
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::None, true, &policy),
            EnumCellValue::String("NA".to_string())
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::Number(2.5), false, &policy),
            EnumCellValue::Number(2.5)
        );
    }

    #[test]
    fn test_estimate_width_len_counts_wide_glyphs() {
        assert_eq!(estimate_unicode_string_width("abc"), 3);
        assert_eq!(estimate_unicode_string_width("日本"), 3);
        assert_eq!(estimate_width_len(&EnumCellValue::Number(42.0), true), 2);
    }
}
