use branchwise_xlsx::spec::{
    BranchWiseError, EnumAutofitColumnsRule, EnumCountOrder, EnumInputOutcome,
    SpecAutofitCellsPolicy, SpecBranchWiseOptions, SpecCellFormat, SpecInputFile,
    SpecXlsxWriteOptions,
};
use branchwise_xlsx::{process_batch, process_input};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyBytes};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "branchwise.xlsx.pipeline.v1";
const C_BRIDGE_TRANSPORT: &str = "bytes";

/// Per-item result of `process_files`.
#[pyclass(name = "BranchWiseOutcome", frozen)]
struct PyBranchWiseOutcome {
    #[pyo3(get)]
    source_name: String,
    #[pyo3(get)]
    ok: bool,
    #[pyo3(get)]
    message: String,
    #[pyo3(get)]
    file_name: Option<String>,
    #[pyo3(get)]
    warnings: Vec<String>,
    content: Option<Vec<u8>>,
}

#[pymethods]
impl PyBranchWiseOutcome {
    #[getter]
    fn content<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyBytes>> {
        self.content.as_deref().map(|v| PyBytes::new(py, v))
    }

    fn __repr__(&self) -> String {
        format!(
            "BranchWiseOutcome(source_name={:?}, ok={}, message={:?})",
            self.source_name,
            if self.ok { "True" } else { "False" },
            self.message
        )
    }
}

impl From<EnumInputOutcome> for PyBranchWiseOutcome {
    fn from(outcome: EnumInputOutcome) -> Self {
        let message = outcome.message();
        match outcome {
            EnumInputOutcome::Success(output) => Self {
                source_name: output.source_name,
                ok: true,
                message,
                file_name: Some(output.file_name),
                warnings: output.report.warnings,
                content: Some(output.content),
            },
            EnumInputOutcome::Failure { source_name, .. } => Self {
                source_name,
                ok: false,
                message,
                file_name: None,
                warnings: Vec::new(),
                content: None,
            },
        }
    }
}

#[pyfunction]
#[pyo3(signature = (
    content,
    file_name,
    subject_name = None,
    column_group = None,
    count_order = None,
    write_options = None
))]
fn process_file<'py>(
    py: Python<'py>,
    content: &[u8],
    file_name: String,
    subject_name: Option<String>,
    column_group: Option<String>,
    count_order: Option<String>,
    write_options: Option<&Bound<'py, PyAny>>,
) -> PyResult<(String, Bound<'py, PyBytes>)> {
    let cfg_options = derive_options(subject_name, column_group, count_order, write_options)?;
    let input = SpecInputFile::new(file_name, content);

    let output = py
        .allow_threads(|| process_input(&input, &cfg_options))
        .map_err(derive_py_err)?;
    Ok((output.file_name, PyBytes::new(py, &output.content)))
}

#[pyfunction]
#[pyo3(signature = (
    items,
    subject_name = None,
    column_group = None,
    count_order = None,
    write_options = None
))]
fn process_files(
    py: Python<'_>,
    items: Vec<(String, Vec<u8>)>,
    subject_name: Option<String>,
    column_group: Option<String>,
    count_order: Option<String>,
    write_options: Option<&Bound<'_, PyAny>>,
) -> PyResult<Vec<PyBranchWiseOutcome>> {
    let cfg_options = derive_options(subject_name, column_group, count_order, write_options)?;
    let l_inputs: Vec<SpecInputFile> = items
        .into_iter()
        .map(|(file_name, content)| SpecInputFile::new(file_name, content))
        .collect();

    let l_outcomes = py.allow_threads(|| process_batch(&l_inputs, &cfg_options));
    Ok(l_outcomes
        .into_iter()
        .map(PyBranchWiseOutcome::from)
        .collect())
}

fn derive_py_err(err: BranchWiseError) -> PyErr {
    if err.is_user_error() {
        PyValueError::new_err(err.to_string())
    } else {
        PyRuntimeError::new_err(err.to_string())
    }
}

fn derive_options(
    subject_name: Option<String>,
    column_group: Option<String>,
    count_order: Option<String>,
    write_options: Option<&Bound<'_, PyAny>>,
) -> PyResult<SpecBranchWiseOptions> {
    let mut cfg_options = SpecBranchWiseOptions::default();
    if let Some(v) = subject_name {
        cfg_options.subject_name = v;
    }
    if let Some(v) = column_group {
        cfg_options.column_group = v;
    }
    if let Some(v) = count_order {
        cfg_options.rule_count_order = parse_rule_count_order(&v)?;
    }
    if let Some(v) = parse_spec_xlsx_write_options(write_options)? {
        cfg_options.write_options = v;
    }
    Ok(cfg_options)
}

fn parse_rule_count_order(value: &str) -> PyResult<EnumCountOrder> {
    match value {
        "frequency" => Ok(EnumCountOrder::Frequency),
        "first_seen" | "first-seen" => Ok(EnumCountOrder::FirstSeen),
        _ => Err(PyValueError::new_err(
            "count_order must be one of: 'frequency', 'first_seen'.",
        )),
    }
}

fn parse_spec_xlsx_write_options(
    obj: Option<&Bound<'_, PyAny>>,
) -> PyResult<Option<SpecXlsxWriteOptions>> {
    let Some(obj) = obj else {
        return Ok(None);
    };
    if obj.is_none() {
        return Ok(None);
    }

    let mut cfg_write_options = SpecXlsxWriteOptions::default();

    if let Some(value_policy_obj) = extract_optional_attr_bound(obj, "value_policy")? {
        let value_policy = &mut cfg_write_options.value_policy;
        if let Some(v) = extract_optional_attr::<String>(&value_policy_obj, "missing_value_str")? {
            value_policy.missing_value_str = v;
        }
        if let Some(v) = extract_optional_attr::<String>(&value_policy_obj, "nan_str")? {
            value_policy.nan_str = v;
        }
        if let Some(v) = extract_optional_attr::<String>(&value_policy_obj, "posinf_str")? {
            value_policy.posinf_str = v;
        }
        if let Some(v) = extract_optional_attr::<String>(&value_policy_obj, "neginf_str")? {
            value_policy.neginf_str = v;
        }
    }
    if let Some(v) = extract_optional_attr::<bool>(obj, "keep_missing_values")? {
        cfg_write_options.keep_missing_values = v;
    }
    if let Some(policy) =
        parse_spec_autofit_cells_policy(extract_optional_attr_bound(obj, "policy_autofit")?)?
    {
        cfg_write_options.policy_autofit = policy;
    }

    for (c_attr, fmt_target) in [
        ("fmt_text", &mut cfg_write_options.fmt_text),
        ("fmt_integer", &mut cfg_write_options.fmt_integer),
        ("fmt_decimal", &mut cfg_write_options.fmt_decimal),
        ("fmt_header", &mut cfg_write_options.fmt_header),
    ] {
        if let Some(fmt_patch) =
            parse_spec_cell_format(extract_optional_attr_bound(obj, c_attr)?.as_ref())?
        {
            *fmt_target = fmt_target.merge(&fmt_patch);
        }
    }

    Ok(Some(cfg_write_options))
}

fn parse_spec_cell_format(obj: Option<&Bound<'_, PyAny>>) -> PyResult<Option<SpecCellFormat>> {
    let Some(obj) = obj else {
        return Ok(None);
    };
    if obj.is_none() {
        return Ok(None);
    }

    Ok(Some(SpecCellFormat {
        font_name: extract_optional_attr::<String>(obj, "font_name")?,
        font_size: extract_optional_attr::<i64>(obj, "font_size")?,
        bold: extract_optional_attr::<bool>(obj, "bold")?,
        italic: extract_optional_attr::<bool>(obj, "italic")?,
        align: extract_optional_attr::<String>(obj, "align")?,
        valign: extract_optional_attr::<String>(obj, "valign")?,
        border: extract_optional_attr::<i64>(obj, "border")?,
        text_wrap: extract_optional_attr::<bool>(obj, "text_wrap")?,
        num_format: extract_optional_attr::<String>(obj, "num_format")?,
        bg_color: extract_optional_attr::<String>(obj, "bg_color")?,
        font_color: extract_optional_attr::<String>(obj, "font_color")?,
    }))
}

fn parse_rule_autofit_columns(value: &str) -> PyResult<EnumAutofitColumnsRule> {
    match value {
        "none" => Ok(EnumAutofitColumnsRule::None),
        "header" => Ok(EnumAutofitColumnsRule::Header),
        "all" => Ok(EnumAutofitColumnsRule::All),
        _ => Err(PyValueError::new_err(
            "policy_autofit.rule_columns must be one of: 'none', 'header', 'all'.",
        )),
    }
}

fn parse_spec_autofit_cells_policy(
    obj: Option<Bound<'_, PyAny>>,
) -> PyResult<Option<SpecAutofitCellsPolicy>> {
    let Some(obj) = obj else {
        return Ok(None);
    };

    let mut policy = SpecAutofitCellsPolicy::default();

    if let Some(v) = extract_optional_attr::<String>(&obj, "rule_columns")? {
        policy.rule_columns = parse_rule_autofit_columns(&v)?;
    }
    if obj.hasattr("height_body_inferred_max")? {
        let val = obj.getattr("height_body_inferred_max")?;
        if val.is_none() {
            policy.height_body_inferred_max = None;
        } else {
            policy.height_body_inferred_max = Some(val.extract::<usize>()?);
        }
    }
    if let Some(v) = extract_optional_attr::<usize>(&obj, "width_cell_min")? {
        policy.width_cell_min = v;
    }
    if let Some(v) = extract_optional_attr::<usize>(&obj, "width_cell_max")? {
        policy.width_cell_max = v;
    }
    if let Some(v) = extract_optional_attr::<usize>(&obj, "width_cell_padding")? {
        policy.width_cell_padding = v;
    }

    Ok(Some(policy))
}

fn extract_optional_attr<T>(obj: &Bound<'_, PyAny>, attr: &str) -> PyResult<Option<T>>
where
    for<'a> T: FromPyObject<'a>,
{
    if !obj.hasattr(attr)? {
        return Ok(None);
    }
    let val = obj.getattr(attr)?;
    if val.is_none() {
        return Ok(None);
    }
    Ok(Some(val.extract::<T>()?))
}

fn extract_optional_attr_bound<'py>(
    obj: &Bound<'py, PyAny>,
    attr: &str,
) -> PyResult<Option<Bound<'py, PyAny>>> {
    if !obj.hasattr(attr)? {
        return Ok(None);
    }
    let val = obj.getattr(attr)?;
    if val.is_none() {
        return Ok(None);
    }
    Ok(Some(val))
}

#[pymodule]
fn _branchwise_xlsx_rs(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyBranchWiseOutcome>()?;
    module.add_function(wrap_pyfunction!(process_file, module)?)?;
    module.add_function(wrap_pyfunction!(process_files, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
