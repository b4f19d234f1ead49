use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use branchwise_xlsx::spec::{EnumAutofitColumnsRule, EnumCountOrder, EnumInputOutcome};
use branchwise_xlsx::{
    C_COLUMN_GROUP, C_SUBJECT_PLACEHOLDER, SpecBranchWiseOptions, SpecInputFile, process_batch,
};
use clap::{Parser, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CountOrderArg {
    Frequency,
    FirstSeen,
}

impl From<CountOrderArg> for EnumCountOrder {
    fn from(value: CountOrderArg) -> Self {
        match value {
            CountOrderArg::Frequency => EnumCountOrder::Frequency,
            CountOrderArg::FirstSeen => EnumCountOrder::FirstSeen,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "branchwise",
    about = "Split exported tables by branch into one XLSX workbook per input."
)]
struct Args {
    /// Input CSV files, processed in the given order.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Directory receiving `BranchWise_<name>.xlsx` files.
    #[arg(long, default_value = ".", env = "BRANCHWISE_OUT_DIR")]
    out_dir: PathBuf,

    /// Subject written to the overview sheet.
    #[arg(long, default_value = C_SUBJECT_PLACEHOLDER, env = "BRANCHWISE_SUBJECT")]
    subject: String,

    /// Grouping column (exact, case-sensitive).
    #[arg(long, default_value = C_COLUMN_GROUP)]
    column: String,

    /// Single-byte field delimiter.
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Ordering of the overview count table.
    #[arg(long, value_enum, default_value_t = CountOrderArg::Frequency)]
    count_order: CountOrderArg,

    /// Size data-sheet columns from their header and values.
    #[arg(long)]
    autofit: bool,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let options = derive_options(&args)?;
    let l_inputs = args
        .files
        .iter()
        .map(|path| read_input(path))
        .collect::<Result<Vec<_>>>()?;

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let mut n_failed = 0usize;
    for outcome in process_batch(&l_inputs, &options) {
        match &outcome {
            EnumInputOutcome::Success(output) => {
                let path_out = args.out_dir.join(&output.file_name);
                fs::write(&path_out, &output.content)
                    .with_context(|| format!("writing {}", path_out.display()))?;
                for c_warning in &output.report.warnings {
                    eprintln!("warning: {}: {c_warning}", output.source_name);
                }
                info!(path = %path_out.display(), "wrote workbook");
                println!("{}", outcome.message());
            }
            EnumInputOutcome::Failure { .. } => {
                n_failed += 1;
                eprintln!("{}", outcome.message());
            }
        }
    }

    debug!(n_inputs = l_inputs.len(), n_failed, "batch finished");
    Ok(if n_failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn derive_options(args: &Args) -> Result<SpecBranchWiseOptions> {
    let mut options = SpecBranchWiseOptions {
        column_group: args.column.clone(),
        subject_name: args.subject.clone(),
        separator: parse_delimiter(args.delimiter)?,
        rule_count_order: args.count_order.into(),
        ..Default::default()
    };
    if args.autofit {
        options.write_options.policy_autofit.rule_columns = EnumAutofitColumnsRule::All;
    }
    Ok(options)
}

fn parse_delimiter(delimiter: char) -> Result<u8> {
    if !delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character, got {delimiter:?}");
    }
    Ok(delimiter as u8)
}

fn read_input(path: &Path) -> Result<SpecInputFile> {
    let content = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("no file name in {}", path.display()))?;
    Ok(SpecInputFile::new(file_name, content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_map_onto_options() {
        let args = Args::parse_from([
            "branchwise",
            "--subject",
            "Maths",
            "--delimiter",
            ";",
            "--count-order",
            "first-seen",
            "a.csv",
        ]);
        let options = derive_options(&args).expect("options");
        assert_eq!(options.subject_name, "Maths");
        assert_eq!(options.separator, b';');
        assert_eq!(options.rule_count_order, EnumCountOrder::FirstSeen);
        assert_eq!(options.column_group, "Select Branch");
        assert_eq!(args.files, vec![PathBuf::from("a.csv")]);
    }

    #[test]
    fn test_non_ascii_delimiter_is_rejected() {
        assert!(parse_delimiter('§').is_err());
        assert_eq!(parse_delimiter('\t').expect("tab"), b'\t');
    }

    #[test]
    fn test_read_input_keeps_file_name_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("quiz.csv");
        fs::write(&path, "Select Branch\nCSE\n").expect("write");

        let input = read_input(&path).expect("read");
        assert_eq!(input.file_name, "quiz.csv");
        assert_eq!(input.content, b"Select Branch\nCSE\n".to_vec());
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = read_input(Path::new("/nonexistent/branchwise.csv")).unwrap_err();
        assert!(err.to_string().contains("reading /nonexistent/branchwise.csv"));
    }
}
