//! tabconv - Clinical table conversion with round-trip verification

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use tabconv::codec::sniff_format;
use tabconv::config::{Config, CsvMode, DataFormat, ReportFormat, DEFAULT_SAMPLE_LIMIT, DEFAULT_XPT_DATASET};
use tabconv::convert::{decode, encode, output_file_name};
use tabconv::logging::{init_logging, LogConfig, LogFormat};
use tabconv::output::render_to_stdout;
use tabconv::verify::{verify_all, verify_round_trip};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliFormat {
    Csv,
    Parquet,
    Xpt,
}

impl From<CliFormat> for DataFormat {
    fn from(f: CliFormat) -> Self {
        match f {
            CliFormat::Csv => DataFormat::Csv,
            CliFormat::Parquet => DataFormat::Parquet,
            CliFormat::Xpt => DataFormat::Xpt,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliCsvMode {
    Literal,
    NullAware,
    Infer,
}

impl From<CliCsvMode> for CsvMode {
    fn from(m: CliCsvMode) -> Self {
        match m {
            CliCsvMode::Literal => CsvMode::Literal,
            CliCsvMode::NullAware => CsvMode::NullAware,
            CliCsvMode::Infer => CsvMode::Infer,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliReportFormat {
    Terminal,
    Json,
}

impl From<CliReportFormat> for ReportFormat {
    fn from(f: CliReportFormat) -> Self {
        match f {
            CliReportFormat::Terminal => ReportFormat::Terminal,
            CliReportFormat::Json => ReportFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogFormat {
    Pretty,
    Compact,
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(f: CliLogFormat) -> Self {
        match f {
            CliLogFormat::Pretty => LogFormat::Pretty,
            CliLogFormat::Compact => LogFormat::Compact,
            CliLogFormat::Json => LogFormat::Json,
        }
    }
}

/// Convert clinical tables between CSV, Parquet and XPT and verify round-trip fidelity
#[derive(Parser, Debug)]
#[command(name = "tabconv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: CliLogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a table to another format
    Convert(ConvertArgs),
    /// Report how faithfully each format stores a table
    Verify(VerifyArgs),
}

/// Options shared by both subcommands
#[derive(Args, Debug)]
struct SourceArgs {
    /// Input table
    input: PathBuf,

    /// Input format; taken from the extension, or sniffed when there is none
    #[arg(long, value_enum)]
    from: Option<CliFormat>,

    /// How CSV fields become typed cells
    #[arg(long, value_enum, default_value = "literal")]
    csv_mode: CliCsvMode,

    /// Member name written into XPT files
    #[arg(long, default_value = DEFAULT_XPT_DATASET)]
    dataset: String,

    /// Directory for transient XPT staging files (system temp dir by default)
    #[arg(long)]
    staging_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Target format
    #[arg(long, value_enum)]
    to: CliFormat,

    /// Output file (defaults to the input name with the target extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also print the round-trip report for the target format
    #[arg(long)]
    verify: bool,

    /// Report format for --verify
    #[arg(short, long, value_enum, default_value = "terminal")]
    format: CliReportFormat,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Report format
    #[arg(short, long, value_enum, default_value = "terminal")]
    format: CliReportFormat,

    /// Formats to check (comma-separated, all by default)
    #[arg(long, value_enum, value_delimiter = ',')]
    only: Vec<CliFormat>,

    /// Mismatching rows shown per column
    #[arg(long, default_value_t = DEFAULT_SAMPLE_LIMIT)]
    samples: usize,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose).with_format(cli.log_format.into());
    init_logging(&log_config).context("Failed to initialize logging")?;

    match cli.command {
        Command::Convert(args) => run_convert(args),
        Command::Verify(args) => run_verify(args),
    }
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    let target = DataFormat::from(args.to);
    let config = base_config(&args.source, Config::new(target)).with_report_format(args.format.into());

    let (bytes, source_format) = read_source(&args.source)?;
    let table = decode(source_format, &bytes, &config)
        .with_context(|| format!("Failed to read {}", args.source.input.display()))?;
    let output = encode(target, &table, &config)
        .with_context(|| format!("Failed to convert {} to {}", args.source.input.display(), target))?;

    let out_path = args
        .output
        .unwrap_or_else(|| output_file_name(&args.source.input, target));
    std::fs::write(&out_path, &output)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;

    info!(
        input = %args.source.input.display(),
        output = %out_path.display(),
        from = %source_format,
        to = %target,
        rows = table.row_count(),
        columns = table.column_count(),
        "file converted"
    );

    if args.verify {
        let report = verify_round_trip(target, &table, &config);
        render_to_stdout(&args.source.input, &[report], config.report_format)?;
    } else {
        println!("{} → {}", args.source.input.display(), out_path.display());
    }

    Ok(())
}

fn run_verify(args: VerifyArgs) -> Result<()> {
    let mut config = base_config(&args.source, Config::default())
        .with_report_format(args.format.into())
        .with_sample_limit(args.samples);
    if !args.only.is_empty() {
        config = config.with_verify_formats(args.only.iter().copied().map(DataFormat::from).collect());
    }

    let (bytes, source_format) = read_source(&args.source)?;
    let table = decode(source_format, &bytes, &config)
        .with_context(|| format!("Failed to read {}", args.source.input.display()))?;

    let reports = verify_all(&table, &config);
    render_to_stdout(&args.source.input, &reports, config.report_format)?;

    Ok(())
}

fn base_config(source: &SourceArgs, config: Config) -> Config {
    let config = config
        .with_csv_mode(source.csv_mode.into())
        .with_xpt_dataset_name(source.dataset.clone());
    match &source.staging_dir {
        Some(dir) => config.with_staging_dir(dir.clone()),
        None => config,
    }
}

/// Read the input file and settle its format
fn read_source(source: &SourceArgs) -> Result<(Vec<u8>, DataFormat)> {
    let bytes = std::fs::read(&source.input)
        .with_context(|| format!("Failed to read {}", source.input.display()))?;

    let format = match source.from {
        Some(format) => format.into(),
        None => detect_format(&source.input, &bytes)?,
    };

    Ok((bytes, format))
}

fn detect_format(path: &Path, bytes: &[u8]) -> Result<DataFormat> {
    if path.extension().is_none() {
        return Ok(sniff_format(bytes));
    }
    Ok(DataFormat::from_path(path)?)
}
