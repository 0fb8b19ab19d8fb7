use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use attendance_sheet::file_name;
use attendance_sheet::process_bytes;
use attendance_sheet::write_csv;
use attendance_sheet::AttendanceSummary;
use attendance_sheet::Options;
use attendance_sheet::ProcessError;
use chrono::Local;
use chrono::NaiveDate;
use clap::ArgAction;
use clap::Parser;
use std::fs;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing::Level;

/// Largest workbook accepted, in bytes
const MAX_FILE_SIZE: u64 = 32 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(
    name = "attendance-summary",
    version,
    about = "Summarize a biometric attendance report",
    long_about = "Detect the layout of an attendance report workbook (xls or xlsx) and export its records as CSV."
)]
struct Cli {
    /// Attendance report workbook (.xls or .xlsx)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Directory the summary CSV is written into
    #[arg(short = 'o', long = "output-dir", value_name = "DIR", default_value = ".", conflicts_with = "stdout")]
    output_dir: PathBuf,

    /// Write the CSV to stdout instead of a file
    #[arg(long = "stdout", action = ArgAction::SetTrue)]
    stdout: bool,

    /// Skip the container structure check
    #[arg(long = "no-validate", action = ArgAction::SetTrue)]
    no_validate: bool,

    /// Date used when the report carries none (YYYY-MM-DD, defaults to today)
    #[arg(long = "date", value_name = "DATE")]
    date: Option<NaiveDate>,

    /// Rows above the header searched for the report date
    #[arg(long = "scan-rows", value_name = "N", default_value_t = 10)]
    scan_rows: usize,

    /// Log recognizer attempts
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue, conflicts_with = "quiet")]
    verbose: bool,

    /// Log warnings only
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

impl Cli {
    fn level(&self) -> Level {
        match (self.verbose, self.quiet) {
            (true, _) => Level::DEBUG,
            (_, true) => Level::WARN,
            _ => Level::INFO,
        }
    }

    fn options(&self) -> Options {
        Options {
            validate_container: !self.no_validate,
            processing_date: self.date.unwrap_or_else(|| Local::now().date_naive()),
            scan_rows: self.scan_rows,
            ..Options::default()
        }
    }
}

fn read_capped(path: &Path) -> Result<Vec<u8>> {
    let size = fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();
    if size > MAX_FILE_SIZE {
        bail!("{} is {} bytes, larger than the {} byte limit", path.display(), size, MAX_FILE_SIZE);
    }
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn export(cli: &Cli, summary: &AttendanceSummary) -> Result<()> {
    if cli.stdout {
        return write_csv(std::io::stdout().lock(), summary).context("Failed to write summary to stdout");
    }
    let path = cli.output_dir.join(file_name(summary.date));
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_csv(BufWriter::new(file), summary).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "summary written");
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let data = read_capped(&cli.file)?;
    let extension = cli.file
        .extension()
        .map(|extension| extension.to_string_lossy().into_owned())
        .unwrap_or_default();

    let summary = process_bytes(&data, &extension, &cli.options())
        .with_context(|| format!("Failed to process {}", cli.file.display()))?;

    eprintln!("Detected layout: {}", summary.layout);
    eprintln!("Report date: {}", summary.date);
    eprintln!("Records: {}", summary.records.len());
    for warning in &summary.warnings {
        eprintln!("warning: {warning}");
    }

    export(cli, &summary)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.level())
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error:#}");
            match error.downcast_ref::<ProcessError>() {
                Some(ProcessError::UnrecognizedFormat | ProcessError::CorruptContainer { .. }) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
