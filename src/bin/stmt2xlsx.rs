use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use statement_xlsx::{
    BatchSummary, CanonicalRecord, ConversionReport, ConvertOptions, DEFAULT_SHEET_NAME,
    PageSelection, SourceFormat, StatementTemplate, convert_batch, reconstruct_statement,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "stmt2xlsx",
    version,
    about = "Convert bank statement PDFs and tabular files into Excel workbooks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert each input into <output-dir>/<stem>_converted.xlsx.
    Convert(ConvertArgs),
    /// Print the records reconstructed from one statement PDF.
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
struct TemplateArgs {
    /// Six column boundaries x0,...,x5 for statement PDFs.
    #[arg(long)]
    columns: Option<String>,

    /// Horizontal slack when assigning text to a column.
    #[arg(long)]
    text_tolerance: Option<f32>,

    /// How far outside the outer boundaries text is still accepted.
    #[arg(long)]
    intersection_x_tolerance: Option<f32>,

    /// Baseline distance within which text shares a line.
    #[arg(long)]
    text_y_tolerance: Option<f32>,

    /// Page selection like 1-3,5.
    #[arg(long)]
    pages: Option<String>,

    /// Name of the output sheet.
    #[arg(long, default_value = DEFAULT_SHEET_NAME)]
    sheet_name: String,
}

#[derive(Debug, Args)]
struct ConvertArgs {
    /// Input files (csv, tsv, txt, json, pdf).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory receiving the workbooks.
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Number of files converted in parallel.
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    #[command(flatten)]
    template: TemplateArgs,

    /// Print every warning of each statement report.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Args)]
struct InspectArgs {
    /// Statement PDF.
    input: PathBuf,

    #[command(flatten)]
    template: TemplateArgs,

    /// Print records and report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct InspectResponse<'a> {
    records: &'a [CanonicalRecord],
    report: &'a ConversionReport,
}

fn parse_options(args: &TemplateArgs) -> Result<ConvertOptions> {
    let mut template = args
        .columns
        .as_deref()
        .map(StatementTemplate::from_str)
        .transpose()
        .context("failed to parse --columns")?
        .unwrap_or_default();
    if let Some(value) = args.text_tolerance {
        template.text_tolerance = value;
    }
    if let Some(value) = args.intersection_x_tolerance {
        template.intersection_x_tolerance = value;
    }
    if let Some(value) = args.text_y_tolerance {
        template.text_y_tolerance = value;
    }
    template.validate().context("invalid statement template")?;

    let pages = args
        .pages
        .as_deref()
        .map(PageSelection::from_str)
        .transpose()
        .context("failed to parse --pages")?;

    Ok(ConvertOptions {
        template,
        pages,
        sheet_name: args.sheet_name.clone(),
    })
}

fn log_report(report: &ConversionReport, verbose: bool) {
    if report.warnings.is_empty() {
        return;
    }

    eprintln!("  warning: {} issue(s) detected", report.warnings.len());
    if verbose {
        for warning in &report.warnings {
            eprintln!(
                "    - {:?} page={:?} table={:?}: {}",
                warning.code, warning.page, warning.table_index, warning.message
            );
        }
    }
}

fn print_summary(summary: &BatchSummary, verbose: bool) {
    for outcome in &summary.converted {
        eprintln!(
            "converted: {} -> {}",
            outcome.input.display(),
            outcome.output.display()
        );
        if let Some(report) = &outcome.report {
            log_report(report, verbose);
        }
    }
    for failure in &summary.failed {
        eprintln!("failed: {}: {}", failure.input.display(), failure.message);
    }
    eprintln!(
        "conversion complete: {}/{} succeeded",
        summary.converted.len(),
        summary.total()
    );
}

fn run_convert(args: &ConvertArgs) -> Result<ExitCode> {
    let options = parse_options(&args.template)?;
    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "failed to create output directory '{}'",
            args.output_dir.display()
        )
    })?;

    let summary = convert_batch(&args.inputs, &args.output_dir, &options, args.jobs.max(1));
    print_summary(&summary, args.verbose);

    let code = if summary.failed.is_empty() {
        ExitCode::SUCCESS
    } else if summary.failed.iter().all(|failure| failure.no_data) {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    };
    Ok(code)
}

fn run_inspect(args: &InspectArgs) -> Result<ExitCode> {
    let options = parse_options(&args.template)?;
    let (output, report) = reconstruct_statement(&args.input, &options)
        .with_context(|| format!("failed to reconstruct '{}'", args.input.display()))?;

    if args.json {
        let response = InspectResponse {
            records: &output.records,
            report: &report,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(ExitCode::SUCCESS);
    }

    for (index, record) in output.records.iter().enumerate() {
        println!("#{}", index + 1);
        for (field, value) in ["date", "details", "debit", "credit", "balance"]
            .iter()
            .zip(record.fields())
        {
            let value = value.unwrap_or("-").replace('\n', " | ");
            println!("  {field:<8} {value}");
        }
    }
    log_report(&report, true);
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("statement_xlsx=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Convert(args) => run_convert(args),
        Commands::Inspect(args) => run_inspect(args),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            let supported = SourceFormat::ALL
                .iter()
                .map(|format| format.extension())
                .collect::<Vec<_>>()
                .join(", ");
            eprintln!("error: {error:#}");
            eprintln!("supported formats: {supported}");
            ExitCode::from(1)
        }
    }
}
