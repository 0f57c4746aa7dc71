use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use modscope::config::AnalyzerConfig;
use modscope::core::CodebaseAnalyzer;
use modscope::formatters::JsonReportFormatter;
use modscope::sources::FileScanner;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "modscope",
    version,
    about = "Import resolution and dependency graphs for Python package trees"
)]
struct Cli {
    /// Root directory of the package tree to analyze
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// Report file path
    #[arg(short, long, value_name = "FILE", default_value = "modscope.json")]
    output: PathBuf,

    /// Config file (defaults to <input>/.modscope.toml when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write single-line JSON
    #[arg(long)]
    compact: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli)
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let Cli {
        input,
        output,
        config,
        compact,
        verbose: _,
    } = cli;

    let start_time = Instant::now();

    let config = match config {
        Some(path) => AnalyzerConfig::load(&path)?,
        None => AnalyzerConfig::discover(&input)?,
    };

    let sources = FileScanner::new(&config)
        .collect(&input)
        .with_context(|| format!("Failed to collect sources under {}", input.display()))?;
    tracing::info!("Found {} source files", sources.len());

    let analyzer = CodebaseAnalyzer::new(config);
    let report = analyzer
        .analyze(&input, sources)
        .with_context(|| format!("Analysis of {} aborted", input.display()))?;

    let formatter = if compact {
        JsonReportFormatter::compact()
    } else {
        JsonReportFormatter::new()
    };
    formatter.format_to_file(&report, &output)?;

    println!(
        "{} modules, {} packages, {} declarations, {} import edges, {} extends edges, {} cycles, {} diagnostics -> {} ({:.2}s)",
        report.modules.len(),
        report.packages.len(),
        report.declaration_count(),
        report.import_edges().len(),
        report.extends_edge_count(),
        report.cycles.len(),
        report.diagnostics.len(),
        output.display(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}
