//! respondent CLI — run the QA evaluation pipeline from the terminal.
//!
//! Wires the conversion, generation, and scoring stages of
//! `respondent-core` together behind clap subcommands; all configuration
//! flows through an explicit config struct, never ambient environment
//! state.

use anyhow::Context;
use clap::Parser;
use respondent_core::config::{PipelineConfig, ValidationPolicy};
use respondent_core::generator::HttpGenerator;
use respondent_core::metrics::format_score;
use respondent_core::workflow::{StepSelection, Workflow};
use respondent_core::{SummaryStats, dataset};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Respondent: question/answer evaluation pipeline
#[derive(Parser, Debug)]
#[command(name = "respondent", version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Remote generation endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Model identifier forwarded to the endpoint
    #[arg(short, long)]
    model: Option<String>,

    /// Concurrent workers for generation and scoring
    #[arg(short, long)]
    workers: Option<usize>,

    /// Overall-score threshold for counting passing items
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Drop invalid records instead of aborting on validation errors
    #[arg(long)]
    drop_invalid: bool,

    /// Directory for output files (defaults to the input's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline: convert, generate, evaluate, report
    Run {
        /// Input file: a spreadsheet (.xlsx/.xls) or a JSON record array
        input: PathBuf,

        /// Skip spreadsheet conversion (input is already JSON)
        #[arg(long)]
        skip_convert: bool,

        /// Skip response generation (records already carry actual answers)
        #[arg(long)]
        skip_generate: bool,

        /// Skip scoring (stop after generation)
        #[arg(long)]
        skip_evaluate: bool,
    },
    /// Convert a spreadsheet to JSON records without scoring
    Convert {
        input: PathBuf,

        /// Output path (defaults to `<stem>_input.json` next to the input)
        #[arg(short = 'f', long)]
        output: Option<PathBuf>,

        /// Worksheet name (defaults to the first sheet)
        #[arg(long)]
        sheet: Option<String>,
    },
    /// Score already-generated records offline (no remote calls)
    Evaluate { input: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Run {
            input,
            skip_convert,
            skip_generate,
            skip_evaluate,
        } => {
            let steps = StepSelection {
                convert: !skip_convert,
                generate: !skip_generate,
                evaluate: !skip_evaluate,
            };
            let mut workflow = Workflow::new(config.clone());
            if steps.generate {
                let generator = HttpGenerator::from_config(&config)
                    .context("failed to build generation client")?;
                workflow = workflow.with_generator(Arc::new(generator));
            }
            let output = workflow
                .run(input, cli.output_dir.as_deref(), steps, &interrupt_token())
                .await?;
            print_summary(&output.summary);
            println!();
            println!("Scored items: {}", output.items_path.display());
            println!("Report:       {}", output.report_path.display());
        }
        Commands::Convert {
            input,
            output,
            sheet,
        } => {
            let items = respondent_core::convert::convert_workbook(input, sheet.as_deref())?;
            let path = output
                .clone()
                .unwrap_or_else(|| dataset::input_json_path(input));
            dataset::write_items(&path, &items)?;
            println!("Converted {} records to {}", items.len(), path.display());
        }
        Commands::Evaluate { input } => {
            let workflow = Workflow::new(config);
            let output = workflow
                .run(
                    input,
                    cli.output_dir.as_deref(),
                    StepSelection::evaluate_only(),
                    &interrupt_token(),
                )
                .await?;
            print_summary(&output.summary);
        }
    }

    Ok(())
}

/// Merge the optional TOML config file with CLI flag overrides.
fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(threshold) = cli.threshold {
        config.pass_threshold = threshold;
    }
    if cli.drop_invalid {
        config.validation_policy = ValidationPolicy::DropInvalid;
    }
    Ok(config)
}

/// Token that fires on Ctrl-C: stops issuing new per-item work while
/// letting in-flight requests finish.
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, letting in-flight work finish");
            token.cancel();
        }
    });
    cancel
}

fn print_summary(summary: &SummaryStats) {
    println!("===== EVALUATION REPORT =====");
    println!("Total items:       {}", summary.total_items);
    println!("Scored items:      {}", summary.scored_items);
    println!("Skipped items:     {}", summary.skipped_items);
    println!("Mean accuracy:     {}", format_score(summary.mean_accuracy));
    println!("Mean completeness: {}", format_score(summary.mean_completeness));
    println!("Mean relevance:    {}", format_score(summary.mean_relevance));
    println!("Mean overall:      {}", format_score(summary.mean_overall));
    println!(
        "Passing (overall >= {:.1}): {}/{}",
        summary.pass_threshold, summary.pass_count, summary.scored_items
    );
    if !summary.skipped.is_empty() {
        println!("Skipped:");
        for item in &summary.skipped {
            println!("  {}: {}", item.id, item.reason);
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));
    tracing_subscriber::registry().with(stderr_layer).init();
}
