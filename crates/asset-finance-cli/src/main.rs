mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::debt::{BlendedTargetArgs, SizeDebtArgs};
use commands::model::ModelArgs;
use commands::returns::XirrArgs;

/// Debt sizing and equity returns for asset portfolios
#[derive(Parser)]
#[command(
    name = "afm",
    version,
    about = "Debt sizing and equity returns for asset portfolios",
    long_about = "A CLI for project-finance modelling of power generation and storage \
                  portfolios with decimal precision. Sizes DSCR-sculpted or annuity debt, \
                  builds monthly amortization schedules, consolidates cash flows and \
                  solves equity IRR on irregular dates."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Enable debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full portfolio model from a JSON or YAML input
    Model(ModelArgs),
    /// Size debt for a single asset from periodic cash flows
    SizeDebt(SizeDebtArgs),
    /// Revenue-mix-weighted DSCR target
    BlendedTarget(BlendedTargetArgs),
    /// Solve XIRR for dated cash flows
    Xirr(XirrArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("asset_finance_core=debug,afm=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // stdout carries the result, so logs go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Model(args) => commands::model::run_model(args),
        Commands::SizeDebt(args) => commands::debt::run_size_debt(args),
        Commands::BlendedTarget(args) => commands::debt::run_blended_target(args),
        Commands::Xirr(args) => commands::returns::run_xirr(args),
        Commands::Version => {
            println!("afm {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
