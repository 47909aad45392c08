mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::convergence::ConvergenceArgs;
use commands::pricing::{BoundaryArgs, LatticeArgs, PriceArgs};

/// American put pricing on a CRR binomial lattice
#[derive(Parser)]
#[command(
    name = "putlat",
    version,
    about = "American put pricing on a CRR binomial lattice",
    long_about = "Prices American puts by backward induction on a Cox-Ross-Rubinstein \
                  lattice and extracts the early-exercise boundary at every interior \
                  time step. Contracts come from flags, a JSON/YAML file, or stdin."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log filter used when RUST_LOG is unset (e.g. info, debug)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Price an American put and report its exercise boundary
    Price(PriceArgs),
    /// Export the early-exercise boundary as per-step rows
    Boundary(BoundaryArgs),
    /// List terminal stock prices and put payoffs
    Lattice(LatticeArgs),
    /// Price across increasing step counts to check convergence
    Convergence(ConvergenceArgs),
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

/// Diagnostics go to stderr so stdout stays machine-readable.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Price(args) => commands::pricing::run_price(args),
        Commands::Boundary(args) => commands::pricing::run_boundary(args),
        Commands::Lattice(args) => commands::pricing::run_lattice(args),
        Commands::Convergence(args) => commands::convergence::run_convergence(args),
        Commands::Version => {
            println!("putlat {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
