use clap::Args;
use serde_json::Value;

use put_lattice_core::convergence::analysis::{
    analyze_convergence, doubling_step_counts, ConvergenceInput,
};

use super::contract::ContractArgs;

/// Arguments for a step-count convergence study
#[derive(Args)]
pub struct ConvergenceArgs {
    #[command(flatten)]
    pub contract: ContractArgs,

    /// Comma-separated, strictly increasing step counts (e.g. 50,100,200)
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["start", "doublings"])]
    pub step_counts: Option<Vec<u32>>,

    /// First step count of a doubling ladder
    #[arg(long, default_value = "50")]
    pub start: u32,

    /// Number of entries in the doubling ladder
    #[arg(long, default_value = "5")]
    pub doublings: usize,

    /// Declare convergence when the last price change is within this
    #[arg(long)]
    pub tolerance: Option<f64>,
}

pub fn run_convergence(args: ConvergenceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let base = args.contract.resolve()?;
    let step_counts = match args.step_counts {
        Some(counts) => counts,
        None => doubling_step_counts(args.start, args.doublings)?,
    };
    tracing::debug!(?step_counts, "running convergence study");

    let output = analyze_convergence(&ConvergenceInput {
        base,
        step_counts,
        tolerance: args.tolerance,
    })?;
    tracing::info!(
        final_price = output.result.final_price,
        converged = ?output.result.converged,
        "convergence study complete"
    );
    Ok(serde_json::to_value(output)?)
}
