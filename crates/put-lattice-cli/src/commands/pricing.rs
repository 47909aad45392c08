use clap::Args;
use serde_json::{json, Value};

use put_lattice_core::lattice::{
    derive_lattice_params, price_american_put, terminal_prices, BoundaryEntry,
};

use super::contract::ContractArgs;

/// Arguments for American put pricing
#[derive(Args)]
pub struct PriceArgs {
    #[command(flatten)]
    pub contract: ContractArgs,
}

/// Arguments for early-exercise boundary export
#[derive(Args)]
pub struct BoundaryArgs {
    #[command(flatten)]
    pub contract: ContractArgs,

    /// Drop steps where early exercise is never optimal
    #[arg(long)]
    pub exercise_only: bool,
}

/// Arguments for listing the terminal lattice level
#[derive(Args)]
pub struct LatticeArgs {
    #[command(flatten)]
    pub contract: ContractArgs,
}

pub fn run_price(args: PriceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let contract = args.contract.resolve()?;
    let output = price_american_put(&contract)?;
    tracing::info!(
        steps = contract.steps,
        option_price = output.result.option_price,
        elapsed_us = output.metadata.computation_time_us,
        warnings = output.warnings.len(),
        "priced american put"
    );
    Ok(serde_json::to_value(output)?)
}

/// Boundary rows with a fixed column set, so tabular formats line up even
/// when the first step has no exercise node.
fn boundary_row(entry: &BoundaryEntry) -> Value {
    json!({
        "time_step": entry.time_step,
        "time": entry.time,
        "decision": entry.point.label(),
        "node": entry.point.node(),
        "stock_price": entry.point.stock_price(),
    })
}

pub fn run_boundary(args: BoundaryArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let contract = args.contract.resolve()?;
    let output = price_american_put(&contract)?;
    let boundary = &output.result.boundary;

    let fragmented = boundary.fragmented_steps();
    if !fragmented.is_empty() {
        tracing::warn!(steps = ?fragmented, "exercise region is not contiguous");
    }

    let rows: Vec<Value> = boundary
        .entries()
        .iter()
        .filter(|entry| !args.exercise_only || entry.point.stock_price().is_some())
        .map(boundary_row)
        .collect();
    tracing::debug!(
        rows = rows.len(),
        first_exercise_step = ?boundary.first_exercise_step(),
        "exported exercise boundary"
    );

    let mut value = serde_json::to_value(&output)?;
    value["result"] = Value::Array(rows);
    Ok(value)
}

pub fn run_lattice(args: LatticeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let contract = args.contract.resolve()?;
    let params = derive_lattice_params(&contract)?;
    let prices = terminal_prices(contract.spot_price, &params)?;
    let steps = params.steps;

    let rows: Vec<Value> = prices
        .iter()
        .enumerate()
        .map(|(node, &stock_price)| {
            let up_moves = node as u32;
            json!({
                "node": up_moves,
                "up_moves": up_moves,
                "down_moves": steps - up_moves,
                "stock_price": stock_price,
                "payoff": (contract.strike_price - stock_price).max(0.0),
            })
        })
        .collect();
    tracing::debug!(nodes = rows.len(), "listed terminal lattice level");

    Ok(json!({
        "result": rows,
        "methodology": "CRR Binomial Lattice — Terminal Stock Prices and Put Payoffs",
        "assumptions": params,
        "warnings": [],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use put_lattice_core::lattice::BoundaryPoint;

    fn contract_args(steps: u32) -> ContractArgs {
        ContractArgs {
            input: None,
            spot: Some(51.0),
            strike: Some(53.0),
            expiry: Some(0.5),
            volatility: Some(0.32),
            rate: Some(0.05),
            steps: Some(steps),
            compounding: None,
            round_dp: None,
        }
    }

    #[test]
    fn test_boundary_row_keeps_columns_for_markers() {
        let row = boundary_row(&BoundaryEntry {
            time_step: 1,
            time: 0.125,
            point: BoundaryPoint::NoExercise,
        });
        assert_eq!(row["decision"], "no_exercise");
        assert!(row["node"].is_null());
        assert!(row["stock_price"].is_null());
    }

    #[test]
    fn test_boundary_command_lists_interior_steps() {
        let value = run_boundary(BoundaryArgs {
            contract: contract_args(4),
            exercise_only: false,
        })
        .unwrap();
        let rows = value["result"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["time_step"], 1);
        assert!(value["methodology"].is_string());

        let value = run_boundary(BoundaryArgs {
            contract: contract_args(4),
            exercise_only: true,
        })
        .unwrap();
        let rows = value["result"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["decision"] == "exercise"));
    }

    #[test]
    fn test_lattice_command_lists_terminal_nodes() {
        let value = run_lattice(LatticeArgs {
            contract: contract_args(4),
        })
        .unwrap();
        let rows = value["result"].as_array().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[2]["down_moves"], 2);
        let middle = rows[2]["stock_price"].as_f64().unwrap();
        assert!((middle - 51.0).abs() < 1e-9);
        assert_eq!(rows[4]["payoff"], 0.0);
    }

    #[test]
    fn test_price_command_returns_envelope() {
        let value = run_price(PriceArgs {
            contract: contract_args(4),
        })
        .unwrap();
        let price = value["result"]["option_price"].as_f64().unwrap();
        assert!((price - 5.249558827065661).abs() < 1e-9);
        assert_eq!(value["metadata"]["precision"], "ieee754_f64");
    }
}
