use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::LatticeError;
use crate::lattice::engine::backward_induction;
use crate::lattice::params::{derive_lattice_params, AmericanPutInput};
use crate::types::*;
use crate::LatticeResult;

/// Input for a step-count convergence study
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceInput {
    /// Contract and lattice settings; its `steps` field is replaced by each entry of `step_counts`
    pub base: AmericanPutInput,
    /// Strictly increasing step counts to price at
    pub step_counts: Vec<u32>,
    /// Declare convergence when the last absolute price change is within this
    #[serde(default)]
    pub tolerance: Option<Price>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergencePoint {
    pub steps: u32,
    pub option_price: Price,
    pub change_from_previous: Option<Price>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceOutput {
    pub points: Vec<ConvergencePoint>,
    pub final_price: Price,
    pub last_abs_change: Option<Price>,
    pub max_abs_change: Option<Price>,
    /// `None` when no tolerance was supplied or only one step count was priced
    pub converged: Option<bool>,
}

/// Step-count ladder `start, 2*start, 4*start, ...` with `count` entries.
pub fn doubling_step_counts(start: u32, count: usize) -> LatticeResult<Vec<u32>> {
    if start < 1 {
        return Err(LatticeError::invalid("start", "must be at least 1"));
    }
    let mut counts = Vec::with_capacity(count);
    let mut steps = start;
    for i in 0..count {
        counts.push(steps);
        if i + 1 < count {
            steps = steps.checked_mul(2).ok_or_else(|| {
                LatticeError::invalid("count", "doubling ladder exceeds the largest step count")
            })?;
        }
    }
    Ok(counts)
}

fn validate_step_counts(step_counts: &[u32]) -> LatticeResult<()> {
    if step_counts.is_empty() {
        return Err(LatticeError::invalid("step_counts", "at least one step count is required"));
    }
    if step_counts.contains(&0) {
        return Err(LatticeError::invalid("step_counts", "every step count must be at least 1"));
    }
    if step_counts.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(LatticeError::invalid("step_counts", "must be strictly increasing"));
    }
    Ok(())
}

/// Price the same contract at each step count and report how the price settles.
pub fn analyze_convergence(
    input: &ConvergenceInput,
) -> LatticeResult<ComputationOutput<ConvergenceOutput>> {
    let start = Instant::now();
    validate_step_counts(&input.step_counts)?;
    if let Some(tol) = input.tolerance {
        if !tol.is_finite() || tol <= 0.0 {
            return Err(LatticeError::invalid("tolerance", "must be positive and finite"));
        }
    }

    let mut points: Vec<ConvergencePoint> = Vec::with_capacity(input.step_counts.len());
    for &steps in &input.step_counts {
        let contract = AmericanPutInput {
            steps,
            ..input.base.clone()
        };
        let params = derive_lattice_params(&contract)?;
        let priced = backward_induction(contract.spot_price, contract.strike_price, &params)?;
        let change_from_previous = points
            .last()
            .map(|prev| priced.option_price - prev.option_price);
        points.push(ConvergencePoint {
            steps,
            option_price: priced.option_price,
            change_from_previous,
        });
    }

    let abs_changes: Vec<Price> = points
        .iter()
        .filter_map(|p| p.change_from_previous.map(f64::abs))
        .collect();
    let last_abs_change = abs_changes.last().copied();
    let max_abs_change = abs_changes.iter().copied().reduce(f64::max);
    let converged = match (input.tolerance, last_abs_change) {
        (Some(tol), Some(change)) => Some(change <= tol),
        _ => None,
    };

    let mut warnings = Vec::new();
    if let (Some(first), Some(last)) = (abs_changes.first(), abs_changes.last()) {
        if abs_changes.len() > 1 && last > first {
            warnings.push(
                "Price changes are not shrinking across the supplied step counts; CRR prices oscillate, extend the ladder"
                    .into(),
            );
        }
    }
    if converged == Some(false) {
        warnings.push("Last price change exceeds the requested tolerance".into());
    }

    let final_price = points.last().map(|p| p.option_price).unwrap_or_default();
    let output = ConvergenceOutput {
        points,
        final_price,
        last_abs_change,
        max_abs_change,
        converged,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "CRR Binomial Lattice — Step-Count Convergence",
        &serde_json::json!({
            "step_counts": input.step_counts,
            "compounding": input.base.compounding,
            "round_decimal_places": input.base.round_decimal_places,
            "tolerance": input.tolerance,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::params::Compounding;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn sample_input(step_counts: Vec<u32>) -> ConvergenceInput {
        ConvergenceInput {
            base: AmericanPutInput {
                spot_price: 51.0,
                strike_price: 53.0,
                time_to_expiry: 0.5,
                volatility: 0.32,
                risk_free_rate: 0.05,
                steps: 1,
                compounding: Compounding::Discrete,
                round_decimal_places: None,
            },
            step_counts,
            tolerance: None,
        }
    }

    #[test]
    fn test_doubling_ladder() {
        assert_eq!(doubling_step_counts(50, 4).unwrap(), vec![50, 100, 200, 400]);
        assert_eq!(doubling_step_counts(7, 1).unwrap(), vec![7]);
        assert!(doubling_step_counts(0, 3).is_err());
        assert!(doubling_step_counts(u32::MAX / 2 + 1, 2).is_err());
    }

    #[test]
    fn test_prices_per_step_count() {
        let output = analyze_convergence(&sample_input(vec![50, 100, 200])).unwrap();
        let points = &output.result.points;
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].change_from_previous, None);
        assert_relative_eq!(points[0].option_price, 5.158804500418553, epsilon = 1e-9);
        assert_relative_eq!(points[1].option_price, 5.139984795300429, epsilon = 1e-9);
        assert_relative_eq!(points[2].option_price, 5.141744821058184, epsilon = 1e-9);
        assert_relative_eq!(
            points[1].change_from_previous.unwrap(),
            5.139984795300429 - 5.158804500418553,
            epsilon = 1e-9
        );
        assert_eq!(output.result.final_price, points[2].option_price);
        assert_relative_eq!(
            output.result.max_abs_change.unwrap(),
            5.158804500418553 - 5.139984795300429,
            epsilon = 1e-9
        );
        assert_eq!(output.result.converged, None);
    }

    #[test]
    fn test_tolerance_decides_convergence() {
        let mut input = sample_input(vec![400, 800]);
        input.tolerance = Some(1e-3);
        let output = analyze_convergence(&input).unwrap();
        assert_eq!(output.result.converged, Some(true));

        input.tolerance = Some(1e-6);
        let output = analyze_convergence(&input).unwrap();
        assert_eq!(output.result.converged, Some(false));
        assert!(output.warnings.iter().any(|w| w.contains("tolerance")));
    }

    #[test]
    fn test_invalid_step_counts() {
        assert!(analyze_convergence(&sample_input(vec![])).is_err());
        assert!(analyze_convergence(&sample_input(vec![0, 10])).is_err());
        assert!(analyze_convergence(&sample_input(vec![100, 50])).is_err());
        assert!(analyze_convergence(&sample_input(vec![10, 10])).is_err());
    }

    #[test]
    fn test_invalid_contract_propagates() {
        let mut input = sample_input(vec![10, 20]);
        input.base.volatility = 0.0;
        match analyze_convergence(&input) {
            Err(LatticeError::InvalidParameter { field, .. }) => assert_eq!(field, "volatility"),
            other => panic!("Expected InvalidParameter, got {other:?}"),
        }
    }
}
