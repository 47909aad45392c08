use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::LatticeError;
use crate::lattice::boundary::{classify_level, BoundaryEntry, ExerciseBoundary};
use crate::lattice::params::{derive_lattice_params, AmericanPutInput, LatticeParams};
use crate::types::*;
use crate::LatticeResult;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingResult {
    /// Value of the root node
    pub option_price: Price,
    /// Whether exercising at valuation strictly beats holding
    pub exercise_at_valuation: bool,
    pub boundary: ExerciseBoundary,
    /// Parameters used for both the price and the boundary
    pub params: LatticeParams,
}

// ---------------------------------------------------------------------------
// Lattice helpers
// ---------------------------------------------------------------------------

fn put_payoff(strike: Price, stock_price: Price) -> Price {
    (strike - stock_price).max(0.0)
}

fn require_positive(field: &str, value: f64) -> LatticeResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(LatticeError::invalid(field, "must be positive and finite"));
    }
    Ok(())
}

/// Stock prices at maturity, ordered by up-move count.
///
/// The lowest node is `s * d^n`; each node above it is the previous one
/// times `u / d`, so no power is recomputed per node.
pub fn terminal_prices(spot: Price, params: &LatticeParams) -> LatticeResult<Vec<Price>> {
    params.validate()?;
    require_positive("spot_price", spot)?;

    let steps = params.steps;
    let n = f64::from(steps);
    let top = spot * (n * params.up_factor.ln()).exp();
    if !top.is_finite() {
        return Err(LatticeError::NumericOverflow {
            steps,
            context: "highest terminal stock price s*u^n exceeds f64 range".into(),
        });
    }
    let bottom = spot * (n * params.down_factor.ln()).exp();
    if !bottom.is_normal() {
        return Err(LatticeError::NumericOverflow {
            steps,
            context: "lowest terminal stock price s*d^n underflows f64".into(),
        });
    }

    let (u, d) = (params.up_factor, params.down_factor);
    Ok(std::iter::successors(Some(bottom), |&price| Some(price * u / d))
        .take(steps as usize + 1)
        .collect())
}

/// Move node prices one step towards valuation: `S(k-1, i) = S(k, i) / d`.
fn step_back_prices(prices: &mut Vec<Price>, nodes: usize, down_factor: f64) {
    prices.truncate(nodes);
    prices.iter_mut().for_each(|price| *price /= down_factor);
}

fn fill_exercise_values(strike: Price, prices: &[Price], out: &mut [Price]) {
    for (value, &price) in out.iter_mut().zip(prices) {
        *value = put_payoff(strike, price);
    }
}

/// Discounted risk-neutral expectation over the two successors of each node.
fn fill_continuation_values(next_level: &[Price], params: &LatticeParams, out: &mut [Price]) {
    let nodes = out.len();
    let p = params.up_probability;
    let q = params.down_probability();
    let beta = params.discount_factor;
    let down = &next_level[..nodes];
    let up = &next_level[1..=nodes];
    for ((value, &v_down), &v_up) in out.iter_mut().zip(down).zip(up) {
        *value = beta * (p * v_up + q * v_down);
    }
}

fn fill_node_values(exercise: &[Price], continuation: &[Price], out: &mut [Price]) {
    for ((value, &ex), &cont) in out.iter_mut().zip(exercise).zip(continuation) {
        *value = ex.max(cont);
    }
}

// ---------------------------------------------------------------------------
// Backward induction
// ---------------------------------------------------------------------------

/// Value an American put by backward induction from maturity to valuation,
/// recording the early-exercise boundary at every interior step.
///
/// Only two node-value levels are alive at any time; memory is O(n).
pub fn backward_induction(
    spot: Price,
    strike: Price,
    params: &LatticeParams,
) -> LatticeResult<PricingResult> {
    params.validate()?;
    require_positive("strike_price", strike)?;

    let n = params.steps as usize;
    let mut prices = terminal_prices(spot, params)?;
    let mut values: Vec<Price> = prices.iter().map(|&s| put_payoff(strike, s)).collect();
    let mut rolled = vec![0.0; n + 1];
    let mut exercise = vec![0.0; n];
    let mut continuation = vec![0.0; n];
    let mut entries = Vec::with_capacity(n.saturating_sub(1));
    let mut exercise_at_valuation = false;

    for k in (1..=n).rev() {
        // Level k-1 has k nodes
        let level = k - 1;
        step_back_prices(&mut prices, k, params.down_factor);

        let ex = &mut exercise[..k];
        let cont = &mut continuation[..k];
        fill_exercise_values(strike, &prices, ex);
        fill_continuation_values(&values[..=k], params, cont);
        fill_node_values(ex, cont, &mut rolled[..k]);

        if level > 0 {
            entries.push(BoundaryEntry {
                time_step: level as u32,
                time: level as f64 * params.dt,
                point: classify_level(ex, cont, &prices),
            });
        } else {
            exercise_at_valuation = ex[0] > cont[0];
        }

        std::mem::swap(&mut values, &mut rolled);
    }

    Ok(PricingResult {
        option_price: values[0],
        exercise_at_valuation,
        boundary: ExerciseBoundary::from_backward_pass(entries),
        params: *params,
    })
}

// ---------------------------------------------------------------------------
// Public API: price_american_put
// ---------------------------------------------------------------------------

pub fn price_american_put(
    input: &AmericanPutInput,
) -> LatticeResult<ComputationOutput<PricingResult>> {
    let start = Instant::now();
    let params = derive_lattice_params(input)?;
    let result = backward_induction(input.spot_price, input.strike_price, &params)?;

    let mut warnings = Vec::new();
    if let Some(dp) = params.round_decimal_places {
        warnings.push(format!(
            "Lattice parameters rounded to {dp} decimal places before valuation"
        ));
    }
    if params.steps < 2 {
        warnings.push("Fewer than 2 steps: no interior exercise boundary is recorded".into());
    } else if !result.boundary.has_early_exercise() {
        warnings.push("Early exercise is not optimal at any interior step".into());
    }
    let fragmented = result.boundary.fragmented_steps();
    if let Some(first) = fragmented.first() {
        warnings.push(format!(
            "Exercise region fragmented at {} step(s), first at step {first}; boundary reports the highest exercising node. \
             Near-ties between exercise and continuation (e.g. a zero rate deep in the money) can cause this",
            fragmented.len()
        ));
    }
    if result.exercise_at_valuation {
        warnings.push("Immediate exercise is optimal at valuation".into());
    }

    let assumptions = serde_json::json!({
        "model": "Cox-Ross-Rubinstein binomial lattice",
        "steps": params.steps,
        "compounding": params.compounding,
        "up_factor": params.up_factor,
        "down_factor": params.down_factor,
        "up_probability": params.up_probability,
        "discount_factor": params.discount_factor,
        "round_decimal_places": params.round_decimal_places,
        "tie_policy": "hold when exercise equals continuation",
    });

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "CRR Binomial Lattice — American Put with Early-Exercise Boundary",
        &assumptions,
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
