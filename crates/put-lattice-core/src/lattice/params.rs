use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LatticeError;
use crate::types::*;
use crate::LatticeResult;

/// Largest rounding precision accepted; f64 carries no more significant decimals.
pub const MAX_ROUND_DECIMAL_PLACES: u32 = 15;

/// Tolerance on the `u * d == 1` invariant when validating supplied parameters.
const RECIPROCAL_TOLERANCE: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Growth convention used for the risk-neutral up-probability.
///
/// `Discrete` grows one step by `1 + r·dt`, `Continuous` by `exp(r·dt)`.
/// Discounting is `exp(-r·dt)` under both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compounding {
    #[default]
    Discrete,
    Continuous,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmericanPutInput {
    pub spot_price: Price,
    pub strike_price: Price,
    pub time_to_expiry: Years,
    pub volatility: Rate,
    pub risk_free_rate: Rate,
    /// Number of lattice time steps (default 100)
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default)]
    pub compounding: Compounding,
    /// Round `u`, `p` and `beta` to this many decimal places before use
    #[serde(default)]
    pub round_decimal_places: Option<u32>,
}

fn default_steps() -> u32 {
    100
}

/// Per-step lattice factors shared by the price and the boundary computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeParams {
    pub steps: u32,
    pub dt: Years,
    pub up_factor: f64,
    pub down_factor: f64,
    pub up_probability: Rate,
    pub discount_factor: f64,
    pub compounding: Compounding,
    pub round_decimal_places: Option<u32>,
}

impl LatticeParams {
    pub fn down_probability(&self) -> Rate {
        1.0 - self.up_probability
    }

    /// Check the invariants the valuation engine relies on.
    pub fn validate(&self) -> LatticeResult<()> {
        if self.steps < 1 {
            return Err(LatticeError::invalid("steps", "must be at least 1"));
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(LatticeError::invalid("dt", "must be positive and finite"));
        }
        if !self.up_factor.is_finite() || self.up_factor <= 1.0 {
            return Err(LatticeError::invalid("up_factor", "must be finite and greater than 1"));
        }
        if (self.up_factor * self.down_factor - 1.0).abs() > RECIPROCAL_TOLERANCE {
            return Err(LatticeError::invalid(
                "down_factor",
                format!(
                    "must be the reciprocal of up_factor (u*d = {})",
                    self.up_factor * self.down_factor
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.up_probability) {
            return Err(LatticeError::invalid(
                "up_probability",
                format!(
                    "risk-neutral probability {} lies outside [0, 1]; increase steps or volatility relative to the rate",
                    self.up_probability
                ),
            ));
        }
        if !(self.discount_factor > 0.0 && self.discount_factor <= 1.0) {
            return Err(LatticeError::invalid("discount_factor", "must lie in (0, 1]"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn require_positive(field: &str, value: f64) -> LatticeResult<()> {
    if !value.is_finite() {
        return Err(LatticeError::invalid(field, "must be finite"));
    }
    if value <= 0.0 {
        return Err(LatticeError::invalid(field, "must be positive"));
    }
    Ok(())
}

fn validate_input(input: &AmericanPutInput) -> LatticeResult<()> {
    require_positive("spot_price", input.spot_price)?;
    require_positive("strike_price", input.strike_price)?;
    require_positive("time_to_expiry", input.time_to_expiry)?;
    require_positive("volatility", input.volatility)?;
    if !input.risk_free_rate.is_finite() {
        return Err(LatticeError::invalid("risk_free_rate", "must be finite"));
    }
    if input.risk_free_rate < 0.0 {
        return Err(LatticeError::invalid("risk_free_rate", "must be non-negative"));
    }
    if input.steps < 1 {
        return Err(LatticeError::invalid("steps", "must be at least 1"));
    }
    if let Some(dp) = input.round_decimal_places {
        if dp > MAX_ROUND_DECIMAL_PLACES {
            return Err(LatticeError::invalid(
                "round_decimal_places",
                format!("must not exceed {MAX_ROUND_DECIMAL_PLACES}"),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rounding policy
// ---------------------------------------------------------------------------

/// Round through `Decimal` so `0.4984457` becomes exactly the decimal the
/// caller asked for rather than a binary neighbour of it.
fn round_to_places(field: &str, value: f64, dp: u32) -> LatticeResult<f64> {
    let decimal = Decimal::from_f64(value)
        .ok_or_else(|| LatticeError::invalid(field, "cannot be represented as a decimal"))?;
    decimal
        .round_dp(dp)
        .to_f64()
        .ok_or_else(|| LatticeError::invalid(field, "rounded value does not fit in f64"))
}

fn apply_rounding(field: &str, value: f64, dp: Option<u32>) -> LatticeResult<f64> {
    match dp {
        Some(dp) => round_to_places(field, value, dp),
        None => Ok(value),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Map market inputs to multiplicative step factors, the risk-neutral
/// up-probability and the per-step discount factor.
///
/// With rounding enabled `u`, `p` and `beta` are rounded; `d` is always
/// `1/u` of the (possibly rounded) `u`.
pub fn derive_lattice_params(input: &AmericanPutInput) -> LatticeResult<LatticeParams> {
    validate_input(input)?;

    let dp = input.round_decimal_places;
    let r = input.risk_free_rate;
    let dt = input.time_to_expiry / f64::from(input.steps);

    let up_factor = apply_rounding("up_factor", (input.volatility * dt.sqrt()).exp(), dp)?;
    if up_factor <= 1.0 {
        return Err(LatticeError::invalid(
            "round_decimal_places",
            format!("rounding collapses the up factor to {up_factor}; use more decimal places"),
        ));
    }
    let down_factor = 1.0 / up_factor;

    let growth = match input.compounding {
        Compounding::Discrete => 1.0 + r * dt,
        Compounding::Continuous => (r * dt).exp(),
    };
    let up_probability = apply_rounding(
        "up_probability",
        (growth - down_factor) / (up_factor - down_factor),
        dp,
    )?;
    let discount_factor = apply_rounding("discount_factor", (-r * dt).exp(), dp)?;

    let params = LatticeParams {
        steps: input.steps,
        dt,
        up_factor,
        down_factor,
        up_probability,
        discount_factor,
        compounding: input.compounding,
        round_decimal_places: dp,
    };
    params.validate()?;
    Ok(params)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
