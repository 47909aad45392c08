use clap::{Args, ValueEnum};

use put_lattice_core::lattice::{AmericanPutInput, Compounding};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CompoundingArg {
    /// p = (1 + r*dt - d) / (u - d)
    Discrete,
    /// p = (exp(r*dt) - d) / (u - d)
    Continuous,
}

impl From<CompoundingArg> for Compounding {
    fn from(arg: CompoundingArg) -> Self {
        match arg {
            CompoundingArg::Discrete => Compounding::Discrete,
            CompoundingArg::Continuous => Compounding::Continuous,
        }
    }
}

/// Contract and lattice settings shared by every pricing command.
///
/// A document from `--input` or stdin supplies the base; individual flags
/// override its fields.
#[derive(Args, Debug)]
pub struct ContractArgs {
    /// Path to a JSON or YAML contract document
    #[arg(long)]
    pub input: Option<String>,

    /// Initial stock price
    #[arg(long)]
    pub spot: Option<f64>,

    /// Strike price
    #[arg(long)]
    pub strike: Option<f64>,

    /// Time to maturity in years
    #[arg(long)]
    pub expiry: Option<f64>,

    /// Annualised volatility (e.g. 0.32 for 32%)
    #[arg(long)]
    pub volatility: Option<f64>,

    /// Risk-free rate (annualised, decimal)
    #[arg(long, allow_hyphen_values = true)]
    pub rate: Option<f64>,

    /// Number of lattice time steps [default: 100]
    #[arg(long)]
    pub steps: Option<u32>,

    /// Compounding convention for the up-probability [default: discrete]
    #[arg(long, value_enum)]
    pub compounding: Option<CompoundingArg>,

    /// Round u, p and beta to this many decimal places
    #[arg(long)]
    pub round_dp: Option<u32>,
}

impl ContractArgs {
    fn has_all_market_flags(&self) -> bool {
        self.spot.is_some()
            && self.strike.is_some()
            && self.expiry.is_some()
            && self.volatility.is_some()
            && self.rate.is_some()
    }

    fn missing_flags(&self) -> Vec<&'static str> {
        [
            ("--spot", self.spot.is_none()),
            ("--strike", self.strike.is_none()),
            ("--expiry", self.expiry.is_none()),
            ("--volatility", self.volatility.is_none()),
            ("--rate", self.rate.is_none()),
        ]
        .into_iter()
        .filter_map(|(flag, missing)| missing.then_some(flag))
        .collect()
    }

    fn apply_overrides(&self, mut contract: AmericanPutInput) -> AmericanPutInput {
        if let Some(v) = self.spot {
            contract.spot_price = v;
        }
        if let Some(v) = self.strike {
            contract.strike_price = v;
        }
        if let Some(v) = self.expiry {
            contract.time_to_expiry = v;
        }
        if let Some(v) = self.volatility {
            contract.volatility = v;
        }
        if let Some(v) = self.rate {
            contract.risk_free_rate = v;
        }
        if let Some(v) = self.steps {
            contract.steps = v;
        }
        if let Some(v) = self.compounding {
            contract.compounding = v.into();
        }
        if self.round_dp.is_some() {
            contract.round_decimal_places = self.round_dp;
        }
        contract
    }

    fn from_flags(&self) -> Option<AmericanPutInput> {
        Some(AmericanPutInput {
            spot_price: self.spot?,
            strike_price: self.strike?,
            time_to_expiry: self.expiry?,
            volatility: self.volatility?,
            risk_free_rate: self.rate?,
            steps: self.steps.unwrap_or(100),
            compounding: self.compounding.map(Into::into).unwrap_or_default(),
            round_decimal_places: self.round_dp,
        })
    }

    /// Resolve the contract from file, flags, or piped stdin, in that order.
    pub fn resolve(&self) -> Result<AmericanPutInput, Box<dyn std::error::Error>> {
        let contract = if let Some(ref path) = self.input {
            let base: AmericanPutInput = input::file::read_document(path)?;
            self.apply_overrides(base)
        } else if self.has_all_market_flags() {
            self.from_flags()
                .ok_or("market flags disappeared while building the contract")?
        } else if let Some(base) = input::stdin::read_piped::<AmericanPutInput>()? {
            self.apply_overrides(base)
        } else {
            return Err(format!(
                "--input <file>, piped stdin, or all market flags required (missing: {})",
                self.missing_flags().join(", ")
            )
            .into());
        };

        tracing::debug!(?contract, "resolved contract");
        Ok(contract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> ContractArgs {
        ContractArgs {
            input: None,
            spot: Some(51.0),
            strike: Some(53.0),
            expiry: Some(0.5),
            volatility: Some(0.32),
            rate: Some(0.05),
            steps: None,
            compounding: None,
            round_dp: None,
        }
    }

    #[test]
    fn test_flags_build_contract_with_defaults() {
        let contract = flags().resolve().unwrap();
        assert_eq!(contract.spot_price, 51.0);
        assert_eq!(contract.steps, 100);
        assert_eq!(contract.compounding, Compounding::Discrete);
        assert_eq!(contract.round_decimal_places, None);
    }

    #[test]
    fn test_overrides_replace_document_fields() {
        let args = ContractArgs {
            steps: Some(250),
            compounding: Some(CompoundingArg::Continuous),
            round_dp: Some(4),
            spot: Some(60.0),
            ..flags()
        };
        let base = AmericanPutInput {
            spot_price: 9.0,
            strike_price: 10.0,
            time_to_expiry: 0.25,
            volatility: 0.3,
            risk_free_rate: 0.06,
            steps: 5000,
            compounding: Compounding::Discrete,
            round_decimal_places: None,
        };
        let contract = args.apply_overrides(base);
        assert_eq!(contract.spot_price, 60.0);
        assert_eq!(contract.steps, 250);
        assert_eq!(contract.compounding, Compounding::Continuous);
        assert_eq!(contract.round_decimal_places, Some(4));
    }

    #[test]
    fn test_missing_flags_listed() {
        let args = ContractArgs {
            strike: None,
            rate: None,
            ..flags()
        };
        assert_eq!(args.missing_flags(), vec!["--strike", "--rate"]);
        assert!(!args.has_all_market_flags());
    }
}
