pub mod boundary;
pub mod engine;
pub mod params;

pub use boundary::{BoundaryEntry, BoundaryPoint, ExerciseBoundary};
pub use engine::{backward_induction, price_american_put, terminal_prices, PricingResult};
pub use params::{derive_lattice_params, AmericanPutInput, Compounding, LatticeParams};
