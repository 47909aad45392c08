pub mod error;
pub mod types;

#[cfg(feature = "lattice")]
pub mod lattice;

#[cfg(feature = "convergence")]
pub mod convergence;

pub use error::LatticeError;
pub use types::*;

/// Standard result type for all lattice operations
pub type LatticeResult<T> = Result<T, LatticeError>;
