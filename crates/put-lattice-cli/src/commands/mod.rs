pub mod contract;
pub mod convergence;
pub mod pricing;
