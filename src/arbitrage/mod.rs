//! Opportunity detection, cost estimation and profitability evaluation

pub mod calculator;
pub mod costs;
pub mod detector;

pub use calculator::*;
pub use costs::*;
pub use detector::*;
