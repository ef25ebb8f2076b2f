//! Validation functions for prices and evaluation inputs

pub mod price;
pub mod costs;

pub use price::*;
pub use costs::*;
