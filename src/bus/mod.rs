//! Opportunity bus

pub mod opportunity_bus;

pub use opportunity_bus::*;
