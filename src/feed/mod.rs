//! Price feed polling

pub mod poller;

pub use poller::*;
