//! CLI command implementations.
//!
//! - [`serve`] - Run a broker
//! - [`worker`] - Run an echo worker

pub mod serve;
pub mod worker;
