//! Hardware backends for the speed-match system.
//!
//! Real DCC command stations and detector networks live behind
//! `speedmatch_traits`; this crate currently ships the simulated track loop
//! used by the CLI and integration tests. The simulation advances a shared
//! manual clock instead of sleeping, so a full calibration run completes
//! instantly while producing the same timing structure as a live layout.

pub mod error;
pub mod sim;

pub use error::HwError;
pub use sim::{SimulatedLoop, SpeedModel};
