//! Timing conversion
//!
//! Signal timings are specified in picoseconds and programmed in ticks of
//! the (optionally divided) interface clock.

pub mod solver;
pub mod te;

pub use solver::{clock_period_ps, ConvertedTimings, PanelTimings, TimingRequest, TimingTicks};
pub use te::{TeConfig, TeMode, TePulses};
