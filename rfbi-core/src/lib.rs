//! Board-agnostic core logic for the Remote Frame Buffer Interface
//!
//! This crate contains the parts of the RFBI driver that do not touch
//! registers directly:
//!
//! - Timing solver (picoseconds to clock ticks, divider search)
//! - Tearing-effect pulse validation
//! - Pixel format validation and data-cycle layout
//! - Bounded command queue with producer backpressure
//! - Transfer dispatcher (one hardware transfer in flight)
//! - Display session table and the [`Rfbi`] engine tying them together
//! - Hardware and display traits implemented by drivers

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

// Must come first so the logging macros are visible to later modules
#[macro_use]
mod fmt;

pub mod config;
pub mod dispatch;
pub mod error;
pub mod queue;
pub mod session;
pub mod timing;
pub mod traits;

#[cfg(test)]
mod testutil;

pub use config::{Module, PanelConfig, PixelFormat};
pub use dispatch::{DispatchState, Rfbi};
pub use error::{ErrorKind, RfbiError};
pub use queue::{Command, CommandQueue, Region};
pub use timing::{ConvertedTimings, TeConfig, TeMode, TimingRequest};
pub use traits::{Capabilities, DisplayOps, FrameSource, RfbiHardware};
