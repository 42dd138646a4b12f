//! Collaborator traits
//!
//! These traits define the interface between the engine and the
//! register-level controller driver or the attached panel drivers.

pub mod display;
pub mod hardware;

pub use display::{Capabilities, DisplayOps, FrameSource};
pub use hardware::RfbiHardware;
