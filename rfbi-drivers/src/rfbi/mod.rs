//! RFBI controller
//!
//! The interface drives up to two display controllers, one per chip select.
//! Pixel data reaches the bus either streamed by the display controller's
//! LCD channel (a frame transfer) or written through L4 registers one bus
//! word at a time.

mod controller;
mod rate;
pub mod regs;

pub use controller::{Revision, RfbiController};
pub use rate::max_tx_rate;
