//! Hardware driver implementations
//!
//! This crate provides the register-level RFBI controller implementing the
//! [`RfbiHardware`](rfbi_core::RfbiHardware) trait of rfbi-core on top of the
//! rfbi-hal register bus, clock and LCD channel traits.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod rfbi;

pub use rfbi::{max_tx_rate, Revision, RfbiController};
