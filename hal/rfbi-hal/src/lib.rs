//! RFBI Hardware Abstraction Layer
//!
//! This crate defines the hardware traits the RFBI controller driver is
//! written against. A platform crate implements them for its memory map and
//! clock tree; tests implement them with in-memory register files.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  rfbi-core (queue, dispatcher, solver)  │
//! └─────────────────────────────────────────┘
//!                     │ RfbiHardware
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  rfbi-drivers (register-level driver)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  rfbi-hal (this crate - traits)         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`mmio::RegisterBus`] - 32-bit memory-mapped register access
//! - [`clock::FunctionalClock`] - Interface and functional clock gating
//! - [`lcd::LcdOutput`] - Display controller LCD channel feeding the bus

#![no_std]
#![deny(unsafe_code)]

pub mod clock;
pub mod lcd;
pub mod mmio;

// Re-export key traits at crate root for convenience
pub use clock::FunctionalClock;
pub use lcd::LcdOutput;
pub use mmio::{field_get, field_mod, field_val, RegisterBus};
