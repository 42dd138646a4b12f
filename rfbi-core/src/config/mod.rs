//! Configuration types
//!
//! Board-agnostic configuration for the interface and the panels attached
//! to it. Panel configuration can be stored as postcard binary data when the
//! `serde` feature is enabled.

pub mod format;
pub mod panel;

pub use format::*;
pub use panel::*;
