//! Transfer dispatcher and the engine tying queue, sessions and hardware
//!
//! At most one hardware transfer is in flight. Whoever holds the drain token
//! pulls commands off the queue until it is empty or a transfer starts; an
//! in-flight transfer keeps the token and the completion handler inherits
//! it, so a completion and a producer can never drain at the same time.

mod barrier;
mod engine;
mod state;

pub use barrier::{BarrierBoard, MAX_BARRIER_WAITERS};
pub use engine::Rfbi;
pub use state::{DispatchEvent, DispatchState};
