//! Update/sync command queue
//!
//! Producers serialize commands into a bounded byte ring; the dispatcher
//! is the single consumer.

pub mod command;
pub mod fifo;

pub use command::{BarrierTicket, Command, Region, COMMAND_SIZE};
pub use fifo::{CommandQueue, COMMAND_FIFO_LEN_BYTES, MAX_PARKED_PRODUCERS};
