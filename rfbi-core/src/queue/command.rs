//! Command records
//!
//! Record format (fixed size):
//! - MODULE (1 byte): chip-select module index
//! - KIND (1 byte): 0 = region update, 1 = sync barrier
//! - PAYLOAD (8 bytes):
//!   - update: x, y, w, h as little-endian u16
//!   - barrier: ticket as little-endian u32, then 4 zero bytes

use crate::config::Module;

/// Size of one serialized command
pub const COMMAND_SIZE: usize = 10;

const KIND_UPDATE: u8 = 0;
const KIND_SYNC: u8 = 1;

/// Screen rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Region {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Region {
    pub const fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    /// Region with no pixels
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Number of pixels covered
    pub fn area(&self) -> u32 {
        self.w as u32 * self.h as u32
    }

    /// Clip against a screen of `width` x `height`
    pub fn clip(&self, width: u16, height: u16) -> Self {
        if self.x >= width || self.y >= height {
            return Self::new(self.x, self.y, 0, 0);
        }
        Self {
            x: self.x,
            y: self.y,
            w: self.w.min(width - self.x),
            h: self.h.min(height - self.y),
        }
    }
}

/// Sequence number of a sync barrier
///
/// Tickets are handed out in queue order, so releasing ticket `n` implies
/// every earlier barrier was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BarrierTicket(pub u32);

/// Queued command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Transfer a screen region to the display on `module`
    UpdateRegion { module: Module, region: Region },
    /// Release the waiter holding `ticket` once reached
    SyncBarrier { module: Module, ticket: BarrierTicket },
}

impl Command {
    /// Module the command is routed to
    pub fn module(&self) -> Module {
        match self {
            Command::UpdateRegion { module, .. } | Command::SyncBarrier { module, .. } => *module,
        }
    }

    /// Serialize into a fixed-size record
    pub fn encode(&self) -> [u8; COMMAND_SIZE] {
        let mut record = [0u8; COMMAND_SIZE];
        record[0] = self.module().index() as u8;

        match self {
            Command::UpdateRegion { region, .. } => {
                record[1] = KIND_UPDATE;
                record[2..4].copy_from_slice(&region.x.to_le_bytes());
                record[4..6].copy_from_slice(&region.y.to_le_bytes());
                record[6..8].copy_from_slice(&region.w.to_le_bytes());
                record[8..10].copy_from_slice(&region.h.to_le_bytes());
            }
            Command::SyncBarrier { ticket, .. } => {
                record[1] = KIND_SYNC;
                record[2..6].copy_from_slice(&ticket.0.to_le_bytes());
            }
        }

        record
    }

    /// Parse a record written by [`Command::encode`]
    pub fn decode(record: &[u8; COMMAND_SIZE]) -> Option<Self> {
        let module = Module::try_from(record[0]).ok()?;
        let half = |i: usize| u16::from_le_bytes([record[i], record[i + 1]]);

        match record[1] {
            KIND_UPDATE => Some(Command::UpdateRegion {
                module,
                region: Region::new(half(2), half(4), half(6), half(8)),
            }),
            KIND_SYNC => {
                let ticket = u32::from_le_bytes([record[2], record[3], record[4], record[5]]);
                Some(Command::SyncBarrier {
                    module,
                    ticket: BarrierTicket(ticket),
                })
            }
            _ => None,
        }
    }
}
