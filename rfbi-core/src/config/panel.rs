//! Panel configuration
//!
//! Everything the engine needs to bring up one attached display: pixel
//! format on the bus and signal timings.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::timing::{TeConfig, TimingRequest};

/// Largest clock divider the timing registers can express
pub const MAX_CLOCK_DIVIDER: u8 = 2;

/// Command queue depth in commands
pub const COMMAND_FIFO_DEPTH: usize = 16;

/// Highest line number the tearing-effect line counter can hold
pub const MAX_TE_LINE: u16 = (1 << 11) - 1;

/// Configuration of one attached panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PanelConfig {
    /// Bits per pixel sent to the controller
    pub bpp: u8,
    /// Data lines wired between interface and controller
    pub data_lines: u8,
    /// Signal timings in picoseconds
    pub timings: TimingRequest,
    /// Tearing-effect pulse configuration, if the panel has a TE line
    pub te: Option<TeConfig>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            bpp: 16,
            data_lines: 16,
            timings: TimingRequest::default(),
            te: None,
        }
    }
}

/// Serialize a panel configuration into `buf`
///
/// Returns the used prefix of `buf`.
#[cfg(feature = "serde")]
pub fn encode<'a>(
    config: &PanelConfig,
    buf: &'a mut [u8],
) -> Result<&'a mut [u8], crate::error::RfbiError> {
    postcard::to_slice(config, buf).map_err(|_| crate::error::RfbiError::ConfigEncoding)
}

/// Deserialize a panel configuration stored with [`encode`]
#[cfg(feature = "serde")]
pub fn decode(bytes: &[u8]) -> Result<PanelConfig, crate::error::RfbiError> {
    postcard::from_bytes(bytes).map_err(|_| crate::error::RfbiError::ConfigEncoding)
}
