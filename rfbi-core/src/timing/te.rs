//! Tearing-effect pulse validation
//!
//! The panel signals its refresh position on the TE line. The interface
//! tells horizontal from vertical sync by pulse width, so both widths are
//! checked against the hardware minimums before they are programmed.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::solver::clock_period_ps;
use crate::error::RfbiError;

/// Tearing-effect trigger mode (TRIGGERMODE field encoding)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum TeMode {
    /// Single TE line carrying both sync pulses
    OnePhase = 1,
    /// Separate horizontal and vertical sync phases
    TwoPhase = 2,
}

impl TeMode {
    /// Shortest vertical pulse, in ticks, the mode can recognize
    pub const fn min_vs_ticks(self) -> u32 {
        match self {
            TeMode::OnePhase => 4,
            TeMode::TwoPhase => 2,
        }
    }
}

/// Shortest horizontal pulse in ticks
const MIN_HS_TICKS: u32 = 2;

/// Requested tearing-effect configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TeConfig {
    pub mode: TeMode,
    /// Horizontal sync pulse width in picoseconds
    pub hs_pulse_ps: u32,
    /// Vertical sync pulse width in picoseconds
    pub vs_pulse_ps: u32,
    /// Horizontal sync is active low
    pub hs_inverted: bool,
    /// Vertical sync is active low
    pub vs_inverted: bool,
}

/// Validated pulse widths in undivided ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TePulses {
    pub mode: TeMode,
    pub hs_ticks: u32,
    pub vs_ticks: u32,
    pub hs_inverted: bool,
    pub vs_inverted: bool,
}

impl TeConfig {
    /// Validate against a tick period
    ///
    /// Pulse widths are always counted at divider 1.
    pub fn validate(&self, clk_period_ps: u32) -> Result<TePulses, RfbiError> {
        if clk_period_ps == 0 {
            return Err(RfbiError::ClockUnavailable);
        }

        let tick = clk_period_ps as u64;
        let hs_ticks = (self.hs_pulse_ps as u64).div_ceil(tick) as u32;
        let vs_ticks = (self.vs_pulse_ps as u64).div_ceil(tick) as u32;

        if hs_ticks < MIN_HS_TICKS {
            return Err(RfbiError::TePulseTooShort);
        }
        if vs_ticks < self.mode.min_vs_ticks() {
            return Err(RfbiError::TePulseTooShort);
        }
        if hs_ticks == vs_ticks {
            return Err(RfbiError::TePulsesEqual);
        }

        Ok(TePulses {
            mode: self.mode,
            hs_ticks,
            vs_ticks,
            hs_inverted: self.hs_inverted,
            vs_inverted: self.vs_inverted,
        })
    }

    /// Validate at the current clock rate
    pub fn validate_at_rate(&self, rate_hz: u32) -> Result<TePulses, RfbiError> {
        self.validate(clock_period_ps(rate_hz)?)
    }
}
