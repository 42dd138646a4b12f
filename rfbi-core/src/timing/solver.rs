//! Bus timing solver
//!
//! Converts chip-select, write-enable and read-enable timings into the two
//! timing register words. The search tries the smallest clock divider
//! first, since a faster tick gives finer resolution.
//!
//! Register words:
//! ```text
//! ONOFF_TIME:  [3:0] CSON  [9:4] CSOFF  [13:10] WEON  [19:14] WEOFF
//!              [23:20] REON  [29:24] REOFF
//! CYCLE_TIME:  [5:0] WECYCLE  [11:6] RECYCLE  [17:12] CSPULSEWIDTH
//!              [27:22] ACCESSTIME
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::MAX_CLOCK_DIVIDER;
use crate::error::RfbiError;

/// Largest value of a 4-bit on-time field
const MAX_ON_TICKS: u32 = 0x0F;

/// Largest value of a 6-bit off/cycle/access/pulse field
const MAX_TICKS: u32 = 0x3F;

/// Tick period in picoseconds for an interface clock rate
///
/// The rate is truncated to whole kHz before conversion.
pub fn clock_period_ps(rate_hz: u32) -> Result<u32, RfbiError> {
    let khz = rate_hz / 1000;
    if khz == 0 {
        return Err(RfbiError::ClockUnavailable);
    }
    Ok(1_000_000_000 / khz)
}

/// Round `ps` up to a whole number of bus ticks
fn round_to_bus_ticks(ps: u32, bus_tick_ps: u64) -> u64 {
    (ps as u64).div_ceil(bus_tick_ps) * bus_tick_ps
}

/// Convert a rounded time to ticks
fn ps_to_ticks(ps: u64, bus_tick_ps: u64) -> u32 {
    ps.div_ceil(bus_tick_ps).min(u32::MAX as u64) as u32
}

/// Requested signal timings, all in picoseconds from the start of an access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingRequest {
    /// Chip select assertion
    pub cs_on: u32,
    /// Chip select deassertion
    pub cs_off: u32,
    /// Write enable assertion
    pub we_on: u32,
    /// Write enable deassertion
    pub we_off: u32,
    /// Full write cycle
    pub we_cycle: u32,
    /// Read enable assertion
    pub re_on: u32,
    /// Read enable deassertion
    pub re_off: u32,
    /// Full read cycle
    pub re_cycle: u32,
    /// Read data valid after start of access
    pub access: u32,
    /// Minimum chip select high time between accesses
    pub cs_pulse_width: u32,
}

/// Tick counts of every timing field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingTicks {
    pub cs_on: u8,
    pub cs_off: u8,
    pub we_on: u8,
    pub we_off: u8,
    pub we_cycle: u8,
    pub re_on: u8,
    pub re_off: u8,
    pub re_cycle: u8,
    pub access: u8,
    pub cs_pulse_width: u8,
}

impl TimingTicks {
    /// Pack the ONOFF_TIME register word
    pub fn on_off_word(&self) -> u32 {
        (self.cs_on as u32)
            | (self.cs_off as u32) << 4
            | (self.we_on as u32) << 10
            | (self.we_off as u32) << 14
            | (self.re_on as u32) << 20
            | (self.re_off as u32) << 24
    }

    /// Pack the CYCLE_TIME register word
    pub fn cycle_word(&self) -> u32 {
        (self.we_cycle as u32)
            | (self.re_cycle as u32) << 6
            | (self.cs_pulse_width as u32) << 12
            | (self.access as u32) << 22
    }

    /// Unpack ticks from register words read back from hardware
    pub fn from_registers(on_off: u32, cycle: u32) -> Self {
        Self {
            cs_on: (on_off & 0x0F) as u8,
            cs_off: ((on_off >> 4) & 0x3F) as u8,
            we_on: ((on_off >> 10) & 0x0F) as u8,
            we_off: ((on_off >> 14) & 0x3F) as u8,
            re_on: ((on_off >> 20) & 0x0F) as u8,
            re_off: ((on_off >> 24) & 0x3F) as u8,
            we_cycle: (cycle & 0x3F) as u8,
            re_cycle: ((cycle >> 6) & 0x3F) as u8,
            cs_pulse_width: ((cycle >> 12) & 0x3F) as u8,
            access: ((cycle >> 22) & 0x3F) as u8,
        }
    }

    /// Check the signal ordering the controller relies on
    pub fn is_consistent(&self) -> bool {
        self.we_off > self.we_on
            && self.re_off > self.re_on
            && self.cs_off > self.cs_on
            && self.cs_off >= self.we_off.max(self.re_off)
            && self.access > self.re_on
            && self.we_cycle >= self.we_off
            && self.re_cycle >= self.re_off
    }
}

/// Result of a successful conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConvertedTimings {
    /// Clock divider the ticks are counted in (1 or 2)
    pub divider: u8,
    /// Individual tick counts
    pub ticks: TimingTicks,
    /// Packed ONOFF_TIME word
    pub on_off: u32,
    /// Packed CYCLE_TIME word
    pub cycle: u32,
}

impl ConvertedTimings {
    /// TIMEGRANULARITY bit: set when ticks are counted at half rate
    pub fn granularity(&self) -> u32 {
        (self.divider - 1) as u32
    }
}

impl TimingRequest {
    /// Convert to register values, searching dividers from 1 upward
    ///
    /// # Arguments
    /// - `clk_period_ps`: Undivided interface clock period
    /// - `max_divider`: Largest divider to try
    pub fn convert(&self, clk_period_ps: u32, max_divider: u8) -> Result<ConvertedTimings, RfbiError> {
        if clk_period_ps == 0 {
            return Err(RfbiError::ClockUnavailable);
        }

        for divider in 1..=max_divider {
            if let Some(converted) = self.convert_at(clk_period_ps, divider) {
                debug!(
                    "timings converted: div {} onoff {=u32:#x} cycle {=u32:#x}",
                    divider, converted.on_off, converted.cycle
                );
                return Ok(converted);
            }
        }

        error!("can't set up timings within divider {}", max_divider);
        Err(RfbiError::TimingUnsatisfiable)
    }

    /// Convert with a fixed divider, `None` if a field overflows
    pub fn convert_at(&self, clk_period_ps: u32, divider: u8) -> Option<ConvertedTimings> {
        if divider == 0 || divider > MAX_CLOCK_DIVIDER {
            return None;
        }

        let bus_tick = clk_period_ps as u64 * divider as u64;
        let ticks = |ps: u32| ps_to_ticks(round_to_bus_ticks(ps, bus_tick), bus_tick);

        let we_on = ticks(self.we_on);
        let mut we_off = ticks(self.we_off);
        if we_off <= we_on {
            we_off = we_on + 1;
        }
        if we_on > MAX_ON_TICKS || we_off > MAX_TICKS {
            return None;
        }

        let re_on = ticks(self.re_on);
        let mut re_off = ticks(self.re_off);
        if re_off <= re_on {
            re_off = re_on + 1;
        }
        if re_on > MAX_ON_TICKS || re_off > MAX_TICKS {
            return None;
        }

        let cs_on = ticks(self.cs_on);
        let mut cs_off = ticks(self.cs_off);
        if cs_off <= cs_on {
            cs_off = cs_on + 1;
        }
        cs_off = cs_off.max(we_off).max(re_off);
        if cs_on > MAX_ON_TICKS || cs_off > MAX_TICKS {
            return None;
        }

        let mut access = ticks(self.access);
        if access <= re_on {
            access = re_on + 1;
        }
        if access > MAX_TICKS {
            return None;
        }

        let we_cycle = ticks(self.we_cycle).max(we_off);
        let re_cycle = ticks(self.re_cycle).max(re_off);
        let cs_pulse_width = ticks(self.cs_pulse_width);
        if we_cycle > MAX_TICKS || re_cycle > MAX_TICKS || cs_pulse_width > MAX_TICKS {
            return None;
        }

        // Every field is bounded by MAX_TICKS here
        let ticks = TimingTicks {
            cs_on: cs_on as u8,
            cs_off: cs_off as u8,
            we_on: we_on as u8,
            we_off: we_off as u8,
            we_cycle: we_cycle as u8,
            re_on: re_on as u8,
            re_off: re_off as u8,
            re_cycle: re_cycle as u8,
            access: access as u8,
            cs_pulse_width: cs_pulse_width as u8,
        };

        Some(ConvertedTimings {
            divider,
            ticks,
            on_off: ticks.on_off_word(),
            cycle: ticks.cycle_word(),
        })
    }
}

/// Timing request with its cached conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelTimings {
    request: TimingRequest,
    converted: Option<ConvertedTimings>,
}

impl PanelTimings {
    /// Wrap an unconverted request
    pub const fn new(request: TimingRequest) -> Self {
        Self {
            request,
            converted: None,
        }
    }

    /// The requested timings
    pub fn request(&self) -> &TimingRequest {
        &self.request
    }

    /// Cached conversion, if any
    pub fn converted(&self) -> Option<&ConvertedTimings> {
        self.converted.as_ref()
    }

    /// Replace the request, dropping the cached conversion
    pub fn set_request(&mut self, request: TimingRequest) {
        self.request = request;
        self.converted = None;
    }

    /// Return the cached conversion, converting at `rate_hz` if needed
    ///
    /// A failed conversion leaves the cache untouched.
    pub fn convert(&mut self, rate_hz: u32) -> Result<ConvertedTimings, RfbiError> {
        if let Some(converted) = self.converted {
            return Ok(converted);
        }

        let period = clock_period_ps(rate_hz)?;
        let converted = self.request.convert(period, MAX_CLOCK_DIVIDER)?;
        self.converted = Some(converted);
        Ok(converted)
    }
}
