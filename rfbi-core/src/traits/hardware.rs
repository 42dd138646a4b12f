//! RFBI controller trait

use core::fmt;

use crate::config::{Module, PixelFormat};
use crate::error::RfbiError;
use crate::queue::Region;
use crate::timing::{ConvertedTimings, TePulses};

use super::display::FrameSource;

/// Register-level RFBI controller
///
/// Implemented by `rfbi-drivers` on top of a register bus. The engine holds
/// the controller behind a mutex and calls these methods with that lock held,
/// so implementations never see concurrent calls.
pub trait RfbiHardware {
    /// Current interface clock rate in Hz
    fn clock_rate_hz(&self) -> u32;

    /// Program the pixel format of `module` and select it on the bus
    fn configure(&mut self, module: Module, format: &PixelFormat);

    /// Program the timing registers of `module`
    fn write_timings(&mut self, module: Module, timings: &ConvertedTimings);

    /// Program tearing-effect pulse widths and polarities
    fn setup_te(&mut self, pulses: &TePulses);

    /// Switch the tearing-effect trigger on or off
    ///
    /// `line` is the panel line that triggers the transfer, at most
    /// [`MAX_TE_LINE`](crate::config::MAX_TE_LINE).
    fn enable_te(&mut self, enable: bool, line: u16) -> Result<(), RfbiError>;

    /// Start a frame transfer of `width` x `height` pixels to `module`
    ///
    /// Completion is reported by the frame-done interrupt. Starting a
    /// transfer while another is in flight is a contract violation and
    /// panics.
    fn start_transfer(&mut self, module: Module, width: u16, height: u16);

    /// Tear down the transfer reported done by the interrupt
    fn finish_transfer(&mut self);

    /// Push `region` of `source` to `module` over L4, synchronously
    fn write_pixels(
        &mut self,
        module: Module,
        source: &FrameSource<'_>,
        region: Region,
    ) -> Result<(), RfbiError>;

    /// Send a controller command
    fn write_command(&mut self, bytes: &[u8]) -> Result<(), RfbiError>;

    /// Send command parameters
    fn write_data(&mut self, bytes: &[u8]) -> Result<(), RfbiError>;

    /// Read controller data into `buf`
    fn read_data(&mut self, buf: &mut [u8]) -> Result<(), RfbiError>;

    /// Write a register snapshot as `NAME value` lines
    fn dump_registers(&mut self, out: &mut dyn fmt::Write) -> fmt::Result;
}
