//! Attached display trait
//!
//! A display is a panel behind a controller on one chip select. Its driver
//! knows the command set of the controller; the engine only decides when to
//! call it.

use crate::error::RfbiError;
use crate::queue::Region;

use super::hardware::RfbiHardware;

/// What the display path can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capabilities {
    /// The display controller streams frames into the interface by itself.
    /// Without it, updates are pushed pixel by pixel over L4.
    pub direct_transfer: bool,
}

/// Frame buffer the L4 path reads pixels from
///
/// Pixels are stored row-major with `screen_width` pixels per row, at the
/// size the configured pixel format uses in memory (2 bytes for 16 bpp, 4
/// bytes for 24 bpp).
#[derive(Debug, Clone, Copy)]
pub struct FrameSource<'a> {
    pub pixels: &'a [u8],
    pub screen_width: u16,
}

/// Panel driver operations
///
/// All methods that talk to the panel get the controller so they can issue
/// commands through it.
pub trait DisplayOps<H: RfbiHardware> {
    /// Capabilities of the display path
    fn capabilities(&self) -> Capabilities;

    /// Screen size in pixels (width, height)
    fn screen_size(&self) -> (u16, u16);

    /// Power up the controller and panel
    fn enable(&mut self, hw: &mut H) -> Result<(), RfbiError>;

    /// Power down the controller and panel
    fn disable(&mut self, hw: &mut H);

    /// Switch the panel's tearing-effect output on or off
    fn enable_te(&mut self, hw: &mut H, enable: bool) -> Result<(), RfbiError>;

    /// Prepare the controller for an update of `region`
    ///
    /// Returns the region that will actually be written. The default clips
    /// to the screen without talking to the controller.
    fn setup_update(&mut self, hw: &mut H, region: Region) -> Region {
        let _ = hw;
        let (width, height) = self.screen_size();
        region.clip(width, height)
    }

    /// Frame buffer for the L4 path, if the display has one
    fn frame_source(&self) -> Option<FrameSource<'_>> {
        None
    }
}
