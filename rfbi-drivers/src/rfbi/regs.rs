//! RFBI register map

use rfbi_core::Module;

/// IP revision
pub const REVISION: u16 = 0x00;
/// Idle mode configuration
pub const SYSCONFIG: u16 = 0x10;
/// Reset status
pub const SYSSTATUS: u16 = 0x14;
/// Chip select, bypass and transfer control
pub const CONTROL: u16 = 0x40;
/// Pixels in the current frame transfer
pub const PIXEL_CNT: u16 = 0x44;
/// Tearing-effect trigger line
pub const LINE_NUMBER: u16 = 0x48;
/// Command write (A0 low)
pub const CMD: u16 = 0x4c;
/// Parameter/pixel write (A0 high)
pub const PARAM: u16 = 0x50;
/// Data write
pub const DATA: u16 = 0x54;
/// Data read
pub const READ: u16 = 0x58;
/// Interface status
pub const STATUS: u16 = 0x5c;
/// Vertical sync pulse width in ticks
pub const VSYNC_WIDTH: u16 = 0x90;
/// Horizontal sync pulse width in ticks
pub const HSYNC_WIDTH: u16 = 0x94;

/// Stride between the two per-module register banks
const MODULE_STRIDE: u16 = 0x18;

const fn banked(base: u16, module: Module) -> u16 {
    base + module.index() as u16 * MODULE_STRIDE
}

/// Pixel format, trigger mode and polarities
pub const fn config(module: Module) -> u16 {
    banked(0x60, module)
}

/// Packed on/off timings
pub const fn onoff_time(module: Module) -> u16 {
    banked(0x64, module)
}

/// Packed cycle timings
pub const fn cycle_time(module: Module) -> u16 {
    banked(0x68, module)
}

/// Bits sent per bus cycle, cycle `n` of 1..=3
pub const fn data_cycle(module: Module, n: u16) -> u16 {
    banked(0x6c + (n - 1) * 4, module)
}

/// SYSCONFIG bits
pub mod sysconfig {
    /// Automatic interface clock gating
    pub const AUTOIDLE: u32 = 1 << 0;
    /// Smart-idle mode in IDLEMODE[4:3]
    pub const SMART_IDLE: u32 = 2 << 3;
}

/// CONTROL fields as `(end, start)` bit ranges
pub mod control {
    /// Start the frame transfer
    pub const ENABLE: (u8, u8) = (0, 0);
    /// Bypass the interface (direct LCD output)
    pub const BYPASS: (u8, u8) = (1, 1);
    /// Chip select: 0 none, 1 CS0, 2 CS1
    pub const CS: (u8, u8) = (3, 2);
    /// Internal trigger: start without waiting for TE
    pub const ITE: (u8, u8) = (4, 4);
}

/// CONFIG fields as `(end, start)` bit ranges
pub mod config {
    pub const PARALLEL_MODE: (u8, u8) = (1, 0);
    /// 0 internal trigger, otherwise the TE mode
    pub const TRIGGER_MODE: (u8, u8) = (3, 2);
    /// Ticks counted at half the interface clock
    pub const TIME_GRANULARITY: (u8, u8) = (4, 4);
    pub const DATA_TYPE: (u8, u8) = (6, 5);
    pub const CYCLE_FORMAT: (u8, u8) = (10, 9);
    /// Vertical sync active high
    pub const TE_VSYNC_POLARITY: (u8, u8) = (20, 20);
    /// Horizontal sync active high
    pub const HSYNC_POLARITY: (u8, u8) = (21, 21);
}

/// REVISION fields
pub mod revision {
    pub const MAJOR: (u8, u8) = (7, 4);
    pub const MINOR: (u8, u8) = (3, 0);
}
