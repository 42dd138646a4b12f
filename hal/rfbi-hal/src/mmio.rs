//! Memory-mapped register access
//!
//! Provides the register bus trait and bit-field helpers used by
//! register-level drivers.

/// 32-bit memory-mapped register block
///
/// Offsets are byte offsets from the block base address.
pub trait RegisterBus {
    /// Read a 32-bit register
    fn read(&self, offset: u16) -> u32;

    /// Write a 32-bit register
    fn write(&mut self, offset: u16, value: u32);

    /// Read-modify-write a bit field `[end:start]` (inclusive, `end >= start`)
    fn modify(&mut self, offset: u16, value: u32, end: u8, start: u8) {
        let current = self.read(offset);
        self.write(offset, field_mod(current, value, end, start));
    }
}

/// Mask covering bits `[end:start]`
const fn field_mask(end: u8, start: u8) -> u32 {
    let width = end - start + 1;
    if width >= 32 {
        u32::MAX
    } else {
        ((1u32 << width) - 1) << start
    }
}

/// Place `value` in bits `[end:start]`
pub const fn field_val(value: u32, end: u8, start: u8) -> u32 {
    (value << start) & field_mask(end, start)
}

/// Extract bits `[end:start]` of `reg`
pub const fn field_get(reg: u32, end: u8, start: u8) -> u32 {
    (reg & field_mask(end, start)) >> start
}

/// Replace bits `[end:start]` of `reg` with `value`
pub const fn field_mod(reg: u32, value: u32, end: u8, start: u8) -> u32 {
    (reg & !field_mask(end, start)) | field_val(value, end, start)
}
