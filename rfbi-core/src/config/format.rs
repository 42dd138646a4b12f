//! Pixel format and chip-select module definitions

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::RfbiError;

/// Number of chip-select modules on the interface
pub const MAX_MODULES: usize = 2;

/// Chip-select module (one attached display controller each)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Module {
    /// Chip select 0
    Cs0,
    /// Chip select 1
    Cs1,
}

impl Module {
    /// Table index of this module
    pub const fn index(self) -> usize {
        match self {
            Module::Cs0 => 0,
            Module::Cs1 => 1,
        }
    }
}

impl TryFrom<u8> for Module {
    type Error = RfbiError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Module::Cs0),
            1 => Ok(Module::Cs1),
            other => Err(RfbiError::InvalidModule(other)),
        }
    }
}

/// Pixel data type (DATATYPE field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DataType {
    Bpp12 = 0,
    Bpp16 = 1,
    Bpp18 = 2,
    Bpp24 = 3,
}

/// Number of parallel data lines (PARALLELMODE field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ParallelMode {
    Lines8 = 0,
    Lines9 = 1,
    Lines12 = 2,
    Lines16 = 3,
}

/// Bus cycles per pixel (CYCLEFORMAT field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CycleFormat {
    /// One cycle per pixel
    OneToOne = 0,
    /// Two cycles per pixel
    TwoToOne = 1,
    /// Three cycles per pixel
    ThreeToOne = 2,
    /// Three cycles per two pixels
    ThreeToTwo = 3,
}

/// Validated pixel format of one module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PixelFormat {
    /// Bits per pixel
    pub bpp: u8,
    /// Data lines on the bus
    pub lines: u8,
    pub data_type: DataType,
    pub parallel_mode: ParallelMode,
    pub cycle_format: CycleFormat,
}

impl PixelFormat {
    /// Validate a bits-per-pixel / data-lines combination
    ///
    /// The pixel must split into whole bus cycles: 1, 2 or 3 cycles per
    /// pixel, or 3 cycles per 2 pixels.
    pub fn new(bpp: u8, lines: u8) -> Result<Self, RfbiError> {
        let unsupported = RfbiError::UnsupportedPixelFormat { bpp, lines };

        let data_type = match bpp {
            12 => DataType::Bpp12,
            16 => DataType::Bpp16,
            18 => DataType::Bpp18,
            24 => DataType::Bpp24,
            _ => return Err(unsupported),
        };

        let parallel_mode = match lines {
            8 => ParallelMode::Lines8,
            9 => ParallelMode::Lines9,
            12 => ParallelMode::Lines12,
            16 => ParallelMode::Lines16,
            _ => return Err(unsupported),
        };

        let cycle_format = if bpp % lines == 0 {
            match bpp / lines {
                1 => CycleFormat::OneToOne,
                2 => CycleFormat::TwoToOne,
                3 => CycleFormat::ThreeToOne,
                _ => return Err(unsupported),
            }
        } else if (2 * bpp as u16) % lines as u16 == 0 && (2 * bpp as u16) / lines as u16 == 3 {
            CycleFormat::ThreeToTwo
        } else {
            return Err(unsupported);
        };

        Ok(Self {
            bpp,
            lines,
            data_type,
            parallel_mode,
            cycle_format,
        })
    }

    /// DATA_CYCLE1..3 register values
    ///
    /// Each word holds the number of bits sent in a cycle, for the first
    /// pixel in the low half and the second pixel in the high half.
    pub fn data_cycles(&self) -> [u32; 3] {
        let lines = self.lines as u32;
        match self.cycle_format {
            CycleFormat::OneToOne => [lines, 0, 0],
            CycleFormat::TwoToOne => [lines, lines, 0],
            CycleFormat::ThreeToOne => [lines, lines, lines],
            CycleFormat::ThreeToTwo => [lines, (lines / 2) | ((lines / 2) << 16), lines << 16],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BPPS: [u8; 4] = [12, 16, 18, 24];
    const LINES: [u8; 4] = [8, 9, 12, 16];

    #[test]
    fn test_module_from_index() {
        assert_eq!(Module::try_from(0), Ok(Module::Cs0));
        assert_eq!(Module::try_from(1), Ok(Module::Cs1));
        assert_eq!(Module::try_from(2), Err(RfbiError::InvalidModule(2)));
        assert_eq!(Module::Cs1.index(), 1);
    }

    #[test]
    fn test_supported_combinations() {
        let supported = [
            (12, 8, CycleFormat::ThreeToTwo),
            (12, 12, CycleFormat::OneToOne),
            (16, 8, CycleFormat::TwoToOne),
            (16, 16, CycleFormat::OneToOne),
            (18, 9, CycleFormat::TwoToOne),
            (18, 12, CycleFormat::ThreeToTwo),
            (24, 8, CycleFormat::ThreeToOne),
            (24, 12, CycleFormat::TwoToOne),
            (24, 16, CycleFormat::ThreeToTwo),
        ];

        for (bpp, lines, cycle) in supported {
            let format = PixelFormat::new(bpp, lines).unwrap();
            assert_eq!(format.cycle_format, cycle, "{bpp} bpp / {lines} lines");
        }
    }

    #[test]
    fn test_remaining_grid_is_rejected() {
        let mut accepted = 0;
        for bpp in BPPS {
            for lines in LINES {
                match PixelFormat::new(bpp, lines) {
                    Ok(_) => accepted += 1,
                    Err(e) => assert_eq!(e, RfbiError::UnsupportedPixelFormat { bpp, lines }),
                }
            }
        }
        assert_eq!(accepted, 9);
    }

    #[test]
    fn test_out_of_set_values() {
        assert!(PixelFormat::new(32, 16).is_err());
        assert!(PixelFormat::new(16, 4).is_err());
    }

    #[test]
    fn test_data_cycles() {
        let f = PixelFormat::new(16, 8).unwrap();
        assert_eq!(f.data_cycles(), [8, 8, 0]);

        let f = PixelFormat::new(24, 16).unwrap();
        assert_eq!(f.data_cycles(), [16, 8 | (8 << 16), 16 << 16]);

        let f = PixelFormat::new(16, 16).unwrap();
        assert_eq!(f.data_cycles(), [16, 0, 0]);
    }

    #[test]
    fn test_field_encodings() {
        let f = PixelFormat::new(18, 9).unwrap();
        assert_eq!(f.data_type as u8, 2);
        assert_eq!(f.parallel_mode as u8, 1);
        assert_eq!(f.cycle_format as u8, 1);
    }
}
