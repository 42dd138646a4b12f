//! Error taxonomy
//!
//! Recoverable failures are reported as [`RfbiError`]. Broken driver
//! invariants (unregistered module, overlapping transfers) are contract
//! violations and panic instead.

/// Errors reported by the RFBI engine and drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RfbiError {
    /// Bits-per-pixel / data-line combination the interface cannot clock out
    UnsupportedPixelFormat { bpp: u8, lines: u8 },
    /// No clock divider satisfies the timing field widths
    TimingUnsatisfiable,
    /// Functional clock reports a rate too low to derive a tick period
    ClockUnavailable,
    /// Tearing-effect pulse shorter than the hardware minimum
    TePulseTooShort,
    /// Horizontal and vertical tearing-effect pulses are indistinguishable
    TePulsesEqual,
    /// Tearing-effect trigger line outside the 11-bit line counter
    InvalidTeLine(u16),
    /// L4 access in a parallel mode without a byte/halfword path
    UnsupportedParallelMode,
    /// Module index outside the two chip selects
    InvalidModule(u8),
    /// A display is already attached to this module
    ModuleInUse,
    /// Frame source is smaller than the requested region
    FrameSourceTooSmall,
    /// Command queue capacity below one command record
    QueueCapacity,
    /// Display controller or panel refused to enable
    NoDevice,
    /// Configuration could not be serialized or deserialized
    ConfigEncoding,
}

/// Broad error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// Unsupported or unsatisfiable configuration
    Configuration,
    /// Value outside the domain the hardware accepts
    Domain,
    /// Argument rejected outright
    InvalidArgument,
    /// Startup resources missing
    ResourceExhaustion,
    /// Attached device failed
    Device,
    /// Stored configuration unreadable
    Encoding,
}

impl RfbiError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RfbiError::UnsupportedPixelFormat { .. }
            | RfbiError::TimingUnsatisfiable
            | RfbiError::ClockUnavailable
            | RfbiError::InvalidTeLine(_)
            | RfbiError::UnsupportedParallelMode => ErrorKind::Configuration,
            RfbiError::TePulseTooShort => ErrorKind::Domain,
            RfbiError::TePulsesEqual
            | RfbiError::InvalidModule(_)
            | RfbiError::ModuleInUse
            | RfbiError::FrameSourceTooSmall => ErrorKind::InvalidArgument,
            RfbiError::QueueCapacity => ErrorKind::ResourceExhaustion,
            RfbiError::NoDevice => ErrorKind::Device,
            RfbiError::ConfigEncoding => ErrorKind::Encoding,
        }
    }
}
