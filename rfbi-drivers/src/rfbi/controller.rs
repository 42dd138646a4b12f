//! Register-level RFBI controller
//!
//! Every register access runs with the interface clock referenced. A frame
//! transfer holds its own clock reference from start until frame done.

use core::fmt;

use rfbi_core::config::{DataType, ParallelMode, MAX_MODULES, MAX_TE_LINE};
use rfbi_core::queue::Region;
use rfbi_core::timing::{TePulses, TimingTicks};
use rfbi_core::{ConvertedTimings, FrameSource, Module, PixelFormat, RfbiError, RfbiHardware, TeMode};
use rfbi_hal::{field_get, field_mod, field_val, FunctionalClock, LcdOutput, RegisterBus};

use super::rate::max_tx_rate;
use super::regs::{self, control, config, revision, sysconfig};

/// Registers listed by [`RfbiHardware::dump_registers`], in dump order
const DUMP_REGISTERS: [(&str, u16); 25] = [
    ("RFBI_REVISION", regs::REVISION),
    ("RFBI_SYSCONFIG", regs::SYSCONFIG),
    ("RFBI_SYSSTATUS", regs::SYSSTATUS),
    ("RFBI_CONTROL", regs::CONTROL),
    ("RFBI_PIXEL_CNT", regs::PIXEL_CNT),
    ("RFBI_LINE_NUMBER", regs::LINE_NUMBER),
    ("RFBI_CMD", regs::CMD),
    ("RFBI_PARAM", regs::PARAM),
    ("RFBI_DATA", regs::DATA),
    ("RFBI_READ", regs::READ),
    ("RFBI_STATUS", regs::STATUS),
    ("RFBI_CONFIG(0)", regs::config(Module::Cs0)),
    ("RFBI_ONOFF_TIME(0)", regs::onoff_time(Module::Cs0)),
    ("RFBI_CYCLE_TIME(0)", regs::cycle_time(Module::Cs0)),
    ("RFBI_DATA_CYCLE1(0)", regs::data_cycle(Module::Cs0, 1)),
    ("RFBI_DATA_CYCLE2(0)", regs::data_cycle(Module::Cs0, 2)),
    ("RFBI_DATA_CYCLE3(0)", regs::data_cycle(Module::Cs0, 3)),
    ("RFBI_CONFIG(1)", regs::config(Module::Cs1)),
    ("RFBI_ONOFF_TIME(1)", regs::onoff_time(Module::Cs1)),
    ("RFBI_CYCLE_TIME(1)", regs::cycle_time(Module::Cs1)),
    ("RFBI_DATA_CYCLE1(1)", regs::data_cycle(Module::Cs1, 1)),
    ("RFBI_DATA_CYCLE2(1)", regs::data_cycle(Module::Cs1, 2)),
    ("RFBI_DATA_CYCLE3(1)", regs::data_cycle(Module::Cs1, 3)),
    ("RFBI_VSYNC_WIDTH", regs::VSYNC_WIDTH),
    ("RFBI_HSYNC_WIDTH", regs::HSYNC_WIDTH),
];

/// Place `value` in `field` of `reg`
fn with_field(reg: u32, field: (u8, u8), value: u32) -> u32 {
    field_mod(reg, value, field.0, field.1)
}

/// IP revision read at init
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Revision {
    pub major: u8,
    pub minor: u8,
}

/// Pixel layout of the L4 write paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum L4Pixel {
    /// 16 bpp over 8 lines: high byte, then low byte
    Rgb565Bytes,
    /// 24 bpp over 8 lines from 32-bit pixels: red, green, blue
    Rgb888Bytes,
    /// 16 bpp over 16 lines: one halfword
    Rgb565Halfword,
}

impl L4Pixel {
    fn for_format(format: &PixelFormat) -> Result<Self, RfbiError> {
        match (format.data_type, format.parallel_mode) {
            (DataType::Bpp16, ParallelMode::Lines8) => Ok(L4Pixel::Rgb565Bytes),
            (DataType::Bpp24, ParallelMode::Lines8) => Ok(L4Pixel::Rgb888Bytes),
            (DataType::Bpp16, ParallelMode::Lines16) => Ok(L4Pixel::Rgb565Halfword),
            _ => Err(RfbiError::UnsupportedPixelFormat {
                bpp: format.bpp,
                lines: format.lines,
            }),
        }
    }

    /// Bytes per pixel in the frame buffer
    fn stride(self) -> usize {
        match self {
            L4Pixel::Rgb565Bytes | L4Pixel::Rgb565Halfword => 2,
            L4Pixel::Rgb888Bytes => 4,
        }
    }
}

/// RFBI controller on a register bus
pub struct RfbiController<B, C, L> {
    bus: B,
    clock: C,
    lcd: L,
    formats: [Option<PixelFormat>; MAX_MODULES],
    /// Module currently selected in CONTROL
    selected: Option<Module>,
    te_mode: Option<TeMode>,
    te_enabled: bool,
    transfer_active: bool,
}

impl<B: RegisterBus, C: FunctionalClock, L: LcdOutput> RfbiController<B, C, L> {
    pub fn new(bus: B, clock: C, lcd: L) -> Self {
        Self {
            bus,
            clock,
            lcd,
            formats: [None; MAX_MODULES],
            selected: None,
            te_mode: None,
            te_enabled: false,
            transfer_active: false,
        }
    }

    /// Enable autoidle and smart-idle, then read the IP revision
    pub fn init(&mut self) -> Revision {
        self.clocked(|rfbi| {
            let l = rfbi.bus.read(regs::SYSCONFIG);
            rfbi.bus
                .write(regs::SYSCONFIG, l | sysconfig::AUTOIDLE | sysconfig::SMART_IDLE);

            let rev = rfbi.bus.read(regs::REVISION);
            let revision = Revision {
                major: field_get(rev, revision::MAJOR.0, revision::MAJOR.1) as u8,
                minor: field_get(rev, revision::MINOR.0, revision::MINOR.1) as u8,
            };

            #[cfg(feature = "defmt")]
            defmt::info!("RFBI rev {}.{}", revision.major, revision.minor);

            revision
        })
    }

    /// Maximum pixel rate for the current interface clock and `dss1_hz`
    pub fn max_tx_rate(&self, dss1_hz: u32) -> u32 {
        max_tx_rate(self.clock.rate_hz(), dss1_hz)
    }

    /// Tick counts currently programmed for `module`
    pub fn read_timings(&mut self, module: Module) -> TimingTicks {
        self.clocked(|rfbi| {
            TimingTicks::from_registers(
                rfbi.bus.read(regs::onoff_time(module)),
                rfbi.bus.read(regs::cycle_time(module)),
            )
        })
    }

    /// Check if a frame transfer is in flight
    pub fn transfer_active(&self) -> bool {
        self.transfer_active
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Release the bus, clock and LCD channel
    pub fn release(self) -> (B, C, L) {
        (self.bus, self.clock, self.lcd)
    }

    fn clocked<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.clock.enable();
        let result = f(self);
        self.clock.disable();
        result
    }

    /// Route the bus to `module` and leave bypass mode
    fn select(&mut self, module: Module) {
        let mut l = self.bus.read(regs::CONTROL);
        l = with_field(l, control::CS, module.index() as u32 + 1);
        l = with_field(l, control::BYPASS, 0);
        self.bus.write(regs::CONTROL, l);
        self.selected = Some(module);
    }

    /// Module whose CONFIG carries the shared TE settings
    fn te_module(&self) -> Module {
        self.selected.unwrap_or(Module::Cs0)
    }

    fn selected_mode(&self) -> Result<ParallelMode, RfbiError> {
        self.selected
            .and_then(|module| self.formats[module.index()])
            .map(|format| format.parallel_mode)
            .ok_or(RfbiError::UnsupportedParallelMode)
    }

    /// Write `bytes` to an L4 data register in the selected bus width
    fn l4_write(&mut self, reg: u16, bytes: &[u8]) -> Result<(), RfbiError> {
        match self.selected_mode()? {
            ParallelMode::Lines8 => self.clocked(|rfbi| {
                for &byte in bytes {
                    rfbi.bus.write(reg, byte as u32);
                }
            }),
            ParallelMode::Lines16 => {
                assert!(bytes.len() % 2 == 0, "odd L4 write in 16-line mode");
                self.clocked(|rfbi| {
                    for half in bytes.chunks_exact(2) {
                        rfbi.bus.write(reg, u16::from_le_bytes([half[0], half[1]]) as u32);
                    }
                })
            }
            ParallelMode::Lines9 | ParallelMode::Lines12 => {
                return Err(RfbiError::UnsupportedParallelMode)
            }
        }
        Ok(())
    }
}

impl<B: RegisterBus, C: FunctionalClock, L: LcdOutput> RfbiHardware for RfbiController<B, C, L> {
    fn clock_rate_hz(&self) -> u32 {
        self.clock.rate_hz()
    }

    fn configure(&mut self, module: Module, format: &PixelFormat) {
        let cycles = format.data_cycles();

        self.clocked(|rfbi| {
            rfbi.bus.modify(regs::CONTROL, 0, control::CS.0, control::CS.1);

            // Internal trigger, 1 pixel per L4 access, active-high sync
            let l = field_val(format.parallel_mode as u32, config::PARALLEL_MODE.0, config::PARALLEL_MODE.1)
                | field_val(format.data_type as u32, config::DATA_TYPE.0, config::DATA_TYPE.1)
                | field_val(format.cycle_format as u32, config::CYCLE_FORMAT.0, config::CYCLE_FORMAT.1)
                | field_val(1, config::TE_VSYNC_POLARITY.0, config::TE_VSYNC_POLARITY.1)
                | field_val(1, config::HSYNC_POLARITY.0, config::HSYNC_POLARITY.1);
            rfbi.bus.write(regs::config(module), l);

            for (n, cycle) in (1..=3).zip(cycles) {
                rfbi.bus.write(regs::data_cycle(module, n), cycle);
            }

            rfbi.select(module);
        });
        self.formats[module.index()] = Some(*format);

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "RFBI config: bpp {}, lines {}, cycles: {=u32:#x} {=u32:#x} {=u32:#x}",
            format.bpp,
            format.lines,
            cycles[0],
            cycles[1],
            cycles[2]
        );
    }

    fn write_timings(&mut self, module: Module, timings: &ConvertedTimings) {
        self.clocked(|rfbi| {
            rfbi.bus.write(regs::onoff_time(module), timings.on_off);
            rfbi.bus.write(regs::cycle_time(module), timings.cycle);
            rfbi.bus.modify(
                regs::config(module),
                timings.granularity(),
                config::TIME_GRANULARITY.0,
                config::TIME_GRANULARITY.1,
            );
        });
    }

    fn setup_te(&mut self, pulses: &TePulses) {
        let module = self.te_module();

        self.clocked(|rfbi| {
            rfbi.bus.write(regs::HSYNC_WIDTH, pulses.hs_ticks);
            rfbi.bus.write(regs::VSYNC_WIDTH, pulses.vs_ticks);

            let mut l = rfbi.bus.read(regs::config(module));
            l = with_field(l, config::HSYNC_POLARITY, !pulses.hs_inverted as u32);
            l = with_field(l, config::TE_VSYNC_POLARITY, !pulses.vs_inverted as u32);
            rfbi.bus.write(regs::config(module), l);
        });
        self.te_mode = Some(pulses.mode);
    }

    fn enable_te(&mut self, enable: bool, line: u16) -> Result<(), RfbiError> {
        if line > MAX_TE_LINE {
            return Err(RfbiError::InvalidTeLine(line));
        }

        let module = self.te_module();
        let trigger = match (enable, self.te_mode) {
            (true, Some(mode)) => mode as u32,
            _ => 0,
        };

        self.clocked(|rfbi| {
            rfbi.bus
                .modify(regs::config(module), trigger, config::TRIGGER_MODE.0, config::TRIGGER_MODE.1);
            rfbi.bus.write(regs::LINE_NUMBER, line as u32);
        });
        self.te_enabled = enable;
        Ok(())
    }

    fn start_transfer(&mut self, module: Module, width: u16, height: u16) {
        assert!(!self.transfer_active, "RFBI transfer already in flight");

        self.lcd.set_size(width, height);
        self.lcd.enable_output(true);

        // Released by finish_transfer
        self.clock.enable();
        self.transfer_active = true;

        if self.selected != Some(module) {
            self.select(module);
        }
        self.bus.write(regs::PIXEL_CNT, width as u32 * height as u32);

        let mut l = self.bus.read(regs::CONTROL);
        l = with_field(l, control::ENABLE, 1);
        if !self.te_enabled {
            l = with_field(l, control::ITE, 1);
        }
        self.bus.write(regs::CONTROL, l);
    }

    fn finish_transfer(&mut self) {
        if !self.transfer_active {
            return;
        }

        self.bus.modify(regs::CONTROL, 0, control::ENABLE.0, control::ENABLE.1);
        self.clock.disable();
        self.transfer_active = false;
    }

    fn write_pixels(
        &mut self,
        module: Module,
        source: &FrameSource<'_>,
        region: Region,
    ) -> Result<(), RfbiError> {
        let format = self.formats[module.index()].ok_or(RfbiError::UnsupportedParallelMode)?;
        let layout = L4Pixel::for_format(&format)?;
        if region.is_empty() {
            return Ok(());
        }

        let screen_width = source.screen_width as usize;
        let (x, y) = (region.x as usize, region.y as usize);
        let (w, h) = (region.w as usize, region.h as usize);
        let bytes_per_pixel = layout.stride();
        let end = ((y + h - 1) * screen_width + x + w) * bytes_per_pixel;
        if x + w > screen_width || source.pixels.len() < end {
            return Err(RfbiError::FrameSourceTooSmall);
        }

        if self.selected != Some(module) {
            self.select(module);
        }

        self.clocked(|rfbi| {
            for row in y..y + h {
                let start = (row * screen_width + x) * bytes_per_pixel;
                let line = &source.pixels[start..start + w * bytes_per_pixel];

                for px in line.chunks_exact(bytes_per_pixel) {
                    match layout {
                        L4Pixel::Rgb565Bytes => {
                            rfbi.bus.write(regs::PARAM, px[1] as u32);
                            rfbi.bus.write(regs::PARAM, px[0] as u32);
                        }
                        L4Pixel::Rgb888Bytes => {
                            rfbi.bus.write(regs::PARAM, px[2] as u32);
                            rfbi.bus.write(regs::PARAM, px[1] as u32);
                            rfbi.bus.write(regs::PARAM, px[0] as u32);
                        }
                        L4Pixel::Rgb565Halfword => {
                            rfbi.bus.write(regs::PARAM, u16::from_le_bytes([px[0], px[1]]) as u32);
                        }
                    }
                }
            }
        });
        Ok(())
    }

    fn write_command(&mut self, bytes: &[u8]) -> Result<(), RfbiError> {
        self.l4_write(regs::CMD, bytes)
    }

    fn write_data(&mut self, bytes: &[u8]) -> Result<(), RfbiError> {
        self.l4_write(regs::PARAM, bytes)
    }

    fn read_data(&mut self, buf: &mut [u8]) -> Result<(), RfbiError> {
        match self.selected_mode()? {
            ParallelMode::Lines8 => self.clocked(|rfbi| {
                for byte in buf.iter_mut() {
                    rfbi.bus.write(regs::READ, 0);
                    *byte = rfbi.bus.read(regs::READ) as u8;
                }
            }),
            ParallelMode::Lines16 => {
                assert!(buf.len() % 2 == 0, "odd L4 read in 16-line mode");
                self.clocked(|rfbi| {
                    for half in buf.chunks_exact_mut(2) {
                        rfbi.bus.write(regs::READ, 0);
                        let value = rfbi.bus.read(regs::READ) as u16;
                        half.copy_from_slice(&value.to_le_bytes());
                    }
                })
            }
            ParallelMode::Lines9 | ParallelMode::Lines12 => {
                return Err(RfbiError::UnsupportedParallelMode)
            }
        }
        Ok(())
    }

    fn dump_registers(&mut self, out: &mut dyn fmt::Write) -> fmt::Result {
        self.clocked(|rfbi| {
            for (name, offset) in DUMP_REGISTERS {
                writeln!(out, "{:<35} {:08x}", name, rfbi.bus.read(offset))?;
            }
            Ok(())
        })
    }
}
