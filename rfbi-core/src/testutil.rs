//! Test doubles shared by the unit tests

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::task::{Context, Poll, Waker};
use std::sync::Arc;
use std::task::Wake;
use std::vec;
use std::vec::Vec;

use crate::config::{Module, PixelFormat, MAX_TE_LINE};
use crate::error::RfbiError;
use crate::queue::Region;
use crate::timing::{ConvertedTimings, TePulses};
use crate::traits::{Capabilities, DisplayOps, FrameSource, RfbiHardware};

/// Waker that counts how often it was woken
pub struct WakeCounter {
    wakes: AtomicUsize,
}

impl WakeCounter {
    pub fn count(&self) -> usize {
        self.wakes.load(Ordering::SeqCst)
    }
}

impl Wake for WakeCounter {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.wakes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn flag_waker() -> (Arc<WakeCounter>, Waker) {
    let counter = Arc::new(WakeCounter {
        wakes: AtomicUsize::new(0),
    });
    let waker = Waker::from(counter.clone());
    (counter, waker)
}

/// Poll a future exactly once with `waker`
pub fn poll_once<F: Future>(fut: Pin<&mut F>, waker: &Waker) -> Poll<F::Output> {
    let mut cx = Context::from_waker(waker);
    fut.poll(&mut cx)
}

/// Hardware call as seen by [`MockHardware`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwEvent {
    Configure(Module),
    Timings(Module),
    SetupTe,
    EnableTe(bool, u16),
    Start(Module, u16, u16),
    Finish,
    Pixels(Module, Region),
}

/// In-memory controller recording every call
pub struct MockHardware {
    pub rate_hz: u32,
    pub events: Vec<HwEvent>,
    pub formats: [Option<PixelFormat>; 2],
    pub timings: [Option<ConvertedTimings>; 2],
    pub te: Option<TePulses>,
    pub commands: Vec<u8>,
    pub data: Vec<u8>,
    in_flight: bool,
    max_in_flight: usize,
}

impl MockHardware {
    pub fn new(rate_hz: u32) -> Self {
        Self {
            rate_hz,
            events: Vec::new(),
            formats: [None, None],
            timings: [None, None],
            te: None,
            commands: Vec::new(),
            data: Vec::new(),
            in_flight: false,
            max_in_flight: 0,
        }
    }

    /// Highest number of overlapping transfers ever observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn starts(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, HwEvent::Start(..)))
            .count()
    }

    pub fn finishes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, HwEvent::Finish))
            .count()
    }
}

impl RfbiHardware for MockHardware {
    fn clock_rate_hz(&self) -> u32 {
        self.rate_hz
    }

    fn configure(&mut self, module: Module, format: &PixelFormat) {
        self.formats[module.index()] = Some(*format);
        self.events.push(HwEvent::Configure(module));
    }

    fn write_timings(&mut self, module: Module, timings: &ConvertedTimings) {
        self.timings[module.index()] = Some(*timings);
        self.events.push(HwEvent::Timings(module));
    }

    fn setup_te(&mut self, pulses: &TePulses) {
        self.te = Some(*pulses);
        self.events.push(HwEvent::SetupTe);
    }

    fn enable_te(&mut self, enable: bool, line: u16) -> Result<(), RfbiError> {
        if line > MAX_TE_LINE {
            return Err(RfbiError::InvalidTeLine(line));
        }
        self.events.push(HwEvent::EnableTe(enable, line));
        Ok(())
    }

    fn start_transfer(&mut self, module: Module, width: u16, height: u16) {
        let overlapping = if self.in_flight { 2 } else { 1 };
        self.max_in_flight = self.max_in_flight.max(overlapping);
        assert!(!self.in_flight, "transfer already in flight");
        self.in_flight = true;
        self.events.push(HwEvent::Start(module, width, height));
    }

    fn finish_transfer(&mut self) {
        self.in_flight = false;
        self.events.push(HwEvent::Finish);
    }

    fn write_pixels(
        &mut self,
        module: Module,
        source: &FrameSource<'_>,
        region: Region,
    ) -> Result<(), RfbiError> {
        let last = (region.y as usize + region.h as usize) * source.screen_width as usize * 2;
        if source.pixels.len() < last {
            return Err(RfbiError::FrameSourceTooSmall);
        }
        self.events.push(HwEvent::Pixels(module, region));
        Ok(())
    }

    fn write_command(&mut self, bytes: &[u8]) -> Result<(), RfbiError> {
        self.commands.extend_from_slice(bytes);
        Ok(())
    }

    fn write_data(&mut self, bytes: &[u8]) -> Result<(), RfbiError> {
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    fn read_data(&mut self, buf: &mut [u8]) -> Result<(), RfbiError> {
        buf.fill(0xA5);
        Ok(())
    }

    fn dump_registers(&mut self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "{:<35} {:08x}", "RFBI_MOCK_TRANSFERS", self.starts())
    }
}

/// Panel driver double
pub struct MockDisplay {
    pub width: u16,
    pub height: u16,
    pub direct: bool,
    pub enabled: bool,
    pub te_enabled: bool,
    pub fail_enable: bool,
    pub updates: Vec<Region>,
    pub framebuffer: Vec<u8>,
}

impl MockDisplay {
    /// Display fed by the display controller
    pub fn direct(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            direct: true,
            enabled: false,
            te_enabled: false,
            fail_enable: false,
            updates: Vec::new(),
            framebuffer: Vec::new(),
        }
    }

    /// Display written over L4 from a 16 bpp frame buffer
    pub fn l4(width: u16, height: u16) -> Self {
        Self {
            direct: false,
            framebuffer: vec![0; width as usize * height as usize * 2],
            ..Self::direct(width, height)
        }
    }
}

impl DisplayOps<MockHardware> for MockDisplay {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            direct_transfer: self.direct,
        }
    }

    fn screen_size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn enable(&mut self, hw: &mut MockHardware) -> Result<(), RfbiError> {
        if self.fail_enable {
            return Err(RfbiError::UnsupportedParallelMode);
        }
        // Sleep out, display on
        hw.write_command(&[0x11])?;
        hw.write_command(&[0x29])?;
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self, hw: &mut MockHardware) {
        let _ = hw.write_command(&[0x28]);
        self.enabled = false;
    }

    fn enable_te(&mut self, hw: &mut MockHardware, enable: bool) -> Result<(), RfbiError> {
        hw.write_command(&[if enable { 0x35 } else { 0x34 }])?;
        self.te_enabled = enable;
        Ok(())
    }

    fn setup_update(&mut self, _hw: &mut MockHardware, region: Region) -> Region {
        let clipped = region.clip(self.width, self.height);
        self.updates.push(clipped);
        clipped
    }

    fn frame_source(&self) -> Option<FrameSource<'_>> {
        if self.framebuffer.is_empty() {
            return None;
        }
        Some(FrameSource {
            pixels: &self.framebuffer,
            screen_width: self.width,
        })
    }
}
