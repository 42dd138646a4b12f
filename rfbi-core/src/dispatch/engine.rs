//! RFBI engine
//!
//! One [`Rfbi`] instance owns the controller, the command queue, the display
//! sessions and the dispatcher state for one RFBI block.

use core::cell::{Cell, RefCell};
use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicBool, Ordering};

use super::barrier::BarrierBoard;
use super::state::{DispatchEvent, DispatchState};
use crate::config::{Module, PanelConfig, PixelFormat, MAX_TE_LINE};
use crate::error::RfbiError;
use crate::queue::{Command, CommandQueue, Region, COMMAND_FIFO_LEN_BYTES};
use crate::session::SessionTable;
use crate::timing::{ConvertedTimings, PanelTimings, TeConfig, TePulses, TimingRequest};
use crate::traits::{DisplayOps, RfbiHardware};

/// RFBI engine
///
/// Lock order is sessions, then hardware. The queue lock is never held while
/// either is taken.
pub struct Rfbi<M: RawMutex, H, D, const N: usize = COMMAND_FIFO_LEN_BYTES> {
    queue: CommandQueue<M, N>,
    sessions: Mutex<M, RefCell<SessionTable<H, D>>>,
    hardware: Mutex<M, RefCell<H>>,
    state: Mutex<M, Cell<DispatchState>>,
    /// Drain token, held by the drain loop or by the in-flight transfer
    draining: AtomicBool,
    completion: Signal<M, ()>,
    barriers: BarrierBoard<M>,
}

impl<M, H, D, const N: usize> Rfbi<M, H, D, N>
where
    M: RawMutex,
    H: RfbiHardware,
    D: DisplayOps<H>,
{
    /// Create an engine around `hardware`
    ///
    /// Fails if the queue cannot hold a single command.
    pub fn new(hardware: H) -> Result<Self, RfbiError> {
        Ok(Self {
            queue: CommandQueue::new()?,
            sessions: Mutex::new(RefCell::new(SessionTable::new())),
            hardware: Mutex::new(RefCell::new(hardware)),
            state: Mutex::new(Cell::new(DispatchState::Idle)),
            draining: AtomicBool::new(false),
            completion: Signal::new(),
            barriers: BarrierBoard::new(),
        })
    }

    /// Attach a display to the module with index `index`
    pub fn attach(&self, index: u8, config: PanelConfig, ops: D) -> Result<Module, RfbiError> {
        let module = self
            .sessions
            .lock(|s| s.borrow_mut().attach(index, config, ops))?;
        info!("display attached to module {}", index);
        Ok(module)
    }

    /// Check if a display is attached to `module`
    pub fn is_attached(&self, module: Module) -> bool {
        self.sessions.lock(|s| s.borrow().contains(module))
    }

    fn assert_attached(&self, module: Module) {
        assert!(self.is_attached(module), "no display attached to {:?}", module);
    }

    /// Select the pixel format of `module`
    ///
    /// Valid formats are 12, 16, 18 or 24 bpp over 8, 9, 12 or 16 data
    /// lines where a whole number of pixels fits a 1, 2 or 3 cycle pattern.
    pub fn configure(&self, module: Module, bpp: u8, lines: u8) -> Result<PixelFormat, RfbiError> {
        let format = PixelFormat::new(bpp, lines)?;

        self.sessions.lock(|s| {
            if let Some(session) = s.borrow_mut().get_mut(module) {
                session.set_format(bpp, lines);
            }
            self.hardware.lock(|hw| hw.borrow_mut().configure(module, &format));
        });

        debug!("module {} configured: {} bpp, {} lines", module.index(), bpp, lines);
        Ok(format)
    }

    /// Replace the timings of the display on `module` and program them
    ///
    /// The clock rate is read now; on failure nothing is changed.
    ///
    /// # Panics
    ///
    /// Panics if no display is attached to `module`.
    pub fn set_timings(
        &self,
        module: Module,
        request: &TimingRequest,
    ) -> Result<ConvertedTimings, RfbiError> {
        self.sessions.lock(|s| {
            let mut sessions = s.borrow_mut();
            let session = sessions.expect_mut(module);

            self.hardware.lock(|hw| {
                let mut hw = hw.borrow_mut();
                let mut timings = PanelTimings::new(*request);
                let converted = timings.convert(hw.clock_rate_hz())?;

                session.replace_timings(timings);
                hw.write_timings(module, &converted);
                debug!(
                    "module {} timings: divider {}, on/off {=u32:#x}, cycle {=u32:#x}",
                    module.index(),
                    converted.divider,
                    converted.on_off,
                    converted.cycle
                );
                Ok(converted)
            })
        })
    }

    /// Stored configuration of the display on `module`
    ///
    /// Reflects later `configure` and `set_timings` calls.
    pub fn panel_config(&self, module: Module) -> Option<PanelConfig> {
        self.sessions
            .lock(|s| s.borrow().get(module).map(|session| *session.config()))
    }

    /// Timings last programmed for the display on `module`
    pub fn converted_timings(&self, module: Module) -> Option<ConvertedTimings> {
        self.sessions.lock(|s| {
            s.borrow()
                .get(module)
                .and_then(|session| session.timings().converted().copied())
        })
    }

    /// Validate and program tearing-effect pulses
    pub fn setup_te(&self, te: &TeConfig) -> Result<TePulses, RfbiError> {
        self.hardware.lock(|hw| {
            let mut hw = hw.borrow_mut();
            let pulses = te.validate_at_rate(hw.clock_rate_hz())?;
            hw.setup_te(&pulses);
            debug!("TE pulses: hs {} vs {} ticks", pulses.hs_ticks, pulses.vs_ticks);
            Ok(pulses)
        })
    }

    /// Switch the tearing-effect trigger on or off at `line`
    pub fn enable_te(&self, enable: bool, line: u16) -> Result<(), RfbiError> {
        if line > MAX_TE_LINE {
            return Err(RfbiError::InvalidTeLine(line));
        }
        self.hardware.lock(|hw| hw.borrow_mut().enable_te(enable, line))
    }

    /// Bring up the display on `module`
    ///
    /// Programs its pixel format, timings and TE pulses, then runs the
    /// display's own enable sequence. A failing display reports `NoDevice`.
    ///
    /// # Panics
    ///
    /// Panics if no display is attached to `module`.
    pub fn enable_display(&self, module: Module) -> Result<(), RfbiError> {
        self.sessions.lock(|s| {
            let mut sessions = s.borrow_mut();
            let session = sessions.expect_mut(module);
            let config = *session.config();
            let format = PixelFormat::new(config.bpp, config.data_lines)?;

            self.hardware.lock(|hw| {
                let mut hw = hw.borrow_mut();
                hw.configure(module, &format);

                let rate_hz = hw.clock_rate_hz();
                let converted = session.timings_mut().convert(rate_hz)?;
                hw.write_timings(module, &converted);

                if let Some(te) = config.te {
                    let pulses = te.validate_at_rate(rate_hz)?;
                    hw.setup_te(&pulses);
                }

                session.ops_mut().enable(&mut hw).map_err(|_err| {
                    error!("display on module {} failed to enable", module.index());
                    RfbiError::NoDevice
                })
            })
        })?;

        info!("display on module {} enabled", module.index());
        Ok(())
    }

    /// Power down the display on `module`
    ///
    /// # Panics
    ///
    /// Panics if no display is attached to `module`.
    pub fn disable_display(&self, module: Module) {
        self.with_session(module, |ops, hw| ops.disable(hw));
        info!("display on module {} disabled", module.index());
    }

    /// Switch the tearing-effect output of the display on `module`
    ///
    /// # Panics
    ///
    /// Panics if no display is attached to `module`.
    pub fn enable_display_te(&self, module: Module, enable: bool) -> Result<(), RfbiError> {
        self.with_session(module, |ops, hw| ops.enable_te(hw, enable))
    }

    fn with_session<R>(&self, module: Module, f: impl FnOnce(&mut D, &mut H) -> R) -> R {
        self.sessions.lock(|s| {
            let mut sessions = s.borrow_mut();
            let session = sessions.expect_mut(module);
            self.hardware
                .lock(|hw| f(session.ops_mut(), &mut *hw.borrow_mut()))
        })
    }

    /// Queue an update of `region` on `module`
    ///
    /// Waits only while the queue is full. A region with no pixels is
    /// accepted without queueing anything.
    ///
    /// # Panics
    ///
    /// Panics if no display is attached to `module`.
    pub async fn request_update(&self, module: Module, region: Region) {
        self.assert_attached(module);
        if region.is_empty() {
            return;
        }

        self.queue
            .enqueue(Command::UpdateRegion { module, region })
            .await;
        self.drain();
    }

    /// Wait until every update queued before this call has been written
    ///
    /// # Panics
    ///
    /// Panics if no display is attached to `module`.
    pub async fn request_sync(&self, module: Module) {
        self.assert_attached(module);

        let ticket = self.queue.enqueue_barrier(module).await;
        self.drain();

        trace!("waiting for sync barrier {}", ticket.0);
        self.barriers.wait(ticket).await;
    }

    /// Frame-done interrupt entry
    ///
    /// Only posts the event; the completion is handled by [`Rfbi::run`] or
    /// [`Rfbi::poll_completion`]. An event with no transfer in flight is
    /// dropped here, so it cannot complete a transfer started later.
    pub fn frame_done(&self) {
        if !self.is_busy() {
            warn!("frame done with no transfer in flight, ignored");
            return;
        }
        self.completion.signal(());
    }

    /// Handle frame-done events forever
    pub async fn run(&self) -> ! {
        loop {
            self.completion.wait().await;
            self.complete_transfer();
        }
    }

    /// Handle a pending frame-done event, if any
    ///
    /// Returns `true` if an event was consumed.
    pub fn poll_completion(&self) -> bool {
        if self.completion.try_take().is_none() {
            return false;
        }
        self.complete_transfer();
        true
    }

    fn complete_transfer(&self) {
        let next = self
            .state
            .lock(|state| state.get().transition(DispatchEvent::FrameDone));
        let Some(next) = next else {
            warn!("frame done with no transfer in flight, ignored");
            return;
        };

        self.hardware.lock(|hw| hw.borrow_mut().finish_transfer());
        self.state.lock(|state| state.set(next));
        trace!("frame done");

        // The finished transfer held the drain token
        self.drain_owned();
    }

    /// Current transfer state
    pub fn state(&self) -> DispatchState {
        self.state.lock(|state| state.get())
    }

    /// Check if a hardware transfer is in flight
    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    /// Number of queued commands
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Run `f` with exclusive access to the controller
    ///
    /// For panel drivers issuing controller commands outside an update.
    pub fn with_hardware<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        self.hardware.lock(|hw| f(&mut *hw.borrow_mut()))
    }

    /// Write a register snapshot of the controller to `out`
    pub fn dump_registers(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        self.hardware.lock(|hw| hw.borrow_mut().dump_registers(out))
    }

    /// Drain the queue if nobody else is
    fn drain(&self) {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.drain_owned();
    }

    /// Drain loop, entered with the drain token held
    fn drain_owned(&self) {
        loop {
            let release = || self.draining.store(false, Ordering::Release);
            let Some(command) = self.queue.dequeue_or_else(release) else {
                return;
            };

            match command {
                Command::UpdateRegion { module, region } => {
                    if self.dispatch_update(module, region) {
                        // The transfer keeps the token until frame done
                        return;
                    }
                }
                Command::SyncBarrier { ticket, .. } => self.barriers.release(ticket),
            }
        }
    }

    /// Hand one region to the hardware
    ///
    /// Returns `true` if a transfer was started and is now in flight.
    fn dispatch_update(&self, module: Module, region: Region) -> bool {
        match self.prepare_update(module, region) {
            Prepared::Started => true,
            Prepared::Pixels(region) => {
                self.push_pixels(module, region);
                false
            }
            Prepared::Skipped => false,
        }
    }

    fn prepare_update(&self, module: Module, region: Region) -> Prepared {
        self.sessions.lock(|s| {
            let mut sessions = s.borrow_mut();
            let session = sessions.expect_mut(module);
            let direct = session.capabilities().direct_transfer;

            self.hardware.lock(|hw| {
                let mut hw = hw.borrow_mut();
                let region = session.ops_mut().setup_update(&mut hw, region);
                if region.is_empty() {
                    trace!("update clipped away");
                    return Prepared::Skipped;
                }

                if direct {
                    // Busy before start, so an immediate frame done is not lost
                    self.completion.reset();
                    self.state.lock(|state| {
                        match state.get().transition(DispatchEvent::TransferStarted) {
                            Some(next) => state.set(next),
                            None => panic!("transfer started while busy"),
                        }
                    });
                    hw.start_transfer(module, region.w, region.h);
                    trace!("transfer {}x{} started", region.w, region.h);
                    return Prepared::Started;
                }

                if session.ops().frame_source().is_none() {
                    warn!("module {} has no frame buffer, update dropped", module.index());
                    return Prepared::Skipped;
                }
                Prepared::Pixels(region)
            })
        })
    }

    /// Write `region` over L4, taking the locks once per row
    ///
    /// With a critical-section mutex, interrupts stay masked for one row
    /// rather than the whole region. The drain token keeps other updates
    /// out between rows.
    fn push_pixels(&self, module: Module, region: Region) {
        for row in region.y..region.y + region.h {
            let line = Region::new(region.x, row, region.w, 1);
            let written = self.sessions.lock(|s| {
                let sessions = s.borrow();
                let source = sessions
                    .get(module)
                    .and_then(|session| session.ops().frame_source());
                match source {
                    Some(source) => self
                        .hardware
                        .lock(|hw| hw.borrow_mut().write_pixels(module, &source, line)),
                    None => Ok(()),
                }
            });

            if let Err(_err) = written {
                error!("L4 update of module {} failed at row {}", module.index(), row);
                return;
            }
        }
    }
}

/// Outcome of handing one update to the hardware
enum Prepared {
    /// Transfer started, frame done pending
    Started,
    /// Pixels to write over L4
    Pixels(Region),
    /// Nothing to write
    Skipped,
}
