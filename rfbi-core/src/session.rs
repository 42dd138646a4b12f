//! Display sessions
//!
//! One display may be attached to each chip-select module. The table is
//! filled at bring-up and stays fixed afterwards.

use core::marker::PhantomData;

use crate::config::{Module, PanelConfig, MAX_MODULES};
use crate::error::RfbiError;
use crate::timing::PanelTimings;
use crate::traits::{Capabilities, DisplayOps, RfbiHardware};

/// Display attached to one module
pub struct DisplaySession<H, D> {
    config: PanelConfig,
    timings: PanelTimings,
    ops: D,
    _hw: PhantomData<fn(&mut H)>,
}

impl<H: RfbiHardware, D: DisplayOps<H>> DisplaySession<H, D> {
    fn new(config: PanelConfig, ops: D) -> Self {
        Self {
            config,
            timings: PanelTimings::new(config.timings),
            ops,
            _hw: PhantomData,
        }
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Record a new pixel format
    pub fn set_format(&mut self, bpp: u8, data_lines: u8) {
        self.config.bpp = bpp;
        self.config.data_lines = data_lines;
    }

    pub fn timings(&self) -> &PanelTimings {
        &self.timings
    }

    pub fn timings_mut(&mut self) -> &mut PanelTimings {
        &mut self.timings
    }

    /// Replace the timings, keeping the stored configuration in step
    pub fn replace_timings(&mut self, timings: PanelTimings) {
        self.config.timings = *timings.request();
        self.timings = timings;
    }

    pub fn capabilities(&self) -> Capabilities {
        self.ops.capabilities()
    }

    pub fn ops(&self) -> &D {
        &self.ops
    }

    pub fn ops_mut(&mut self) -> &mut D {
        &mut self.ops
    }
}

/// Fixed two-slot session table indexed by module
pub struct SessionTable<H, D> {
    slots: [Option<DisplaySession<H, D>>; MAX_MODULES],
}

impl<H: RfbiHardware, D: DisplayOps<H>> SessionTable<H, D> {
    pub const fn new() -> Self {
        Self {
            slots: [None, None],
        }
    }

    /// Attach a display to the module with index `index`
    pub fn attach(&mut self, index: u8, config: PanelConfig, ops: D) -> Result<Module, RfbiError> {
        let module = Module::try_from(index)?;
        let slot = &mut self.slots[module.index()];
        if slot.is_some() {
            return Err(RfbiError::ModuleInUse);
        }

        *slot = Some(DisplaySession::new(config, ops));
        Ok(module)
    }

    /// Check if a display is attached to `module`
    pub fn contains(&self, module: Module) -> bool {
        self.slots[module.index()].is_some()
    }

    pub fn get(&self, module: Module) -> Option<&DisplaySession<H, D>> {
        self.slots[module.index()].as_ref()
    }

    pub fn get_mut(&mut self, module: Module) -> Option<&mut DisplaySession<H, D>> {
        self.slots[module.index()].as_mut()
    }

    /// Session on `module`, which must be attached
    ///
    /// # Panics
    ///
    /// Panics if no display is attached to `module`.
    pub fn expect_mut(&mut self, module: Module) -> &mut DisplaySession<H, D> {
        match self.get_mut(module) {
            Some(session) => session,
            None => panic!("no display attached to {:?}", module),
        }
    }
}

impl<H: RfbiHardware, D: DisplayOps<H>> Default for SessionTable<H, D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockDisplay, MockHardware};
    use crate::timing::TimingRequest;

    type Table = SessionTable<MockHardware, MockDisplay>;

    #[test]
    fn test_attach_both_modules() {
        let mut table = Table::new();

        assert_eq!(
            table.attach(0, PanelConfig::default(), MockDisplay::direct(320, 240)),
            Ok(Module::Cs0)
        );
        assert_eq!(
            table.attach(1, PanelConfig::default(), MockDisplay::direct(128, 64)),
            Ok(Module::Cs1)
        );

        assert!(table.contains(Module::Cs0));
        assert!(table.contains(Module::Cs1));
        assert_eq!(table.get(Module::Cs1).unwrap().ops().screen_size(), (128, 64));
    }

    #[test]
    fn test_attach_out_of_range() {
        let mut table = Table::new();
        let result = table.attach(2, PanelConfig::default(), MockDisplay::direct(1, 1));
        assert_eq!(result, Err(RfbiError::InvalidModule(2)));
    }

    #[test]
    fn test_attach_occupied_slot() {
        let mut table = Table::new();
        table
            .attach(1, PanelConfig::default(), MockDisplay::direct(1, 1))
            .unwrap();

        let result = table.attach(1, PanelConfig::default(), MockDisplay::direct(2, 2));
        assert_eq!(result, Err(RfbiError::ModuleInUse));
        assert_eq!(table.get(Module::Cs1).unwrap().ops().screen_size(), (1, 1));
    }

    #[test]
    fn test_session_starts_unconverted() {
        let mut table = Table::new();
        table
            .attach(0, PanelConfig::default(), MockDisplay::direct(1, 1))
            .unwrap();

        let session = table.get(Module::Cs0).unwrap();
        assert!(session.timings().converted().is_none());
    }

    #[test]
    fn test_replace_timings_updates_config() {
        let mut table = Table::new();
        table
            .attach(0, PanelConfig::default(), MockDisplay::direct(1, 1))
            .unwrap();

        let request = TimingRequest {
            cs_off: 40_000,
            ..TimingRequest::default()
        };
        let session = table.expect_mut(Module::Cs0);
        session.replace_timings(PanelTimings::new(request));

        assert_eq!(session.config().timings, request);
        assert_eq!(session.timings().request(), &request);
    }

    #[test]
    #[should_panic(expected = "no display attached")]
    fn test_expect_unattached_panics() {
        let mut table = Table::new();
        table.expect_mut(Module::Cs1);
    }
}
