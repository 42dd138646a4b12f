//! Transfer state machine

/// Dispatcher transfer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchState {
    /// No hardware transfer in flight
    #[default]
    Idle,
    /// One hardware transfer in flight, waiting for frame done
    Busy,
}

/// Events that move the dispatcher between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchEvent {
    /// A region update was handed to the hardware
    TransferStarted,
    /// The frame-done interrupt fired
    FrameDone,
}

impl DispatchState {
    /// Process an event and return the new state
    ///
    /// Returns `None` when the event is not valid in this state: a second
    /// transfer while busy, or a completion with nothing in flight.
    pub fn transition(self, event: DispatchEvent) -> Option<Self> {
        use DispatchEvent::*;
        use DispatchState::*;

        match (self, event) {
            (Idle, TransferStarted) => Some(Busy),
            (Busy, FrameDone) => Some(Idle),
            (Busy, TransferStarted) | (Idle, FrameDone) => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, DispatchState::Busy)
    }
}
