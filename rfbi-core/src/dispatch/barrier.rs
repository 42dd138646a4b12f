//! Sync barrier release tracking
//!
//! Barriers reach the dispatcher in ticket order, so a single watermark
//! records which ones have been released. Waiters share one waker list and
//! re-check the watermark on every wake.

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::MultiWakerRegistration;

use crate::queue::BarrierTicket;

/// Barrier waiters that can register before everyone is woken to re-check
pub const MAX_BARRIER_WAITERS: usize = 8;

struct BarrierState {
    /// One past the last released ticket
    released: u32,
    waiters: MultiWakerRegistration<MAX_BARRIER_WAITERS>,
}

impl BarrierState {
    fn is_released(&self, ticket: BarrierTicket) -> bool {
        // Wrapping comparison: tickets within 2^31 of the watermark
        self.released.wrapping_sub(ticket.0) as i32 > 0
    }
}

/// Release watermark plus parked barrier waiters
pub struct BarrierBoard<M: RawMutex> {
    state: Mutex<M, RefCell<BarrierState>>,
}

impl<M: RawMutex> BarrierBoard<M> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(BarrierState {
                released: 0,
                waiters: MultiWakerRegistration::new(),
            })),
        }
    }

    /// Release `ticket` and every ticket before it
    pub fn release(&self, ticket: BarrierTicket) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            state.released = ticket.0.wrapping_add(1);
            state.waiters.wake();
        });
        debug!("sync barrier {} released", ticket.0);
    }

    /// Check if `ticket` has been released
    pub fn is_released(&self, ticket: BarrierTicket) -> bool {
        self.state.lock(|state| state.borrow().is_released(ticket))
    }

    /// Wait until `ticket` is released
    pub async fn wait(&self, ticket: BarrierTicket) {
        poll_fn(|cx| {
            self.state.lock(|state| {
                let mut state = state.borrow_mut();
                if state.is_released(ticket) {
                    Poll::Ready(())
                } else {
                    state.waiters.register(cx.waker());
                    Poll::Pending
                }
            })
        })
        .await
    }
}

impl<M: RawMutex> Default for BarrierBoard<M> {
    fn default() -> Self {
        Self::new()
    }
}
