//! Bounded command FIFO with producer backpressure
//!
//! Whole records are copied into a byte ring under a blocking mutex. A
//! producer that finds less than one record of free space parks its waker
//! and re-checks after every wake, since several parked producers may race
//! for the same freed slot. Each dequeue wakes at most one parked producer,
//! in parking order, and a parked producer is never woken otherwise.
//!
//! At most [`MAX_PARKED_PRODUCERS`] producers may be blocked at once. A
//! producer dropped while parked gives up its place, and passes on a wake
//! it was handed but can no longer use.

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::{Context, Poll, Waker};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Deque;

use super::command::{BarrierTicket, Command, COMMAND_SIZE};
use crate::config::{Module, COMMAND_FIFO_DEPTH};
use crate::error::RfbiError;

/// Default ring size in bytes
pub const COMMAND_FIFO_LEN_BYTES: usize = COMMAND_FIFO_DEPTH * COMMAND_SIZE;

/// Producers that can be blocked on a full queue at the same time
pub const MAX_PARKED_PRODUCERS: usize = 16;

struct FifoState<const N: usize> {
    ring: Deque<u8, N>,
    waiters: Deque<Waker, MAX_PARKED_PRODUCERS>,
    next_ticket: u32,
}

impl<const N: usize> FifoState<N> {
    fn has_room(&self) -> bool {
        N - self.ring.len() >= COMMAND_SIZE
    }

    /// Park a producer, keeping its place if it is already parked
    ///
    /// # Panics
    ///
    /// Panics if [`MAX_PARKED_PRODUCERS`] producers are already parked.
    fn park(&mut self, waker: &Waker) {
        if self.waiters.iter().any(|w| w.will_wake(waker)) {
            return;
        }
        if self.waiters.push_back(waker.clone()).is_err() {
            panic!(
                "more than {} producers blocked on the command queue",
                MAX_PARKED_PRODUCERS
            );
        }
    }

    /// Drop a producer that got its slot without being woken
    fn unpark(&mut self, waker: &Waker) {
        for _ in 0..self.waiters.len() {
            if let Some(w) = self.waiters.pop_front() {
                if !w.will_wake(waker) {
                    let _ = self.waiters.push_back(w);
                }
            }
        }
    }

    /// Drop a producer that gave up waiting
    fn cancel(&mut self, waker: &Waker) {
        let parked = self.waiters.len();
        self.unpark(waker);

        // Already popped by a dequeue: hand the freed slot to the next one
        if self.waiters.len() == parked && self.has_room() {
            if let Some(next) = self.waiters.pop_front() {
                next.wake();
            }
        }
    }

    fn push_record(&mut self, record: &[u8; COMMAND_SIZE]) {
        for &byte in record {
            // Room for the whole record was checked by the caller
            let _ = self.ring.push_back(byte);
        }
    }
}

/// A producer's place in the waiter list, given up when dropped
struct Parked<'a, M: RawMutex, const N: usize> {
    queue: &'a CommandQueue<M, N>,
    waker: Option<Waker>,
}

impl<'a, M: RawMutex, const N: usize> Parked<'a, M, N> {
    fn new(queue: &'a CommandQueue<M, N>) -> Self {
        Self { queue, waker: None }
    }

    fn poll_push<T>(
        &mut self,
        cx: &mut Context<'_>,
        build: impl FnOnce(&mut u32) -> ([u8; COMMAND_SIZE], T),
    ) -> Poll<T> {
        let poll = self.queue.poll_push(cx, self.waker.as_ref(), build);
        match poll {
            Poll::Pending => {
                if !matches!(&self.waker, Some(w) if w.will_wake(cx.waker())) {
                    self.waker = Some(cx.waker().clone());
                }
            }
            Poll::Ready(_) => self.waker = None,
        }
        poll
    }
}

impl<M: RawMutex, const N: usize> Drop for Parked<'_, M, N> {
    fn drop(&mut self) {
        if let Some(waker) = self.waker.take() {
            self.queue.state.lock(|s| s.borrow_mut().cancel(&waker));
        }
    }
}

/// Fixed-capacity command FIFO of `N` bytes
pub struct CommandQueue<M: RawMutex, const N: usize = COMMAND_FIFO_LEN_BYTES> {
    state: Mutex<M, RefCell<FifoState<N>>>,
}

impl<M: RawMutex, const N: usize> CommandQueue<M, N> {
    /// Create an empty queue
    ///
    /// Fails if the ring cannot hold a single record.
    pub fn new() -> Result<Self, RfbiError> {
        if N < COMMAND_SIZE {
            return Err(RfbiError::QueueCapacity);
        }

        Ok(Self {
            state: Mutex::new(RefCell::new(FifoState {
                ring: Deque::new(),
                waiters: Deque::new(),
                next_ticket: 0,
            })),
        })
    }

    /// Number of commands the ring holds
    pub const fn capacity() -> usize {
        N / COMMAND_SIZE
    }

    /// Number of queued commands
    pub fn len(&self) -> usize {
        self.state.lock(|s| s.borrow().ring.len() / COMMAND_SIZE)
    }

    /// Check if no command is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of producers parked on a full queue
    pub fn waiting_producers(&self) -> usize {
        self.state.lock(|s| s.borrow().waiters.len())
    }

    /// Queue a command, waiting while the queue is full
    ///
    /// # Panics
    ///
    /// Panics if more than [`MAX_PARKED_PRODUCERS`] producers wait at once.
    pub async fn enqueue(&self, command: Command) {
        let record = command.encode();
        let mut parked = Parked::new(self);
        poll_fn(|cx| parked.poll_push(cx, |_| (record, ()))).await;
        trace!("queued {}", command);
    }

    /// Queue a sync barrier for `module`, waiting while the queue is full
    ///
    /// The ticket is assigned under the queue lock, so tickets reach the
    /// dispatcher in increasing order.
    pub async fn enqueue_barrier(&self, module: Module) -> BarrierTicket {
        let mut parked = Parked::new(self);
        poll_fn(|cx| {
            parked.poll_push(cx, |next_ticket| {
                let ticket = BarrierTicket(*next_ticket);
                *next_ticket = next_ticket.wrapping_add(1);
                (Command::SyncBarrier { module, ticket }.encode(), ticket)
            })
        })
        .await
    }

    /// Queue a command without waiting
    ///
    /// Returns the command back if the queue is full.
    pub fn try_enqueue(&self, command: Command) -> Result<(), Command> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if !state.has_room() {
                return Err(command);
            }
            state.push_record(&command.encode());
            Ok(())
        })
    }

    fn poll_push<T>(
        &self,
        cx: &mut Context<'_>,
        previous: Option<&Waker>,
        build: impl FnOnce(&mut u32) -> ([u8; COMMAND_SIZE], T),
    ) -> Poll<T> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();

            // Polled from another task since it parked
            if let Some(previous) = previous.filter(|w| !w.will_wake(cx.waker())) {
                state.unpark(previous);
            }

            if !state.has_room() {
                trace!("command queue full, producer parked");
                state.park(cx.waker());
                return Poll::Pending;
            }

            state.unpark(cx.waker());
            let (record, output) = build(&mut state.next_ticket);
            state.push_record(&record);
            Poll::Ready(output)
        })
    }

    /// Remove the oldest command without waiting
    pub fn dequeue(&self) -> Option<Command> {
        self.dequeue_or_else(|| {})
    }

    /// Remove the oldest command, or run `on_empty` under the queue lock
    ///
    /// A producer's push and its later empty check by the consumer are
    /// ordered by the same lock, so state changed in `on_empty` is never
    /// missed by a producer that queued concurrently.
    pub fn dequeue_or_else(&self, on_empty: impl FnOnce()) -> Option<Command> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();

            // The ring only ever holds whole records
            if state.ring.len() < COMMAND_SIZE {
                on_empty();
                return None;
            }

            let mut record = [0u8; COMMAND_SIZE];
            for byte in record.iter_mut() {
                *byte = state.ring.pop_front().unwrap_or_default();
            }

            if let Some(waiter) = state.waiters.pop_front() {
                waiter.wake();
            }

            match Command::decode(&record) {
                Some(command) => Some(command),
                None => panic!("corrupt command record in queue"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Region;
    use crate::testutil::{flag_waker, poll_once};
    use core::pin::pin;
    use embassy_futures::block_on;
    use embassy_futures::join::join3;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use proptest::prelude::*;
    use std::boxed::Box;
    use std::vec::Vec;

    type SmallQueue = CommandQueue<NoopRawMutex, { 4 * COMMAND_SIZE }>;

    fn update(n: u16) -> Command {
        Command::UpdateRegion {
            module: Module::Cs0,
            region: Region::new(n, 0, 1, 1),
        }
    }

    #[test]
    fn test_capacity_below_one_record() {
        let result = CommandQueue::<NoopRawMutex, { COMMAND_SIZE - 1 }>::new();
        assert!(matches!(result, Err(RfbiError::QueueCapacity)));
        assert!(CommandQueue::<NoopRawMutex, COMMAND_SIZE>::new().is_ok());
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(CommandQueue::<NoopRawMutex>::capacity(), COMMAND_FIFO_DEPTH);
    }

    #[test]
    fn test_empty_dequeue_does_not_block() {
        let queue = SmallQueue::new().unwrap();
        assert_eq!(queue.dequeue(), None);

        let mut released = false;
        assert_eq!(queue.dequeue_or_else(|| released = true), None);
        assert!(released);
    }

    #[test]
    fn test_fill_to_capacity_without_blocking() {
        let queue = SmallQueue::new().unwrap();
        let (counter, waker) = flag_waker();

        for n in 0..SmallQueue::capacity() as u16 {
            let fut = pin!(queue.enqueue(update(n)));
            assert!(poll_once(fut, &waker).is_ready());
        }

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.waiting_producers(), 0);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_full_queue_blocks_until_one_dequeue() {
        let queue = SmallQueue::new().unwrap();
        for n in 0..4 {
            queue.try_enqueue(update(n)).unwrap();
        }

        let (counter, waker) = flag_waker();
        let mut fut = pin!(queue.enqueue(update(99)));
        assert!(poll_once(fut.as_mut(), &waker).is_pending());
        assert_eq!(queue.waiting_producers(), 1);

        assert_eq!(queue.dequeue(), Some(update(0)));
        assert_eq!(counter.count(), 1);
        assert_eq!(queue.waiting_producers(), 0);

        assert!(poll_once(fut.as_mut(), &waker).is_ready());
        assert_eq!(queue.len(), 4);

        let drained: Vec<_> = core::iter::from_fn(|| queue.dequeue()).collect();
        assert_eq!(drained, [update(1), update(2), update(3), update(99)]);
    }

    #[test]
    fn test_one_wake_per_dequeue() {
        let queue = SmallQueue::new().unwrap();
        for n in 0..4 {
            queue.try_enqueue(update(n)).unwrap();
        }

        let (first_count, first) = flag_waker();
        let (second_count, second) = flag_waker();
        let mut a = pin!(queue.enqueue(update(10)));
        let mut b = pin!(queue.enqueue(update(11)));
        assert!(poll_once(a.as_mut(), &first).is_pending());
        assert!(poll_once(b.as_mut(), &second).is_pending());
        assert_eq!(queue.waiting_producers(), 2);

        queue.dequeue();
        assert_eq!(first_count.count(), 1);
        assert_eq!(second_count.count(), 0);

        queue.dequeue();
        assert_eq!(second_count.count(), 1);
    }

    #[test]
    fn test_woken_producer_retries_when_slot_taken() {
        let queue = SmallQueue::new().unwrap();
        for n in 0..4 {
            queue.try_enqueue(update(n)).unwrap();
        }

        let (counter, waker) = flag_waker();
        let mut parked = pin!(queue.enqueue(update(10)));
        assert!(poll_once(parked.as_mut(), &waker).is_pending());

        queue.dequeue();
        assert_eq!(counter.count(), 1);

        // Someone else grabs the freed slot first
        queue.try_enqueue(update(20)).unwrap();
        assert!(poll_once(parked.as_mut(), &waker).is_pending());
        assert_eq!(queue.waiting_producers(), 1);

        queue.dequeue();
        assert!(poll_once(parked.as_mut(), &waker).is_ready());
    }

    #[test]
    fn test_repoll_does_not_duplicate_waiter() {
        let queue = SmallQueue::new().unwrap();
        for n in 0..4 {
            queue.try_enqueue(update(n)).unwrap();
        }

        let (_counter, waker) = flag_waker();
        let mut fut = pin!(queue.enqueue(update(10)));
        assert!(poll_once(fut.as_mut(), &waker).is_pending());
        assert!(poll_once(fut.as_mut(), &waker).is_pending());
        assert_eq!(queue.waiting_producers(), 1);
    }

    fn full_queue() -> SmallQueue {
        let queue = SmallQueue::new().unwrap();
        for n in 0..4 {
            queue.try_enqueue(update(n)).unwrap();
        }
        queue
    }

    #[test]
    fn test_parked_producers_sleep_until_dequeue() {
        let queue = full_queue();
        let wakers: Vec<_> = (0..MAX_PARKED_PRODUCERS).map(|_| flag_waker()).collect();
        let mut producers: Vec<_> = (0..MAX_PARKED_PRODUCERS as u16)
            .map(|n| Box::pin(queue.enqueue(update(10 + n))))
            .collect();

        // Spurious polls re-check without waking anyone
        for _ in 0..3 {
            for (fut, (_, waker)) in producers.iter_mut().zip(&wakers) {
                assert!(poll_once(fut.as_mut(), waker).is_pending());
            }
        }
        assert_eq!(queue.waiting_producers(), MAX_PARKED_PRODUCERS);
        assert!(wakers.iter().all(|(counter, _)| counter.count() == 0));

        queue.dequeue();
        let woken: Vec<usize> = wakers.iter().map(|(counter, _)| counter.count()).collect();
        assert_eq!(woken[0], 1);
        assert!(woken[1..].iter().all(|&count| count == 0));

        assert!(poll_once(producers[0].as_mut(), &wakers[0].1).is_ready());
        assert_eq!(queue.waiting_producers(), MAX_PARKED_PRODUCERS - 1);
    }

    #[test]
    #[should_panic(expected = "producers blocked on the command queue")]
    fn test_too_many_blocked_producers_panics() {
        let queue = full_queue();
        let mut producers: Vec<_> = (0..=MAX_PARKED_PRODUCERS as u16)
            .map(|n| Box::pin(queue.enqueue(update(10 + n))))
            .collect();

        for fut in producers.iter_mut() {
            let (_counter, waker) = flag_waker();
            let _ = poll_once(fut.as_mut(), &waker);
        }
    }

    #[test]
    fn test_dropped_producer_gives_up_its_place() {
        let queue = full_queue();
        let (first_count, first) = flag_waker();
        let (second_count, second) = flag_waker();

        let mut a = Box::pin(queue.enqueue(update(10)));
        let mut b = Box::pin(queue.enqueue(update(11)));
        assert!(poll_once(a.as_mut(), &first).is_pending());
        assert!(poll_once(b.as_mut(), &second).is_pending());

        drop(a);
        assert_eq!(queue.waiting_producers(), 1);
        assert_eq!(first_count.count(), 0);

        queue.dequeue();
        assert_eq!(second_count.count(), 1);
        assert!(poll_once(b.as_mut(), &second).is_ready());
    }

    #[test]
    fn test_dropped_woken_producer_passes_wake_on() {
        let queue = full_queue();
        let (_first_count, first) = flag_waker();
        let (second_count, second) = flag_waker();

        let mut a = Box::pin(queue.enqueue(update(10)));
        let mut b = Box::pin(queue.enqueue(update(11)));
        assert!(poll_once(a.as_mut(), &first).is_pending());
        assert!(poll_once(b.as_mut(), &second).is_pending());

        // `a` is woken for the freed slot but never comes back for it
        queue.dequeue();
        assert_eq!(second_count.count(), 0);
        drop(a);

        assert_eq!(second_count.count(), 1);
        assert!(poll_once(b.as_mut(), &second).is_ready());
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_producer_moved_to_another_task_reparks() {
        let queue = full_queue();
        let (old_count, old) = flag_waker();
        let (new_count, new) = flag_waker();

        let mut fut = pin!(queue.enqueue(update(10)));
        assert!(poll_once(fut.as_mut(), &old).is_pending());
        assert!(poll_once(fut.as_mut(), &new).is_pending());
        assert_eq!(queue.waiting_producers(), 1);

        queue.dequeue();
        assert_eq!(old_count.count(), 0);
        assert_eq!(new_count.count(), 1);
    }

    #[test]
    fn test_barrier_tickets_are_sequential() {
        let queue = SmallQueue::new().unwrap();

        let first = block_on(queue.enqueue_barrier(Module::Cs0));
        let second = block_on(queue.enqueue_barrier(Module::Cs1));
        assert_eq!(first, BarrierTicket(0));
        assert_eq!(second, BarrierTicket(1));

        assert_eq!(
            queue.dequeue(),
            Some(Command::SyncBarrier {
                module: Module::Cs0,
                ticket: BarrierTicket(0)
            })
        );
    }

    #[test]
    fn test_interleaved_producers_keep_their_order() {
        let queue = SmallQueue::new().unwrap();
        let mut seen = Vec::new();

        let producer = |base: u16| {
            let queue = &queue;
            async move {
                for n in 0..10 {
                    queue.enqueue(update(base + n)).await;
                }
            }
        };
        let consumer = async {
            while seen.len() < 20 {
                match queue.dequeue() {
                    Some(cmd) => seen.push(cmd),
                    None => embassy_futures::yield_now().await,
                }
            }
        };

        block_on(join3(producer(0), producer(100), consumer));

        let xs: Vec<u16> = seen
            .iter()
            .map(|cmd| match cmd {
                Command::UpdateRegion { region, .. } => region.x,
                _ => unreachable!(),
            })
            .collect();
        let low: Vec<u16> = xs.iter().copied().filter(|&x| x < 100).collect();
        let high: Vec<u16> = xs.iter().copied().filter(|&x| x >= 100).collect();
        assert_eq!(low, (0..10).collect::<Vec<_>>());
        assert_eq!(high, (100..110).collect::<Vec<_>>());
    }

    proptest! {
        #[test]
        fn prop_dequeue_order_matches_enqueue_order(
            ops in proptest::collection::vec(proptest::option::of(0u16..1000), 1..64),
        ) {
            // Some(n) pushes update n when there is room, None pops
            let queue = SmallQueue::new().unwrap();
            let mut pushed = Vec::new();
            let mut popped = Vec::new();

            for op in ops {
                match op {
                    Some(n) => {
                        if queue.try_enqueue(update(n)).is_ok() {
                            pushed.push(update(n));
                        }
                    }
                    None => popped.extend(queue.dequeue()),
                }
            }
            popped.extend(core::iter::from_fn(|| queue.dequeue()));

            prop_assert_eq!(popped, pushed);
        }
    }
}
