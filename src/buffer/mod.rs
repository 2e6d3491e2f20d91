//! Bounded, lock-free ring of timestamped events.
//!
//! A buffer of capacity `N` owns `N + 1` slots; the slot at `top` is always
//! free so that `top == bottom` only ever means "empty". A push into a full
//! buffer advances `bottom` as well, dropping the oldest event, and reports
//! [`PushStatus::Overflow`].
//!
//! The `(bottom, top)` pair is published through a [`CasSlot`], so every
//! observer sees both indices from the same update. Reserving a slot and
//! filling it are still two steps. Each slot therefore carries a stamp that
//! is odd while its payload is being replaced; a writer marks the slot before
//! publishing the new top and readers only trust a payload read between two
//! equal, even stamp loads.

pub mod cas;

#[cfg(target_has_atomic = "64")]
pub use cas::PackedSlot;
pub use cas::{CasSlot, DefaultSlot, IndexedSlot, Snapshot, State};

use crate::event::Event;
use crossbeam::atomic::AtomicCell;
use crossbeam::utils::{Backoff, CachePadded};
use std::sync::atomic::{AtomicUsize, Ordering, fence};
use std::time::Duration;
use thiserror::Error;

/// Retry cap applied by [`RetryPolicy::default`].
pub const DEFAULT_RETRY_LIMIT: u32 = 10_000;

/// How long a reader waits for a slot that is mid-write before giving up.
pub const DEFAULT_SETTLE_SPINS: u32 = 1_000;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    #[error("a trace buffer needs room for at least one event")]
    ZeroCapacity,

    #[error("capacity {capacity} exceeds the largest publishable capacity {max}")]
    CapacityTooLarge { capacity: usize, max: usize },

    #[error("the trace buffer holds no events")]
    Empty,

    #[error("index {index} is out of bounds for a ring of {size} slots")]
    OutOfBound { index: usize, size: usize },

    #[error("slot {index} did not settle: it is still being written")]
    Busy { index: usize },

    #[error("state update abandoned after {attempts} contended attempts")]
    Contended { attempts: u32 },
}

/// Outcome of a successful push.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushStatus {
    Ok,
    /// The buffer was full and its oldest event was dropped.
    Overflow,
    /// More than one writer is attached; ordering across them is not guaranteed.
    Unsafe,
}

/// What to do when a state update keeps losing the compare-and-swap race.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry until the update lands.
    Unbounded,
    /// Fail with [`BufferError::Contended`] after this many lost races.
    Bounded(u32),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Bounded(DEFAULT_RETRY_LIMIT)
    }
}

impl RetryPolicy {
    fn exhausted(&self, attempts: u32) -> bool {
        match self {
            RetryPolicy::Unbounded => false,
            RetryPolicy::Bounded(limit) => attempts >= *limit,
        }
    }
}

struct Slot<T> {
    /// Odd while the payload is being replaced.
    stamp: AtomicUsize,
    event: AtomicCell<Option<Event<T>>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot {
            stamp: AtomicUsize::new(0),
            event: AtomicCell::new(None),
        }
    }
}

/// Fixed-capacity ring of events shared by writers and readers.
///
/// Hand out `&TraceBuffer` (or an `Arc`) to every
/// [`Writer`](crate::writer::Writer) and [`Reader`](crate::reader::Reader);
/// all methods take `&self`.
pub struct TraceBuffer<T, S = DefaultSlot> {
    slots: Box<[Slot<T>]>,
    state: S,
    writers: CachePadded<AtomicUsize>,
    epoch: Duration,
    retry: RetryPolicy,
    settle_spins: u32,
}

impl<T: Copy> TraceBuffer<T, DefaultSlot> {
    /// A buffer holding up to `capacity` events, with default settings.
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        Self::builder().capacity(capacity).build()
    }

    pub fn builder() -> TraceBufferBuilder<T, DefaultSlot> {
        TraceBufferBuilder::new()
    }
}

impl<T: Copy, S: CasSlot> TraceBuffer<T, S> {
    /// Number of events the buffer holds when full.
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    pub(crate) fn size(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn next(&self, index: usize) -> usize {
        if index + 1 == self.slots.len() { 0 } else { index + 1 }
    }

    pub(crate) fn prev(&self, index: usize) -> usize {
        if index == 0 { self.slots.len() - 1 } else { index - 1 }
    }

    /// Slots walked going forward from `from` to reach `to`.
    pub(crate) fn distance(&self, from: usize, to: usize) -> usize {
        (to + self.slots.len() - from) % self.slots.len()
    }

    /// Whether `index` lies in `[state.bottom, state.top]`.
    pub(crate) fn within(&self, state: State, index: usize) -> bool {
        self.distance(state.bottom, index) <= self.distance(state.bottom, state.top)
    }

    pub(crate) fn snapshot(&self) -> Snapshot<S::Token> {
        self.state.load()
    }

    /// One consistent `(bottom, top)` pair.
    pub fn state(&self) -> State {
        self.snapshot().state
    }

    /// The state together with the times of its oldest and newest events.
    ///
    /// The times are read after the state, so a concurrent push may already
    /// have replaced them; they are `None` when the buffer is empty.
    pub fn state_with_timestamps(
        &self,
    ) -> Result<(State, Option<Duration>, Option<Duration>), BufferError> {
        let state = self.state();
        if state.bottom == state.top {
            return Ok((state, None, None));
        }
        let oldest = self.read(state.bottom)?.time;
        let newest = self.read(self.prev(state.top))?.time;
        Ok((state, Some(oldest), Some(newest)))
    }

    pub fn length(&self) -> usize {
        let state = self.state();
        self.distance(state.bottom, state.top)
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    pub fn epoch(&self) -> Duration {
        self.epoch
    }

    /// Converts an absolute clock reading into an offset from the epoch.
    pub fn time_alignment(&self, time: Duration) -> Duration {
        time.saturating_sub(self.epoch)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn writer_count(&self) -> usize {
        self.writers.load(Ordering::Acquire)
    }

    pub(crate) fn attach_writer(&self) -> usize {
        let count = self.writers.fetch_add(1, Ordering::AcqRel) + 1;
        if count > 1 {
            tracing::warn!(
                writers = count,
                "more than one writer attached, event ordering is no longer guaranteed"
            );
        }
        count
    }

    pub(crate) fn detach_writer(&self) {
        self.writers.fetch_sub(1, Ordering::AcqRel);
    }

    fn give_up(&self, attempts: u32, backoff: &Backoff) -> Result<(), BufferError> {
        if self.retry.exhausted(attempts) {
            tracing::warn!(attempts, "trace buffer update abandoned under contention");
            return Err(BufferError::Contended { attempts });
        }
        backoff.snooze();
        Ok(())
    }

    /// Appends `event` at the top, dropping the oldest event when full.
    ///
    /// The event is stored as given; use a [`Writer`](crate::writer::Writer)
    /// to stamp it with a clock.
    pub fn push(&self, event: Event<T>) -> Result<PushStatus, BufferError> {
        let backoff = Backoff::new();
        let mut attempts = 0;
        loop {
            let current = self.snapshot();
            let State { bottom, top } = current.state;
            let slot = &self.slots[top];
            let stamp = slot.stamp.load(Ordering::Acquire);

            if stamp & 1 == 0
                && slot
                    .stamp
                    .compare_exchange(stamp, stamp + 1, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
            {
                let next_top = self.next(top);
                let overflow = next_top == bottom;
                let next = State {
                    bottom: if overflow { self.next(bottom) } else { bottom },
                    top: next_top,
                };
                if self.state.compare_and_swap(&current, next) {
                    slot.event.store(Some(event));
                    slot.stamp.store(stamp + 2, Ordering::Release);
                    tracing::trace!(index = top, bottom = next.bottom, "pushed event");

                    if self.writer_count() > 1 {
                        return Ok(PushStatus::Unsafe);
                    }
                    if overflow {
                        tracing::debug!(dropped = bottom, "trace buffer full, oldest event dropped");
                        return Ok(PushStatus::Overflow);
                    }
                    return Ok(PushStatus::Ok);
                }
                slot.stamp.store(stamp, Ordering::Release);
            }

            attempts += 1;
            self.give_up(attempts, &backoff)?;
        }
    }

    /// Removes and returns the oldest event.
    ///
    /// Meant for single-threaded use: the state update is atomic but a
    /// concurrent push may reuse the slot as soon as it is released.
    pub fn pull(&self) -> Result<Event<T>, BufferError> {
        let backoff = Backoff::new();
        let mut attempts = 0;
        loop {
            let current = self.snapshot();
            let State { bottom, top } = current.state;
            if bottom == top {
                return Err(BufferError::Empty);
            }
            let event = self.read(bottom)?;
            if self
                .state
                .compare_and_swap(&current, State::new(self.next(bottom), top))
            {
                tracing::trace!(index = bottom, "pulled event");
                return Ok(event);
            }
            attempts += 1;
            self.give_up(attempts, &backoff)?;
        }
    }

    /// Removes and returns the newest event. Same caveats as [`pull`](Self::pull).
    pub fn pop(&self) -> Result<Event<T>, BufferError> {
        let backoff = Backoff::new();
        let mut attempts = 0;
        loop {
            let current = self.snapshot();
            let State { bottom, top } = current.state;
            if bottom == top {
                return Err(BufferError::Empty);
            }
            let index = self.prev(top);
            let event = self.read(index)?;
            if self.state.compare_and_swap(&current, State::new(bottom, index)) {
                tracing::trace!(index, "popped event");
                return Ok(event);
            }
            attempts += 1;
            self.give_up(attempts, &backoff)?;
        }
    }

    /// Reads the slot at `index` without touching the state.
    ///
    /// The index is checked against the ring, not against the current
    /// window: slots outside `[bottom, top)` still hold their last event.
    pub fn read(&self, index: usize) -> Result<Event<T>, BufferError> {
        self.read_stamped(index)?.0.ok_or(BufferError::Empty)
    }

    /// A settled payload of the slot at `index` together with its stamp.
    ///
    /// The stamp grows by two with every write to the slot, so two equal
    /// stamps mean the slot was not rewritten in between.
    pub(crate) fn read_stamped(
        &self,
        index: usize,
    ) -> Result<(Option<Event<T>>, usize), BufferError> {
        let slot = self.slots.get(index).ok_or(BufferError::OutOfBound {
            index,
            size: self.slots.len(),
        })?;
        let backoff = Backoff::new();
        let mut spins = 0;
        loop {
            let before = slot.stamp.load(Ordering::Acquire);
            if before & 1 == 0 {
                let event = slot.event.load();
                fence(Ordering::Acquire);
                if slot.stamp.load(Ordering::Relaxed) == before {
                    return Ok((event, before));
                }
            }
            spins += 1;
            if spins > self.settle_spins {
                return Err(BufferError::Busy { index });
            }
            backoff.snooze();
        }
    }

    /// Overwrites the slot at `index` without touching the state.
    ///
    /// Nothing stops this from racing a writer that owns the same slot; it
    /// exists to seed or repair a buffer nobody else is using.
    pub fn write(&self, event: Event<T>, index: usize) -> Result<(), BufferError> {
        let slot = self.slots.get(index).ok_or(BufferError::OutOfBound {
            index,
            size: self.slots.len(),
        })?;
        let stamp = slot.stamp.fetch_add(1, Ordering::AcqRel);
        slot.event.store(Some(event));
        slot.stamp.store(stamp.wrapping_add(2) & !1, Ordering::Release);
        Ok(())
    }
}

/// Builder for [`TraceBuffer`].
///
/// ```
/// use tracemon::buffer::{RetryPolicy, TraceBuffer};
/// use std::time::Duration;
///
/// let buffer = TraceBuffer::<u8>::builder()
///     .capacity(16)
///     .epoch(Duration::from_secs(100))
///     .retry_policy(RetryPolicy::Unbounded)
///     .build()
///     .unwrap();
/// assert_eq!(buffer.capacity(), 16);
/// ```
#[derive(Debug, Clone)]
pub struct TraceBufferBuilder<T, S = DefaultSlot> {
    capacity: usize,
    epoch: Duration,
    retry: RetryPolicy,
    settle_spins: u32,
    _phantom: std::marker::PhantomData<(T, S)>,
}

impl<T, S> Default for TraceBufferBuilder<T, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> TraceBufferBuilder<T, S> {
    pub fn new() -> Self {
        TraceBufferBuilder {
            capacity: 0,
            epoch: Duration::ZERO,
            retry: RetryPolicy::default(),
            settle_spins: DEFAULT_SETTLE_SPINS,
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Clock reading taken when the trace started, see
    /// [`TraceBuffer::time_alignment`].
    pub fn epoch(mut self, epoch: Duration) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn settle_spins(mut self, spins: u32) -> Self {
        self.settle_spins = spins;
        self
    }

    pub fn build(self) -> Result<TraceBuffer<T, S>, BufferError>
    where
        T: Copy,
        S: CasSlot,
    {
        if self.capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        if self.capacity >= S::MAX_INDEX {
            return Err(BufferError::CapacityTooLarge {
                capacity: self.capacity,
                max: S::MAX_INDEX - 1,
            });
        }
        let slots = (0..=self.capacity).map(|_| Slot::default()).collect();
        Ok(TraceBuffer {
            slots,
            state: S::with_state(State::default()),
            writers: CachePadded::new(AtomicUsize::new(0)),
            epoch: self.epoch,
            retry: self.retry,
            settle_spins: self.settle_spins,
        })
    }
}
