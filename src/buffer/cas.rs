//! Atomic publication of the buffer's `(bottom, top)` state.
//!
//! Readers must observe both indices from the same update, never one field
//! from an older update and one from a newer. [`CasSlot`] hides how a target
//! achieves that behind `load` and `compare_and_swap`:
//!
//! - [`PackedSlot`] packs both indices into one 64-bit word.
//! - [`IndexedSlot`] keeps the indices in out-of-line records and swaps a
//!   single word naming the current record. It only needs pointer-sized
//!   atomics.
//!
//! [`DefaultSlot`] picks one of them for the build target.

use crossbeam::utils::CachePadded;
use std::fmt;
#[cfg(target_has_atomic = "64")]
use std::sync::atomic::AtomicU64;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering, fence};

/// Consumption window of the buffer: events live in `[bottom, top)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct State {
    pub bottom: usize,
    pub top: usize,
}

impl State {
    pub fn new(bottom: usize, top: usize) -> Self {
        State { bottom, top }
    }
}

/// A loaded state together with the token that identifies the update it
/// came from. The token is what `compare_and_swap` compares against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot<K> {
    pub token: K,
    pub state: State,
}

pub trait CasSlot: Send + Sync {
    type Token: Copy + Eq + fmt::Debug;

    /// Largest index a published state may hold.
    const MAX_INDEX: usize;

    fn with_state(state: State) -> Self
    where
        Self: Sized;

    /// Loads one consistent snapshot.
    fn load(&self) -> Snapshot<Self::Token>;

    /// Publishes `new` if nothing was published since `current` was loaded.
    fn compare_and_swap(&self, current: &Snapshot<Self::Token>, new: State) -> bool;
}

#[cfg(all(target_has_atomic = "64", not(feature = "portable-cas")))]
pub type DefaultSlot = PackedSlot;

#[cfg(any(not(target_has_atomic = "64"), feature = "portable-cas"))]
pub type DefaultSlot = IndexedSlot;

/// Both indices in one `AtomicU64`: bottom in the low half, top in the high half.
#[cfg(target_has_atomic = "64")]
#[derive(Debug)]
pub struct PackedSlot {
    word: CachePadded<AtomicU64>,
}

#[cfg(target_has_atomic = "64")]
impl PackedSlot {
    fn pack(state: State) -> u64 {
        ((state.top as u64) << 32) | (state.bottom as u64 & 0xffff_ffff)
    }

    fn unpack(word: u64) -> State {
        State {
            bottom: (word & 0xffff_ffff) as usize,
            top: (word >> 32) as usize,
        }
    }
}

#[cfg(target_has_atomic = "64")]
impl CasSlot for PackedSlot {
    type Token = u64;

    const MAX_INDEX: usize = u32::MAX as usize;

    fn with_state(state: State) -> Self {
        PackedSlot {
            word: CachePadded::new(AtomicU64::new(Self::pack(state))),
        }
    }

    fn load(&self) -> Snapshot<u64> {
        let word = self.word.load(Ordering::Acquire);
        Snapshot {
            token: word,
            state: Self::unpack(word),
        }
    }

    fn compare_and_swap(&self, current: &Snapshot<u64>, new: State) -> bool {
        self.word
            .compare_exchange(
                current.token,
                Self::pack(new),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

const INDEX_BITS: u32 = 8;
const INDEX_MASK: usize = (1 << INDEX_BITS) - 1;
const GLOBAL: usize = 0;

/// Scratch records allocated by [`IndexedSlot::with_state`].
pub const DEFAULT_SCRATCH_RECORDS: usize = 3;

#[derive(Debug, Default)]
struct Record {
    bottom: AtomicUsize,
    top: AtomicUsize,
    /// Set while the record is current or being filled by an updater.
    held: AtomicBool,
}

/// Publishes state by rotating which record is current.
///
/// Record 0 is the global record; the rest are scratch. An update fills a
/// record that is not current (the global one when a scratch record is
/// current, a free scratch record otherwise) and then swaps `current` to it.
/// `current` packs a generation counter above the record index, so a token
/// never compares equal to one loaded before an intervening update unless
/// the generation wrapped in between.
#[derive(Debug)]
pub struct IndexedSlot {
    current: CachePadded<AtomicUsize>,
    records: Box<[Record]>,
}

impl IndexedSlot {
    /// `scratch` is clamped to `1..=255`. More scratch records let more
    /// updaters prepare a candidate at the same time.
    pub fn with_scratch(state: State, scratch: usize) -> Self {
        let records: Box<[Record]> = (0..=scratch.clamp(1, INDEX_MASK))
            .map(|_| Record::default())
            .collect();
        records[GLOBAL].bottom.store(state.bottom, Ordering::Relaxed);
        records[GLOBAL].top.store(state.top, Ordering::Relaxed);
        records[GLOBAL].held.store(true, Ordering::Relaxed);
        IndexedSlot {
            current: CachePadded::new(AtomicUsize::new(GLOBAL)),
            records,
        }
    }

    fn claim(&self, current: usize) -> Option<usize> {
        let global_first = current != GLOBAL;
        let order = global_first
            .then_some(GLOBAL)
            .into_iter()
            .chain((1..self.records.len()).filter(|&i| i != current));
        for index in order {
            if self.records[index]
                .held
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return Some(index);
            }
        }
        None
    }
}

impl CasSlot for IndexedSlot {
    type Token = usize;

    const MAX_INDEX: usize = usize::MAX;

    fn with_state(state: State) -> Self {
        Self::with_scratch(state, DEFAULT_SCRATCH_RECORDS)
    }

    fn load(&self) -> Snapshot<usize> {
        loop {
            let token = self.current.load(Ordering::Acquire);
            let record = &self.records[token & INDEX_MASK];
            let state = State {
                bottom: record.bottom.load(Ordering::Relaxed),
                top: record.top.load(Ordering::Relaxed),
            };
            fence(Ordering::Acquire);
            if self.current.load(Ordering::Relaxed) == token {
                return Snapshot { token, state };
            }
            std::hint::spin_loop();
        }
    }

    fn compare_and_swap(&self, current: &Snapshot<usize>, new: State) -> bool {
        let held = current.token & INDEX_MASK;
        let Some(target) = self.claim(held) else {
            return false;
        };
        let record = &self.records[target];
        record.bottom.store(new.bottom, Ordering::Release);
        record.top.store(new.top, Ordering::Release);

        let generation = (current.token >> INDEX_BITS).wrapping_add(1);
        let token = (generation << INDEX_BITS) | target;
        match self.current.compare_exchange(
            current.token,
            token,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.records[held].held.store(false, Ordering::Release);
                true
            }
            Err(_) => {
                record.held.store(false, Ordering::Release);
                false
            }
        }
    }
}
