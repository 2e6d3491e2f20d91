//! Consumer-side view of a [`TraceBuffer`] with gap detection.
//!
//! A [`Reader`] keeps its own copy of the window, `[bottom, top)`, plus a
//! probe: the slot of the next unread event, or of the last consumed one
//! when nothing is left to read. The buffer is never modified.
//!
//! Gap detection remembers the stamp of the probe slot. The ring is
//! overwritten in order, so unread events are lost exactly when the probe
//! slot is rewritten, whatever times the events carry. The probe event's
//! time is kept as a second check for writers that stamp times.

use crate::buffer::{BufferError, CasSlot, DefaultSlot, State, TraceBuffer};
use crate::event::Event;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderError {
    #[error("no event available")]
    Unavailable,

    #[error("unread events were overwritten, synchronize the reader")]
    Overflow,

    #[error("trace read failed: {0}")]
    ReadError(#[from] BufferError),
}

/// How [`Reader::synchronize`] caught up with the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// First synchronization: the buffer's window was adopted as is.
    Init,
    /// No unread event was lost; only `top` moved.
    Soft,
    /// Unread events were lost; the window jumped to the buffer's.
    Hard,
}

impl SyncStatus {
    /// Whether events may have been missed since the previous synchronization.
    pub fn is_gap(&self) -> bool {
        !matches!(self, SyncStatus::Soft)
    }
}

/// The slot a reader watches, and what it held when last looked at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Probe {
    index: usize,
    /// `None` once the slot is known to have been rewritten.
    stamp: Option<usize>,
}

pub struct Reader<'a, T, S = DefaultSlot> {
    buffer: &'a TraceBuffer<T, S>,
    bottom: usize,
    top: usize,
    probe: Probe,
    timestamp: Duration,
    synchronized: bool,
}

impl<'a, T: Copy, S: CasSlot> Reader<'a, T, S> {
    pub fn new(buffer: &'a TraceBuffer<T, S>) -> Self {
        Reader {
            buffer,
            bottom: 0,
            top: 0,
            probe: Probe { index: 0, stamp: None },
            timestamp: Duration::ZERO,
            synchronized: false,
        }
    }

    pub fn buffer(&self) -> &'a TraceBuffer<T, S> {
        self.buffer
    }

    pub fn bottom(&self) -> usize {
        self.bottom
    }

    pub fn top(&self) -> usize {
        self.top
    }

    /// Time of the probe event: the next unread one, or the last consumed
    /// one when the window is empty.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn state(&self) -> State {
        State::new(self.bottom, self.top)
    }

    /// Unread events in the local window.
    pub fn length(&self) -> usize {
        self.buffer.distance(self.bottom, self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.bottom == self.top
    }

    /// Stamp and time of the slot at `index`; an empty slot has no time.
    fn look(&self, index: usize) -> Result<(usize, Option<Duration>), BufferError> {
        let (event, stamp) = self.buffer.read_stamped(index)?;
        Ok((stamp, event.map(|e| e.time)))
    }

    fn watch(&mut self, index: usize) -> Result<(), BufferError> {
        let (stamp, time) = self.look(index)?;
        self.probe = Probe {
            index,
            stamp: Some(stamp),
        };
        self.timestamp = time.unwrap_or(Duration::ZERO);
        Ok(())
    }

    fn lost_against(&self, state: State) -> bool {
        if !self.buffer.within(state, self.bottom) {
            return true;
        }
        match (self.probe.stamp, self.look(self.probe.index)) {
            (Some(recorded), Ok((stamp, time))) => {
                stamp != recorded || time.is_some_and(|t| t > self.timestamp)
            }
            // A slot that never settles is being overwritten right now.
            _ => true,
        }
    }

    /// True when events this reader has not consumed were overwritten, or
    /// when the reader was never synchronized.
    pub fn gap(&self) -> bool {
        !self.synchronized || self.lost_against(self.buffer.state())
    }

    fn adopt(&mut self, state: State) -> Result<(), ReaderError> {
        let index = if state.bottom == state.top {
            self.buffer.prev(state.bottom)
        } else {
            state.bottom
        };
        self.watch(index)?;
        self.bottom = state.bottom;
        self.top = state.top;
        Ok(())
    }

    /// Brings the local window up to date with the buffer.
    pub fn synchronize(&mut self) -> Result<SyncStatus, ReaderError> {
        let state = self.buffer.state();

        if !self.synchronized {
            self.adopt(state)?;
            self.synchronized = true;
            tracing::debug!(bottom = state.bottom, top = state.top, "reader initialized");
            return Ok(SyncStatus::Init);
        }

        if !self.lost_against(state) {
            if self.probe.index != self.bottom && state.top != self.bottom {
                // The window was drained: the next unread event becomes the
                // probe, unless the last consumed one got replaced while we
                // looked.
                let (stamp, time) = self.look(self.bottom)?;
                if Some(self.look(self.probe.index)?.0) == self.probe.stamp {
                    self.probe = Probe {
                        index: self.bottom,
                        stamp: Some(stamp),
                    };
                    self.timestamp = time.unwrap_or(Duration::ZERO);
                    self.top = state.top;
                    tracing::trace!(top = self.top, "reader soft sync");
                    return Ok(SyncStatus::Soft);
                }
            } else {
                self.top = state.top;
                tracing::trace!(top = self.top, "reader soft sync");
                return Ok(SyncStatus::Soft);
            }
        }

        let state = self.buffer.state();
        self.adopt(state)?;
        tracing::warn!(
            bottom = state.bottom,
            top = state.top,
            "reader lost unread events, jumped to buffer window"
        );
        Ok(SyncStatus::Hard)
    }

    /// Consumes the oldest unread event.
    pub fn pull(&mut self) -> Result<Event<T>, ReaderError> {
        if self.is_empty() {
            return Err(ReaderError::Unavailable);
        }
        if self.gap() {
            return Err(ReaderError::Overflow);
        }
        let index = self.bottom;
        let (event, stamp) = self.buffer.read_stamped(index)?;
        let event = match event {
            Some(event) if Some(stamp) == self.probe.stamp && event.time == self.timestamp => event,
            _ => return Err(ReaderError::Overflow),
        };

        let next_index = self.buffer.next(index);
        if next_index != self.top {
            let (next_stamp, next_time) = self.look(next_index)?;
            // The ring is overwritten in order: if the next slot was replaced
            // already, so was the one just consumed.
            let intact = self.look(index)?.0 == stamp;
            self.probe = Probe {
                index: next_index,
                stamp: intact.then_some(next_stamp),
            };
            self.timestamp = next_time.unwrap_or(Duration::ZERO);
        }
        self.bottom = next_index;
        tracing::trace!(index, "reader pulled event");
        Ok(event)
    }

    /// Consumes the newest unread event. A later [`synchronize`](Self::synchronize)
    /// exposes it again.
    pub fn pop(&mut self) -> Result<Event<T>, ReaderError> {
        if self.is_empty() {
            return Err(ReaderError::Unavailable);
        }
        if self.gap() {
            return Err(ReaderError::Overflow);
        }
        let index = self.buffer.prev(self.top);
        let event = self.buffer.read(index)?;
        self.top = index;
        tracing::trace!(index, "reader popped event");
        Ok(event)
    }

    /// Reads a slot of the local window without consuming it.
    pub(crate) fn read_at(&self, index: usize) -> Result<Event<T>, ReaderError> {
        Ok(self.buffer.read(index)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn push_range(buffer: &TraceBuffer<u64>, range: std::ops::Range<u64>) {
        for i in range {
            let _ = buffer.push(Event::new(i, secs(i + 1))).unwrap();
        }
    }

    #[test]
    fn unsynchronized_reader_reports_gap() {
        let buffer = TraceBuffer::<u64>::new(3).unwrap();
        let mut reader = Reader::new(&buffer);
        assert!(reader.gap());
        assert_eq!(reader.synchronize().unwrap(), SyncStatus::Init);
        assert!(!reader.gap());
        assert_eq!(reader.pull(), Err(ReaderError::Unavailable));
    }

    #[test]
    fn soft_sync_extends_window() {
        let buffer = TraceBuffer::<u64>::new(4).unwrap();
        push_range(&buffer, 0..2);
        let mut reader = Reader::new(&buffer);
        reader.synchronize().unwrap();
        assert_eq!(reader.pull().unwrap().data, 0);

        push_range(&buffer, 2..4);
        assert_eq!(reader.synchronize().unwrap(), SyncStatus::Soft);
        assert_eq!(reader.length(), 3);
        assert_eq!(reader.pull().unwrap().data, 1);
        assert_eq!(reader.pull().unwrap().data, 2);
        assert_eq!(reader.pull().unwrap().data, 3);
        assert_eq!(reader.pull(), Err(ReaderError::Unavailable));
    }

    #[test]
    fn soft_sync_after_draining() {
        let buffer = TraceBuffer::<u64>::new(3).unwrap();
        push_range(&buffer, 0..2);
        let mut reader = Reader::new(&buffer);
        reader.synchronize().unwrap();
        reader.pull().unwrap();
        reader.pull().unwrap();
        assert_eq!(reader.timestamp(), secs(2));

        push_range(&buffer, 2..3);
        assert!(!reader.gap());
        assert_eq!(reader.synchronize().unwrap(), SyncStatus::Soft);
        assert_eq!(reader.timestamp(), secs(3));
        assert_eq!(reader.pull().unwrap().data, 2);
    }

    #[test]
    fn hard_sync_after_overwrite() {
        let buffer = TraceBuffer::<u64>::new(3).unwrap();
        push_range(&buffer, 0..2);
        let mut reader = Reader::new(&buffer);
        reader.synchronize().unwrap();

        push_range(&buffer, 2..6);
        assert!(reader.gap());
        assert_eq!(reader.pull(), Err(ReaderError::Overflow));
        assert_eq!(reader.synchronize().unwrap(), SyncStatus::Hard);
        assert!(!reader.gap());
        assert_eq!(reader.pull().unwrap().data, 3);
    }

    #[test]
    fn gap_found_without_timestamps() {
        let buffer = TraceBuffer::<u64>::new(3).unwrap();
        let mut reader = Reader::new(&buffer);
        reader.synchronize().unwrap();
        for i in 0..3 {
            let _ = buffer.push(Event::new(i, Duration::ZERO)).unwrap();
        }
        assert!(!reader.gap());
        assert_eq!(reader.synchronize().unwrap(), SyncStatus::Soft);
        assert_eq!(reader.pull().unwrap().data, 0);

        for i in 3..7 {
            let _ = buffer.push(Event::new(i, Duration::ZERO)).unwrap();
        }
        assert!(reader.gap());
        assert_eq!(reader.pull(), Err(ReaderError::Overflow));
        assert_eq!(reader.synchronize().unwrap(), SyncStatus::Hard);
        assert_eq!(reader.pull().unwrap().data, 4);
    }

    #[test]
    fn pop_consumes_from_top() {
        let buffer = TraceBuffer::<u64>::new(4).unwrap();
        push_range(&buffer, 0..3);
        let mut reader = Reader::new(&buffer);
        reader.synchronize().unwrap();
        assert_eq!(reader.pop().unwrap().data, 2);
        assert_eq!(reader.pop().unwrap().data, 1);
        assert_eq!(reader.length(), 1);

        assert_eq!(reader.synchronize().unwrap(), SyncStatus::Soft);
        assert_eq!(reader.length(), 3);
    }

    #[test]
    fn sync_status_gap_flag() {
        assert!(SyncStatus::Init.is_gap());
        assert!(SyncStatus::Hard.is_gap());
        assert!(!SyncStatus::Soft.is_gap());
    }
}
