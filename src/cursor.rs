//! Seekable read head over a reader's window.
//!
//! Formula evaluation scans the same stretch of trace many times, once per
//! sub-formula, and must not consume it while doing so. [`TraceCursor`] is
//! the interface the evaluator walks; [`CursorReader`] implements it on top
//! of a [`Reader`], keeping the cursor separate from the consumption indices.

use crate::buffer::{CasSlot, DefaultSlot, TraceBuffer};
use crate::event::Event;
use crate::reader::{Reader, ReaderError, SyncStatus};
use std::time::Duration;

/// A read head over an ordered window of events.
///
/// Positions are opaque indices; only values returned by
/// [`get_cursor`](TraceCursor::get_cursor) are meaningful to
/// [`set_cursor`](TraceCursor::set_cursor).
pub trait TraceCursor {
    type Data: Copy;

    fn get_cursor(&self) -> usize;

    /// Moves to `position`; fails with `Unavailable` outside the window.
    fn set_cursor(&mut self, position: usize) -> Result<(), ReaderError>;

    /// Steps forward; fails at the newest event.
    fn increment_cursor(&mut self) -> Result<(), ReaderError>;

    /// Steps back; fails at the oldest event.
    fn decrement_cursor(&mut self) -> Result<(), ReaderError>;

    fn read(&self) -> Result<Event<Self::Data>, ReaderError>;

    fn read_next(&self) -> Result<Event<Self::Data>, ReaderError>;

    fn read_previous(&self) -> Result<Event<Self::Data>, ReaderError>;

    /// Events from the cursor (inclusive) to the end of the window.
    fn length(&self) -> usize;

    /// Events before the cursor.
    fn consumed(&self) -> usize;

    /// Moves the cursor back to the oldest event.
    fn reset(&mut self);

    /// Seeks the last event at or before `time`, starting from the current
    /// position: backward while the cursor is after `time`, then forward
    /// while the next event is not.
    ///
    /// Fails with `Unavailable` when the window is empty or every event in
    /// it is after `time`; the cursor is then left on the oldest event.
    fn set(&mut self, time: Duration) -> Result<(), ReaderError> {
        let mut event = self.read()?;
        while event.time > time {
            self.decrement_cursor()?;
            event = self.read()?;
        }
        loop {
            match self.read_next() {
                Ok(next) if next.time <= time => self.increment_cursor()?,
                Ok(_) | Err(ReaderError::Unavailable) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }
}

/// A [`Reader`] with a private cursor.
pub struct CursorReader<'a, T, S = DefaultSlot> {
    reader: Reader<'a, T, S>,
    cursor: usize,
}

impl<'a, T: Copy, S: CasSlot> CursorReader<'a, T, S> {
    pub fn new(buffer: &'a TraceBuffer<T, S>) -> Self {
        CursorReader {
            reader: Reader::new(buffer),
            cursor: 0,
        }
    }

    pub fn reader(&self) -> &Reader<'a, T, S> {
        &self.reader
    }

    fn valid(&self, position: usize) -> bool {
        let buffer = self.reader.buffer();
        position < buffer.size()
            && (position == self.reader.bottom()
                || buffer.distance(self.reader.bottom(), position) < self.reader.length())
    }

    fn clamp(&mut self) {
        if !self.valid(self.cursor) {
            self.cursor = self.reader.bottom();
        }
    }

    /// Synchronizes the underlying reader. The cursor keeps its position if
    /// it is still inside the new window.
    pub fn synchronize(&mut self) -> Result<SyncStatus, ReaderError> {
        let status = self.reader.synchronize()?;
        self.clamp();
        Ok(status)
    }

    pub fn gap(&self) -> bool {
        self.reader.gap()
    }

    pub fn pull(&mut self) -> Result<Event<T>, ReaderError> {
        let event = self.reader.pull()?;
        self.clamp();
        Ok(event)
    }

    pub fn pop(&mut self) -> Result<Event<T>, ReaderError> {
        let event = self.reader.pop()?;
        self.clamp();
        Ok(event)
    }
}

impl<T: Copy, S: CasSlot> TraceCursor for CursorReader<'_, T, S> {
    type Data = T;

    fn get_cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, position: usize) -> Result<(), ReaderError> {
        if !self.valid(position) {
            return Err(ReaderError::Unavailable);
        }
        self.cursor = position;
        Ok(())
    }

    fn increment_cursor(&mut self) -> Result<(), ReaderError> {
        if self.length() < 2 {
            return Err(ReaderError::Unavailable);
        }
        self.cursor = self.reader.buffer().next(self.cursor);
        Ok(())
    }

    fn decrement_cursor(&mut self) -> Result<(), ReaderError> {
        if self.cursor == self.reader.bottom() {
            return Err(ReaderError::Unavailable);
        }
        self.cursor = self.reader.buffer().prev(self.cursor);
        Ok(())
    }

    fn read(&self) -> Result<Event<T>, ReaderError> {
        if self.reader.is_empty() {
            return Err(ReaderError::Unavailable);
        }
        self.reader.read_at(self.cursor)
    }

    fn read_next(&self) -> Result<Event<T>, ReaderError> {
        if self.length() < 2 {
            return Err(ReaderError::Unavailable);
        }
        self.reader.read_at(self.reader.buffer().next(self.cursor))
    }

    fn read_previous(&self) -> Result<Event<T>, ReaderError> {
        if self.cursor == self.reader.bottom() {
            return Err(ReaderError::Unavailable);
        }
        self.reader.read_at(self.reader.buffer().prev(self.cursor))
    }

    fn length(&self) -> usize {
        self.reader.length() - self.consumed()
    }

    fn consumed(&self) -> usize {
        self.reader
            .buffer()
            .distance(self.reader.bottom(), self.cursor)
    }

    fn reset(&mut self) {
        self.cursor = self.reader.bottom();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn trace(times: &[u64]) -> TraceBuffer<usize> {
        let buffer = TraceBuffer::new(times.len().max(1)).unwrap();
        for (i, t) in times.iter().enumerate() {
            let _ = buffer.push(Event::new(i, secs(*t))).unwrap();
        }
        buffer
    }

    #[test]
    fn steps_within_window() {
        let buffer = trace(&[1, 2, 3]);
        let mut cursor = CursorReader::new(&buffer);
        cursor.synchronize().unwrap();

        assert_eq!(cursor.length(), 3);
        assert_eq!(cursor.read_previous(), Err(ReaderError::Unavailable));
        assert_eq!(cursor.decrement_cursor(), Err(ReaderError::Unavailable));
        cursor.increment_cursor().unwrap();
        cursor.increment_cursor().unwrap();
        assert_eq!(cursor.increment_cursor(), Err(ReaderError::Unavailable));
        assert_eq!(cursor.read().unwrap().data, 2);
        assert_eq!(cursor.read_previous().unwrap().data, 1);
        assert_eq!(cursor.read_next(), Err(ReaderError::Unavailable));
        assert_eq!((cursor.consumed(), cursor.length()), (2, 1));

        cursor.reset();
        assert_eq!(cursor.read().unwrap().data, 0);
    }

    #[test]
    fn set_cursor_is_validated() {
        let buffer = trace(&[1, 2]);
        let mut cursor = CursorReader::new(&buffer);
        cursor.synchronize().unwrap();
        assert!(cursor.set_cursor(1).is_ok());
        // Slot 2 is the free slot past the window.
        assert_eq!(cursor.set_cursor(2), Err(ReaderError::Unavailable));
        assert_eq!(cursor.set_cursor(9), Err(ReaderError::Unavailable));
        assert_eq!(cursor.get_cursor(), 1);
    }

    #[test]
    fn set_seeks_in_both_directions() {
        let buffer = trace(&[2, 5, 9, 14]);
        let mut cursor = CursorReader::new(&buffer);
        cursor.synchronize().unwrap();

        cursor.set(secs(10)).unwrap();
        assert_eq!(cursor.read().unwrap().time, secs(9));
        cursor.set(secs(5)).unwrap();
        assert_eq!(cursor.read().unwrap().time, secs(5));
        cursor.set(secs(100)).unwrap();
        assert_eq!(cursor.read().unwrap().time, secs(14));
        assert_eq!(cursor.set(secs(1)), Err(ReaderError::Unavailable));
        assert_eq!(cursor.get_cursor(), 0);
    }

    #[test]
    fn empty_window_has_nothing_to_read() {
        let buffer = TraceBuffer::<u8>::new(2).unwrap();
        let mut cursor = CursorReader::new(&buffer);
        cursor.synchronize().unwrap();
        assert_eq!(cursor.read(), Err(ReaderError::Unavailable));
        assert_eq!(cursor.set(secs(1)), Err(ReaderError::Unavailable));
        assert_eq!(cursor.length(), 0);
    }

    #[test]
    fn pull_moves_cursor_with_bottom() {
        let buffer = trace(&[1, 2, 3]);
        let mut cursor = CursorReader::new(&buffer);
        cursor.synchronize().unwrap();
        assert_eq!(cursor.pull().unwrap().data, 0);
        assert_eq!(cursor.read().unwrap().data, 1);
        assert_eq!(cursor.consumed(), 0);
    }
}
