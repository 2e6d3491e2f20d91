//! Producer handle that stamps events and pushes them into a buffer.

use crate::buffer::{BufferError, CasSlot, DefaultSlot, PushStatus, TraceBuffer};
use crate::clock::{Clock, MonotonicClock};
use crate::event::Event;

/// An attached producer.
///
/// The buffer counts attached writers; while more than one is attached every
/// push reports [`PushStatus::Unsafe`]. Dropping the writer detaches it.
pub struct Writer<'a, T, S: CasSlot = DefaultSlot, C: Clock = MonotonicClock>
where
    T: Copy,
{
    buffer: &'a TraceBuffer<T, S>,
    clock: C,
    last: Option<Event<T>>,
}

impl<'a, T: Copy, S: CasSlot> Writer<'a, T, S, MonotonicClock> {
    pub fn new(buffer: &'a TraceBuffer<T, S>) -> Self {
        Self::with_clock(buffer, MonotonicClock::new())
    }
}

impl<'a, T: Copy, S: CasSlot, C: Clock> Writer<'a, T, S, C> {
    pub fn with_clock(buffer: &'a TraceBuffer<T, S>, clock: C) -> Self {
        buffer.attach_writer();
        Writer {
            buffer,
            clock,
            last: None,
        }
    }

    /// Stamps `data` with the current clock reading and pushes it.
    pub fn push(&mut self, data: T) -> Result<PushStatus, BufferError> {
        let event = Event::new(data, self.clock.now());
        self.push_timestamped(event)
    }

    /// Pushes `event` after replacing its time with the current clock reading.
    pub fn push_event(&mut self, event: Event<T>) -> Result<PushStatus, BufferError> {
        self.push_timestamped(event.with_time(self.clock.now()))
    }

    /// Pushes an event whose time was assigned elsewhere.
    pub fn push_timestamped(&mut self, event: Event<T>) -> Result<PushStatus, BufferError> {
        let status = self.buffer.push(event)?;
        self.last = Some(event);
        Ok(status)
    }

    /// The last event this writer published.
    pub fn last(&self) -> Option<Event<T>> {
        self.last
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn buffer(&self) -> &'a TraceBuffer<T, S> {
        self.buffer
    }
}

impl<T: Copy, S: CasSlot, C: Clock> Drop for Writer<'_, T, S, C> {
    fn drop(&mut self) {
        self.buffer.detach_writer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, ManualClock};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn stamps_with_its_clock() {
        let buffer = TraceBuffer::new(4).unwrap();
        let clock = ManualClock::new(Duration::from_secs(1));
        let mut writer = Writer::with_clock(&buffer, &clock);
        assert_eq!(writer.push('a').unwrap(), PushStatus::Ok);
        clock.advance(Duration::from_secs(2));
        assert_eq!(writer.push('b').unwrap(), PushStatus::Ok);

        assert_eq!(buffer.pull().unwrap(), Event::new('a', Duration::from_secs(1)));
        assert_eq!(buffer.pull().unwrap(), Event::new('b', Duration::from_secs(3)));
        assert_eq!(writer.last(), Some(Event::new('b', Duration::from_secs(3))));
    }

    #[test]
    fn second_writer_is_unsafe_until_dropped() {
        let buffer = TraceBuffer::new(4).unwrap();
        let mut first = Writer::with_clock(&buffer, FixedClock::default());
        {
            let _second = Writer::with_clock(&buffer, FixedClock::default());
            assert_eq!(buffer.writer_count(), 2);
            assert_eq!(first.push(1u8).unwrap(), PushStatus::Unsafe);
        }
        assert_eq!(buffer.writer_count(), 1);
        assert_eq!(first.push(2u8).unwrap(), PushStatus::Ok);
    }

    #[test]
    fn timestamped_push_keeps_time() {
        let buffer = TraceBuffer::new(1).unwrap();
        let mut writer = Writer::with_clock(&buffer, FixedClock(Duration::from_secs(50)));
        let event = Event::new(7u8, Duration::from_secs(3));
        let _ = writer.push_timestamped(event).unwrap();
        assert_eq!(buffer.pop().unwrap(), event);
    }
}
