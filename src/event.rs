//! Timestamped samples stored in the trace.

use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

/// An immutable sample: a data value observed at a time offset.
///
/// Two events are equal when both their data and time match. Ordering along
/// the trace is by time only, see [`Event::cmp_time`] and the comparisons
/// against a bare [`Duration`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Event<T> {
    pub data: T,
    pub time: Duration,
}

impl<T> Event<T> {
    pub fn new(data: T, time: Duration) -> Self {
        Event { data, time }
    }

    /// Returns a copy of this event carrying `time` instead of its own.
    pub fn with_time(self, time: Duration) -> Self {
        Event { time, ..self }
    }

    pub fn cmp_time(&self, other: &Event<T>) -> Ordering {
        self.time.cmp(&other.time)
    }
}

impl<T> PartialEq<Duration> for Event<T> {
    fn eq(&self, other: &Duration) -> bool {
        self.time == *other
    }
}

impl<T> PartialOrd<Duration> for Event<T> {
    fn partial_cmp(&self, other: &Duration) -> Option<Ordering> {
        Some(self.time.cmp(other))
    }
}

impl<T: fmt::Display> fmt::Display for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}s)", self.data, self.time.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_against_time() {
        let event = Event::new('a', Duration::from_secs(3));
        assert!(event < Duration::from_secs(4));
        assert!(event > Duration::from_secs(2));
        assert!(event == Duration::from_secs(3));
    }

    #[test]
    fn time_ordering_ignores_data() {
        let a = Event::new(9, Duration::from_secs(1));
        let b = Event::new(1, Duration::from_secs(2));
        assert_eq!(a.cmp_time(&b), Ordering::Less);
        assert_eq!(b.with_time(Duration::from_secs(1)).cmp_time(&a), Ordering::Equal);
    }

    #[test]
    fn display() {
        let event = Event::new("b", Duration::from_millis(1500));
        assert_eq!(event.to_string(), "(b, 1.5s)");
    }
}
