#![allow(dead_code)]

use std::sync::Once;
use std::time::Duration;
use tracemon::buffer::{PushStatus, TraceBuffer};
use tracemon::event::Event;

static TRACING: Once = Once::new();

/// Routes library logs to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

/// A buffer holding exactly `events`, given as `(data, seconds)` pairs.
pub fn trace_of<T: Copy>(events: &[(T, u64)]) -> TraceBuffer<T> {
    let buffer = TraceBuffer::new(events.len().max(1)).expect("non-zero capacity");
    for (data, t) in events {
        let status = buffer
            .push(Event::new(*data, secs(*t)))
            .expect("uncontended push");
        assert_eq!(status, PushStatus::Ok);
    }
    buffer
}
