//! # tracemon - lock-free traces and three-valued MTL monitors
//!
//! `tracemon` is a runtime-verification toolkit for real-time software.
//! Instrumented code stamps events and pushes them into a bounded shared
//! trace; periodic monitors read that trace and evaluate metric temporal
//! logic formulas against it.
//!
//! It includes:
//! - a lock-free ring buffer of timestamped events whose `(bottom, top)`
//!   state is published atomically,
//! - writers that stamp events with a pluggable clock,
//! - readers that detect when unread events were overwritten, and a
//!   seekable cursor on top of them,
//! - a three-valued (true / false / unknown) evaluator for past and future
//!   bounded temporal operators and duration terms, and
//! - a periodic monitor contract for driving evaluations from a scheduler.
//!
//! ## Simple usage
//!
//! ```
//! use std::time::Duration;
//! use tracemon::buffer::{PushStatus, TraceBuffer};
//! use tracemon::clock::ManualClock;
//! use tracemon::monitor::{FormulaMonitor, PeriodicTask};
//! use tracemon::mtl::{Formula, TimeBound, Verdict};
//! use tracemon::writer::Writer;
//!
//! let buffer = TraceBuffer::new(64).unwrap();
//! let clock = ManualClock::new(Duration::from_secs(1));
//! let mut writer = Writer::with_clock(&buffer, &clock);
//!
//! // "the door opens within 5s of t = 1s"
//! let mut monitor = FormulaMonitor::builder()
//!     .formula(Formula::eventually(TimeBound::Less(Duration::from_secs(5)), Formula::prop('o')))
//!     .origin(Duration::from_secs(1))
//!     .build(&buffer)
//!     .unwrap();
//!
//! assert_eq!(writer.push('c').unwrap(), PushStatus::Ok);
//! assert_eq!(monitor.run(), Verdict::Unknown);
//!
//! clock.advance(Duration::from_secs(2));
//! assert_eq!(writer.push('o').unwrap(), PushStatus::Ok);
//! assert_eq!(monitor.run(), Verdict::True);
//! ```

pub mod buffer;
pub mod clock;
pub mod cursor;
pub mod event;
pub mod monitor;
pub mod mtl;
pub mod reader;
pub mod writer;
