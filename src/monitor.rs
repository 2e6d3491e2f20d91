//! Periodic formula monitors.
//!
//! Scheduling itself lives outside this crate: a driver releases each task
//! once per [`Schedule::period`] and calls [`PeriodicTask::run`]. A
//! [`FormulaMonitor`] keeps its [`CursorReader`] between runs, so every run
//! only catches up with what was pushed since the previous one.

use crate::buffer::{CasSlot, DefaultSlot, TraceBuffer};
use crate::cursor::{CursorReader, TraceCursor};
use crate::mtl::{Formula, Verdict, evaluate};
use crate::reader::ReaderError;
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorError {
    #[error("a formula is required to build a monitor")]
    MissingFormula,

    #[error("monitor period must be non-zero")]
    ZeroPeriod,

    #[error("initial synchronization failed: {0}")]
    Reader(#[from] ReaderError),
}

/// Scheduling class requested from the driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SchedulePolicy {
    #[default]
    Other,
    Fifo,
    RoundRobin,
}

/// Release parameters of a periodic task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Schedule {
    pub period: Duration,
    pub policy: SchedulePolicy,
    pub priority: u8,
}

impl Schedule {
    pub fn new(period: Duration, policy: SchedulePolicy, priority: u8) -> Self {
        Schedule {
            period,
            policy,
            priority,
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::new(Duration::from_millis(100), SchedulePolicy::Other, 0)
    }
}

/// The contract between a periodic driver and the work it releases.
pub trait PeriodicTask {
    /// One release. Must not block.
    fn run(&mut self) -> Verdict;

    fn schedule(&self) -> Schedule;

    fn enable(&mut self);

    fn disable(&mut self);

    fn is_running(&self) -> bool;

    fn period(&self) -> Duration {
        self.schedule().period
    }

    fn set_period(&mut self, period: Duration);
}

/// Evaluates one formula at a fixed origin instant on every release.
pub struct FormulaMonitor<'a, T, S = DefaultSlot> {
    cursor: CursorReader<'a, T, S>,
    formula: Formula<T>,
    origin: Duration,
    schedule: Schedule,
    running: bool,
    verdict: Verdict,
}

impl<T: Copy + PartialEq> FormulaMonitor<'_, T, DefaultSlot> {
    pub fn builder() -> FormulaMonitorBuilder<T> {
        FormulaMonitorBuilder::new()
    }
}

impl<'a, T, S> FormulaMonitor<'a, T, S>
where
    T: Copy + PartialEq,
    S: CasSlot,
{
    pub fn formula(&self) -> &Formula<T> {
        &self.formula
    }

    pub fn origin(&self) -> Duration {
        self.origin
    }

    /// Moves the evaluation instant. A verdict decided for the previous
    /// origin is dropped.
    pub fn set_origin(&mut self, origin: Duration) {
        if origin != self.origin {
            self.verdict = Verdict::Unknown;
        }
        self.origin = origin;
    }

    /// Verdict of the latest run that reached the origin, `Unknown` before
    /// the first one.
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn cursor(&self) -> &CursorReader<'a, T, S> {
        &self.cursor
    }

    /// `None` when the trace cannot be positioned at the origin: it is empty,
    /// starts later, or could not be synchronized.
    fn step(&mut self) -> Option<Verdict> {
        if let Err(e) = self.cursor.synchronize() {
            tracing::warn!(error = %e, "monitor could not synchronize with the trace");
            return None;
        }
        self.cursor.set(self.origin).ok()?;
        Some(evaluate(&self.formula, &mut self.cursor, self.origin))
    }
}

impl<T, S> PeriodicTask for FormulaMonitor<'_, T, S>
where
    T: Copy + PartialEq + Display,
    S: CasSlot,
{
    fn run(&mut self) -> Verdict {
        if !self.running {
            tracing::trace!("monitor disabled, keeping last verdict");
            return self.verdict;
        }
        match self.step() {
            Some(verdict) => self.verdict = verdict,
            None => tracing::trace!(origin = ?self.origin, "origin not in the trace, keeping last verdict"),
        }
        tracing::debug!(
            formula = %self.formula,
            origin = ?self.origin,
            verdict = %self.verdict,
            "monitor run"
        );
        self.verdict
    }

    fn schedule(&self) -> Schedule {
        self.schedule
    }

    fn enable(&mut self) {
        self.running = true;
    }

    fn disable(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn set_period(&mut self, period: Duration) {
        self.schedule.period = period;
    }
}

/// Builder for [`FormulaMonitor`].
pub struct FormulaMonitorBuilder<T> {
    formula: Option<Formula<T>>,
    origin: Duration,
    schedule: Schedule,
    enabled: bool,
}

impl<T> Default for FormulaMonitorBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FormulaMonitorBuilder<T> {
    pub fn new() -> Self {
        FormulaMonitorBuilder {
            formula: None,
            origin: Duration::ZERO,
            schedule: Schedule::default(),
            enabled: true,
        }
    }

    pub fn formula(mut self, formula: Formula<T>) -> Self {
        self.formula = Some(formula);
        self
    }

    /// Instant the formula is evaluated at.
    pub fn origin(mut self, origin: Duration) -> Self {
        self.origin = origin;
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.schedule.period = period;
        self
    }

    pub fn policy(mut self, policy: SchedulePolicy) -> Self {
        self.schedule.policy = policy;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.schedule.priority = priority;
        self
    }

    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Whether the monitor starts enabled (the default).
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Attaches a fresh [`CursorReader`] to `buffer` and synchronizes it.
    pub fn build<S: CasSlot>(
        self,
        buffer: &TraceBuffer<T, S>,
    ) -> Result<FormulaMonitor<'_, T, S>, MonitorError>
    where
        T: Copy + PartialEq,
    {
        let formula = self.formula.ok_or(MonitorError::MissingFormula)?;
        if self.schedule.period.is_zero() {
            return Err(MonitorError::ZeroPeriod);
        }
        let mut cursor = CursorReader::new(buffer);
        cursor.synchronize()?;
        Ok(FormulaMonitor {
            cursor,
            formula,
            origin: self.origin,
            schedule: self.schedule,
            running: self.enabled,
            verdict: Verdict::Unknown,
        })
    }
}
