//! Three-valued evaluation of formulas over a [`TraceCursor`].
//!
//! Every operator seeks the cursor to the instant it evaluates at and puts
//! the cursor back where it found it before returning, so callers and
//! sibling sub-formulas never observe each other's motion.
//!
//! Time is discrete, in nanoseconds. The until/since folds and duration
//! integrals visit the instants at which an operand may change value: the
//! event times, and the event times shifted by the windows of the temporal
//! operators nested in the operand. Between two visited instants every
//! operand is constant.

use super::duration::Measure;
use super::formula::{Formula, Term, TimeBound};
use super::verdict::{Fold, Verdict};
use crate::cursor::TraceCursor;
use crate::event::Event;
use crate::reader::ReaderError;
use std::time::Duration;

/// Signed nanoseconds; instants and offsets before zero are representable
/// while folding but never evaluated.
type Nanos = i128;

const NANOS_PER_SEC: Nanos = 1_000_000_000;

fn nanos(d: Duration) -> Nanos {
    d.as_secs() as Nanos * NANOS_PER_SEC + d.subsec_nanos() as Nanos
}

fn instant(n: Nanos) -> Option<Duration> {
    if n < 0 {
        return None;
    }
    let secs = u64::try_from(n / NANOS_PER_SEC).ok()?;
    Some(Duration::new(secs, (n % NANOS_PER_SEC) as u32))
}

fn preserving_cursor<C: TraceCursor, R>(trace: &mut C, f: impl FnOnce(&mut C) -> R) -> R {
    let saved = trace.get_cursor();
    let result = f(trace);
    if trace.set_cursor(saved).is_err() {
        trace.reset();
    }
    result
}

/// Evaluates `formula` at instant `t`.
pub fn evaluate<C>(formula: &Formula<C::Data>, trace: &mut C, t: Duration) -> Verdict
where
    C: TraceCursor,
    C::Data: PartialEq,
{
    preserving_cursor(trace, |trace| match formula {
        Formula::True => Verdict::True,
        Formula::False => Verdict::False,
        Formula::Prop(p) => proposition(trace, p, t),
        Formula::Not(f) => !evaluate(f, trace, t),
        Formula::Or(l, r) => match evaluate(l, trace, t) {
            Verdict::True => Verdict::True,
            lhs => lhs.or(evaluate(r, trace, t)),
        },
        Formula::And(l, r) => match evaluate(l, trace, t) {
            Verdict::False => Verdict::False,
            lhs => lhs.and(evaluate(r, trace, t)),
        },
        Formula::Implies(l, r) => match evaluate(l, trace, t) {
            Verdict::False => Verdict::True,
            lhs => lhs.implies(evaluate(r, trace, t)),
        },
        Formula::Until(bound, l, r) => until(trace, *bound, l, r, t),
        Formula::Since(bound, l, r) => since(trace, *bound, l, r, t),
        Formula::Eventually(bound, f) => eventually(trace, *bound, f, t),
        Formula::Always(bound, f) => always(trace, *bound, f, t),
        Formula::PastEventually(bound, f) => past_eventually(trace, *bound, f, t),
        Formula::Historically(bound, f) => historically(trace, *bound, f, t),
        Formula::Less(l, r) => evaluate_term(l, trace, t).less_than(evaluate_term(r, trace, t)),
    })
}

/// Evaluates a real-valued term at instant `t`.
pub fn evaluate_term<C>(term: &Term<C::Data>, trace: &mut C, t: Duration) -> Measure
where
    C: TraceCursor,
    C::Data: PartialEq,
{
    match term {
        Term::Constant(c) => Measure::known(*c),
        Term::Duration(bound, f) => duration(trace, *bound, f, t),
        Term::Sum(l, r) => evaluate_term(l, trace, t) + evaluate_term(r, trace, t),
    }
}

/// Tests the event in force at `t` against `p`.
///
/// The event in force is the last one at or before `t`. It decides when a
/// later event bounds it, or when it happened exactly at `t`; past the
/// newest event, or before the oldest, the answer is `Unknown`.
pub fn proposition<C>(trace: &mut C, p: &C::Data, t: Duration) -> Verdict
where
    C: TraceCursor,
    C::Data: PartialEq,
{
    preserving_cursor(trace, |trace| {
        if trace.set(t).is_err() {
            return Verdict::Unknown;
        }
        let Ok(event) = trace.read() else {
            return Verdict::Unknown;
        };
        match trace.read_next() {
            Ok(_) => Verdict::from(event.data == *p),
            Err(ReaderError::Unavailable) if event.time == t => Verdict::from(event.data == *p),
            Err(_) => Verdict::Unknown,
        }
    })
}

/// `lhs U<b rhs` at `t`, unbounded when `bound` is `None`.
pub fn until<C>(
    trace: &mut C,
    bound: Option<Duration>,
    lhs: &Formula<C::Data>,
    rhs: &Formula<C::Data>,
    t: Duration,
) -> Verdict
where
    C: TraceCursor,
    C::Data: PartialEq,
{
    let end = bound.map(|b| nanos(t) + nanos(b));
    preserving_cursor(trace, |trace| {
        fold_forward(trace, &Side::Formula(lhs), &Side::Formula(rhs), end, nanos(t))
    })
}

/// `lhs S<b rhs` at `t`, unbounded when `bound` is `None`.
pub fn since<C>(
    trace: &mut C,
    bound: Option<Duration>,
    lhs: &Formula<C::Data>,
    rhs: &Formula<C::Data>,
    t: Duration,
) -> Verdict
where
    C: TraceCursor,
    C::Data: PartialEq,
{
    let start = bound.map(|b| nanos(t) - nanos(b));
    preserving_cursor(trace, |trace| {
        fold_backward(trace, &Side::Formula(lhs), &Side::Formula(rhs), start, nanos(t))
    })
}

pub fn eventually<C>(trace: &mut C, bound: TimeBound, f: &Formula<C::Data>, t: Duration) -> Verdict
where
    C: TraceCursor,
    C::Data: PartialEq,
{
    let always_true = Side::Constant(Verdict::True);
    match bound {
        TimeBound::Equal(b) => at(trace, f, nanos(t) + nanos(b)),
        TimeBound::Less(b) => preserving_cursor(trace, |trace| {
            fold_forward(trace, &always_true, &Side::Formula(f), Some(nanos(t) + nanos(b)), nanos(t))
        }),
        TimeBound::Unbounded => preserving_cursor(trace, |trace| {
            fold_forward(trace, &always_true, &Side::Formula(f), None, nanos(t))
        }),
    }
}

/// `G<b f` is `¬(true U<b ¬f)`; `G=b f` is a single instant like `F=b f`.
pub fn always<C>(trace: &mut C, bound: TimeBound, f: &Formula<C::Data>, t: Duration) -> Verdict
where
    C: TraceCursor,
    C::Data: PartialEq,
{
    let always_true = Side::Constant(Verdict::True);
    match bound {
        TimeBound::Equal(b) => at(trace, f, nanos(t) + nanos(b)),
        TimeBound::Less(b) => !preserving_cursor(trace, |trace| {
            fold_forward(trace, &always_true, &Side::Negated(f), Some(nanos(t) + nanos(b)), nanos(t))
        }),
        TimeBound::Unbounded => !preserving_cursor(trace, |trace| {
            fold_forward(trace, &always_true, &Side::Negated(f), None, nanos(t))
        }),
    }
}

pub fn past_eventually<C>(
    trace: &mut C,
    bound: TimeBound,
    f: &Formula<C::Data>,
    t: Duration,
) -> Verdict
where
    C: TraceCursor,
    C::Data: PartialEq,
{
    let always_true = Side::Constant(Verdict::True);
    match bound {
        TimeBound::Equal(b) => at(trace, f, nanos(t) - nanos(b)),
        TimeBound::Less(b) => preserving_cursor(trace, |trace| {
            fold_backward(trace, &always_true, &Side::Formula(f), Some(nanos(t) - nanos(b)), nanos(t))
        }),
        TimeBound::Unbounded => preserving_cursor(trace, |trace| {
            fold_backward(trace, &always_true, &Side::Formula(f), None, nanos(t))
        }),
    }
}

pub fn historically<C>(
    trace: &mut C,
    bound: TimeBound,
    f: &Formula<C::Data>,
    t: Duration,
) -> Verdict
where
    C: TraceCursor,
    C::Data: PartialEq,
{
    let always_true = Side::Constant(Verdict::True);
    match bound {
        TimeBound::Equal(b) => at(trace, f, nanos(t) - nanos(b)),
        TimeBound::Less(b) => !preserving_cursor(trace, |trace| {
            fold_backward(trace, &always_true, &Side::Negated(f), Some(nanos(t) - nanos(b)), nanos(t))
        }),
        TimeBound::Unbounded => !preserving_cursor(trace, |trace| {
            fold_backward(trace, &always_true, &Side::Negated(f), None, nanos(t))
        }),
    }
}

/// Time within `[t, t + bound]` during which `f` holds.
///
/// Stretches where `f` is `Unknown`, or that the trace does not reach yet,
/// add nothing and set the measure's `unknown` flag.
pub fn duration<C>(trace: &mut C, bound: Duration, f: &Formula<C::Data>, t: Duration) -> Measure
where
    C: TraceCursor,
    C::Data: PartialEq,
{
    preserving_cursor(trace, |trace| {
        let indicator = Side::Formula(f);
        let shifts = fold_shifts(&[&indicator]);
        let end = nanos(t) + nanos(bound);
        let mut measure = Measure::default();
        let mut c = nanos(t);

        while c < end {
            let Some(next) = next_instant(trace, c, &shifts) else {
                measure.unknown = true;
                break;
            };
            let segment_end = next.min(end);
            match indicator.at(trace, c) {
                Verdict::True => {
                    let length = instant(segment_end - c).unwrap_or(Duration::ZERO);
                    measure.value = measure.value.saturating_add(length);
                }
                Verdict::Unknown => measure.unknown = true,
                Verdict::False => {}
            }
            tracing::trace!(from = %c, to = %segment_end, %measure, "duration segment");
            c = segment_end;
        }
        measure
    })
}

fn at<C>(trace: &mut C, f: &Formula<C::Data>, c: Nanos) -> Verdict
where
    C: TraceCursor,
    C::Data: PartialEq,
{
    match instant(c) {
        Some(time) => evaluate(f, trace, time),
        None => Verdict::Unknown,
    }
}

/// Operand of a fold. Derived operators reuse the folds with a constant or
/// negated operand instead of building new formulas.
enum Side<'f, P> {
    Constant(Verdict),
    Formula(&'f Formula<P>),
    Negated(&'f Formula<P>),
}

impl<P: PartialEq> Side<'_, P> {
    fn at<C: TraceCursor<Data = P>>(&self, trace: &mut C, c: Nanos) -> Verdict {
        match self {
            Side::Constant(v) => *v,
            Side::Formula(f) => at(trace, f, c),
            Side::Negated(f) => !at(trace, f, c),
        }
    }

    fn offsets(&self, out: &mut Vec<Nanos>) {
        match self {
            Side::Constant(_) => {}
            Side::Formula(f) | Side::Negated(f) => offsets(f, out),
        }
    }
}

fn fold_shifts<P: PartialEq>(sides: &[&Side<'_, P>]) -> Vec<Nanos> {
    let mut shifts = vec![0];
    for side in sides {
        side.offsets(&mut shifts);
    }
    shifts.sort_unstable();
    shifts.dedup();
    shifts
}

/// Collects the offsets `s` such that the value of `formula` at `c` can
/// only change where `c + s` is an event time.
fn offsets<P>(formula: &Formula<P>, out: &mut Vec<Nanos>) {
    fn widen(out: &mut Vec<Nanos>, inner: &[Nanos], shifts: &[Nanos]) {
        for s in shifts {
            out.extend(inner.iter().map(|x| x + s));
        }
    }

    // Window `[c, c + b)`.
    fn future(bound: Option<Duration>) -> Vec<Nanos> {
        match bound {
            Some(b) => vec![0, nanos(b) - 1],
            None => vec![0],
        }
    }

    // Window `(c - b, c)`.
    fn past(bound: Option<Duration>) -> Vec<Nanos> {
        match bound {
            Some(b) => vec![-1, 1 - nanos(b)],
            None => vec![-1],
        }
    }

    fn unary(bound: &TimeBound, forward: bool) -> Vec<Nanos> {
        match (bound, forward) {
            (TimeBound::Equal(b), true) => vec![nanos(*b)],
            (TimeBound::Equal(b), false) => vec![-nanos(*b)],
            (TimeBound::Less(b), true) => future(Some(*b)),
            (TimeBound::Less(b), false) => past(Some(*b)),
            (TimeBound::Unbounded, true) => future(None),
            (TimeBound::Unbounded, false) => past(None),
        }
    }

    fn term_offsets<P>(term: &Term<P>, out: &mut Vec<Nanos>) {
        match term {
            Term::Constant(_) => {}
            Term::Duration(b, f) => {
                let mut inner = Vec::new();
                offsets(f, &mut inner);
                widen(out, &inner, &[0, nanos(*b)]);
            }
            Term::Sum(l, r) => {
                term_offsets(l, out);
                term_offsets(r, out);
            }
        }
    }

    match formula {
        Formula::True | Formula::False => {}
        Formula::Prop(_) => out.push(0),
        Formula::Not(f) => offsets(f, out),
        Formula::Or(l, r) | Formula::And(l, r) | Formula::Implies(l, r) => {
            offsets(l, out);
            offsets(r, out);
        }
        Formula::Until(bound, l, r) | Formula::Since(bound, l, r) => {
            let mut inner = Vec::new();
            offsets(l, &mut inner);
            offsets(r, &mut inner);
            let shifts = if matches!(formula, Formula::Until(..)) {
                future(*bound)
            } else {
                past(*bound)
            };
            widen(out, &inner, &shifts);
        }
        Formula::Eventually(bound, f) | Formula::Always(bound, f) => {
            let mut inner = Vec::new();
            offsets(f, &mut inner);
            widen(out, &inner, &unary(bound, true));
        }
        Formula::PastEventually(bound, f) | Formula::Historically(bound, f) => {
            let mut inner = Vec::new();
            offsets(f, &mut inner);
            widen(out, &inner, &unary(bound, false));
        }
        Formula::Less(l, r) => {
            term_offsets(l, out);
            term_offsets(r, out);
        }
    }
}

fn time_of<T>(event: Event<T>) -> Nanos {
    nanos(event.time)
}

/// Earliest event time strictly after `x`.
fn first_after<C: TraceCursor>(trace: &mut C, x: Nanos) -> Option<Nanos> {
    let time = match instant(x) {
        Some(time) => time,
        None if x < 0 => {
            trace.reset();
            return trace.read().ok().map(time_of);
        }
        None => return None,
    };
    match trace.set(time) {
        Ok(()) => trace.read_next().ok().map(time_of),
        Err(_) => {
            trace.reset();
            trace.read().ok().map(time_of).filter(|&e| e > x)
        }
    }
}

/// Latest event time strictly before `x`.
fn last_before<C: TraceCursor>(trace: &mut C, x: Nanos) -> Option<Nanos> {
    let time = instant(x - 1).or_else(|| (x > 0).then_some(Duration::MAX))?;
    trace.set(time).ok()?;
    trace.read().ok().map(time_of)
}

fn next_instant<C: TraceCursor>(trace: &mut C, c: Nanos, shifts: &[Nanos]) -> Option<Nanos> {
    shifts
        .iter()
        .filter_map(|s| first_after(trace, c + s).map(|e| e - s))
        .min()
}

fn previous_instant<C: TraceCursor>(trace: &mut C, c: Nanos, shifts: &[Nanos]) -> Option<Nanos> {
    shifts
        .iter()
        .filter_map(|s| last_before(trace, c + s).map(|e| e - s))
        .filter(|&p| p >= 0)
        .max()
}

fn newest<C: TraceCursor>(trace: &mut C) -> Option<Nanos> {
    trace.set(Duration::MAX).ok()?;
    trace.read().ok().map(time_of)
}

fn oldest<C: TraceCursor>(trace: &mut C) -> Option<Nanos> {
    trace.reset();
    trace.read().ok().map(time_of)
}

/// Folds `Fold::step` over the instants of `[t, end)`.
fn fold_forward<C>(
    trace: &mut C,
    left: &Side<'_, C::Data>,
    right: &Side<'_, C::Data>,
    end: Option<Nanos>,
    t: Nanos,
) -> Verdict
where
    C: TraceCursor,
    C::Data: PartialEq,
{
    // Unresolved up to the bound: false if the trace reaches it.
    let unresolved = |trace: &mut C| match end {
        Some(e) if newest(trace).is_some_and(|n| n >= e) => Verdict::False,
        _ => Verdict::Unknown,
    };
    // A zero bound leaves no instant to look at.
    if end.is_some_and(|e| t >= e) {
        return unresolved(trace);
    }
    let shifts = fold_shifts(&[left, right]);
    let mut c = t;
    loop {
        let fold = Fold::step(left.at(trace, c), right.at(trace, c));
        tracing::trace!(instant = %c, ?fold, "until step");
        if let Some(verdict) = fold.resolved() {
            return verdict;
        }
        match next_instant(trace, c, &shifts) {
            Some(next) if end.is_none_or(|e| next < e) => c = next,
            _ => return unresolved(trace),
        }
    }
}

/// Folds `Fold::step` backward over the instants of `(start, t)`.
fn fold_backward<C>(
    trace: &mut C,
    left: &Side<'_, C::Data>,
    right: &Side<'_, C::Data>,
    start: Option<Nanos>,
    t: Nanos,
) -> Verdict
where
    C: TraceCursor,
    C::Data: PartialEq,
{
    let shifts = fold_shifts(&[left, right]);
    // First instant of the open window; the operands are constant from
    // there up to the first change point inside it.
    let edge = start.map(|s| (s + 1).max(0));
    let mut c = t;
    loop {
        c = match (previous_instant(trace, c, &shifts), edge) {
            (Some(previous), Some(e)) if previous >= e => previous,
            (_, Some(e)) if e < c => e,
            (Some(previous), None) => previous,
            _ => {
                return match start {
                    Some(s) if s >= 0 && oldest(trace).is_some_and(|o| o <= s) => Verdict::False,
                    _ => Verdict::Unknown,
                };
            }
        };
        let fold = Fold::step(left.at(trace, c), right.at(trace, c));
        tracing::trace!(instant = %c, ?fold, "since step");
        if let Some(verdict) = fold.resolved() {
            return verdict;
        }
    }
}
