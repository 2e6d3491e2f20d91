//! Metric temporal logic over discrete-event traces.
//!
//! Formulas are built with the constructors of [`Formula`] and evaluated
//! at an instant with [`evaluate`]. Verdicts are three-valued: a formula the
//! trace cannot decide yet evaluates to [`Verdict::Unknown`].

pub mod duration;
pub mod evaluator;
pub mod formula;
pub mod verdict;

pub use duration::Measure;
pub use evaluator::{evaluate, evaluate_term};
pub use formula::{Formula, Term, TimeBound};
pub use verdict::{Fold, Verdict};
