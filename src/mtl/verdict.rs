//! Truth values produced by formula evaluation.

use std::fmt::Display;

/// Three-valued truth: a bounded trace may not hold enough history or future
/// to decide a formula yet, which is `Unknown` rather than an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    True,
    False,
    Unknown,
}

impl Verdict {
    pub fn and(self, other: Verdict) -> Verdict {
        match (self, other) {
            (Verdict::False, _) | (_, Verdict::False) => Verdict::False,
            (Verdict::True, Verdict::True) => Verdict::True,
            _ => Verdict::Unknown,
        }
    }

    pub fn or(self, other: Verdict) -> Verdict {
        match (self, other) {
            (Verdict::True, _) | (_, Verdict::True) => Verdict::True,
            (Verdict::False, Verdict::False) => Verdict::False,
            _ => Verdict::Unknown,
        }
    }

    pub fn implies(self, other: Verdict) -> Verdict {
        (!self).or(other)
    }

    pub fn is_decided(&self) -> bool {
        !matches!(self, Verdict::Unknown)
    }
}

impl std::ops::Not for Verdict {
    type Output = Verdict;

    fn not(self) -> Verdict {
        match self {
            Verdict::True => Verdict::False,
            Verdict::False => Verdict::True,
            Verdict::Unknown => Verdict::Unknown,
        }
    }
}

impl From<bool> for Verdict {
    fn from(value: bool) -> Self {
        if value { Verdict::True } else { Verdict::False }
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::True => "true",
            Verdict::False => "false",
            Verdict::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Accumulator of the until/since folds: a verdict, or `Unresolved` while
/// the fold has to keep visiting instants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fold {
    True,
    False,
    Unknown,
    Unresolved,
}

impl Fold {
    /// One fold step from the left and right operand values at an instant.
    ///
    /// The right operand decides as soon as it is not false; otherwise the
    /// left operand decides as soon as it is not true.
    pub fn step(left: Verdict, right: Verdict) -> Fold {
        if right != Verdict::False {
            Fold::from(right)
        } else if left != Verdict::True {
            Fold::from(left)
        } else {
            Fold::Unresolved
        }
    }

    pub fn resolved(self) -> Option<Verdict> {
        match self {
            Fold::True => Some(Verdict::True),
            Fold::False => Some(Verdict::False),
            Fold::Unknown => Some(Verdict::Unknown),
            Fold::Unresolved => None,
        }
    }
}

impl From<Verdict> for Fold {
    fn from(value: Verdict) -> Self {
        match value {
            Verdict::True => Fold::True,
            Verdict::False => Fold::False,
            Verdict::Unknown => Fold::Unknown,
        }
    }
}
