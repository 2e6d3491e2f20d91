//! Real-valued results of duration terms.

use super::verdict::Verdict;
use std::fmt::Display;
use std::ops::Add;
use std::time::Duration;

/// An accumulated amount of time plus a flag telling whether part of the
/// integration window could not be decided.
///
/// The value counts only the decided parts, so an `unknown` measure is a
/// lower bound of the real one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Measure {
    pub value: Duration,
    pub unknown: bool,
}

impl Measure {
    pub fn known(value: Duration) -> Self {
        Measure {
            value,
            unknown: false,
        }
    }

    pub fn less_than(self, other: Measure) -> Verdict {
        if self.unknown || other.unknown {
            Verdict::Unknown
        } else {
            Verdict::from(self.value < other.value)
        }
    }
}

impl Add for Measure {
    type Output = Measure;

    fn add(self, rhs: Measure) -> Measure {
        Measure {
            value: self.value.saturating_add(rhs.value),
            unknown: self.unknown || rhs.unknown,
        }
    }
}

impl Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.value.as_secs_f64())?;
        if self.unknown {
            write!(f, " (unknown)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_is_unknown_when_either_side_is() {
        let a = Measure::known(Duration::from_secs(2));
        let b = Measure::known(Duration::from_secs(3));
        assert_eq!(a.less_than(b), Verdict::True);
        assert_eq!(b.less_than(a), Verdict::False);
        let tainted = Measure {
            unknown: true,
            ..b
        };
        assert_eq!(a.less_than(tainted), Verdict::Unknown);
    }

    #[test]
    fn sum_propagates_flag() {
        let sum = Measure::known(Duration::from_secs(1))
            + Measure {
                value: Duration::from_secs(2),
                unknown: true,
            };
        assert_eq!(sum.value, Duration::from_secs(3));
        assert!(sum.unknown);
        assert_eq!(sum.to_string(), "3s (unknown)");
    }
}
