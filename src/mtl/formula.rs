//! Abstract syntax tree of metric temporal logic formulas.
//!
//! Propositions are compared for equality with the data of the event in
//! force at the evaluation instant, so a `Formula<P>` is evaluated over a
//! trace of `Event<P>`.

use std::fmt::Display;
use std::time::Duration;

/// Time bound of the unary temporal operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeBound {
    /// Somewhere or everywhere in a window of length `b`.
    Less(Duration),
    /// Exactly `b` away from the evaluation instant.
    Equal(Duration),
    Unbounded,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Formula<P> {
    True,
    False,
    /// Holds while the event in force carries this value.
    Prop(P),
    Not(Box<Formula<P>>),
    Or(Box<Formula<P>>, Box<Formula<P>>),
    And(Box<Formula<P>>, Box<Formula<P>>),
    Implies(Box<Formula<P>>, Box<Formula<P>>),
    /// `lhs U<b rhs`, or unbounded with `None`.
    Until(Option<Duration>, Box<Formula<P>>, Box<Formula<P>>),
    /// `lhs S<b rhs`, or unbounded with `None`.
    Since(Option<Duration>, Box<Formula<P>>, Box<Formula<P>>),
    Eventually(TimeBound, Box<Formula<P>>),
    Always(TimeBound, Box<Formula<P>>),
    PastEventually(TimeBound, Box<Formula<P>>),
    Historically(TimeBound, Box<Formula<P>>),
    /// `lhs < rhs` over real-valued terms.
    Less(Term<P>, Term<P>),
}

/// Real-valued terms, compared with [`Formula::Less`].
#[derive(Clone, Debug, PartialEq)]
pub enum Term<P> {
    Constant(Duration),
    /// Time during which the formula holds within `[t, t + b]`.
    Duration(Duration, Box<Formula<P>>),
    Sum(Box<Term<P>>, Box<Term<P>>),
}

impl<P> Formula<P> {
    pub fn prop(p: P) -> Self {
        Formula::Prop(p)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(f: Formula<P>) -> Self {
        Formula::Not(Box::new(f))
    }

    pub fn and(l: Formula<P>, r: Formula<P>) -> Self {
        Formula::And(Box::new(l), Box::new(r))
    }

    pub fn or(l: Formula<P>, r: Formula<P>) -> Self {
        Formula::Or(Box::new(l), Box::new(r))
    }

    pub fn implies(l: Formula<P>, r: Formula<P>) -> Self {
        Formula::Implies(Box::new(l), Box::new(r))
    }

    pub fn until(bound: Option<Duration>, l: Formula<P>, r: Formula<P>) -> Self {
        Formula::Until(bound, Box::new(l), Box::new(r))
    }

    pub fn since(bound: Option<Duration>, l: Formula<P>, r: Formula<P>) -> Self {
        Formula::Since(bound, Box::new(l), Box::new(r))
    }

    pub fn eventually(bound: TimeBound, f: Formula<P>) -> Self {
        Formula::Eventually(bound, Box::new(f))
    }

    pub fn always(bound: TimeBound, f: Formula<P>) -> Self {
        Formula::Always(bound, Box::new(f))
    }

    pub fn past_eventually(bound: TimeBound, f: Formula<P>) -> Self {
        Formula::PastEventually(bound, Box::new(f))
    }

    pub fn historically(bound: TimeBound, f: Formula<P>) -> Self {
        Formula::Historically(bound, Box::new(f))
    }

    pub fn less(l: Term<P>, r: Term<P>) -> Self {
        Formula::Less(l, r)
    }
}

impl<P> Term<P> {
    pub fn duration(bound: Duration, f: Formula<P>) -> Self {
        Term::Duration(bound, Box::new(f))
    }

    pub fn sum(l: Term<P>, r: Term<P>) -> Self {
        Term::Sum(Box::new(l), Box::new(r))
    }
}

fn bound_label(op: &str, bound: &TimeBound) -> String {
    match bound {
        TimeBound::Less(b) => format!("{op}<{}", b.as_secs_f64()),
        TimeBound::Equal(b) => format!("{op}={}", b.as_secs_f64()),
        TimeBound::Unbounded => op.to_string(),
    }
}

fn binary_label(op: &str, bound: &Option<Duration>) -> String {
    match bound {
        Some(b) => format!("{op}<{}", b.as_secs_f64()),
        None => op.to_string(),
    }
}

/// Renders formulas in compact notation: `F`, `G`, `P`, `H` for the unary
/// temporal operators, `U` and `S` for until and since, `∫` for durations.
/// Bounds are printed in seconds.
impl<P: Display> Display for Formula<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Formula::True => write!(f, "True"),
            Formula::False => write!(f, "False"),
            Formula::Prop(p) => write!(f, "{p}"),
            Formula::Not(g) => write!(f, "¬({g})"),
            Formula::Or(l, r) => write!(f, "({l}) ∨ ({r})"),
            Formula::And(l, r) => write!(f, "({l}) ∧ ({r})"),
            Formula::Implies(l, r) => write!(f, "({l}) → ({r})"),
            Formula::Until(b, l, r) => write!(f, "({l}) {} ({r})", binary_label("U", b)),
            Formula::Since(b, l, r) => write!(f, "({l}) {} ({r})", binary_label("S", b)),
            Formula::Eventually(b, g) => write!(f, "{}({g})", bound_label("F", b)),
            Formula::Always(b, g) => write!(f, "{}({g})", bound_label("G", b)),
            Formula::PastEventually(b, g) => write!(f, "{}({g})", bound_label("P", b)),
            Formula::Historically(b, g) => write!(f, "{}({g})", bound_label("H", b)),
            Formula::Less(l, r) => write!(f, "{l} < {r}"),
        }
    }
}

impl<P: Display> Display for Term<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Constant(c) => write!(f, "{}", c.as_secs_f64()),
            Term::Duration(b, g) => write!(f, "∫{}({g})", b.as_secs_f64()),
            Term::Sum(l, r) => write!(f, "({l} + {r})"),
        }
    }
}

enum Node<'a, P> {
    Formula(&'a Formula<P>),
    Term(&'a Term<P>),
}

impl<P: Display> Node<'_, P> {
    fn label(&self) -> String {
        match self {
            Node::Formula(formula) => match formula {
                Formula::True => "True".to_string(),
                Formula::False => "False".to_string(),
                Formula::Prop(p) => format!("{p}"),
                Formula::Not(_) => "Not".to_string(),
                Formula::Or(_, _) => "Or".to_string(),
                Formula::And(_, _) => "And".to_string(),
                Formula::Implies(_, _) => "Implies".to_string(),
                Formula::Until(b, _, _) => binary_label("Until", b),
                Formula::Since(b, _, _) => binary_label("Since", b),
                Formula::Eventually(b, _) => bound_label("Eventually", b),
                Formula::Always(b, _) => bound_label("Always", b),
                Formula::PastEventually(b, _) => bound_label("PastEventually", b),
                Formula::Historically(b, _) => bound_label("Historically", b),
                Formula::Less(_, _) => "Less".to_string(),
            },
            Node::Term(term) => match term {
                Term::Constant(c) => format!("{}", c.as_secs_f64()),
                Term::Duration(b, _) => format!("Duration[{}]", b.as_secs_f64()),
                Term::Sum(_, _) => "Sum".to_string(),
            },
        }
    }

    fn children(&self) -> Vec<Node<'_, P>> {
        match self {
            Node::Formula(formula) => match formula {
                Formula::True | Formula::False | Formula::Prop(_) => vec![],
                Formula::Not(g)
                | Formula::Eventually(_, g)
                | Formula::Always(_, g)
                | Formula::PastEventually(_, g)
                | Formula::Historically(_, g) => vec![Node::Formula(g)],
                Formula::Or(l, r)
                | Formula::And(l, r)
                | Formula::Implies(l, r)
                | Formula::Until(_, l, r)
                | Formula::Since(_, l, r) => vec![Node::Formula(l), Node::Formula(r)],
                Formula::Less(l, r) => vec![Node::Term(l), Node::Term(r)],
            },
            Node::Term(term) => match term {
                Term::Constant(_) => vec![],
                Term::Duration(_, g) => vec![Node::Formula(g)],
                Term::Sum(l, r) => vec![Node::Term(l), Node::Term(r)],
            },
        }
    }
}

impl<P: Display> Formula<P> {
    /// Multi-line tree rendering with `tree`-style connectors.
    ///
    /// ```text
    /// Until<9
    /// ├── a
    /// └── b
    /// ```
    pub fn to_tree_string(&self, indent: usize) -> String {
        fn write_node<P: Display>(
            node: &Node<'_, P>,
            prefix: &str,
            is_root: bool,
            is_last: bool,
            out: &mut String,
        ) {
            if is_root {
                out.push_str(&format!("{}{}\n", prefix, node.label()));
            } else {
                let connector = if is_last { "└── " } else { "├── " };
                out.push_str(&format!("{}{}{}\n", prefix, connector, node.label()));
            }

            let child_prefix = if is_root {
                prefix.to_string()
            } else if is_last {
                format!("{prefix}    ")
            } else {
                format!("{prefix}│   ")
            };

            let children = node.children();
            let count = children.len();
            for (i, child) in children.iter().enumerate() {
                write_node(child, &child_prefix, false, i + 1 == count, out);
            }
        }

        let mut out = String::new();
        write_node(
            &Node::Formula(self),
            &" ".repeat(indent),
            true,
            true,
            &mut out,
        );
        out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn display_uses_compact_notation() {
        let f = Formula::until(Some(secs(9)), Formula::prop('a'), Formula::prop('b'));
        assert_eq!(f.to_string(), "(a) U<9 (b)");

        let g = Formula::always(
            TimeBound::Less(secs(3)),
            Formula::implies(
                Formula::prop('a'),
                Formula::eventually(TimeBound::Equal(secs(1)), Formula::prop('b')),
            ),
        );
        assert_eq!(g.to_string(), "G<3((a) → (F=1(b)))");

        let h = Formula::<char>::less(
            Term::duration(secs(22), Formula::prop('a')),
            Term::Constant(secs(10)),
        );
        assert_eq!(h.to_string(), "∫22(a) < 10");
    }

    #[test]
    fn tree_rendering() {
        let f = Formula::and(
            Formula::not(Formula::prop('a')),
            Formula::since(None, Formula::True, Formula::prop('b')),
        );
        let expected = "\
And
├── Not
│   └── a
└── Since
    ├── True
    └── b";
        assert_eq!(f.to_tree_string(0), expected);
    }

    #[test]
    fn tree_rendering_reaches_into_terms() {
        let f = Formula::less(
            Term::sum(
                Term::duration(secs(5), Formula::prop(1)),
                Term::Constant(secs(1)),
            ),
            Term::Constant(secs(4)),
        );
        let expected = concat!(
            "  Less\n",
            "  ├── Sum\n",
            "  │   ├── Duration[5]\n",
            "  │   │   └── 1\n",
            "  │   └── 1\n",
            "  └── 4",
        );
        assert_eq!(f.to_tree_string(2), expected);
    }
}
