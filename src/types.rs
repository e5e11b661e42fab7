///! Small value types shared by the query algebra and the search engine.
///!
///! This module provides the two sides of a redescription, the Boolean
///! operators used by queries, and the borrowed cell values terms are
///! evaluated against.
use std::fmt;

/// One of the two disjoint variable spaces describing the same rows.
///
/// # Invariants
///
/// - `Side::Left` has index 0, `Side::Right` has index 1
/// - `side.other().other() == side`
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// Creates a side from its index.
    ///
    /// # Panics
    ///
    /// Panics if `index > 1`.
    pub fn new(index: usize) -> Self {
        match index {
            0 => Side::Left,
            1 => Side::Right,
            _ => panic!("Side index must be 0 or 1, got {}", index),
        }
    }

    /// Returns the raw side index as a `usize`.
    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    /// Returns the opposite side.
    pub fn other(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "LHS"),
            Side::Right => write!(f, "RHS"),
        }
    }
}

impl From<Side> for usize {
    fn from(side: Side) -> Self {
        side.index()
    }
}

/// A Boolean operator combining the children of a query bucket.
///
/// The derived order puts `And` before `Or`, which is the operator
/// preference used when canonically comparing queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Op {
    And,
    Or,
}

impl Op {
    /// Returns the dual operator.
    pub fn dual(self) -> Self {
        match self {
            Op::And => Op::Or,
            Op::Or => Op::And,
        }
    }

    pub fn is_and(self) -> bool {
        self == Op::And
    }

    pub fn is_or(self) -> bool {
        self == Op::Or
    }

    /// Returns the operator effective at nesting depth `depth` under a root operator `self`.
    pub fn at_depth(self, depth: usize) -> Self {
        if depth % 2 == 0 {
            self
        } else {
            self.dual()
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::And => write!(f, "&"),
            Op::Or => write!(f, "|"),
        }
    }
}

/// A single cell value that a term can be evaluated against.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Value<'a> {
    Bool(bool),
    Cat(&'a str),
    Num(f64),
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Cat(c) => write!(f, "{}", c),
            Value::Num(x) => write!(f, "{}", x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_side_creation() {
        assert_eq!(Side::new(0), Side::Left);
        assert_eq!(Side::new(1), Side::Right);
        assert_eq!(Side::Left.index(), 0);
        assert_eq!(Side::Right.index(), 1);
        assert!(Side::Left < Side::Right);
    }

    #[test]
    #[should_panic(expected = "Side index must be 0 or 1")]
    fn test_side_out_of_range_panics() {
        Side::new(2);
    }

    #[test]
    fn test_side_other() {
        for side in Side::BOTH {
            assert_ne!(side.other(), side);
            assert_eq!(side.other().other(), side);
        }
    }

    #[test]
    fn test_op_dual_and_depth() {
        assert_eq!(Op::And.dual(), Op::Or);
        assert_eq!(Op::Or.dual(), Op::And);
        assert_eq!(Op::Or.at_depth(0), Op::Or);
        assert_eq!(Op::Or.at_depth(1), Op::And);
        assert_eq!(Op::Or.at_depth(2), Op::Or);
        assert!(Op::And < Op::Or);
    }
}
