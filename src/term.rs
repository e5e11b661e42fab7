//! Atomic single-column predicates.
//!
//! A [`Term`] tests one column of one side. There are four shapes:
//!
//! - **Boolean**: true iff the cell is true.
//! - **Categorical**: true iff the cell's label belongs to a non-empty set.
//! - **Numerical**: true iff the cell lies in a closed interval `[lo, hi]` with at most
//!   one infinite bound. One-sided intervals have an algebraic complement, so the
//!   negation of `v <= 3` can be written positively as `3 <= v`.
//! - **Anonymous**: a placeholder whose final shape is not fixed yet. It may carry the
//!   intended [`TermKind`] and a nested expression text. It never evaluates true.
//!
//! Terms are totally ordered by their [`TermKey`] `(column, kind, discriminator)`,
//! which is used for deduplication and canonical ordering everywhere in the crate.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};
use crate::types::Value;

/// The kind of a term. The declaration order is the order used in term keys.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TermKind {
    Anonymous,
    Boolean,
    Categorical,
    Numerical,
}

impl TermKind {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// The shape-specific content of a [`Term`].
#[derive(Debug, Clone)]
pub enum Shape {
    Boolean,
    Categorical(BTreeSet<String>),
    Numerical { lo: f64, hi: f64 },
    Anonymous { kind: Option<TermKind>, expr: Option<String> },
}

/// The set of values accepted by a term or literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueRange {
    /// A Boolean column accepting cells equal to the flag.
    Bool(bool),
    Categories(BTreeSet<String>),
    Interval(f64, f64),
}

/// An atomic predicate on a single column.
///
/// # Invariants
///
/// - A categorical term has at least one category
/// - A numerical term has `lo <= hi`, no NaN bound, and at most one infinite bound
#[derive(Debug, Clone)]
pub struct Term {
    col: usize,
    shape: Shape,
}

impl Term {
    pub fn boolean(col: usize) -> Self {
        Term { col, shape: Shape::Boolean }
    }

    /// Creates a categorical membership term.
    ///
    /// Returns [`Error::EmptyCategories`] if `cats` yields nothing.
    pub fn categorical<I, S>(col: usize, cats: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cats: BTreeSet<String> = cats.into_iter().map(Into::into).collect();
        if cats.is_empty() {
            return Err(Error::EmptyCategories { col });
        }
        Ok(Term {
            col,
            shape: Shape::Categorical(cats),
        })
    }

    /// Creates a numerical interval term `lo <= v <= hi`.
    ///
    /// Returns [`Error::InvalidBounds`] if a bound is NaN, if both bounds are infinite,
    /// or if `lo > hi`.
    pub fn numerical(col: usize, lo: f64, hi: f64) -> Result<Self> {
        let invalid = lo.is_nan() || hi.is_nan() || (lo.is_infinite() && hi.is_infinite()) || lo > hi;
        if invalid {
            return Err(Error::InvalidBounds { col, lo, hi });
        }
        Ok(Term {
            col,
            shape: Shape::Numerical { lo, hi },
        })
    }

    /// Creates a placeholder term with no target kind.
    pub fn anonymous(col: usize) -> Self {
        Term {
            col,
            shape: Shape::Anonymous { kind: None, expr: None },
        }
    }

    /// Creates a placeholder term that is meant to become a term of `kind`.
    pub fn anonymous_of(col: usize, kind: TermKind) -> Self {
        let kind = (kind != TermKind::Anonymous).then_some(kind);
        Term {
            col,
            shape: Shape::Anonymous { kind, expr: None },
        }
    }

    /// Creates a placeholder term carrying a nested expression.
    pub fn expression(col: usize, expr: impl Into<String>) -> Self {
        Term {
            col,
            shape: Shape::Anonymous {
                kind: None,
                expr: Some(expr.into()),
            },
        }
    }

    pub fn col(&self) -> usize {
        self.col
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn kind(&self) -> TermKind {
        match self.shape {
            Shape::Boolean => TermKind::Boolean,
            Shape::Categorical(_) => TermKind::Categorical,
            Shape::Numerical { .. } => TermKind::Numerical,
            Shape::Anonymous { .. } => TermKind::Anonymous,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self.shape, Shape::Anonymous { .. })
    }

    /// Returns the interval bounds of a numerical term.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self.shape {
            Shape::Numerical { lo, hi } => Some((lo, hi)),
            _ => None,
        }
    }

    /// Returns the category set of a categorical term.
    pub fn categories(&self) -> Option<&BTreeSet<String>> {
        match &self.shape {
            Shape::Categorical(cats) => Some(cats),
            _ => None,
        }
    }

    pub fn is_lower_bounded(&self) -> bool {
        matches!(self.shape, Shape::Numerical { lo, .. } if lo.is_finite())
    }

    pub fn is_upper_bounded(&self) -> bool {
        matches!(self.shape, Shape::Numerical { hi, .. } if hi.is_finite())
    }

    /// Returns the set of values this term accepts.
    ///
    /// A Boolean term degenerates to `Bool(true)`. Anonymous terms have no range.
    pub fn value_range(&self) -> Option<ValueRange> {
        match &self.shape {
            Shape::Boolean => Some(ValueRange::Bool(true)),
            Shape::Categorical(cats) => Some(ValueRange::Categories(cats.clone())),
            Shape::Numerical { lo, hi } => Some(ValueRange::Interval(*lo, *hi)),
            Shape::Anonymous { .. } => None,
        }
    }

    /// Evaluates the term on a single cell.
    ///
    /// Numerical and Boolean terms accept Boolean and numeric cells interchangeably
    /// (`true` is `1.0`). NaN never satisfies a term. Anonymous terms are always false.
    pub fn truth_eval(&self, value: Value<'_>) -> bool {
        match (&self.shape, value) {
            (Shape::Boolean, Value::Bool(b)) => b,
            (Shape::Boolean, Value::Num(x)) => !x.is_nan() && x != 0.0,
            (Shape::Categorical(cats), Value::Cat(c)) => cats.contains(c),
            (Shape::Numerical { lo, hi }, Value::Num(x)) => *lo <= x && x <= *hi,
            (Shape::Numerical { lo, hi }, Value::Bool(b)) => {
                let x = if b { 1.0 } else { 0.0 };
                *lo <= x && x <= *hi
            }
            _ => false,
        }
    }

    /// Returns the interval covering the opposite unbounded side of a one-sided
    /// numerical term, sharing its finite bound.
    pub fn complement(&self) -> Option<Term> {
        match self.shape {
            Shape::Numerical { lo, hi } if lo.is_infinite() => Some(Term {
                col: self.col,
                shape: Shape::Numerical { lo: hi, hi: f64::INFINITY },
            }),
            Shape::Numerical { lo, hi } if hi.is_infinite() => Some(Term {
                col: self.col,
                shape: Shape::Numerical {
                    lo: f64::NEG_INFINITY,
                    hi: lo,
                },
            }),
            _ => None,
        }
    }

    /// Returns true if `other` is the algebraic complement of this term.
    pub fn is_complement(&self, other: &Term) -> bool {
        if self.col != other.col {
            return false;
        }
        match (&self.shape, &other.shape) {
            (Shape::Numerical { lo: l0, hi: h0 }, Shape::Numerical { lo: l1, hi: h1 }) => {
                (l0.is_infinite() && h1.is_infinite() && l1 == h0) || (l1.is_infinite() && h0.is_infinite() && l0 == h1)
            }
            _ => false,
        }
    }

    /// Returns a term on the same column re-ranged to `range`.
    ///
    /// An anonymous term with a target kind resolves into a concrete term of that kind.
    /// Returns [`Error::NotAdjustable`] if the range does not fit the (target) kind, and
    /// the construction errors of the concrete kind if the range itself is invalid.
    pub fn adjusted(&self, range: &ValueRange) -> Result<Term> {
        let kind = match &self.shape {
            Shape::Anonymous { kind: Some(kind), .. } => *kind,
            Shape::Anonymous { kind: None, .. } => return Err(Error::NotAdjustable { col: self.col }),
            _ => self.kind(),
        };
        match (kind, range) {
            (TermKind::Boolean, ValueRange::Bool(_)) => Ok(Term::boolean(self.col)),
            (TermKind::Categorical, ValueRange::Categories(cats)) => Term::categorical(self.col, cats.iter().cloned()),
            (TermKind::Numerical, ValueRange::Interval(lo, hi)) => Term::numerical(self.col, *lo, *hi),
            _ => Err(Error::NotAdjustable { col: self.col }),
        }
    }

    /// Returns the total-order key of this term.
    pub fn key(&self) -> TermKey<'_> {
        let disc = match &self.shape {
            Shape::Boolean => Discriminator::None,
            Shape::Categorical(cats) => Discriminator::Categories(cats.len(), cats),
            Shape::Numerical { lo, hi } => Discriminator::Bounds(TotalF64(*lo), TotalF64(*hi)),
            Shape::Anonymous { kind, expr } => Discriminator::Anonymous(*kind, expr.as_deref()),
        };
        TermKey {
            col: self.col,
            kind: self.kind(),
            disc,
        }
    }
}

/// Ordering and hashing key of a [`Term`]: `(column, kind, discriminator)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermKey<'a> {
    pub col: usize,
    pub kind: TermKind,
    disc: Discriminator<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Discriminator<'a> {
    None,
    Categories(usize, &'a BTreeSet<String>),
    Bounds(TotalF64, TotalF64),
    Anonymous(Option<TermKind>, Option<&'a str>),
}

/// An `f64` ordered by `total_cmp`, with `-0.0` identified with `0.0`.
#[derive(Debug, Copy, Clone)]
struct TotalF64(f64);

impl TotalF64 {
    fn normalized(self) -> f64 {
        if self.0 == 0.0 {
            0.0
        } else {
            self.0
        }
    }
}

impl PartialEq for TotalF64 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TotalF64 {}

impl PartialOrd for TotalF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized().total_cmp(&other.normalized())
    }
}

impl Hash for TotalF64 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().to_bits().hash(state);
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Term {}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
