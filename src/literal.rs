use std::ops::Neg;

use crate::term::{Shape, Term, ValueRange};
use crate::types::Value;

/// A [`Term`] together with a negation flag.
///
/// Literals order by term key first, then by negation (positive before negative).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    term: Term,
    negated: bool,
}

impl Literal {
    pub fn new(term: Term, negated: bool) -> Self {
        Literal { term, negated }
    }

    pub fn positive(term: Term) -> Self {
        Self::new(term, false)
    }

    pub fn negative(term: Term) -> Self {
        Self::new(term, true)
    }

    pub fn term(&self) -> &Term {
        &self.term
    }

    pub fn into_term(self) -> Term {
        self.term
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn col(&self) -> usize {
        self.term.col()
    }

    pub fn is_anonymous(&self) -> bool {
        self.term.is_anonymous()
    }

    /// Returns the literal with the opposite sign.
    pub fn flip(&self) -> Self {
        Literal {
            term: self.term.clone(),
            negated: !self.negated,
        }
    }

    pub fn truth_eval(&self, value: Value<'_>) -> bool {
        self.term.truth_eval(value) != self.negated
    }

    /// Returns the accepted values, where a Boolean literal degenerates to `Bool(!negated)`.
    pub fn value_range(&self) -> Option<ValueRange> {
        match self.term.shape() {
            Shape::Boolean => Some(ValueRange::Bool(!self.negated)),
            _ => self.term.value_range(),
        }
    }

    /// Rewrites a negated one-sided numerical literal as its positive complement.
    pub fn positive_form(&self) -> Self {
        match (self.negated, self.term.complement()) {
            (true, Some(c)) => Literal::positive(c),
            _ => self.clone(),
        }
    }
}

impl Neg for Literal {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Literal {
            term: self.term,
            negated: !self.negated,
        }
    }
}

impl Neg for &Literal {
    type Output = Literal;

    fn neg(self) -> Self::Output {
        self.flip()
    }
}

impl From<Term> for Literal {
    fn from(term: Term) -> Self {
        Literal::positive(term)
    }
}
