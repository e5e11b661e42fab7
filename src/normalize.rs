//! Truth-table driven renormalization of queries.
//!
//! [`Query::truth_table`] enumerates every assignment of the distinct terms of a query
//! and keeps the accepted ones. A term and its numerical complement share one column,
//! so `x <= 3` and `3 <= x` are treated as negations of each other.
//!
//! [`Query::algebraic_normalize`] minimizes that table, compacts the surviving rows
//! with a [`QTree`] and reads the query back with accepting subtrees collapsed.

use crate::literal::Literal;
use crate::qtree::QTree;
use crate::query::Query;
use crate::term::Term;
use crate::truth_table::{Cell, TruthTable};

/// Widest table enumerated by [`Query::truth_table`].
pub const MAX_TABLE_TERMS: usize = 16;

/// Distinct terms of a query with complements merged, in term order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermIndex {
    terms: Vec<Term>,
}

impl TermIndex {
    pub fn from_literals<'a>(literals: impl IntoIterator<Item = &'a Literal>) -> Self {
        let mut terms: Vec<Term> = Vec::new();
        for lit in literals {
            let term = lit.term();
            let known = terms
                .iter()
                .any(|t| t == term || term.complement().as_ref() == Some(t));
            if !known {
                terms.push(term.clone());
            }
        }
        terms.sort();
        TermIndex { terms }
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Column of `literal` and whether it reads that column through a complement.
    pub fn locate(&self, literal: &Literal) -> Option<(usize, bool)> {
        let term = literal.term();
        if let Some(i) = self.terms.iter().position(|t| t == term) {
            return Some((i, false));
        }
        let c = term.complement()?;
        self.terms.iter().position(|t| *t == c).map(|i| (i, true))
    }

    /// Truth value of `literal` when column `i` is set to bit `i` of `assignment`.
    pub fn eval(&self, literal: &Literal, assignment: u32) -> bool {
        match self.locate(literal) {
            Some((i, via_complement)) => ((assignment >> i & 1 == 1) != via_complement) != literal.is_negated(),
            None => false,
        }
    }
}

impl Query {
    /// Table of all accepted assignments over the distinct terms of the query.
    ///
    /// Returns `None` if the query involves more than [`MAX_TABLE_TERMS`] terms.
    pub fn truth_table(&self) -> Option<(TruthTable, TermIndex)> {
        let q = self.clone().push_negation();
        let index = TermIndex::from_literals(q.literals());
        let n = index.len();
        if n > MAX_TABLE_TERMS {
            log::debug!("Not enumerating a truth table over {} terms", n);
            return None;
        }
        let mut table = TruthTable::new(n);
        for m in 0..1u32 << n {
            if q.eval_with(|lit| index.eval(lit, m)) {
                table.push_row((0..n).map(|i| Cell::from_bool(m >> i & 1 == 1)).collect());
            }
        }
        Some((table, index))
    }

    /// Rewrites the query through its minimized truth table.
    ///
    /// Returns the rewritten query and whether it differs from the input with its
    /// buckets reordered. Queries whose table is empty (unsatisfiable) or too wide to
    /// enumerate come back reordered and unchanged. A tautology becomes the empty
    /// query.
    pub fn algebraic_normalize(&self) -> (Query, bool) {
        let canonical = self.clone().push_negation().reordered();
        let Some((table, index)) = self.truth_table() else {
            return (canonical, false);
        };
        if table.n_rows() == 0 {
            log::debug!("Query {} is unsatisfiable, leaving it as is", canonical);
            return (canonical, false);
        }
        let table = table.simplify();
        let branches: Vec<Vec<Literal>> = table
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .zip(index.terms())
                    .filter(|(cell, _)| !cell.is_any())
                    .map(|(&cell, term)| Literal::new(term.clone(), cell == Cell::False))
                    .collect()
            })
            .collect();
        let normalized = if branches.iter().any(Vec::is_empty) {
            Query::empty()
        } else {
            QTree::build(&branches).simplified_query().reordered()
        };
        let changed = normalized != canonical;
        log::trace!("Normalized {} into {} (changed: {})", canonical, normalized, changed);
        (normalized, changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Node;
    use crate::types::{Op, Value};
    use std::collections::HashMap;
    use test_log::test;

    fn b(col: usize) -> Literal {
        Literal::positive(Term::boolean(col))
    }

    fn agree(q: &Query, r: &Query, n_cols: usize) -> bool {
        (0..1u32 << n_cols).all(|m| {
            let a: HashMap<usize, Value<'_>> = (0..n_cols).map(|c| (c, Value::Bool(m >> c & 1 == 1))).collect();
            q.truth_eval(&a) == r.truth_eval(&a)
        })
    }

    #[test]
    fn test_truth_table_rows() {
        let q = Query::disjunction([b(0), b(1)]);
        let (table, index) = q.truth_table().unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(table.to_values(), vec![vec![1, 0], vec![0, 1], vec![1, 1]]);
    }

    #[test]
    fn test_truth_table_merges_complements() {
        let le = Term::numerical(0, f64::NEG_INFINITY, 3.0).unwrap();
        let ge = le.complement().unwrap();
        let q = Query::disjunction([Literal::positive(le), Literal::positive(ge)]);
        let (table, index) = q.truth_table().unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(table.n_rows(), 2);
    }

    #[test]
    fn test_term_index_eval_signs() {
        let le = Term::numerical(0, f64::NEG_INFINITY, 3.0).unwrap();
        let ge = le.complement().unwrap();
        let index = TermIndex::from_literals(&[Literal::positive(le.clone()), b(1)]);
        assert_eq!(index.len(), 2);
        let col = index.locate(&Literal::positive(le.clone())).unwrap().0;
        let on = 1u32 << col;
        assert!(index.eval(&Literal::positive(le.clone()), on));
        assert!(!index.eval(&Literal::positive(le.clone()), 0));
        assert!(!index.eval(&Literal::negative(le), on));
        assert!(!index.eval(&Literal::positive(ge.clone()), on));
        assert!(index.eval(&Literal::positive(ge.clone()), 0));
        assert!(index.eval(&Literal::negative(ge.clone()), on));
        assert!(!index.eval(&Literal::negative(ge), 0));
        assert!(!index.eval(&b(7), on));
    }

    #[test]
    fn test_normalize_absorbs() {
        // v0 | v0 & v1  ==  v0
        let q = Query::new(Op::Or, vec![Node::Leaf(b(0)), Node::Group(vec![Node::Leaf(b(0)), Node::Leaf(b(1))])]);
        let (r, changed) = q.algebraic_normalize();
        assert!(changed);
        assert_eq!(r, Query::literal(b(0)));
    }

    #[test]
    fn test_normalize_factorizes() {
        // (v0 & v1) | (v0 & v2) | (v0 & v3)
        let q = Query::new(
            Op::Or,
            (1..4)
                .map(|c| Node::Group(vec![Node::Leaf(b(0)), Node::Leaf(b(c))]))
                .collect(),
        );
        let (r, _) = q.algebraic_normalize();
        assert!(agree(&q, &r, 4));
    }

    #[test]
    fn test_normalize_unchanged() {
        let q = Query::conjunction([b(0), b(1)]);
        let (r, changed) = q.algebraic_normalize();
        assert!(!changed);
        assert_eq!(r, q.reordered());
    }

    #[test]
    fn test_normalize_tautology() {
        let q = Query::disjunction([b(0), -b(0)]);
        let (r, changed) = q.algebraic_normalize();
        assert!(changed);
        assert!(r.is_empty());
    }

    #[test]
    fn test_normalize_unsatisfiable_kept() {
        let q = Query::conjunction([b(0), -b(0)]);
        let (r, changed) = q.algebraic_normalize();
        assert!(!changed);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn test_normalize_negated() {
        let q = Query::conjunction([b(0), b(1)]).negate();
        let (r, _) = q.algebraic_normalize();
        assert!(agree(&q, &r, 2));
    }

    #[test]
    fn test_normalize_empty() {
        let (r, changed) = Query::empty().algebraic_normalize();
        assert!(!changed);
        assert!(r.is_empty());
    }
}
