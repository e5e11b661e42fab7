//! Boolean queries in alternating-operator normal form.
//!
//! A [`Query`] stores one operator at its root and a bucket of children. A child is
//! either a [`Literal`] or a nested bucket with no operator of its own: the operator
//! effective at nesting depth `d` is the root operator if `d` is even and its dual if
//! `d` is odd. Only formulas expressible under this alternation are representable;
//! other formulas are brought into shape by [`Query::algebraic_normalize`].
//!
//! A bucket may also contain a mass-negation marker ([`Node::Neg`]) meaning "the
//! whole bucket is negated". [`Query::push_negation`] eliminates markers.
//!
//! Every transformation consumes or borrows a query and returns a new one; queries
//! are never edited in place behind a shared handle.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::dataset::Dataset;
use crate::literal::Literal;
use crate::rowset::RowSet;
use crate::term::Term;
use crate::types::{Op, Side, Value};

/// An element of a query bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Node {
    Leaf(Literal),
    Group(Vec<Node>),
    /// Mass-negation marker for the enclosing bucket.
    Neg,
}

impl Node {
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Node::Leaf(l) => Some(l),
            _ => None,
        }
    }

    fn size(&self, exclude_anonymous: bool) -> usize {
        match self {
            Node::Leaf(l) => usize::from(!(exclude_anonymous && l.is_anonymous())),
            Node::Group(children) => children.iter().map(|c| c.size(exclude_anonymous)).sum(),
            Node::Neg => 0,
        }
    }

    fn depth(&self) -> usize {
        match self {
            Node::Leaf(_) => 1,
            Node::Group(children) => 1 + children.iter().map(Node::depth).max().unwrap_or(0),
            Node::Neg => 0,
        }
    }

    fn collect_literals<'a>(&'a self, path: &mut Vec<usize>, out: &mut Vec<(Vec<usize>, &'a Literal)>) {
        match self {
            Node::Leaf(l) => out.push((path.clone(), l)),
            Node::Group(children) => {
                for (i, c) in children.iter().enumerate() {
                    path.push(i);
                    c.collect_literals(path, out);
                    path.pop();
                }
            }
            Node::Neg => {}
        }
    }
}

/// Structural position of an element: child indices from the root bucket down.
pub type Path = Vec<usize>;

/// Per-literal `(support, missing)` sets memoized across several query evaluations
/// on the same side.
pub type LiteralCache = HashMap<Literal, (RowSet, RowSet)>;

/// A Boolean formula over literals with a root operator and alternating nesting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    op: Op,
    buk: Vec<Node>,
}

impl Default for Query {
    fn default() -> Self {
        Self::empty()
    }
}

impl Query {
    /// Creates a query from a root operator and its bucket.
    ///
    /// The operator of a query made of at most one literal carries no meaning and
    /// is canonicalized to `And`.
    pub fn new(op: Op, buk: Vec<Node>) -> Self {
        Query { op, buk }.settled()
    }

    pub fn empty() -> Self {
        Query { op: Op::And, buk: Vec::new() }
    }

    pub fn literal(literal: Literal) -> Self {
        Query {
            op: Op::And,
            buk: vec![Node::Leaf(literal)],
        }
    }

    pub fn conjunction(literals: impl IntoIterator<Item = Literal>) -> Self {
        Self::new(Op::And, literals.into_iter().map(Node::Leaf).collect())
    }

    pub fn disjunction(literals: impl IntoIterator<Item = Literal>) -> Self {
        Self::new(Op::Or, literals.into_iter().map(Node::Leaf).collect())
    }

    fn settled(mut self) -> Self {
        let trivial = match self.buk.as_slice() {
            [] => true,
            [Node::Leaf(_)] => true,
            _ => false,
        };
        if trivial {
            self.op = Op::And;
        }
        self
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn nodes(&self) -> &[Node] {
        &self.buk
    }

    /// Returns the operator effective at nesting depth `depth` (0 is the root bucket).
    pub fn op_at(&self, depth: usize) -> Op {
        self.op.at_depth(depth)
    }

    /// Number of literal leaves, optionally skipping anonymous ones.
    pub fn size(&self, exclude_anonymous: bool) -> usize {
        self.buk.iter().map(|n| n.size(exclude_anonymous)).sum()
    }

    pub fn len(&self) -> usize {
        self.size(false)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Depth of the deepest literal; literals of the root bucket are at depth 1.
    pub fn max_depth(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        self.buk.iter().map(Node::depth).max().unwrap_or(0)
    }

    pub fn uses_or(&self) -> bool {
        self.max_depth() > 1 || (self.len() > 1 && self.op.is_or())
    }

    pub fn uses_and(&self) -> bool {
        self.max_depth() > 1 || (self.len() > 1 && self.op.is_and())
    }

    /// All literals with their structural positions, in depth-first order.
    pub fn literal_paths(&self) -> Vec<(Path, &Literal)> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        for (i, n) in self.buk.iter().enumerate() {
            path.push(i);
            n.collect_literals(&mut path, &mut out);
            path.pop();
        }
        out
    }

    pub fn literals(&self) -> Vec<&Literal> {
        self.literal_paths().into_iter().map(|(_, l)| l).collect()
    }

    pub fn contains_anonymous(&self) -> bool {
        self.literals().iter().any(|l| l.is_anonymous())
    }

    pub fn inv_cols(&self, exclude_anonymous: bool) -> BTreeSet<usize> {
        self.literals()
            .into_iter()
            .filter(|l| !(exclude_anonymous && l.is_anonymous()))
            .map(Literal::col)
            .collect()
    }

    pub fn inv_literals(&self, exclude_anonymous: bool) -> BTreeSet<Literal> {
        self.literals()
            .into_iter()
            .filter(|l| !(exclude_anonymous && l.is_anonymous()))
            .cloned()
            .collect()
    }

    pub fn inv_terms(&self, exclude_anonymous: bool) -> BTreeSet<Term> {
        self.literals()
            .into_iter()
            .filter(|l| !(exclude_anonymous && l.is_anonymous()))
            .map(|l| l.term().clone())
            .collect()
    }

    /// Eliminates every mass-negation marker.
    ///
    /// A marker in a bucket flips the sign of every literal below it, at all depths.
    /// Under the alternation invariant this is De Morgan applied at every level: a
    /// negated nested bucket takes its parent's operator and is spliced into it, and
    /// a marker in the root bucket flips the root operator.
    pub fn push_negation(self) -> Query {
        if self.is_empty() {
            return self;
        }
        let (flipped, buk) = push_bucket(self.buk, false);
        let op = if flipped { self.op.dual() } else { self.op };
        Query::new(op, buk)
    }

    /// Returns the logical negation of this query, with no marker left.
    pub fn negate(&self) -> Query {
        if self.is_empty() {
            return self.clone();
        }
        let mut buk = self.buk.clone();
        match buk.iter().position(|n| matches!(n, Node::Neg)) {
            Some(i) => {
                buk.remove(i);
            }
            None => buk.insert(0, Node::Neg),
        }
        Query { op: self.op, buk }.push_negation()
    }

    /// Evaluates the query with `eval` deciding every literal. The empty query is true.
    pub fn eval_with<F>(&self, mut eval: F) -> bool
    where
        F: FnMut(&Literal) -> bool,
    {
        if self.is_empty() {
            return true;
        }
        let pushed = self.clone().push_negation();
        eval_bucket(&pushed.buk, pushed.op, &mut eval)
    }

    /// Evaluates the query on one assignment of column values.
    ///
    /// A literal whose column has no value is false, whatever its sign.
    pub fn truth_eval(&self, values: &HashMap<usize, Value<'_>>) -> bool {
        self.eval_with(|lit| values.get(&lit.col()).map_or(false, |v| lit.truth_eval(*v)))
    }

    /// Computes the `(support, missing)` row sets of this query on `side` of `data`.
    ///
    /// Children are combined with three-valued logic. For OR a row is supported if some
    /// child supports it, and missing if it is not supported but some child is missing
    /// it. For AND a row is supported if every child supports it, and missing if it is
    /// not supported but every child supports or misses it.
    ///
    /// An empty query or one involving anonymous terms yields two empty sets.
    pub fn support_and_missing<D: Dataset + ?Sized>(&self, side: Side, data: &D) -> (RowSet, RowSet) {
        let mut cache = LiteralCache::new();
        self.support_and_missing_cached(side, data, &mut cache)
    }

    /// Same as [`support_and_missing`](Self::support_and_missing), reusing and filling
    /// `cache` for per-literal sets.
    pub fn support_and_missing_cached<D: Dataset + ?Sized>(
        &self,
        side: Side,
        data: &D,
        cache: &mut LiteralCache,
    ) -> (RowSet, RowSet) {
        if self.is_empty() || self.contains_anonymous() {
            return (RowSet::new(), RowSet::new());
        }
        let pushed = self.clone().push_negation();
        let mut lookup = |lit: &Literal| -> (RowSet, RowSet) {
            if let Some(sm) = cache.get(lit) {
                return sm.clone();
            }
            let sm = data.support_and_missing(side, lit);
            cache.insert(lit.clone(), sm.clone());
            sm
        };
        support_bucket(&pushed.buk, pushed.op, &mut lookup)
    }

    /// Collapses every bucket left with exactly one child into that child.
    ///
    /// A bucket whose only child is itself a bucket is spliced into its parent, since
    /// the grandchild has the parent's effective operator. When this happens at the
    /// root, the root operator flips. Empty buckets disappear.
    pub fn unfold(self) -> Query {
        match unfold_node(Node::Group(self.buk)) {
            Unfolded::Gone => Query::empty(),
            Unfolded::Keep(Node::Group(buk)) => Query::new(self.op, buk),
            Unfolded::Keep(node) => Query::new(self.op, vec![node]),
            Unfolded::Splice(buk) => Query::new(self.op.dual(), buk),
        }
    }

    /// Removes the elements at the given positions, then [`unfold`](Self::unfold)s.
    ///
    /// Paths that do not address an element are ignored.
    pub fn minus_indices(&self, paths: &[Path]) -> Query {
        let mut sorted: Vec<&Path> = paths.iter().collect();
        sorted.sort();
        sorted.dedup();
        let mut buk = self.buk.clone();
        for path in sorted.into_iter().rev() {
            remove_at(&mut buk, path);
        }
        Query { op: self.op, buk }.unfold()
    }

    pub fn minus_index(&self, path: &[usize]) -> Query {
        self.minus_indices(&[path.to_vec()])
    }

    /// Every query obtained by dropping exactly one literal, with the dropped position.
    pub fn minus_one_literal(&self) -> Vec<(Path, Query)> {
        self.literal_paths()
            .into_iter()
            .map(|(path, _)| {
                let q = self.minus_index(&path);
                (path, q)
            })
            .collect()
    }

    /// Drops all anonymous literals, returning the reduced query and what was dropped.
    pub fn minus_anonymous(&self) -> (Query, Vec<(Path, Literal)>) {
        let all = self.literal_paths();
        let dropped: Vec<(Path, Literal)> = all
            .iter()
            .filter(|(_, l)| l.is_anonymous())
            .map(|(p, l)| (p.clone(), (*l).clone()))
            .collect();
        if dropped.is_empty() {
            return (self.clone(), dropped);
        }
        if dropped.len() == all.len() {
            return (Query::empty(), dropped);
        }
        let paths: Vec<Path> = dropped.iter().map(|(p, _)| p.clone()).collect();
        (self.minus_indices(&paths), dropped)
    }

    /// Appends `literal` under operator `op`.
    ///
    /// On a query with fewer than two literals the root operator becomes `op`. If the
    /// root operator differs from `op`, the current bucket is nested one level down
    /// under the flipped operator: `[old_bucket, literal]`. The root bucket comes
    /// back [`sorted`](Self::sorted).
    pub fn extend(self, op: Op, literal: Literal) -> Query {
        let mut buk = self.buk;
        let size = buk.iter().map(|n| n.size(false)).sum::<usize>();
        let new_op = if size == 0 {
            buk.push(Node::Leaf(literal));
            self.op
        } else if size == 1 || op == self.op {
            buk.push(Node::Leaf(literal));
            op
        } else {
            buk = vec![Node::Group(buk), Node::Leaf(literal)];
            self.op.dual()
        };
        Query::new(new_op, buk).sorted()
    }

    /// Returns the query with its root bucket ordered: nested buckets first, then
    /// literals by column. The sort is stable.
    pub fn sorted(&self) -> Query {
        let mut buk = self.buk.clone();
        buk.sort_by_key(|n| match n {
            Node::Neg => (0, 0),
            Node::Group(_) => (1, 0),
            Node::Leaf(l) => (2, l.col()),
        });
        Query { op: self.op, buk }
    }

    /// Returns the query with every bucket recursively ordered by its smallest literal.
    pub fn reordered(&self) -> Query {
        let (_, buk) = reorder_bucket(self.buk.clone());
        Query { op: self.op, buk }
    }

    /// Canonical comparison; `Less` means `self` is the preferred (simpler) query.
    ///
    /// Tie-breaks in order: fewer literals, fewer root children, `And` before `Or` at
    /// the root, involved columns, involved literals, then structure.
    pub fn compare(&self, other: &Query) -> Ordering {
        self.len()
            .cmp(&other.len())
            .then_with(|| self.buk.len().cmp(&other.buk.len()))
            .then_with(|| self.op.cmp(&other.op))
            .then_with(|| self.inv_cols(false).cmp(&other.inv_cols(false)))
            .then_with(|| self.inv_literals(false).cmp(&other.inv_literals(false)))
            .then_with(|| self.buk.cmp(&other.buk))
    }

    /// Compares two query pairs `(x0, x1)` and `(y0, y1)`; `Less` prefers the x pair.
    ///
    /// Tie-breaks in order: total literal count, total root children, the larger of the
    /// two literal counts (more balanced wins), the larger of the two root child counts,
    /// left operator, right operator, left columns, right columns.
    pub fn compare_pair(x0: &Query, x1: &Query, y0: &Query, y1: &Query) -> Ordering {
        (x0.len() + x1.len())
            .cmp(&(y0.len() + y1.len()))
            .then_with(|| (x0.buk.len() + x1.buk.len()).cmp(&(y0.buk.len() + y1.buk.len())))
            .then_with(|| x0.len().max(x1.len()).cmp(&y0.len().max(y1.len())))
            .then_with(|| x0.buk.len().max(x1.buk.len()).cmp(&y0.buk.len().max(y1.buk.len())))
            .then_with(|| x0.op.cmp(&y0.op))
            .then_with(|| x1.op.cmp(&y1.op))
            .then_with(|| x0.inv_cols(false).cmp(&y0.inv_cols(false)))
            .then_with(|| x1.inv_cols(false).cmp(&y1.inv_cols(false)))
            .then_with(|| x0.compare(y0))
            .then_with(|| x1.compare(y1))
    }
}

impl PartialOrd for Query {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Query {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl From<Literal> for Query {
    fn from(literal: Literal) -> Self {
        Query::literal(literal)
    }
}

fn push_bucket(nodes: Vec<Node>, flip: bool) -> (bool, Vec<Node>) {
    let markers = nodes.iter().filter(|n| matches!(n, Node::Neg)).count();
    let now_flip = markers % 2 == 1;
    let flip_here = flip ^ now_flip;
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Neg => {}
            Node::Leaf(l) => out.push(Node::Leaf(if flip_here { -l } else { l })),
            Node::Group(children) => {
                let (spliced, res) = push_bucket(children, flip_here);
                if spliced {
                    out.extend(res);
                } else {
                    out.push(Node::Group(res));
                }
            }
        }
    }
    (now_flip, out)
}

fn eval_bucket<F>(nodes: &[Node], op: Op, eval: &mut F) -> bool
where
    F: FnMut(&Literal) -> bool,
{
    let mut values = nodes.iter().filter_map(|n| match n {
        Node::Leaf(l) => Some(eval(l)),
        Node::Group(children) => Some(eval_bucket(children, op.dual(), eval)),
        Node::Neg => None,
    });
    match op {
        Op::Or => values.any(|v| v),
        Op::And => values.all(|v| v),
    }
}

fn support_bucket<F>(nodes: &[Node], op: Op, lookup: &mut F) -> (RowSet, RowSet)
where
    F: FnMut(&Literal) -> (RowSet, RowSet),
{
    let parts: Vec<(RowSet, RowSet)> = nodes
        .iter()
        .filter_map(|n| match n {
            Node::Leaf(l) => Some(lookup(l)),
            Node::Group(children) => Some(support_bucket(children, op.dual(), lookup)),
            Node::Neg => None,
        })
        .collect();
    combine_parts(op, parts)
}

/// Combines children `(support, missing)` pairs under `op` with three-valued logic.
pub(crate) fn combine_parts(op: Op, parts: Vec<(RowSet, RowSet)>) -> (RowSet, RowSet) {
    let mut iter = parts.into_iter();
    let Some((mut supp, mut miss)) = iter.next() else {
        return (RowSet::new(), RowSet::new());
    };
    match op {
        Op::Or => {
            for (s, m) in iter {
                supp = &supp | &s;
                miss = &miss | &m;
            }
            miss = &miss - &supp;
        }
        Op::And => {
            let mut reach = &supp | &miss;
            for (s, m) in iter {
                reach = &reach & &(&s | &m);
                supp = &supp & &s;
            }
            miss = &reach - &supp;
        }
    }
    (supp, miss)
}

enum Unfolded {
    Gone,
    Keep(Node),
    Splice(Vec<Node>),
}

fn unfold_node(node: Node) -> Unfolded {
    match node {
        Node::Group(children) => {
            let mut out = Vec::with_capacity(children.len());
            for child in children {
                match unfold_node(child) {
                    Unfolded::Gone => {}
                    Unfolded::Keep(n) => out.push(n),
                    Unfolded::Splice(inner) => out.extend(inner),
                }
            }
            match out.len() {
                0 => Unfolded::Gone,
                1 => match out.pop() {
                    Some(Node::Group(inner)) => Unfolded::Splice(inner),
                    Some(n) => Unfolded::Keep(n),
                    None => Unfolded::Gone,
                },
                _ => Unfolded::Keep(Node::Group(out)),
            }
        }
        other => Unfolded::Keep(other),
    }
}

fn remove_at(nodes: &mut Vec<Node>, path: &[usize]) {
    match path {
        [] => {}
        [i] => {
            if *i < nodes.len() {
                nodes.remove(*i);
            }
        }
        [i, rest @ ..] => {
            if let Some(Node::Group(children)) = nodes.get_mut(*i) {
                remove_at(children, rest);
            }
        }
    }
}

fn reorder_bucket(nodes: Vec<Node>) -> (Option<Literal>, Vec<Node>) {
    let mut keyed: Vec<(Option<Literal>, bool, Node)> = nodes
        .into_iter()
        .map(|n| match n {
            Node::Neg => (None, true, Node::Neg),
            Node::Leaf(l) => (Some(l.clone()), false, Node::Leaf(l)),
            Node::Group(children) => {
                let (key, sorted) = reorder_bucket(children);
                (key, false, Node::Group(sorted))
            }
        })
        .collect();
    // Markers first, then by smallest literal.
    keyed.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let first = keyed.iter().find_map(|(k, _, _)| k.clone());
    (first, keyed.into_iter().map(|(_, _, n)| n).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn b(col: usize) -> Literal {
        Literal::positive(Term::boolean(col))
    }

    fn assignments(n: usize) -> impl Iterator<Item = HashMap<usize, Value<'static>>> {
        (0..1u32 << n).map(move |mask| (0..n).map(|c| (c, Value::Bool(mask >> c & 1 == 1))).collect())
    }

    fn equivalent(q0: &Query, q1: &Query, n: usize) -> bool {
        assignments(n).all(|a| q0.truth_eval(&a) == q1.truth_eval(&a))
    }

    #[test]
    fn test_size_and_depth() {
        let q = Query::new(
            Op::Or,
            vec![
                Node::Group(vec![Node::Leaf(b(0)), Node::Leaf(b(1))]),
                Node::Leaf(Literal::positive(Term::anonymous(2))),
            ],
        );
        assert_eq!(q.len(), 3);
        assert_eq!(q.size(true), 2);
        assert_eq!(q.max_depth(), 2);
        assert!(q.uses_or());
        assert!(q.uses_and());
        assert!(q.contains_anonymous());
        assert_eq!(q.inv_cols(true), BTreeSet::from([0, 1]));
    }

    #[test]
    fn test_single_literal_op_is_canonical() {
        let q = Query::new(Op::Or, vec![Node::Leaf(b(0))]);
        assert_eq!(q.op(), Op::And);
        assert_eq!(q, Query::literal(b(0)));
    }

    #[test]
    fn test_empty_query_is_true() {
        let q = Query::empty();
        assert!(q.truth_eval(&HashMap::new()));
        assert_eq!(q.max_depth(), 0);
    }

    #[test]
    fn test_missing_column_is_false() {
        let q = Query::literal(-b(0));
        assert!(!q.truth_eval(&HashMap::new()));
    }

    #[test]
    fn test_push_negation_root() {
        // !(v0 & v1) == !v0 | !v1
        let q = Query::new(Op::And, vec![Node::Neg, Node::Leaf(b(0)), Node::Leaf(b(1))]);
        let p = q.clone().push_negation();
        assert_eq!(p, Query::disjunction([-b(0), -b(1)]));
        assert!(equivalent(&q, &p, 2));
        assert_eq!(p.clone().push_negation(), p);
    }

    #[test]
    fn test_push_negation_nested_splices() {
        // v0 | !(v1 | v2) under root Or: the nested bucket is an AND, so the marker
        // makes it an OR of negations, spliced into the root.
        let q = Query::new(
            Op::Or,
            vec![
                Node::Leaf(b(0)),
                Node::Group(vec![Node::Neg, Node::Leaf(b(1)), Node::Leaf(b(2))]),
            ],
        );
        let p = q.clone().push_negation();
        assert_eq!(p, Query::disjunction([b(0), -b(1), -b(2)]));
        assert!(equivalent(&q, &p, 3));
    }

    #[test]
    fn test_negate_involution() {
        let q = Query::new(
            Op::Or,
            vec![
                Node::Group(vec![Node::Leaf(b(0)), Node::Leaf(-b(1))]),
                Node::Leaf(b(2)),
            ],
        );
        let n = q.negate();
        assert!(assignments(3).all(|a| n.truth_eval(&a) != q.truth_eval(&a)));
        assert_eq!(n.negate(), q);
    }

    #[test]
    fn test_extend() {
        let q = Query::empty().extend(Op::Or, b(0));
        assert_eq!(q.op(), Op::And);
        let q = q.extend(Op::Or, b(1));
        assert_eq!(q, Query::disjunction([b(0), b(1)]));
        let q = q.extend(Op::Or, b(2));
        assert_eq!(q.len(), 3);
        let q = q.extend(Op::And, b(3));
        assert_eq!(q.op(), Op::And);
        assert_eq!(q.nodes().len(), 2);
        assert_eq!(q.max_depth(), 2);
        // (v0 | v1 | v2) & v3
        let expected = |a: &HashMap<usize, Value<'_>>| {
            let t = |c: usize| a[&c] == Value::Bool(true);
            (t(0) || t(1) || t(2)) && t(3)
        };
        assert!(assignments(4).all(|a| q.truth_eval(&a) == expected(&a)));
    }

    #[test]
    fn test_extend_keeps_bucket_sorted() {
        let q = Query::literal(b(3)).extend(Op::Or, b(1));
        assert_eq!(q.nodes(), &[Node::Leaf(b(1)), Node::Leaf(b(3))]);
        let q = q.extend(Op::Or, b(0));
        assert_eq!(q.nodes()[0], Node::Leaf(b(0)));
        let q = q.extend(Op::And, b(2));
        assert!(matches!(q.nodes(), [Node::Group(_), Node::Leaf(l)] if *l == b(2)));
        assert_eq!(q, q.sorted());
    }

    #[test]
    fn test_minus_index_unfolds() {
        // (v0 & v1) | v2, drop v2 -> v0 & v1 with flipped root
        let q = Query::new(
            Op::Or,
            vec![
                Node::Group(vec![Node::Leaf(b(0)), Node::Leaf(b(1))]),
                Node::Leaf(b(2)),
            ],
        );
        let r = q.minus_index(&[1]);
        assert_eq!(r, Query::conjunction([b(0), b(1)]));
        let r = q.minus_index(&[0, 1]);
        assert_eq!(r, Query::disjunction([b(0), b(2)]));
        let r = q.minus_indices(&[vec![0, 0], vec![0, 1]]);
        assert_eq!(r, Query::literal(b(2)));
        assert_eq!(q.minus_one_literal().len(), 3);
    }

    #[test]
    fn test_minus_anonymous() {
        let anon = Literal::positive(Term::anonymous(5));
        let q = Query::conjunction([b(0), anon.clone(), b(1)]);
        let (r, dropped) = q.minus_anonymous();
        assert_eq!(r, Query::conjunction([b(0), b(1)]));
        assert_eq!(dropped, vec![(vec![1], anon.clone())]);
        let (r, dropped) = Query::literal(anon).minus_anonymous();
        assert!(r.is_empty());
        assert_eq!(dropped.len(), 1);
    }

    #[test]
    fn test_compare() {
        let short = Query::literal(b(5));
        let long = Query::conjunction([b(0), b(1)]);
        assert_eq!(short.compare(&long), Ordering::Less);
        let and = Query::conjunction([b(0), b(1)]);
        let or = Query::disjunction([b(0), b(1)]);
        assert_eq!(and.compare(&or), Ordering::Less);
        let low = Query::conjunction([b(0), b(1)]);
        let high = Query::conjunction([b(0), b(2)]);
        assert_eq!(low.compare(&high), Ordering::Less);
        assert_eq!(low.compare(&low.clone()), Ordering::Equal);
    }

    #[test]
    fn test_compare_pair_prefers_balance() {
        let one = Query::literal(b(0));
        let two = Query::conjunction([b(0), b(1)]);
        let three = Query::conjunction([b(0), b(1), b(2)]);
        // 2 + 2 beats 1 + 3
        assert_eq!(Query::compare_pair(&two, &two, &one, &three), Ordering::Less);
    }

    #[test]
    fn test_reordered() {
        let q = Query::new(
            Op::Or,
            vec![
                Node::Leaf(b(3)),
                Node::Group(vec![Node::Leaf(b(2)), Node::Leaf(b(1))]),
            ],
        );
        let r = q.reordered();
        assert_eq!(
            r.nodes(),
            &[Node::Group(vec![Node::Leaf(b(1)), Node::Leaf(b(2))]), Node::Leaf(b(3))]
        );
        let s = Query::disjunction([b(3), b(1)]).sorted();
        assert_eq!(s.nodes()[0], Node::Leaf(b(1)));
    }

    #[test]
    fn test_support_and_missing_nested() {
        use crate::dataset::{Column, Data};

        let (t, f) = (Some(true), Some(false));
        let mut data = Data::new(8);
        for (name, column) in [
            ("a", vec![t, t, t, t, None, f, t, None]),
            ("b", vec![t, f, None, f, t, t, None, None]),
            ("c", vec![t, f, f, None, f, t, t, t]),
        ] {
            data.add_column(Side::Left, name, Column::Boolean(column)).unwrap();
        }
        let rows = |v: &[usize]| v.iter().copied().collect::<RowSet>();

        // v0 & (v1 | ! v2)
        let q = Query::new(
            Op::And,
            vec![Node::Leaf(b(0)), Node::Group(vec![Node::Leaf(b(1)), Node::Leaf(-b(2))])],
        );
        let (supp, miss) = q.support_and_missing(Side::Left, &data);
        assert_eq!(supp, rows(&[0, 1, 2]));
        assert_eq!(miss, rows(&[3, 4, 6, 7]));

        // Negation swaps known-true and known-false rows, missing ones stay missing.
        let (supp, miss) = q.negate().support_and_missing(Side::Left, &data);
        assert_eq!(supp, rows(&[5]));
        assert_eq!(miss, rows(&[3, 4, 6, 7]));

        assert_eq!(q.support_and_missing(Side::Right, &data), (RowSet::new(), RowSet::new()));
    }

    #[test]
    fn test_combine_parts() {
        let s = |v: &[usize]| v.iter().copied().collect::<RowSet>();
        let parts = vec![(s(&[0, 1]), s(&[2])), (s(&[1, 3]), s(&[0, 2]))];
        let (supp, miss) = combine_parts(Op::Or, parts.clone());
        assert_eq!(supp, s(&[0, 1, 3]));
        assert_eq!(miss, s(&[2]));
        let (supp, miss) = combine_parts(Op::And, parts);
        assert_eq!(supp, s(&[1]));
        assert_eq!(miss, s(&[0, 2]));
    }
}
