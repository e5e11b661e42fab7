//! Greedy compaction of conjunctive branches into a shared decision structure.
//!
//! A [`QTree`] is built from a list of branches, each an AND of literals, whose OR is
//! the formula of interest. Construction repeatedly picks the term shared by the most
//! remaining branches, splits them into those using it positively ("yes"), those
//! using it negatively ("no") and those not mentioning it ("indifferent"), and
//! recurses. Indifferent branches are re-injected at the same parent slot. A term and
//! its numerical complement count as one candidate, with polarities merged.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. Node `0` is the root,
//! which carries no test: its "yes" slot holds the top-level splits.
//!
//! Reading back with [`QTree::get_query`] turns each accepting leaf into the
//! conjunction along its root path, and ORs those together.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::literal::Literal;
use crate::query::{Node, Query};
use crate::term::Term;
use crate::types::Op;

/// Index of a node in the [`QTree`] arena.
pub type NodeId = usize;

/// Which child list of a split a node hangs from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Slot {
    No,
    Yes,
}

impl Slot {
    pub const BOTH: [Slot; 2] = [Slot::No, Slot::Yes];

    pub fn index(self) -> usize {
        match self {
            Slot::No => 0,
            Slot::Yes => 1,
        }
    }
}

/// Label of a leaf. The order puts branch leaves first, then `Accept`, then `Reject`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum LeafLabel {
    /// End of the branch with this index in the input list.
    Branch(usize),
    /// Accepting leaf introduced by simplification.
    Accept,
    /// Sentinel for "no matching branch".
    Reject,
}

impl LeafLabel {
    pub fn accepts(self) -> bool {
        self != LeafLabel::Reject
    }
}

impl fmt::Display for LeafLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafLabel::Branch(b) => write!(f, "#{}", b),
            LeafLabel::Accept => write!(f, "+"),
            LeafLabel::Reject => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Root { children: [Vec<NodeId>; 2] },
    Split { term: Term, children: [Vec<NodeId>; 2] },
    Leaf(LeafLabel),
}

#[derive(Debug, Clone)]
pub struct QNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub slot: Slot,
    pub depth: usize,
}

/// Outcome of resolving a subtree during [`QTree::rec_simply`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum Resolved {
    Out,
    Mixed,
    In,
}

type Commons = BTreeMap<Term, [Vec<(usize, usize)>; 2]>;

/// Arena-backed decision structure over literals.
#[derive(Debug, Clone)]
pub struct QTree {
    nodes: Vec<QNode>,
    leaves: BTreeSet<NodeId>,
    max_depth: usize,
    /// First contradictory input branch, kept when no branch survives.
    unsat: Option<Vec<Literal>>,
}

impl QTree {
    pub const ROOT: NodeId = 0;

    fn with_root() -> Self {
        QTree {
            nodes: vec![QNode {
                kind: NodeKind::Root {
                    children: [Vec::new(), Vec::new()],
                },
                parent: None,
                slot: Slot::Yes,
                depth: 0,
            }],
            leaves: BTreeSet::new(),
            max_depth: 0,
            unsat: None,
        }
    }

    /// An empty tree: a single rejecting root leaf.
    pub fn empty() -> Self {
        let mut tree = Self::with_root();
        tree.nodes[Self::ROOT].kind = NodeKind::Leaf(LeafLabel::Reject);
        tree.leaves.insert(Self::ROOT);
        tree
    }

    /// Builds the tree for the OR of `branches`, each an AND of literals.
    ///
    /// A branch using a term with both polarities selects nothing and is dropped.
    pub fn build(branches: &[Vec<Literal>]) -> Self {
        if branches.is_empty() {
            return Self::empty();
        }
        let mut commons = Commons::new();
        for (bi, branch) in branches.iter().enumerate() {
            for (li, lit) in branch.iter().enumerate() {
                let (key, via_complement) = if commons.contains_key(lit.term()) {
                    (lit.term().clone(), false)
                } else {
                    match lit.term().complement() {
                        Some(c) if commons.contains_key(&c) => (c, true),
                        _ => (lit.term().clone(), false),
                    }
                };
                let yes = via_complement == lit.is_negated();
                let slot = if yes { Slot::Yes } else { Slot::No };
                commons.entry(key).or_default()[slot.index()].push((bi, li));
            }
        }
        let mut tree = Self::with_root();
        let mut dead = BTreeSet::new();
        tree.rec_tree((0..branches.len()).collect(), commons, Self::ROOT, Slot::Yes, &mut dead);
        if !dead.is_empty() {
            log::debug!("Dropped contradictory branches {:?}", dead);
            if tree.leaves.is_empty() {
                tree.unsat = dead.first().map(|&bi| branches[bi].clone());
            }
        }
        tree
    }

    fn rec_tree(&mut self, bids: Vec<usize>, commons: Commons, pid: NodeId, slot: Slot, dead: &mut BTreeSet<usize>) {
        // Most shared term first; ties go to the smallest term.
        let mut pick: Option<(&Term, usize)> = None;
        for (term, uses) in &commons {
            let count = uses[0].len() + uses[1].len();
            if pick.map_or(true, |(_, best)| count > best) {
                pick = Some((term, count));
            }
        }
        let Some((pick, _)) = pick else {
            return;
        };
        let pick = pick.clone();

        let mut to_no: BTreeSet<usize> = commons[&pick][0].iter().map(|v| v.0).collect();
        let mut to_yes: BTreeSet<usize> = commons[&pick][1].iter().map(|v| v.0).collect();
        let indifferent: Vec<usize> = bids
            .iter()
            .copied()
            .filter(|b| !to_no.contains(b) && !to_yes.contains(b))
            .collect();
        let both: Vec<usize> = to_no.intersection(&to_yes).copied().collect();
        for bi in both {
            to_no.remove(&bi);
            to_yes.remove(&bi);
            dead.insert(bi);
        }

        let mut split_commons: [Commons; 3] = Default::default();
        for (term, uses) in commons {
            if term == pick {
                continue;
            }
            let mut parts: [[Vec<(usize, usize)>; 2]; 3] = Default::default();
            for (yn, vs) in uses.into_iter().enumerate() {
                for v in vs {
                    if dead.contains(&v.0) {
                        continue;
                    }
                    let target = if to_no.contains(&v.0) {
                        0
                    } else if to_yes.contains(&v.0) {
                        1
                    } else {
                        2
                    };
                    parts[target][yn].push(v);
                }
            }
            for (target, part) in parts.into_iter().enumerate() {
                if !part[0].is_empty() || !part[1].is_empty() {
                    split_commons[target].insert(term.clone(), part);
                }
            }
        }
        let [no_commons, yes_commons, rest_commons] = split_commons;

        if !to_no.is_empty() || !to_yes.is_empty() {
            let tid = self.add_split(pid, slot, pick);
            for (s, sub, to) in [(Slot::No, no_commons, to_no), (Slot::Yes, yes_commons, to_yes)] {
                let to: Vec<usize> = to.into_iter().collect();
                if !sub.is_empty() {
                    self.rec_tree(to, sub, tid, s, dead);
                } else if !to.is_empty() {
                    self.add_branch_leaf(tid, s, &to);
                }
            }
        }
        if !rest_commons.is_empty() {
            self.rec_tree(indifferent, rest_commons, pid, slot, dead);
        } else if !indifferent.is_empty() {
            // Branches that ended above this split.
            self.add_branch_leaf(pid, slot, &indifferent);
        }
    }

    fn add_branch_leaf(&mut self, pid: NodeId, slot: Slot, bids: &[usize]) {
        if bids.len() > 1 {
            log::debug!("Branches {:?} all end at node {}, keeping the first", bids, pid);
        }
        if let Some(&first) = bids.iter().min() {
            self.add_leaf(pid, slot, LeafLabel::Branch(first));
        }
    }

    fn push_node(&mut self, pid: NodeId, slot: Slot, kind: NodeKind) -> NodeId {
        let tid = self.nodes.len();
        let depth = self.nodes[pid].depth + 1;
        self.nodes.push(QNode {
            kind,
            parent: Some(pid),
            slot,
            depth,
        });
        if let Some(children) = self.children_mut(pid) {
            children[slot.index()].push(tid);
        }
        self.max_depth = self.max_depth.max(depth);
        tid
    }

    fn add_split(&mut self, pid: NodeId, slot: Slot, term: Term) -> NodeId {
        self.push_node(
            pid,
            slot,
            NodeKind::Split {
                term,
                children: [Vec::new(), Vec::new()],
            },
        )
    }

    fn add_leaf(&mut self, pid: NodeId, slot: Slot, label: LeafLabel) -> NodeId {
        let tid = self.push_node(pid, slot, NodeKind::Leaf(label));
        self.leaves.insert(tid);
        tid
    }

    fn children_mut(&mut self, id: NodeId) -> Option<&mut [Vec<NodeId>; 2]> {
        match &mut self.nodes[id].kind {
            NodeKind::Root { children } | NodeKind::Split { children, .. } => Some(children),
            NodeKind::Leaf(_) => None,
        }
    }

    pub fn node(&self, id: NodeId) -> &QNode {
        &self.nodes[id]
    }

    /// Child list `slot` of a root or split node.
    pub fn children(&self, id: NodeId, slot: Slot) -> &[NodeId] {
        match &self.nodes[id].kind {
            NodeKind::Root { children } | NodeKind::Split { children, .. } => &children[slot.index()],
            NodeKind::Leaf(_) => &[],
        }
    }

    pub fn split_term(&self, id: NodeId) -> Option<&Term> {
        match &self.nodes[id].kind {
            NodeKind::Split { term, .. } => Some(term),
            _ => None,
        }
    }

    pub fn label(&self, id: NodeId) -> Option<LeafLabel> {
        match self.nodes[id].kind {
            NodeKind::Leaf(label) => Some(label),
            _ => None,
        }
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        matches!(self.nodes[id].kind, NodeKind::Leaf(_))
    }

    pub fn is_empty(&self) -> bool {
        self.is_leaf(Self::ROOT)
    }

    /// Leaves reachable from the root.
    pub fn leaves(&self) -> &BTreeSet<NodeId> {
        &self.leaves
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Adds a rejecting leaf to every empty child list of every split node.
    pub fn fill(&mut self) {
        let splits: Vec<NodeId> = (0..self.nodes.len())
            .filter(|&id| matches!(self.nodes[id].kind, NodeKind::Split { .. }) && self.is_attached(id))
            .collect();
        for id in splits {
            for slot in Slot::BOTH {
                if self.children(id, slot).is_empty() {
                    self.add_leaf(id, slot, LeafLabel::Reject);
                }
            }
        }
    }

    fn is_attached(&self, id: NodeId) -> bool {
        let mut cur = id;
        while let Some(p) = self.nodes[cur].parent {
            if !self.children(p, self.nodes[cur].slot).contains(&cur) {
                return false;
            }
            cur = p;
        }
        cur == Self::ROOT
    }

    /// Conjunction of the tests along the path from the root to `id`.
    ///
    /// A "no" edge below a one-sided numerical split reads as the positive complement
    /// rather than a negated literal.
    pub fn get_branch_query(&self, id: NodeId) -> Vec<Literal> {
        let mut buk = Vec::new();
        let mut cur = id;
        while let Some(p) = self.nodes[cur].parent {
            if let Some(term) = self.split_term(p) {
                let negated = self.nodes[cur].slot == Slot::No;
                let lit = match (negated, term.complement()) {
                    (true, Some(c)) => Literal::positive(c),
                    _ => Literal::new(term.clone(), negated),
                };
                buk.push(lit);
            }
            cur = p;
        }
        buk.reverse();
        buk
    }

    /// Reads the tree back as a query: the OR over accepting leaves of their path
    /// conjunctions, ordered by leaf label.
    ///
    /// A single accepting path becomes a conjunction (or a single literal). An empty
    /// path accepts everything and yields the empty query, as does a tree with no
    /// accepting leaf. A tree built only from contradictory branches reads back as the
    /// first of them.
    pub fn get_query(&self) -> Query {
        let mut accepting: Vec<(LeafLabel, NodeId)> = self
            .leaves
            .iter()
            .filter_map(|&id| self.label(id).filter(|l| l.accepts()).map(|l| (l, id)))
            .collect();
        accepting.sort();
        let paths: Vec<Vec<Literal>> = accepting.into_iter().map(|(_, id)| self.get_branch_query(id)).collect();
        if paths.iter().any(|p| p.is_empty()) {
            return Query::empty();
        }
        match paths.len() {
            0 => match &self.unsat {
                Some(branch) => Query::conjunction(branch.iter().cloned()),
                None => Query::empty(),
            },
            1 => Query::conjunction(paths.into_iter().flatten()),
            _ => Query::new(
                Op::Or,
                paths
                    .into_iter()
                    .map(|mut p| {
                        if p.len() == 1 {
                            Node::Leaf(p.remove(0))
                        } else {
                            Node::Group(p.into_iter().map(Node::Leaf).collect())
                        }
                    })
                    .collect(),
            ),
        }
    }

    /// Bottom-up collapse of child lists that accept.
    ///
    /// Every child list containing a subtree that resolves to [`Resolved::In`] is
    /// replaced by a single [`LeafLabel::Accept`] leaf. At the root only the "yes"
    /// list is considered. Returns the resolved value of `id`, or `None` for a node
    /// with no children.
    pub fn rec_simply(&mut self, id: NodeId) -> Option<Resolved> {
        if let Some(label) = self.label(id) {
            return Some(if label.accepts() { Resolved::In } else { Resolved::Out });
        }
        let mut resolved = [None, None];
        for slot in Slot::BOTH {
            if slot == Slot::No && id == Self::ROOT {
                continue;
            }
            let children = self.children(id, slot).to_vec();
            if children.is_empty() {
                continue;
            }
            let best = children.into_iter().filter_map(|c| self.rec_simply(c)).max();
            resolved[slot.index()] = best;
            if best == Some(Resolved::In) {
                self.trim_children(id, slot);
                self.add_leaf(id, slot, LeafLabel::Accept);
            }
        }
        if resolved[0] == resolved[1] {
            resolved[0]
        } else {
            Some(Resolved::Mixed)
        }
    }

    fn trim_children(&mut self, id: NodeId, slot: Slot) {
        let children = match self.children_mut(id) {
            Some(children) => std::mem::take(&mut children[slot.index()]),
            None => return,
        };
        for c in children {
            if self.is_leaf(c) {
                self.leaves.remove(&c);
            } else {
                self.trim_children(c, Slot::No);
                self.trim_children(c, Slot::Yes);
            }
        }
    }

    /// Query read back after collapsing accepting subtrees, then compacted again.
    pub fn simplified_query(&self) -> Query {
        let mut copy = self.clone();
        copy.rec_simply(Self::ROOT);
        let q = copy.get_query();
        match q.to_qtree() {
            Some(tree) => tree.get_query(),
            None => q,
        }
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId) -> fmt::Result {
        let node = &self.nodes[id];
        let indent = "\t".repeat(node.depth);
        match &node.kind {
            NodeKind::Root { .. } => {}
            NodeKind::Split { term, .. } => {
                writeln!(f, "{}'-- ({}) {}:N {}", indent, id, node.slot.index(), term)?;
            }
            NodeKind::Leaf(label) => {
                writeln!(f, "{}'-- ({}) {}:L {}", indent, id, node.slot.index(), label)?;
            }
        }
        for slot in Slot::BOTH {
            for &c in self.children(id, slot) {
                self.fmt_node(f, c)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for QTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, Self::ROOT)
    }
}

impl Query {
    /// True for forms that map directly onto branches: a DNF with several
    /// conjunctions, a single disjunction, a single conjunction, a single literal, or
    /// the empty query.
    pub fn is_tree_compatible(&self) -> bool {
        let depth = self.max_depth();
        let has_marker = self.nodes().iter().any(|n| matches!(n, Node::Neg));
        !has_marker
            && ((depth == 2 && self.op().is_or())
                || depth == 1
                || matches!(self.nodes(), [Node::Leaf(_)])
                || self.nodes().is_empty())
    }

    /// Builds the filled [`QTree`] of a tree-compatible query, or `None` otherwise.
    pub fn to_qtree(&self) -> Option<QTree> {
        let q = self.clone().push_negation();
        if !q.is_tree_compatible() {
            log::debug!("Query with depth {} is not in tree form", q.max_depth());
            return None;
        }
        let leaf_literals = |nodes: &[Node]| -> Vec<Literal> { nodes.iter().filter_map(Node::as_literal).cloned().collect() };
        let branches: Vec<Vec<Literal>> = if q.is_empty() {
            Vec::new()
        } else if q.op().is_or() {
            q.nodes()
                .iter()
                .map(|n| match n {
                    Node::Group(children) => leaf_literals(children),
                    other => leaf_literals(std::slice::from_ref(other)),
                })
                .collect()
        } else {
            vec![leaf_literals(q.nodes())]
        };
        let mut tree = QTree::build(&branches);
        tree.fill();
        Some(tree)
    }
}
