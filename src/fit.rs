//! Decision-tree fitting against a Boolean target.
//!
//! The tree search only needs a [`TreeFitter`]: given a feature matrix, a target
//! vector and size bounds, return a tree together with the rows it classifies as
//! positive. [`CartFitter`] is a plain greedy CART implementation.
//!
//! A fitted [`DecisionTree`] is turned back into literals over dataset columns by
//! [`DecisionTree::branches`], one conjunction per positive leaf.

use std::collections::BTreeSet;

use crate::dataset::{FeatureKind, FeatureMatrix};
use crate::error::Result;
use crate::literal::Literal;
use crate::term::Term;

/// Impurity measure used to score candidate splits.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum SplitCriterion {
    #[default]
    Gini,
    Entropy,
}

impl SplitCriterion {
    /// Impurity of a node holding `pos` positives out of `n` rows.
    pub fn impurity(self, pos: usize, n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let p = pos as f64 / n as f64;
        let q = 1.0 - p;
        match self {
            SplitCriterion::Gini => 1.0 - p * p - q * q,
            SplitCriterion::Entropy => {
                let h = |x: f64| if x > 0.0 { -x * x.log2() } else { 0.0 };
                h(p) + h(q)
            }
        }
    }
}

/// A node of a [`DecisionTree`].
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    /// Rows with `feature <= threshold` go left; all others, missing values included,
    /// go right.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        positive: bool,
        n_pos: usize,
        n_rows: usize,
    },
}

/// A binary classification tree stored as an arena rooted at index `0`.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    sources: Vec<(usize, FeatureKind)>,
}

/// Output of a successful fit.
#[derive(Debug, Clone)]
pub struct FittedTree {
    pub tree: DecisionTree,
    /// Prediction for each row of the training matrix.
    pub support: Vec<bool>,
}

/// Fits a bounded tree on a feature matrix against a Boolean target.
pub trait TreeFitter {
    /// Returns `None` if no split keeps both children at `min_leaf` rows or more, or if
    /// the fitted tree has no positive leaf.
    fn fit(
        &self,
        features: &FeatureMatrix,
        target: &[bool],
        max_depth: usize,
        min_leaf: usize,
        criterion: SplitCriterion,
    ) -> Option<FittedTree>;
}

/// Greedy CART with midpoint thresholds.
#[derive(Debug, Copy, Clone, Default)]
pub struct CartFitter;

const MIN_GAIN: f64 = 1e-12;

struct Grower<'a> {
    features: &'a FeatureMatrix,
    target: &'a [bool],
    max_depth: usize,
    min_leaf: usize,
    criterion: SplitCriterion,
    nodes: Vec<TreeNode>,
}

impl Grower<'_> {
    fn leaf(&mut self, rows: &[usize]) -> usize {
        let n_pos = rows.iter().filter(|&&r| self.target[r]).count();
        self.nodes.push(TreeNode::Leaf {
            positive: 2 * n_pos > rows.len(),
            n_pos,
            n_rows: rows.len(),
        });
        self.nodes.len() - 1
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let n_pos = rows.iter().filter(|&&r| self.target[r]).count();
        let pure = n_pos == 0 || n_pos == rows.len();
        if depth >= self.max_depth || pure || rows.len() < 2 * self.min_leaf {
            return self.leaf(&rows);
        }
        let Some((feature, threshold)) = self.best_split(&rows, n_pos) else {
            return self.leaf(&rows);
        };
        let values = &self.features.features[feature].values;
        let (left, right): (Vec<usize>, Vec<usize>) = rows.iter().partition(|&&r| values[r] <= threshold);
        // Reserve the slot so children come after their parent.
        let id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            positive: false,
            n_pos,
            n_rows: rows.len(),
        });
        let left = self.grow(left, depth + 1);
        let right = self.grow(right, depth + 1);
        self.nodes[id] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&self, rows: &[usize], n_pos: usize) -> Option<(usize, f64)> {
        let n = rows.len();
        let parent = self.criterion.impurity(n_pos, n);
        let mut best: Option<(usize, f64, f64)> = None;
        for (f, feature) in self.features.features.iter().enumerate() {
            let mut present: Vec<(f64, bool)> = rows
                .iter()
                .filter(|&&r| !feature.values[r].is_nan())
                .map(|&r| (feature.values[r], self.target[r]))
                .collect();
            present.sort_by(|a, b| a.0.total_cmp(&b.0));
            let mut left_pos = 0;
            for i in 0..present.len().saturating_sub(1) {
                if present[i].1 {
                    left_pos += 1;
                }
                let (lo, hi) = (present[i].0, present[i + 1].0);
                if lo == hi {
                    continue;
                }
                let n_left = i + 1;
                let n_right = n - n_left;
                if n_left < self.min_leaf || n_right < self.min_leaf {
                    continue;
                }
                let children = (n_left as f64 * self.criterion.impurity(left_pos, n_left)
                    + n_right as f64 * self.criterion.impurity(n_pos - left_pos, n_right))
                    / n as f64;
                let gain = parent - children;
                if gain > MIN_GAIN && best.map_or(true, |(_, _, g)| gain > g) {
                    let mid = lo + (hi - lo) / 2.0;
                    let threshold = if mid < hi { mid } else { lo };
                    best = Some((f, threshold, gain));
                }
            }
        }
        best.map(|(f, t, _)| (f, t))
    }
}

impl TreeFitter for CartFitter {
    fn fit(
        &self,
        features: &FeatureMatrix,
        target: &[bool],
        max_depth: usize,
        min_leaf: usize,
        criterion: SplitCriterion,
    ) -> Option<FittedTree> {
        if features.is_empty() || target.len() != features.n_rows {
            log::debug!(
                "Nothing to fit: {} features, {} targets for {} rows",
                features.n_features(),
                target.len(),
                features.n_rows
            );
            return None;
        }
        let mut grower = Grower {
            features,
            target,
            max_depth: max_depth.max(1),
            min_leaf: min_leaf.max(1),
            criterion,
            nodes: Vec::new(),
        };
        grower.grow((0..features.n_rows).collect(), 0);
        let tree = DecisionTree {
            nodes: grower.nodes,
            sources: features.features.iter().map(|f| (f.col, f.kind.clone())).collect(),
        };
        if !matches!(tree.nodes.first(), Some(TreeNode::Split { .. })) {
            log::debug!("Root cannot be split");
            return None;
        }
        if !tree.nodes.iter().any(|n| matches!(n, TreeNode::Leaf { positive: true, .. })) {
            log::debug!("Fitted tree has no positive leaf");
            return None;
        }
        let support = (0..features.n_rows).map(|r| tree.predict(features, r)).collect();
        log::trace!("Fitted a tree with {} nodes, depth {}", tree.nodes.len(), tree.depth());
        Some(FittedTree { tree, support })
    }
}

impl DecisionTree {
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Number of splits on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        fn rec(nodes: &[TreeNode], id: usize) -> usize {
            match nodes[id] {
                TreeNode::Split { left, right, .. } => 1 + rec(nodes, left).max(rec(nodes, right)),
                TreeNode::Leaf { .. } => 0,
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            rec(&self.nodes, 0)
        }
    }

    /// Classifies row `row` of `features`, which must have the training layout.
    pub fn predict(&self, features: &FeatureMatrix, row: usize) -> bool {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    id = if features.features[*feature].values[row] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Some(TreeNode::Leaf { positive, .. }) => return *positive,
                None => return false,
            }
        }
    }

    /// Dataset columns tested by some split.
    pub fn used_columns(&self) -> BTreeSet<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                TreeNode::Split { feature, .. } => self.sources.get(*feature).map(|s| s.0),
                TreeNode::Leaf { .. } => None,
            })
            .collect()
    }

    fn edge_literal(&self, feature: usize, threshold: f64, left: bool) -> Result<Literal> {
        let (col, kind) = &self.sources[feature];
        let (term, positive_left) = match kind {
            FeatureKind::Numerical => (Term::numerical(*col, f64::NEG_INFINITY, threshold)?, true),
            FeatureKind::Boolean => (Term::boolean(*col), false),
            FeatureKind::Category(cat) => (Term::categorical(*col, [cat.clone()])?, false),
        };
        Ok(Literal::new(term, left != positive_left))
    }

    /// One conjunction of literals per positive leaf, in arena order.
    pub fn branches(&self) -> Result<Vec<Vec<Literal>>> {
        let mut out = Vec::new();
        let mut stack: Vec<(usize, Vec<Literal>)> = vec![(0, Vec::new())];
        while let Some((id, path)) = stack.pop() {
            match self.nodes.get(id) {
                Some(&TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let mut right_path = path.clone();
                    right_path.push(self.edge_literal(feature, threshold, false)?);
                    stack.push((right, right_path));
                    let mut left_path = path;
                    left_path.push(self.edge_literal(feature, threshold, true)?);
                    stack.push((left, left_path));
                }
                Some(TreeNode::Leaf { positive: true, .. }) => out.push((id, path)),
                _ => {}
            }
        }
        out.sort_by_key(|(id, _)| *id);
        Ok(out.into_iter().map(|(_, path)| path).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Feature;
    use test_log::test;

    fn matrix(columns: Vec<(FeatureKind, Vec<f64>)>) -> FeatureMatrix {
        let n_rows = columns.first().map_or(0, |c| c.1.len());
        FeatureMatrix {
            n_rows,
            features: columns
                .into_iter()
                .enumerate()
                .map(|(col, (kind, values))| Feature { col, kind, values })
                .collect(),
        }
    }

    #[test]
    fn test_impurity() {
        assert_eq!(SplitCriterion::Gini.impurity(5, 10), 0.5);
        assert_eq!(SplitCriterion::Entropy.impurity(5, 10), 1.0);
        assert_eq!(SplitCriterion::Gini.impurity(0, 10), 0.0);
        assert_eq!(SplitCriterion::Entropy.impurity(10, 10), 0.0);
    }

    #[test]
    fn test_single_threshold() {
        let fm = matrix(vec![(FeatureKind::Numerical, vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0])]);
        let target = [true, true, true, false, false, false];
        let fitted = CartFitter.fit(&fm, &target, 2, 1, SplitCriterion::Gini).unwrap();
        assert_eq!(fitted.support, target);
        assert_eq!(fitted.tree.depth(), 1);
        let branches = fitted.tree.branches().unwrap();
        assert_eq!(branches.len(), 1);
        let lit = &branches[0][0];
        assert!(!lit.is_negated());
        assert_eq!(lit.term().bounds(), Some((f64::NEG_INFINITY, 6.5)));
        assert_eq!(fitted.tree.used_columns().into_iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_right_branch_is_negated() {
        let fm = matrix(vec![(FeatureKind::Numerical, vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0])]);
        let target = [false, false, false, true, true, true];
        let fitted = CartFitter.fit(&fm, &target, 1, 1, SplitCriterion::Entropy).unwrap();
        let branches = fitted.tree.branches().unwrap();
        assert_eq!(branches.len(), 1);
        assert!(branches[0][0].is_negated());
    }

    #[test]
    fn test_boolean_and_category_edges() {
        let fm = matrix(vec![
            (FeatureKind::Boolean, vec![1.0, 1.0, 0.0, 0.0]),
            (FeatureKind::Category("red".into()), vec![0.0, 1.0, 0.0, 1.0]),
        ]);
        let target = [true, true, false, false];
        let fitted = CartFitter.fit(&fm, &target, 1, 1, SplitCriterion::Gini).unwrap();
        let branches = fitted.tree.branches().unwrap();
        assert_eq!(branches, vec![vec![Literal::positive(Term::boolean(0))]]);

        let target = [false, true, false, true];
        let fitted = CartFitter.fit(&fm, &target, 1, 1, SplitCriterion::Gini).unwrap();
        let branches = fitted.tree.branches().unwrap();
        assert_eq!(
            branches,
            vec![vec![Literal::positive(Term::categorical(1, ["red"]).unwrap())]]
        );
    }

    #[test]
    fn test_min_leaf_blocks_split() {
        let fm = matrix(vec![(FeatureKind::Numerical, vec![1.0, 2.0, 3.0, 4.0])]);
        let target = [true, false, false, false];
        assert!(CartFitter.fit(&fm, &target, 3, 2, SplitCriterion::Gini).is_none());
        assert!(CartFitter.fit(&fm, &target, 3, 1, SplitCriterion::Gini).is_some());
    }

    #[test]
    fn test_missing_values_go_right() {
        let fm = matrix(vec![(FeatureKind::Numerical, vec![1.0, 2.0, f64::NAN, 10.0, 11.0])]);
        let target = [true, true, false, false, false];
        let fitted = CartFitter.fit(&fm, &target, 1, 1, SplitCriterion::Gini).unwrap();
        assert_eq!(fitted.support, target);
    }

    #[test]
    fn test_pure_target_has_no_tree() {
        let fm = matrix(vec![(FeatureKind::Numerical, vec![1.0, 2.0, 3.0])]);
        assert!(CartFitter.fit(&fm, &[true, true, true], 2, 1, SplitCriterion::Gini).is_none());
        assert!(CartFitter.fit(&FeatureMatrix::default(), &[], 2, 1, SplitCriterion::Gini).is_none());
    }
}
