//! Alternating tree search for redescriptions.
//!
//! Starting from a seed query on one side, the search repeatedly fits a decision tree
//! on the other side against the rows selected so far, turns the tree into a query,
//! and swaps sides. The pair of queries whose supports have the highest Jaccard
//! similarity is kept.
//!
//! The three [`SearchVariant`]s differ in how tree depth evolves:
//!
//! - `Cartwheel` refits at the full depth cap each round.
//! - `Sprit` starts shallow and raises a side's cap by one each time it is regrown.
//! - `Split` grows one side at increasing depths, refitting the other side after
//!   each step, and picks the depth with [`pick_step`].
//!
//! The search is synchronous. A caller can stop it between rounds through the flag
//! given to [`TreeSearch::with_cancel`].

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::config::{SearchVariant, TreeSearchConfig};
use crate::dataset::Dataset;
use crate::fit::TreeFitter;
use crate::qtree::QTree;
use crate::query::Query;
use crate::rowset::RowSet;
use crate::types::Side;

/// A pair of queries describing (approximately) the same rows from both sides.
#[derive(Debug, Clone, PartialEq)]
pub struct Redescription {
    pub queries: [Query; 2],
    pub supports: [RowSet; 2],
    pub jaccard: f64,
}

impl Redescription {
    /// Evaluates both queries on `data`.
    pub fn new<D: Dataset + ?Sized>(left: Query, right: Query, data: &D) -> Self {
        let supports = [
            left.support_and_missing(Side::Left, data).0,
            right.support_and_missing(Side::Right, data).0,
        ];
        let jaccard = supports[0].jaccard(&supports[1]);
        Redescription {
            queries: [left, right],
            supports,
            jaccard,
        }
    }

    pub fn query(&self, side: Side) -> &Query {
        &self.queries[side.index()]
    }

    pub fn support(&self, side: Side) -> &RowSet {
        &self.supports[side.index()]
    }
}

/// Why a search stopped.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Termination {
    /// The round budget was exhausted.
    MaxRounds,
    /// Neither side changes any more.
    Converged,
    /// No tree could be fitted at all.
    NoTree,
    /// The cancellation flag was raised.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Best pair found, if any pair had a positive Jaccard similarity.
    pub best: Option<Redescription>,
    /// Number of tree fits performed.
    pub rounds: usize,
    pub termination: Termination,
}

/// One query grown on a side, with the rows it selects.
#[derive(Debug, Clone)]
struct Grown {
    query: Query,
    support: Vec<bool>,
    used_cols: BTreeSet<usize>,
}

/// Picks the round to keep among per-round accuracies.
///
/// Rounds are scanned by decreasing accuracy, later rounds first on ties. While the
/// drop from the top accuracy stays below `min_impr`, a later round replaces the
/// current choice, so a marginally worse round that comes after an early spike wins.
/// Returns `None` for an empty slice.
pub fn pick_step(accuracies: &[f64], min_impr: f64) -> Option<usize> {
    let mut order: Vec<usize> = (0..accuracies.len()).collect();
    order.sort_by(|&a, &b| accuracies[b].total_cmp(&accuracies[a]).then(b.cmp(&a)));
    let (&first, rest) = order.split_first()?;
    let top = accuracies[first];
    let mut pick = first;
    for &i in rest {
        if top - accuracies[i] >= min_impr {
            break;
        }
        if i > pick {
            pick = i;
        }
    }
    Some(pick)
}

fn jaccard(a: &[bool], b: &[bool]) -> f64 {
    let inter = a.iter().zip(b).filter(|(x, y)| **x && **y).count();
    let union = a.iter().zip(b).filter(|(x, y)| **x || **y).count();
    if union == 0 {
        0.0
    } else {
        inter as f64 / union as f64
    }
}

/// Alternating tree search over a dataset.
pub struct TreeSearch<'a, D: Dataset + ?Sized, F: TreeFitter> {
    data: &'a D,
    fitter: F,
    config: TreeSearchConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, D: Dataset + ?Sized, F: TreeFitter> TreeSearch<'a, D, F> {
    pub fn new(data: &'a D, fitter: F, config: TreeSearchConfig) -> Self {
        TreeSearch {
            data,
            fitter,
            config,
            cancel: None,
        }
    }

    /// Makes the search stop before the next round once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &TreeSearchConfig {
        &self.config
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |f| f.load(AtomicOrdering::Relaxed))
    }

    /// Fits a tree on `side` against `target` and reads it back as a query.
    fn grow(&self, side: Side, target: &[bool], depth: usize, exclude: &BTreeSet<usize>) -> Option<Grown> {
        let cols: Vec<usize> = self
            .data
            .usable_columns(side, self.config.min_in, self.config.min_out)
            .into_iter()
            .filter(|c| !exclude.contains(c))
            .collect();
        if cols.is_empty() {
            log::debug!("No usable column on {}", side);
            return None;
        }
        let features = self.data.feature_matrix(side, &cols);
        let fitted = self
            .fitter
            .fit(&features, target, depth, self.config.min_leaf_size, self.config.criterion)?;
        let branches = match fitted.tree.branches() {
            Ok(branches) => branches,
            Err(e) => {
                log::debug!("Cannot read the tree on {} back: {}", side, e);
                return None;
            }
        };
        let query = QTree::build(&branches).get_query().algebraic_normalize().0;
        Some(Grown {
            query,
            support: fitted.support,
            used_cols: fitted.tree.used_columns(),
        })
    }

    fn seed(&self, side: Side, query: &Query) -> Grown {
        Grown {
            query: query.clone(),
            support: query.support_and_missing(side, self.data).0.to_bools(self.data.n_rows()),
            used_cols: query.inv_cols(true),
        }
    }

    fn outcome(&self, best: Option<[Query; 2]>, rounds: usize, termination: Termination) -> SearchOutcome {
        let best = best.map(|[left, right]| Redescription::new(left, right, self.data));
        log::debug!(
            "Search stopped after {} rounds ({:?}), best jaccard {:?}",
            rounds,
            termination,
            best.as_ref().map(|r| r.jaccard)
        );
        SearchOutcome {
            best,
            rounds,
            termination,
        }
    }

    /// Runs the configured variant from `seed`, a query on `seed_side`.
    pub fn run(&self, seed_side: Side, seed: &Query) -> SearchOutcome {
        match self.config.variant {
            SearchVariant::Cartwheel | SearchVariant::Sprit => self.run_alternating(seed_side, seed),
            SearchVariant::Split => self.run_split(seed_side, seed),
        }
    }

    /// Cartwheel and Sprit rounds.
    ///
    /// A round makes no progress when its side yields no tree, an empty support, or
    /// the same support as that side's previous tree (for Sprit, only once the side is
    /// at its depth cap). Sides alternate every round, so two consecutive rounds
    /// without progress mean both sides have stopped, and the search ends there.
    ///
    /// The best pair is replaced only on a strictly higher Jaccard, starting from 0:
    /// pairs with disjoint supports are never recorded.
    fn run_alternating(&self, seed_side: Side, seed: &Query) -> SearchOutcome {
        let sprit = self.config.variant == SearchVariant::Sprit;
        let mut history: [Vec<Grown>; 2] = [Vec::new(), Vec::new()];
        history[seed_side.index()].push(self.seed(seed_side, seed));
        let mut grown_rounds = [0usize; 2];
        let mut depth = [1usize; 2];
        let mut best: Option<[Query; 2]> = None;
        let mut best_jaccard = 0.0;
        let mut idle = 0;
        let mut side = seed_side.other();

        for round in 1..=self.config.max_rounds {
            if self.cancelled() {
                return self.outcome(best, round - 1, Termination::Cancelled);
            }
            let other = side.other();
            let Some(target) = history[other.index()].last().map(|g| g.support.clone()) else {
                return self.outcome(best, round - 1, Termination::NoTree);
            };
            let exclude = if self.data.is_single_table() && grown_rounds[side.index()] > 0 {
                history[other.index()].last().map(|g| g.used_cols.clone()).unwrap_or_default()
            } else {
                BTreeSet::new()
            };
            let cap = self.config.max_depth(side);
            let d = if sprit { depth[side.index()].min(cap) } else { cap };
            let grown = self.grow(side, &target, d, &exclude);
            let at_cap = !sprit || d >= cap;
            if sprit {
                depth[side.index()] = (d + 1).min(cap);
            }

            let progressed = match grown {
                None => {
                    log::debug!("Round {}: no tree on {}", round, side);
                    false
                }
                Some(g) if g.support.iter().all(|s| !s) => {
                    log::debug!("Round {}: empty support on {}", round, side);
                    false
                }
                Some(g) => {
                    let same = history[side.index()].last().map_or(false, |h| h.support == g.support);
                    grown_rounds[side.index()] += 1;
                    history[side.index()].push(g);
                    if same {
                        log::debug!("Round {}: support on {} unchanged", round, side);
                    }
                    !same || !at_cap
                }
            };

            if let (Some(l), Some(r)) = (history[0].last(), history[1].last()) {
                let jac = jaccard(&l.support, &r.support);
                log::debug!("Round {}: {} | {} (jaccard {:.4})", round, l.query, r.query, jac);
                if jac > best_jaccard {
                    best_jaccard = jac;
                    best = Some([l.query.clone(), r.query.clone()]);
                }
            }

            if progressed {
                idle = 0;
            } else {
                idle += 1;
                if idle >= 2 {
                    let termination = if grown_rounds == [0, 0] {
                        Termination::NoTree
                    } else {
                        Termination::Converged
                    };
                    return self.outcome(best, round, termination);
                }
            }
            side = other;
        }
        self.outcome(best, self.config.max_rounds, Termination::MaxRounds)
    }

    fn run_split(&self, seed_side: Side, seed: &Query) -> SearchOutcome {
        let grown_side = seed_side.other();
        let seeded = self.seed(seed_side, seed);
        let cap = self.config.max_depth(grown_side).min(self.config.max_rounds);
        let mut steps: Vec<([Query; 2], f64)> = Vec::new();
        let mut rounds = 0;

        for depth in 1..=cap {
            if self.cancelled() {
                let best = self.pick(&steps);
                return self.outcome(best, rounds, Termination::Cancelled);
            }
            rounds += 1;
            let Some(grown) = self.grow(grown_side, &seeded.support, depth, &BTreeSet::new()) else {
                log::debug!("Depth {}: no tree on {}", depth, grown_side);
                break;
            };
            let exclude = if self.data.is_single_table() {
                grown.used_cols.clone()
            } else {
                BTreeSet::new()
            };
            let depth_back = self.config.max_depth(seed_side);
            let back = self
                .grow(seed_side, &grown.support, depth_back, &exclude)
                .unwrap_or_else(|| seeded.clone());
            let accuracy = jaccard(&grown.support, &back.support);
            log::debug!("Depth {}: {} <-> {} (jaccard {:.4})", depth, grown.query, back.query, accuracy);
            let mut pair = [back.query, grown.query];
            if seed_side == Side::Right {
                pair.swap(0, 1);
            }
            steps.push((pair, accuracy));
        }

        let termination = if steps.is_empty() {
            Termination::NoTree
        } else if rounds == cap {
            Termination::MaxRounds
        } else {
            Termination::Converged
        };
        let best = self.pick(&steps);
        self.outcome(best, rounds, termination)
    }

    fn pick(&self, steps: &[([Query; 2], f64)]) -> Option<[Query; 2]> {
        let accuracies: Vec<f64> = steps.iter().map(|s| s.1).collect();
        let i = pick_step(&accuracies, self.config.min_impr)?;
        match accuracies[i].partial_cmp(&0.0) {
            Some(Ordering::Greater) => Some(steps[i].0.clone()),
            _ => None,
        }
    }
}
