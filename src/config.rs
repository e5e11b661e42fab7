//! Tree search settings.

use crate::fit::SplitCriterion;
use crate::types::Side;

/// How the two sides are regrown against each other.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum SearchVariant {
    /// Refit each side at its full depth cap, alternating sides every round.
    #[default]
    Cartwheel,
    /// Like `Cartwheel`, but each regrowth of a side raises its depth cap by one.
    Sprit,
    /// Grow one side at increasing depths, refitting the other side after each
    /// increment, then keep the depth chosen by [`pick_step`](crate::search::pick_step).
    Split,
}

/// Configuration of [`TreeSearch`](crate::search::TreeSearch).
///
/// Use `TreeSearchConfig::default()` for standard settings.
///
/// # Examples
///
/// ```
/// use redescription_rs::config::{SearchVariant, TreeSearchConfig};
///
/// let config = TreeSearchConfig {
///     variant: SearchVariant::Sprit,
///     max_depth: [2, 4],
///     ..TreeSearchConfig::default()
/// };
/// assert_eq!(config.max_rounds, 10);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TreeSearchConfig {
    /// Search variant (default: `Cartwheel`)
    pub variant: SearchVariant,
    /// Maximal number of tree fits (default: 10)
    pub max_rounds: usize,
    /// Depth cap of the trees grown on each side (default: `[3, 3]`)
    pub max_depth: [usize; 2],
    /// Minimal number of rows in a tree leaf (default: 2)
    pub min_leaf_size: usize,
    /// Split impurity measure (default: Gini)
    pub criterion: SplitCriterion,
    /// Accuracy drop below which a later round is preferred by `Split` (default: 0.05)
    pub min_impr: f64,
    /// Minimal number of rows a usable column must be able to select (default: 1)
    pub min_in: usize,
    /// Minimal number of rows a usable column must be able to leave out (default: 1)
    pub min_out: usize,
}

impl Default for TreeSearchConfig {
    fn default() -> Self {
        Self {
            variant: SearchVariant::Cartwheel,
            max_rounds: 10,
            max_depth: [3, 3],
            min_leaf_size: 2,
            criterion: SplitCriterion::Gini,
            min_impr: 0.05,
            min_in: 1,
            min_out: 1,
        }
    }
}

impl TreeSearchConfig {
    pub fn max_depth(&self, side: Side) -> usize {
        self.max_depth[side.index()]
    }
}
