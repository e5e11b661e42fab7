//! # redescription-rs: Boolean queries and tree search for redescription mining
//!
//! **`redescription-rs`** provides the query algebra behind redescription mining: finding
//! pairs of queries, one per side of a two-sided dataset, that select (almost) the same rows.
//!
//! ## What is a redescription?
//!
//! A dataset has two sides (say, species observations and climate variables) describing the
//! same rows (locations). A redescription is a pair of boolean queries, one over each side,
//! whose supports are similar, as measured by their Jaccard index.
//!
//! ## Key Features
//!
//! - **Alternating normal form**: A [`Query`][crate::query::Query] has one root operator; nested buckets alternate between AND and OR. Negation is pushed down to the literals.
//! - **Algebraic normalization**: Queries are minimized through their truth table ([`truth_table`]) and compacted into a shared decision structure ([`qtree`]).
//! - **Three-valued support**: Rows where a literal cannot be decided are tracked as *missing* separately from the support.
//! - **Text form**: Queries render to ASCII, Unicode or TeX ([`display`]) and parse back ([`parser`]).
//! - **Tree search**: Decision trees are grown alternately on each side against the other side's support ([`search`]).
//!
//! ## Basic Usage
//!
//! ```rust
//! use redescription_rs::query::Query;
//!
//! // 1. Parse a query
//! let q = Query::parse("v0 | (v0 & v1)").unwrap();
//!
//! // 2. Normalize it: the second disjunct is absorbed
//! let (normalized, changed) = q.algebraic_normalize();
//! assert!(changed);
//! assert_eq!(normalized.to_string(), "v0");
//!
//! // 3. Negate it
//! assert_eq!(normalized.negate().to_string(), "! v0");
//! ```
//!
//! ## Core Components
//!
//! - **[`query`]**: The query algebra: negation, evaluation, support, edits and canonical comparison.
//! - **[`term`]** and **[`literal`]**: Single-column predicates and their signed form.
//! - **[`dataset`]**: The data contract used by queries and the search, with an in-memory implementation.
//! - **[`fit`]**: The tree-fitting contract, with a CART implementation.
//! - **[`dot`]**: Visualizing a [`QTree`][crate::qtree::QTree] with Graphviz.

pub mod config;
pub mod dataset;
pub mod display;
pub mod dot;
pub mod error;
pub mod fit;
pub mod literal;
pub mod normalize;
pub mod parser;
pub mod qtree;
pub mod query;
pub mod rowset;
pub mod search;
pub mod term;
pub mod truth_table;
pub mod types;
