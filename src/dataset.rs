//! Two-sided tabular data.
//!
//! The [`Dataset`] trait is everything the query algebra and the tree search need from
//! the data: per-literal support and missing row sets, feature matrices for tree
//! fitting, the columns worth considering, and whether both sides share one table.
//!
//! [`Data`] is an in-memory implementation holding Boolean, categorical and numerical
//! columns with missing values.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::literal::Literal;
use crate::rowset::RowSet;
use crate::types::{Side, Value};

/// Data access used by queries and the tree search.
pub trait Dataset {
    /// Number of rows shared by both sides.
    fn n_rows(&self) -> usize;

    /// Rows where `literal` holds, and rows where its truth value is unknown.
    fn support_and_missing(&self, side: Side, literal: &Literal) -> (RowSet, RowSet);

    /// Numeric encoding of the given columns of `side`, one row per data row.
    fn feature_matrix(&self, side: Side, columns: &[usize]) -> FeatureMatrix;

    /// Columns of `side` able to split the rows into at least `min_in` rows inside
    /// and `min_out` rows outside.
    fn usable_columns(&self, side: Side, min_in: usize, min_out: usize) -> Vec<usize>;

    /// True if both sides are views over the same physical columns.
    fn is_single_table(&self) -> bool;
}

/// How a feature of a [`FeatureMatrix`] encodes its source column.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureKind {
    /// Boolean column as 0/1.
    Boolean,
    /// One-hot indicator of a single category.
    Category(String),
    /// Raw numerical values.
    Numerical,
}

/// One numeric feature column; missing cells are NaN.
#[derive(Debug, Clone)]
pub struct Feature {
    pub col: usize,
    pub kind: FeatureKind,
    pub values: Vec<f64>,
}

/// Column-major numeric matrix handed to a tree fitter.
#[derive(Debug, Clone, Default)]
pub struct FeatureMatrix {
    pub n_rows: usize,
    pub features: Vec<Feature>,
}

impl FeatureMatrix {
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A data column with optional cells.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Boolean(Vec<Option<bool>>),
    Categorical(Vec<Option<String>>),
    Numerical(Vec<Option<f64>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Boolean(v) => v.len(),
            Column::Categorical(v) => v.len(),
            Column::Numerical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cell at `row`, or `None` if it is missing.
    pub fn value(&self, row: usize) -> Option<Value<'_>> {
        match self {
            Column::Boolean(v) => v.get(row).copied().flatten().map(Value::Bool),
            Column::Categorical(v) => v.get(row).and_then(|c| c.as_deref()).map(Value::Cat),
            Column::Numerical(v) => v.get(row).copied().flatten().filter(|x| !x.is_nan()).map(Value::Num),
        }
    }

    fn missing(&self) -> RowSet {
        (0..self.len()).filter(|&r| self.value(r).is_none()).collect()
    }

    fn categories(&self) -> BTreeSet<&str> {
        match self {
            Column::Categorical(v) => v.iter().filter_map(|c| c.as_deref()).collect(),
            _ => BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SideData {
    names: Vec<String>,
    columns: Vec<Column>,
}

/// In-memory two-sided data.
#[derive(Debug, Clone)]
pub struct Data {
    n_rows: usize,
    sides: [SideData; 2],
    single_table: bool,
}

impl Data {
    pub fn new(n_rows: usize) -> Self {
        Data {
            n_rows,
            sides: Default::default(),
            single_table: false,
        }
    }

    /// Marks both sides as views over the same physical table.
    pub fn with_single_table(mut self, single_table: bool) -> Self {
        self.single_table = single_table;
        self
    }

    /// Appends a column to `side` and returns its index.
    ///
    /// Returns [`Error::ColumnLength`] if the column does not have one cell per row.
    pub fn add_column(&mut self, side: Side, name: impl Into<String>, column: Column) -> Result<usize> {
        let name = name.into();
        if column.len() != self.n_rows {
            return Err(Error::ColumnLength {
                name,
                expected: self.n_rows,
                found: column.len(),
            });
        }
        let data = &mut self.sides[side.index()];
        data.names.push(name);
        data.columns.push(column);
        log::trace!("Added column {} on {}", data.columns.len() - 1, side);
        Ok(data.columns.len() - 1)
    }

    pub fn n_cols(&self, side: Side) -> usize {
        self.sides[side.index()].columns.len()
    }

    pub fn names(&self, side: Side) -> &[String] {
        &self.sides[side.index()].names
    }

    pub fn column(&self, side: Side, col: usize) -> Option<&Column> {
        self.sides[side.index()].columns.get(col)
    }
}

impl Dataset for Data {
    fn n_rows(&self) -> usize {
        self.n_rows
    }

    fn support_and_missing(&self, side: Side, literal: &Literal) -> (RowSet, RowSet) {
        let Some(column) = self.column(side, literal.col()) else {
            return (RowSet::new(), RowSet::new());
        };
        if literal.is_anonymous() {
            return (RowSet::new(), RowSet::new());
        }
        let mut supp = RowSet::with_capacity(self.n_rows);
        let mut miss = RowSet::new();
        for row in 0..self.n_rows {
            match column.value(row) {
                None => {
                    miss.insert(row);
                }
                Some(v) => {
                    if literal.truth_eval(v) {
                        supp.insert(row);
                    }
                }
            }
        }
        (supp, miss)
    }

    fn feature_matrix(&self, side: Side, columns: &[usize]) -> FeatureMatrix {
        let mut features = Vec::new();
        for &col in columns {
            let Some(column) = self.column(side, col) else {
                log::debug!("Skipping unknown column {} on {}", col, side);
                continue;
            };
            match column {
                Column::Boolean(v) => features.push(Feature {
                    col,
                    kind: FeatureKind::Boolean,
                    values: v.iter().map(|c| c.map_or(f64::NAN, |b| if b { 1.0 } else { 0.0 })).collect(),
                }),
                Column::Numerical(v) => features.push(Feature {
                    col,
                    kind: FeatureKind::Numerical,
                    values: v.iter().map(|c| c.unwrap_or(f64::NAN)).collect(),
                }),
                Column::Categorical(v) => {
                    for cat in column.categories() {
                        features.push(Feature {
                            col,
                            kind: FeatureKind::Category(cat.to_string()),
                            values: v
                                .iter()
                                .map(|c| match c.as_deref() {
                                    None => f64::NAN,
                                    Some(x) if x == cat => 1.0,
                                    Some(_) => 0.0,
                                })
                                .collect(),
                        });
                    }
                }
            }
        }
        FeatureMatrix {
            n_rows: self.n_rows,
            features,
        }
    }

    fn usable_columns(&self, side: Side, min_in: usize, min_out: usize) -> Vec<usize> {
        let data = &self.sides[side.index()];
        data.columns
            .iter()
            .enumerate()
            .filter(|(_, column)| {
                let present = self.n_rows - column.missing().len();
                match column {
                    Column::Boolean(v) => {
                        let trues = v.iter().filter(|c| **c == Some(true)).count();
                        trues >= min_in && present - trues >= min_out
                    }
                    Column::Categorical(v) => column.categories().into_iter().any(|cat| {
                        let inside = v.iter().filter(|c| c.as_deref() == Some(cat)).count();
                        inside >= min_in && present - inside >= min_out
                    }),
                    Column::Numerical(v) => {
                        let distinct: BTreeSet<u64> = v.iter().flatten().filter(|x| !x.is_nan()).map(|x| x.to_bits()).collect();
                        distinct.len() > 1 && present >= min_in + min_out
                    }
                }
            })
            .map(|(col, _)| col)
            .collect()
    }

    fn is_single_table(&self) -> bool {
        self.single_table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;
    use test_log::test;

    fn sample() -> Data {
        let mut data = Data::new(5);
        data.add_column(
            Side::Left,
            "flag",
            Column::Boolean(vec![Some(true), Some(false), None, Some(true), Some(false)]),
        )
        .unwrap();
        data.add_column(
            Side::Left,
            "color",
            Column::Categorical(vec![
                Some("red".into()),
                Some("blue".into()),
                Some("red".into()),
                None,
                Some("green".into()),
            ]),
        )
        .unwrap();
        data.add_column(
            Side::Right,
            "x",
            Column::Numerical(vec![Some(1.0), Some(2.0), Some(3.0), None, Some(5.0)]),
        )
        .unwrap();
        data
    }

    fn rows(set: &RowSet) -> Vec<usize> {
        set.iter().collect()
    }

    #[test]
    fn test_add_column_length_checked() {
        let mut data = Data::new(3);
        let err = data.add_column(Side::Left, "short", Column::Boolean(vec![Some(true)]));
        assert_eq!(
            err,
            Err(Error::ColumnLength {
                name: "short".into(),
                expected: 3,
                found: 1
            })
        );
    }

    #[test]
    fn test_support_and_missing_boolean() {
        let data = sample();
        let lit = Literal::positive(Term::boolean(0));
        let (s, m) = data.support_and_missing(Side::Left, &lit);
        assert_eq!(rows(&s), vec![0, 3]);
        assert_eq!(rows(&m), vec![2]);
        let (s, m) = data.support_and_missing(Side::Left, &lit.flip());
        assert_eq!(rows(&s), vec![1, 4]);
        assert_eq!(rows(&m), vec![2]);
    }

    #[test]
    fn test_support_and_missing_numerical() {
        let data = sample();
        let lit = Literal::positive(Term::numerical(0, f64::NEG_INFINITY, 2.5).unwrap());
        let (s, m) = data.support_and_missing(Side::Right, &lit);
        assert_eq!(rows(&s), vec![0, 1]);
        assert_eq!(rows(&m), vec![3]);
    }

    #[test]
    fn test_feature_matrix_one_hot() {
        let data = sample();
        let fm = data.feature_matrix(Side::Left, &[0, 1]);
        assert_eq!(fm.n_rows, 5);
        // flag + blue, green, red
        assert_eq!(fm.n_features(), 4);
        assert_eq!(fm.features[0].kind, FeatureKind::Boolean);
        assert!(fm.features[0].values[2].is_nan());
        assert_eq!(fm.features[1].kind, FeatureKind::Category("blue".into()));
        assert_eq!(fm.features[3].values[..3], [1.0, 0.0, 1.0]);
        assert!(fm.features[3].values[3].is_nan());
    }

    #[test]
    fn test_usable_columns() {
        let data = sample();
        assert_eq!(data.usable_columns(Side::Left, 2, 2), vec![0, 1]);
        assert_eq!(data.usable_columns(Side::Left, 3, 1), Vec::<usize>::new());
        assert_eq!(data.usable_columns(Side::Right, 2, 2), vec![0]);
        assert_eq!(data.usable_columns(Side::Right, 3, 2), Vec::<usize>::new());
    }
}
