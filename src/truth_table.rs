//! Partial truth tables and their minimization.
//!
//! A [`TruthTable`] is an OR of rows, each row an AND over columns: a [`Cell::True`]
//! cell is a positive literal, [`Cell::False`] a negated literal and [`Cell::Any`]
//! (don't-care) leaves the column out of that row's conjunction.
//!
//! Four reduction passes shrink a table without changing the set of full assignments
//! it accepts:
//!
//! - [`fold_rows`](TruthTable::fold_rows) merges two rows differing in one column.
//! - [`fold_cols`](TruthTable::fold_cols) widens a row against a neighbour at distance two.
//! - [`subs_rows`](TruthTable::subs_rows) deletes rows subsumed by a more general row.
//! - [`triples_rows`](TruthTable::triples_rows) deletes a row covered by the consensus of two others.
//!
//! [`simplify`](TruthTable::simplify) runs them in sequence to a fixpoint.

use std::fmt;

/// A truth-table cell.
///
/// The derived order `Any < False < True` is used when checking that a pair of rows
/// covers a third one.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Cell {
    Any,
    False,
    True,
}

impl Cell {
    pub fn from_bool(b: bool) -> Self {
        if b {
            Cell::True
        } else {
            Cell::False
        }
    }

    pub fn is_any(self) -> bool {
        self == Cell::Any
    }

    /// Returns true if a cell with this value accepts the column value `b`.
    pub fn accepts(self, b: bool) -> bool {
        match self {
            Cell::Any => true,
            Cell::True => b,
            Cell::False => !b,
        }
    }
}

impl From<i8> for Cell {
    fn from(v: i8) -> Self {
        match v {
            1 => Cell::True,
            0 => Cell::False,
            _ => Cell::Any,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Any => write!(f, "-"),
            Cell::False => write!(f, "0"),
            Cell::True => write!(f, "1"),
        }
    }
}

/// A disjunction of partial conjunctions over `n_cols` columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruthTable {
    n_cols: usize,
    rows: Vec<Vec<Cell>>,
}

impl TruthTable {
    pub fn new(n_cols: usize) -> Self {
        TruthTable { n_cols, rows: Vec::new() }
    }

    /// Builds a table from rows of `1` / `0` / `-1` (don't-care) values.
    ///
    /// # Panics
    ///
    /// Panics if the rows do not all have the same length.
    pub fn from_values(rows: &[&[i8]]) -> Self {
        let n_cols = rows.first().map_or(0, |r| r.len());
        let mut table = TruthTable::new(n_cols);
        for row in rows {
            table.push_row(row.iter().map(|&v| Cell::from(v)).collect());
        }
        table
    }

    /// Appends a row.
    ///
    /// # Panics
    ///
    /// Panics if the row length differs from the table width.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        assert_eq!(row.len(), self.n_cols, "Row width must match the table");
        self.rows.push(row);
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Returns the table as `1` / `0` / `-1` values.
    pub fn to_values(&self) -> Vec<Vec<i8>> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|c| match c {
                        Cell::True => 1,
                        Cell::False => 0,
                        Cell::Any => -1,
                    })
                    .collect()
            })
            .collect()
    }

    /// Returns true if some row accepts the full assignment.
    pub fn accepts(&self, assignment: &[bool]) -> bool {
        self.rows
            .iter()
            .any(|row| row.iter().zip(assignment).all(|(c, &b)| c.accepts(b)))
    }

    fn any_count(row: &[Cell]) -> usize {
        row.iter().filter(|c| c.is_any()).count()
    }

    /// Row indices ordered by decreasing don't-care count (stable).
    fn rows_by_generality(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by_key(|&r| std::cmp::Reverse(Self::any_count(&self.rows[r])));
        order
    }

    fn retain_rows(&mut self, keep: &[bool]) {
        let mut flags = keep.iter();
        self.rows.retain(|_| flags.next().copied().unwrap_or(true));
    }

    /// Merges every `1`-row with each `0`-row identical to it on all other columns:
    /// the `1`-row's cell becomes don't-care and the `0`-row is deleted.
    ///
    /// Columns are processed from the most balanced `1`/`0` split to the least, as
    /// measured on the input table (don't-care cells count as `-1` in column sums).
    pub fn fold_rows(mut self) -> (Self, bool) {
        let n = self.rows.len() as f64;
        let mut order: Vec<(usize, f64)> = (0..self.n_cols)
            .map(|c| {
                let sum: f64 = self
                    .rows
                    .iter()
                    .map(|row| match row[c] {
                        Cell::True => 1.0,
                        Cell::False => 0.0,
                        Cell::Any => -1.0,
                    })
                    .sum();
                (c, (0.5 * n - sum).abs())
            })
            .collect();
        order.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut changed = false;
        for (col, _) in order {
            let ones: Vec<usize> = (0..self.rows.len()).filter(|&r| self.rows[r][col] == Cell::True).collect();
            let zeros: Vec<usize> = (0..self.rows.len()).filter(|&r| self.rows[r][col] == Cell::False).collect();
            let same_elsewhere = |a: &[Cell], b: &[Cell]| a.iter().zip(b).enumerate().all(|(c, (x, y))| c == col || x == y);
            let mut marks = Vec::new();
            let mut keep = vec![true; self.rows.len()];
            for &l in &ones {
                for &r in &zeros {
                    if same_elsewhere(&self.rows[l], &self.rows[r]) {
                        marks.push(l);
                        keep[r] = false;
                    }
                }
            }
            if marks.is_empty() {
                continue;
            }
            changed = true;
            for l in marks {
                self.rows[l][col] = Cell::Any;
            }
            self.retain_rows(&keep);
        }
        (self, changed)
    }

    /// Widens rows against neighbours at distance exactly two.
    ///
    /// For an ordered pair `(r0, r1)` differing in exactly two columns, where the only
    /// don't-care among those four cells is in `r1`, the cell of `r0` in the *other*
    /// differing column becomes don't-care. Each row is widened at most once per pass
    /// and all widenings are applied together.
    pub fn fold_cols(mut self) -> (Self, bool) {
        let mut marks: Vec<Option<usize>> = vec![None; self.rows.len()];
        for r0 in 0..self.rows.len() {
            for r1 in 0..self.rows.len() {
                if r0 == r1 || marks[r0].is_some() {
                    continue;
                }
                let diff: Vec<usize> = (0..self.n_cols).filter(|&c| self.rows[r0][c] != self.rows[r1][c]).collect();
                let [c0, c1] = diff[..] else {
                    continue;
                };
                let block = [
                    self.rows[r0][c0],
                    self.rows[r0][c1],
                    self.rows[r1][c0],
                    self.rows[r1][c1],
                ];
                let anys: Vec<usize> = (0..4).filter(|&i| block[i].is_any()).collect();
                match anys[..] {
                    [3] => marks[r0] = Some(c0),
                    [2] => marks[r0] = Some(c1),
                    _ => {}
                }
            }
        }
        let mut changed = false;
        for (r, mark) in marks.into_iter().enumerate() {
            if let Some(c) = mark {
                self.rows[r][c] = Cell::Any;
                changed = true;
            }
        }
        (self, changed)
    }

    /// Deletes every row identical to a more general surviving row on that row's
    /// defined columns.
    pub fn subs_rows(mut self) -> (Self, bool) {
        let mut keep = vec![true; self.rows.len()];
        for row in self.rows_by_generality() {
            if !keep[row] {
                continue;
            }
            let defined: Vec<usize> = (0..self.n_cols).filter(|&c| !self.rows[row][c].is_any()).collect();
            for p in 0..self.rows.len() {
                if p != row && defined.iter().all(|&c| self.rows[p][c] == self.rows[row][c]) {
                    keep[p] = false;
                }
            }
        }
        let changed = keep.iter().any(|k| !k);
        self.retain_rows(&keep);
        (self, changed)
    }

    /// Deletes one row covered by the consensus of two other rows.
    ///
    /// A pivot `r` is covered by `(p0, p1)` when the pair conflicts in exactly one
    /// column `k` where `r` is don't-care, both are don't-care on every other column
    /// where `r` is, and on each column where `r` is defined each of `p0`, `p1` is
    /// either don't-care or equal to `r`, with at least one of them defined.
    pub fn triples_rows(mut self) -> (Self, bool) {
        for row in self.rows_by_generality() {
            if let Some((p0, p1)) = self.covering_pair(row) {
                log::trace!("Row {} covered by rows {} and {}", row, p0, p1);
                self.rows.remove(row);
                return (self, true);
            }
        }
        (self, false)
    }

    fn covering_pair(&self, row: usize) -> Option<(usize, usize)> {
        let pivot = &self.rows[row];
        if Self::any_count(pivot) == 0 {
            return None;
        }
        for p0 in 0..self.rows.len() {
            for p1 in (p0 + 1)..self.rows.len() {
                if p0 == row || p1 == row {
                    continue;
                }
                let (a, b) = (&self.rows[p0], &self.rows[p1]);
                let mut conflicts = 0;
                let covered = (0..self.n_cols).all(|c| {
                    if pivot[c].is_any() {
                        if a[c] == b[c] {
                            a[c].is_any()
                        } else if a[c].is_any() || b[c].is_any() {
                            false
                        } else {
                            conflicts += 1;
                            true
                        }
                    } else if a[c] == b[c] {
                        a[c] == pivot[c]
                    } else {
                        a[c].min(b[c]).is_any() && a[c].max(b[c]) == pivot[c]
                    }
                });
                if covered && conflicts == 1 {
                    return Some((p0, p1));
                }
            }
        }
        None
    }

    /// Runs all four passes in sequence until none changes the table.
    ///
    /// Tables with at most two rows are returned unchanged.
    pub fn simplify(self) -> Self {
        let mut table = self;
        if table.n_rows() <= 2 {
            return table;
        }
        let mut round = 0;
        loop {
            let (t, c0) = table.fold_rows();
            let (t, c1) = t.fold_cols();
            let (t, c2) = t.subs_rows();
            let (t, c3) = t.triples_rows();
            table = t;
            round += 1;
            log::trace!(
                "Simplify round {}: {} rows, changed [{}, {}, {}, {}]",
                round,
                table.n_rows(),
                c0,
                c1,
                c2,
                c3
            );
            if !(c0 || c1 || c2 || c3) {
                break;
            }
        }
        table
    }
}

impl fmt::Display for TruthTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            for c in row {
                write!(f, "{}", c)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
