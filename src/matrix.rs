// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Sparse weighted matrix keyed by identifier
//!
//! A missing entry means weight 0. After [`SparseMatrix::pruned`], every
//! present entry is at least the pruning threshold. Rows and columns are kept
//! in id order so every traversal is reproducible.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Mapping `row -> {column -> weight}`
///
/// For the repository transition matrix the row is the destination and the
/// column the source: `r2r[dst][src]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseMatrix {
    rows: BTreeMap<String, BTreeMap<String, f64>>,
}

impl SparseMatrix {
    /// Create an empty matrix
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Weight at `(row, col)`, 0 when absent
    #[must_use]
    pub fn get(&self, row: &str, col: &str) -> f64 {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(0.0)
    }

    /// Whether `(row, col)` is explicitly stored
    #[must_use]
    pub fn contains(&self, row: &str, col: &str) -> bool {
        self.rows.get(row).is_some_and(|r| r.contains_key(col))
    }

    /// Accumulate `weight` into `(row, col)`
    pub fn add(&mut self, row: &str, col: &str, weight: f64) {
        *self
            .rows
            .entry(row.to_string())
            .or_default()
            .entry(col.to_string())
            .or_insert(0.0) += weight;
    }

    /// Overwrite `(row, col)`
    pub fn insert(&mut self, row: &str, col: &str, weight: f64) {
        self.rows
            .entry(row.to_string())
            .or_default()
            .insert(col.to_string(), weight);
    }

    /// Ensure `row` exists even if it stores nothing
    pub fn ensure_row(&mut self, row: &str) {
        self.rows.entry(row.to_string()).or_default();
    }

    /// Stored entries of one row
    #[must_use]
    pub fn row(&self, row: &str) -> Option<&BTreeMap<String, f64>> {
        self.rows.get(row)
    }

    /// All rows in id order
    pub fn rows(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, f64>)> {
        self.rows.iter()
    }

    /// Every stored `(row, col, weight)` triple
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.rows.iter().flat_map(|(row, cols)| {
            cols.iter()
                .map(move |(col, &w)| (row.as_str(), col.as_str(), w))
        })
    }

    /// Row ids in order
    pub fn row_ids(&self) -> impl Iterator<Item = &String> {
        self.rows.keys()
    }

    /// Every id appearing as a row or a column
    #[must_use]
    pub fn ids(&self) -> BTreeSet<String> {
        let mut ids: BTreeSet<String> = self.rows.keys().cloned().collect();
        for cols in self.rows.values() {
            ids.extend(cols.keys().cloned());
        }
        ids
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no rows are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of stored entries
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    /// Copy keeping only entries `>= threshold`; every row survives, possibly
    /// empty
    #[must_use]
    pub fn pruned(&self, threshold: f64) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|(row, cols)| {
                let kept = cols
                    .iter()
                    .filter(|(_, w)| **w >= threshold)
                    .map(|(c, &w)| (c.clone(), w))
                    .collect();
                (row.clone(), kept)
            })
            .collect();
        Self { rows }
    }

    /// Copy restricted to rows and columns in `keep`
    #[must_use]
    pub fn restricted(&self, keep: &BTreeSet<String>) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|(row, _)| keep.contains(*row))
            .map(|(row, cols)| {
                let kept = cols
                    .iter()
                    .filter(|(c, _)| keep.contains(*c))
                    .map(|(c, &w)| (c.clone(), w))
                    .collect();
                (row.clone(), kept)
            })
            .collect();
        Self { rows }
    }

    /// Sum of each column's entries
    #[must_use]
    pub fn column_sums(&self) -> BTreeMap<String, f64> {
        let mut sums = BTreeMap::new();
        for (_, col, w) in self.entries() {
            *sums.entry(col.to_string()).or_insert(0.0) += w;
        }
        sums
    }
}

impl FromIterator<(String, String, f64)> for SparseMatrix {
    fn from_iter<T: IntoIterator<Item = (String, String, f64)>>(iter: T) -> Self {
        let mut m = Self::new();
        for (row, col, w) in iter {
            m.add(&row, &col, w);
        }
        m
    }
}
