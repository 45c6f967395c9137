// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Multi-level clustering and tree assembly
//!
//! Level 1 clusters the repository matrix directly. Each later level
//! collapses the previous level's matrix onto its exemplars (rank-weighted)
//! and clusters again. The nested tree is read off from coarsest to finest.

use crate::cluster::{self, Assignment, ClusterParams};
use crate::error::{GitmapError, Result};
use crate::matrix::SparseMatrix;
use crate::rank::Ranking;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Rounds and damping for one hierarchy level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelParams {
    /// Message-passing rounds
    pub iterations: usize,
    /// Message damping
    pub damping: f64,
}

/// Default level schedule, finest first
#[must_use]
pub fn default_levels() -> Vec<LevelParams> {
    [(20, 0.85), (30, 0.95), (50, 0.97), (100, 0.99)]
        .into_iter()
        .map(|(iterations, damping)| LevelParams {
            iterations,
            damping,
        })
        .collect()
}

/// One clustered level
#[derive(Debug, Clone)]
pub struct Level {
    /// Matrix the level was clustered on
    pub r2r: SparseMatrix,
    /// Ranks of the level's points
    pub ranking: Ranking,
    /// Settled assignment
    pub assignment: Assignment,
}

/// Collapse `r2r` onto the roots of `assignment`
///
/// `w(e1, e2) = sum r2r[c1][c2] * rank[c2] / sum rank[c2]` over members `c1`
/// of `e1` and `c2` of `e2`; a zero denominator yields no entry. The rank of a
/// root is the sum of its members' ranks.
#[must_use]
pub fn collapse(
    r2r: &SparseMatrix,
    ranking: &Ranking,
    assignment: &Assignment,
) -> (SparseMatrix, Ranking) {
    let roots: BTreeSet<&String> = assignment.roots().collect();

    let mut rank_sum: BTreeMap<String, f64> = BTreeMap::new();
    for (root, members) in assignment.children() {
        if roots.contains(root) {
            let total = members.iter().map(|m| ranking.get(m)).sum();
            rank_sum.insert(root.clone(), total);
        }
    }

    let mut numer: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for (c1, row) in r2r.rows() {
        let Some(e1) = assignment.exemplar_of(c1) else {
            continue;
        };
        for (c2, w) in row {
            let Some(e2) = assignment.exemplar_of(c2) else {
                continue;
            };
            *numer.entry((e1, e2)).or_insert(0.0) += w * ranking.get(c2);
        }
    }

    let mut collapsed = SparseMatrix::new();
    for root in &roots {
        collapsed.ensure_row(root);
    }
    for ((e1, e2), n) in numer {
        let denom = rank_sum.get(e2).copied().unwrap_or(0.0);
        if denom > 0.0 {
            collapsed.add(e1, e2, n / denom);
        }
    }

    (collapsed, Ranking::from_scores(rank_sum))
}

/// Drives clustering across the level schedule
#[derive(Debug, Clone)]
pub struct HierarchyBuilder {
    initial_pref: f64,
    pruning: f64,
    levels: Vec<LevelParams>,
}

impl HierarchyBuilder {
    /// Create a builder from shared clustering settings and a level schedule
    #[must_use]
    pub fn new(initial_pref: f64, pruning: f64, levels: Vec<LevelParams>) -> Self {
        Self {
            initial_pref,
            pruning,
            levels,
        }
    }

    fn params(&self, level: LevelParams) -> ClusterParams {
        ClusterParams {
            initial_pref: self.initial_pref,
            pruning: self.pruning,
            damping: level.damping,
            iterations: level.iterations,
        }
    }

    /// Cluster every level, starting from the repository matrix and its ranks
    #[must_use]
    pub fn build(&self, r2r: SparseMatrix, ranking: Ranking) -> Hierarchy {
        let mut levels: Vec<Level> = Vec::with_capacity(self.levels.len());
        let (mut r2r, mut ranking) = (r2r, ranking);

        for (depth, &lp) in self.levels.iter().enumerate() {
            if let Some(prev) = levels.last() {
                (r2r, ranking) = collapse(&prev.r2r, &prev.ranking, &prev.assignment);
            }
            let assignment = cluster::cluster(&r2r, self.params(lp));
            info!(
                level = depth + 1,
                points = assignment.len(),
                clusters = assignment.roots().count(),
                "Built hierarchy level"
            );
            levels.push(Level {
                r2r: std::mem::take(&mut r2r),
                ranking: std::mem::take(&mut ranking),
                assignment,
            });
        }

        Hierarchy { levels }
    }
}

/// Every level produced by [`HierarchyBuilder::build`], finest first
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    levels: Vec<Level>,
}

impl Hierarchy {
    /// Levels, finest first
    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Nested tree under a synthetic root, with redundant levels collapsed
    ///
    /// # Errors
    ///
    /// Returns [`GitmapError::TreeConsistency`] when a node's only child
    /// carries a different name.
    pub fn tree(&self, root_name: &str) -> Result<ClusterNode> {
        let Some(top) = self.levels.last() else {
            return Ok(ClusterNode::leaf(root_name));
        };
        let children = top
            .assignment
            .roots()
            .map(|r| self.subtree(r, self.levels.len()).collapse())
            .collect::<Result<Vec<_>>>()?;
        Ok(ClusterNode::branch(root_name, children))
    }

    fn subtree(&self, name: &str, depth: usize) -> ClusterNode {
        if depth == 0 {
            return ClusterNode::leaf(name);
        }
        let members = self.levels[depth - 1]
            .assignment
            .children_of(name)
            .into_iter()
            .flatten()
            .map(|m| self.subtree(m, depth - 1))
            .collect();
        ClusterNode::branch(name, members)
    }
}

// =============================================================================
// Cluster tree
// =============================================================================

/// Node of the emitted tree; leaves are repository ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    /// Cluster or repository name
    pub name: String,
    /// Sub-clusters, absent on leaves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ClusterNode>>,
}

impl ClusterNode {
    /// A leaf
    #[must_use]
    pub fn leaf(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: None,
        }
    }

    /// An inner node
    #[must_use]
    pub fn branch(name: &str, children: Vec<ClusterNode>) -> Self {
        Self {
            name: name.to_string(),
            children: Some(children),
        }
    }

    /// True when this node has no children key
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Leaf names in depth-first order
    #[must_use]
    pub fn leaves(&self) -> Vec<&str> {
        match &self.children {
            None => vec![self.name.as_str()],
            Some(children) => children.iter().flat_map(ClusterNode::leaves).collect(),
        }
    }

    /// Longest root-to-leaf edge count
    #[must_use]
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .flatten()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Merge every node whose only child has the same name
    ///
    /// # Errors
    ///
    /// Returns [`GitmapError::TreeConsistency`] if a single child carries a
    /// different name.
    pub fn collapse(self) -> Result<Self> {
        let Some(children) = self.children else {
            return Ok(self);
        };
        let children = children
            .into_iter()
            .map(ClusterNode::collapse)
            .collect::<Result<Vec<_>>>()?;
        match <[ClusterNode; 1]>::try_from(children) {
            Ok([only]) => {
                if only.name != self.name {
                    return Err(GitmapError::TreeConsistency {
                        parent: self.name,
                        child: only.name,
                    });
                }
                Ok(Self {
                    name: self.name,
                    children: only.children,
                })
            }
            Err(children) => Ok(Self {
                name: self.name,
                children: Some(children),
            }),
        }
    }
}
