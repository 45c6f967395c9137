// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Gitrank: damped power iteration over repository graphs
//!
//! Two variants share the same update rule
//! `rank[n] = (1 - d) / N + d * sum(rank[src] * w(src -> n))`:
//! - [`RankPropagator`] over a single blended matrix (`r2r` or a collapsed
//!   level), and
//! - [`BipartiteRanker`] over the user/repository [`LinkGraph`], where
//!   repositories mix contribution and star flow by `contrib_prob`.
//!
//! Both run a fixed number of synchronous rounds; there is no convergence
//! test.

use crate::graph::{LinkGraph, LinkKind, NodeKind};
use crate::matrix::SparseMatrix;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Rank vector keyed by node id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Ranking {
    scores: BTreeMap<String, f64>,
}

impl Ranking {
    /// Wrap an existing score map
    #[must_use]
    pub fn from_scores(scores: BTreeMap<String, f64>) -> Self {
        Self { scores }
    }

    /// Score of `id`, 0 when unranked
    #[must_use]
    pub fn get(&self, id: &str) -> f64 {
        self.scores.get(id).copied().unwrap_or(0.0)
    }

    /// Sum over every node
    #[must_use]
    pub fn total(&self) -> f64 {
        self.scores.values().sum()
    }

    /// Number of ranked nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// True when nothing is ranked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Scores in id order
    pub fn iter(&self) -> impl Iterator<Item = (&String, f64)> {
        self.scores.iter().map(|(id, &s)| (id, s))
    }

    /// Scores ordered highest first, ties by id
    #[must_use]
    pub fn sorted(&self) -> Vec<(&str, f64)> {
        let mut out: Vec<(&str, f64)> = self.scores.iter().map(|(id, &s)| (id.as_str(), s)).collect();
        sort_desc(&mut out);
        out
    }
}

fn sort_desc<T: Ord>(v: &mut [(T, f64)]) {
    v.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}

// =============================================================================
// Single matrix
// =============================================================================

/// Power iteration over `matrix[dst][src]`
pub struct RankPropagator<'a> {
    matrix: &'a SparseMatrix,
    damping: f64,
    ranks: BTreeMap<String, f64>,
    round: usize,
}

impl<'a> RankPropagator<'a> {
    /// Start from the uniform vector over every id in `matrix`
    #[must_use]
    pub fn new(matrix: &'a SparseMatrix, damping: f64) -> Self {
        let ids = matrix.ids();
        let n = ids.len();
        let ranks = ids
            .into_iter()
            .map(|id| (id, 1.0 / n as f64))
            .collect();
        Self {
            matrix,
            damping,
            ranks,
            round: 0,
        }
    }

    /// One synchronous update
    pub fn step(&mut self) {
        let n = self.ranks.len() as f64;
        let base = (1.0 - self.damping) / n;
        let next: BTreeMap<String, f64> = self
            .ranks
            .keys()
            .map(|id| {
                let inflow: f64 = self
                    .matrix
                    .row(id)
                    .into_iter()
                    .flatten()
                    .map(|(src, w)| self.ranks.get(src).copied().unwrap_or(0.0) * w)
                    .sum();
                (id.clone(), base + self.damping * inflow)
            })
            .collect();
        self.ranks = next;
        self.round += 1;
        debug!(
            round = self.round,
            total = self.ranks.values().sum::<f64>(),
            "Rank round"
        );
    }

    /// Current vector
    #[must_use]
    pub fn ranks(&self) -> &BTreeMap<String, f64> {
        &self.ranks
    }

    /// Rounds completed so far
    #[must_use]
    pub fn round(&self) -> usize {
        self.round
    }

    /// Run `iterations` rounds and return the final vector
    #[must_use]
    pub fn run(mut self, iterations: usize) -> Ranking {
        for _ in 0..iterations {
            self.step();
        }
        info!(nodes = self.ranks.len(), rounds = self.round, "Computed gitrank");
        Ranking::from_scores(self.ranks)
    }
}

// =============================================================================
// Bipartite graph
// =============================================================================

/// A user's rank with the repositories that feed it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRank {
    /// User id
    pub id: String,
    /// Final rank
    pub rank: f64,
    /// `(repo, damping * rank[repo] * share)`, highest first
    pub sources: Vec<(String, f64)>,
}

/// Output of [`BipartiteRanker::run`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BipartiteRanks {
    /// Repository ranks
    pub repos: Ranking,
    /// User ranks with breakdowns, highest first
    pub users: Vec<UserRank>,
}

/// Power iteration over the bipartite user/repository graph
pub struct BipartiteRanker<'a> {
    graph: &'a LinkGraph,
    damping: f64,
    contrib_prob: f64,
    ranks: Vec<f64>,
    round: usize,
}

impl<'a> BipartiteRanker<'a> {
    /// Start from the uniform vector over every node
    #[must_use]
    pub fn new(graph: &'a LinkGraph, damping: f64, contrib_prob: f64) -> Self {
        let n = graph.node_count();
        Self {
            graph,
            damping,
            contrib_prob,
            ranks: vec![1.0 / n as f64; n],
            round: 0,
        }
    }

    fn inflow(&self, idx: petgraph::graph::NodeIndex, kind: LinkKind) -> f64 {
        self.graph
            .incoming(idx, kind)
            .into_iter()
            .map(|(src, w)| self.ranks[src.index()] * w)
            .sum()
    }

    /// One synchronous update
    pub fn step(&mut self) {
        let n = self.ranks.len() as f64;
        let base = (1.0 - self.damping) / n;
        let d = self.damping;
        let cp = self.contrib_prob;
        let next: Vec<f64> = self
            .graph
            .inner()
            .node_indices()
            .map(|idx| match self.graph.node(idx).kind {
                NodeKind::User => base + d * self.inflow(idx, LinkKind::Share),
                NodeKind::Repo => {
                    base + d * cp * self.inflow(idx, LinkKind::Contribution)
                        + d * (1.0 - cp) * self.inflow(idx, LinkKind::Star)
                }
            })
            .collect();
        self.ranks = next;
        self.round += 1;
        debug!(
            round = self.round,
            total = self.ranks.iter().sum::<f64>(),
            "Bipartite rank round"
        );
    }

    /// Rank of one node in the current vector
    #[must_use]
    pub fn rank_of(&self, kind: NodeKind, id: &str) -> Option<f64> {
        self.graph
            .index_of(kind, id)
            .map(|idx| self.ranks[idx.index()])
    }

    /// Sum of the current vector
    #[must_use]
    pub fn total(&self) -> f64 {
        self.ranks.iter().sum()
    }

    /// Run `iterations` rounds and split the result by node kind
    #[must_use]
    pub fn run(mut self, iterations: usize) -> BipartiteRanks {
        for _ in 0..iterations {
            self.step();
        }

        let mut repos = BTreeMap::new();
        for idx in self.graph.nodes_of(NodeKind::Repo) {
            repos.insert(self.graph.node(idx).id.clone(), self.ranks[idx.index()]);
        }

        let mut users: Vec<UserRank> = self
            .graph
            .nodes_of(NodeKind::User)
            .into_iter()
            .map(|idx| {
                let mut sources: Vec<(String, f64)> = self
                    .graph
                    .incoming(idx, LinkKind::Share)
                    .into_iter()
                    .map(|(repo, w)| {
                        (
                            self.graph.node(repo).id.clone(),
                            self.damping * self.ranks[repo.index()] * w,
                        )
                    })
                    .collect();
                sort_desc(&mut sources);
                UserRank {
                    id: self.graph.node(idx).id.clone(),
                    rank: self.ranks[idx.index()],
                    sources,
                }
            })
            .collect();
        users.sort_by(|a, b| b.rank.total_cmp(&a.rank).then_with(|| a.id.cmp(&b.id)));

        info!(
            repos = repos.len(),
            users = users.len(),
            rounds = self.round,
            "Computed bipartite gitrank"
        );
        BipartiteRanks {
            repos: Ranking::from_scores(repos),
            users,
        }
    }
}
