// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Graph construction from cleaned contributor and star records
//!
//! Two graphs come out of a corpus:
//! - the repository-to-repository transition matrix (`r2r`), blending
//!   co-contribution flow with "shadow" star flow, used for clustering and
//!   the collapsed gitrank
//! - the bipartite user/repository [`LinkGraph`], used to rank users and
//!   repositories together and to find strongly related pairs

use crate::corpus::Corpus;
use crate::matrix::SparseMatrix;
use crate::types::BotList;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Outgoing distributions of one repository
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outbound {
    /// Where this repository's contributors also contribute
    pub contriblist: BTreeMap<String, f64>,
    /// Where this repository's contributors tend to star
    pub shadow_starlist: BTreeMap<String, f64>,
    /// `contriblist` is the uniform fallback
    pub uniform_contrib: bool,
    /// `shadow_starlist` is the uniform fallback
    pub uniform_shadow: bool,
}

/// Output of [`GraphBuilder::build`]
#[derive(Debug, Clone, Default)]
pub struct TransitionGraph {
    /// Per-repository outgoing distributions
    pub outbound: BTreeMap<String, Outbound>,
    /// `r2r[dst][src]`
    pub r2r: SparseMatrix,
}

/// Builds weighted graphs over the usable part of a cleaned corpus
pub struct GraphBuilder<'a> {
    corpus: &'a Corpus,
    bots: &'a BotList,
    contrib_prob: f64,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder; `contrib_prob` weighs contribution flow against
    /// shadow star flow
    #[must_use]
    pub fn new(corpus: &'a Corpus, bots: &'a BotList, contrib_prob: f64) -> Self {
        Self {
            corpus,
            bots,
            contrib_prob,
        }
    }

    /// Compute the outgoing distributions and the aggregate `r2r` matrix
    #[must_use]
    pub fn build(&self) -> TransitionGraph {
        let outbound = self.outbound();
        let r2r = self.transition_matrix(&outbound);
        info!(
            repos = outbound.len(),
            entries = r2r.nnz(),
            "Built repository transition matrix"
        );
        TransitionGraph { outbound, r2r }
    }

    /// For each non-bot contributor, the usable repositories they contribute to
    #[must_use]
    pub fn contributions_by_user(&self) -> BTreeMap<String, Vec<String>> {
        let mut by_user: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (repo_id, repo) in self.corpus.usable_repos() {
            for (user, _) in repo.contributors() {
                if !self.bots.contains(user) {
                    by_user.entry(user.clone()).or_default().push(repo_id.clone());
                }
            }
        }
        by_user
    }

    /// `contriblist` and `shadow_starlist` for every usable repository
    #[must_use]
    pub fn outbound(&self) -> BTreeMap<String, Outbound> {
        let by_user = self.contributions_by_user();
        let uniform = self.uniform();

        let mut out = BTreeMap::new();
        for (repo_id, _) in self.corpus.usable_repos() {
            let shadow = self.shadow_starlist(repo_id);
            let contrib = self.contriblist(repo_id, &by_user);
            let uniform_shadow = shadow.is_none();
            let uniform_contrib = contrib.is_none();
            if uniform_shadow || uniform_contrib {
                debug!(
                    repo = %repo_id,
                    uniform_shadow, uniform_contrib, "Falling back to uniform distribution"
                );
            }
            out.insert(
                repo_id.clone(),
                Outbound {
                    contriblist: contrib.unwrap_or_else(|| uniform.clone()),
                    shadow_starlist: shadow.unwrap_or_else(|| uniform.clone()),
                    uniform_contrib,
                    uniform_shadow,
                },
            );
        }
        out
    }

    /// Blend outgoing distributions into `r2r[dst][src]`
    #[must_use]
    pub fn transition_matrix(&self, outbound: &BTreeMap<String, Outbound>) -> SparseMatrix {
        let mut r2r = SparseMatrix::new();
        for (src, dists) in outbound {
            for (dst, p) in &dists.contriblist {
                r2r.add(dst, src, self.contrib_prob * p);
            }
            for (dst, p) in &dists.shadow_starlist {
                r2r.add(dst, src, (1.0 - self.contrib_prob) * p);
            }
        }
        r2r
    }

    /// Uniform distribution over every usable repository
    fn uniform(&self) -> BTreeMap<String, f64> {
        let n = self.corpus.num_usable_repos();
        if n == 0 {
            return BTreeMap::new();
        }
        let mass = 1.0 / n as f64;
        self.corpus
            .usable_repos()
            .map(|(id, _)| (id.clone(), mass))
            .collect()
    }

    /// Where the contributors of `repo_id` star, weighted by their share of
    /// contribution; `None` when no contributor qualifies
    fn shadow_starlist(&self, repo_id: &str) -> Option<BTreeMap<String, f64>> {
        let repo = self.corpus.repos.get(repo_id)?;
        let mut dist: BTreeMap<String, f64> = BTreeMap::new();
        let mut weight_sum = 0.0;

        for (user_id, contribution) in repo.contributors() {
            if self.bots.contains(user_id) {
                continue;
            }
            let Some(user) = self.corpus.usable_user(user_id) else {
                continue;
            };
            let starred: Vec<&String> = user
                .stars()
                .filter(|s| self.corpus.is_usable_repo(s))
                .collect();
            if starred.is_empty() {
                continue;
            }
            let w = contribution.log1p_contributions;
            weight_sum += w;
            let share = w / starred.len() as f64;
            for star in starred {
                *dist.entry(star.clone()).or_insert(0.0) += share;
            }
        }

        normalize(dist, weight_sum)
    }

    /// Where the contributors of `repo_id` also contribute; `None` when no
    /// contributor qualifies
    fn contriblist(
        &self,
        repo_id: &str,
        by_user: &BTreeMap<String, Vec<String>>,
    ) -> Option<BTreeMap<String, f64>> {
        let repo = self.corpus.repos.get(repo_id)?;
        let mut dist: BTreeMap<String, f64> = BTreeMap::new();
        let mut weight_sum = 0.0;

        for (user_id, contribution) in repo.contributors() {
            if self.bots.contains(user_id) {
                continue;
            }
            let Some(targets) = by_user.get(user_id).filter(|t| !t.is_empty()) else {
                continue;
            };
            let w = contribution.log1p_contributions;
            weight_sum += w;
            let share = w / targets.len() as f64;
            for target in targets {
                *dist.entry(target.clone()).or_insert(0.0) += share;
            }
        }

        normalize(dist, weight_sum)
    }

    /// Build the bipartite user/repository graph
    #[must_use]
    pub fn link_graph(&self) -> LinkGraph {
        LinkGraph::build(self.corpus, self.bots)
    }
}

/// Divide every mass by `total`; an empty or weightless distribution yields
/// `None` so the caller can fall back
fn normalize(mut dist: BTreeMap<String, f64>, total: f64) -> Option<BTreeMap<String, f64>> {
    if dist.is_empty() || total <= 0.0 {
        return None;
    }
    for v in dist.values_mut() {
        *v /= total;
    }
    Some(dist)
}

// =============================================================================
// Bipartite link graph
// =============================================================================

/// Node side in the bipartite graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    /// A contributor or starrer
    User,
    /// A repository with contributors
    Repo,
}

/// Node payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNode {
    /// User or repository id
    pub id: String,
    /// Which side of the graph
    pub kind: NodeKind,
}

/// Edge kinds; edges point in the direction rank flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// repo -> contributor, weighted by the contributor's share of the repo
    Share,
    /// contributor -> repo, weighted by `1 / repos contributed to`
    Contribution,
    /// starrer -> repo, weighted by `1 / usable repos starred`
    Star,
}

/// Edge payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    /// Edge kind
    pub kind: LinkKind,
    /// Edge weight
    pub weight: f64,
}

/// Bipartite user/repository graph with petgraph backing
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    graph: DiGraph<LinkNode, Link>,
    node_indices: BTreeMap<(NodeKind, String), NodeIndex>,
}

impl LinkGraph {
    /// Build from the usable records of a cleaned corpus
    #[must_use]
    pub fn build(corpus: &Corpus, bots: &BotList) -> Self {
        let mut lg = Self::default();

        let repos: Vec<(&String, &crate::types::RepoRecord)> = corpus
            .usable_repos()
            .filter(|(_, r)| r.has_contributors())
            .collect();

        let mut contrib_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for (_, repo) in &repos {
            for (user, _) in repo.contributors() {
                if !bots.contains(user) {
                    *contrib_counts.entry(user.as_str()).or_insert(0) += 1;
                }
            }
        }

        for (repo_id, repo) in &repos {
            let repo_idx = lg.ensure_node(NodeKind::Repo, repo_id);
            let total = repo.total_contribs();
            for (user, contribution) in repo.contributors() {
                if bots.contains(user) {
                    continue;
                }
                let user_idx = lg.ensure_node(NodeKind::User, user);
                let share = if total > 0.0 {
                    contribution.log1p_contributions / total
                } else {
                    0.0
                };
                lg.graph.add_edge(
                    repo_idx,
                    user_idx,
                    Link {
                        kind: LinkKind::Share,
                        weight: share,
                    },
                );
                let count = contrib_counts.get(user.as_str()).copied().unwrap_or(1);
                lg.graph.add_edge(
                    user_idx,
                    repo_idx,
                    Link {
                        kind: LinkKind::Contribution,
                        weight: 1.0 / count as f64,
                    },
                );
            }
        }

        for (user_id, user) in corpus.usable_users() {
            if bots.contains(user_id) {
                continue;
            }
            let starcount = user.stars().filter(|s| corpus.is_usable_repo(s)).count();
            if starcount == 0 {
                continue;
            }
            let weight = 1.0 / starcount as f64;
            for star in user.stars() {
                let Some(repo_idx) = lg.index_of(NodeKind::Repo, star) else {
                    continue;
                };
                let user_idx = lg.ensure_node(NodeKind::User, user_id);
                lg.graph.add_edge(
                    user_idx,
                    repo_idx,
                    Link {
                        kind: LinkKind::Star,
                        weight,
                    },
                );
            }
        }

        info!(
            nodes = lg.node_count(),
            edges = lg.edge_count(),
            "Built bipartite link graph"
        );
        lg
    }

    fn ensure_node(&mut self, kind: NodeKind, id: &str) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(&(kind, id.to_string())) {
            return idx;
        }
        let idx = self.graph.add_node(LinkNode {
            id: id.to_string(),
            kind,
        });
        self.node_indices.insert((kind, id.to_string()), idx);
        idx
    }

    /// Index of a node, if present
    #[must_use]
    pub fn index_of(&self, kind: NodeKind, id: &str) -> Option<NodeIndex> {
        self.node_indices.get(&(kind, id.to_string())).copied()
    }

    /// Node payload at `idx`
    #[must_use]
    pub fn node(&self, idx: NodeIndex) -> &LinkNode {
        &self.graph[idx]
    }

    /// Indices of one side of the graph, in id order
    #[must_use]
    pub fn nodes_of(&self, kind: NodeKind) -> Vec<NodeIndex> {
        self.node_indices
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, &idx)| idx)
            .collect()
    }

    /// Incoming edges of `kind` into `idx`, as `(source, weight)`
    #[must_use]
    pub fn incoming(&self, idx: NodeIndex, kind: LinkKind) -> Vec<(NodeIndex, f64)> {
        let mut edges: Vec<(NodeIndex, f64)> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| e.weight().kind == kind)
            .map(|e| (e.source(), e.weight().weight))
            .collect();
        edges.sort_by(|a, b| self.graph[a.0].id.cmp(&self.graph[b.0].id));
        edges
    }

    /// Total number of nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Total number of edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Underlying petgraph
    #[must_use]
    pub fn inner(&self) -> &DiGraph<LinkNode, Link> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::fixtures::{repo, user};

    const TOL: f64 = 1e-9;

    /// X contributes equally to A and B and stars B and C; Y maintains C alone
    fn scenario() -> Corpus {
        let mut c = Corpus::default();
        c.repos.insert("A".into(), repo(&[("X", 1.0)]));
        c.repos.insert("B".into(), repo(&[("X", 1.0)]));
        c.repos.insert("C".into(), repo(&[("Y", 2.0)]));
        c.users.insert("X".into(), user(&["B", "C"]));
        c.users.insert("Y".into(), user(&[]));
        c
    }

    fn sum(d: &BTreeMap<String, f64>) -> f64 {
        d.values().sum()
    }

    #[test]
    fn test_distributions_sum_to_one() {
        let c = scenario();
        let bots = BotList::empty();
        let out = GraphBuilder::new(&c, &bots, 1.0 / 3.0).outbound();
        for (id, o) in &out {
            assert!((sum(&o.contriblist) - 1.0).abs() < TOL, "{id} contriblist");
            assert!((sum(&o.shadow_starlist) - 1.0).abs() < TOL, "{id} shadow");
        }
    }

    #[test]
    fn test_contriblist_splits_by_contributor_reach() {
        let c = scenario();
        let bots = BotList::empty();
        let out = GraphBuilder::new(&c, &bots, 1.0 / 3.0).outbound();
        let a = &out["A"];
        assert!((a.contriblist["A"] - 0.5).abs() < TOL);
        assert!((a.contriblist["B"] - 0.5).abs() < TOL);
        assert!(!a.uniform_contrib);
        assert!((out["C"].contriblist["C"] - 1.0).abs() < TOL);
    }

    #[test]
    fn test_uniform_fallback_without_starring_contributors() {
        let c = scenario();
        let bots = BotList::empty();
        let out = GraphBuilder::new(&c, &bots, 1.0 / 3.0).outbound();
        let cc = &out["C"];
        assert!(cc.uniform_shadow);
        assert_eq!(cc.shadow_starlist.len(), 3);
        for mass in cc.shadow_starlist.values() {
            assert!((mass - 1.0 / 3.0).abs() < TOL);
        }
    }

    #[test]
    fn test_bot_contributors_do_not_qualify() {
        let mut c = scenario();
        c.repos.insert("D".into(), repo(&[("dependabot", 1.0)]));
        c.users.insert("dependabot".into(), user(&["A"]));
        let bots = BotList::new(["dependabot"]);
        let out = GraphBuilder::new(&c, &bots, 1.0 / 3.0).outbound();
        assert!(out["D"].uniform_shadow);
        assert!(out["D"].uniform_contrib);
        assert!((out["D"].contriblist["A"] - 0.25).abs() < TOL);
    }

    #[test]
    fn test_r2r_blends_both_signals() {
        let c = scenario();
        let bots = BotList::empty();
        let cp = 1.0 / 3.0;
        let g = GraphBuilder::new(&c, &bots, cp).build();

        // B is reached from A by co-contribution and by X's star
        let expected_ba = cp * 0.5 + (1.0 - cp) * 0.5;
        assert!((g.r2r.get("B", "A") - expected_ba).abs() < TOL);
        // C is reached from A only through X's star
        assert!((g.r2r.get("C", "A") - (1.0 - cp) * 0.5).abs() < TOL);
        // A's own shadow flow never returns to A: X does not star it
        assert!((g.r2r.get("A", "A") - cp * 0.5).abs() < TOL);

        // every source distributes exactly one unit
        for (src, total) in g.r2r.column_sums() {
            assert!((total - 1.0).abs() < TOL, "column {src} sums to {total}");
        }
    }

    #[test]
    fn test_link_graph_weights() {
        let mut c = scenario();
        c.users.insert("Z".into(), user(&["A", "C"]));
        let bots = BotList::empty();
        let lg = LinkGraph::build(&c, &bots);

        let a = lg.index_of(NodeKind::Repo, "A").unwrap();
        let x = lg.index_of(NodeKind::User, "X").unwrap();

        let contributors = lg.incoming(a, LinkKind::Contribution);
        assert_eq!(contributors, vec![(x, 0.5)]);

        let starrers = lg.incoming(a, LinkKind::Star);
        assert_eq!(starrers.len(), 1);
        assert_eq!(lg.node(starrers[0].0).id, "Z");
        assert!((starrers[0].1 - 0.5).abs() < TOL);

        let shares = lg.incoming(x, LinkKind::Share);
        assert_eq!(shares.len(), 2);
        assert!(shares.iter().all(|(_, w)| (*w - 1.0).abs() < TOL));
        assert_eq!(lg.nodes_of(NodeKind::Repo).len(), 3);
        assert_eq!(lg.nodes_of(NodeKind::User).len(), 3);
    }
}
