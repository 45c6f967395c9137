// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Strongly related repository pairs
//!
//! A repository `src` relates to `dst` through a user `u` who contributes to
//! `src` and either contributes to or stars `dst`. Pairs are reported only
//! when the relation clears the threshold in both directions.

use crate::graph::{LinkGraph, LinkKind, NodeKind};
use crate::matrix::SparseMatrix;
use tracing::info;

/// Relatedness matrix `rel[dst][src]`
#[must_use]
pub fn relatedness(graph: &LinkGraph, contrib_prob: f64) -> SparseMatrix {
    let mut rel = SparseMatrix::new();
    for dst in graph.nodes_of(NodeKind::Repo) {
        let dst_id = &graph.node(dst).id;
        rel.ensure_row(dst_id);
        for (kind, factor) in [
            (LinkKind::Contribution, contrib_prob),
            (LinkKind::Star, 1.0 - contrib_prob),
        ] {
            for (user, user_weight) in graph.incoming(dst, kind) {
                for (src, share) in graph.incoming(user, LinkKind::Share) {
                    rel.add(dst_id, &graph.node(src).id, factor * share * user_weight);
                }
            }
        }
    }
    rel
}

/// Pairs `(a, b)` with `a < b` whose relatedness clears `min_weight` both
/// ways, strongest combined weight first
#[must_use]
pub fn related_pairs(graph: &LinkGraph, contrib_prob: f64, min_weight: f64) -> Vec<(String, String)> {
    let rel = relatedness(graph, contrib_prob).pruned(min_weight);

    let mut pairs: Vec<(String, String, f64)> = Vec::new();
    for (a, b, w_ab) in rel.entries() {
        if a < b && rel.contains(b, a) {
            pairs.push((a.to_string(), b.to_string(), w_ab + rel.get(b, a)));
        }
    }
    pairs.sort_by(|x, y| {
        y.2.total_cmp(&x.2)
            .then_with(|| x.0.cmp(&y.0))
            .then_with(|| x.1.cmp(&y.1))
    });

    info!(pairs = pairs.len(), "Found related repository pairs");
    pairs.into_iter().map(|(a, b, _)| (a, b)).collect()
}
