// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Affinity propagation over a pruned transition matrix
//!
//! Points are matrix ids. A point's candidate exemplars are itself (with
//! similarity `initial_pref`) plus every `e` with `r2r[e][point]` at or above
//! the pruning threshold. Responsibility and availability messages are
//! exchanged for a fixed number of damped rounds, then each point picks the
//! candidate maximizing `r + a`.
//!
//! Round 1 takes the fresh messages as they are. Afterwards a fresh message
//! is blended in with weight `damping^(t-1)` on round t.
//!
//! Candidates are visited in id order everywhere, so exact ties always go to
//! the smallest id.

use crate::matrix::SparseMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Parameters of one clustering run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Self-similarity placed on the diagonal
    pub initial_pref: f64,
    /// Entries strictly below this are dropped before clustering
    pub pruning: f64,
    /// Decay of the weight given to each round's fresh message
    pub damping: f64,
    /// Number of message-passing rounds
    pub iterations: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            initial_pref: 0.0,
            pruning: 0.0002,
            damping: 0.95,
            iterations: 20,
        }
    }
}

/// Final messages of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Messages {
    /// `responsibility[point][exemplar]`
    pub responsibility: SparseMatrix,
    /// `availability[exemplar][point]`
    pub availability: SparseMatrix,
}

/// Message-passing state over an index-addressed similarity structure
pub struct AffinityClusterer {
    ids: Vec<String>,
    /// Per point: `(candidate, similarity)` in candidate order
    cands: Vec<Vec<(usize, f64)>>,
    /// Per exemplar: `(point, slot in cands[point])` in point order
    members: Vec<Vec<(usize, usize)>>,
    /// Slot of each point's own diagonal entry
    self_slot: Vec<usize>,
    resp: Vec<Vec<f64>>,
    avail: Vec<Vec<f64>>,
    params: ClusterParams,
    /// Weight of the next round's fresh messages
    fresh_weight: f64,
    round: usize,
}

impl AffinityClusterer {
    /// Build similarities from `r2r` (pruned per `params`)
    #[must_use]
    pub fn new(r2r: &SparseMatrix, params: ClusterParams) -> Self {
        let pruned = r2r.pruned(params.pruning);
        let ids: Vec<String> = pruned.ids().into_iter().collect();
        let index: BTreeMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut sim: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); ids.len()];
        for (exemplar, point, w) in pruned.entries() {
            if exemplar != point {
                if let (Some(&p), Some(&e)) = (index.get(point), index.get(exemplar)) {
                    sim[p].insert(e, w);
                }
            }
        }
        for (p, row) in sim.iter_mut().enumerate() {
            row.insert(p, params.initial_pref);
        }

        let cands: Vec<Vec<(usize, f64)>> = sim
            .into_iter()
            .map(|row| row.into_iter().collect())
            .collect();

        let mut members: Vec<Vec<(usize, usize)>> = vec![Vec::new(); ids.len()];
        let mut self_slot = vec![0; ids.len()];
        for (p, row) in cands.iter().enumerate() {
            for (slot, &(k, _)) in row.iter().enumerate() {
                members[k].push((p, slot));
                if k == p {
                    self_slot[p] = slot;
                }
            }
        }

        let resp = cands.iter().map(|row| vec![0.0; row.len()]).collect();
        let avail = cands.iter().map(|row| vec![0.0; row.len()]).collect();

        debug!(
            points = ids.len(),
            candidates = cands.iter().map(Vec::len).sum::<usize>(),
            "Built similarity structure"
        );

        Self {
            ids,
            cands,
            members,
            self_slot,
            resp,
            avail,
            params,
            fresh_weight: 1.0,
            round: 0,
        }
    }

    /// Number of points
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when there is nothing to cluster
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Rounds completed so far
    #[must_use]
    pub fn round(&self) -> usize {
        self.round
    }

    fn damp(&self, old: &[Vec<f64>], fresh: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
        if self.round == 0 {
            return fresh;
        }
        let w = self.fresh_weight;
        old.iter()
            .zip(fresh)
            .map(|(o, f)| {
                o.iter()
                    .zip(f)
                    .map(|(&o, f)| (1.0 - w) * o + w * f)
                    .collect()
            })
            .collect()
    }

    fn fresh_responsibility(&self) -> Vec<Vec<f64>> {
        self.cands
            .iter()
            .enumerate()
            .map(|(p, row)| {
                let mut best: Option<usize> = None;
                let mut best_v = f64::NEG_INFINITY;
                let mut second_v = f64::NEG_INFINITY;
                for (slot, &(_, s)) in row.iter().enumerate() {
                    let v = self.avail[p][slot] + s;
                    if v > best_v {
                        second_v = best_v;
                        best_v = v;
                        best = Some(slot);
                    } else if v > second_v {
                        second_v = v;
                    }
                }
                row.iter()
                    .enumerate()
                    .map(|(slot, &(_, s))| {
                        let other = if best == Some(slot) { second_v } else { best_v };
                        if other.is_infinite() {
                            s
                        } else {
                            s - other
                        }
                    })
                    .collect()
            })
            .collect()
    }

    fn fresh_availability(&self) -> Vec<Vec<f64>> {
        let mut out: Vec<Vec<f64>> = self.cands.iter().map(|row| vec![0.0; row.len()]).collect();
        for (k, members) in self.members.iter().enumerate() {
            let pos: f64 = members
                .iter()
                .map(|&(q, slot)| self.resp[q][slot].max(0.0))
                .sum();
            let rkk = self.resp[k][self.self_slot[k]];
            for &(p, slot) in members {
                out[p][slot] = if p == k {
                    pos - rkk.max(0.0)
                } else {
                    (rkk + pos - self.resp[p][slot].max(0.0) - rkk.max(0.0)).min(0.0)
                };
            }
        }
        out
    }

    /// One round: responsibilities from the previous availabilities, then
    /// availabilities from the new responsibilities
    pub fn step(&mut self) {
        let fresh = self.fresh_responsibility();
        self.resp = self.damp(&self.resp, fresh);
        let fresh = self.fresh_availability();
        self.avail = self.damp(&self.avail, fresh);
        self.fresh_weight *= self.params.damping;
        self.round += 1;
    }

    /// Current messages keyed by id
    #[must_use]
    pub fn messages(&self) -> Messages {
        let mut m = Messages::default();
        for (p, row) in self.cands.iter().enumerate() {
            for (slot, &(k, _)) in row.iter().enumerate() {
                m.responsibility
                    .insert(&self.ids[p], &self.ids[k], self.resp[p][slot]);
                m.availability
                    .insert(&self.ids[k], &self.ids[p], self.avail[p][slot]);
            }
        }
        m
    }

    /// Run every configured round and return the final messages
    #[must_use]
    pub fn run(mut self) -> Messages {
        for _ in 0..self.params.iterations {
            self.step();
        }
        debug!(
            points = self.ids.len(),
            rounds = self.round,
            damping = self.params.damping,
            "Affinity propagation finished"
        );
        self.messages()
    }
}

/// Pick each point's exemplar: the candidate maximizing
/// `responsibility[point][c] + availability[c][point]`, first in id order on
/// ties
#[must_use]
pub fn gen_exemplars(messages: &Messages) -> Assignment {
    let mut exemplars = BTreeMap::new();
    for (point, row) in messages.responsibility.rows() {
        let mut best: Option<(&String, f64)> = None;
        for (cand, &r) in row {
            let v = r + messages.availability.get(cand, point);
            if best.map_or(true, |(_, bv)| v > bv) {
                best = Some((cand, v));
            }
        }
        if let Some((cand, _)) = best {
            exemplars.insert(point.clone(), cand.clone());
        }
    }
    Assignment::from_exemplars(exemplars)
}

/// Run affinity propagation on `r2r` and return the settled assignment
#[must_use]
pub fn cluster(r2r: &SparseMatrix, params: ClusterParams) -> Assignment {
    let messages = AffinityClusterer::new(r2r, params).run();
    let assignment = gen_exemplars(&messages).settled();
    info!(
        points = assignment.len(),
        clusters = assignment.roots().count(),
        "Clustered level"
    );
    assignment
}

// =============================================================================
// Assignment
// =============================================================================

/// Exemplar map and its inverse
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Assignment {
    exemplars: BTreeMap<String, String>,
    children: BTreeMap<String, BTreeSet<String>>,
}

impl Assignment {
    /// Build from `point -> exemplar`
    #[must_use]
    pub fn from_exemplars(exemplars: BTreeMap<String, String>) -> Self {
        let mut children: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (point, exemplar) in &exemplars {
            children
                .entry(exemplar.clone())
                .or_default()
                .insert(point.clone());
        }
        Self {
            exemplars,
            children,
        }
    }

    /// Exemplar chosen by `point`
    #[must_use]
    pub fn exemplar_of(&self, point: &str) -> Option<&str> {
        self.exemplars.get(point).map(String::as_str)
    }

    /// Points that chose `exemplar`
    #[must_use]
    pub fn children_of(&self, exemplar: &str) -> Option<&BTreeSet<String>> {
        self.children.get(exemplar)
    }

    /// `point -> exemplar`
    #[must_use]
    pub fn exemplars(&self) -> &BTreeMap<String, String> {
        &self.exemplars
    }

    /// `exemplar -> points`
    #[must_use]
    pub fn children(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.children
    }

    /// Exemplars that chose themselves
    pub fn roots(&self) -> impl Iterator<Item = &String> {
        self.children
            .iter()
            .filter(|(e, members)| members.contains(*e))
            .map(|(e, _)| e)
    }

    /// Number of assigned points
    #[must_use]
    pub fn len(&self) -> usize {
        self.exemplars.len()
    }

    /// True when no point is assigned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exemplars.is_empty()
    }

    /// True when every exemplar is a root
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.exemplars
            .values()
            .all(|e| self.exemplars.get(e).map_or(true, |ee| ee == e))
    }

    /// Re-point every point at the root of its exemplar chain
    ///
    /// A chain ending in a cycle elects the cycle member chosen directly by
    /// the most points, smallest id on ties.
    #[must_use]
    pub fn settled(&self) -> Self {
        let mut choosers: BTreeMap<&str, usize> = BTreeMap::new();
        for e in self.exemplars.values() {
            *choosers.entry(e.as_str()).or_insert(0) += 1;
        }

        let mut root: BTreeMap<&str, &str> = BTreeMap::new();
        for start in self.exemplars.keys() {
            let mut path: Vec<&str> = Vec::new();
            let mut on_path: BTreeMap<&str, usize> = BTreeMap::new();
            let mut cur = start.as_str();
            let resolved = loop {
                if let Some(&r) = root.get(cur) {
                    break r;
                }
                let next = self.exemplar_of(cur).unwrap_or(cur);
                if next == cur {
                    root.insert(cur, cur);
                    break cur;
                }
                if let Some(&i) = on_path.get(cur) {
                    break path[i..]
                        .iter()
                        .copied()
                        .max_by(|a, b| {
                            let ca = choosers.get(a).copied().unwrap_or(0);
                            let cb = choosers.get(b).copied().unwrap_or(0);
                            ca.cmp(&cb).then_with(|| b.cmp(a))
                        })
                        .unwrap_or(cur);
                }
                on_path.insert(cur, path.len());
                path.push(cur);
                cur = next;
            };
            for p in path {
                root.insert(p, resolved);
            }
        }

        let exemplars: BTreeMap<String, String> = self
            .exemplars
            .keys()
            .map(|p| {
                let r = root.get(p.as_str()).copied().unwrap_or(p.as_str());
                (p.clone(), r.to_string())
            })
            .collect();
        let moved = exemplars
            .iter()
            .filter(|(p, e)| self.exemplars.get(*p) != Some(*e))
            .count();
        if moved > 0 {
            debug!(moved, "Settled exemplar chains");
        }
        Self::from_exemplars(exemplars)
    }
}
