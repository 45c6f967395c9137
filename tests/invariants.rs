// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Invariant tests for the gitmap core
//!
//! These tests verify critical invariants over generated corpora:
//! 1. Outgoing distributions and `r2r` columns are stochastic
//! 2. Gitrank conserves mass every round
//! 3. Clustering settles and every repository lands in the tree once

use gitmap::cluster::{cluster, AffinityClusterer, ClusterParams};
use gitmap::config::Config;
use gitmap::corpus::Corpus;
use gitmap::graph::GraphBuilder;
use gitmap::hierarchy::HierarchyBuilder;
use gitmap::pipeline::Pipeline;
use gitmap::rank::RankPropagator;
use gitmap::types::{BotList, Contribution, RepoRecord, UserRecord};
use proptest::prelude::*;
use std::collections::BTreeMap;

// =============================================================================
// Test Helpers
// =============================================================================

const TOL: f64 = 1e-9;

fn make_corpus(contribs: Vec<Vec<Option<f64>>>, stars: Vec<Vec<bool>>) -> Corpus {
    let mut corpus = Corpus::default();
    for (i, row) in contribs.iter().enumerate() {
        let contributors: BTreeMap<String, Contribution> = row
            .iter()
            .enumerate()
            .filter_map(|(j, w)| {
                w.map(|w| {
                    (
                        format!("u{j}"),
                        Contribution {
                            log1p_contributions: w,
                        },
                    )
                })
            })
            .collect();
        let total = contributors.values().map(|c| c.log1p_contributions).sum();
        corpus.repos.insert(
            format!("r{i}"),
            RepoRecord {
                stargazers_count: 0,
                crawled: true,
                failed: None,
                contributors: Some(contributors),
                total_log1p_contribs: Some(total),
            },
        );
    }
    for (j, row) in stars.iter().enumerate() {
        let starred = row
            .iter()
            .enumerate()
            .filter(|(_, s)| **s)
            .map(|(i, _)| (format!("r{i}"), serde_json::Value::Bool(true)))
            .collect();
        corpus.users.insert(
            format!("u{j}"),
            UserRecord {
                starweight: 1.0,
                crawled: true,
                failed: None,
                stars: Some(starred),
            },
        );
    }
    corpus
}

fn corpus_strategy() -> impl Strategy<Value = Corpus> {
    (1usize..7, 1usize..5)
        .prop_flat_map(|(repos, users)| {
            (
                prop::collection::vec(
                    prop::collection::vec(prop::option::of(0.1f64..3.0), users),
                    repos,
                ),
                prop::collection::vec(prop::collection::vec(any::<bool>(), repos), users),
            )
        })
        .prop_map(|(contribs, stars)| make_corpus(contribs, stars))
}

fn cleaned(mut corpus: Corpus) -> Corpus {
    corpus.clean(&BotList::empty());
    corpus
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_outbound_distributions_sum_to_one(corpus in corpus_strategy()) {
        let corpus = cleaned(corpus);
        let bots = BotList::empty();
        let out = GraphBuilder::new(&corpus, &bots, 0.333_333).outbound();
        for (id, o) in &out {
            let c: f64 = o.contriblist.values().sum();
            let s: f64 = o.shadow_starlist.values().sum();
            prop_assert!((c - 1.0).abs() < TOL, "{} contriblist {}", id, c);
            prop_assert!((s - 1.0).abs() < TOL, "{} shadow {}", id, s);
        }
    }

    #[test]
    fn prop_r2r_columns_are_stochastic(corpus in corpus_strategy()) {
        let corpus = cleaned(corpus);
        let bots = BotList::empty();
        let g = GraphBuilder::new(&corpus, &bots, 0.333_333).build();
        for (src, total) in g.r2r.column_sums() {
            prop_assert!((total - 1.0).abs() < TOL, "{} sums to {}", src, total);
        }
    }

    #[test]
    fn prop_rank_conserves_mass(corpus in corpus_strategy()) {
        let corpus = cleaned(corpus);
        prop_assume!(corpus.num_usable_repos() > 0);
        let bots = BotList::empty();
        let g = GraphBuilder::new(&corpus, &bots, 0.333_333).build();
        let mut p = RankPropagator::new(&g.r2r, 0.85);
        for _ in 0..25 {
            p.step();
            let total: f64 = p.ranks().values().sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
            prop_assert!(p.ranks().values().all(|r| *r > 0.0));
        }
    }

    #[test]
    fn prop_pruned_similarities_respect_threshold(corpus in corpus_strategy()) {
        let corpus = cleaned(corpus);
        let bots = BotList::empty();
        let g = GraphBuilder::new(&corpus, &bots, 0.333_333).build();
        let params = ClusterParams { pruning: 0.05, ..ClusterParams::default() };
        let msgs = AffinityClusterer::new(&g.r2r, params).run();
        for (point, exemplar, _) in msgs.responsibility.entries() {
            if point != exemplar {
                prop_assert!(g.r2r.get(exemplar, point) >= 0.05);
            }
        }
    }

    #[test]
    fn prop_settled_exemplars_are_roots(corpus in corpus_strategy()) {
        let corpus = cleaned(corpus);
        let bots = BotList::empty();
        let g = GraphBuilder::new(&corpus, &bots, 0.333_333).build();
        let a = cluster(&g.r2r, ClusterParams::default());
        prop_assert!(a.is_settled());
        prop_assert_eq!(a.len(), corpus.num_usable_repos());
        for e in a.exemplars().values() {
            prop_assert_eq!(a.exemplar_of(e), Some(e.as_str()));
        }
    }

    #[test]
    fn prop_every_repo_is_one_leaf(corpus in corpus_strategy()) {
        let corpus = cleaned(corpus);
        let cfg = Config::default();
        let g = GraphBuilder::new(&corpus, &cfg.bots, cfg.graph.contrib_prob).build();
        let ranking = RankPropagator::new(&g.r2r, cfg.rank.damping).run(cfg.rank.iterations);
        let h = HierarchyBuilder::new(cfg.cluster.initial_pref, cfg.cluster.pruning, cfg.levels.clone())
            .build(g.r2r, ranking);

        let tree = h.tree("github").unwrap();
        let mut leaves: Vec<String> = tree.leaves().into_iter().map(String::from).collect();
        leaves.sort();
        let expected: Vec<String> = corpus.usable_repos().map(|(id, _)| id.clone()).collect();
        prop_assert_eq!(leaves, expected);

        for child in tree.children.iter().flatten() {
            prop_assert_eq!(&child.clone().collapse().unwrap(), child);
        }
    }

    #[test]
    fn prop_links_are_ordered_pairs(corpus in corpus_strategy()) {
        let has_repos = cleaned(corpus.clone()).num_usable_repos() > 0;
        match Pipeline::new(Config::default()).run(corpus) {
            Ok(map) => {
                for (a, b) in &map.links {
                    prop_assert!(a < b);
                }
            }
            Err(e) => prop_assert!(!has_repos, "unexpected error {}", e),
        }
    }
}

#[test]
fn test_pipeline_is_deterministic() {
    let corpus = make_corpus(
        vec![
            vec![Some(1.0), None, Some(0.5)],
            vec![Some(2.0), Some(1.0), None],
            vec![None, Some(1.5), Some(1.0)],
            vec![None, None, Some(2.5)],
        ],
        vec![
            vec![false, true, true, false],
            vec![true, false, false, true],
            vec![true, true, false, false],
        ],
    );
    let p = Pipeline::new(Config::default());
    let first = p.run(corpus.clone()).unwrap();
    let second = p.run(corpus).unwrap();
    assert_eq!(first, second);
}
