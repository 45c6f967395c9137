// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! End-to-end run: clean, build graphs, rank, cluster, assemble

use crate::config::Config;
use crate::corpus::Corpus;
use crate::error::{GitmapError, Result};
use crate::graph::GraphBuilder;
use crate::hierarchy::HierarchyBuilder;
use crate::links::related_pairs;
use crate::rank::{BipartiteRanker, BipartiteRanks, RankPropagator};
use crate::types::GitMap;
use tracing::info;

/// Runs the full computation under one configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    /// Create a pipeline
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn prepare(&self, corpus: &mut Corpus) -> Result<()> {
        corpus.clean(&self.config.bots);
        let usable = corpus.num_usable_repos();
        if usable == 0 {
            return Err(GitmapError::EmptyCorpus);
        }
        info!(repos = usable, "Corpus ready");
        Ok(())
    }

    /// Produce the cluster tree and related pairs
    ///
    /// # Errors
    ///
    /// Returns [`GitmapError::EmptyCorpus`] when nothing usable survives
    /// cleaning, or [`GitmapError::TreeConsistency`] from tree assembly.
    pub fn run(&self, mut corpus: Corpus) -> Result<GitMap> {
        self.prepare(&mut corpus)?;
        let cfg = &self.config;

        let builder = GraphBuilder::new(&corpus, &cfg.bots, cfg.graph.contrib_prob);
        let graph = builder.build();
        let ranking = RankPropagator::new(&graph.r2r, cfg.rank.damping).run(cfg.rank.iterations);

        let hierarchy = HierarchyBuilder::new(
            cfg.cluster.initial_pref,
            cfg.cluster.pruning,
            cfg.levels.clone(),
        )
        .build(graph.r2r, ranking);
        let tree = hierarchy.tree(&cfg.tree.root_name)?;

        let links = related_pairs(
            &builder.link_graph(),
            cfg.graph.contrib_prob,
            cfg.links.min_weight,
        );

        info!(
            clusters = tree.children.as_ref().map_or(0, Vec::len),
            links = links.len(),
            "Built map"
        );
        Ok(GitMap { tree, links })
    }

    /// Rank users and repositories together on the bipartite graph
    ///
    /// # Errors
    ///
    /// Returns [`GitmapError::EmptyCorpus`] when nothing usable survives
    /// cleaning.
    pub fn rank(&self, mut corpus: Corpus) -> Result<BipartiteRanks> {
        self.prepare(&mut corpus)?;
        let cfg = &self.config;
        let graph = GraphBuilder::new(&corpus, &cfg.bots, cfg.graph.contrib_prob).link_graph();
        Ok(BipartiteRanker::new(&graph, cfg.rank.damping, cfg.graph.contrib_prob)
            .run(cfg.rank.iterations))
    }
}
