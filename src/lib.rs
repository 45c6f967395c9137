// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Gitmap library - ranking and clustering a crawled repository ecosystem
//!
//! This crate turns crawled contributor and star records into a
//! repository-to-repository influence matrix, ranks repositories with a
//! damped power iteration ("gitrank"), and groups them into a multi-level
//! hierarchy with affinity propagation.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod cluster;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod links;
pub mod matrix;
pub mod pipeline;
pub mod rank;
pub mod snapshot;

pub use error::{GitmapError, Result};

/// Core record types as they appear in crawled snapshots
pub mod types {
    use serde::{Deserialize, Serialize};
    use std::collections::{BTreeMap, BTreeSet};

    use crate::hierarchy::ClusterNode;

    // =========================================================================
    // Repository records
    // =========================================================================

    /// Contribution weight of one contributor on one repository
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Contribution {
        /// `ln(1 + commits)` for this contributor
        pub log1p_contributions: f64,
    }

    /// Crawled repository record
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct RepoRecord {
        /// Stargazer count reported by the forge
        pub stargazers_count: u64,
        /// Whether the crawler reached this repository
        pub crawled: bool,
        /// Present when the crawl failed; its value is irrelevant
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub failed: Option<serde_json::Value>,
        /// Contributor id to contribution weight
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub contributors: Option<BTreeMap<String, Contribution>>,
        /// Sum of `log1p_contributions` across contributors
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub total_log1p_contribs: Option<f64>,
    }

    impl RepoRecord {
        /// A record takes part in graph construction only if it was crawled
        /// and did not fail
        #[must_use]
        pub fn is_usable(&self) -> bool {
            self.crawled && self.failed.is_none()
        }

        /// Iterate contributors in id order (empty when absent)
        pub fn contributors(&self) -> impl Iterator<Item = (&String, &Contribution)> {
            self.contributors.iter().flat_map(BTreeMap::iter)
        }

        /// True when at least one contributor is recorded
        #[must_use]
        pub fn has_contributors(&self) -> bool {
            self.contributors.as_ref().is_some_and(|c| !c.is_empty())
        }

        /// Total contribution weight, summing contributors when the crawler
        /// did not record a total
        #[must_use]
        pub fn total_contribs(&self) -> f64 {
            self.total_log1p_contribs.unwrap_or_else(|| {
                self.contributors()
                    .map(|(_, c)| c.log1p_contributions)
                    .sum()
            })
        }
    }

    // =========================================================================
    // User records
    // =========================================================================

    /// Crawled user record
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UserRecord {
        /// Display weight, used only to order user listings
        pub starweight: f64,
        /// Whether the crawler reached this user
        pub crawled: bool,
        /// Present when the crawl failed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub failed: Option<serde_json::Value>,
        /// Starred repository id to an opaque marker
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub stars: Option<BTreeMap<String, serde_json::Value>>,
    }

    impl UserRecord {
        /// Same predicate as [`RepoRecord::is_usable`]
        #[must_use]
        pub fn is_usable(&self) -> bool {
            self.crawled && self.failed.is_none()
        }

        /// Iterate starred repository ids (empty when absent)
        pub fn stars(&self) -> impl Iterator<Item = &String> {
            self.stars.iter().flat_map(BTreeMap::keys)
        }
    }

    // =========================================================================
    // Bot exclusion
    // =========================================================================

    /// Accounts excluded from every weight calculation
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct BotList(BTreeSet<String>);

    impl BotList {
        /// Build from any collection of account ids
        pub fn new<I, S>(ids: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self(ids.into_iter().map(Into::into).collect())
        }

        /// An empty exclusion set
        #[must_use]
        pub fn empty() -> Self {
            Self(BTreeSet::new())
        }

        /// Is this account a known bot?
        #[must_use]
        pub fn contains(&self, id: &str) -> bool {
            self.0.contains(id)
        }

        /// Number of excluded accounts
        #[must_use]
        pub fn len(&self) -> usize {
            self.0.len()
        }

        /// True when nothing is excluded
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.0.is_empty()
        }
    }

    impl Default for BotList {
        fn default() -> Self {
            Self::new([
                "gitter-badger",
                "ReadmeCritic",
                "invalid-email-address",
                "bitdeli-chef",
                "greenkeeperio-bot",
            ])
        }
    }

    // =========================================================================
    // Output document
    // =========================================================================

    /// The emitted map: cluster tree plus strongly related pairs
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct GitMap {
        /// Cluster hierarchy under a synthetic root
        pub tree: ClusterNode,
        /// Mutually related repository pairs, strongest first
        pub links: Vec<(String, String)>,
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::corpus::Corpus;
    pub use crate::error::{GitmapError, Result};
    pub use crate::matrix::SparseMatrix;
    pub use crate::types::*;
}
