// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Crawled corpus and the cleaning passes applied before graph construction

use crate::types::{BotList, RepoRecord, UserRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Repository and user collections, keyed by id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    /// Repository records
    #[serde(default)]
    pub repos: BTreeMap<String, RepoRecord>,
    /// User records
    #[serde(default)]
    pub users: BTreeMap<String, UserRecord>,
}

/// Counts of what the cleaning passes removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Bot contributor edges dropped from repositories
    pub bot_contributions: usize,
    /// Bot user records dropped
    pub bot_users: usize,
    /// Stars dropped because they pointed outside the usable repositories
    pub uncrawled_stars: usize,
    /// Usable repositories dropped for having no contributors
    pub contributorless_repos: usize,
}

impl Corpus {
    /// Build from the two collections
    #[must_use]
    pub fn new(repos: BTreeMap<String, RepoRecord>, users: BTreeMap<String, UserRecord>) -> Self {
        Self { repos, users }
    }

    /// Usable repositories in id order
    pub fn usable_repos(&self) -> impl Iterator<Item = (&String, &RepoRecord)> {
        self.repos.iter().filter(|(_, r)| r.is_usable())
    }

    /// Usable users in id order
    pub fn usable_users(&self) -> impl Iterator<Item = (&String, &UserRecord)> {
        self.users.iter().filter(|(_, u)| u.is_usable())
    }

    /// Is `id` a usable repository?
    #[must_use]
    pub fn is_usable_repo(&self, id: &str) -> bool {
        self.repos.get(id).is_some_and(RepoRecord::is_usable)
    }

    /// The usable user record for `id`, if any
    #[must_use]
    pub fn usable_user(&self, id: &str) -> Option<&UserRecord> {
        self.users.get(id).filter(|u| u.is_usable())
    }

    /// Number of usable repositories
    #[must_use]
    pub fn num_usable_repos(&self) -> usize {
        self.usable_repos().count()
    }

    /// Run every cleaning pass in pipeline order
    pub fn clean(&mut self, bots: &BotList) -> CleanReport {
        let (bot_contributions, bot_users) = self.remove_bots(bots);
        let uncrawled_stars = self.remove_uncrawled_stars();
        let contributorless_repos = self.remove_no_contribs();
        let report = CleanReport {
            bot_contributions,
            bot_users,
            uncrawled_stars,
            contributorless_repos,
        };
        info!(
            bot_contributions,
            bot_users, uncrawled_stars, contributorless_repos, "Cleaned corpus"
        );
        report
    }

    /// Drop bot contributors (keeping totals in sync) and bot users
    ///
    /// Returns `(contributor edges removed, users removed)`.
    pub fn remove_bots(&mut self, bots: &BotList) -> (usize, usize) {
        let mut edges = 0;
        for repo in self.repos.values_mut().filter(|r| r.is_usable()) {
            let Some(contributors) = repo.contributors.as_mut() else {
                continue;
            };
            let bot_ids: Vec<String> = contributors
                .keys()
                .filter(|c| bots.contains(c))
                .cloned()
                .collect();
            for bot in bot_ids {
                if let Some(removed) = contributors.remove(&bot) {
                    if let Some(total) = repo.total_log1p_contribs.as_mut() {
                        *total -= removed.log1p_contributions;
                    }
                    edges += 1;
                }
            }
        }

        let bot_users: Vec<String> = self
            .users
            .keys()
            .filter(|u| bots.contains(u))
            .cloned()
            .collect();
        for user in &bot_users {
            debug!("Dropping bot user {}", user);
            self.users.remove(user);
        }

        (edges, bot_users.len())
    }

    /// Drop stars that point at repositories outside the usable set
    pub fn remove_uncrawled_stars(&mut self) -> usize {
        let usable: std::collections::BTreeSet<String> =
            self.usable_repos().map(|(id, _)| id.clone()).collect();
        let mut removed = 0;
        for user in self.users.values_mut().filter(|u| u.is_usable()) {
            if let Some(stars) = user.stars.as_mut() {
                let before = stars.len();
                stars.retain(|repo, _| usable.contains(repo));
                removed += before - stars.len();
            }
        }
        removed
    }

    /// Drop usable repositories that have no contributors at all
    pub fn remove_no_contribs(&mut self) -> usize {
        let empty: Vec<String> = self
            .usable_repos()
            .filter(|(_, r)| !r.has_contributors())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &empty {
            self.repos.remove(id);
        }
        empty.len()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::types::Contribution;

    pub fn repo(contributors: &[(&str, f64)]) -> RepoRecord {
        let contributors: BTreeMap<String, Contribution> = contributors
            .iter()
            .map(|(id, w)| ((*id).to_string(), Contribution { log1p_contributions: *w }))
            .collect();
        let total = contributors.values().map(|c| c.log1p_contributions).sum();
        RepoRecord {
            stargazers_count: 0,
            crawled: true,
            failed: None,
            contributors: Some(contributors),
            total_log1p_contribs: Some(total),
        }
    }

    pub fn user(stars: &[&str]) -> UserRecord {
        UserRecord {
            starweight: 0.0,
            crawled: true,
            failed: None,
            stars: Some(
                stars
                    .iter()
                    .map(|s| ((*s).to_string(), serde_json::Value::Bool(true)))
                    .collect(),
            ),
        }
    }
}
