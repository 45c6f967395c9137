// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Sources, lowest precedence first: built-in defaults, the TOML config file,
//! then `GITMAP__SECTION__KEY` environment variables.

use crate::cluster::ClusterParams;
use crate::error::{GitmapError, Result};
use crate::hierarchy::{default_levels, LevelParams};
use crate::types::BotList;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the crawler snapshots
    pub data_dir: PathBuf,
    /// Where `run` writes the map document
    pub output: PathBuf,
    /// Accounts excluded from every weight
    pub bots: BotList,
    /// Graph construction
    pub graph: GraphConfig,
    /// Gitrank
    pub rank: RankConfig,
    /// Shared clustering settings
    pub cluster: ClusterConfig,
    /// Per-level rounds and damping, finest first
    pub levels: Vec<LevelParams>,
    /// Related pair extraction
    pub links: LinksConfig,
    /// Tree output
    pub tree: TreeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("downloaded_data"),
            output: PathBuf::from("gitmap.json"),
            bots: BotList::default(),
            graph: GraphConfig::default(),
            rank: RankConfig::default(),
            cluster: ClusterConfig::default(),
            levels: default_levels(),
            links: LinksConfig::default(),
            tree: TreeConfig::default(),
        }
    }
}

/// Graph construction settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Weight of contribution flow against shadow star flow
    pub contrib_prob: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            contrib_prob: 0.333_333,
        }
    }
}

/// Gitrank settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankConfig {
    /// Power-iteration rounds
    pub iterations: usize,
    /// Damping factor
    pub damping: f64,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            iterations: 25,
            damping: 0.85,
        }
    }
}

/// Settings shared by every clustering level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Diagonal self-similarity
    pub initial_pref: f64,
    /// Minimum transition weight kept as a similarity
    pub pruning: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        let p = ClusterParams::default();
        Self {
            initial_pref: p.initial_pref,
            pruning: p.pruning,
        }
    }
}

/// Related pair settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Minimum relatedness kept in each direction
    pub min_weight: f64,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self { min_weight: 0.001 }
    }
}

/// Tree output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Name of the synthetic root
    pub root_name: String,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            root_name: "github".to_string(),
        }
    }
}

fn unit_interval(name: &str, v: f64) -> Result<()> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(GitmapError::Config(format!("{name} must be within [0, 1], got {v}")))
    }
}

impl Config {
    /// Reject out-of-range values
    ///
    /// # Errors
    ///
    /// Returns [`GitmapError::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        unit_interval("graph.contrib_prob", self.graph.contrib_prob)?;
        unit_interval("rank.damping", self.rank.damping)?;
        if self.cluster.pruning < 0.0 {
            return Err(GitmapError::Config(format!(
                "cluster.pruning must not be negative, got {}",
                self.cluster.pruning
            )));
        }
        if self.levels.is_empty() {
            return Err(GitmapError::Config("levels must not be empty".to_string()));
        }
        for (i, level) in self.levels.iter().enumerate() {
            unit_interval(&format!("levels[{i}].damping"), level.damping)?;
        }
        if self.tree.root_name.is_empty() {
            return Err(GitmapError::Config("tree.root_name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Render as TOML
    ///
    /// # Errors
    ///
    /// Returns [`GitmapError::Config`] if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GitmapError::Config(e.to_string()))
    }
}

/// Default config file location
#[must_use]
pub fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "hyperpolymath", "gitmap")
        .map(|d| d.config_dir().join("gitmap.toml"))
}

/// Load configuration from disk and environment, or use defaults
///
/// An explicit `path` must exist; the default location is optional.
///
/// # Errors
///
/// Returns [`GitmapError::Config`] when a source cannot be read or parsed, or
/// when the merged values fail [`Config::validate`].
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut builder = config::Config::builder();
    match path {
        Some(p) => builder = builder.add_source(config::File::from(p).required(true)),
        None => {
            if let Some(p) = default_path() {
                builder = builder.add_source(config::File::from(p).required(false));
            }
        }
    }
    builder = builder.add_source(
        config::Environment::with_prefix("GITMAP")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let cfg: Config = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.graph.contrib_prob, 0.333_333);
        assert_eq!(c.rank.iterations, 25);
        assert_eq!(c.rank.damping, 0.85);
        assert_eq!(c.cluster.initial_pref, 0.0);
        assert_eq!(c.cluster.pruning, 0.0002);
        assert_eq!(c.links.min_weight, 0.001);
        assert_eq!(c.tree.root_name, "github");
        let schedule: Vec<(usize, f64)> = c.levels.iter().map(|l| (l.iterations, l.damping)).collect();
        assert_eq!(schedule, vec![(20, 0.85), (30, 0.95), (50, 0.97), (100, 0.99)]);
        assert!(c.bots.contains("greenkeeperio-bot"));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut c = Config::default();
        c.rank.damping = 1.5;
        assert!(matches!(c.validate(), Err(GitmapError::Config(_))));

        let mut c = Config::default();
        c.levels.clear();
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.cluster.pruning = -0.1;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gitmap.toml");
        fs::write(
            &path,
            "bots = [\"ci-bot\"]\n\n[rank]\niterations = 10\n\n[tree]\nroot_name = \"forge\"\n",
        )
        .unwrap();

        let c = load(Some(&path)).unwrap();
        assert_eq!(c.rank.iterations, 10);
        assert_eq!(c.rank.damping, 0.85);
        assert_eq!(c.tree.root_name, "forge");
        assert!(c.bots.contains("ci-bot"));
        assert!(!c.bots.contains("greenkeeperio-bot"));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let c = Config::default();
        let text = c.to_toml().unwrap();
        assert!(text.contains("[rank]"));
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, c);
    }
}
