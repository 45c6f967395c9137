// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Run command - full pipeline from snapshots to the map document

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::snapshot;
use anyhow::{Context, Result};
use tracing::info;

/// Load snapshots from `config.data_dir`, build the map, write `config.output`
pub fn run(config: Config, quiet: bool) -> Result<()> {
    let data_dir = config.data_dir.clone();
    let output = config.output.clone();
    info!("Loading snapshots from {}", data_dir.display());

    let corpus = snapshot::load_corpus(&data_dir)
        .with_context(|| format!("Failed to load snapshots from {}", data_dir.display()))?;

    let map = Pipeline::new(config)
        .run(corpus)
        .context("Failed to build map")?;

    snapshot::write_gitmap(&output, &map)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if !quiet {
        println!(
            "Wrote {} top-level clusters and {} related pairs to {}",
            map.tree.children.as_ref().map_or(0, Vec::len),
            map.links.len(),
            output.display()
        );
    }
    Ok(())
}
