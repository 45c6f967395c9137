// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Rank command - prints gitrank tables

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::rank::BipartiteRanks;
use crate::snapshot;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

/// How to print the ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankOptions {
    /// Rows per table
    pub top: usize,
    /// Also print users with their strongest repositories
    pub users: bool,
    /// Emit JSON instead of tables
    pub json: bool,
    /// Disable ANSI colors
    pub no_color: bool,
}

/// Rank repositories and users from the snapshots in `config.data_dir`
pub fn run(config: Config, opts: RankOptions) -> Result<()> {
    let data_dir = config.data_dir.clone();
    let corpus = snapshot::load_corpus(&data_dir)
        .with_context(|| format!("Failed to load snapshots from {}", data_dir.display()))?;
    let ranks = Pipeline::new(config)
        .rank(corpus)
        .context("Failed to rank corpus")?;

    if opts.json {
        let json = serde_json::to_string_pretty(&ranks).context("Failed to serialize ranks")?;
        println!("{json}");
    } else {
        print!("{}", render(&ranks, opts));
    }
    Ok(())
}

fn heading(text: &str, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        text.bold().to_string()
    }
}

/// Plain-text tables, colored unless `opts.no_color`
#[must_use]
pub fn render(ranks: &BipartiteRanks, opts: RankOptions) -> String {
    let mut out = String::new();
    out.push_str(&heading("Repositories", opts.no_color));
    out.push('\n');
    for (i, (id, score)) in ranks.repos.sorted().into_iter().take(opts.top).enumerate() {
        let score = format!("{score:.6}");
        let score = if opts.no_color { score } else { score.green().to_string() };
        out.push_str(&format!("{:>4}  {score}  {id}\n", i + 1));
    }

    if opts.users {
        out.push('\n');
        out.push_str(&heading("Users", opts.no_color));
        out.push('\n');
        for (i, user) in ranks.users.iter().take(opts.top).enumerate() {
            let score = format!("{:.6}", user.rank);
            let score = if opts.no_color { score } else { score.green().to_string() };
            out.push_str(&format!("{:>4}  {score}  {}\n", i + 1, user.id));
            for (repo, share) in user.sources.iter().take(3) {
                let line = format!("{share:.6}  {repo}");
                let line = if opts.no_color { line } else { line.dimmed().to_string() };
                out.push_str(&format!("            {line}\n"));
            }
        }
    }
    out
}
