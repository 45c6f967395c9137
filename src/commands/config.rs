// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Config command - prints the effective configuration

use crate::config::{default_path, Config};
use anyhow::{Context, Result};

/// Print `config` as TOML, optionally only the default file location
pub fn run(config: &Config, show_path: bool) -> Result<()> {
    if show_path {
        match default_path() {
            Some(p) => println!("{}", p.display()),
            None => anyhow::bail!("No home directory; pass --config explicitly"),
        }
        return Ok(());
    }
    let text = config.to_toml().context("Failed to render configuration")?;
    print!("{text}");
    Ok(())
}
