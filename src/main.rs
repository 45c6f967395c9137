// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Gitmap CLI - rank and cluster a crawled repository ecosystem

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use gitmap::commands;
use gitmap::commands::rank::RankOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gitmap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "GITMAP_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the cluster tree and related pairs from crawler snapshots
    Run {
        /// Directory holding cached_repos.json[.gz] and cached_users.json[.gz]
        #[arg(short, long, env = "GITMAP_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Output file for the map document
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print gitrank tables for repositories and users
    Rank {
        /// Directory holding the snapshots
        #[arg(short, long, env = "GITMAP_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Rows per table
        #[arg(long, default_value_t = 20)]
        top: usize,

        /// Also list users and the repositories feeding their rank
        #[arg(long)]
        users: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Print the default config file location instead
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over the flags
    let log_level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Completions { shell } = cli.command {
        return commands::completions::run(shell, &mut Cli::command());
    }

    let mut config = gitmap::config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Execute command
    match cli.command {
        Commands::Run { data_dir, output } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            if let Some(out) = output {
                config.output = out;
            }
            commands::run::run(config, cli.quiet)
        }
        Commands::Rank {
            data_dir,
            top,
            users,
            json,
        } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            let opts = RankOptions {
                top,
                users,
                json,
                no_color: cli.no_color,
            };
            commands::rank::run(config, opts)
        }
        Commands::Config { path } => commands::config::run(&config, path),
        Commands::Completions { .. } => Ok(()),
    }
}
