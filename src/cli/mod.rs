//! CLI interface for QuestPlay.
//!
//! This module provides the command-line interface for the playground launcher
//! and the container entry point.

mod commands;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;
pub use utils::*;

#[derive(Parser)]
#[command(name = "questplay")]
#[command(about = "QuestDB + JupyterLab playground launcher")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// QuestDB root directory (overrides config and QUESTPLAY_ROOT)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start a throwaway playground in a temporary directory
    Run {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,

        /// Serve notebooks from this directory instead of downloading the default one
        #[arg(long, env = "QUESTPLAY_LOCAL_NOTEBOOKS")]
        local_notebooks: Option<PathBuf>,
    },

    /// Install QuestDB, the Python packages and the notebooks (image build step)
    Provision {
        /// Copy notebook assets from this directory
        #[arg(long)]
        notebooks: Option<PathBuf>,

        /// Do not install Python packages
        #[arg(long)]
        skip_pip: bool,
    },

    /// Run QuestDB and JupyterLab until SIGTERM or Ctrl-C (container entry point)
    Serve,

    /// Probe the service ports and verify server.conf
    Check {
        #[arg(long, default_value = "localhost")]
        host: String,
    },

    /// Render the default notebook as static HTML
    Export {
        /// Output directory; defaults to the parent of the notebook directory
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,
    },

    /// Initialize default configuration at default location
    Init {
        #[arg(long)]
        force: bool,
    },

    /// Manage configuration
    Config {
        #[arg(long)]
        show: bool,

        #[arg(long)]
        validate: bool,
    },

    /// Show version information
    Version,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let config_path = self.config.as_deref();
        let root = self.root.as_deref();
        let settings = || load_settings(config_path, root);

        match self.command {
            Commands::Run { yes, local_notebooks } => {
                run(settings()?, yes, local_notebooks).await
            }
            Commands::Provision { notebooks, skip_pip } => {
                provision(settings()?, notebooks, skip_pip).await
            }
            Commands::Serve => serve(settings()?).await,
            Commands::Check { host } => check(settings()?, host).await,
            Commands::Export { output_dir } => export(settings()?, output_dir).await,
            Commands::Init { force } => init(force).await,
            Commands::Config { show, validate } => config(settings()?, show, validate).await,
            Commands::Version => version().await,
        }
    }
}
