//! hdl - runtime dependency loader CLI
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Drives the same engine a host application embeds, from the command line:
//! fetch what an `hdl.toml` declares into the local store, inspect the
//! store, or wipe it.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.hdl/
//! └── dependencies/
//!     └── maven/
//!         ├── com/google/code/gson/gson/2.10.1/gson-2.10.1.jar
//!         ├── com/google/code/gson/gson/2.10.1/gson-2.10.1.jar.sha256
//!         └── relocated/<fingerprint>/...
//! ```

pub mod cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use hdl_core::USER_AGENT;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "hdl")]
#[command(author, version, about = "hdl - runtime dependency loader")]
pub struct Cli {
    /// Store artifacts here instead of the configured base directory
    #[arg(long, global = true, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch and activate the dependencies declared in a manifest
    Fetch {
        /// Manifest to read
        #[arg(long, short, default_value = hdl_core::manifest::MANIFEST_FILE)]
        manifest: PathBuf,
    },
    /// List artifacts in the local store
    List,
    /// Remove every artifact from the local store
    Clean {
        /// Show what would be removed without removing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Compute SHA256 of files (for pinning `sha256` in a manifest)
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}
