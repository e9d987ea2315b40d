//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure parsed by the `buildplan`
//! binary.

use clap::Parser;
use std::path::PathBuf;

/// Plan a resolved package graph and emit its low-level build graph.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON description of the resolved package graph.
    #[arg(short, long, value_name = "FILE", default_value = "graph.json")]
    pub graph: PathBuf,

    /// JSON planning configuration; defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the emitted graph to this file instead of standard output.
    #[arg(short, long, value_name = "FILE")]
    pub emit: Option<PathBuf>,

    /// Emit only per-unit aggregate nodes, for preparation builds.
    #[arg(long)]
    pub prepare: bool,

    /// Enable verbose logging output.
    #[arg(short, long)]
    pub verbose: bool,
}
