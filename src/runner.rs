//! CLI execution.
//!
//! This module keeps `main` minimal by providing a single entry point that
//! loads the graph and configuration named on the command line, plans the
//! build, and writes the emitted graph as JSON.

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::cli::Cli;
use crate::config::{EmitMode, PlanConfig};
use crate::diagnostics::{DiagnosticLog, Severity};
use crate::fs::LocalFileSystem;
use crate::graph::GraphDescription;
use crate::ir::BuildGraph;
use crate::plan::{BuildPlan, DefaultCommandLine};

/// Errors raised by the runner itself.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// Planning reported user-facing errors.
    #[error("planning failed with {count} error(s)")]
    #[diagnostic(
        code(buildplan::runner::planning_failed),
        help("fix the reported problems and re-run")
    )]
    PlanningFailed {
        /// Number of errors reported.
        count: usize,
    },
}

/// Execute the parsed [`Cli`], writing the graph to `--emit` or stdout.
///
/// # Errors
///
/// Returns an error if loading, planning or writing fails.
pub fn run(cli: &Cli) -> Result<()> {
    let stderr = io::stderr();
    let mut diagnostics = stderr.lock();
    if let Some(path) = &cli.emit {
        let file = File::create(path)
            .with_context(|| format!("creating output file {}", path.display()))?;
        let mut out = BufWriter::new(file);
        run_with_writers(cli, &mut out, &mut diagnostics)?;
        out.flush()
            .with_context(|| format!("writing output file {}", path.display()))?;
        Ok(())
    } else {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        run_with_writers(cli, &mut out, &mut diagnostics)
    }
}

/// Execute the parsed [`Cli`] against explicit writers.
///
/// The emitted graph goes to `out`; diagnostics go to `diagnostics`, one per
/// line.
///
/// # Errors
///
/// Returns an error if loading or planning fails, if planning reported any
/// user-facing error, or if writing fails.
pub fn run_with_writers<W, D>(cli: &Cli, out: &mut W, diagnostics: &mut D) -> Result<()>
where
    W: Write,
    D: Write,
{
    let graph_path = utf8_path(&cli.graph)?;
    let graph = GraphDescription::from_path(&graph_path)
        .and_then(GraphDescription::into_graph)
        .with_context(|| format!("loading package graph {graph_path}"))?;

    let mut config = match &cli.config {
        Some(path) => {
            let config_path = utf8_path(path)?;
            PlanConfig::from_path(&config_path)
                .with_context(|| format!("loading configuration {config_path}"))?
        }
        None => PlanConfig::default(),
    };
    if cli.prepare {
        config.mode = EmitMode::Prepare;
    }
    debug!(mode = ?config.mode, "loaded configuration");

    let mut log = DiagnosticLog::default();
    let plan = BuildPlan::new(&graph, &config, &LocalFileSystem, &mut log)
        .context("planning build")?;
    for diagnostic in log.diagnostics() {
        writeln!(diagnostics, "{diagnostic}").context("writing diagnostics")?;
    }
    if log.has_errors() {
        let count = log.messages(Severity::Error).count();
        return Err(RunnerError::PlanningFailed { count }.into());
    }

    let ir = BuildGraph::from_plan(&plan, &DefaultCommandLine, &LocalFileSystem)
        .context("emitting build graph")?;
    info!(
        commands = ir.commands().len(),
        fingerprint = %ir.fingerprint(),
        "emitted build graph"
    );
    serde_json::to_writer_pretty(&mut *out, &ir).context("serialising build graph")?;
    writeln!(out).context("writing build graph")?;
    Ok(())
}

fn utf8_path(path: &Path) -> Result<Utf8PathBuf> {
    Utf8Path::from_path(path)
        .map(Utf8Path::to_path_buf)
        .ok_or_else(|| anyhow!("path {} is not valid UTF-8", path.display()))
}
