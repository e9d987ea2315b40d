//! Test utilities shared by the integration tests.
//!
//! Builders for identities, units and configurations keep fixtures short, and
//! [`write_fixture`] copies JSON fixtures into a temporary directory for
//! tests that run the binary.

use anyhow::{Context, Result, anyhow};
use buildplan::config::{
    BuildParameters, PlanConfig, TestLibrary, TestProductStyle, TestingParameters,
};
use buildplan::graph::{GraphDescription, ResolvedGraph};
use buildplan::model::{
    BuildTriple, PackageIdentity, ProductId, Sources, Unit, UnitBuilder, UnitId, UnitKind,
};
use camino::Utf8PathBuf;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Destination build directory under the default parameters.
pub const DEFAULT_BUILD_PATH: &str = ".build/x86_64-unknown-linux-gnu/debug";

/// Destination identity of unit `name` in `package`.
#[must_use]
pub fn uid(name: &str, package: &str) -> UnitId {
    UnitId::new(name, PackageIdentity::new(package), BuildTriple::Destination)
}

/// Destination identity of product `name` in `package`.
#[must_use]
pub fn pid(name: &str, package: &str) -> ProductId {
    ProductId::new(name, PackageIdentity::new(package), BuildTriple::Destination)
}

/// Unit `name` of `package` with one source file under
/// `/src/<package>/Sources/<name>/`.
#[must_use]
pub fn unit(name: &str, package: &str, kind: UnitKind) -> UnitBuilder {
    let root = Utf8PathBuf::from(format!("/src/{package}/Sources/{name}"));
    let source = root.join(format!("{name}.src"));
    Unit::builder(name, package, kind).sources(Sources::new(root, vec![source]))
}

/// Library unit `name` of `package`; see [`unit`].
#[must_use]
pub fn library(name: &str, package: &str) -> UnitBuilder {
    unit(name, package, UnitKind::Library)
}

/// Default configuration with the given testing switches.
#[must_use]
pub fn testing_config(
    library: TestLibrary,
    explicitly_enabled_discovery: bool,
    explicitly_specified_path: Option<&str>,
) -> PlanConfig {
    PlanConfig {
        destination: BuildParameters {
            testing: TestingParameters {
                library,
                style: TestProductStyle::EntryPointExecutable {
                    explicitly_enabled_discovery,
                    explicitly_specified_path: explicitly_specified_path.map(Utf8PathBuf::from),
                },
            },
            ..BuildParameters::default()
        },
        ..PlanConfig::default()
    }
}

/// Path of a file under `tests/data`.
#[must_use]
pub fn data_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../tests/data")
        .join(name)
}

/// Load and resolve the graph description `tests/data/<name>`.
///
/// # Errors
///
/// Fails if the fixture cannot be read, parsed or resolved.
pub fn load_graph(name: &str) -> Result<ResolvedGraph> {
    let path = Utf8PathBuf::from_path_buf(data_path(name))
        .map_err(|p| anyhow!("fixture path {} is not UTF-8", p.display()))?;
    GraphDescription::from_path(&path)
        .and_then(GraphDescription::into_graph)
        .with_context(|| format!("load fixture {name}"))
}

/// Copy `tests/data/<name>` into a fresh temporary directory.
///
/// Returns the directory, which must be kept alive, and the copied path.
///
/// # Errors
///
/// Fails if the directory cannot be created or the fixture cannot be copied.
pub fn write_fixture(name: &str) -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new().context("create temp dir")?;
    let path = dir.path().join(name);
    fs::copy(data_path(name), &path).with_context(|| format!("copy fixture {name}"))?;
    Ok((dir, path))
}
