//! Integration tests for loading resolved graphs from JSON descriptions.
//!
//! The fixtures under `tests/data` describe small multi-package workspaces;
//! these tests check identities, source rooting and graph queries on the
//! loaded result.

use anyhow::{Context, Result, ensure};
use buildplan::graph::{GraphDescription, GraphError};
use buildplan::model::{BuildConfiguration, BuildEnvironment, Platform, ProductKind};
use camino::{Utf8Path, Utf8PathBuf};
use test_support::{load_graph, pid, uid};

#[test]
fn same_named_units_in_two_packages_stay_distinct() -> Result<()> {
    let graph = load_graph("workspace.json")?;
    let app = graph
        .unit(&uid("Utils", "app"))
        .context("app Utils should exist")?;
    let logging = graph
        .unit(&uid("Utils", "logging"))
        .context("logging Utils should exist")?;
    ensure!(app.id() != logging.id(), "identities must differ by package");
    ensure!(
        app.sources().paths == vec![Utf8PathBuf::from("/work/app/Sources/Utils/Utils.src")],
        "unexpected app sources: {:?}",
        app.sources().paths
    );
    ensure!(graph.units().count() == 5, "expected five units");
    Ok(())
}

#[test]
fn explicit_roots_are_relative_to_the_package() -> Result<()> {
    let graph = load_graph("workspace.json")?;
    let tests = graph
        .unit(&uid("AppTests", "app"))
        .context("AppTests should exist")?;
    ensure!(
        tests.sources().root == "/work/app/Tests/AppTests",
        "unexpected root {}",
        tests.sources().root
    );
    let product = graph
        .product(&pid("AppPackageTests", "app"))
        .context("test product should exist")?;
    ensure!(product.kind() == ProductKind::Test, "expected a test product");
    Ok(())
}

#[test]
fn recursive_unit_dependencies_cross_product_edges() -> Result<()> {
    let graph = load_graph("workspace.json")?;
    let app = graph.unit(&uid("App", "app")).context("App should exist")?;
    let names: Vec<String> = graph
        .recursive_unit_dependencies(app)?
        .into_iter()
        .map(|unit| format!("{}/{}", unit.package(), unit.name()))
        .collect();
    ensure!(
        names == ["app/Utils", "logging/Utils", "logging/Log"],
        "unexpected closure {names:?}"
    );
    Ok(())
}

#[test]
fn package_dependencies_stay_inside_the_package() -> Result<()> {
    let graph = load_graph("workspace.json")?;
    let app = graph.unit(&uid("App", "app")).context("App should exist")?;
    let closure = graph.recursive_package_dependencies(app)?;
    ensure!(closure.len() == 1, "expected only app/Utils, got {closure:?}");
    let environment = BuildEnvironment::new(Platform::linux(), Some(BuildConfiguration::Debug));
    let active = graph.recursive_dependencies_satisfying(app, &environment)?;
    ensure!(active.len() == 4, "expected four active edges, got {active:?}");
    Ok(())
}

#[test]
fn missing_description_file_is_an_io_error() {
    let result = GraphDescription::from_path(Utf8Path::new("/nonexistent/graph.json"));
    assert!(matches!(result, Err(GraphError::Io(_))));
}
