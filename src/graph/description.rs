//! JSON description of a resolved graph.
//!
//! The resolver that produces the graph lives outside this crate; this is the
//! hand-off format it writes. Paths are relative to the package root unless
//! absolute. Units of macro and plugin products are additionally instantiated
//! for the tools triple, and edges onto those products are pointed at the
//! tools copies.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::fs;
use std::str::FromStr;
use tracing::debug;

use super::{GraphBuilder, GraphError, ResolvedGraph};
use crate::model::{
    BuildTriple, Dependency, Package, PackageCondition, PackageIdentity, PlatformVersionProvider,
    PluginCommand, Product, ProductId, ProductKind, Sources, SupportedPlatform, Unit, UnitId,
    UnitKind,
};

/// Top-level graph description.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphDescription {
    /// Packages in resolution order.
    #[serde(default)]
    pub packages: Vec<PackageRecord>,
}

/// One package of a [`GraphDescription`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageRecord {
    /// Package identity.
    pub identity: PackageIdentity,
    /// Display name; defaults to the identity.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Package root directory.
    pub path: Utf8PathBuf,
    /// Default localisation applied to units and products.
    #[serde(default)]
    pub default_localization: Option<String>,
    /// Platforms declared by the package manifest.
    #[serde(default)]
    pub supported_platforms: Vec<SupportedPlatform>,
    /// Deployment target defaults.
    #[serde(default)]
    pub platform_versions: PlatformVersionProvider,
    /// Units declared by the package.
    #[serde(default)]
    pub units: Vec<UnitRecord>,
    /// Products declared by the package.
    #[serde(default)]
    pub products: Vec<ProductRecord>,
}

/// One unit of a [`PackageRecord`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitRecord {
    /// Unit name.
    pub name: String,
    /// Unit kind.
    pub kind: UnitKind,
    /// Source root relative to the package; defaults to `Sources/<name>`.
    #[serde(default)]
    pub root: Option<Utf8PathBuf>,
    /// Source files relative to the source root.
    #[serde(default)]
    pub sources: Vec<Utf8PathBuf>,
    /// Dependency edges.
    #[serde(default)]
    pub dependencies: Vec<DependencyRecord>,
    /// Resource files relative to the source root.
    #[serde(default)]
    pub resources: Vec<Utf8PathBuf>,
    /// Prebuilt binaries relative to the package root.
    #[serde(default)]
    pub prebuilt_binaries: Vec<Utf8PathBuf>,
    /// Commands produced by build-tool plugins.
    #[serde(default)]
    pub plugin_commands: Vec<PluginCommand>,
    /// Whether package-scoped declarations are visible.
    #[serde(default)]
    pub package_access: bool,
}

/// A dependency edge as written by the resolver.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum DependencyRecord {
    /// Edge onto a unit of the same package.
    Unit {
        /// Unit name.
        name: String,
        /// Gating conditions.
        #[serde(default)]
        conditions: Vec<PackageCondition>,
    },
    /// Edge onto a product.
    Product {
        /// Product name.
        name: String,
        /// Declaring package.
        package: PackageIdentity,
        /// Gating conditions.
        #[serde(default)]
        conditions: Vec<PackageCondition>,
    },
}

/// One product of a [`PackageRecord`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductRecord {
    /// Product name.
    pub name: String,
    /// Product kind.
    pub kind: ProductKind,
    /// Names of member units in the same package.
    #[serde(default)]
    pub units: Vec<String>,
    /// Authored test entry point, for test products.
    #[serde(default)]
    pub test_entry_point: Option<EntryPointRecord>,
}

/// Authored test entry point of a test product.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryPointRecord {
    /// Name of the entry-point unit.
    pub unit: String,
    /// Path of the entry file, relative to the package root.
    #[serde(default)]
    pub path: Option<Utf8PathBuf>,
}

impl FromStr for GraphDescription {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}

impl GraphDescription {
    /// Read a description from disk.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed.
    pub fn from_path(path: &Utf8Path) -> Result<Self, GraphError> {
        let text = fs::read_to_string(path)?;
        text.parse()
    }

    /// Resolve names into identities and build the graph.
    ///
    /// # Errors
    ///
    /// Fails on duplicate or dangling names, or a dependency cycle.
    pub fn into_graph(self) -> Result<ResolvedGraph, GraphError> {
        let mut builder = GraphBuilder::new();
        let mut tool_products = Vec::new();
        for package in self.packages {
            let identity = package.identity.clone();
            let display_name = package
                .display_name
                .clone()
                .unwrap_or_else(|| identity.to_string());
            builder.add_package(Package::new(
                identity.clone(),
                display_name,
                package.path.clone(),
            ))?;
            for unit in &package.units {
                builder.add_unit(lower_unit(&package, unit))?;
            }
            for product in &package.products {
                let lowered = lower_product(&package, product);
                if matches!(lowered.kind(), ProductKind::Macro | ProductKind::Plugin) {
                    tool_products.push(lowered.id().clone());
                }
                builder.add_product(lowered)?;
            }
        }
        let mut graph = builder.build()?;
        host_tool_products(&mut graph, &tool_products)?;
        Ok(graph)
    }
}

fn lower_unit(package: &PackageRecord, unit: &UnitRecord) -> Unit {
    let root = package.path.join(
        unit.root
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from("Sources").join(&unit.name)),
    );
    let paths = unit.sources.iter().map(|p| root.join(p)).collect();
    let resources = unit.resources.iter().map(|p| root.join(p)).collect();
    let prebuilt = unit
        .prebuilt_binaries
        .iter()
        .map(|p| package.path.join(p))
        .collect();
    let dependencies = unit.dependencies.iter().map(|dependency| match dependency {
        DependencyRecord::Unit { name, conditions } => Dependency::unit(UnitId::new(
            name.clone(),
            package.identity.clone(),
            BuildTriple::Destination,
        ))
        .with_conditions(conditions.clone()),
        DependencyRecord::Product {
            name,
            package: owner,
            conditions,
        } => Dependency::product(ProductId::new(
            name.clone(),
            owner.clone(),
            BuildTriple::Destination,
        ))
        .with_conditions(conditions.clone()),
    });
    Unit::builder(unit.name.clone(), package.identity.clone(), unit.kind)
        .sources(Sources::new(root, paths))
        .dependencies(dependencies)
        .resources(resources)
        .prebuilt_binaries(prebuilt)
        .plugin_commands(unit.plugin_commands.clone())
        .default_localization(package.default_localization.clone())
        .supported_platforms(package.supported_platforms.clone())
        .platform_version_provider(package.platform_versions.clone())
        .package_access(unit.package_access)
        .build()
}

fn lower_product(package: &PackageRecord, product: &ProductRecord) -> Product {
    let member = |name: &str| UnitId::new(name, package.identity.clone(), BuildTriple::Destination);
    let units = product.units.iter().map(|name| member(name)).collect();
    let lowered = Product::new(
        product.name.clone(),
        package.identity.clone(),
        product.kind,
        units,
    )
    .with_default_localization(package.default_localization.clone())
    .with_supported_platforms(package.supported_platforms.clone())
    .with_platform_version_provider(package.platform_versions.clone());
    match &product.test_entry_point {
        Some(entry) => lowered.with_test_entry_point(
            member(&entry.unit),
            entry.path.as_ref().map(|p| package.path.join(p)),
        ),
        None => lowered,
    }
}

/// Build macro and plugin products for the tools triple and point every edge
/// onto them at the tools copy.
fn host_tool_products(graph: &mut ResolvedGraph, products: &[ProductId]) -> Result<(), GraphError> {
    if products.is_empty() {
        return Ok(());
    }
    for id in products {
        let product = graph.expect_product(id)?.clone();
        graph.instantiate_for_tools(product.units())?;
        let host = product.with_triple(BuildTriple::Tools);
        if graph.product(host.id()).is_none() {
            debug!(product = %host.id(), "instantiated product for tools triple");
            graph.register_product(host)?;
        }
    }
    let retargeted: Vec<Unit> = graph
        .units()
        .filter(|unit| {
            unit.dependencies()
                .iter()
                .filter_map(Dependency::product_id)
                .any(|p| products.contains(&p.with_triple(BuildTriple::Destination)))
        })
        .cloned()
        .collect();
    for unit in retargeted {
        graph.insert_unit(unit.map_product_dependencies(|p| {
            if products.contains(&p.with_triple(BuildTriple::Destination)) {
                p.with_triple(BuildTriple::Tools)
            } else {
                p.clone()
            }
        }));
    }
    graph.check_references()?;
    graph.validate_acyclic()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LibraryKind;
    use rstest::rstest;

    const GRAPH: &str = r#"{
        "packages": [
            {
                "identity": "Core",
                "display_name": "Core",
                "path": "/work/core",
                "units": [
                    {"name": "Utils", "kind": "library", "sources": ["a.src"]},
                    {
                        "name": "App",
                        "kind": "executable",
                        "sources": ["main.src"],
                        "dependencies": [
                            {"unit": {"name": "Utils"}},
                            {"product": {"name": "Derive", "package": "macros"}}
                        ]
                    }
                ],
                "products": [
                    {"name": "App", "kind": "executable", "units": ["App"]},
                    {"name": "Core", "kind": {"library": "static"}, "units": ["Utils"]}
                ]
            },
            {
                "identity": "macros",
                "path": "/work/macros",
                "units": [{"name": "DeriveImpl", "kind": "executable", "sources": ["lib.src"]}],
                "products": [{"name": "Derive", "kind": "macro", "units": ["DeriveImpl"]}]
            }
        ]
    }"#;

    #[rstest]
    fn loads_units_with_rooted_sources() {
        let graph = GRAPH
            .parse::<GraphDescription>()
            .and_then(GraphDescription::into_graph)
            .expect("graph");
        let utils = graph
            .unit(&UnitId::new("Utils", "core".into(), BuildTriple::Destination))
            .expect("utils");
        assert_eq!(utils.sources().root, "/work/core/Sources/Utils");
        assert_eq!(utils.sources().paths, vec![Utf8PathBuf::from("/work/core/Sources/Utils/a.src")]);
        let core = graph
            .product(&ProductId::new("Core", "core".into(), BuildTriple::Destination))
            .expect("product");
        assert_eq!(core.kind(), ProductKind::Library(LibraryKind::Static));
        let package = graph.package(&"macros".into()).expect("package");
        assert_eq!(package.display_name, "macros");
    }

    #[rstest]
    fn macro_products_are_built_for_tools() {
        let graph = GRAPH
            .parse::<GraphDescription>()
            .and_then(GraphDescription::into_graph)
            .expect("graph");
        let app = graph
            .unit(&UnitId::new("App", "core".into(), BuildTriple::Destination))
            .expect("app");
        let edge = app.dependencies()[1].product_id().expect("product edge");
        assert_eq!(edge.triple(), BuildTriple::Tools);
        assert!(graph.product(edge).is_some());
        assert!(
            graph
                .unit(&UnitId::new("DeriveImpl", "macros".into(), BuildTriple::Tools))
                .is_some()
        );
    }

    #[rstest]
    fn unknown_fields_are_rejected() {
        let err = r#"{"packages": [], "extra": 1}"#
            .parse::<GraphDescription>()
            .expect_err("unknown field");
        assert!(matches!(err, GraphError::Parse(_)));
    }

    #[rstest]
    fn dangling_product_member_is_reported() {
        let json = r#"{"packages": [{"identity": "a", "path": "/a",
            "products": [{"name": "P", "kind": "executable", "units": ["Ghost"]}]}]}"#;
        let err = json
            .parse::<GraphDescription>()
            .and_then(GraphDescription::into_graph)
            .expect_err("dangling");
        assert!(matches!(err, GraphError::UnknownUnit { .. }));
    }
}
