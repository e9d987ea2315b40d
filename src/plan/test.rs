//! Derived test targets.
//!
//! Test products built as executables need an entry point, and runtimes that
//! run an explicit test list need a generated discovery unit too. Which units
//! are derived depends on whether the package authored its own entry point
//! and on two user switches: discovery explicitly enabled, and an entry-point
//! path explicitly given.
//!
//! | authored entry | discovery flag | explicit path | result                            |
//! |----------------|----------------|---------------|-----------------------------------|
//! | no             | any            | no            | discovery + generated entry point |
//! | yes            | yes            | no            | warn, then as above               |
//! | yes            | any            | yes           | discovery + authored entry point  |
//! | yes            | no             | no            | authored entry point only         |

use camino::Utf8PathBuf;
use itertools::Itertools;
use tracing::debug;

use super::{TestRole, UnitDescription};
use crate::config::{BuildParameters, TestLibrary, TestProductStyle};
use crate::diagnostics::DiagnosticSink;
use crate::error::PlanError;
use crate::fs::FileSystem;
use crate::graph::ResolvedGraph;
use crate::model::{
    BuildTriple, Dependency, Package, Product, ProductId, ProductKind, Sources, Unit, UnitId,
    UnitKind,
};

/// File listing every discovered test.
const DISCOVERY_MAIN_STEM: &str = "all-discovered-tests";
/// Name reported for an authored entry point with no known path.
const DEFAULT_ENTRY_POINT_STEM: &str = "TestMain";

/// Units derived for one test product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedTestTarget {
    /// The test product.
    pub product: ProductId,
    /// Generated discovery unit, when one was built.
    pub discovery: Option<UnitDescription>,
    /// Entry-point unit, generated or authored.
    pub entry_point: UnitDescription,
    /// Authored entry point replaced by a generated one.
    pub discarded: Option<UnitId>,
}

/// Derive discovery and entry-point units for every test product in `graph`.
///
/// A missing explicit entry-point file is reported through `sink` and the
/// affected product is skipped; other products are still derived.
///
/// # Errors
///
/// Returns [`PlanError::UnsupportedTestStyle`] when tests are not built as
/// executables, and [`PlanError::MissingPackage`] or a graph error when the
/// graph is inconsistent.
pub fn derived_test_targets<F, S>(
    destination: &BuildParameters,
    tools: &BuildParameters,
    graph: &ResolvedGraph,
    fs: &F,
    sink: &mut S,
) -> Result<Vec<DerivedTestTarget>, PlanError>
where
    F: FileSystem + ?Sized,
    S: DiagnosticSink,
{
    let TestProductStyle::EntryPointExecutable {
        explicitly_enabled_discovery,
        explicitly_specified_path,
    } = &destination.testing.style
    else {
        return Err(PlanError::UnsupportedTestStyle);
    };
    let explicit_discovery = *explicitly_enabled_discovery;
    let explicit_path = explicitly_specified_path.is_some();

    let mut discovery_redundant = explicit_discovery && !explicit_path;
    let mut derived = Vec::new();
    for product in graph.products_of_kind(ProductKind::Test) {
        let package =
            graph
                .package_for_product(product)
                .ok_or_else(|| PlanError::MissingPackage {
                    product: product.id().clone(),
                    package: product.package().clone(),
                })?;
        discovery_redundant = discovery_redundant && product.test_entry_point().is_none();

        if let Some(path) = explicitly_specified_path
            && !fs.exists(path)
        {
            sink.error(format!(
                "an explicit test entry point path was given but the file '{path}' could not be found"
            ));
            continue;
        }

        let synthesizer = Synthesizer {
            product,
            package,
            destination,
            parameters: match product.build_triple() {
                BuildTriple::Tools => tools,
                BuildTriple::Destination => destination,
            },
            library: destination.testing.library,
        };
        let target = match product.test_entry_point() {
            None => synthesizer.synthesized(None),
            Some(authored) if explicit_discovery && !explicit_path => {
                sink.warning(format!(
                    "test discovery was explicitly enabled so the '{}' entry point file for '{}' \
                     will be ignored and an entry point will be generated automatically; to use \
                     test discovery with a custom entry point file, give its path explicitly",
                    synthesizer.authored_file_name(),
                    product.name()
                ));
                synthesizer.synthesized(Some(authored.clone()))
            }
            Some(authored) if explicit_path => {
                synthesizer.authored_with_discovery(graph.expect_unit(authored)?)
            }
            Some(authored) => synthesizer.authored(graph.expect_unit(authored)?, tools),
        };
        debug!(
            product = %target.product,
            entry_point = %target.entry_point.unit().id(),
            discovery = target.discovery.is_some(),
            "derived test targets"
        );
        derived.push(target);
    }

    if discovery_redundant {
        sink.warning(
            "explicitly enabling test discovery is deprecated; tests are discovered automatically \
             on all platforms",
        );
    }
    Ok(derived)
}

struct Synthesizer<'a> {
    product: &'a Product,
    package: &'a Package,
    destination: &'a BuildParameters,
    parameters: &'a BuildParameters,
    library: TestLibrary,
}

impl Synthesizer<'_> {
    fn extension(&self) -> &str {
        &self.destination.source_extension
    }

    fn authored_file_name(&self) -> String {
        self.product
            .test_entry_point_path()
            .and_then(|path| path.file_name())
            .map_or_else(
                || format!("{DEFAULT_ENTRY_POINT_STEM}.{}", self.extension()),
                ToOwned::to_owned,
            )
    }

    fn member_edges(&self) -> impl Iterator<Item = Dependency> + '_ {
        self.product.units().iter().cloned().map(Dependency::unit)
    }

    fn derived_unit(&self, name: String, kind: UnitKind, sources: Sources) -> Unit {
        Unit::builder(name, self.product.package().clone(), kind)
            .triple(self.product.build_triple())
            .sources(sources)
            .dependencies(self.member_edges())
            .default_localization(self.product.default_localization().map(ToOwned::to_owned))
            .supported_platforms(self.product.supported_platforms().to_vec())
            .platform_version_provider(self.product.platform_version_provider().clone())
            .package_access(true)
            .build()
    }

    fn discovery(&self) -> Option<UnitDescription> {
        if !self.library.requires_discovery() {
            return None;
        }
        let name = format!("{}PackageDiscoveredTests", self.package.display_name);
        let dir = self.destination.build_path().join(format!("{name}.derived"));
        let ext = self.extension();
        let paths: Vec<Utf8PathBuf> = std::iter::once(format!("{DISCOVERY_MAIN_STEM}.{ext}"))
            .chain(
                self.product
                    .units()
                    .iter()
                    .map(|unit| format!("{}.{ext}", unit.name())),
            )
            .map(|file| dir.join(file))
            .collect();
        let unit = self.derived_unit(
            name,
            UnitKind::SynthesizedDiscovery,
            Sources::new(dir, paths),
        );
        Some(UnitDescription::new(
            unit,
            self.parameters.clone(),
            Some(TestRole::Discovery),
        ))
    }

    /// Edges an entry point needs beyond its own: the discovery unit when one
    /// exists, otherwise the test units themselves.
    fn runtime_edges(&self, discovery: Option<&UnitDescription>) -> Vec<Dependency> {
        discovery.map_or_else(
            || self.member_edges().collect(),
            |d| vec![Dependency::unit(d.unit().id().clone())],
        )
    }

    fn synthesized(&self, discarded: Option<UnitId>) -> DerivedTestTarget {
        let discovery = self.discovery();
        let dir = self
            .destination
            .build_path()
            .join(format!("{}.derived", self.product.name()));
        let file = dir.join(format!(
            "{}.{}",
            self.library.entry_point_stem(),
            self.extension()
        ));
        let base = self.derived_unit(
            self.product.name().to_owned(),
            UnitKind::SynthesizedEntryPoint,
            Sources::new(dir, vec![file]),
        );
        let edges = base
            .dependencies()
            .iter()
            .cloned()
            .chain(self.runtime_edges(discovery.as_ref()))
            .unique_by(Dependency::id)
            .collect::<Vec<_>>();
        let unit = rebuild(&base, UnitKind::SynthesizedEntryPoint, edges, true);
        DerivedTestTarget {
            product: self.product.id().clone(),
            discovery,
            entry_point: UnitDescription::new(
                unit,
                self.parameters.clone(),
                Some(TestRole::EntryPoint { synthesized: true }),
            ),
            discarded,
        }
    }

    fn authored_with_discovery(&self, authored: &Unit) -> DerivedTestTarget {
        let discovery = self.discovery();
        let edges = authored
            .dependencies()
            .iter()
            .cloned()
            .chain(self.runtime_edges(discovery.as_ref()))
            .unique_by(Dependency::id)
            .collect::<Vec<_>>();
        let unit = rebuild(authored, authored.kind(), edges, authored.package_access());
        DerivedTestTarget {
            product: self.product.id().clone(),
            discovery,
            entry_point: UnitDescription::new(
                unit,
                self.parameters.clone(),
                Some(TestRole::EntryPoint { synthesized: false }),
            ),
            discarded: None,
        }
    }

    fn authored(&self, authored: &Unit, tools: &BuildParameters) -> DerivedTestTarget {
        let parameters = match authored.build_triple() {
            BuildTriple::Tools => tools,
            BuildTriple::Destination => self.destination,
        };
        DerivedTestTarget {
            product: self.product.id().clone(),
            discovery: None,
            entry_point: UnitDescription::new(
                authored.clone(),
                parameters.clone(),
                Some(TestRole::EntryPoint { synthesized: false }),
            ),
            discarded: None,
        }
    }
}

/// Copy `unit` under the same identity with a new kind and edge list.
fn rebuild(unit: &Unit, kind: UnitKind, edges: Vec<Dependency>, package_access: bool) -> Unit {
    Unit::builder(unit.name(), unit.package().clone(), kind)
        .triple(unit.build_triple())
        .sources(unit.sources().clone())
        .dependencies(edges)
        .resources(unit.resources().to_vec())
        .prebuilt_binaries(unit.prebuilt_binaries().to_vec())
        .plugin_commands(unit.plugin_commands().to_vec())
        .default_localization(unit.default_localization().map(ToOwned::to_owned))
        .supported_platforms(unit.supported_platforms().to_vec())
        .platform_version_provider(unit.platform_version_provider().clone())
        .package_access(package_access)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TestingParameters;
    use crate::diagnostics::{DiagnosticLog, Severity};
    use crate::fs::MockFileSystem;
    use crate::graph::GraphBuilder;
    use crate::model::PackageIdentity;
    use rstest::{fixture, rstest};

    const ENTRY_FILE: &str = "/work/core/Tests/TestMain.src";

    fn uid(name: &str) -> UnitId {
        UnitId::new(name, PackageIdentity::new("core"), BuildTriple::Destination)
    }

    fn graph(authored: bool, extra_product: bool) -> ResolvedGraph {
        let mut builder = GraphBuilder::new();
        builder
            .add_package(Package::new("core", "Core", "/work/core"))
            .expect("package");
        builder
            .add_unit(
                Unit::builder("CoreTests", "core", UnitKind::Test)
                    .sources(Sources::new(
                        "/work/core/Tests/CoreTests".into(),
                        vec!["/work/core/Tests/CoreTests/a.src".into()],
                    ))
                    .build(),
            )
            .expect("tests");
        builder
            .add_unit(
                Unit::builder("TestMain", "core", UnitKind::Executable)
                    .sources(Sources::new("/work/core/Tests".into(), vec![ENTRY_FILE.into()]))
                    .dependency(Dependency::unit(uid("CoreTests")))
                    .build(),
            )
            .expect("entry");
        let mut product = Product::new(
            "CorePackageTests",
            "core",
            ProductKind::Test,
            vec![uid("CoreTests")],
        );
        if authored {
            product = product.with_test_entry_point(uid("TestMain"), Some(ENTRY_FILE.into()));
        }
        builder.add_product(product).expect("product");
        if extra_product {
            builder
                .add_product(Product::new(
                    "OtherTests",
                    "core",
                    ProductKind::Test,
                    vec![uid("CoreTests")],
                ))
                .expect("second product");
        }
        builder.build().expect("graph")
    }

    fn parameters(
        library: TestLibrary,
        discovery: bool,
        path: Option<&str>,
    ) -> BuildParameters {
        BuildParameters {
            testing: TestingParameters {
                library,
                style: TestProductStyle::EntryPointExecutable {
                    explicitly_enabled_discovery: discovery,
                    explicitly_specified_path: path.map(Utf8PathBuf::from),
                },
            },
            ..BuildParameters::default()
        }
    }

    #[fixture]
    fn fs() -> MockFileSystem {
        let mut fs = MockFileSystem::new();
        fs.expect_exists().returning(|path| path == ENTRY_FILE);
        fs
    }

    fn derive(
        graph: &ResolvedGraph,
        params: &BuildParameters,
        fs: &MockFileSystem,
    ) -> (Vec<DerivedTestTarget>, DiagnosticLog) {
        let mut log = DiagnosticLog::default();
        let tools = params.for_tools();
        let targets =
            derived_test_targets(params, &tools, graph, fs, &mut log).expect("derived targets");
        (targets, log)
    }

    fn edge_names(desc: &UnitDescription) -> Vec<&str> {
        desc.unit()
            .dependencies()
            .iter()
            .filter_map(Dependency::unit_id)
            .map(UnitId::name)
            .collect()
    }

    #[rstest]
    fn synthesizes_everything_without_authored_entry(fs: MockFileSystem) {
        let (targets, log) = derive(&graph(false, false), &parameters(TestLibrary::Listed, false, None), &fs);
        let [target] = targets.as_slice() else {
            panic!("expected one target, got {targets:?}");
        };
        let discovery = target.discovery.as_ref().expect("discovery unit");
        assert_eq!(discovery.unit().name(), "CorePackageDiscoveredTests");
        assert_eq!(discovery.unit().kind(), UnitKind::SynthesizedDiscovery);
        let files: Vec<_> = discovery
            .unit()
            .sources()
            .paths
            .iter()
            .filter_map(|p| p.file_name())
            .collect();
        assert_eq!(files, vec!["all-discovered-tests.src", "CoreTests.src"]);
        assert_eq!(target.entry_point.unit().name(), "CorePackageTests");
        assert_eq!(
            target.entry_point.unit().sources().paths,
            vec![Utf8PathBuf::from(
                ".build/x86_64-unknown-linux-gnu/debug/CorePackageTests.derived/runner.src"
            )]
        );
        assert_eq!(
            edge_names(&target.entry_point),
            vec!["CoreTests", "CorePackageDiscoveredTests"]
        );
        assert!(log.diagnostics().is_empty());
    }

    #[rstest]
    fn discovery_flag_replaces_authored_entry_with_warning(fs: MockFileSystem) {
        let (targets, log) = derive(&graph(true, false), &parameters(TestLibrary::Listed, true, None), &fs);
        let [target] = targets.as_slice() else {
            panic!("expected one target, got {targets:?}");
        };
        assert_ne!(target.entry_point.unit().id(), &uid("TestMain"));
        assert_eq!(target.discarded, Some(uid("TestMain")));
        assert!(target.discovery.is_some());
        let warnings: Vec<_> = log.messages(Severity::Warning).collect();
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert!(warnings[0].contains("'TestMain.src'"));
        assert!(warnings[0].contains("CorePackageTests"));
    }

    #[rstest]
    fn missing_explicit_path_is_an_error_and_skips_product(fs: MockFileSystem) {
        let params = parameters(TestLibrary::Listed, false, Some("/work/core/Tests/Missing.src"));
        let (targets, log) = derive(&graph(true, false), &params, &fs);
        assert!(targets.is_empty());
        assert!(log.has_errors());
        let errors: Vec<_> = log.messages(Severity::Error).collect();
        assert!(errors[0].contains("/work/core/Tests/Missing.src"));
    }

    #[rstest]
    fn authored_entry_is_used_as_is_without_flags(fs: MockFileSystem) {
        let g = graph(true, false);
        let (targets, log) = derive(&g, &parameters(TestLibrary::Listed, false, None), &fs);
        let [target] = targets.as_slice() else {
            panic!("expected one target, got {targets:?}");
        };
        assert!(target.discovery.is_none());
        let authored = g.unit(&uid("TestMain")).expect("authored");
        assert_eq!(target.entry_point.unit(), authored);
        assert_eq!(
            target.entry_point.test_role(),
            Some(TestRole::EntryPoint { synthesized: false })
        );
        assert!(log.diagnostics().is_empty());
    }

    #[rstest]
    fn explicit_path_keeps_authored_sources_and_adds_discovery(fs: MockFileSystem) {
        let g = graph(true, false);
        let (targets, log) = derive(&g, &parameters(TestLibrary::Listed, false, Some(ENTRY_FILE)), &fs);
        let [target] = targets.as_slice() else {
            panic!("expected one target, got {targets:?}");
        };
        let authored = g.unit(&uid("TestMain")).expect("authored");
        assert!(target.discovery.is_some());
        assert_eq!(target.entry_point.unit().id(), authored.id());
        assert_eq!(target.entry_point.unit().sources(), authored.sources());
        assert_eq!(target.entry_point.unit().kind(), authored.kind());
        assert_eq!(
            edge_names(&target.entry_point),
            vec!["CoreTests", "CorePackageDiscoveredTests"]
        );
        assert!(!target.entry_point.has_generated_sources());
        assert!(log.diagnostics().is_empty());
    }

    #[rstest]
    fn redundant_discovery_flag_warns_once(fs: MockFileSystem) {
        let (targets, log) = derive(&graph(false, true), &parameters(TestLibrary::Listed, true, None), &fs);
        assert_eq!(targets.len(), 2);
        let warnings: Vec<_> = log.messages(Severity::Warning).collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("deprecated"));
    }

    #[rstest]
    fn discovery_flag_is_not_redundant_with_authored_entry(fs: MockFileSystem) {
        let (_, log) = derive(&graph(true, false), &parameters(TestLibrary::Listed, true, None), &fs);
        assert!(log.messages(Severity::Warning).all(|w| !w.contains("deprecated")));
    }

    #[rstest]
    fn self_registering_runtime_skips_discovery(fs: MockFileSystem) {
        let (targets, _) = derive(
            &graph(false, false),
            &parameters(TestLibrary::SelfRegistering, false, None),
            &fs,
        );
        let [target] = targets.as_slice() else {
            panic!("expected one target, got {targets:?}");
        };
        assert!(target.discovery.is_none());
        assert_eq!(edge_names(&target.entry_point), vec!["CoreTests"]);
        assert_eq!(
            target.entry_point.unit().sources().paths[0].file_name(),
            Some("main.src")
        );
    }

    #[rstest]
    fn loadable_bundles_have_no_derived_targets(fs: MockFileSystem) {
        let params = BuildParameters {
            testing: TestingParameters {
                library: TestLibrary::Listed,
                style: TestProductStyle::LoadableBundle,
            },
            ..BuildParameters::default()
        };
        let mut log = DiagnosticLog::default();
        let err = derived_test_targets(&params, &params.for_tools(), &graph(false, false), &fs, &mut log)
            .expect_err("unsupported");
        assert!(matches!(err, PlanError::UnsupportedTestStyle));
    }

    #[rstest]
    fn derived_units_inherit_product_triple(fs: MockFileSystem) {
        let mut builder = GraphBuilder::new();
        builder
            .add_package(Package::new("core", "Core", "/work/core"))
            .expect("package");
        builder
            .add_unit(
                Unit::builder("CoreTests", "core", UnitKind::Test)
                    .triple(BuildTriple::Tools)
                    .build(),
            )
            .expect("tests");
        builder
            .add_product(
                Product::new(
                    "CorePackageTests",
                    "core",
                    ProductKind::Test,
                    vec![uid("CoreTests")],
                )
                .with_triple(BuildTriple::Tools),
            )
            .expect("product");
        let g = builder.build().expect("graph");
        let (targets, _) = derive(&g, &parameters(TestLibrary::Listed, false, None), &fs);
        let [target] = targets.as_slice() else {
            panic!("expected one target, got {targets:?}");
        };
        assert_eq!(target.entry_point.unit().build_triple(), BuildTriple::Tools);
        assert_eq!(target.entry_point.parameters().triple, BuildTriple::Tools);
        let discovery = target.discovery.as_ref().expect("discovery");
        assert_eq!(discovery.unit().build_triple(), BuildTriple::Tools);
    }
}
