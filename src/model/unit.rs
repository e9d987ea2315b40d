//! Resolved units and their dependency edges.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use super::{
    BuildEnvironment, BuildTriple, PackageCondition, PackageIdentity, Platform, ProductId,
    SupportedPlatform, UnitId, platform::PlatformVersionProvider,
};

/// What a unit compiles into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// A library module other units may import.
    Library,
    /// A module containing a program entry point.
    Executable,
    /// A module containing tests.
    Test,
    /// Generated module listing the tests of a test product.
    SynthesizedDiscovery,
    /// Module whose entry point runs a test product.
    SynthesizedEntryPoint,
    /// A library shipped in prebuilt form; it is never compiled.
    ProvidedPrebuilt,
}

impl UnitKind {
    /// Whether dependents import this unit through a module interface file.
    #[must_use]
    pub const fn exposes_module_interface(self) -> bool {
        match self {
            Self::Library | Self::SynthesizedDiscovery | Self::ProvidedPrebuilt => true,
            Self::Executable | Self::Test | Self::SynthesizedEntryPoint => false,
        }
    }

    /// Whether the unit has sources to compile.
    #[must_use]
    pub const fn is_compiled(self) -> bool {
        match self {
            Self::ProvidedPrebuilt => false,
            Self::Library
            | Self::Executable
            | Self::Test
            | Self::SynthesizedDiscovery
            | Self::SynthesizedEntryPoint => true,
        }
    }
}

/// Source files of a unit, rooted at a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sources {
    /// Directory containing the sources.
    pub root: Utf8PathBuf,
    /// Source paths, already joined onto `root`.
    pub paths: Vec<Utf8PathBuf>,
}

impl Sources {
    /// Construct a source set.
    #[must_use]
    pub const fn new(root: Utf8PathBuf, paths: Vec<Utf8PathBuf>) -> Self {
        Self { root, paths }
    }

    /// Path of `source` relative to the root, falling back to its file name.
    #[must_use]
    pub fn relative<'a>(&self, source: &'a Utf8Path) -> &'a Utf8Path {
        source
            .strip_prefix(&self.root)
            .ok()
            .or_else(|| source.file_name().map(Utf8Path::new))
            .unwrap_or(source)
    }
}

/// A command contributed by a build-tool plugin attached to a unit.
///
/// Plugins are evaluated before planning; only their resulting commands are
/// seen here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginCommand {
    /// Human-readable name shown while the command runs.
    pub display_name: String,
    /// Executable to run.
    pub executable: Utf8PathBuf,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Files the command reads.
    #[serde(default)]
    pub inputs: Vec<Utf8PathBuf>,
    /// Files the command writes.
    #[serde(default)]
    pub outputs: Vec<Utf8PathBuf>,
}

/// Identity of an edge's endpoint, used to deduplicate traversals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyId {
    /// Edge onto a unit.
    Unit(UnitId),
    /// Edge onto a product.
    Product(ProductId),
}

impl Display for DependencyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit(id) => write!(f, "unit {id}"),
            Self::Product(id) => write!(f, "product {id}"),
        }
    }
}

/// A dependency edge of a resolved unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    /// A unit in the same package; linked statically.
    Unit {
        /// The depended-upon unit.
        id: UnitId,
        /// Conditions gating the edge.
        #[serde(default)]
        conditions: Vec<PackageCondition>,
    },
    /// A product, linked according to the product's kind.
    Product {
        /// The depended-upon product.
        id: ProductId,
        /// Conditions gating the edge.
        #[serde(default)]
        conditions: Vec<PackageCondition>,
    },
}

impl Dependency {
    /// Unconditional edge onto a unit.
    #[must_use]
    pub const fn unit(id: UnitId) -> Self {
        Self::Unit {
            id,
            conditions: Vec::new(),
        }
    }

    /// Unconditional edge onto a product.
    #[must_use]
    pub const fn product(id: ProductId) -> Self {
        Self::Product {
            id,
            conditions: Vec::new(),
        }
    }

    /// Attach conditions to the edge.
    #[must_use]
    pub fn with_conditions(self, conditions: Vec<PackageCondition>) -> Self {
        match self {
            Self::Unit { id, .. } => Self::Unit { id, conditions },
            Self::Product { id, .. } => Self::Product { id, conditions },
        }
    }

    /// The target unit, for unit edges.
    #[must_use]
    pub const fn unit_id(&self) -> Option<&UnitId> {
        match self {
            Self::Unit { id, .. } => Some(id),
            Self::Product { .. } => None,
        }
    }

    /// The target product, for product edges.
    #[must_use]
    pub const fn product_id(&self) -> Option<&ProductId> {
        match self {
            Self::Unit { .. } => None,
            Self::Product { id, .. } => Some(id),
        }
    }

    /// Conditions gating the edge.
    #[must_use]
    pub fn conditions(&self) -> &[PackageCondition] {
        match self {
            Self::Unit { conditions, .. } | Self::Product { conditions, .. } => conditions,
        }
    }

    /// Whether every condition holds in `environment`.
    #[must_use]
    pub fn satisfies(&self, environment: &BuildEnvironment) -> bool {
        self.conditions()
            .iter()
            .all(|condition| condition.satisfies(environment))
    }

    /// Endpoint identity, ignoring conditions.
    #[must_use]
    pub fn id(&self) -> DependencyId {
        match self {
            Self::Unit { id, .. } => DependencyId::Unit(id.clone()),
            Self::Product { id, .. } => DependencyId::Product(id.clone()),
        }
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.id().fmt(f)
    }
}

/// A compiled module in the resolved graph.
///
/// Units are immutable once built; derive variants with [`Unit::for_triple`]
/// or a fresh [`UnitBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    id: UnitId,
    kind: UnitKind,
    sources: Sources,
    dependencies: Vec<Dependency>,
    resources: Vec<Utf8PathBuf>,
    prebuilt_binaries: Vec<Utf8PathBuf>,
    plugin_commands: Vec<PluginCommand>,
    default_localization: Option<String>,
    supported_platforms: Vec<SupportedPlatform>,
    platform_version_provider: PlatformVersionProvider,
    package_access: bool,
}

impl Unit {
    /// Start building a unit.
    #[must_use]
    pub fn builder(
        name: impl Into<String>,
        package: impl Into<PackageIdentity>,
        kind: UnitKind,
    ) -> UnitBuilder {
        UnitBuilder::new(name, package.into(), kind)
    }

    /// Identity of the unit.
    #[must_use]
    pub const fn id(&self) -> &UnitId {
        &self.id
    }

    /// Unit name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.id.name()
    }

    /// Declaring package.
    #[must_use]
    pub const fn package(&self) -> &PackageIdentity {
        self.id.package()
    }

    /// Triple the unit is compiled for.
    #[must_use]
    pub const fn build_triple(&self) -> BuildTriple {
        self.id.triple()
    }

    /// Kind of unit.
    #[must_use]
    pub const fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Source files.
    #[must_use]
    pub const fn sources(&self) -> &Sources {
        &self.sources
    }

    /// Declared dependency edges, unfiltered.
    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Edges whose conditions all hold in `environment`.
    pub fn dependencies_satisfying<'a>(
        &'a self,
        environment: &'a BuildEnvironment,
    ) -> impl Iterator<Item = &'a Dependency> + 'a {
        self.dependencies
            .iter()
            .filter(move |dependency| dependency.satisfies(environment))
    }

    /// Resource files bundled with the unit.
    #[must_use]
    pub fn resources(&self) -> &[Utf8PathBuf] {
        &self.resources
    }

    /// Prebuilt binaries the unit links against.
    #[must_use]
    pub fn prebuilt_binaries(&self) -> &[Utf8PathBuf] {
        &self.prebuilt_binaries
    }

    /// Commands contributed by build-tool plugins.
    #[must_use]
    pub fn plugin_commands(&self) -> &[PluginCommand] {
        &self.plugin_commands
    }

    /// Default localisation for resources.
    #[must_use]
    pub fn default_localization(&self) -> Option<&str> {
        self.default_localization.as_deref()
    }

    /// Declared supported platforms.
    #[must_use]
    pub fn supported_platforms(&self) -> &[SupportedPlatform] {
        &self.supported_platforms
    }

    /// Provider used to derive deployment targets.
    #[must_use]
    pub const fn platform_version_provider(&self) -> &PlatformVersionProvider {
        &self.platform_version_provider
    }

    /// Whether package-scoped declarations of sibling units are visible.
    #[must_use]
    pub const fn package_access(&self) -> bool {
        self.package_access
    }

    /// Effective deployment target for `platform`.
    #[must_use]
    pub fn supported_platform(
        &self,
        platform: &Platform,
        using_test_runtime: bool,
    ) -> SupportedPlatform {
        self.platform_version_provider
            .derived(&self.supported_platforms, platform, using_test_runtime)
    }

    /// A copy of this unit compiled for `triple`.
    ///
    /// Unit edges are retargeted to the same triple; product edges are left
    /// for the caller to rewrite.
    #[must_use]
    pub fn for_triple(&self, triple: BuildTriple) -> Self {
        let dependencies = self
            .dependencies
            .iter()
            .map(|dependency| match dependency {
                Dependency::Unit { id, conditions } => Dependency::Unit {
                    id: id.with_triple(triple),
                    conditions: conditions.clone(),
                },
                Dependency::Product { .. } => dependency.clone(),
            })
            .collect();
        Self {
            id: self.id.with_triple(triple),
            dependencies,
            ..self.clone()
        }
    }

    pub(crate) fn map_product_dependencies(
        mut self,
        mut f: impl FnMut(&ProductId) -> ProductId,
    ) -> Self {
        for dependency in &mut self.dependencies {
            if let Dependency::Product { id, .. } = dependency {
                *id = f(id);
            }
        }
        self
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<Unit: {}>", self.id)
    }
}

/// Builder for [`Unit`].
#[derive(Debug, Clone)]
pub struct UnitBuilder {
    name: String,
    package: PackageIdentity,
    kind: UnitKind,
    triple: BuildTriple,
    sources: Sources,
    dependencies: Vec<Dependency>,
    resources: Vec<Utf8PathBuf>,
    prebuilt_binaries: Vec<Utf8PathBuf>,
    plugin_commands: Vec<PluginCommand>,
    default_localization: Option<String>,
    supported_platforms: Vec<SupportedPlatform>,
    platform_version_provider: PlatformVersionProvider,
    package_access: bool,
}

impl UnitBuilder {
    fn new(name: impl Into<String>, package: PackageIdentity, kind: UnitKind) -> Self {
        Self {
            name: name.into(),
            package,
            kind,
            triple: BuildTriple::Destination,
            sources: Sources::default(),
            dependencies: Vec::new(),
            resources: Vec::new(),
            prebuilt_binaries: Vec::new(),
            plugin_commands: Vec::new(),
            default_localization: None,
            supported_platforms: Vec::new(),
            platform_version_provider: PlatformVersionProvider::default(),
            package_access: false,
        }
    }

    /// Set the build triple.
    #[must_use]
    pub const fn triple(mut self, triple: BuildTriple) -> Self {
        self.triple = triple;
        self
    }

    /// Set the sources.
    #[must_use]
    pub fn sources(mut self, sources: Sources) -> Self {
        self.sources = sources;
        self
    }

    /// Append a dependency edge.
    #[must_use]
    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Append several dependency edges.
    #[must_use]
    pub fn dependencies(mut self, dependencies: impl IntoIterator<Item = Dependency>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    /// Set the resource files.
    #[must_use]
    pub fn resources(mut self, resources: Vec<Utf8PathBuf>) -> Self {
        self.resources = resources;
        self
    }

    /// Set the prebuilt binaries.
    #[must_use]
    pub fn prebuilt_binaries(mut self, binaries: Vec<Utf8PathBuf>) -> Self {
        self.prebuilt_binaries = binaries;
        self
    }

    /// Set the plugin commands.
    #[must_use]
    pub fn plugin_commands(mut self, commands: Vec<PluginCommand>) -> Self {
        self.plugin_commands = commands;
        self
    }

    /// Set the default localisation.
    #[must_use]
    pub fn default_localization(mut self, localization: Option<String>) -> Self {
        self.default_localization = localization;
        self
    }

    /// Set the supported platforms.
    #[must_use]
    pub fn supported_platforms(mut self, platforms: Vec<SupportedPlatform>) -> Self {
        self.supported_platforms = platforms;
        self
    }

    /// Set the platform version provider.
    #[must_use]
    pub fn platform_version_provider(mut self, provider: PlatformVersionProvider) -> Self {
        self.platform_version_provider = provider;
        self
    }

    /// Allow access to package-scoped declarations.
    #[must_use]
    pub const fn package_access(mut self, package_access: bool) -> Self {
        self.package_access = package_access;
        self
    }

    /// Finish the unit.
    #[must_use]
    pub fn build(self) -> Unit {
        Unit {
            id: UnitId::new(self.name, self.package, self.triple),
            kind: self.kind,
            sources: self.sources,
            dependencies: self.dependencies,
            resources: self.resources,
            prebuilt_binaries: self.prebuilt_binaries,
            plugin_commands: self.plugin_commands,
            default_localization: self.default_localization,
            supported_platforms: self.supported_platforms,
            platform_version_provider: self.platform_version_provider,
            package_access: self.package_access,
        }
    }
}
