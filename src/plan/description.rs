//! Per-unit and per-product build descriptions.
//!
//! A description pairs a resolved unit or product with the parameters of the
//! triple it is built for, and derives every path the emitter writes.

use camino::{Utf8Path, Utf8PathBuf};

use crate::config::BuildParameters;
use crate::model::{BuildTriple, LibraryKind, Product, ProductKind, Unit, UnitId, UnitKind};

/// Extension of module interface files.
const MODULE_EXTENSION: &str = "module";

/// Role a unit plays in a test product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestRole {
    /// Generated unit listing discovered tests.
    Discovery,
    /// Unit holding the test entry point.
    EntryPoint {
        /// Whether its source is generated rather than authored.
        synthesized: bool,
    },
}

/// How a unit is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDescription {
    unit: Unit,
    parameters: BuildParameters,
    test_role: Option<TestRole>,
}

impl UnitDescription {
    /// Describe `unit` built with `parameters`.
    #[must_use]
    pub const fn new(unit: Unit, parameters: BuildParameters, test_role: Option<TestRole>) -> Self {
        Self {
            unit,
            parameters,
            test_role,
        }
    }

    /// The unit.
    #[must_use]
    pub const fn unit(&self) -> &Unit {
        &self.unit
    }

    /// Parameters of the unit's triple.
    #[must_use]
    pub const fn parameters(&self) -> &BuildParameters {
        &self.parameters
    }

    /// Test role, for units derived for test products.
    #[must_use]
    pub const fn test_role(&self) -> Option<TestRole> {
        self.test_role
    }

    /// Whether the unit links the test runtime.
    #[must_use]
    pub const fn uses_test_runtime(&self) -> bool {
        match self.unit.kind() {
            UnitKind::Test | UnitKind::SynthesizedDiscovery | UnitKind::SynthesizedEntryPoint => {
                true
            }
            UnitKind::Library | UnitKind::Executable | UnitKind::ProvidedPrebuilt => {
                self.test_role.is_some()
            }
        }
    }

    /// Whether the unit's sources are written by a generator command.
    #[must_use]
    pub const fn has_generated_sources(&self) -> bool {
        matches!(
            self.test_role,
            Some(TestRole::Discovery | TestRole::EntryPoint { synthesized: true })
        )
    }

    /// Directory holding the unit's intermediate files.
    #[must_use]
    pub fn build_dir(&self) -> Utf8PathBuf {
        self.parameters
            .build_path()
            .join(self.unit.package().as_str())
            .join(format!("{}.build", self.unit.name()))
    }

    /// Object file for `source`.
    #[must_use]
    pub fn object_path(&self, source: &Utf8Path) -> Utf8PathBuf {
        let relative = self.unit.sources().relative(source);
        self.build_dir().join(format!("{relative}.o"))
    }

    /// Compiler-written dependency file for `source`.
    #[must_use]
    pub fn dependency_file(&self, source: &Utf8Path) -> Utf8PathBuf {
        let relative = self.unit.sources().relative(source);
        self.build_dir().join(format!("{relative}.d"))
    }

    /// Directory searched for module interfaces.
    #[must_use]
    pub fn modules_dir(&self) -> Utf8PathBuf {
        self.parameters.build_path().join("Modules")
    }

    /// Module interface file, for units that expose one.
    ///
    /// Prebuilt units ship their interface in their source root.
    #[must_use]
    pub fn module_path(&self) -> Utf8PathBuf {
        match self.unit.kind() {
            UnitKind::ProvidedPrebuilt => self.unit.sources().root.clone(),
            UnitKind::Library
            | UnitKind::Executable
            | UnitKind::Test
            | UnitKind::SynthesizedDiscovery
            | UnitKind::SynthesizedEntryPoint => self
                .modules_dir()
                .join(self.unit.package().as_str())
                .join(format!("{}.{MODULE_EXTENSION}", self.unit.name())),
        }
    }

    /// Directory resource bundles are copied into.
    #[must_use]
    pub fn resource_bundle_dir(&self) -> Utf8PathBuf {
        self.parameters.build_path().join(format!(
            "{}_{}.resources",
            self.unit.package(),
            self.unit.name()
        ))
    }

    /// Name of the unit's aggregate target.
    #[must_use]
    pub fn target_name(&self) -> String {
        let suffix = match self.unit.build_triple() {
            BuildTriple::Tools => "-tool",
            BuildTriple::Destination => "",
        };
        format!(
            "{}.{}-{}.module{suffix}",
            self.unit.package(),
            self.unit.name(),
            self.parameters.configuration
        )
    }
}

/// How a product is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDescription {
    product: Product,
    parameters: BuildParameters,
    entry_point: Option<UnitId>,
}

impl ProductDescription {
    /// Describe `product` built with `parameters`.
    #[must_use]
    pub const fn new(product: Product, parameters: BuildParameters) -> Self {
        Self {
            product,
            parameters,
            entry_point: None,
        }
    }

    /// The product.
    #[must_use]
    pub const fn product(&self) -> &Product {
        &self.product
    }

    /// Parameters of the product's triple.
    #[must_use]
    pub const fn parameters(&self) -> &BuildParameters {
        &self.parameters
    }

    /// Entry-point unit linked into a test product.
    #[must_use]
    pub const fn entry_point(&self) -> Option<&UnitId> {
        self.entry_point.as_ref()
    }

    pub(crate) fn set_entry_point(&mut self, unit: UnitId) {
        self.entry_point = Some(unit);
    }

    /// Units whose objects make up the product, entry point last.
    pub fn link_units(&self) -> impl Iterator<Item = &UnitId> {
        self.product.units().iter().chain(self.entry_point.as_ref())
    }

    /// Built binary, or `None` for products that produce no file.
    #[must_use]
    pub fn binary_path(&self) -> Option<Utf8PathBuf> {
        let name = self.product.name();
        let file = match self.product.kind() {
            ProductKind::Executable | ProductKind::Macro => name.to_owned(),
            ProductKind::Test => format!("{name}.test"),
            ProductKind::Library(LibraryKind::Static) => format!("lib{name}.a"),
            ProductKind::Library(LibraryKind::Dynamic) => format!("lib{name}.so"),
            ProductKind::Library(LibraryKind::Automatic) | ProductKind::Plugin => return None,
        };
        Some(self.parameters.build_path().join(file))
    }

    /// Name of the product's target.
    #[must_use]
    pub fn target_name(&self) -> String {
        let suffix = match self.product.kind() {
            ProductKind::Executable => "exe",
            ProductKind::Macro => "macro",
            ProductKind::Test => "test",
            ProductKind::Library(LibraryKind::Static) => "a",
            ProductKind::Library(LibraryKind::Dynamic) => "dylib",
            ProductKind::Library(LibraryKind::Automatic) => "automatic",
            ProductKind::Plugin => "plugin",
        };
        format!(
            "{}.{}-{}.{suffix}",
            self.product.package(),
            self.product.name(),
            self.parameters.configuration
        )
    }
}
