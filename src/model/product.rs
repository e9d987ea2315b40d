//! Resolved products.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use super::{
    BuildTriple, PackageIdentity, ProductId, SupportedPlatform, UnitId,
    platform::PlatformVersionProvider,
};

/// Linkage of a library product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryKind {
    /// Archived and linked into each client.
    Static,
    /// Linked as a shared library.
    Dynamic,
    /// Linkage chosen by the client; treated as static.
    Automatic,
}

/// Kind of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// A library.
    Library(LibraryKind),
    /// An executable program.
    Executable,
    /// A compiler macro implementation, run on the host.
    Macro,
    /// A build-tool plugin.
    Plugin,
    /// A test bundle.
    Test,
}

/// A named buildable output aggregating units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    kind: ProductKind,
    units: Vec<UnitId>,
    test_entry_point: Option<UnitId>,
    test_entry_point_path: Option<Utf8PathBuf>,
    default_localization: Option<String>,
    supported_platforms: Vec<SupportedPlatform>,
    platform_version_provider: PlatformVersionProvider,
}

impl Product {
    /// Create a product over `units`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        package: impl Into<PackageIdentity>,
        kind: ProductKind,
        units: Vec<UnitId>,
    ) -> Self {
        Self {
            id: ProductId::new(name, package.into(), BuildTriple::Destination),
            kind,
            units,
            test_entry_point: None,
            test_entry_point_path: None,
            default_localization: None,
            supported_platforms: Vec::new(),
            platform_version_provider: PlatformVersionProvider::default(),
        }
    }

    /// Set the build triple; member unit identities follow.
    #[must_use]
    pub fn with_triple(mut self, triple: BuildTriple) -> Self {
        self.id = self.id.with_triple(triple);
        self.units = self.units.iter().map(|u| u.with_triple(triple)).collect();
        self.test_entry_point = self.test_entry_point.map(|u| u.with_triple(triple));
        self
    }

    /// Declare an authored test entry-point unit and the file it came from.
    #[must_use]
    pub fn with_test_entry_point(mut self, unit: UnitId, path: Option<Utf8PathBuf>) -> Self {
        self.test_entry_point = Some(unit);
        self.test_entry_point_path = path;
        self
    }

    /// Set the default localisation inherited by synthesized units.
    #[must_use]
    pub fn with_default_localization(mut self, localization: Option<String>) -> Self {
        self.default_localization = localization;
        self
    }

    /// Set the supported platforms inherited by synthesized units.
    #[must_use]
    pub fn with_supported_platforms(mut self, platforms: Vec<SupportedPlatform>) -> Self {
        self.supported_platforms = platforms;
        self
    }

    /// Set the platform version provider inherited by synthesized units.
    #[must_use]
    pub fn with_platform_version_provider(mut self, provider: PlatformVersionProvider) -> Self {
        self.platform_version_provider = provider;
        self
    }

    /// Product identity.
    #[must_use]
    pub const fn id(&self) -> &ProductId {
        &self.id
    }

    /// Product name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.id.name()
    }

    /// Declaring package.
    #[must_use]
    pub const fn package(&self) -> &PackageIdentity {
        self.id.package()
    }

    /// Triple the product is built for.
    #[must_use]
    pub const fn build_triple(&self) -> BuildTriple {
        self.id.triple()
    }

    /// Product kind.
    #[must_use]
    pub const fn kind(&self) -> ProductKind {
        self.kind
    }

    /// Member units.
    #[must_use]
    pub fn units(&self) -> &[UnitId] {
        &self.units
    }

    /// Authored test entry-point unit, if any.
    #[must_use]
    pub const fn test_entry_point(&self) -> Option<&UnitId> {
        self.test_entry_point.as_ref()
    }

    /// File the authored entry point was found at, if known.
    #[must_use]
    pub fn test_entry_point_path(&self) -> Option<&camino::Utf8Path> {
        self.test_entry_point_path.as_deref()
    }

    /// Default localisation.
    #[must_use]
    pub fn default_localization(&self) -> Option<&str> {
        self.default_localization.as_deref()
    }

    /// Supported platforms.
    #[must_use]
    pub fn supported_platforms(&self) -> &[SupportedPlatform] {
        &self.supported_platforms
    }

    /// Platform version provider.
    #[must_use]
    pub const fn platform_version_provider(&self) -> &PlatformVersionProvider {
        &self.platform_version_provider
    }
}

impl Display for Product {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<Product: {}>", self.id)
    }
}
