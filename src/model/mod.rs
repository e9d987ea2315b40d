//! Vocabulary of the resolved graph.
//!
//! Units and products are addressed by identity ([`UnitId`], [`ProductId`])
//! rather than by reference, so the same logical graph can be instantiated
//! once per [`BuildTriple`] without aliasing.

mod condition;
mod identity;
mod platform;
mod product;
mod unit;

pub use condition::{BuildConfiguration, BuildEnvironment, PackageCondition, Platform};
pub use identity::{BuildTriple, PackageIdentity, ProductId, UnitId};
pub use platform::{
    PlatformVersion, PlatformVersionError, PlatformVersionProvider, SupportedPlatform,
};
pub use product::{LibraryKind, Product, ProductKind};
pub use unit::{
    Dependency, DependencyId, PluginCommand, Sources, Unit, UnitBuilder, UnitKind,
};

use camino::Utf8PathBuf;

/// A package of the resolved graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Package identity.
    pub identity: PackageIdentity,
    /// Name shown to users; used to name derived units.
    pub display_name: String,
    /// Package root directory.
    pub path: Utf8PathBuf,
    /// Units declared by the package, destination triple first.
    pub units: Vec<UnitId>,
    /// Products declared by the package.
    pub products: Vec<ProductId>,
}

impl Package {
    /// Create an empty package.
    #[must_use]
    pub fn new(
        identity: impl Into<PackageIdentity>,
        display_name: impl Into<String>,
        path: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            identity: identity.into(),
            display_name: display_name.into(),
            path: path.into(),
            units: Vec::new(),
            products: Vec::new(),
        }
    }
}
