//! Identities for packages, units and products.
//!
//! A unit is identified by its name, the package that declares it and the
//! [`BuildTriple`] it is compiled for. Two units sharing a name but living in
//! different packages, or the same unit compiled once for the host and once
//! for the destination, are different entities and never compare equal.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Normalised identity of a package.
///
/// Identities are compared case-insensitively, so the stored form is
/// lower-cased on construction.
///
/// # Examples
/// ```rust
/// use buildplan::model::PackageIdentity;
/// assert_eq!(PackageIdentity::new("Core"), PackageIdentity::new("core"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PackageIdentity(String);

impl PackageIdentity {
    /// Construct an identity, normalising it to lower case.
    #[must_use]
    pub fn new(identity: impl AsRef<str>) -> Self {
        Self(identity.as_ref().to_lowercase())
    }

    /// View the identity as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for PackageIdentity {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for PackageIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<PackageIdentity> for String {
    fn from(value: PackageIdentity) -> Self {
        value.0
    }
}

impl Display for PackageIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Triple a unit instance is compiled for.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BuildTriple {
    /// Built for the machine running the build, e.g. macros and plugin tools.
    Tools,
    /// Built for the destination platform.
    #[default]
    Destination,
}

impl BuildTriple {
    /// Short label used in diagnostics and derived names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tools => "tools",
            Self::Destination => "destination",
        }
    }
}

impl Display for BuildTriple {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a resolved unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId {
    name: String,
    package: PackageIdentity,
    triple: BuildTriple,
}

impl UnitId {
    /// Build a unit identity.
    #[must_use]
    pub fn new(name: impl Into<String>, package: PackageIdentity, triple: BuildTriple) -> Self {
        Self {
            name: name.into(),
            package,
            triple,
        }
    }

    /// Unit name as declared in its package.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Identity of the declaring package.
    #[must_use]
    pub const fn package(&self) -> &PackageIdentity {
        &self.package
    }

    /// Triple the unit is compiled for.
    #[must_use]
    pub const fn triple(&self) -> BuildTriple {
        self.triple
    }

    /// The same unit identity, compiled for `triple`.
    #[must_use]
    pub fn with_triple(&self, triple: BuildTriple) -> Self {
        Self {
            name: self.name.clone(),
            package: self.package.clone(),
            triple,
        }
    }
}

impl Display for UnitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{} ({})", self.package, self.name, self.triple)
    }
}

/// Identity of a resolved product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId {
    name: String,
    package: PackageIdentity,
    triple: BuildTriple,
}

impl ProductId {
    /// Build a product identity.
    #[must_use]
    pub fn new(name: impl Into<String>, package: PackageIdentity, triple: BuildTriple) -> Self {
        Self {
            name: name.into(),
            package,
            triple,
        }
    }

    /// Product name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Identity of the declaring package.
    #[must_use]
    pub const fn package(&self) -> &PackageIdentity {
        &self.package
    }

    /// Triple the product is built for.
    #[must_use]
    pub const fn triple(&self) -> BuildTriple {
        self.triple
    }

    /// The same product identity, built for `triple`.
    #[must_use]
    pub fn with_triple(&self, triple: BuildTriple) -> Self {
        Self {
            name: self.name.clone(),
            package: self.package.clone(),
            triple,
        }
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{} ({})", self.package, self.name, self.triple)
    }
}
