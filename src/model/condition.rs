//! Build environments and the conditions that gate dependency edges.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

/// Operating system family a build targets.
///
/// Names are compared case-insensitively and stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Platform(String);

impl Platform {
    /// Construct a platform from its name.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().to_lowercase())
    }

    /// Linux.
    #[must_use]
    pub fn linux() -> Self {
        Self::new("linux")
    }

    /// macOS.
    #[must_use]
    pub fn macos() -> Self {
        Self::new("macos")
    }

    /// Windows.
    #[must_use]
    pub fn windows() -> Self {
        Self::new("windows")
    }

    /// Platform name.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for Platform {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Platform {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.0
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildConfiguration {
    /// Unoptimised build with debug information.
    #[default]
    Debug,
    /// Optimised build.
    Release,
}

impl BuildConfiguration {
    /// Lower-case name used in paths and target names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }
}

impl Display for BuildConfiguration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context against which edge conditions are evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnvironment {
    /// Platform being built for.
    pub platform: Platform,
    /// Configuration, or `None` when every configuration applies (e.g. when
    /// indexing).
    pub configuration: Option<BuildConfiguration>,
    /// Package traits enabled for this build.
    pub traits: BTreeSet<String>,
}

impl BuildEnvironment {
    /// Environment for `platform` and `configuration` with no traits enabled.
    #[must_use]
    pub const fn new(platform: Platform, configuration: Option<BuildConfiguration>) -> Self {
        Self {
            platform,
            configuration,
            traits: BTreeSet::new(),
        }
    }

    /// Enable the given traits.
    #[must_use]
    pub fn with_traits<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.traits.extend(traits.into_iter().map(Into::into));
        self
    }
}

/// Predicate attached to a dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageCondition {
    /// Active when building for one of the listed platforms.
    Platforms(Vec<Platform>),
    /// Active when building in the given configuration.
    Configuration(BuildConfiguration),
    /// Active when at least one of the listed traits is enabled.
    Traits(Vec<String>),
}

impl PackageCondition {
    /// Whether the condition holds in `environment`.
    #[must_use]
    pub fn satisfies(&self, environment: &BuildEnvironment) -> bool {
        match self {
            Self::Platforms(platforms) => platforms.contains(&environment.platform),
            Self::Configuration(configuration) => environment
                .configuration
                .is_none_or(|current| current == *configuration),
            Self::Traits(traits) => traits.iter().any(|t| environment.traits.contains(t)),
        }
    }
}
