//! Supported platform declarations and deployment target derivation.

use indexmap::IndexMap;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

use super::Platform;

/// Minimum operating system version.
///
/// Platform versions are commonly written with one or two components
/// (`"13"`, `"10.15"`); missing components are treated as zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformVersion(Version);

/// Error returned when a platform version string cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid platform version '{0}'")]
pub struct PlatformVersionError(String);

impl PlatformVersion {
    /// Construct a version from its components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    /// The `0.0.0` version used when nothing is declared.
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0, 0, 0)
    }
}

impl FromStr for PlatformVersion {
    type Err = PlatformVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = [0_u64; 3];
        let mut count = 0_usize;
        for (slot, piece) in parts.iter_mut().zip(s.trim().split('.')) {
            *slot = piece
                .parse()
                .map_err(|_| PlatformVersionError(s.to_owned()))?;
            count += 1;
        }
        if count == 0 || s.trim().split('.').count() > 3 {
            return Err(PlatformVersionError(s.to_owned()));
        }
        let [major, minor, patch] = parts;
        Ok(Self::new(major, minor, patch))
    }
}

impl TryFrom<String> for PlatformVersion {
    type Error = PlatformVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PlatformVersion> for String {
    fn from(value: PlatformVersion) -> Self {
        value.to_string()
    }
}

impl Display for PlatformVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Version {
            major,
            minor,
            patch,
            ..
        } = &self.0;
        if *patch == 0 {
            write!(f, "{major}.{minor}")
        } else {
            write!(f, "{major}.{minor}.{patch}")
        }
    }
}

/// A platform a unit declares support for, with its minimum version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedPlatform {
    /// The platform.
    pub platform: Platform,
    /// Minimum supported version.
    pub version: PlatformVersion,
    /// Free-form platform options carried through to the compiler.
    #[serde(default)]
    pub options: Vec<String>,
}

impl SupportedPlatform {
    /// Declare support for `platform` from `version` onwards.
    #[must_use]
    pub const fn new(platform: Platform, version: PlatformVersion) -> Self {
        Self {
            platform,
            version,
            options: Vec::new(),
        }
    }
}

/// Derives the effective deployment target for a platform.
///
/// Units that declare a platform keep their declared version; other
/// platforms fall back to the provider's defaults. Units linking the test
/// runtime are raised to at least the runtime's own minimum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformVersionProvider {
    /// Minimum versions applied when a platform is not declared.
    #[serde(default)]
    pub defaults: IndexMap<Platform, PlatformVersion>,
    /// Minimum versions required by the test runtime.
    #[serde(default)]
    pub test_runtime_minimums: IndexMap<Platform, PlatformVersion>,
}

impl PlatformVersionProvider {
    /// Compute the effective supported platform entry.
    #[must_use]
    pub fn derived(
        &self,
        declared: &[SupportedPlatform],
        platform: &Platform,
        using_test_runtime: bool,
    ) -> SupportedPlatform {
        let mut supported = declared
            .iter()
            .find(|candidate| &candidate.platform == platform)
            .cloned()
            .unwrap_or_else(|| {
                let version = self
                    .defaults
                    .get(platform)
                    .cloned()
                    .unwrap_or_else(PlatformVersion::zero);
                SupportedPlatform::new(platform.clone(), version)
            });
        if using_test_runtime
            && let Some(minimum) = self.test_runtime_minimums.get(platform)
            && *minimum > supported.version
        {
            supported.version = minimum.clone();
        }
        supported
    }
}
