//! Planning configuration.
//!
//! [`BuildParameters`] describe one build triple: where derived files go,
//! which platform and configuration edge conditions are evaluated against,
//! and how tests are built. [`PlanConfig`] bundles the destination and tools
//! parameters with the emission switches and is what the CLI reads from disk.
//!
//! # Examples
//!
//! ```
//! use buildplan::config::PlanConfig;
//!
//! let config: PlanConfig = r#"{"destination": {"configuration": "release"}}"#
//!     .parse()
//!     .unwrap();
//! assert_eq!(config.destination.build_path(), ".build/x86_64-unknown-linux-gnu/release");
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{BuildConfiguration, BuildEnvironment, BuildTriple, Platform};

/// Errors raised while loading a [`PlanConfig`].
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration at {path}")]
    #[diagnostic(code(buildplan::config::io))]
    Io {
        /// File that was read.
        path: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// The configuration is not valid JSON for the expected schema.
    #[error("failed to parse configuration")]
    #[diagnostic(code(buildplan::config::parse))]
    Parse(#[from] serde_json::Error),
}

/// Test runtime linked into test products.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestLibrary {
    /// Runtime that runs an explicit list of tests produced by discovery.
    #[default]
    Listed,
    /// Runtime that registers and finds its tests itself.
    SelfRegistering,
}

impl TestLibrary {
    /// Whether test products need a generated discovery unit.
    #[must_use]
    pub const fn requires_discovery(self) -> bool {
        match self {
            Self::Listed => true,
            Self::SelfRegistering => false,
        }
    }

    /// Stem of the generated entry-point source file.
    #[must_use]
    pub const fn entry_point_stem(self) -> &'static str {
        match self {
            Self::Listed => "runner",
            Self::SelfRegistering => "main",
        }
    }
}

/// How test products are packaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestProductStyle {
    /// Tests are built into a bundle loaded by an external runner.
    LoadableBundle,
    /// Tests are linked into an executable with an entry point.
    EntryPointExecutable {
        /// Discovery was requested explicitly by the user.
        #[serde(default)]
        explicitly_enabled_discovery: bool,
        /// Entry-point file named explicitly by the user.
        #[serde(default)]
        explicitly_specified_path: Option<Utf8PathBuf>,
    },
}

impl Default for TestProductStyle {
    fn default() -> Self {
        Self::EntryPointExecutable {
            explicitly_enabled_discovery: false,
            explicitly_specified_path: None,
        }
    }
}

impl TestProductStyle {
    /// Whether discovery and entry-point units must be derived for tests.
    #[must_use]
    pub const fn requires_derived_test_targets(&self) -> bool {
        matches!(self, Self::EntryPointExecutable { .. })
    }
}

/// Settings that shape test products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingParameters {
    /// Selected test runtime.
    pub library: TestLibrary,
    /// Test product packaging.
    pub style: TestProductStyle,
}

/// Tools invoked by emitted commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolchain {
    /// Compiler driver, also used to link.
    pub compiler: Utf8PathBuf,
    /// Static archiver.
    pub archiver: Utf8PathBuf,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            compiler: Utf8PathBuf::from("cc"),
            archiver: Utf8PathBuf::from("ar"),
        }
    }
}

/// Parameters for one build triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildParameters {
    /// Which triple these parameters apply to.
    pub triple: BuildTriple,
    /// Target triple passed to the compiler.
    pub target_triple: String,
    /// Platform edge conditions are evaluated against.
    pub platform: Platform,
    /// Build configuration.
    pub configuration: BuildConfiguration,
    /// Root of all build outputs.
    pub data_path: Utf8PathBuf,
    /// Enabled package traits.
    pub traits: BTreeSet<String>,
    /// Tools used by emitted commands.
    pub toolchain: Toolchain,
    /// Extension of generated source files.
    pub source_extension: String,
    /// Extra flags appended to every compile command.
    pub flags: Vec<String>,
    /// Test product settings.
    pub testing: TestingParameters,
}

impl Default for BuildParameters {
    fn default() -> Self {
        Self {
            triple: BuildTriple::Destination,
            target_triple: "x86_64-unknown-linux-gnu".to_owned(),
            platform: Platform::linux(),
            configuration: BuildConfiguration::Debug,
            data_path: Utf8PathBuf::from(".build"),
            traits: BTreeSet::new(),
            toolchain: Toolchain::default(),
            source_extension: "src".to_owned(),
            flags: Vec::new(),
            testing: TestingParameters::default(),
        }
    }
}

impl BuildParameters {
    /// Directory holding this triple's outputs for the active configuration.
    ///
    /// Tools outputs get their own subtree so a unit built for both triples
    /// never shares object paths.
    #[must_use]
    pub fn build_path(&self) -> Utf8PathBuf {
        let base = self.data_path.join(&self.target_triple);
        match self.triple {
            BuildTriple::Destination => base.join(self.configuration.as_str()),
            BuildTriple::Tools => base.join("tools").join(self.configuration.as_str()),
        }
    }

    /// Environment used to filter dependency edges.
    #[must_use]
    pub fn build_environment(&self) -> BuildEnvironment {
        BuildEnvironment::new(self.platform.clone(), Some(self.configuration))
            .with_traits(self.traits.iter().cloned())
    }

    /// Parameters for host tools derived from these destination parameters.
    ///
    /// Tests are never built for the tools triple, so testing settings reset
    /// to their defaults.
    #[must_use]
    pub fn for_tools(&self) -> Self {
        Self {
            triple: BuildTriple::Tools,
            testing: TestingParameters::default(),
            ..self.clone()
        }
    }
}

/// What the emitter produces for each unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitMode {
    /// Full compile, archive and link commands.
    #[default]
    Build,
    /// Only per-unit aggregate nodes, for indexing and preparation builds.
    Prepare,
}

/// Complete planning configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Destination parameters.
    pub destination: BuildParameters,
    /// Tools parameters; derived from `destination` when absent.
    pub tools: Option<BuildParameters>,
    /// Whether resource bundles are emitted for units declaring resources.
    pub create_resource_bundles: bool,
    /// Emission mode.
    pub mode: EmitMode,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            destination: BuildParameters::default(),
            tools: None,
            create_resource_bundles: true,
            mode: EmitMode::Build,
        }
    }
}

impl FromStr for PlanConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}

impl PlanConfig {
    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable or malformed.
    pub fn from_path(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        text.parse()
    }

    /// Effective tools parameters.
    #[must_use]
    pub fn tools_parameters(&self) -> BuildParameters {
        self.tools.as_ref().map_or_else(
            || self.destination.for_tools(),
            |tools| BuildParameters {
                triple: BuildTriple::Tools,
                ..tools.clone()
            },
        )
    }
}
