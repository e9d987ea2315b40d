//! Node and command tables of the low-level build graph.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use miette::Diagnostic;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

use super::cycle::{self, CycleDetectionReport};
use crate::hasher::CommandHasher;

/// Errors raised while assembling or validating a [`BuildGraph`].
#[derive(Debug, Error, Diagnostic)]
pub enum IrGenError {
    /// A path was declared as two different kinds of node.
    #[error("node '{key}' declared as {requested} but already known as {existing}")]
    #[diagnostic(code(buildplan::ir::conflicting_node))]
    ConflictingNode {
        /// Path or name shared by both declarations.
        key: String,
        /// Kind already in the table.
        existing: NodeKind,
        /// Kind of the new declaration.
        requested: NodeKind,
    },
    /// Two different commands share a name.
    #[error("command '{name}' declared twice with different content")]
    #[diagnostic(code(buildplan::ir::duplicate_command))]
    DuplicateCommand {
        /// The shared name.
        name: String,
    },
    /// Two commands produce the same node.
    #[error("'{output}' is produced by both '{first}' and '{second}'")]
    #[diagnostic(code(buildplan::ir::duplicate_output))]
    DuplicateOutput {
        /// The contested node.
        output: String,
        /// Command registered first.
        first: String,
        /// Command registered second.
        second: String,
    },
    /// A command reads a node nothing produces.
    #[error("command '{command}' reads '{input}', which is neither built nor a source")]
    #[diagnostic(code(buildplan::ir::dangling_input))]
    DanglingInput {
        /// The reading command.
        command: String,
        /// The orphaned input.
        input: String,
    },
    /// Commands depend on each other's outputs in a loop.
    #[error("circular dependency between commands: {}", cycle.join(" -> "))]
    #[diagnostic(code(buildplan::ir::circular_dependency))]
    CircularDependency {
        /// Node identities around the loop.
        cycle: Vec<String>,
    },
}

/// Kind of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A file on disk.
    File,
    /// A symbolic target with no file-system backing.
    Virtual,
    /// A directory on disk.
    Directory,
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "a file",
            Self::Virtual => "a virtual node",
            Self::Directory => "a directory",
        })
    }
}

/// A vertex of the build graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Node {
    /// A file.
    File(Utf8PathBuf),
    /// A symbolic aggregate target.
    Virtual(String),
    /// A directory.
    Directory(Utf8PathBuf),
}

impl Node {
    /// A file node.
    #[must_use]
    pub fn file(path: impl Into<Utf8PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// A virtual node.
    #[must_use]
    pub fn virtual_target(name: impl Into<String>) -> Self {
        Self::Virtual(name.into())
    }

    /// A directory node.
    #[must_use]
    pub fn directory(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Directory(path.into())
    }

    /// Kind of the node.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::File(_) => NodeKind::File,
            Self::Virtual(_) => NodeKind::Virtual,
            Self::Directory(_) => NodeKind::Directory,
        }
    }

    /// Backing path, for file and directory nodes.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            Self::File(path) | Self::Directory(path) => Some(path),
            Self::Virtual(_) => None,
        }
    }

    /// Table key: the path for files and directories, `<name>` for virtual
    /// nodes. A file and a directory at one path share a key.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::File(path) | Self::Directory(path) => path.as_str().trim_end_matches('/').to_owned(),
            Self::Virtual(name) => format!("<{name}>"),
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{path}"),
            Self::Virtual(name) => write!(f, "<{name}>"),
            Self::Directory(path) => write!(f, "{}/", path.as_str().trim_end_matches('/')),
        }
    }
}

/// The tool a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Compile one source file to an object.
    Compile,
    /// Merge a unit's objects into its module interface file.
    MergeModule,
    /// Archive objects into a static library.
    Archive,
    /// Link objects and libraries into a binary.
    Link,
    /// Copy a file or directory.
    Copy,
    /// Group inputs under a virtual node; runs nothing.
    Phony,
    /// Generate the sources listing discovered tests.
    TestDiscovery,
    /// Generate a test entry-point source.
    TestEntryPoint,
    /// Run a build-tool plugin command.
    Plugin,
}

impl Tool {
    /// Stable tag used in hashing and output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::MergeModule => "merge-module",
            Self::Archive => "archive",
            Self::Link => "link",
            Self::Copy => "copy",
            Self::Phony => "phony",
            Self::TestDiscovery => "test-discovery",
            Self::TestEntryPoint => "test-entry-point",
            Self::Plugin => "plugin",
        }
    }
}

/// A build action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    /// Unique name.
    pub name: String,
    /// Tool to run.
    pub tool: Tool,
    /// Text shown while the command runs.
    pub description: Option<String>,
    /// Nodes read, in order.
    pub inputs: Vec<Node>,
    /// Nodes written.
    pub outputs: Vec<Node>,
    /// Argument vector, executable first.
    pub arguments: Vec<String>,
    /// Compiler-written dependency file.
    pub dependency_file: Option<Utf8PathBuf>,
}

impl Command {
    /// Create a command with no arguments.
    #[must_use]
    pub fn new(name: impl Into<String>, tool: Tool) -> Self {
        Self {
            name: name.into(),
            tool,
            description: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            arguments: Vec::new(),
            dependency_file: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the inputs.
    #[must_use]
    pub fn inputs(mut self, inputs: Vec<Node>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Set the outputs.
    #[must_use]
    pub fn outputs(mut self, outputs: Vec<Node>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Set the arguments.
    #[must_use]
    pub fn arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Set the dependency file.
    #[must_use]
    pub fn dependency_file(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.dependency_file = Some(path.into());
        self
    }

    /// Arguments joined into one shell-quoted line.
    #[must_use]
    pub fn command_line(&self) -> String {
        shlex::try_join(self.arguments.iter().map(String::as_str))
            .unwrap_or_else(|_| self.arguments.join(" "))
    }
}

/// The engine-agnostic build graph.
///
/// Tables are insertion-ordered, so emitting the same plan twice yields the
/// same graph.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildGraph {
    nodes: IndexMap<String, Node>,
    commands: IndexMap<String, Command>,
    targets: IndexMap<String, Vec<Node>>,
    sources: IndexSet<Node>,
    #[serde(skip)]
    hashes: IndexMap<String, String>,
    #[serde(skip)]
    producers: IndexMap<String, String>,
}

impl BuildGraph {
    /// Declare a node, or confirm an existing declaration of the same kind.
    ///
    /// # Errors
    ///
    /// Returns [`IrGenError::ConflictingNode`] when the path is already
    /// declared with another kind.
    pub fn add_node(&mut self, node: &Node) -> Result<(), IrGenError> {
        let key = node.key();
        match self.nodes.get(&key) {
            Some(existing) if existing.kind() != node.kind() => Err(IrGenError::ConflictingNode {
                key,
                existing: existing.kind(),
                requested: node.kind(),
            }),
            Some(_) => Ok(()),
            None => {
                self.nodes.insert(key, node.clone());
                Ok(())
            }
        }
    }

    /// Declare a primary source that no command produces.
    ///
    /// # Errors
    ///
    /// Fails if the node conflicts with an existing declaration.
    pub fn add_source(&mut self, node: Node) -> Result<(), IrGenError> {
        self.add_node(&node)?;
        self.sources.insert(node);
        Ok(())
    }

    /// Add a command, declaring all of its nodes.
    ///
    /// Re-adding an identical command is a no-op and returns `false`.
    ///
    /// # Errors
    ///
    /// Fails on a same-named command with different content, an output
    /// already produced by another command, or a node kind conflict.
    pub fn add_command(&mut self, command: Command) -> Result<bool, IrGenError> {
        let hash = CommandHasher::hash(&command);
        if let Some(existing) = self.hashes.get(&command.name) {
            return if *existing == hash {
                Ok(false)
            } else {
                Err(IrGenError::DuplicateCommand { name: command.name })
            };
        }
        for node in command.inputs.iter().chain(&command.outputs) {
            self.add_node(node)?;
        }
        for output in &command.outputs {
            if let Some(first) = self.producers.get(&output.key()) {
                return Err(IrGenError::DuplicateOutput {
                    output: output.to_string(),
                    first: first.clone(),
                    second: command.name,
                });
            }
        }
        for output in &command.outputs {
            self.producers.insert(output.key(), command.name.clone());
        }
        self.hashes.insert(command.name.clone(), hash);
        self.commands.insert(command.name.clone(), command);
        Ok(true)
    }

    /// Add a phony command grouping `inputs` under the virtual node `name`.
    ///
    /// # Errors
    ///
    /// Fails like [`BuildGraph::add_command`].
    pub fn add_phony(&mut self, name: &str, inputs: Vec<Node>) -> Result<Node, IrGenError> {
        let node = Node::virtual_target(name);
        self.add_command(
            Command::new(node.to_string(), Tool::Phony)
                .inputs(inputs)
                .outputs(vec![node.clone()]),
        )?;
        Ok(node)
    }

    /// Append `node` to the named target.
    pub fn add_target(&mut self, name: impl Into<String>, node: Node) {
        let nodes = self.targets.entry(name.into()).or_default();
        if !nodes.contains(&node) {
            nodes.push(node);
        }
    }

    /// Declared nodes keyed by [`Node::key`].
    #[must_use]
    pub const fn nodes(&self) -> &IndexMap<String, Node> {
        &self.nodes
    }

    /// Commands keyed by name.
    #[must_use]
    pub const fn commands(&self) -> &IndexMap<String, Command> {
        &self.commands
    }

    /// Look up a command by name.
    #[must_use]
    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    /// Name of the command producing `node`.
    #[must_use]
    pub fn producer(&self, node: &Node) -> Option<&Command> {
        self.producers
            .get(&node.key())
            .and_then(|name| self.commands.get(name))
    }

    /// Named targets.
    #[must_use]
    pub const fn targets(&self) -> &IndexMap<String, Vec<Node>> {
        &self.targets
    }

    /// Nodes of one named target.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&[Node]> {
        self.targets.get(name).map(Vec::as_slice)
    }

    /// Primary sources.
    #[must_use]
    pub const fn sources(&self) -> &IndexSet<Node> {
        &self.sources
    }

    /// Check that every input is produced or a source, and that no command
    /// depends on its own output.
    ///
    /// # Errors
    ///
    /// Returns [`IrGenError::CircularDependency`] or
    /// [`IrGenError::DanglingInput`].
    pub fn validate(&self) -> Result<(), IrGenError> {
        let CycleDetectionReport {
            cycle,
            missing_dependencies,
        } = cycle::analyse(&self.producers, &self.commands);
        if let Some(cycle) = cycle {
            return Err(IrGenError::CircularDependency { cycle });
        }
        for command in self.commands.values() {
            if let Some(input) = command
                .inputs
                .iter()
                .find(|input| !self.producers.contains_key(&input.key()) && !self.sources.contains(*input))
            {
                return Err(IrGenError::DanglingInput {
                    command: command.name.clone(),
                    input: input.to_string(),
                });
            }
        }
        tracing::debug!(
            unproduced = missing_dependencies.len(),
            "validated build graph"
        );
        Ok(())
    }

    /// SHA-256 over every command in order.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        CommandHasher::fingerprint(self.commands.values())
    }
}
