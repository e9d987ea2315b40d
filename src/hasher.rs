//! Command hashing utilities.
//!
//! This module provides the [`CommandHasher`] type used to compute a stable
//! SHA-256 digest for [`Command`] definitions. The hash decides whether a
//! second command with an existing name is a harmless repeat or a conflict,
//! and fingerprints whole graphs so repeated emissions can be compared.
//!
//! # Examples
//!
//! ```
//! use buildplan::hasher::CommandHasher;
//! use buildplan::ir::{Command, Node, Tool};
//!
//! let command = Command::new("a.o", Tool::Compile).outputs(vec![Node::file("a.o")]);
//! let hash = CommandHasher::hash(&command);
//! assert_eq!(hash.len(), 64);
//! ```

use sha2::{Digest, Sha256};

use crate::ir::{Command, Node};

/// Computes stable digests for [`Command`] definitions.
pub struct CommandHasher;

impl CommandHasher {
    /// Calculate the hash of a [`Command`].
    #[must_use]
    pub fn hash(command: &Command) -> String {
        let mut hasher = Sha256::new();
        Self::hash_command(&mut hasher, command);
        format!("{:x}", hasher.finalize())
    }

    /// Calculate one digest over a sequence of commands, in order.
    #[must_use]
    pub fn fingerprint<'a>(commands: impl IntoIterator<Item = &'a Command>) -> String {
        let mut hasher = Sha256::new();
        for command in commands {
            Self::hash_command(&mut hasher, command);
        }
        format!("{:x}", hasher.finalize())
    }

    fn hash_command(hasher: &mut Sha256, command: &Command) {
        Self::update_with_len(hasher, command.name.as_bytes());
        Self::update_with_len(hasher, command.tool.as_str().as_bytes());
        Self::hash_optional_string(hasher, command.description.as_deref());
        Self::hash_nodes(hasher, b"in", &command.inputs);
        Self::hash_nodes(hasher, b"out", &command.outputs);
        hasher.update(b"args");
        for argument in &command.arguments {
            Self::update_with_len(hasher, argument.as_bytes());
        }
        Self::hash_optional_string(
            hasher,
            command.dependency_file.as_ref().map(|p| p.as_str()),
        );
    }

    fn hash_nodes(hasher: &mut Sha256, tag: &[u8], nodes: &[Node]) {
        hasher.update(tag);
        hasher.update(format!("{}:", nodes.len()).as_bytes());
        for node in nodes {
            Self::update_with_len(hasher, node.to_string().as_bytes());
        }
    }

    fn hash_optional_string(hasher: &mut Sha256, value: Option<&str>) {
        match value {
            Some(v) => {
                hasher.update(b"1");
                Self::update_with_len(hasher, v.as_bytes());
            }
            None => hasher.update(b"0"),
        }
    }

    fn update_with_len(hasher: &mut Sha256, bytes: &[u8]) {
        let len = bytes.len();
        hasher.update(format!("{len}:").as_bytes());
        hasher.update(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Tool;
    use rstest::rstest;

    fn compile() -> Command {
        Command::new("a.o", Tool::Compile)
            .inputs(vec![Node::file("a.src")])
            .outputs(vec![Node::file("a.o")])
            .arguments(vec!["cc".into(), "-c".into()])
    }

    #[rstest]
    fn hash_is_stable() {
        assert_eq!(CommandHasher::hash(&compile()), CommandHasher::hash(&compile()));
    }

    #[rstest]
    #[case(compile().description("Compiling a"))]
    #[case(compile().dependency_file("a.d"))]
    #[case(compile().arguments(vec!["cc".into(), "-c".into(), "-O".into()]))]
    #[case(compile().inputs(vec![Node::directory("a.src")]))]
    #[case(compile().arguments(vec!["cc-c".into()]))]
    fn every_field_contributes(#[case] changed: Command) {
        assert_ne!(CommandHasher::hash(&compile()), CommandHasher::hash(&changed));
    }

    #[rstest]
    fn fingerprint_depends_on_order() {
        let a = compile();
        let b = Command::new("b.o", Tool::Compile);
        assert_ne!(
            CommandHasher::fingerprint([&a, &b]),
            CommandHasher::fingerprint([&b, &a])
        );
    }
}
