//! File-system queries made while planning.
//!
//! Planning only ever asks point questions about paths, so the collaborator
//! is a two-method trait. [`LocalFileSystem`] answers from disk and
//! [`MemoryFileSystem`] from a fixed set of paths.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;

/// Synchronous existence queries.
#[cfg_attr(test, mockall::automock)]
pub trait FileSystem {
    /// Whether anything exists at `path`.
    fn exists(&self, path: &Utf8Path) -> bool;

    /// Whether `path` is a directory.
    fn is_directory(&self, path: &Utf8Path) -> bool;
}

/// Queries the real file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &Utf8Path) -> bool {
        path.exists()
    }

    fn is_directory(&self, path: &Utf8Path) -> bool {
        path.is_dir()
    }
}

/// An in-memory set of files and directories.
///
/// Parents of registered files are not implied; register directories
/// explicitly.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: BTreeSet<Utf8PathBuf>,
    directories: BTreeSet<Utf8PathBuf>,
}

impl MemoryFileSystem {
    /// Create an empty file system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.files.insert(path.into());
        self
    }

    /// Register a directory.
    #[must_use]
    pub fn with_directory(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.directories.insert(path.into());
        self
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Utf8Path) -> bool {
        self.files.contains(path) || self.directories.contains(path)
    }

    fn is_directory(&self, path: &Utf8Path) -> bool {
        self.directories.contains(path)
    }
}
