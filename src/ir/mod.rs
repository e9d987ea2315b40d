//! Low-level build graph.
//!
//! This module defines the engine-agnostic graph handed to the build
//! executor: file, virtual and directory nodes connected by commands. The
//! graph carries no executor syntax; [`BuildGraph::from_plan`] lowers a
//! [`crate::plan::BuildPlan`] into it.
//!
//! # Examples
//!
//! ```
//! use buildplan::ir::{BuildGraph, Command, Node, Tool};
//!
//! let mut graph = BuildGraph::default();
//! graph.add_source(Node::file("main.src")).unwrap();
//! graph
//!     .add_command(
//!         Command::new("main.o", Tool::Compile)
//!             .inputs(vec![Node::file("main.src")])
//!             .outputs(vec![Node::file("main.o")]),
//!     )
//!     .unwrap();
//! graph.validate().unwrap();
//! ```

mod cycle;
mod emit;
mod graph;

pub use graph::{BuildGraph, Command, IrGenError, Node, NodeKind, Tool};
