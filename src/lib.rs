//! Buildplan core library.
//!
//! This library plans the build of a fully resolved package graph. It models
//! resolved units and their conditional dependency edges ([`model`],
//! [`graph`]), derives the discovery and entry-point units test products need
//! ([`plan::test`]), and lowers the resulting [`plan::BuildPlan`] into an
//! engine-agnostic graph of nodes and commands ([`ir`]).
//!
//! # Examples
//!
//! ```
//! use buildplan::config::PlanConfig;
//! use buildplan::diagnostics::DiagnosticLog;
//! use buildplan::fs::MemoryFileSystem;
//! use buildplan::graph::GraphBuilder;
//! use buildplan::ir::BuildGraph;
//! use buildplan::model::{Package, Sources, Unit, UnitKind};
//! use buildplan::plan::{BuildPlan, DefaultCommandLine};
//!
//! let mut builder = GraphBuilder::new();
//! builder.add_package(Package::new("core", "Core", "/src/core")).unwrap();
//! builder
//!     .add_unit(
//!         Unit::builder("Utils", "core", UnitKind::Library)
//!             .sources(Sources::new(
//!                 "/src/core/Sources/Utils".into(),
//!                 vec!["/src/core/Sources/Utils/a.src".into()],
//!             ))
//!             .build(),
//!     )
//!     .unwrap();
//! let graph = builder.build().unwrap();
//!
//! let fs = MemoryFileSystem::new();
//! let mut log = DiagnosticLog::default();
//! let plan = BuildPlan::new(&graph, &PlanConfig::default(), &fs, &mut log).unwrap();
//! let ir = BuildGraph::from_plan(&plan, &DefaultCommandLine, &fs).unwrap();
//! assert!(ir.target("core.Utils-debug.module").is_some());
//! ```

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fs;
pub mod graph;
pub mod hasher;
pub mod ir;
pub mod model;
pub mod plan;
pub mod runner;
