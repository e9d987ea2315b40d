//! Fatal planning errors.
//!
//! Every variant is an internal defect: input that a correct resolver never
//! produces. User-fixable conditions go through
//! [`crate::diagnostics::DiagnosticSink`] instead.

use miette::Diagnostic;
use thiserror::Error;

use crate::graph::GraphError;
use crate::ir::IrGenError;
use crate::model::{PackageIdentity, ProductId, UnitId};

/// Errors that abort planning.
#[derive(Debug, Error, Diagnostic)]
pub enum PlanError {
    /// A product's declaring package is not in the graph.
    #[error("package '{package}' not found for product {product}")]
    #[diagnostic(code(buildplan::plan::missing_package))]
    MissingPackage {
        /// The orphaned product.
        product: ProductId,
        /// The package it names.
        package: PackageIdentity,
    },
    /// An edge names a product that is not in the plan.
    #[error("unknown product {id} referenced by {dependent}")]
    #[diagnostic(code(buildplan::plan::unknown_product))]
    UnknownProduct {
        /// The missing product.
        id: ProductId,
        /// Unit holding the edge.
        dependent: UnitId,
    },
    /// A unit that must have been planned is absent.
    #[error("unit {id} has no build description")]
    #[diagnostic(code(buildplan::plan::missing_description))]
    MissingDescription {
        /// The unplanned unit.
        id: UnitId,
    },
    /// Derived test targets were requested for a style that has none.
    #[error("derived test targets requested for a loadable test bundle")]
    #[diagnostic(code(buildplan::plan::unsupported_test_style))]
    UnsupportedTestStyle,
    /// The resolved graph is inconsistent.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),
    /// The emitted command graph is inconsistent.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Ir(#[from] IrGenError),
}
