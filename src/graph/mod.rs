//! The resolved package graph.
//!
//! Units, products and packages live in flat tables keyed by their full
//! identity. Edges name identities rather than owning their targets, so a
//! closure of units can be copied onto the host triple without aliasing the
//! destination copies.
//!
//! # Examples
//!
//! ```
//! use buildplan::graph::GraphBuilder;
//! use buildplan::model::{Dependency, Package, Unit, UnitKind};
//!
//! let mut builder = GraphBuilder::new();
//! builder.add_package(Package::new("core", "Core", "/src/core")).unwrap();
//! let utils = Unit::builder("Utils", "core", UnitKind::Library).build();
//! let app = Unit::builder("App", "core", UnitKind::Executable)
//!     .dependency(Dependency::unit(utils.id().clone()))
//!     .build();
//! builder.add_unit(utils).unwrap();
//! builder.add_unit(app.clone()).unwrap();
//! let graph = builder.build().unwrap();
//! assert_eq!(graph.recursive_unit_dependencies(&app).unwrap().len(), 1);
//! ```

mod description;
pub mod traversal;

use indexmap::{IndexMap, IndexSet};
use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

use crate::model::{
    BuildEnvironment, BuildTriple, Dependency, DependencyId, Package, PackageIdentity, Product,
    ProductId, ProductKind, Unit, UnitId,
};

pub use description::{
    DependencyRecord, GraphDescription, PackageRecord, ProductRecord,
    UnitRecord,
};
pub use traversal::topological_sort;

/// Errors raised while building or walking the resolved graph.
///
/// These indicate a broken contract with the resolver that produced the
/// graph rather than something a user can fix in a manifest.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// An edge or product names a unit missing from the graph.
    #[error("unknown unit {id}")]
    #[diagnostic(code(buildplan::graph::unknown_unit))]
    UnknownUnit {
        /// The missing unit.
        id: UnitId,
    },
    /// An edge names a product missing from the graph.
    #[error("unknown product {id}")]
    #[diagnostic(code(buildplan::graph::unknown_product))]
    UnknownProduct {
        /// The missing product.
        id: ProductId,
    },
    /// A unit or product names a package missing from the graph.
    #[error("unknown package '{identity}'")]
    #[diagnostic(code(buildplan::graph::unknown_package))]
    UnknownPackage {
        /// The missing package.
        identity: String,
    },
    /// The same unit identity was added twice.
    #[error("duplicate unit {id}")]
    #[diagnostic(code(buildplan::graph::duplicate_unit))]
    DuplicateUnit {
        /// The repeated identity.
        id: UnitId,
    },
    /// The same product identity was added twice.
    #[error("duplicate product {id}")]
    #[diagnostic(code(buildplan::graph::duplicate_product))]
    DuplicateProduct {
        /// The repeated identity.
        id: ProductId,
    },
    /// The same package identity was added twice.
    #[error("duplicate package '{identity}'")]
    #[diagnostic(code(buildplan::graph::duplicate_package))]
    DuplicatePackage {
        /// The repeated identity.
        identity: String,
    },
    /// The dependency graph contains a cycle.
    #[error("circular dependency: {}", path.join(" -> "))]
    #[diagnostic(code(buildplan::graph::cycle))]
    Cycle {
        /// Nodes on the cycle, starting and ending at the same node.
        path: Vec<String>,
    },
    /// A graph description could not be read.
    #[error("failed to read graph description")]
    #[diagnostic(code(buildplan::graph::io))]
    Io(#[from] std::io::Error),
    /// A graph description is not valid JSON for the expected schema.
    #[error("failed to parse graph description")]
    #[diagnostic(code(buildplan::graph::parse))]
    Parse(#[from] serde_json::Error),
}

/// The fully resolved dependency graph.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    packages: IndexMap<PackageIdentity, Package>,
    units: IndexMap<UnitId, Unit>,
    products: IndexMap<ProductId, Product>,
}

impl ResolvedGraph {
    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    /// Look up a unit that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownUnit`] if the unit is absent.
    pub fn expect_unit(&self, id: &UnitId) -> Result<&Unit, GraphError> {
        self.units
            .get(id)
            .ok_or_else(|| GraphError::UnknownUnit { id: id.clone() })
    }

    /// Look up a product.
    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.products.get(id)
    }

    /// Look up a product that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownProduct`] if the product is absent.
    pub fn expect_product(&self, id: &ProductId) -> Result<&Product, GraphError> {
        self.products
            .get(id)
            .ok_or_else(|| GraphError::UnknownProduct { id: id.clone() })
    }

    /// Look up a package.
    #[must_use]
    pub fn package(&self, identity: &PackageIdentity) -> Option<&Package> {
        self.packages.get(identity)
    }

    /// Package declaring `product`.
    #[must_use]
    pub fn package_for_product(&self, product: &Product) -> Option<&Package> {
        self.packages.get(product.package())
    }

    /// All units in insertion order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// All products in insertion order.
    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    /// All packages in insertion order.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// Direct dependencies of the edge's endpoint, across packages.
    ///
    /// A product expands to unconditional edges onto its member units.
    ///
    /// # Errors
    ///
    /// Fails if the endpoint is not in the graph.
    pub fn direct_dependencies(&self, edge: &Dependency) -> Result<Vec<Dependency>, GraphError> {
        match edge {
            Dependency::Unit { id, .. } => Ok(self.expect_unit(id)?.dependencies().to_vec()),
            Dependency::Product { id, .. } => Ok(self
                .expect_product(id)?
                .units()
                .iter()
                .cloned()
                .map(Dependency::unit)
                .collect()),
        }
    }

    /// Direct dependencies of the edge's endpoint, limited to its package.
    ///
    /// Only unit edges are followed; a product edge leaves the package and
    /// yields nothing.
    ///
    /// # Errors
    ///
    /// Fails if a unit endpoint is not in the graph.
    pub fn package_dependencies(&self, edge: &Dependency) -> Result<Vec<Dependency>, GraphError> {
        match edge {
            Dependency::Unit { id, .. } => Ok(self
                .expect_unit(id)?
                .dependencies()
                .iter()
                .filter(|dependency| dependency.unit_id().is_some())
                .cloned()
                .collect()),
            Dependency::Product { .. } => Ok(Vec::new()),
        }
    }

    /// Transitive dependencies of `unit` in topological order.
    ///
    /// # Errors
    ///
    /// Fails on unknown endpoints or a cycle.
    pub fn recursive_dependencies(&self, unit: &Unit) -> Result<Vec<Dependency>, GraphError> {
        topological_sort(unit.dependencies().to_vec(), Dependency::id, |edge| {
            self.direct_dependencies(edge)
        })
    }

    /// Transitive dependencies active in `environment`.
    ///
    /// Edges are filtered at every hop before being expanded, so the
    /// dependencies of an inactive edge are never reached through it.
    ///
    /// # Errors
    ///
    /// Fails on unknown endpoints or a cycle.
    pub fn recursive_dependencies_satisfying(
        &self,
        unit: &Unit,
        environment: &BuildEnvironment,
    ) -> Result<Vec<Dependency>, GraphError> {
        let roots: Vec<_> = unit.dependencies_satisfying(environment).cloned().collect();
        topological_sort(roots, Dependency::id, |edge| {
            Ok(self
                .direct_dependencies(edge)?
                .into_iter()
                .filter(|dependency| dependency.satisfies(environment))
                .collect())
        })
    }

    /// Transitive unit dependencies of `unit`, products expanded.
    ///
    /// # Errors
    ///
    /// Fails on unknown endpoints or a cycle.
    pub fn recursive_unit_dependencies(&self, unit: &Unit) -> Result<Vec<&Unit>, GraphError> {
        self.recursive_dependencies(unit)?
            .iter()
            .filter_map(Dependency::unit_id)
            .map(|id| self.expect_unit(id))
            .collect()
    }

    /// Transitive same-package unit dependencies of `unit`.
    ///
    /// # Errors
    ///
    /// Fails on unknown endpoints or a cycle.
    pub fn recursive_package_dependencies(
        &self,
        unit: &Unit,
    ) -> Result<Vec<Dependency>, GraphError> {
        let roots: Vec<_> = unit
            .dependencies()
            .iter()
            .filter(|dependency| dependency.unit_id().is_some())
            .cloned()
            .collect();
        topological_sort(roots, Dependency::id, |edge| self.package_dependencies(edge))
    }

    /// Check that no unit participates in a dependency cycle.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Cycle`] for the first cycle found.
    pub fn validate_acyclic(&self) -> Result<(), GraphError> {
        let roots: Vec<_> = self
            .units
            .keys()
            .cloned()
            .map(DependencyId::Unit)
            .collect();
        topological_sort(roots, Clone::clone, |node| match node {
            DependencyId::Unit(id) => Ok(self
                .expect_unit(id)?
                .dependencies()
                .iter()
                .map(Dependency::id)
                .collect()),
            DependencyId::Product(id) => Ok(self
                .expect_product(id)?
                .units()
                .iter()
                .cloned()
                .map(DependencyId::Unit)
                .collect()),
        })
        .map(drop)
    }

    /// Copy the closure of `roots` onto the tools triple.
    ///
    /// Every unit reachable from `roots` through unit and product edges gets a
    /// tools-triple twin whose edges point at tools-triple identities; products
    /// crossed on the way are copied too. Destination units are left in place.
    /// Returns the identities of the tools copies of `roots`.
    ///
    /// # Errors
    ///
    /// Fails if the closure references an unknown unit or product, or is
    /// cyclic.
    pub fn instantiate_for_tools(&mut self, roots: &[UnitId]) -> Result<Vec<UnitId>, GraphError> {
        let start: Vec<_> = roots.iter().cloned().map(Dependency::unit).collect();
        let mut closure = topological_sort(start, Dependency::id, |edge| {
            self.direct_dependencies(edge)
        })?;
        let mut products = IndexSet::new();
        for edge in &closure {
            if let Dependency::Product { id, .. } = edge {
                products.insert(id.clone());
            }
        }
        closure.retain(|edge| edge.unit_id().is_some());

        for id in products {
            let host = self.expect_product(&id)?.clone().with_triple(BuildTriple::Tools);
            if !self.products.contains_key(host.id()) {
                self.register_product(host)?;
            }
        }
        for edge in closure {
            let Some(id) = edge.unit_id() else { continue };
            let host = self
                .expect_unit(id)?
                .for_triple(BuildTriple::Tools)
                .map_product_dependencies(|product| product.with_triple(BuildTriple::Tools));
            if !self.units.contains_key(host.id()) {
                debug!(unit = %host.id(), "instantiated unit for tools triple");
                self.register_unit(host)?;
            }
        }
        Ok(roots
            .iter()
            .map(|id| id.with_triple(BuildTriple::Tools))
            .collect())
    }

    pub(crate) fn insert_unit(&mut self, unit: Unit) {
        self.units.insert(unit.id().clone(), unit);
    }

    fn register_unit(&mut self, unit: Unit) -> Result<(), GraphError> {
        let package = self
            .packages
            .get_mut(unit.package())
            .ok_or_else(|| GraphError::UnknownPackage {
                identity: unit.package().to_string(),
            })?;
        if self.units.contains_key(unit.id()) {
            return Err(GraphError::DuplicateUnit {
                id: unit.id().clone(),
            });
        }
        package.units.push(unit.id().clone());
        self.units.insert(unit.id().clone(), unit);
        Ok(())
    }

    fn register_product(&mut self, product: Product) -> Result<(), GraphError> {
        let package = self
            .packages
            .get_mut(product.package())
            .ok_or_else(|| GraphError::UnknownPackage {
                identity: product.package().to_string(),
            })?;
        if self.products.contains_key(product.id()) {
            return Err(GraphError::DuplicateProduct {
                id: product.id().clone(),
            });
        }
        package.products.push(product.id().clone());
        self.products.insert(product.id().clone(), product);
        Ok(())
    }

    fn check_references(&self) -> Result<(), GraphError> {
        for unit in self.units.values() {
            for dependency in unit.dependencies() {
                match dependency {
                    Dependency::Unit { id, .. } => {
                        self.expect_unit(id)?;
                    }
                    Dependency::Product { id, .. } => {
                        self.expect_product(id)?;
                    }
                }
            }
        }
        for product in self.products.values() {
            for id in product.units().iter().chain(product.test_entry_point()) {
                self.expect_unit(id)?;
            }
        }
        Ok(())
    }

    /// Products of the given kind, in insertion order.
    pub fn products_of_kind(&self, kind: ProductKind) -> impl Iterator<Item = &Product> {
        self.products.values().filter(move |p| p.kind() == kind)
    }
}

/// Incrementally assembles a [`ResolvedGraph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: ResolvedGraph,
}

impl GraphBuilder {
    /// Start an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package. Its unit and product lists are filled as units and
    /// products are added.
    ///
    /// # Errors
    ///
    /// Fails if the package identity is already present.
    pub fn add_package(&mut self, mut package: Package) -> Result<&mut Self, GraphError> {
        if self.graph.packages.contains_key(&package.identity) {
            return Err(GraphError::DuplicatePackage {
                identity: package.identity.to_string(),
            });
        }
        package.units.clear();
        package.products.clear();
        self.graph.packages.insert(package.identity.clone(), package);
        Ok(self)
    }

    /// Add a unit to its (already added) package.
    ///
    /// # Errors
    ///
    /// Fails if the package is unknown or the unit identity is taken.
    pub fn add_unit(&mut self, unit: Unit) -> Result<&mut Self, GraphError> {
        self.graph.register_unit(unit)?;
        Ok(self)
    }

    /// Add a product to its (already added) package.
    ///
    /// # Errors
    ///
    /// Fails if the package is unknown or the product identity is taken.
    pub fn add_product(&mut self, product: Product) -> Result<&mut Self, GraphError> {
        self.graph.register_product(product)?;
        Ok(self)
    }

    /// Validate references and acyclicity, then return the graph.
    ///
    /// # Errors
    ///
    /// Fails on dangling references or a dependency cycle.
    pub fn build(self) -> Result<ResolvedGraph, GraphError> {
        self.graph.check_references()?;
        self.graph.validate_acyclic()?;
        Ok(self.graph)
    }
}
