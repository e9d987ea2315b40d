//! Build plans.
//!
//! A [`BuildPlan`] describes how every unit and product of a resolved graph
//! is built: which parameters apply, which test units were derived, and in
//! what order units must be lowered. The plan owns a copy of the graph with
//! the derived test units inserted, so the caller's graph is never mutated.

mod command_line;
mod description;
pub mod test;

use indexmap::IndexMap;
use tracing::debug;

use crate::config::{BuildParameters, EmitMode, PlanConfig};
use crate::diagnostics::DiagnosticSink;
use crate::error::PlanError;
use crate::fs::FileSystem;
use crate::graph::{GraphError, ResolvedGraph, topological_sort};
use crate::model::{BuildTriple, Dependency, ProductId, ProductKind, UnitId};

pub use command_line::{CommandLineBuilder, DefaultCommandLine};
pub use description::{ProductDescription, TestRole, UnitDescription};
pub use test::DerivedTestTarget;

/// Everything the emitter needs to lower a resolved graph.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    graph: ResolvedGraph,
    destination: BuildParameters,
    tools: BuildParameters,
    target_map: IndexMap<UnitId, UnitDescription>,
    product_map: IndexMap<ProductId, ProductDescription>,
    derived_test_targets: Vec<DerivedTestTarget>,
    create_resource_bundles: bool,
    mode: EmitMode,
}

impl BuildPlan {
    /// Plan every unit and product of `graph`.
    ///
    /// Test targets are derived first, when the configured test style calls
    /// for them, and merged into the plan before anything else is described.
    /// User-facing problems are reported through `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] when the graph is inconsistent.
    pub fn new<F, S>(
        graph: &ResolvedGraph,
        config: &PlanConfig,
        fs: &F,
        sink: &mut S,
    ) -> Result<Self, PlanError>
    where
        F: FileSystem + ?Sized,
        S: DiagnosticSink,
    {
        let destination = BuildParameters {
            triple: BuildTriple::Destination,
            ..config.destination.clone()
        };
        let tools = config.tools_parameters();
        let mut plan = Self {
            graph: graph.clone(),
            destination,
            tools,
            target_map: IndexMap::new(),
            product_map: IndexMap::new(),
            derived_test_targets: Vec::new(),
            create_resource_bundles: config.create_resource_bundles,
            mode: config.mode,
        };

        for unit in graph.units() {
            let parameters = plan.parameters(unit.build_triple()).clone();
            plan.target_map.insert(
                unit.id().clone(),
                UnitDescription::new(unit.clone(), parameters, None),
            );
        }
        for product in graph.products() {
            let parameters = plan.parameters(product.build_triple()).clone();
            plan.product_map.insert(
                product.id().clone(),
                ProductDescription::new(product.clone(), parameters),
            );
        }

        if plan.destination.testing.style.requires_derived_test_targets() {
            let derived =
                test::derived_test_targets(&plan.destination, &plan.tools, graph, fs, sink)?;
            for target in &derived {
                plan.merge_derived(target);
            }
            plan.derived_test_targets = derived;
        }

        debug!(
            units = plan.target_map.len(),
            products = plan.product_map.len(),
            derived = plan.derived_test_targets.len(),
            "planned build"
        );
        Ok(plan)
    }

    fn merge_derived(&mut self, target: &DerivedTestTarget) {
        if let Some(discarded) = &target.discarded {
            self.target_map.shift_remove(discarded);
        }
        for description in target.discovery.iter().chain([&target.entry_point]) {
            self.graph.insert_unit(description.unit().clone());
            self.target_map
                .insert(description.unit().id().clone(), description.clone());
        }
        if let Some(product) = self.product_map.get_mut(&target.product) {
            product.set_entry_point(target.entry_point.unit().id().clone());
        }
    }

    /// Graph with derived test units inserted.
    #[must_use]
    pub const fn graph(&self) -> &ResolvedGraph {
        &self.graph
    }

    /// Parameters for `triple`.
    #[must_use]
    pub const fn parameters(&self, triple: BuildTriple) -> &BuildParameters {
        match triple {
            BuildTriple::Destination => &self.destination,
            BuildTriple::Tools => &self.tools,
        }
    }

    /// Every planned unit.
    pub fn units(&self) -> impl Iterator<Item = &UnitDescription> {
        self.target_map.values()
    }

    /// Look up a planned unit.
    #[must_use]
    pub fn unit(&self, id: &UnitId) -> Option<&UnitDescription> {
        self.target_map.get(id)
    }

    /// Look up a unit that must be planned.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::MissingDescription`] when the unit is absent.
    pub fn description(&self, id: &UnitId) -> Result<&UnitDescription, PlanError> {
        self.target_map
            .get(id)
            .ok_or_else(|| PlanError::MissingDescription { id: id.clone() })
    }

    /// Every planned product in graph order.
    pub fn products(&self) -> impl Iterator<Item = &ProductDescription> {
        self.product_map.values()
    }

    /// Look up a planned product.
    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<&ProductDescription> {
        self.product_map.get(id)
    }

    /// Test targets derived while planning.
    #[must_use]
    pub fn derived_test_targets(&self) -> &[DerivedTestTarget] {
        &self.derived_test_targets
    }

    /// Whether units declaring resources get resource bundles.
    #[must_use]
    pub const fn create_resource_bundles(&self) -> bool {
        self.create_resource_bundles
    }

    /// Emission mode.
    #[must_use]
    pub const fn mode(&self) -> EmitMode {
        self.mode
    }

    /// Planned units ordered so each follows everything it depends on.
    ///
    /// Only edges active under each unit's own parameters are followed.
    /// Product edges lead to the product's member units, except for test
    /// products, which are never dependencies.
    ///
    /// # Errors
    ///
    /// Fails on a dependency cycle, an unknown product, or an edge onto an
    /// unplanned unit.
    pub fn ordered_units(&self) -> Result<Vec<&UnitDescription>, PlanError> {
        let roots: Vec<UnitId> = self.target_map.keys().cloned().collect();
        let order = topological_sort(roots, Clone::clone, |id| self.unit_successors(id))?;
        order.iter().map(|id| self.description(id)).collect()
    }

    fn unit_successors(&self, id: &UnitId) -> Result<Vec<UnitId>, GraphError> {
        let Some(description) = self.target_map.get(id) else {
            return Ok(Vec::new());
        };
        let environment = description.parameters().build_environment();
        let mut successors = Vec::new();
        for edge in description.unit().dependencies_satisfying(&environment) {
            match edge {
                Dependency::Unit { id: unit, .. } => successors.push(unit.clone()),
                Dependency::Product { id: product_id, .. } => {
                    let product = self.graph.expect_product(product_id)?;
                    if product.kind() != ProductKind::Test {
                        successors.extend(product.units().iter().cloned());
                    }
                }
            }
        }
        Ok(successors)
    }
}
