//! Lowering a [`BuildPlan`] into a [`BuildGraph`].
//!
//! Units are lowered one at a time in dependency order, so every node a
//! compile command reads is declared before the command. Products are lowered
//! after all units. The finished graph is validated before it is returned.

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use tracing::debug;

use super::{BuildGraph, Command, Node, Tool};
use crate::config::EmitMode;
use crate::error::PlanError;
use crate::fs::FileSystem;
use crate::graph::topological_sort;
use crate::model::{BuildEnvironment, Dependency, LibraryKind, ProductId, ProductKind, UnitKind};
use crate::plan::{BuildPlan, CommandLineBuilder, ProductDescription, TestRole, UnitDescription};

impl BuildGraph {
    /// Lower every unit and product of `plan`.
    ///
    /// `command_line` supplies argument vectors; `fs` decides whether
    /// prebuilt binaries are files or directories.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] when the plan references an unknown product or
    /// unit, or when the resulting graph fails validation.
    pub fn from_plan<C, F>(plan: &BuildPlan, command_line: &C, fs: &F) -> Result<Self, PlanError>
    where
        C: CommandLineBuilder + ?Sized,
        F: FileSystem + ?Sized,
    {
        let mut emitter = Emitter {
            plan,
            command_line,
            fs,
            graph: Self::default(),
        };
        for unit in plan.ordered_units()? {
            emitter.emit_unit(unit)?;
        }
        if plan.mode() == EmitMode::Build {
            for product in plan.products() {
                emitter.emit_product(product)?;
            }
        }
        let graph = emitter.graph;
        graph.validate()?;
        debug!(
            nodes = graph.nodes().len(),
            commands = graph.commands().len(),
            "emitted build graph"
        );
        Ok(graph)
    }
}

struct Emitter<'a, C: ?Sized, F: ?Sized> {
    plan: &'a BuildPlan,
    command_line: &'a C,
    fs: &'a F,
    graph: BuildGraph,
}

impl<C, F> Emitter<'_, C, F>
where
    C: CommandLineBuilder + ?Sized,
    F: FileSystem + ?Sized,
{
    fn emit_unit(&mut self, description: &UnitDescription) -> Result<(), PlanError> {
        let environment = description.parameters().build_environment();
        let target = description.target_name();
        if self.plan.mode() == EmitMode::Prepare {
            let inputs = self.dependency_aggregates(description, &environment)?;
            let node = self.graph.add_phony(&target, inputs)?;
            self.graph.add_target(target, node);
            return Ok(());
        }

        let mut gathered = Vec::new();
        let mut aggregate = Vec::new();
        if let Some(bundle) = self.resource_bundle(description)? {
            gathered.push(bundle.clone());
            aggregate.push(bundle);
        }
        gathered.extend(self.dependency_modules(description, &environment)?);
        for (path, copy) in self.prebuilt_binaries(description)? {
            gathered.push(path);
            aggregate.push(copy);
        }
        let plugin_outputs = self.plugin_commands(description)?;
        gathered.extend(plugin_outputs.iter().cloned());
        let inputs: Vec<Node> = gathered.into_iter().unique().collect();

        let unit = description.unit();
        if unit.kind().is_compiled() {
            self.sources(description, &environment)?;
            let objects = self.compile(description, &inputs)?;
            aggregate.extend(objects.iter().cloned().map(Node::File));
            if unit.kind().exposes_module_interface() {
                aggregate.push(self.merge_module(description, objects)?);
            }
        } else {
            let module = Node::directory(description.module_path());
            self.graph.add_source(module.clone())?;
            aggregate.push(module);
        }
        aggregate.extend(plugin_outputs);

        let node = self.graph.add_phony(&target, aggregate)?;
        self.graph.add_target(target, node);
        debug!(unit = %unit.id(), "emitted unit");
        Ok(())
    }

    /// Aggregate nodes of the units `description` depends on.
    fn dependency_aggregates(
        &self,
        description: &UnitDescription,
        environment: &BuildEnvironment,
    ) -> Result<Vec<Node>, PlanError> {
        let mut nodes = Vec::new();
        for edge in description.unit().dependencies_satisfying(environment) {
            match edge {
                Dependency::Unit { id, .. } => {
                    nodes.push(Node::virtual_target(self.plan.description(id)?.target_name()));
                }
                Dependency::Product { id, .. } => {
                    let product = self.product(description, id)?;
                    if product.product().kind() == ProductKind::Test {
                        continue;
                    }
                    for member in product.product().units() {
                        let target = self.plan.description(member)?.target_name();
                        nodes.push(Node::virtual_target(target));
                    }
                }
            }
        }
        Ok(nodes.into_iter().unique().collect())
    }

    fn product(
        &self,
        dependent: &UnitDescription,
        id: &ProductId,
    ) -> Result<&ProductDescription, PlanError> {
        self.plan
            .product(id)
            .ok_or_else(|| PlanError::UnknownProduct {
                id: id.clone(),
                dependent: dependent.unit().id().clone(),
            })
    }

    /// Module interfaces and binaries a unit's compile commands read.
    ///
    /// Unit edges contribute the direct dependency's module only. Product
    /// edges are lowered by linkage: binaries for products linked
    /// dynamically, module interfaces of the whole member closure for
    /// products linked statically.
    fn dependency_modules(
        &self,
        description: &UnitDescription,
        environment: &BuildEnvironment,
    ) -> Result<Vec<Node>, PlanError> {
        let mut nodes = Vec::new();
        for edge in description.unit().dependencies_satisfying(environment) {
            match edge {
                Dependency::Unit { id, .. } => {
                    let dependency = self.plan.description(id)?;
                    if let Some(module) = module_node(dependency) {
                        nodes.push(module);
                    }
                }
                Dependency::Product { id, .. } => {
                    let product = self.product(description, id)?;
                    match product.product().kind() {
                        ProductKind::Executable
                        | ProductKind::Macro
                        | ProductKind::Library(LibraryKind::Dynamic) => {
                            nodes.extend(product.binary_path().map(Node::File));
                        }
                        ProductKind::Library(LibraryKind::Static | LibraryKind::Automatic)
                        | ProductKind::Plugin => {
                            nodes.extend(self.member_modules(product)?);
                        }
                        ProductKind::Test => {}
                    }
                }
            }
        }
        Ok(nodes)
    }

    fn member_modules(&self, product: &ProductDescription) -> Result<Vec<Node>, PlanError> {
        let mut nodes = Vec::new();
        for member in product.product().units() {
            let description = self.plan.description(member)?;
            let environment = description.parameters().build_environment();
            let closure = self
                .plan
                .graph()
                .recursive_dependencies_satisfying(description.unit(), &environment)?;
            for id in closure.iter().filter_map(Dependency::unit_id) {
                nodes.extend(module_node(self.plan.description(id)?));
            }
            nodes.extend(module_node(description));
        }
        Ok(nodes)
    }

    /// Copy commands for declared resources and the phony node grouping
    /// them.
    fn resource_bundle(&mut self, description: &UnitDescription) -> Result<Option<Node>, PlanError> {
        let unit = description.unit();
        if unit.resources().is_empty() || !self.plan.create_resource_bundles() {
            return Ok(None);
        }
        let bundle = description.resource_bundle_dir();
        let mut copies = Vec::new();
        for resource in unit.resources() {
            let source = Node::file(resource.clone());
            let destination = bundle.join(unit.sources().relative(resource));
            self.graph.add_source(source.clone())?;
            self.graph.add_command(
                Command::new(destination.to_string(), Tool::Copy)
                    .description(format!("Copying {}", unit.sources().relative(resource)))
                    .inputs(vec![source])
                    .outputs(vec![Node::file(destination.clone())])
                    .arguments(vec![
                        "cp".to_owned(),
                        resource.to_string(),
                        destination.to_string(),
                    ]),
            )?;
            copies.push(Node::File(destination));
        }
        let node = self
            .graph
            .add_phony(&format!("{}-resources", description.target_name()), copies)?;
        Ok(Some(node))
    }

    /// Prebuilt binaries as (declared path, copy in the build directory).
    fn prebuilt_binaries(
        &mut self,
        description: &UnitDescription,
    ) -> Result<Vec<(Node, Node)>, PlanError> {
        let mut nodes = Vec::new();
        for path in description.unit().prebuilt_binaries() {
            let destination = prebuilt_copy_path(description, path);
            let (source, copy, recursive) = if self.fs.is_directory(path) {
                (
                    Node::directory(path.clone()),
                    Node::directory(destination.clone()),
                    true,
                )
            } else {
                (Node::file(path.clone()), Node::file(destination.clone()), false)
            };
            self.graph.add_source(source.clone())?;
            let mut arguments = vec!["cp".to_owned()];
            if recursive {
                arguments.push("-R".to_owned());
            }
            arguments.extend([path.to_string(), destination.to_string()]);
            self.graph.add_command(
                Command::new(destination.to_string(), Tool::Copy)
                    .description(format!("Copying {path}"))
                    .inputs(vec![source.clone()])
                    .outputs(vec![copy.clone()])
                    .arguments(arguments),
            )?;
            nodes.push((source, copy));
        }
        Ok(nodes)
    }

    fn plugin_commands(&mut self, description: &UnitDescription) -> Result<Vec<Node>, PlanError> {
        let mut outputs = Vec::new();
        for plugin in description.unit().plugin_commands() {
            let executable = Node::file(plugin.executable.clone());
            self.graph.add_source(executable.clone())?;
            let mut inputs = vec![executable];
            for input in &plugin.inputs {
                let node = Node::file(input.clone());
                self.graph.add_source(node.clone())?;
                inputs.push(node);
            }
            let produced: Vec<Node> = plugin.outputs.iter().cloned().map(Node::File).collect();
            let mut arguments = vec![plugin.executable.to_string()];
            arguments.extend(plugin.arguments.iter().cloned());
            self.graph.add_command(
                Command::new(
                    format!("{} ({})", plugin.display_name, description.target_name()),
                    Tool::Plugin,
                )
                .description(plugin.display_name.clone())
                .inputs(inputs)
                .outputs(produced.clone())
                .arguments(arguments),
            )?;
            outputs.extend(produced);
        }
        Ok(outputs)
    }

    /// Register authored sources, or emit the command generating them.
    fn sources(
        &mut self,
        description: &UnitDescription,
        environment: &BuildEnvironment,
    ) -> Result<(), PlanError> {
        let unit = description.unit();
        let (tool, what) = match description.test_role() {
            Some(TestRole::Discovery) => (Tool::TestDiscovery, "test discovery"),
            Some(TestRole::EntryPoint { synthesized: true }) => {
                (Tool::TestEntryPoint, "test entry point")
            }
            Some(TestRole::EntryPoint { synthesized: false }) | None => {
                for source in &unit.sources().paths {
                    self.graph.add_source(Node::file(source.clone()))?;
                }
                return Ok(());
            }
        };
        let inputs = self.dependency_aggregates(description, environment)?;
        self.graph.add_command(
            Command::new(format!("{}-generate", description.target_name()), tool)
                .description(format!("Generating {what} for {}", unit.name()))
                .inputs(inputs)
                .outputs(unit.sources().paths.iter().cloned().map(Node::File).collect()),
        )?;
        Ok(())
    }

    fn compile(
        &mut self,
        description: &UnitDescription,
        inputs: &[Node],
    ) -> Result<Vec<Utf8PathBuf>, PlanError> {
        let unit = description.unit();
        let mut objects = Vec::new();
        for source in &unit.sources().paths {
            let object = description.object_path(source);
            let mut command_inputs = inputs.to_vec();
            command_inputs.push(Node::file(source.clone()));
            self.graph.add_command(
                Command::new(object.to_string(), Tool::Compile)
                    .description(format!(
                        "Compiling {} {}",
                        unit.name(),
                        unit.sources().relative(source)
                    ))
                    .inputs(command_inputs)
                    .outputs(vec![Node::file(object.clone())])
                    .arguments(
                        self.command_line
                            .compile_arguments(description, source, &object),
                    )
                    .dependency_file(description.dependency_file(source)),
            )?;
            objects.push(object);
        }
        Ok(objects)
    }

    fn merge_module(
        &mut self,
        description: &UnitDescription,
        objects: Vec<Utf8PathBuf>,
    ) -> Result<Node, PlanError> {
        let module = Node::file(description.module_path());
        let arguments = self
            .command_line
            .merge_module_arguments(description, &objects);
        self.graph.add_command(
            Command::new(module.to_string(), Tool::MergeModule)
                .description(format!("Emitting module {}", description.unit().name()))
                .inputs(objects.into_iter().map(Node::File).collect())
                .outputs(vec![module.clone()])
                .arguments(arguments),
        )?;
        Ok(module)
    }

    fn emit_product(&mut self, product: &ProductDescription) -> Result<(), PlanError> {
        let Some(binary) = product.binary_path() else {
            return Ok(());
        };
        let closure = self.link_closure(product)?;

        let mut paths = Vec::new();
        let mut inputs = Vec::new();
        for edge in &closure {
            match edge {
                Dependency::Unit { id, .. } => {
                    let unit = self.plan.description(id)?;
                    if unit.unit().kind().is_compiled() {
                        for source in &unit.unit().sources().paths {
                            let object = unit.object_path(source);
                            inputs.push(Node::file(object.clone()));
                            paths.push(object);
                        }
                    }
                    for prebuilt in unit.unit().prebuilt_binaries() {
                        let copy = prebuilt_copy_path(unit, prebuilt);
                        inputs.push(if self.fs.is_directory(prebuilt) {
                            Node::directory(copy.clone())
                        } else {
                            Node::file(copy.clone())
                        });
                        paths.push(copy);
                    }
                }
                Dependency::Product { id, .. } => {
                    let Some(linked) = self.plan.product(id) else {
                        continue;
                    };
                    if linked.product().kind() == ProductKind::Library(LibraryKind::Dynamic)
                        && let Some(library) = linked.binary_path()
                    {
                        inputs.push(Node::file(library.clone()));
                        paths.push(library);
                    }
                }
            }
        }

        let name = product.product().name();
        let command = match product.product().kind() {
            ProductKind::Library(LibraryKind::Static) => {
                Command::new(binary.to_string(), Tool::Archive)
                    .description(format!("Archiving {name}"))
                    .arguments(self.command_line.archive_arguments(product, &binary, &paths))
            }
            ProductKind::Executable
            | ProductKind::Macro
            | ProductKind::Test
            | ProductKind::Library(LibraryKind::Dynamic) => {
                Command::new(binary.to_string(), Tool::Link)
                    .description(format!("Linking {name}"))
                    .arguments(self.command_line.link_arguments(product, &binary, &paths))
            }
            ProductKind::Library(LibraryKind::Automatic) | ProductKind::Plugin => return Ok(()),
        };
        let output = Node::file(binary);
        self.graph.add_command(
            command
                .inputs(inputs.into_iter().unique().collect())
                .outputs(vec![output.clone()]),
        )?;

        let target = product.target_name();
        let node = self.graph.add_phony(&target, vec![output.clone()])?;
        self.graph.add_target(target, node);
        let group = match product.product().kind() {
            ProductKind::Test => "test",
            ProductKind::Executable
            | ProductKind::Macro
            | ProductKind::Plugin
            | ProductKind::Library(_) => "main",
        };
        self.graph.add_target(group, output);
        debug!(product = %product.product().id(), "emitted product");
        Ok(())
    }

    /// Edges whose objects are linked into `product`.
    ///
    /// Unit edges and statically linked products are followed; any other
    /// product ends the walk and is linked by binary, if it has one.
    fn link_closure(&self, product: &ProductDescription) -> Result<Vec<Dependency>, PlanError> {
        let graph = self.plan.graph();
        let roots: Vec<Dependency> = product.link_units().cloned().map(Dependency::unit).collect();
        let closure = topological_sort(roots, Dependency::id, |edge| match edge {
            Dependency::Unit { id, .. } => {
                let unit = graph.expect_unit(id)?;
                let environment = self.plan.parameters(unit.build_triple()).build_environment();
                Ok(unit.dependencies_satisfying(&environment).cloned().collect())
            }
            Dependency::Product { id, .. } => {
                let linked = graph.expect_product(id)?;
                Ok(match linked.kind() {
                    ProductKind::Library(LibraryKind::Static | LibraryKind::Automatic) => {
                        linked.units().iter().cloned().map(Dependency::unit).collect()
                    }
                    ProductKind::Library(LibraryKind::Dynamic)
                    | ProductKind::Executable
                    | ProductKind::Macro
                    | ProductKind::Plugin
                    | ProductKind::Test => Vec::new(),
                })
            }
        })?;
        Ok(closure)
    }
}

/// Module interface node of a unit that exposes one.
fn module_node(description: &UnitDescription) -> Option<Node> {
    match description.unit().kind() {
        UnitKind::ProvidedPrebuilt => Some(Node::directory(description.module_path())),
        UnitKind::Library | UnitKind::SynthesizedDiscovery => {
            Some(Node::file(description.module_path()))
        }
        UnitKind::Executable | UnitKind::Test | UnitKind::SynthesizedEntryPoint => None,
    }
}

/// Copy of a prebuilt binary inside the declaring unit's build directory.
fn prebuilt_copy_path(description: &UnitDescription, path: &Utf8Path) -> Utf8PathBuf {
    description
        .build_dir()
        .join(path.file_name().unwrap_or(path.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlanConfig;
    use crate::diagnostics::DiagnosticLog;
    use crate::fs::MemoryFileSystem;
    use crate::graph::{GraphBuilder, ResolvedGraph};
    use crate::model::{
        BuildTriple, Package, PackageIdentity, PluginCommand, Product, ProductId, Sources, Unit,
        UnitId,
    };
    use crate::plan::DefaultCommandLine;
    use rstest::{fixture, rstest};

    const BUILD: &str = ".build/x86_64-unknown-linux-gnu/debug";

    fn uid(name: &str) -> UnitId {
        UnitId::new(name, PackageIdentity::new("app"), BuildTriple::Destination)
    }

    fn pid(name: &str) -> ProductId {
        ProductId::new(name, PackageIdentity::new("app"), BuildTriple::Destination)
    }

    fn library(name: &str) -> crate::model::UnitBuilder {
        Unit::builder(name, "app", UnitKind::Library).sources(Sources::new(
            format!("/src/app/Sources/{name}").into(),
            vec![format!("/src/app/Sources/{name}/{name}.src").into()],
        ))
    }

    /// `App -> Core -> Base`, `App -> Dyn` (dynamic product over `Plugin`),
    /// test product over `AppTests -> Core`.
    #[fixture]
    fn graph() -> ResolvedGraph {
        let mut builder = GraphBuilder::new();
        builder
            .add_package(Package::new("app", "App", "/src/app"))
            .expect("package");
        let units = [
            library("Base").build(),
            library("Core")
                .dependency(Dependency::unit(uid("Base")))
                .build(),
            library("Plugin").build(),
            Unit::builder("App", "app", UnitKind::Executable)
                .sources(Sources::new(
                    "/src/app/Sources/App".into(),
                    vec!["/src/app/Sources/App/main.src".into()],
                ))
                .dependency(Dependency::unit(uid("Core")))
                .dependency(Dependency::product(pid("Dyn")))
                .build(),
            Unit::builder("AppTests", "app", UnitKind::Test)
                .sources(Sources::new(
                    "/src/app/Tests/AppTests".into(),
                    vec!["/src/app/Tests/AppTests/CoreTests.src".into()],
                ))
                .dependency(Dependency::unit(uid("Core")))
                .build(),
        ];
        for unit in units {
            builder.add_unit(unit).expect("unit");
        }
        builder
            .add_product(Product::new(
                "Dyn",
                "app",
                ProductKind::Library(LibraryKind::Dynamic),
                vec![uid("Plugin")],
            ))
            .expect("dyn")
            .add_product(Product::new(
                "App",
                "app",
                ProductKind::Executable,
                vec![uid("App")],
            ))
            .expect("app")
            .add_product(Product::new(
                "AppPackageTests",
                "app",
                ProductKind::Test,
                vec![uid("AppTests")],
            ))
            .expect("tests");
        builder.build().expect("graph")
    }

    fn emit(graph: &ResolvedGraph, config: &PlanConfig, fs: &MemoryFileSystem) -> BuildGraph {
        let mut log = DiagnosticLog::default();
        let plan = BuildPlan::new(graph, config, fs, &mut log).expect("plan");
        BuildGraph::from_plan(&plan, &DefaultCommandLine, fs).expect("emit")
    }

    fn input_names(graph: &BuildGraph, command: &str) -> Vec<String> {
        graph
            .command(command)
            .expect(command)
            .inputs
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[rstest]
    fn compile_inputs_follow_linkage(graph: ResolvedGraph) {
        let ir = emit(&graph, &PlanConfig::default(), &MemoryFileSystem::new());
        let inputs = input_names(&ir, &format!("{BUILD}/app/App.build/main.src.o"));
        assert_eq!(
            inputs,
            vec![
                format!("{BUILD}/Modules/app/Core.module"),
                format!("{BUILD}/libDyn.so"),
                "/src/app/Sources/App/main.src".to_owned(),
            ]
        );
    }

    #[rstest]
    fn emission_is_idempotent(graph: ResolvedGraph) {
        let config = PlanConfig::default();
        let fs = MemoryFileSystem::new();
        let first = emit(&graph, &config, &fs);
        let second = emit(&graph, &config, &fs);
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(
            first.nodes().keys().collect::<Vec<_>>(),
            second.nodes().keys().collect::<Vec<_>>()
        );
    }

    #[rstest]
    fn executable_links_static_closure_and_dynamic_binary(graph: ResolvedGraph) {
        let ir = emit(&graph, &PlanConfig::default(), &MemoryFileSystem::new());
        let link = ir.command(&format!("{BUILD}/App")).expect("link");
        assert_eq!(link.tool, Tool::Link);
        let inputs: Vec<String> = link.inputs.iter().map(ToString::to_string).collect();
        assert_eq!(
            inputs,
            vec![
                format!("{BUILD}/app/Base.build/Base.src.o"),
                format!("{BUILD}/app/Core.build/Core.src.o"),
                format!("{BUILD}/libDyn.so"),
                format!("{BUILD}/app/App.build/main.src.o"),
            ]
        );
        assert_eq!(
            ir.target("main").map(<[Node]>::len),
            Some(2),
            "executable and dynamic library"
        );
    }

    #[rstest]
    fn test_product_links_derived_units(graph: ResolvedGraph) {
        let ir = emit(&graph, &PlanConfig::default(), &MemoryFileSystem::new());
        let binary = Node::file(format!("{BUILD}/AppPackageTests.test"));
        assert_eq!(ir.target("test"), Some([binary.clone()].as_slice()));
        let link = ir.producer(&binary).expect("test link");
        let inputs: Vec<String> = link.inputs.iter().map(ToString::to_string).collect();
        assert!(inputs.contains(&format!(
            "{BUILD}/app/AppPackageTests.build/runner.src.o"
        )));
        assert!(inputs.contains(&format!(
            "{BUILD}/app/AppPackageDiscoveredTests.build/all-discovered-tests.src.o"
        )));
        let generated = Node::file(format!("{BUILD}/AppPackageTests.derived/runner.src"));
        assert_eq!(
            ir.producer(&generated).map(|c| c.tool),
            Some(Tool::TestEntryPoint)
        );
    }

    #[rstest]
    fn prepare_mode_emits_only_aggregates(graph: ResolvedGraph) {
        let config = PlanConfig {
            mode: EmitMode::Prepare,
            ..PlanConfig::default()
        };
        let ir = emit(&graph, &config, &MemoryFileSystem::new());
        assert!(ir.commands().values().all(|c| c.tool == Tool::Phony));
        assert_eq!(
            input_names(&ir, "<app.App-debug.module>"),
            vec!["<app.Core-debug.module>", "<app.Plugin-debug.module>"]
        );
    }

    #[rstest]
    #[case(true, 2)]
    #[case(false, 0)]
    fn resources_are_bundled_on_request(#[case] bundles: bool, #[case] copies: usize) {
        let mut builder = GraphBuilder::new();
        builder
            .add_package(Package::new("app", "App", "/src/app"))
            .expect("package");
        builder
            .add_unit(
                library("Assets")
                    .resources(vec![
                        "/src/app/Sources/Assets/icon.png".into(),
                        "/src/app/Sources/Assets/strings/en.json".into(),
                    ])
                    .build(),
            )
            .expect("unit");
        let config = PlanConfig {
            create_resource_bundles: bundles,
            ..PlanConfig::default()
        };
        let ir = emit(&builder.build().expect("graph"), &config, &MemoryFileSystem::new());
        let copied = ir
            .commands()
            .values()
            .filter(|c| c.tool == Tool::Copy)
            .count();
        assert_eq!(copied, copies);
        assert_eq!(
            ir.command("<app.Assets-debug.module-resources>").is_some(),
            bundles
        );
    }

    #[rstest]
    fn prebuilt_directories_become_directory_nodes() {
        let mut builder = GraphBuilder::new();
        builder
            .add_package(Package::new("app", "App", "/src/app"))
            .expect("package");
        builder
            .add_unit(
                library("Tool")
                    .prebuilt_binaries(vec![
                        "/vendor/Runtime.framework".into(),
                        "/vendor/libz.a".into(),
                    ])
                    .build(),
            )
            .expect("unit");
        let fs = MemoryFileSystem::new()
            .with_directory("/vendor/Runtime.framework")
            .with_file("/vendor/libz.a");
        let ir = emit(&builder.build().expect("graph"), &PlanConfig::default(), &fs);
        let compile = ir
            .command(&format!("{BUILD}/app/Tool.build/Tool.src.o"))
            .expect("compile");
        assert!(compile.inputs.contains(&Node::directory("/vendor/Runtime.framework")));
        assert!(compile.inputs.contains(&Node::file("/vendor/libz.a")));
        assert!(ir.sources().contains(&Node::directory("/vendor/Runtime.framework")));
    }

    #[rstest]
    fn same_named_prebuilt_binaries_stay_per_unit() {
        let mut builder = GraphBuilder::new();
        for package in ["a", "b"] {
            builder
                .add_package(Package::new(package, package, format!("/{package}")))
                .expect("package");
            builder
                .add_unit(
                    Unit::builder("Utils", package, UnitKind::Library)
                        .sources(Sources::new(
                            format!("/{package}/Sources/Utils").into(),
                            vec![format!("/{package}/Sources/Utils/Utils.src").into()],
                        ))
                        .prebuilt_binaries(vec![format!("/{package}/vendor/libz.a").into()])
                        .build(),
                )
                .expect("unit");
        }
        let fs = MemoryFileSystem::new()
            .with_file("/a/vendor/libz.a")
            .with_file("/b/vendor/libz.a");
        let ir = emit(&builder.build().expect("graph"), &PlanConfig::default(), &fs);
        for package in ["a", "b"] {
            let copy = ir
                .command(&format!("{BUILD}/{package}/Utils.build/libz.a"))
                .expect("per-unit copy");
            assert_eq!(copy.tool, Tool::Copy);
            assert_eq!(copy.inputs, vec![Node::file(format!("/{package}/vendor/libz.a"))]);
        }
    }

    #[rstest]
    fn plugin_outputs_feed_compile_and_aggregate() {
        let mut builder = GraphBuilder::new();
        builder
            .add_package(Package::new("app", "App", "/src/app"))
            .expect("package");
        builder
            .add_unit(
                library("Gen")
                    .plugin_commands(vec![PluginCommand {
                        display_name: "Generating tables".to_owned(),
                        executable: "/tools/gen".into(),
                        arguments: vec!["--out".to_owned(), "/o/gen.src".to_owned()],
                        inputs: vec!["/src/app/tables.def".into()],
                        outputs: vec!["/o/gen.src".into()],
                    }])
                    .build(),
            )
            .expect("unit");
        let ir = emit(
            &builder.build().expect("graph"),
            &PlanConfig::default(),
            &MemoryFileSystem::new(),
        );
        let generated = Node::file("/o/gen.src");
        let plugin = ir.producer(&generated).expect("plugin command");
        assert_eq!(plugin.tool, Tool::Plugin);
        assert_eq!(
            plugin.inputs,
            vec![Node::file("/tools/gen"), Node::file("/src/app/tables.def")]
        );
        let compile = ir
            .command(&format!("{BUILD}/app/Gen.build/Gen.src.o"))
            .expect("compile");
        assert!(compile.inputs.contains(&generated));
        let aggregate = ir.command("<app.Gen-debug.module>").expect("aggregate");
        assert!(aggregate.inputs.contains(&generated));
    }

    #[rstest]
    fn macro_product_binary_is_a_compile_input() {
        let mut builder = GraphBuilder::new();
        builder
            .add_package(Package::new("app", "App", "/src/app"))
            .expect("package");
        builder
            .add_unit(
                Unit::builder("DeriveImpl", "app", UnitKind::Executable)
                    .sources(Sources::new(
                        "/src/app/Sources/DeriveImpl".into(),
                        vec!["/src/app/Sources/DeriveImpl/lib.src".into()],
                    ))
                    .build(),
            )
            .expect("macro unit")
            .add_unit(
                library("Model")
                    .dependency(Dependency::product(pid("Derive")))
                    .build(),
            )
            .expect("dependent");
        builder
            .add_product(Product::new(
                "Derive",
                "app",
                ProductKind::Macro,
                vec![uid("DeriveImpl")],
            ))
            .expect("macro");
        let ir = emit(
            &builder.build().expect("graph"),
            &PlanConfig::default(),
            &MemoryFileSystem::new(),
        );
        let binary = Node::file(format!("{BUILD}/Derive"));
        let compile = ir
            .command(&format!("{BUILD}/app/Model.build/Model.src.o"))
            .expect("compile");
        assert!(compile.inputs.contains(&binary), "{:?}", compile.inputs);
        assert_eq!(ir.producer(&binary).map(|c| c.tool), Some(Tool::Link));
    }
}
