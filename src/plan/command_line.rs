//! Argument vectors for emitted commands.
//!
//! Toolchain syntax is owned by the caller; the emitter asks a
//! [`CommandLineBuilder`] for each argument vector. [`DefaultCommandLine`]
//! produces a conventional compiler-driver style.

use camino::{Utf8Path, Utf8PathBuf};

use super::{ProductDescription, UnitDescription};
use crate::model::{BuildConfiguration, LibraryKind, ProductKind};

/// Builds argument vectors for commands, executable first.
pub trait CommandLineBuilder {
    /// Arguments compiling `source` of `unit` into `object`.
    fn compile_arguments(
        &self,
        unit: &UnitDescription,
        source: &Utf8Path,
        object: &Utf8Path,
    ) -> Vec<String>;

    /// Arguments merging `objects` into `unit`'s module interface.
    fn merge_module_arguments(&self, unit: &UnitDescription, objects: &[Utf8PathBuf])
    -> Vec<String>;

    /// Arguments archiving `objects` into `product`'s static library.
    fn archive_arguments(
        &self,
        product: &ProductDescription,
        archive: &Utf8Path,
        objects: &[Utf8PathBuf],
    ) -> Vec<String>;

    /// Arguments linking `inputs` into `product`'s binary.
    fn link_arguments(
        &self,
        product: &ProductDescription,
        binary: &Utf8Path,
        inputs: &[Utf8PathBuf],
    ) -> Vec<String>;
}

/// Compiler-driver style command lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCommandLine;

impl DefaultCommandLine {
    const fn configuration_flags(configuration: BuildConfiguration) -> [&'static str; 2] {
        match configuration {
            BuildConfiguration::Debug => ["-Onone", "-DDEBUG"],
            BuildConfiguration::Release => ["-O", "-DNDEBUG"],
        }
    }
}

impl CommandLineBuilder for DefaultCommandLine {
    fn compile_arguments(
        &self,
        unit: &UnitDescription,
        source: &Utf8Path,
        object: &Utf8Path,
    ) -> Vec<String> {
        let parameters = unit.parameters();
        let deployment = unit
            .unit()
            .supported_platform(&parameters.platform, unit.uses_test_runtime());
        let mut args = vec![
            parameters.toolchain.compiler.to_string(),
            "-c".to_owned(),
            source.to_string(),
            "-o".to_owned(),
            object.to_string(),
            "-target".to_owned(),
            parameters.target_triple.clone(),
            format!("-deployment-target={}{}", deployment.platform, deployment.version),
            "-module-name".to_owned(),
            unit.unit().name().to_owned(),
            "-I".to_owned(),
            unit.modules_dir().to_string(),
            "-MD".to_owned(),
            "-MF".to_owned(),
            unit.dependency_file(source).to_string(),
        ];
        args.extend(deployment.options);
        args.extend(
            Self::configuration_flags(parameters.configuration)
                .iter()
                .map(|flag| (*flag).to_owned()),
        );
        if unit.unit().package_access() {
            args.push(format!("-package-name={}", unit.unit().package()));
        }
        if unit.uses_test_runtime() {
            args.push("-enable-testing".to_owned());
        }
        if let Some(localization) = unit.unit().default_localization() {
            args.push(format!("-default-localization={localization}"));
        }
        args.extend(parameters.flags.iter().cloned());
        args
    }

    fn merge_module_arguments(
        &self,
        unit: &UnitDescription,
        objects: &[Utf8PathBuf],
    ) -> Vec<String> {
        let mut args = vec![
            unit.parameters().toolchain.compiler.to_string(),
            "-merge-modules".to_owned(),
            "-emit-module".to_owned(),
            "-o".to_owned(),
            unit.module_path().to_string(),
        ];
        args.extend(objects.iter().map(ToString::to_string));
        args
    }

    fn archive_arguments(
        &self,
        product: &ProductDescription,
        archive: &Utf8Path,
        objects: &[Utf8PathBuf],
    ) -> Vec<String> {
        let mut args = vec![
            product.parameters().toolchain.archiver.to_string(),
            "crs".to_owned(),
            archive.to_string(),
        ];
        args.extend(objects.iter().map(ToString::to_string));
        args
    }

    fn link_arguments(
        &self,
        product: &ProductDescription,
        binary: &Utf8Path,
        inputs: &[Utf8PathBuf],
    ) -> Vec<String> {
        let parameters = product.parameters();
        let mut args = vec![
            parameters.toolchain.compiler.to_string(),
            "-target".to_owned(),
            parameters.target_triple.clone(),
            "-o".to_owned(),
            binary.to_string(),
        ];
        if matches!(
            product.product().kind(),
            ProductKind::Library(LibraryKind::Dynamic)
        ) {
            args.push("-shared".to_owned());
        }
        args.extend(inputs.iter().map(ToString::to_string));
        args
    }
}
