//! Build orchestration.
//!
//! This module keeps `main` minimal by providing a single entry point that
//! runs the pipeline: resolve the requested target, then either clean its
//! outputs or generate the Ninja graph, run Ninja and run the configured
//! post-build tasks in order.

mod error;

pub use error::RunnerError;

use crate::cli::Cli;
use crate::config::{
    BuildConfig, ConfigResolver, Configuration, Selection, Target, Toolchain, handoff,
};
use crate::graph::{BuildGraph, Product};
use crate::hasher::WorkspaceHasher;
use crate::status::{PipelineStage, StatusReporter};
use crate::{ninja_gen, sources};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

/// Default Ninja executable to invoke.
pub const NINJA_PROGRAM: &str = "ninja";
/// Environment variable override for the Ninja executable.
pub use ninja_env::NINJA_ENV;

mod path_helpers;
mod process;
pub use path_helpers::temp_dir;
pub use process::{
    remove_ninja_state, remove_path, resolve_ninja_program, run_ninja, run_task, write_graph_file,
};

use path_helpers::{relative_product_dir, resolve_input_path, resolve_working_dir};

/// The target, configuration and toolchain a build operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBuild {
    /// Selected names.
    pub selection: Selection,
    /// Target definition.
    pub target: Target,
    /// Configuration after inheritance.
    pub configuration: Configuration,
    /// Toolchain with at least one tool.
    pub toolchain: Toolchain,
}

impl ResolvedBuild {
    /// Look up `selection` in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] for unknown names, a toolchain without tools,
    /// or a configuration whose inheritance could not be resolved.
    pub fn resolve(config: &BuildConfig, selection: &Selection) -> Result<Self, RunnerError> {
        let target = config
            .target(&selection.target)
            .ok_or_else(|| RunnerError::UnknownTarget {
                name: selection.target.clone(),
            })?;
        let configuration = config
            .configuration(&selection.target, &selection.config)
            .ok_or_else(|| RunnerError::UnknownConfiguration {
                target: selection.target.clone(),
                name: selection.config.clone(),
            })?;
        if let Some(parent) = &configuration.inherit {
            return Err(RunnerError::UnresolvedInheritance {
                target: selection.target.clone(),
                name: selection.config.clone(),
                parent: parent.clone(),
            });
        }
        let toolchain_name = target.toolchain.clone().unwrap_or_default();
        let toolchain =
            config
                .toolchain(&toolchain_name)
                .ok_or_else(|| RunnerError::UnknownToolchain {
                    target: selection.target.clone(),
                    name: toolchain_name.clone(),
                })?;
        if toolchain.declared_tools().is_none() {
            return Err(RunnerError::ToolchainIncomplete {
                name: toolchain_name,
            });
        }
        Ok(Self {
            selection: selection.clone(),
            target: target.clone(),
            configuration: configuration.clone(),
            toolchain: toolchain.clone(),
        })
    }

    /// Product location with the directory relative to `working_dir`.
    #[must_use]
    pub fn product(&self, working_dir: &Utf8Path) -> Product {
        let dir = relative_product_dir(working_dir, self.configuration.product_dir());
        Product::new(&dir, self.target.product_name())
    }
}

/// Execute the build described by `cli`.
///
/// # Errors
///
/// Returns a [`RunnerError`] (possibly wrapped in context) for resolution,
/// executor and post-build failures, and I/O errors for everything else.
pub fn run(cli: &Cli, reporter: &dyn StatusReporter) -> Result<()> {
    reporter.report_stage(PipelineStage::Resolving);
    let working_dir = resolve_working_dir(cli)?;
    let config_path = resolve_input_path(&working_dir, &cli.file)?;
    if !config_path.is_file() {
        return Err(RunnerError::ConfigNotFound { path: config_path }.into());
    }
    let config = ConfigResolver::new(working_dir.clone(), &config_path).load();
    let selection = resolve_selection(cli, &working_dir)?;
    let build = ResolvedBuild::resolve(&config, &selection)?;
    let product = build.product(&working_dir);
    let graph_path = WorkspaceHasher::graph_file(&temp_dir()?, &working_dir);
    debug!(build_target = %selection.target, config = %selection.config, "resolved build");

    if cli.clean {
        return handle_clean(&working_dir, &product, &graph_path, reporter);
    }

    reporter.report_stage(PipelineStage::Generating);
    let ninja = generate_ninja(&build, &product, &working_dir)?;
    process::write_graph_file(&graph_path, &ninja)?;
    reporter.report_note(&format!("Working directory: {working_dir}"));
    reporter.report_note(&format!("Build file: {graph_path}"));

    reporter.report_stage(PipelineStage::Executing);
    let program = process::resolve_ninja_program(cli.ninja.as_deref());
    let status = process::run_ninja(&program, &working_dir, &graph_path)
        .with_context(|| format!("running {program} with build file {graph_path}"))?;
    if !status.success() {
        return Err(RunnerError::BuildFailed {
            program: program.into_string(),
            status: status.to_string(),
            code: status.code(),
        }
        .into());
    }
    reporter.report_complete("Build succeeded");

    reporter.report_stage(PipelineStage::PostBuild);
    run_post_build(&build, &working_dir)
}

/// Pick the target and configuration from the hand-off file when given,
/// falling back to the command line flags.
fn resolve_selection(cli: &Cli, working_dir: &Utf8Path) -> Result<Selection> {
    let mut target = cli.target.clone();
    let mut config = cli.config.clone();
    if let Some(path) = &cli.tcfpath {
        let path = resolve_input_path(working_dir, path)?;
        match handoff::read(&path) {
            Ok(selection) => {
                target = Some(selection.target);
                config = Some(selection.config);
            }
            Err(err) => warn!(error = %err, "ignoring unreadable hand-off file"),
        }
    }
    match (target, config) {
        (Some(target), Some(config)) if !target.is_empty() && !config.is_empty() => {
            Ok(Selection::new(target, config))
        }
        _ => Err(RunnerError::NoSelection.into()),
    }
}

/// Remove the product directory, Ninja state files and the generated graph.
fn handle_clean(
    working_dir: &Utf8Path,
    product: &Product,
    graph_path: &Utf8Path,
    reporter: &dyn StatusReporter,
) -> Result<()> {
    reporter.report_stage(PipelineStage::Cleaning);
    if product.dir.as_str().is_empty() {
        warn!("product directory is the working directory; not removing it");
    } else {
        reporter.report_note(&format!("Cleaning {}...", product.dir));
        process::remove_path(working_dir, &product.dir)?;
    }
    process::remove_ninja_state(working_dir)?;
    process::remove_path(working_dir, graph_path)?;
    reporter.report_complete("Clean succeeded");
    Ok(())
}

/// Discover sources and render the Ninja graph for `build`.
///
/// # Errors
///
/// Returns an error if discovery fails or the toolchain lacks a needed tool.
pub fn generate_ninja(build: &ResolvedBuild, product: &Product, working_dir: &Utf8Path) -> Result<String> {
    let source_root = Utf8PathBuf::from(build.target.source_root());
    let found = sources::discover(
        &source_root,
        &build.configuration.ignore_sources,
        working_dir,
    )
    .context("discovering sources")?;
    info!(count = found.len(), "found compilation units");
    let graph = BuildGraph::new(&build.toolchain, &build.configuration, product, &found)
        .context("building the build graph")?;
    Ok(ninja_gen::generate(&graph))
}

/// Run every post-build task in order, stopping at the first failure.
fn run_post_build(build: &ResolvedBuild, working_dir: &Utf8Path) -> Result<()> {
    for (index, task) in build.configuration.post_build_tasks.iter().enumerate() {
        let program = match (task.command.as_deref(), task.tool.as_deref()) {
            (Some(command), _) if !command.is_empty() => command.to_owned(),
            (_, Some(tool)) => build
                .toolchain
                .tool_path(tool)
                .map(Utf8PathBuf::into_string)
                .ok_or(RunnerError::TaskWithoutCommand { index })?,
            _ => return Err(RunnerError::TaskWithoutCommand { index }.into()),
        };
        let out_file = task.out_file.as_deref().map(Utf8Path::new);
        let status = process::run_task(&program, &task.args, out_file, working_dir)
            .with_context(|| format!("running post-build task {index} ({program})"))?;
        if !status.success() {
            return Err(RunnerError::TaskFailed {
                index,
                program,
                status: status.to_string(),
                code: status.code(),
            }
            .into());
        }
    }
    Ok(())
}
