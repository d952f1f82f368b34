//! Error types for the runner module.
//!
//! This submodule isolates derive-macro-affected code to scope lint suppressions
//! narrowly. The `unused_assignments` lint fires in some Rust versions due to
//! thiserror/miette derive macro expansion.

// FIXME(rust-lang/rust#130021): remove once upstream is fixed.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while resolving and executing a build.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// The configuration file does not exist.
    #[error("configuration file \"{path}\" not found")]
    #[diagnostic(
        code(crossbuild::runner::config_not_found),
        help("create the file or pass its location with --file")
    )]
    ConfigNotFound {
        /// Path that was checked.
        path: Utf8PathBuf,
    },

    /// Neither flags nor a hand-off file named a target and configuration.
    #[error("no target and configuration selected")]
    #[diagnostic(
        code(crossbuild::runner::no_selection),
        help("pass --target and --config, or --tcfpath with a selection file")
    )]
    NoSelection,

    /// The requested target is not declared.
    #[error("target \"{name}\" not found")]
    #[diagnostic(code(crossbuild::runner::unknown_target))]
    UnknownTarget {
        /// Requested target.
        name: String,
    },

    /// The requested configuration is not declared for the target.
    #[error("configuration \"{name}\" for target \"{target}\" not found")]
    #[diagnostic(code(crossbuild::runner::unknown_configuration))]
    UnknownConfiguration {
        /// Target searched.
        target: String,
        /// Requested configuration.
        name: String,
    },

    /// The target references a toolchain that is not declared.
    #[error("toolchain \"{name}\" for target \"{target}\" not found")]
    #[diagnostic(code(crossbuild::runner::unknown_toolchain))]
    UnknownToolchain {
        /// Target referencing the toolchain.
        target: String,
        /// Toolchain name, empty when the target names none.
        name: String,
    },

    /// The toolchain declares no tools.
    #[error("toolchain configuration \"{name}\" is missing the tools definition")]
    #[diagnostic(code(crossbuild::runner::toolchain_incomplete))]
    ToolchainIncomplete {
        /// Toolchain name.
        name: String,
    },

    /// The configuration's inheritance chain could not be resolved.
    #[error("configuration \"{name}\" of target \"{target}\" inherits unresolvable \"{parent}\"")]
    #[diagnostic(
        code(crossbuild::runner::unresolved_inheritance),
        help("check that the parent exists and that the inherit chain has no cycle")
    )]
    UnresolvedInheritance {
        /// Target owning the configuration.
        target: String,
        /// Configuration name.
        name: String,
        /// Parent named by `inherit`.
        parent: String,
    },

    /// The build executor exited unsuccessfully.
    #[error("build failed: {program} exited with {status}")]
    #[diagnostic(code(crossbuild::runner::build_failed))]
    BuildFailed {
        /// Executor program.
        program: String,
        /// Rendered exit status.
        status: String,
        /// Exit code, absent when terminated by a signal.
        code: Option<i32>,
    },

    /// A post-build task exited unsuccessfully; later tasks were skipped.
    #[error("post-build task {index} ({program}) exited with {status}")]
    #[diagnostic(code(crossbuild::runner::task_failed))]
    TaskFailed {
        /// Zero-based task position.
        index: usize,
        /// Program run.
        program: String,
        /// Rendered exit status.
        status: String,
        /// Exit code, absent when terminated by a signal.
        code: Option<i32>,
    },

    /// A post-build task names neither a command nor a known tool.
    #[error("post-build task {index} has no command and no declared tool")]
    #[diagnostic(
        code(crossbuild::runner::task_without_command),
        help("set \"command\", or a \"tool\" declared by the toolchain")
    )]
    TaskWithoutCommand {
        /// Zero-based task position.
        index: usize,
    },
}

impl RunnerError {
    /// Process exit code this error should produce.
    ///
    /// A failed build reports the executor's own exit code; everything else
    /// maps to 1.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::BuildFailed { code: Some(code), .. } => u8::try_from(*code)
                .ok()
                .filter(|code| *code != 0)
                .unwrap_or(1),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn build_failed(code: Option<i32>) -> RunnerError {
        RunnerError::BuildFailed {
            program: "ninja".into(),
            status: "exit status: 1".into(),
            code,
        }
    }

    #[rstest]
    #[case(build_failed(Some(3)), 3)]
    #[case(build_failed(Some(300)), 1)]
    #[case(build_failed(None), 1)]
    #[case(RunnerError::NoSelection, 1)]
    fn exit_codes(#[case] err: RunnerError, #[case] expected: u8) {
        assert_eq!(err.exit_code(), expected);
    }

    #[rstest]
    fn messages_name_the_missing_reference() {
        let err = RunnerError::UnknownConfiguration {
            target: "app".into(),
            name: "release".into(),
        };
        assert_eq!(
            err.to_string(),
            "configuration \"release\" for target \"app\" not found"
        );
    }
}
