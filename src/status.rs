//! Pipeline status reporting.
//!
//! This module provides a [`StatusReporter`] trait plus two reporters: one
//! that writes labelled stage lines to stderr and one that stays silent.
//! Standard output is left to the build executor and post-build tasks.

use std::fmt;
use std::io::{self, Write};

/// Stages of a build invocation, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Loading the configuration and resolving the target triple.
    Resolving,
    /// Removing build outputs instead of building.
    Cleaning,
    /// Discovering sources and writing the build graph.
    Generating,
    /// Running the build executor.
    Executing,
    /// Running post-build tasks.
    PostBuild,
}

/// Number of stages a build passes through. Cleaning replaces the last three.
pub const PIPELINE_STAGE_COUNT: u32 = 4;

impl PipelineStage {
    /// One-based position of the stage within its pipeline.
    #[must_use]
    pub const fn index(self) -> u32 {
        match self {
            Self::Resolving => 1,
            Self::Cleaning | Self::Generating => 2,
            Self::Executing => 3,
            Self::PostBuild => 4,
        }
    }

    /// Total number of stages in the pipeline this stage belongs to.
    #[must_use]
    pub const fn total(self) -> u32 {
        match self {
            Self::Cleaning => 2,
            _ => PIPELINE_STAGE_COUNT,
        }
    }

    /// Human readable description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Resolving => "Resolving configuration",
            Self::Cleaning => "Cleaning build outputs",
            Self::Generating => "Generating build graph",
            Self::Executing => "Running build",
            Self::PostBuild => "Running post-build tasks",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stage {}/{}: {}",
            self.index(),
            self.total(),
            self.description()
        )
    }
}

/// Report pipeline progress to the user.
pub trait StatusReporter {
    /// Emit a status update when `stage` begins.
    fn report_stage(&self, stage: PipelineStage);

    /// Emit a free-form note, such as the generated graph path.
    fn report_note(&self, message: &str);

    /// Emit a completion message after a successful pipeline run.
    fn report_complete(&self, message: &str);
}

/// Reporter writing static, labelled lines to stderr.
pub struct AccessibleReporter;

impl StatusReporter for AccessibleReporter {
    fn report_stage(&self, stage: PipelineStage) {
        tracing::info!(stage = stage.description(), "pipeline stage");
        // Status output failures must not abort the pipeline.
        drop(writeln!(io::stderr(), "{stage}"));
    }

    fn report_note(&self, message: &str) {
        drop(writeln!(io::stderr(), "{message}"));
    }

    fn report_complete(&self, message: &str) {
        drop(writeln!(io::stderr(), "*** {message} ***"));
    }
}

/// Silent reporter: emits nothing.
pub struct SilentReporter;

impl StatusReporter for SilentReporter {
    fn report_stage(&self, stage: PipelineStage) {
        tracing::info!(stage = stage.description(), "pipeline stage");
    }
    fn report_note(&self, _message: &str) {}
    fn report_complete(&self, _message: &str) {}
}
