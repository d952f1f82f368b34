//! Fake Ninja executables.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ARGS_FILE: &str = "args.txt";
const GRAPH_COPY: &str = "graph.ninja";
const CWD_FILE: &str = "cwd.txt";

/// A shell script standing in for Ninja.
///
/// Each run records its arguments one per line, its working directory, and
/// a copy of the build file passed with `-f`, then exits with the chosen
/// status.
#[derive(Debug)]
pub struct FakeNinja {
    dir: TempDir,
    path: PathBuf,
}

impl FakeNinja {
    /// Create a fake Ninja that exits with `exit_code`.
    ///
    /// # Errors
    ///
    /// Returns an error if the script cannot be written.
    pub fn new(exit_code: i32) -> Result<Self> {
        let dir = TempDir::new().context("fake ninja: create temp dir")?;
        let path = dir.path().join("ninja");
        let record = dir.path();
        let script = format!(
            concat!(
                "#!/bin/sh\n",
                "printf '%s\\n' \"$@\" > '{args}'\n",
                "pwd > '{cwd}'\n",
                "if [ \"$1\" = \"-f\" ] && [ -f \"$2\" ]; then\n",
                "  cp \"$2\" '{graph}'\n",
                "fi\n",
                "exit {exit_code}\n",
            ),
            args = record.join(ARGS_FILE).display(),
            cwd = record.join(CWD_FILE).display(),
            graph = record.join(GRAPH_COPY).display(),
            exit_code = exit_code,
        );
        fs::write(&path, script)
            .with_context(|| format!("fake ninja: write script {}", path.display()))?;
        super::make_script_executable(&path)?;
        Ok(Self { dir, path })
    }

    /// Path of the executable.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the script has run.
    #[must_use]
    pub fn was_invoked(&self) -> bool {
        self.dir.path().join(ARGS_FILE).exists()
    }

    /// Arguments of the last run.
    ///
    /// # Errors
    ///
    /// Returns an error if the script never ran.
    pub fn args(&self) -> Result<Vec<String>> {
        let text = fs::read_to_string(self.dir.path().join(ARGS_FILE))
            .context("fake ninja was not invoked")?;
        Ok(text.lines().map(str::to_owned).collect())
    }

    /// Working directory of the last run.
    ///
    /// # Errors
    ///
    /// Returns an error if the script never ran.
    pub fn working_dir(&self) -> Result<PathBuf> {
        let text = fs::read_to_string(self.dir.path().join(CWD_FILE))
            .context("fake ninja was not invoked")?;
        Ok(PathBuf::from(text.trim_end()))
    }

    /// Build file contents seen by the last run.
    ///
    /// # Errors
    ///
    /// Returns an error if no build file was passed.
    pub fn graph(&self) -> Result<String> {
        fs::read_to_string(self.dir.path().join(GRAPH_COPY)).context("no build file was captured")
    }
}
