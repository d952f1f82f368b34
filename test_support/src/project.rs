//! Scratch projects for end-to-end tests.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Default configuration location inside a project.
pub const CONFIG_FILE: &str = ".vscode/crossbuild.json";

/// A temporary project directory plus a private temp directory used as
/// `TMPDIR` so generated graphs never collide between tests.
#[derive(Debug)]
pub struct Project {
    root: TempDir,
    tmp: TempDir,
}

impl Project {
    /// Create an empty project.
    ///
    /// # Errors
    ///
    /// Returns an error if a temp directory cannot be created.
    pub fn new() -> Result<Self> {
        Ok(Self {
            root: TempDir::new().context("create project dir")?,
            tmp: TempDir::new().context("create project temp dir")?,
        })
    }

    /// Create a project whose configuration file holds `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn with_config(config: &Value) -> Result<Self> {
        let project = Self::new()?;
        let text = serde_json::to_string_pretty(config).context("serialise config")?;
        project.write(CONFIG_FILE, &text)?;
        Ok(project)
    }

    /// Project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Directory to export as `TMPDIR`.
    #[must_use]
    pub fn tmp(&self) -> &Path {
        self.tmp.path()
    }

    /// Absolute path of `relative` inside the project.
    #[must_use]
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    /// Write `contents` to `relative`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Files in the temp directory whose names end with `suffix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp directory cannot be listed.
    pub fn tmp_files(&self, suffix: &str) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(self.tmp()).context("list temp dir")? {
            let path = entry?.path();
            if path.to_string_lossy().ends_with(suffix) {
                found.push(path);
            }
        }
        Ok(found)
    }
}
