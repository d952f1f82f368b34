//! Hand-off file carrying the last selected target and configuration.
//!
//! The interactive host writes `{"target": "...", "config": "..."}` whenever
//! the user picks a pair; the command line entry point reads it back when
//! invoked with `--tcfpath`.

use camino::Utf8Path;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use thiserror::Error;

/// A target/configuration pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Target name.
    #[serde(default)]
    pub target: String,
    /// Configuration name.
    #[serde(default)]
    pub config: String,
}

impl Selection {
    /// Pair `target` with `config`.
    #[must_use]
    pub fn new(target: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            config: config.into(),
        }
    }
}

/// Errors raised while reading or writing a hand-off file.
#[derive(Debug, Error, Diagnostic)]
pub enum HandoffError {
    /// The file could not be read or written.
    #[error("failed to access hand-off file {path}: {source}")]
    #[diagnostic(code(crossbuild::config::handoff_io))]
    Io {
        /// File involved.
        path: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The file does not contain a selection object.
    #[error("hand-off file {path} is not a selection object: {source}")]
    #[diagnostic(
        code(crossbuild::config::handoff_parse),
        help("expected an object with string fields `target` and `config`")
    )]
    Parse {
        /// File involved.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Read the selection stored at `path`.
///
/// # Errors
///
/// Returns [`HandoffError`] if the file cannot be read or parsed.
pub fn read(path: &Utf8Path) -> Result<Selection, HandoffError> {
    let text = fs::read_to_string(path).map_err(|source| HandoffError::Io {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| HandoffError::Parse {
        path: path.to_string(),
        source,
    })
}

/// Persist `selection` at `path`; `None` records an empty selection.
///
/// # Errors
///
/// Returns [`HandoffError`] if the file cannot be written.
pub fn write(path: &Utf8Path, selection: Option<&Selection>) -> Result<(), HandoffError> {
    let empty = Selection::default();
    let mut text = serde_json::to_string(selection.unwrap_or(&empty)).map_err(|source| {
        HandoffError::Parse {
            path: path.to_string(),
            source,
        }
    })?;
    text.push('\n');
    fs::write(path, text).map_err(|source| HandoffError::Io {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result, ensure};
    use camino::Utf8PathBuf;

    fn scratch() -> Result<(tempfile::TempDir, Utf8PathBuf)> {
        let dir = tempfile::tempdir().context("create temp dir")?;
        let path = Utf8PathBuf::from_path_buf(dir.path().join("sel.tcf.json"))
            .map_err(|p| anyhow::anyhow!("non UTF-8 temp path {}", p.display()))?;
        Ok((dir, path))
    }

    #[test]
    fn written_selection_reads_back() -> Result<()> {
        let (_dir, path) = scratch()?;
        let selection = Selection::new("app", "debug");
        write(&path, Some(&selection))?;
        ensure!(read(&path)? == selection, "selection did not round-trip");
        Ok(())
    }

    #[test]
    fn cleared_selection_writes_empty_names() -> Result<()> {
        let (_dir, path) = scratch()?;
        write(&path, None)?;
        let text = fs::read_to_string(&path)?;
        ensure!(
            text == "{\"target\":\"\",\"config\":\"\"}\n",
            "unexpected content {text}"
        );
        Ok(())
    }

    #[test]
    fn errors_carry_diagnostic_codes() -> Result<()> {
        let (_dir, path) = scratch()?;
        let missing = read(&path).err().context("missing file should fail")?;
        let code = missing.code().map(|code| code.to_string());
        ensure!(code.as_deref() == Some("crossbuild::config::handoff_io"), "code was {code:?}");
        fs::write(&path, "42")?;
        let malformed = read(&path).err().context("number should fail")?;
        let code = malformed.code().map(|code| code.to_string());
        ensure!(code.as_deref() == Some("crossbuild::config::handoff_parse"), "code was {code:?}");
        Ok(())
    }

    #[test]
    fn malformed_file_is_a_parse_error() -> Result<()> {
        let (_dir, path) = scratch()?;
        fs::write(&path, "target=app")?;
        ensure!(
            matches!(read(&path), Err(HandoffError::Parse { .. })),
            "expected parse error"
        );
        Ok(())
    }

    #[test]
    fn missing_file_is_an_io_error() -> Result<()> {
        let (_dir, path) = scratch()?;
        ensure!(
            matches!(read(&path), Err(HandoffError::Io { .. })),
            "expected io error"
        );
        Ok(())
    }
}
