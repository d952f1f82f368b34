//! Path resolution helpers for the runner module.
//!
//! Centralises working-directory, config-file and product-directory logic so
//! the main runner module stays focused on the pipeline.

use crate::cli::Cli;
use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use std::env;
use std::path::Path;

fn utf8(path: &Path, what: &str) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path.to_path_buf())
        .map_err(|path| anyhow!("{what} {} is not valid UTF-8", path.display()))
}

/// Determine the directory the build runs in, honouring `--directory`.
///
/// The result is absolute and canonical when the directory exists, so the
/// graph-file digest is stable across equivalent spellings.
///
/// # Errors
/// Returns an error when the current directory cannot be determined or a path
/// is not valid UTF-8.
pub(super) fn resolve_working_dir(cli: &Cli) -> Result<Utf8PathBuf> {
    let cwd = env::current_dir().context("failed to determine the current directory")?;
    let cwd = utf8(&cwd, "current directory")?;
    let dir = match &cli.directory {
        Some(dir) => cwd.join(utf8(dir, "directory")?),
        None => cwd,
    };
    Ok(dir.canonicalize_utf8().unwrap_or(dir))
}

/// Resolve a CLI-supplied path against the working directory.
///
/// # Errors
/// Returns an error when `path` is not valid UTF-8.
pub(super) fn resolve_input_path(working_dir: &Utf8Path, path: &Path) -> Result<Utf8PathBuf> {
    Ok(working_dir.join(utf8(path, "path")?))
}

/// Express `product_dir` relative to `working_dir` when it lies beneath it.
///
/// ```ignore
/// let dir = relative_product_dir(Utf8Path::new("/w"), "/w/build/debug");
/// assert_eq!(dir, Utf8PathBuf::from("build/debug"));
/// ```
pub(super) fn relative_product_dir(working_dir: &Utf8Path, product_dir: &str) -> Utf8PathBuf {
    let absolute = working_dir.join(product_dir);
    absolute
        .strip_prefix(working_dir)
        .map_or_else(|_| absolute.clone(), Utf8Path::to_path_buf)
}

/// System temporary directory holding generated graphs and hand-off files.
///
/// # Errors
/// Returns an error when the directory path is not valid UTF-8.
pub fn temp_dir() -> Result<Utf8PathBuf> {
    utf8(&env::temp_dir(), "temporary directory")
}
