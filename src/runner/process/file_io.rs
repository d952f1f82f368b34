//! File helpers for the runner.
//! Writes the build graph durably and removes build outputs through
//! capability-based directory handles.

use anyhow::{Context, Result as AnyResult, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs as cap_fs};
use ninja_env::NINJA_STATE_PREFIX;
use std::io::{self, Write};
use tracing::{debug, info};

/// Write `content` to `path` inside `dir`, creating parent directories, and
/// sync it to storage before returning.
pub fn write_graph_file_utf8(dir: &cap_fs::Dir, path: &Utf8Path, content: &str) -> AnyResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        dir.create_dir_all(parent.as_str())
            .with_context(|| format!("failed to create directory {parent}"))?;
    }
    let mut file = dir
        .create(path.as_str())
        .with_context(|| format!("failed to create build graph {path}"))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write build graph {path}"))?;
    file.flush()
        .with_context(|| format!("failed to flush build graph {path}"))?;
    file.sync_all()
        .with_context(|| format!("failed to sync build graph {path}"))?;
    Ok(())
}

/// Open the nearest existing ancestor of `path` and return it together with
/// the remainder of `path` below it. Relative paths are taken from `base`.
fn derive_dir_and_relative(base: &Utf8Path, path: &Utf8Path) -> AnyResult<(cap_fs::Dir, Utf8PathBuf)> {
    let absolute = base.join(path);
    let mut ancestors = absolute.ancestors();
    ancestors.next();
    let (found, dir) = ancestors
        .find_map(|candidate| {
            cap_fs::Dir::open_ambient_dir(candidate.as_str(), ambient_authority())
                .ok()
                .map(|dir| (candidate.to_owned(), dir))
        })
        .ok_or_else(|| anyhow!("no existing ancestor directory for {absolute}"))?;
    let relative = absolute
        .strip_prefix(&found)
        .with_context(|| format!("failed to derive path of {absolute} below {found}"))?
        .to_owned();
    Ok((dir, relative))
}

/// Durably write the build graph to `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be created, written, or synced.
pub fn write_graph_file(path: &Utf8Path, content: &str) -> AnyResult<()> {
    let (dir, relative) = derive_dir_and_relative(Utf8Path::new("/"), path)?;
    write_graph_file_utf8(&dir, &relative, content)?;
    info!("Wrote build graph to {path}");
    Ok(())
}

/// Remove `path` (a directory tree or a file), relative to `base`.
///
/// Missing paths are not an error.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_path(base: &Utf8Path, path: &Utf8Path) -> AnyResult<()> {
    let (dir, relative) = derive_dir_and_relative(base, path)?;
    let result = match dir.symlink_metadata(relative.as_str()) {
        Ok(meta) if meta.is_dir() => dir.remove_dir_all(relative.as_str()),
        Ok(_) => dir.remove_file(relative.as_str()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("nothing to remove at {}", base.join(path));
            return Ok(());
        }
        Err(err) => Err(err),
    };
    result.with_context(|| format!("failed to remove {}", base.join(path)))?;
    info!("Removed {}", base.join(path));
    Ok(())
}

/// Remove Ninja's state files (`.ninja_log`, `.ninja_deps`, ...) from `dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or a file removed.
pub fn remove_ninja_state(dir: &Utf8Path) -> AnyResult<()> {
    let handle = cap_fs::Dir::open_ambient_dir(dir.as_str(), ambient_authority())
        .with_context(|| format!("failed to open {dir}"))?;
    for entry in handle
        .entries()
        .with_context(|| format!("failed to list {dir}"))?
    {
        let entry = entry.with_context(|| format!("failed to list {dir}"))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with(NINJA_STATE_PREFIX) {
            continue;
        }
        let removed = if entry.file_type()?.is_dir() {
            handle.remove_dir_all(name)
        } else {
            handle.remove_file(name)
        };
        removed.with_context(|| format!("failed to remove {dir}/{name}"))?;
        info!("Removed {dir}/{name}");
    }
    Ok(())
}
