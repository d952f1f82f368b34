//! Test utilities for driving the `crossbuild` binary.
//!
//! Provides a fake Ninja executable that records how it was invoked and a
//! scratch project writer that lays out a configuration file and sources.

pub mod ninja;
pub mod project;

pub use ninja::FakeNinja;
pub use project::Project;

use anyhow::Result;
use std::path::Path;

/// Make a script file executable on Unix platforms.
#[cfg(unix)]
fn make_script_executable(path: &Path) -> Result<()> {
    use anyhow::Context;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)
        .with_context(|| format!("read metadata {}", path.display()))?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
        .with_context(|| format!("set permissions {}", path.display()))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_script_executable(_path: &Path) -> Result<()> {
    Ok(())
}
