#![forbid(unsafe_code)]

//! Shared environment constants used across crossbuild crates (library, tests, and
//! helpers).

/// Environment variable override for the Ninja executable.
///
/// Consulted when no `--ninja` flag is given on the command line.
///
/// # Examples
///
/// ```
/// use ninja_env::NINJA_ENV;
/// assert_eq!(NINJA_ENV, "CROSSBUILD_NINJA");
/// ```
pub const NINJA_ENV: &str = "CROSSBUILD_NINJA";

/// Prefix shared by the persistent state files Ninja writes next to the
/// working directory (`.ninja_log`, `.ninja_deps`).
pub const NINJA_STATE_PREFIX: &str = ".ninja_";
