//! Discovery of compilation units under a target's source root.
//!
//! The source root is walked recursively and every file whose extension maps
//! onto a [`ToolRole`] is collected, unless one of the configuration's
//! `ignoreSources` globs matches it. Each glob is anchored at the source root.
//! Hidden files and directories below the root are skipped and extensions
//! match case-sensitively. Results are relative to the working directory when
//! they live beneath it and are sorted so generated graphs are reproducible.

use crate::config::ToolRole;
use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};
use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// A file to compile and the rule that compiles it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Path relative to the working directory, or absolute when outside it.
    pub path: Utf8PathBuf,
    /// Tool role selected by the file extension.
    pub role: ToolRole,
}

/// Errors raised while enumerating sources.
#[derive(Debug, Error, Diagnostic)]
pub enum DiscoveryError {
    /// The source tree could not be traversed.
    #[error("failed to walk source root {root}: {source}")]
    #[diagnostic(code(crossbuild::sources::walk))]
    Walk {
        /// Root being walked.
        root: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: walkdir::Error,
    },
    /// An `ignoreSources` entry is not a valid glob.
    #[error("invalid ignore pattern '{pattern}': {source}")]
    #[diagnostic(
        code(crossbuild::sources::pattern),
        help("ignore patterns use shell glob syntax, e.g. `vendor/**` or `*_test.c`")
    )]
    Pattern {
        /// Offending pattern after anchoring.
        pattern: String,
        /// Underlying error.
        #[source]
        source: glob::PatternError,
    },
    /// A discovered path is not valid UTF-8.
    #[error("source path is not valid UTF-8: {path}")]
    #[diagnostic(code(crossbuild::sources::non_utf8))]
    NonUtf8 {
        /// Lossy rendering of the path.
        path: String,
    },
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Enumerate compilation units under `source_root`.
///
/// A relative `source_root` is resolved against `working_dir`; an empty one
/// means the working directory itself.
///
/// # Errors
///
/// Returns [`DiscoveryError`] when the tree cannot be walked, an ignore
/// pattern is invalid, or a path is not UTF-8.
pub fn discover(
    source_root: &Utf8Path,
    ignore_sources: &[String],
    working_dir: &Utf8Path,
) -> Result<Vec<SourceFile>, DiscoveryError> {
    let root = working_dir.join(source_root);
    let ignore = compile_ignore(&root, ignore_sources)?;

    let mut sources = Vec::new();
    let walker = WalkDir::new(&root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
    for entry in walker {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            root: root.clone(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = Utf8PathBuf::from_path_buf(entry.into_path()).map_err(|path| {
            DiscoveryError::NonUtf8 {
                path: path.to_string_lossy().into_owned(),
            }
        })?;
        let Some(role) = path.extension().and_then(ToolRole::for_extension) else {
            continue;
        };
        if ignore
            .iter()
            .any(|pattern| pattern.matches_path_with(path.as_std_path(), MATCH_OPTIONS))
        {
            debug!(%path, "ignoring source");
            continue;
        }
        sources.push(SourceFile {
            path: relative_to(&path, working_dir),
            role,
        });
    }
    sources.sort();
    debug!(root = %root, count = sources.len(), "discovered sources");
    Ok(sources)
}

fn compile_ignore(root: &Utf8Path, fragments: &[String]) -> Result<Vec<Pattern>, DiscoveryError> {
    let anchor = Pattern::escape(root.as_str());
    fragments
        .iter()
        .map(|fragment| {
            let pattern = if Utf8Path::new(fragment).is_absolute() {
                fragment.clone()
            } else {
                format!("{}/{}", anchor.trim_end_matches('/'), fragment)
            };
            Pattern::new(&pattern).map_err(|source| DiscoveryError::Pattern { pattern, source })
        })
        .collect()
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

fn relative_to(path: &Utf8Path, base: &Utf8Path) -> Utf8PathBuf {
    path.strip_prefix(base)
        .map_or_else(|_| path.to_path_buf(), Utf8Path::to_path_buf)
}
