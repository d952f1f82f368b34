//! Working-directory digests.
//!
//! The generated graph and the hand-off file live in the system temporary
//! directory under names derived from the project directory, so concurrent
//! invocations from different projects never share a file while repeated
//! invocations from the same project reuse one.
//!
//! # Examples
//!
//! ```
//! use crossbuild::hasher::WorkspaceHasher;
//! use camino::Utf8Path;
//!
//! let a = WorkspaceHasher::hash(Utf8Path::new("/work/a"));
//! let b = WorkspaceHasher::hash(Utf8Path::new("/work/b"));
//! assert_eq!(a.len(), 64);
//! assert_ne!(a, b);
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};

/// Suffix of generated Ninja files.
pub const GRAPH_FILE_SUFFIX: &str = ".ninja";
/// Suffix of hand-off files.
pub const HANDOFF_FILE_SUFFIX: &str = ".tcf.json";

/// Computes stable digests for project directories.
pub struct WorkspaceHasher;

impl WorkspaceHasher {
    /// Calculate the hex-encoded SHA-256 digest of `dir`.
    #[must_use]
    pub fn hash(dir: &Utf8Path) -> String {
        let mut hasher = Sha256::new();
        Self::update_with_len(&mut hasher, dir.as_str().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Path of the generated graph for `dir` inside `temp_dir`.
    #[must_use]
    pub fn graph_file(temp_dir: &Utf8Path, dir: &Utf8Path) -> Utf8PathBuf {
        temp_dir.join(format!("{}{GRAPH_FILE_SUFFIX}", Self::hash(dir)))
    }

    /// Path of the hand-off file for `dir` inside `temp_dir`.
    #[must_use]
    pub fn handoff_file(temp_dir: &Utf8Path, dir: &Utf8Path) -> Utf8PathBuf {
        temp_dir.join(format!("{}{HANDOFF_FILE_SUFFIX}", Self::hash(dir)))
    }

    fn update_with_len(hasher: &mut Sha256, bytes: &[u8]) {
        let len = bytes.len();
        hasher.update(format!("{len}:").as_bytes());
        hasher.update(bytes);
    }
}
