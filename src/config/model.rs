//! Typed view of a resolved crossbuild configuration.
//!
//! The structures mirror the JSON schema of `.vscode/crossbuild.json`. Every
//! collection is an [`IndexMap`] so enumeration follows declaration order.
//! Malformed entries are skipped with a warning instead of failing the whole
//! document, which keeps the remaining targets usable while the file is being
//! edited.

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// Product name used when a target does not declare one.
pub const DEFAULT_PRODUCT_NAME: &str = "out";

/// Returns `true` for names hidden from user-facing enumeration.
///
/// ```
/// use crossbuild::config::is_private;
/// assert!(is_private("_base"));
/// assert!(!is_private("debug"));
/// ```
#[must_use]
pub fn is_private(name: &str) -> bool {
    name.starts_with('_')
}

fn deserialize_lenient_map<'de, D, T>(deserializer: D) -> Result<IndexMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let entries = match Value::deserialize(deserializer)? {
        Value::Object(entries) => entries,
        Value::Null => return Ok(IndexMap::new()),
        other => {
            warn!("expected an object of named entries; ignoring {other}");
            return Ok(IndexMap::new());
        }
    };
    Ok(entries
        .into_iter()
        .filter_map(|(name, value)| match serde_json::from_value(value) {
            Ok(entry) => Some((name, entry)),
            Err(err) => {
                warn!(entry = %name, error = %err, "ignoring malformed configuration entry");
                None
            }
        })
        .collect())
}

/// Tool roles with special treatment in the generated build graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolRole {
    /// C compiler (`CC`).
    CCompiler,
    /// C++ compiler (`CXX`).
    CxxCompiler,
    /// Assembler (`AS`).
    Assembler,
    /// Linker (`LD`).
    Linker,
}

impl ToolRole {
    /// Every role in the order the graph lists them.
    pub const ALL: [Self; 4] = [
        Self::CCompiler,
        Self::CxxCompiler,
        Self::Assembler,
        Self::Linker,
    ];

    /// Key naming this role in a toolchain's `tools` table.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CCompiler => "CC",
            Self::CxxCompiler => "CXX",
            Self::Assembler => "AS",
            Self::Linker => "LD",
        }
    }

    /// Map a `tools` key onto its role, if it names one.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.name() == name)
    }

    /// Compilers consume preprocessor input and emit dependency files.
    #[must_use]
    pub const fn is_compiler(self) -> bool {
        matches!(self, Self::CCompiler | Self::CxxCompiler)
    }

    /// Rule used to compile a source file with the given extension.
    ///
    /// Matching is case-sensitive: `.C` and `.S` are not compiled.
    ///
    /// ```
    /// use crossbuild::config::ToolRole;
    /// assert_eq!(ToolRole::for_extension("cc"), Some(ToolRole::CxxCompiler));
    /// assert_eq!(ToolRole::for_extension("h"), None);
    /// assert_eq!(ToolRole::for_extension("C"), None);
    /// ```
    #[must_use]
    pub fn for_extension(extension: &str) -> Option<Self> {
        match extension {
            "c" => Some(Self::CCompiler),
            "cpp" | "cc" => Some(Self::CxxCompiler),
            "s" => Some(Self::Assembler),
            _ => None,
        }
    }
}

impl fmt::Display for ToolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Root of a configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Named toolchains.
    #[serde(default, deserialize_with = "deserialize_lenient_map")]
    pub toolchains: IndexMap<String, Toolchain>,
    /// Named targets.
    #[serde(default, deserialize_with = "deserialize_lenient_map")]
    pub targets: IndexMap<String, Target>,
}

/// Compiler, assembler, and linker executables sharing a base directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    /// Base directory for relative tool paths.
    #[serde(default)]
    pub root: Option<String>,
    /// Tool name to executable path.
    #[serde(default)]
    pub tools: Option<IndexMap<String, String>>,
}

impl Toolchain {
    /// Return the declared tools, or `None` when the table is absent or empty.
    #[must_use]
    pub fn declared_tools(&self) -> Option<&IndexMap<String, String>> {
        self.tools.as_ref().filter(|tools| !tools.is_empty())
    }

    /// Resolve `tool` to an executable path, joining relative paths onto
    /// [`Toolchain::root`].
    ///
    /// ```
    /// use crossbuild::config::Toolchain;
    /// let toolchain = Toolchain {
    ///     root: Some("/usr/bin".into()),
    ///     tools: Some([("CC".to_owned(), "gcc".to_owned())].into_iter().collect()),
    /// };
    /// assert_eq!(
    ///     toolchain.tool_path("CC").map(camino::Utf8PathBuf::into_string),
    ///     Some("/usr/bin/gcc".to_owned())
    /// );
    /// assert!(toolchain.tool_path("LD").is_none());
    /// ```
    #[must_use]
    pub fn tool_path(&self, tool: &str) -> Option<Utf8PathBuf> {
        self.tools
            .as_ref()?
            .get(tool)
            .map(|path| self.join_root(path))
    }

    /// Resolve every declared tool in declaration order.
    pub fn tool_paths(&self) -> impl Iterator<Item = (&str, Utf8PathBuf)> + '_ {
        self.tools
            .iter()
            .flatten()
            .map(|(name, path)| (name.as_str(), self.join_root(path)))
    }

    fn join_root(&self, tool: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from(tool);
        if path.is_absolute() {
            return path;
        }
        match self.root.as_deref() {
            Some(root) => Utf8PathBuf::from(root).join(path),
            None => path,
        }
    }
}

/// A buildable product referencing one toolchain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Name of the toolchain in [`BuildConfig::toolchains`].
    #[serde(default)]
    pub toolchain: Option<String>,
    /// File name of the linked product.
    #[serde(default)]
    pub product_name: Option<String>,
    /// Directory searched recursively for sources.
    #[serde(default)]
    pub source_root: Option<String>,
    /// Named build variants.
    #[serde(default, deserialize_with = "deserialize_lenient_map")]
    pub configurations: IndexMap<String, Configuration>,
}

impl Target {
    /// Product name, defaulting to [`DEFAULT_PRODUCT_NAME`].
    #[must_use]
    pub fn product_name(&self) -> &str {
        self.product_name.as_deref().unwrap_or(DEFAULT_PRODUCT_NAME)
    }

    /// Source root, defaulting to the working directory.
    #[must_use]
    pub fn source_root(&self) -> &str {
        self.source_root.as_deref().unwrap_or_default()
    }
}

/// A named variant of a target's build settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Sibling configuration this one extends. Cleared by resolution.
    #[serde(default)]
    pub inherit: Option<String>,
    /// Output directory for objects and the product.
    #[serde(default)]
    pub product_dir: Option<String>,
    /// Include directories passed to the compilers.
    #[serde(default)]
    pub include_paths: Vec<String>,
    /// Glob fragments, relative to the source root, excluded from discovery.
    #[serde(default)]
    pub ignore_sources: Vec<String>,
    /// Preprocessor definitions.
    #[serde(default)]
    pub defines: Vec<String>,
    /// Per-tool flag lists.
    #[serde(default)]
    pub flags: IndexMap<String, Vec<String>>,
    /// Flags appended after the linker's inputs.
    #[serde(default)]
    pub extra_linker_flags: Vec<String>,
    /// Commands run after a successful build.
    #[serde(default)]
    pub post_build_tasks: Vec<PostBuildTask>,
}

impl Configuration {
    /// Output directory, defaulting to the working directory.
    #[must_use]
    pub fn product_dir(&self) -> &str {
        self.product_dir.as_deref().unwrap_or_default()
    }

    /// Flags declared for `tool`.
    #[must_use]
    pub fn flags_for(&self, tool: &str) -> &[String] {
        self.flags.get(tool).map_or(&[], Vec::as_slice)
    }
}

/// An external command run after the build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostBuildTask {
    /// Tool name resolved through the toolchain when `command` is empty.
    #[serde(default)]
    pub tool: Option<String>,
    /// Executable to run; takes precedence over `tool`.
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// File receiving the task's combined output.
    #[serde(default)]
    pub out_file: Option<String>,
}

impl BuildConfig {
    /// Build a typed configuration from a JSON document.
    ///
    /// Non-object roots and malformed entries degrade to empty collections.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value).unwrap_or_else(|err| {
            warn!(error = %err, "configuration root could not be interpreted");
            Self::default()
        })
    }

    /// Toolchain names in declaration order.
    #[must_use]
    pub fn toolchain_names(&self) -> Vec<&str> {
        self.toolchains.keys().map(String::as_str).collect()
    }

    /// Look up a toolchain by name.
    #[must_use]
    pub fn toolchain(&self, name: &str) -> Option<&Toolchain> {
        self.toolchains.get(name)
    }

    /// Target names, optionally excluding private names.
    #[must_use]
    pub fn target_names(&self, filter_private: bool) -> Vec<&str> {
        filter_names(self.targets.keys(), filter_private)
    }

    /// Look up a target by name, private names included.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    /// Configuration names for `target`, or `None` for an unknown target.
    #[must_use]
    pub fn configuration_names(&self, target: &str, filter_private: bool) -> Option<Vec<&str>> {
        self.target(target)
            .map(|t| filter_names(t.configurations.keys(), filter_private))
    }

    /// Look up configuration `config` of `target`.
    #[must_use]
    pub fn configuration(&self, target: &str, config: &str) -> Option<&Configuration> {
        self.target(target)?.configurations.get(config)
    }

    /// Whether `target` has a configuration called `config`.
    #[must_use]
    pub fn has_configuration(&self, target: &str, config: &str, filter_private: bool) -> bool {
        self.configuration_names(target, filter_private)
            .is_some_and(|names| names.contains(&config))
    }
}

fn filter_names<'a>(names: impl Iterator<Item = &'a String>, filter_private: bool) -> Vec<&'a str> {
    names
        .map(String::as_str)
        .filter(|name| !filter_private || !is_private(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn sample() -> BuildConfig {
        BuildConfig::from_value(json!({
            "toolchains": {"gcc": {"root": "/usr/bin", "tools": {"CC": "gcc", "LD": "/opt/ld"}}},
            "targets": {
                "_common": {"configurations": {}},
                "app": {
                    "toolchain": "gcc",
                    "configurations": {
                        "_base": {"defines": ["BASE"]},
                        "debug": {"defines": ["DEBUG"], "productDir": "build/debug"}
                    }
                }
            }
        }))
    }

    #[rstest]
    fn private_names_are_filtered_only_on_request() {
        let config = sample();
        assert_eq!(config.target_names(true), vec!["app"]);
        assert_eq!(config.target_names(false), vec!["_common", "app"]);
        assert_eq!(config.configuration_names("app", true), Some(vec!["debug"]));
        assert!(config.target("_common").is_some());
        assert!(config.configuration("app", "_base").is_some());
    }

    #[rstest]
    #[case("debug", true, true)]
    #[case("_base", true, false)]
    #[case("_base", false, true)]
    #[case("release", false, false)]
    fn has_configuration_respects_filter(
        #[case] name: &str,
        #[case] filter: bool,
        #[case] expected: bool,
    ) {
        assert_eq!(sample().has_configuration("app", name, filter), expected);
    }

    #[rstest]
    fn tool_paths_join_relative_tools_onto_root() {
        let config = sample();
        let toolchain = config.toolchain("gcc").cloned().unwrap_or_default();
        let paths: Vec<_> = toolchain
            .tool_paths()
            .map(|(name, path)| (name.to_owned(), path.into_string()))
            .collect();
        assert_eq!(
            paths,
            vec![
                ("CC".to_owned(), "/usr/bin/gcc".to_owned()),
                ("LD".to_owned(), "/opt/ld".to_owned()),
            ]
        );
    }

    #[rstest]
    fn malformed_entries_are_skipped() {
        let config = BuildConfig::from_value(json!({
            "toolchains": {"bad": {"tools": 3}, "good": {"tools": {"CC": "cc"}}},
            "targets": {"app": {"configurations": {"broken": {"defines": "X"}, "ok": {}}}}
        }));
        assert_eq!(config.toolchain_names(), vec!["good"]);
        assert_eq!(config.configuration_names("app", false), Some(vec!["ok"]));
    }

    #[rstest]
    #[case(json!([1, 2]))]
    #[case(json!("text"))]
    #[case(json!({"targets": "nope"}))]
    fn non_object_content_is_empty(#[case] value: Value) {
        let config = BuildConfig::from_value(value);
        assert!(config.targets.is_empty());
        assert!(config.toolchains.is_empty());
    }

    #[rstest]
    fn empty_tools_table_is_not_declared() {
        let toolchain = Toolchain {
            root: None,
            tools: Some(IndexMap::new()),
        };
        assert!(toolchain.declared_tools().is_none());
    }

    #[rstest]
    #[case("c", Some(ToolRole::CCompiler))]
    #[case("cpp", Some(ToolRole::CxxCompiler))]
    #[case("s", Some(ToolRole::Assembler))]
    #[case("S", None)]
    #[case("C", None)]
    #[case("CPP", None)]
    #[case("o", None)]
    fn extension_maps_to_rule(#[case] ext: &str, #[case] expected: Option<ToolRole>) {
        assert_eq!(ToolRole::for_extension(ext), expected);
    }
}
