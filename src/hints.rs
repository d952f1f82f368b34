//! IDE hint file generation.
//!
//! Editors with C/C++ support read `c_cpp_properties.json` to learn the
//! include paths and preprocessor defines of the active configuration. The
//! file is written next to the configuration file and only rewritten when
//! its content changes, so editors watching it are not woken needlessly.

use crate::config::{BuildConfig, Selection};
use anyhow::{Context, Result};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs as cap_fs};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::debug;

/// File name of the hint file.
pub const HINT_FILE_NAME: &str = "c_cpp_properties.json";
/// Placeholder editors expand to the workspace root.
pub const WORKSPACE_ROOT_PLACEHOLDER: &str = "${workspaceRoot}";

const HINT_FORMAT_VERSION: u32 = 2;
const HINT_CONFIGURATION_NAME: &str = "Auto";

#[cfg(windows)]
const INTELLISENSE_MODE: &str = "msvc-x64";
#[cfg(not(windows))]
const INTELLISENSE_MODE: &str = "clang-x64";

/// Controls hint generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintOptions {
    /// Whether the hint file is written at all.
    pub enabled: bool,
    /// Defines placed before the configuration's own defines.
    pub extra_defines: Vec<String>,
    /// Spaces per indentation level.
    pub indent: usize,
}

impl Default for HintOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            extra_defines: Vec::new(),
            indent: 4,
        }
    }
}

#[derive(Debug, Serialize)]
struct HintFile {
    version: u32,
    configurations: Vec<HintConfiguration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HintConfiguration {
    intelli_sense_mode: &'static str,
    name: &'static str,
    include_path: Vec<String>,
    defines: Vec<String>,
    browse: Browse,
}

#[derive(Debug, Serialize)]
struct Browse {
    path: Vec<String>,
}

/// Path of the hint file for `config_path`.
#[must_use]
pub fn hint_path(config_path: &Utf8Path) -> Utf8PathBuf {
    config_path
        .parent()
        .map_or_else(|| Utf8PathBuf::from(HINT_FILE_NAME), |dir| dir.join(HINT_FILE_NAME))
}

/// Render the hint file for `selection`.
///
/// Without a selection, or when it names nothing in `config`, the include
/// path and configuration defines are empty.
///
/// # Errors
///
/// Returns an error if serialisation fails.
pub fn render(
    config: &BuildConfig,
    selection: Option<&Selection>,
    workspace_root: &Utf8Path,
    options: &HintOptions,
) -> Result<String> {
    let mut include_path = Vec::new();
    let mut defines = options.extra_defines.clone();
    if let Some(selection) = selection
        && let Some(target) = config.target(&selection.target)
        && let Some(configuration) = config.configuration(&selection.target, &selection.config)
    {
        let source_root = Utf8Path::new(target.source_root());
        include_path = configuration
            .include_paths
            .iter()
            .map(|item| editor_path(Utf8Path::new(item), source_root, workspace_root))
            .collect();
        defines.extend(configuration.defines.iter().cloned());
    }

    let file = HintFile {
        version: HINT_FORMAT_VERSION,
        configurations: vec![HintConfiguration {
            intelli_sense_mode: INTELLISENSE_MODE,
            name: HINT_CONFIGURATION_NAME,
            browse: Browse {
                path: include_path.clone(),
            },
            include_path,
            defines,
        }],
    };

    let indent = vec![b' '; options.indent];
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(&indent));
    file.serialize(&mut ser).context("serialising hint file")?;
    let mut text = String::from_utf8(buf).context("hint file is not UTF-8")?;
    text.push('\n');
    Ok(text)
}

/// Write the hint file beside `config_path` unless it already holds the
/// same content. Returns whether the file was written.
///
/// # Errors
///
/// Returns an error if the directory cannot be opened or the file written.
pub fn write(
    config_path: &Utf8Path,
    config: &BuildConfig,
    selection: Option<&Selection>,
    workspace_root: &Utf8Path,
    options: &HintOptions,
) -> Result<bool> {
    if !options.enabled {
        return Ok(false);
    }
    let path = hint_path(config_path);
    let dir_path = path.parent().unwrap_or(workspace_root);
    let text = render(config, selection, workspace_root, options)?;
    let dir = cap_fs::Dir::open_ambient_dir(dir_path.as_str(), ambient_authority())
        .with_context(|| format!("failed to open {dir_path}"))?;
    if dir.read_to_string(HINT_FILE_NAME).is_ok_and(|current| current == text) {
        debug!("hint file {path} is up to date");
        return Ok(false);
    }
    dir.write(HINT_FILE_NAME, text.as_bytes())
        .with_context(|| format!("failed to write {path}"))?;
    debug!("wrote hint file {path}");
    Ok(true)
}

/// Join `item` onto the source root, make it absolute against the workspace
/// root and replace the workspace root with the editor placeholder.
fn editor_path(item: &Utf8Path, source_root: &Utf8Path, workspace_root: &Utf8Path) -> String {
    let joined = if item.is_absolute() {
        item.to_owned()
    } else {
        source_root.join(item)
    };
    let absolute = normalize(&workspace_root.join(joined));
    absolute
        .as_str()
        .replacen(workspace_root.as_str(), WORKSPACE_ROOT_PLACEHOLDER, 1)
}

/// Lexically remove `.` and `..` components.
fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::ensure;
    use rstest::{fixture, rstest};
    use serde_json::{Value, json};
    use std::fs;

    #[fixture]
    fn config() -> BuildConfig {
        BuildConfig::from_value(json!({
            "targets": {
                "app": {
                    "sourceRoot": "/work/src",
                    "configurations": {
                        "debug": {
                            "includePaths": ["inc", "../common", "/opt/sdk/include"],
                            "defines": ["DEBUG"]
                        }
                    }
                }
            }
        }))
    }

    #[rstest]
    #[case("inc", "/work/src", "${workspaceRoot}/src/inc")]
    #[case("../common", "/work/src", "${workspaceRoot}/common")]
    #[case("./inc/./sub", "src", "${workspaceRoot}/src/inc/sub")]
    #[case("/opt/sdk/include", "/work/src", "/opt/sdk/include")]
    fn include_paths_use_placeholder(#[case] item: &str, #[case] root: &str, #[case] expected: &str) {
        assert_eq!(
            editor_path(Utf8Path::new(item), Utf8Path::new(root), Utf8Path::new("/work")),
            expected
        );
    }

    #[rstest]
    fn renders_selected_configuration(config: BuildConfig) -> anyhow::Result<()> {
        let options = HintOptions {
            extra_defines: vec!["__GNUC__".into()],
            ..HintOptions::default()
        };
        let text = render(
            &config,
            Some(&Selection::new("app", "debug")),
            Utf8Path::new("/work"),
            &options,
        )?;
        ensure!(text.ends_with("}\n"), "missing trailing newline");
        ensure!(text.contains("\n    \"version\": 2"), "expected four-space indent: {text}");
        let value: Value = serde_json::from_str(&text)?;
        let entry = &value["configurations"][0];
        ensure!(entry["name"] == "Auto", "name was {}", entry["name"]);
        ensure!(entry["intelliSenseMode"] == INTELLISENSE_MODE, "mode was {}", entry["intelliSenseMode"]);
        ensure!(
            entry["defines"] == json!(["__GNUC__", "DEBUG"]),
            "defines were {}",
            entry["defines"]
        );
        let includes = json!([
            "${workspaceRoot}/src/inc",
            "${workspaceRoot}/common",
            "/opt/sdk/include"
        ]);
        ensure!(entry["includePath"] == includes, "includes were {}", entry["includePath"]);
        ensure!(entry["browse"]["path"] == includes, "browse was {}", entry["browse"]);
        Ok(())
    }

    #[rstest]
    #[case(None)]
    #[case(Some(Selection::new("app", "missing")))]
    fn unknown_selection_renders_empty_lists(
        config: BuildConfig,
        #[case] selection: Option<Selection>,
    ) -> anyhow::Result<()> {
        let text = render(&config, selection.as_ref(), Utf8Path::new("/work"), &HintOptions::default())?;
        let value: Value = serde_json::from_str(&text)?;
        ensure!(value["configurations"][0]["includePath"] == json!([]), "{text}");
        ensure!(value["configurations"][0]["defines"] == json!([]), "{text}");
        Ok(())
    }

    #[rstest]
    fn writes_only_when_changed(config: BuildConfig) -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf())
            .map_err(|p| anyhow::anyhow!("non UTF-8 temp path {}", p.display()))?;
        let config_path = root.join("crossbuild.json");
        let selection = Selection::new("app", "debug");
        let options = HintOptions::default();

        ensure!(write(&config_path, &config, Some(&selection), &root, &options)?, "first write skipped");
        ensure!(!write(&config_path, &config, Some(&selection), &root, &options)?, "rewrote identical file");
        ensure!(write(&config_path, &config, None, &root, &options)?, "changed content not written");
        let written = fs::read_to_string(root.join(HINT_FILE_NAME))?;
        ensure!(written.contains("\"includePath\": []"), "{written}");
        Ok(())
    }

    #[rstest]
    fn disabled_hints_write_nothing(config: BuildConfig) -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf())
            .map_err(|p| anyhow::anyhow!("non UTF-8 temp path {}", p.display()))?;
        let options = HintOptions {
            enabled: false,
            ..HintOptions::default()
        };
        ensure!(!write(&root.join("crossbuild.json"), &config, None, &root, &options)?, "wrote");
        ensure!(!root.join(HINT_FILE_NAME).exists(), "hint file created");
        Ok(())
    }
}
