//! Build graph intermediate representation.
//!
//! [`BuildGraph::new`] turns a resolved target, configuration and toolchain
//! plus the discovered sources into rules, flag variables and edges. The
//! structure is backend-agnostic; [`crate::ninja_gen`] renders it as Ninja
//! syntax.
//!
//! # Examples
//!
//! ```
//! use camino::Utf8Path;
//! use crossbuild::config::{Configuration, Toolchain, ToolRole};
//! use crossbuild::graph::{BuildGraph, Product};
//! use crossbuild::sources::SourceFile;
//!
//! let tools = [("CC", "gcc"), ("LD", "ld")]
//!     .into_iter()
//!     .map(|(k, v)| (k.to_owned(), v.to_owned()))
//!     .collect();
//! let toolchain = Toolchain { root: Some("/usr/bin".into()), tools: Some(tools) };
//! let sources = [SourceFile { path: "src/a.c".into(), role: ToolRole::CCompiler }];
//! let product = Product::new(Utf8Path::new("build"), "app");
//! let graph = BuildGraph::new(&toolchain, &Configuration::default(), &product, &sources)?;
//! assert_eq!(graph.objects[0].output.as_str(), "build/obj/src/a.c.o");
//! assert_eq!(graph.link.output.as_str(), "build/app");
//! # Ok::<(), crossbuild::graph::GraphError>(())
//! ```

use crate::config::{Configuration, ToolRole, Toolchain};
use crate::sources::SourceFile;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use thiserror::Error;

/// Directory below the product directory holding object files.
pub const OBJECT_DIR: &str = "obj";
/// Variable carrying the linker's trailing flags.
pub const EXTRA_LINKER_FLAGS_VAR: &str = "ld_extra_flags";

/// Errors raised while assembling a build graph.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// A source or the link step needs a tool the toolchain does not declare.
    #[error("toolchain does not declare tool '{tool}' needed by {needed_by}")]
    #[diagnostic(
        code(crossbuild::graph::missing_tool),
        help("add '{tool}' to the toolchain's tools table")
    )]
    MissingTool {
        /// Missing tool name.
        tool: ToolRole,
        /// Source path or product file requiring the tool.
        needed_by: String,
    },
}

/// Where the linked product is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// Output directory, relative to the working directory when possible.
    pub dir: Utf8PathBuf,
    /// File name, also used as the phony alias.
    pub name: String,
}

impl Product {
    /// Describe a product called `name` inside `dir`.
    #[must_use]
    pub fn new(dir: &Utf8Path, name: impl Into<String>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            name: name.into(),
        }
    }

    /// Path of the linked file.
    #[must_use]
    pub fn file(&self) -> Utf8PathBuf {
        self.dir.join(&self.name)
    }

    /// Object file produced from `source`.
    ///
    /// Only normal components of `source` are kept so absolute sources stay
    /// below the object directory; `..` becomes `__`.
    #[must_use]
    pub fn object_for(&self, source: &Utf8Path) -> Utf8PathBuf {
        let mut object = self.dir.join(OBJECT_DIR);
        for component in source.components() {
            match component {
                Utf8Component::Normal(part) => object.push(part),
                Utf8Component::ParentDir => object.push("__"),
                Utf8Component::CurDir | Utf8Component::RootDir | Utf8Component::Prefix(_) => {}
            }
        }
        object.set_file_name(format!("{}.o", object.file_name().unwrap_or_default()));
        object
    }
}

/// A named list of flags shared by a rule's command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Variable name, e.g. `cc_flags`.
    pub name: String,
    /// Flags in emission order.
    pub values: Vec<String>,
}

/// A rule invoking one toolchain executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Rule name, the tool's key in the toolchain.
    pub name: String,
    /// Executable path.
    pub program: Utf8PathBuf,
    /// Variable holding the tool's flags.
    pub flags_var: String,
    /// Emit GCC-style dependency files.
    pub dependency_tracking: bool,
    /// Variable holding flags placed after the inputs.
    pub extra_flags_var: Option<String>,
}

/// An edge producing one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEdge {
    /// Rule name.
    pub rule: String,
    /// Output path.
    pub output: Utf8PathBuf,
    /// Explicit inputs.
    pub inputs: Vec<Utf8PathBuf>,
}

/// Complete graph for one target configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildGraph {
    /// Flag variables, one per declared tool plus optional extras.
    pub variables: Vec<Variable>,
    /// Rules in toolchain declaration order.
    pub rules: Vec<Rule>,
    /// One edge per compilation unit.
    pub objects: Vec<BuildEdge>,
    /// Edge linking every object into the product.
    pub link: BuildEdge,
    /// Phony alias for the product file, also the default target.
    pub alias: String,
}

impl BuildGraph {
    /// Assemble the graph for `sources`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::MissingTool`] when a source's compiler or the
    /// linker is not declared by `toolchain`.
    pub fn new(
        toolchain: &Toolchain,
        config: &Configuration,
        product: &Product,
        sources: &[SourceFile],
    ) -> Result<Self, GraphError> {
        let mut variables = Vec::new();
        let mut rules = Vec::new();
        for (name, program) in toolchain.tool_paths() {
            let role = ToolRole::from_name(name);
            let flags_var = format!("{}_flags", name.to_lowercase());
            variables.push(Variable {
                name: flags_var.clone(),
                values: tool_flags(name, role, config),
            });
            let extra_flags_var = (role == Some(ToolRole::Linker)
                && !config.extra_linker_flags.is_empty())
            .then(|| {
                variables.push(Variable {
                    name: EXTRA_LINKER_FLAGS_VAR.to_owned(),
                    values: config.extra_linker_flags.clone(),
                });
                EXTRA_LINKER_FLAGS_VAR.to_owned()
            });
            rules.push(Rule {
                name: name.to_owned(),
                program,
                flags_var,
                dependency_tracking: role.is_some_and(ToolRole::is_compiler),
                extra_flags_var,
            });
        }

        let declared = |role: ToolRole| rules.iter().any(|rule| rule.name == role.name());
        let objects = sources
            .iter()
            .map(|source| {
                if !declared(source.role) {
                    return Err(GraphError::MissingTool {
                        tool: source.role,
                        needed_by: source.path.to_string(),
                    });
                }
                Ok(BuildEdge {
                    rule: source.role.name().to_owned(),
                    output: product.object_for(&source.path),
                    inputs: vec![source.path.clone()],
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let product_file = product.file();
        if !declared(ToolRole::Linker) {
            return Err(GraphError::MissingTool {
                tool: ToolRole::Linker,
                needed_by: product_file.to_string(),
            });
        }
        let link = BuildEdge {
            rule: ToolRole::Linker.name().to_owned(),
            inputs: objects.iter().map(|edge| edge.output.clone()).collect(),
            output: product_file,
        };

        Ok(Self {
            variables,
            rules,
            objects,
            link,
            alias: product.name.clone(),
        })
    }
}

/// Flags for `tool`: its own list, then defines unless it assembles, then
/// include paths for compilers.
fn tool_flags(tool: &str, role: Option<ToolRole>, config: &Configuration) -> Vec<String> {
    let mut flags = config.flags_for(tool).to_vec();
    if role != Some(ToolRole::Assembler) {
        flags.extend(config.defines.iter().map(|define| format!("-D{define}")));
    }
    if role.is_some_and(ToolRole::is_compiler) {
        flags.extend(config.include_paths.iter().map(|path| format!("-I{path}")));
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use rstest::{fixture, rstest};

    #[fixture]
    fn toolchain() -> Toolchain {
        let tools: IndexMap<String, String> = [("CC", "gcc"), ("AS", "as"), ("LD", "ld"), ("SIZE", "size")]
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Toolchain {
            root: Some("/usr/bin".into()),
            tools: Some(tools),
        }
    }

    #[fixture]
    fn config() -> Configuration {
        Configuration {
            defines: vec!["DEBUG".into()],
            include_paths: vec!["inc".into()],
            flags: [("CC".to_owned(), vec!["-O0".to_owned()])].into_iter().collect(),
            ..Configuration::default()
        }
    }

    fn source(path: &str, role: ToolRole) -> SourceFile {
        SourceFile {
            path: path.into(),
            role,
        }
    }

    #[rstest]
    fn flags_follow_role_rules(toolchain: Toolchain, config: Configuration) -> Result<(), GraphError> {
        let product = Product::new(Utf8Path::new("build"), "out");
        let graph = BuildGraph::new(&toolchain, &config, &product, &[])?;
        let vars: Vec<_> = graph
            .variables
            .iter()
            .map(|v| (v.name.as_str(), v.values.clone()))
            .collect();
        assert_eq!(
            vars,
            vec![
                ("cc_flags", vec!["-O0".to_owned(), "-DDEBUG".to_owned(), "-Iinc".to_owned()]),
                ("as_flags", vec![]),
                ("ld_flags", vec!["-DDEBUG".to_owned()]),
                ("size_flags", vec!["-DDEBUG".to_owned()]),
            ]
        );
        let tracking: Vec<_> = graph.rules.iter().map(|r| r.dependency_tracking).collect();
        assert_eq!(tracking, vec![true, false, false, false]);
        Ok(())
    }

    #[rstest]
    fn linker_gets_extra_flags_variable(toolchain: Toolchain) -> Result<(), GraphError> {
        let config = Configuration {
            extra_linker_flags: vec!["-lm".into()],
            ..Configuration::default()
        };
        let product = Product::new(Utf8Path::new("build"), "out");
        let graph = BuildGraph::new(&toolchain, &config, &product, &[])?;
        let ld = graph.rules.iter().find(|r| r.name == "LD");
        assert_eq!(
            ld.and_then(|r| r.extra_flags_var.as_deref()),
            Some(EXTRA_LINKER_FLAGS_VAR)
        );
        assert!(graph.variables.iter().any(|v| v.name == EXTRA_LINKER_FLAGS_VAR && v.values == ["-lm"]));
        Ok(())
    }

    #[rstest]
    fn link_consumes_every_object(toolchain: Toolchain, config: Configuration) -> Result<(), GraphError> {
        let product = Product::new(Utf8Path::new("build/debug"), "out");
        let sources = [source("src/a.c", ToolRole::CCompiler), source("src/start.s", ToolRole::Assembler)];
        let graph = BuildGraph::new(&toolchain, &config, &product, &sources)?;
        assert_eq!(
            graph.link.inputs,
            vec![
                Utf8PathBuf::from("build/debug/obj/src/a.c.o"),
                Utf8PathBuf::from("build/debug/obj/src/start.s.o"),
            ]
        );
        assert_eq!(graph.link.output, Utf8PathBuf::from("build/debug/out"));
        assert_eq!(graph.alias, "out");
        Ok(())
    }

    #[rstest]
    fn undeclared_compiler_is_reported(toolchain: Toolchain, config: Configuration) {
        let product = Product::new(Utf8Path::new("build"), "out");
        let sources = [source("src/a.cpp", ToolRole::CxxCompiler)];
        let err = BuildGraph::new(&toolchain, &config, &product, &sources);
        assert!(matches!(
            err,
            Err(GraphError::MissingTool { tool: ToolRole::CxxCompiler, .. })
        ));
    }

    #[rstest]
    fn missing_linker_is_reported(config: Configuration) {
        let toolchain = Toolchain {
            root: None,
            tools: Some([("CC".to_owned(), "cc".to_owned())].into_iter().collect()),
        };
        let product = Product::new(Utf8Path::new(""), "out");
        let err = BuildGraph::new(&toolchain, &config, &product, &[]);
        assert!(matches!(err, Err(GraphError::MissingTool { tool: ToolRole::Linker, .. })));
    }

    #[rstest]
    #[case("src/a.c", "build/obj/src/a.c.o")]
    #[case("/abs/src/a.c", "build/obj/abs/src/a.c.o")]
    #[case("../shared/b.c", "build/obj/__/shared/b.c.o")]
    #[case("./c.S", "build/obj/c.S.o")]
    fn object_paths_stay_below_object_dir(#[case] src: &str, #[case] expected: &str) {
        let product = Product::new(Utf8Path::new("build"), "out");
        assert_eq!(product.object_for(Utf8Path::new(src)), Utf8PathBuf::from(expected));
    }
}
