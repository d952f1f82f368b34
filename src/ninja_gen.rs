//! Ninja file generator.
//!
//! This module converts a [`crate::graph::BuildGraph`] into the textual
//! representation expected by the Ninja build system. Sections are emitted in
//! a fixed order: required version, flag variables, rules, object edges, the
//! link edge, and finally the phony alias with its `default` declaration. The
//! alias is omitted when the product already sits at that path.
//! Paths and flags are escaped so spaces, `$` and `:` keep their literal
//! meaning.

use crate::graph::{BuildEdge, BuildGraph, Rule, Variable};
use camino::Utf8Path;
use itertools::Itertools;
use shell_quote::{QuoteRefExt, Sh};
use std::fmt::{self, Display, Formatter};

/// Minimum Ninja version understood by the generated file.
pub const REQUIRED_VERSION: &str = "1.3";

/// Separator placing each list element on its own continuation line.
const CONTINUATION: &str = " $\n  ";

macro_rules! write_kv {
    ($f:expr, $key:expr, $val:expr) => {
        writeln!($f, "  {} = {}", $key, $val)?;
    };
}

macro_rules! write_section {
    ($f:expr, $title:expr) => {
        writeln!($f, "#\n# {}\n#", $title)?;
    };
}

/// Generate a Ninja build file as a string.
///
/// ```
/// use camino::Utf8Path;
/// use crossbuild::config::{Configuration, Toolchain};
/// use crossbuild::graph::{BuildGraph, Product};
/// use crossbuild::ninja_gen::generate;
///
/// let tools = [("LD".to_owned(), "/bin/ld".to_owned())].into_iter().collect();
/// let toolchain = Toolchain { root: None, tools: Some(tools) };
/// let product = Product::new(Utf8Path::new("build"), "fw");
/// let graph = BuildGraph::new(&toolchain, &Configuration::default(), &product, &[])?;
/// let ninja = generate(&graph);
/// assert!(ninja.starts_with("ninja_required_version = 1.3\n"));
/// assert!(ninja.ends_with("build fw: phony build/fw\ndefault fw\n"));
/// # Ok::<(), crossbuild::graph::GraphError>(())
/// ```
#[must_use]
pub fn generate(graph: &BuildGraph) -> String {
    graph_text(graph).to_string()
}

/// Borrowing [`Display`] adapter over a whole graph.
#[must_use]
pub const fn graph_text(graph: &BuildGraph) -> DisplayGraph<'_> {
    DisplayGraph { graph }
}

/// Escape `text` for use as a path or flag in a Ninja file.
///
/// ```
/// use crossbuild::ninja_gen::escape;
/// assert_eq!(escape("src/my file.c"), "src/my$ file.c");
/// assert_eq!(escape("C:/a$b"), "C$:/a$$b");
/// ```
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, ' ' | '$' | ':') {
            out.push('$');
        }
        out.push(ch);
    }
    out
}

/// Quote an executable path for the shell, then escape Ninja's `$`.
fn command_program(program: &Utf8Path) -> String {
    let text = program.as_str();
    let needs_quotes = text.is_empty()
        || text
            .chars()
            .any(|ch| !(ch.is_ascii_alphanumeric() || "/._-+:=,@%".contains(ch)));
    let quoted = if needs_quotes {
        let bytes: Vec<u8> = text.quoted(Sh);
        String::from_utf8_lossy(&bytes).into_owned()
    } else {
        text.to_owned()
    };
    quoted.replace('$', "$$")
}

fn join_escaped<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    items.into_iter().map(escape).join(CONTINUATION)
}

/// Wrapper struct to display a whole graph.
pub struct DisplayGraph<'a> {
    graph: &'a BuildGraph,
}

impl Display for DisplayGraph<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let graph = self.graph;
        writeln!(f, "ninja_required_version = {REQUIRED_VERSION}")?;
        writeln!(f)?;
        write_section!(f, "toolchain");
        for variable in &graph.variables {
            write!(f, "{}", DisplayVariable { variable })?;
        }
        for rule in &graph.rules {
            write!(f, "{}", DisplayRule { rule })?;
        }

        writeln!(f)?;
        write_section!(f, "sources -> objects");
        for edge in &graph.objects {
            write!(f, "{}", DisplayEdge { edge })?;
        }

        writeln!(f)?;
        write_section!(f, "target bin");
        write!(f, "{}", DisplayEdge { edge: &graph.link })?;

        writeln!(f)?;
        write_section!(f, "named target");
        let alias = escape(&graph.alias);
        let product = escape(graph.link.output.as_str());
        // A product in the working directory already carries the alias name.
        if alias != product {
            writeln!(f, "build {alias}: phony {product}")?;
        }
        writeln!(f, "default {alias}")
    }
}

struct DisplayVariable<'a> {
    variable: &'a Variable,
}

impl Display for DisplayVariable<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let values = join_escaped(self.variable.values.iter().map(String::as_str));
        if values.is_empty() {
            writeln!(f, "{} =", self.variable.name)?;
        } else {
            writeln!(f, "{} = {values}", self.variable.name)?;
        }
        writeln!(f)
    }
}

struct DisplayRule<'a> {
    rule: &'a Rule,
}

impl Display for DisplayRule<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rule = self.rule;
        writeln!(f, "rule {}", rule.name)?;
        let mut command = format!("{} ${}", command_program(&rule.program), rule.flags_var);
        if rule.dependency_tracking {
            write_kv!(f, "depfile", "$out.d");
            write_kv!(f, "deps", "gcc");
            command.push_str(" -MMD -MF $out.d -c");
        }
        command.push_str(" $in");
        if let Some(extra) = &rule.extra_flags_var {
            command.push_str(" $");
            command.push_str(extra);
        }
        command.push_str(" -o $out");
        write_kv!(f, "command", command);
        writeln!(f)
    }
}

/// Wrapper struct to display a build edge.
struct DisplayEdge<'a> {
    edge: &'a BuildEdge,
}

impl Display for DisplayEdge<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "build {}: {}", escape(self.edge.output.as_str()), self.edge.rule)?;
        if !self.edge.inputs.is_empty() {
            let inputs = join_escaped(self.edge.inputs.iter().map(|p| p.as_str()));
            write!(f, " {inputs}")?;
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, ToolRole, Toolchain};
    use crate::graph::{GraphError, Product};
    use crate::sources::SourceFile;
    use rstest::{fixture, rstest};

    #[fixture]
    fn gcc() -> Toolchain {
        Toolchain {
            root: Some("/usr/bin".into()),
            tools: Some(
                [("CC", "gcc"), ("LD", "ld")]
                    .into_iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect(),
            ),
        }
    }

    fn c_source(path: &str) -> SourceFile {
        SourceFile {
            path: path.into(),
            role: ToolRole::CCompiler,
        }
    }

    #[rstest]
    fn generate_debug_app(gcc: Toolchain) -> Result<(), GraphError> {
        let config = Configuration {
            defines: vec!["DEBUG".into()],
            include_paths: vec!["inc".into()],
            product_dir: Some("build/debug".into()),
            ..Configuration::default()
        };
        let product = Product::new(Utf8Path::new("build/debug"), "out");
        let sources = [c_source("src/a.c"), c_source("src/b.c")];
        let graph = BuildGraph::new(&gcc, &config, &product, &sources)?;

        let expected = concat!(
            "ninja_required_version = 1.3\n",
            "\n",
            "#\n# toolchain\n#\n",
            "cc_flags = -DDEBUG $\n  -Iinc\n\n",
            "ld_flags = -DDEBUG\n\n",
            "rule CC\n",
            "  depfile = $out.d\n",
            "  deps = gcc\n",
            "  command = /usr/bin/gcc $cc_flags -MMD -MF $out.d -c $in -o $out\n\n",
            "rule LD\n",
            "  command = /usr/bin/ld $ld_flags $in -o $out\n\n",
            "\n#\n# sources -> objects\n#\n",
            "build build/debug/obj/src/a.c.o: CC src/a.c\n",
            "build build/debug/obj/src/b.c.o: CC src/b.c\n",
            "\n#\n# target bin\n#\n",
            "build build/debug/out: LD build/debug/obj/src/a.c.o $\n  build/debug/obj/src/b.c.o\n",
            "\n#\n# named target\n#\n",
            "build out: phony build/debug/out\n",
            "default out\n",
        );
        assert_eq!(generate(&graph), expected);
        Ok(())
    }

    #[rstest]
    fn paths_with_spaces_are_escaped(gcc: Toolchain) -> Result<(), GraphError> {
        let product = Product::new(Utf8Path::new("build"), "out");
        let graph = BuildGraph::new(&gcc, &Configuration::default(), &product, &[c_source("src/my file.c")])?;
        let ninja = generate(&graph);
        assert!(ninja.contains("build build/obj/src/my$ file.c.o: CC src/my$ file.c\n"));
        assert!(ninja.contains("build build/out: LD build/obj/src/my$ file.c.o\n"));
        Ok(())
    }

    #[rstest]
    fn linker_extra_flags_follow_inputs(gcc: Toolchain) -> Result<(), GraphError> {
        let config = Configuration {
            extra_linker_flags: vec!["-lc".into(), "-lm".into()],
            ..Configuration::default()
        };
        let product = Product::new(Utf8Path::new(""), "out");
        let ninja = generate(&BuildGraph::new(&gcc, &config, &product, &[])?);
        assert!(ninja.contains("ld_extra_flags = -lc $\n  -lm\n\n"));
        assert!(ninja.contains("  command = /usr/bin/ld $ld_flags $in $ld_extra_flags -o $out\n"));
        Ok(())
    }

    #[rstest]
    fn product_in_working_dir_has_no_self_alias(gcc: Toolchain) -> Result<(), GraphError> {
        let product = Product::new(Utf8Path::new(""), "out");
        let ninja = generate(&BuildGraph::new(&gcc, &Configuration::default(), &product, &[c_source("main.c")])?);
        let outputs: Vec<&str> = ninja.lines().filter(|line| line.starts_with("build out")).collect();
        assert_eq!(outputs, ["build out: LD obj/main.c.o"]);
        assert!(ninja.ends_with("#\n# named target\n#\ndefault out\n"));
        Ok(())
    }

    #[rstest]
    fn flags_with_sigils_are_escaped(gcc: Toolchain) -> Result<(), GraphError> {
        let config = Configuration {
            defines: vec!["PRICE=$5".into()],
            include_paths: vec!["my inc".into()],
            ..Configuration::default()
        };
        let product = Product::new(Utf8Path::new(""), "out");
        let ninja = generate(&BuildGraph::new(&gcc, &config, &product, &[])?);
        assert!(ninja.contains("cc_flags = -DPRICE=$$5 $\n  -Imy$ inc\n"));
        Ok(())
    }

    #[rstest]
    fn plain_program_is_not_quoted() {
        assert_eq!(command_program(Utf8Path::new("/usr/bin/arm-none-eabi-gcc")), "/usr/bin/arm-none-eabi-gcc");
    }

    #[rstest]
    fn program_with_space_is_quoted() {
        let program = command_program(Utf8Path::new("/opt/my tools/gcc"));
        assert_ne!(program, "/opt/my tools/gcc");
        assert!(program.contains("my"));
    }

    #[rstest]
    fn program_sigil_is_doubled() {
        assert!(command_program(Utf8Path::new("/opt/$HOME/gcc")).contains("$$HOME"));
    }
}
