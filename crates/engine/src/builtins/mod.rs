//! Built-in function libraries.
//!
//! Each library is a static table of declared functions. Source text shown
//! in panels is sliced out of the library's own file at compile time.

pub mod graph;
pub mod math;

use std::rc::Rc;

use crate::fixture::FixtureSet;
use crate::registry::{FunctionEntry, FunctionError, FunctionInfo, FunctionSource, ParameterInfo};
use crate::value::{Shape, Value};

pub type BuiltinFn = fn(&[Value]) -> Result<Value, FunctionError>;

/// Static parameter descriptor.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub shape: Shape,
    pub description: &'static str,
    pub optional: bool,
    pub repeatable: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, shape: Shape, description: &'static str) -> Self {
        Self { name, shape, description, optional: false, repeatable: false }
    }

    pub const fn optional(name: &'static str, shape: Shape, description: &'static str) -> Self {
        Self { name, shape, description, optional: true, repeatable: false }
    }

    fn to_info(self) -> ParameterInfo {
        let mut info = ParameterInfo::new(self.name, self.shape).describe(self.description);
        info.optional = self.optional;
        info.repeatable = self.repeatable;
        info
    }
}

/// Declared built-in function.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub doc: &'static str,
    pub params: &'static [ParamSpec],
    pub func: BuiltinFn,
}

fn to_source(library: &str, file: &str, table: &[Builtin]) -> FunctionSource {
    let mut source = FunctionSource::new(library);
    for b in table {
        let info = FunctionInfo {
            name: b.name.to_string(),
            documentation: b.doc.to_string(),
            parameters: b.params.iter().map(|p| p.to_info()).collect(),
            source: source_of(file, b.name),
            origin: library.to_string(),
        };
        source.insert(FunctionEntry::new(info, Rc::new(b.func)));
    }
    source
}

/// Slice one top-level function out of a Rust file: its doc lines, its
/// signature, and everything up to the closing brace in column 0.
pub fn source_of(file: &str, name: &str) -> String {
    let lines: Vec<&str> = file.lines().collect();
    let needle = format!("fn {name}(");

    let Some(start) = lines
        .iter()
        .position(|l| l.starts_with(&format!("pub {needle}")) || l.starts_with(&needle))
    else {
        return String::new();
    };

    let mut first = start;
    while first > 0 && lines[first - 1].trim_start().starts_with("///") {
        first -= 1;
    }

    let end = lines[start..]
        .iter()
        .position(|l| *l == "}")
        .map(|offset| start + offset)
        .unwrap_or(lines.len() - 1);

    lines[first..=end].join("\n")
}

pub fn math_source() -> FunctionSource {
    to_source("math", math::SOURCE, math::FUNCTIONS)
}

pub fn graph_source() -> FunctionSource {
    to_source("graph", graph::SOURCE, graph::FUNCTIONS)
}

/// Every built-in library as one source, math first. Entries keep their
/// library as origin.
pub fn builtin_source() -> FunctionSource {
    let mut source = FunctionSource::new("builtin");
    for entry in math_source().into_iter().chain(graph_source()) {
        source.insert(entry);
    }
    source
}

/// Fixtures for every built-in library.
pub fn fixtures() -> FixtureSet {
    let mut set = math::fixtures();
    set.extend(graph::fixtures());
    set
}

// ============================================================================
// Argument helpers shared by the libraries
// ============================================================================

pub(crate) fn num(args: &[Value], i: usize) -> Result<f64, FunctionError> {
    args.get(i)
        .and_then(Value::as_f64)
        .ok_or_else(|| FunctionError::new(format!("argument {} must be a number", i + 1)))
}

pub(crate) fn opt_num(args: &[Value], i: usize, default: f64) -> Result<f64, FunctionError> {
    match args.get(i) {
        None | Some(Value::Null) => Ok(default),
        Some(_) => num(args, i),
    }
}

pub(crate) fn text(args: &[Value], i: usize) -> Result<&str, FunctionError> {
    args.get(i)
        .and_then(Value::as_str)
        .ok_or_else(|| FunctionError::new(format!("argument {} must be text", i + 1)))
}

pub(crate) fn seq(args: &[Value], i: usize) -> Result<&[Value], FunctionError> {
    args.get(i)
        .and_then(Value::as_sequence)
        .ok_or_else(|| FunctionError::new(format!("argument {} must be a sequence", i + 1)))
}

pub(crate) fn numbers(items: &[Value]) -> Result<Vec<f64>, FunctionError> {
    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64()
                .ok_or_else(|| FunctionError::new(format!("item {i} is {}, not a number", v.kind_name())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::run_fixture;
    use crate::registry::Registry;

    #[test]
    fn source_of_includes_doc_and_body() {
        let file = "/// Adds.\npub fn add(a: i32) -> i32 {\n    a\n}\n\nfn other() {}\n";
        assert_eq!(source_of(file, "add"), "/// Adds.\npub fn add(a: i32) -> i32 {\n    a\n}");
        assert_eq!(source_of(file, "missing"), "");
    }

    #[test]
    fn every_builtin_has_source_text() {
        for entry in math_source().iter().chain(graph_source().iter()) {
            assert!(
                entry.info.source.contains(&format!("fn {}(", entry.name())),
                "no source for {}",
                entry.name()
            );
        }
    }

    #[test]
    fn every_builtin_fixture_passes() {
        let registry = Registry::merge(Some(math_source()), Some(graph_source()));
        let fixtures = fixtures();
        let mut checked = 0;
        for entry in registry.iter() {
            if let Some(fixture) = fixtures.get(entry.name()) {
                let report = run_fixture(entry, fixture);
                assert!(report.passed, "{} failed:\n{}", entry.name(), report.detail());
                checked += 1;
            }
        }
        assert_eq!(checked, fixtures.len());
    }

    #[test]
    fn builtin_source_keeps_library_origin() {
        let source = builtin_source();
        assert_eq!(source.len(), math_source().len() + graph_source().len());
        assert_eq!(source.get("add").unwrap().info.origin, "math");
        assert_eq!(source.get("neighbors").unwrap().info.origin, "graph");
        assert_eq!(source.iter().next().unwrap().name(), "add");
    }

    #[test]
    fn library_names_do_not_collide() {
        let math = math_source();
        for entry in graph_source().iter() {
            assert!(math.get(entry.name()).is_none(), "{} defined twice", entry.name());
        }
    }
}
