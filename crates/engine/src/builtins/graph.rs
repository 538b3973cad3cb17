// Graph and layout helpers
//
// Graphs are adjacency mappings: `{"a": ["b", "c"], "b": [], ...}`. Node
// order follows the mapping's key order, neighbor order follows the lists.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use super::{numbers, opt_num, seq, text, Builtin, ParamSpec};
use crate::fixture::{approx_eq, Fixture, FixtureSet};
use crate::registry::FunctionError;
use crate::value::{Shape, Value};

pub const SOURCE: &str = include_str!("graph.rs");

pub static FUNCTIONS: &[Builtin] = &[
    Builtin {
        name: "neighbors",
        doc: "Nodes reachable from `node` by one edge.",
        params: &[
            ParamSpec::required("graph", Shape::Mapping, "Adjacency mapping."),
            ParamSpec::required("node", Shape::Text, "Node name."),
        ],
        func: neighbors,
    },
    Builtin {
        name: "degree",
        doc: "Out-degree of a node.",
        params: &[
            ParamSpec::required("graph", Shape::Mapping, "Adjacency mapping."),
            ParamSpec::required("node", Shape::Text, "Node name."),
        ],
        func: degree,
    },
    Builtin {
        name: "edge_count",
        doc: "Number of directed edges in the graph.",
        params: &[ParamSpec::required("graph", Shape::Mapping, "Adjacency mapping.")],
        func: edge_count,
    },
    Builtin {
        name: "shortest_path",
        doc: "Fewest-edge path between two nodes, or null when unreachable.",
        params: &[
            ParamSpec::required("graph", Shape::Mapping, "Adjacency mapping."),
            ParamSpec::required("from", Shape::Text, "Start node."),
            ParamSpec::required("to", Shape::Text, "Target node."),
        ],
        func: shortest_path,
    },
    Builtin {
        name: "bar_layout",
        doc: "Bar rectangles for a list of values, scaled into a width x height box.",
        params: &[
            ParamSpec::required("values", Shape::Sequence, "Non-negative bar values."),
            ParamSpec::optional("width", Shape::Number, "Box width (default 300)."),
            ParamSpec::optional("height", Shape::Number, "Box height (default 100)."),
        ],
        func: bar_layout,
    },
    Builtin {
        name: "element_info",
        doc: "Describes a page element selected with {\"_selector\": \"...\"}.",
        params: &[ParamSpec::required("selection", Shape::Element, "Element reference.")],
        func: element_info,
    },
];

type Adjacency = Vec<(String, Vec<String>)>;

fn adjacency(args: &[Value], i: usize) -> Result<Adjacency, FunctionError> {
    let Some(Value::Mapping(entries)) = args.get(i) else {
        return Err(FunctionError::new(format!("argument {} must be a mapping", i + 1)));
    };

    let mut out = Vec::with_capacity(entries.len());
    for (node, targets) in entries {
        let targets = targets.as_sequence().ok_or_else(|| {
            FunctionError::new(format!("neighbors of '{node}' must be a sequence"))
        })?;
        let names = targets
            .iter()
            .map(|t| match t {
                Value::Text(s) => Ok(s.clone()),
                other => Err(FunctionError::new(format!(
                    "neighbor of '{node}' is {}, not text",
                    other.kind_name()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        out.push((node.clone(), names));
    }
    Ok(out)
}

fn targets_of<'a>(graph: &'a Adjacency, node: &str) -> Result<&'a [String], FunctionError> {
    graph
        .iter()
        .find(|(n, _)| n == node)
        .map(|(_, t)| t.as_slice())
        .ok_or_else(|| FunctionError::new(format!("unknown node '{node}'")))
}

/// Direct successors of a node.
pub fn neighbors(args: &[Value]) -> Result<Value, FunctionError> {
    let graph = adjacency(args, 0)?;
    let targets = targets_of(&graph, text(args, 1)?)?;
    Ok(Value::Sequence(targets.iter().map(|t| Value::text(t.as_str())).collect()))
}

/// Out-degree of a node.
pub fn degree(args: &[Value]) -> Result<Value, FunctionError> {
    let graph = adjacency(args, 0)?;
    Ok(Value::Number(targets_of(&graph, text(args, 1)?)?.len() as f64))
}

/// Total directed edges.
pub fn edge_count(args: &[Value]) -> Result<Value, FunctionError> {
    let graph = adjacency(args, 0)?;
    Ok(Value::Number(graph.iter().map(|(_, t)| t.len()).sum::<usize>() as f64))
}

/// Breadth-first search from `from` to `to`.
pub fn shortest_path(args: &[Value]) -> Result<Value, FunctionError> {
    let graph = adjacency(args, 0)?;
    let (from, to) = (text(args, 1)?, text(args, 2)?);
    targets_of(&graph, from)?;

    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    parent.insert(from, from);

    while let Some(node) = queue.pop_front() {
        if node == to {
            let mut path = vec![node];
            let mut cur = node;
            while cur != from {
                cur = parent[cur];
                path.push(cur);
            }
            path.reverse();
            return Ok(Value::Sequence(path.into_iter().map(Value::text).collect()));
        }
        // Nodes that only appear as targets have no outgoing edges
        let targets = graph.iter().find(|(n, _)| n == node).map(|(_, t)| t.as_slice()).unwrap_or(&[]);
        for next in targets {
            if !parent.contains_key(next.as_str()) {
                parent.insert(next.as_str(), node);
                queue.push_back(next.as_str());
            }
        }
    }
    Ok(Value::Null)
}

/// Band layout: equal-width bars, heights scaled to the largest value.
pub fn bar_layout(args: &[Value]) -> Result<Value, FunctionError> {
    let values = numbers(seq(args, 0)?)?;
    let width = opt_num(args, 1, 300.0)?;
    let height = opt_num(args, 2, 100.0)?;
    if values.iter().any(|v| *v < 0.0) {
        return Err(FunctionError::new("bar values must be non-negative"));
    }
    if values.is_empty() {
        return Ok(Value::Sequence(Vec::new()));
    }

    let band = width / values.len() as f64;
    let max = values.iter().copied().fold(0.0, f64::max);
    let bars = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let h = if max > 0.0 { v / max * height } else { 0.0 };
            Value::mapping([
                ("x", Value::Number(band * i as f64)),
                ("y", Value::Number(height - h)),
                ("width", Value::Number(band)),
                ("height", Value::Number(h)),
            ])
        })
        .collect();
    Ok(Value::Sequence(bars))
}

/// Summary of a selected element.
pub fn element_info(args: &[Value]) -> Result<Value, FunctionError> {
    let Some(Value::Element(selection)) = args.first() else {
        return Err(FunctionError::new("argument 1 must be an element"));
    };
    let Some(el) = &selection.element else {
        return Ok(Value::mapping([
            ("selector", Value::text(selection.selector.as_str())),
            ("found", Value::Bool(false)),
        ]));
    };
    Ok(Value::mapping([
        ("selector", Value::text(selection.selector.as_str())),
        ("found", Value::Bool(true)),
        ("tag", Value::text(el.tag.as_str())),
        ("id", el.id.clone().map(Value::Text).unwrap_or(Value::Null)),
        ("classes", Value::Sequence(el.classes.iter().map(|c| Value::text(c.as_str())).collect())),
        ("text", Value::text(el.text.as_str())),
    ]))
}

fn sample_graph() -> Value {
    let list = |names: &[&str]| Value::Sequence(names.iter().map(|n| Value::text(*n)).collect());
    Value::mapping([
        ("a", list(&["b", "c"])),
        ("b", list(&["d"])),
        ("c", list(&["d"])),
        ("d", list(&[])),
    ])
}

fn within_tolerance(actual: &Value, expected: &Value) -> Result<bool, FunctionError> {
    Ok(approx_eq(actual, expected, 1e-9))
}

pub fn fixtures() -> FixtureSet {
    let mut set = FixtureSet::new();
    set.insert(
        "neighbors",
        Fixture::new(
            vec![vec![sample_graph(), Value::text("a")]],
            Value::Sequence(vec![Value::text("b"), Value::text("c")]),
        ),
    );
    set.insert("degree", Fixture::new(vec![vec![sample_graph(), Value::text("a")]], Value::Number(2.0)));
    set.insert("edge_count", Fixture::new(vec![vec![sample_graph()]], Value::Number(4.0)));
    set.insert(
        "shortest_path",
        Fixture::new(
            vec![vec![sample_graph(), Value::text("a"), Value::text("d")]],
            Value::Sequence(vec![Value::text("a"), Value::text("b"), Value::text("d")]),
        ),
    );
    // Thirds of 100 are not exact; compare within a tolerance and show the
    // bar heights only.
    let bar = |x: f64, y: f64, w: f64, h: f64| {
        Value::mapping([
            ("x", Value::Number(x)),
            ("y", Value::Number(y)),
            ("width", Value::Number(w)),
            ("height", Value::Number(h)),
        ])
    };
    let third = 100.0 / 3.0;
    set.insert(
        "bar_layout",
        Fixture::new(
            vec![vec![
                Value::Sequence(vec![Value::Number(1.0), Value::Number(3.0), Value::Number(2.0)]),
                Value::Number(100.0),
                Value::Number(60.0),
            ]],
            Value::Sequence(vec![
                bar(0.0, 40.0, third, 20.0),
                bar(third, 0.0, third, 60.0),
                bar(2.0 * third, 20.0, third, 40.0),
            ]),
        )
        .with_assert(Rc::new(within_tolerance))
        .with_describer(Rc::new(|actual: &Value, _: &Value, _: &[Value]| -> Result<Value, FunctionError> {
            let bars = actual
                .as_sequence()
                .ok_or_else(|| FunctionError::new("layout is not a sequence"))?;
            let heights = bars
                .iter()
                .map(|b| b.get("height").cloned().unwrap_or(Value::Null))
                .collect();
            Ok(Value::mapping([("heights", Value::Sequence(heights))]))
        })),
    );
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{Element, Page};

    #[test]
    fn unknown_node_is_error() {
        let err = neighbors(&[sample_graph(), Value::text("zz")]).unwrap_err();
        assert_eq!(err.message, "unknown node 'zz'");
    }

    #[test]
    fn non_text_neighbor_is_error() {
        let graph = Value::mapping([("a", Value::Sequence(vec![Value::Number(1.0)]))]);
        assert!(edge_count(&[graph]).is_err());
    }

    #[test]
    fn unreachable_is_null() {
        assert_eq!(
            shortest_path(&[sample_graph(), Value::text("d"), Value::text("a")]).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn path_to_self() {
        let path = shortest_path(&[sample_graph(), Value::text("b"), Value::text("b")]).unwrap();
        assert_eq!(path.to_json_string(), r#"["b"]"#);
    }

    #[test]
    fn path_through_target_only_node() {
        let list = |names: &[&str]| Value::Sequence(names.iter().map(|n| Value::text(*n)).collect());
        let graph = Value::mapping([("a", list(&["x"]))]);
        let path = shortest_path(&[graph, Value::text("a"), Value::text("x")]).unwrap();
        assert_eq!(path.to_json_string(), r#"["a","x"]"#);
    }

    #[test]
    fn bar_layout_defaults_and_zeros() {
        let out = bar_layout(&[Value::Sequence(vec![Value::Number(0.0), Value::Number(0.0)])]).unwrap();
        assert_eq!(
            out.to_json_string(),
            r#"[{"x":0,"y":100,"width":150,"height":0},{"x":150,"y":100,"width":150,"height":0}]"#
        );
        assert!(bar_layout(&[Value::Sequence(vec![Value::Number(-1.0)])]).is_err());
    }

    #[test]
    fn bar_layout_describer_shows_heights() {
        let fixtures = fixtures();
        let report = crate::fixture::run_fixture(
            crate::builtins::graph_source().get("bar_layout").unwrap(),
            fixtures.get("bar_layout").unwrap(),
        );
        assert!(report.passed);
        assert_eq!(report.actual.to_json_string(), r#"{"heights":[20,60,40]}"#);
    }

    #[test]
    fn element_info_found_and_missing() {
        let page = Page::new().with_element(Element::new("svg").with_id("test-svg").with_class("chart"));
        let found = element_info(&[Value::Element(page.select("#test-svg"))]).unwrap();
        assert_eq!(found.get("tag"), Some(&Value::text("svg")));
        assert_eq!(found.get("found"), Some(&Value::Bool(true)));

        let missing = element_info(&[Value::Element(page.select("#nope"))]).unwrap();
        assert_eq!(missing.get("found"), Some(&Value::Bool(false)));
    }
}
