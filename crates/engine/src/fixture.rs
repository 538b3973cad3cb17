//! Test fixtures: self-checks attached to registered functions by name.
//!
//! A fixture's first input set is fed to the function, the result is
//! compared with the expected value, and the outcome is reported as a
//! `TestReport`. Nothing here returns an error to the caller: failures
//! during invocation, comparison or description end up in the report.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use serde::Deserialize;

use crate::registry::{FunctionEntry, FunctionError};
use crate::value::Value;

/// Custom equality: `(actual, expected) -> passed`.
pub type Predicate = Rc<dyn Fn(&Value, &Value) -> Result<bool, FunctionError>>;

/// Reformats the actual value for display: `(actual, expected, input_set)`.
pub type Describer = Rc<dyn Fn(&Value, &Value, &[Value]) -> Result<Value, FunctionError>>;

#[derive(Clone)]
pub struct Fixture {
    /// Input sets; only the first one is run.
    pub inputs: Vec<Vec<Value>>,
    pub expected: Value,
    pub assert: Option<Predicate>,
    pub describe_actual: Option<Describer>,
    /// Spread the input set across positional arguments (default), or pass
    /// it as one sequence argument.
    pub spread: bool,
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixture")
            .field("inputs", &self.inputs)
            .field("expected", &self.expected)
            .field("assert", &self.assert.is_some())
            .field("describe_actual", &self.describe_actual.is_some())
            .field("spread", &self.spread)
            .finish()
    }
}

impl Fixture {
    pub fn new(inputs: Vec<Vec<Value>>, expected: Value) -> Self {
        Self {
            inputs,
            expected,
            assert: None,
            describe_actual: None,
            spread: true,
        }
    }

    pub fn with_assert(mut self, predicate: Predicate) -> Self {
        self.assert = Some(predicate);
        self
    }

    pub fn with_describer(mut self, describer: Describer) -> Self {
        self.describe_actual = Some(describer);
        self
    }

    /// Pass the input set as a single argument.
    pub fn unspread(mut self) -> Self {
        self.spread = false;
        self
    }
}

/// Name → fixture table.
#[derive(Debug, Clone, Default)]
pub struct FixtureSet {
    fixtures: HashMap<String, Fixture>,
}

impl FixtureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, fixture: Fixture) {
        self.fixtures.insert(name.into(), fixture);
    }

    pub fn get(&self, name: &str) -> Option<&Fixture> {
        self.fixtures.get(name)
    }

    /// Add every fixture from `other`, replacing same-named ones.
    pub fn extend(&mut self, other: FixtureSet) {
        self.fixtures.extend(other.fixtures);
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }
}

// ============================================================================
// Running
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub passed: bool,
    /// The input set that was run
    pub input: Value,
    pub expected: Value,
    /// Actual value as displayed (after the describer, if any)
    pub actual: Value,
}

impl TestReport {
    pub fn badge(&self) -> &'static str {
        if self.passed {
            "✅ Test Passed"
        } else {
            "❌ Test Failed"
        }
    }

    /// Input / expected / actual block.
    pub fn detail(&self) -> String {
        format!(
            "Test Input:\n{}\nExpected:\n{}\nActual:\n{}",
            self.input.to_pretty_json(),
            self.expected.to_pretty_json(),
            self.actual.to_pretty_json(),
        )
    }
}

fn error_value(message: impl Into<String>) -> Value {
    Value::mapping([("error", Value::Text(message.into()))])
}

/// Run a fixture against a function. Never fails; problems are reported as
/// a failed test with the error standing in for the actual value.
pub fn run_fixture(entry: &FunctionEntry, fixture: &Fixture) -> TestReport {
    let input_set: Vec<Value> = fixture.inputs.first().cloned().unwrap_or_default();

    let outcome: Result<(bool, Value), String> = if fixture.inputs.is_empty() {
        Err("fixture has no input sets".to_string())
    } else {
        let args = if fixture.spread {
            input_set.clone()
        } else {
            vec![Value::Sequence(input_set.clone())]
        };

        entry.invoke(&args).map_err(|e| e.to_string()).and_then(|output| {
            let passed = match &fixture.assert {
                Some(predicate) => predicate(&output, &fixture.expected).map_err(|e| e.to_string())?,
                None => output.structurally_eq(&fixture.expected),
            };
            Ok((passed, output))
        })
    };

    let (passed, output) = match outcome {
        Ok(pair) => pair,
        Err(message) => {
            log::debug!("fixture for {} errored: {}", entry.name(), message);
            (false, error_value(message))
        }
    };

    let actual = match &fixture.describe_actual {
        Some(describe) => match describe(&output, &fixture.expected, &input_set) {
            Ok(described) => described,
            Err(e) => Value::mapping([
                ("error", Value::text("describeActual() threw error")),
                ("message", Value::Text(e.message)),
            ]),
        },
        None => output,
    };

    log::debug!("fixture for {}: {}", entry.name(), if passed { "pass" } else { "fail" });

    TestReport {
        passed,
        input: Value::Sequence(input_set),
        expected: fixture.expected.clone(),
        actual,
    }
}

// ============================================================================
// Fixture files
// ============================================================================

#[derive(Debug)]
pub enum FixtureLoadError {
    Io(String),
    Parse(String),
}

impl fmt::Display for FixtureLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "cannot read fixtures: {msg}"),
            Self::Parse(msg) => write!(f, "invalid fixtures file: {msg}"),
        }
    }
}

impl std::error::Error for FixtureLoadError {}

/// On-disk fixture. Values are plain JSON.
#[derive(Debug, Deserialize)]
struct FixtureSpec {
    inputs: Vec<Vec<serde_json::Value>>,
    expected: serde_json::Value,
    #[serde(default = "default_spread")]
    spread: bool,
    /// Compare numbers within this absolute tolerance instead of exactly.
    #[serde(default)]
    tolerance: Option<f64>,
}

fn default_spread() -> bool {
    true
}

/// Parse a JSON fixtures document: `{ "name": { "inputs": [[..]], "expected": .. } }`.
pub fn parse_fixtures(json: &str) -> Result<FixtureSet, FixtureLoadError> {
    let specs: HashMap<String, FixtureSpec> =
        serde_json::from_str(json).map_err(|e| FixtureLoadError::Parse(e.to_string()))?;

    let mut set = FixtureSet::new();
    for (name, spec) in specs {
        let inputs = spec
            .inputs
            .iter()
            .map(|set| set.iter().map(Value::from_json).collect())
            .collect();
        let mut fixture = Fixture::new(inputs, Value::from_json(&spec.expected));
        fixture.spread = spec.spread;
        if let Some(tol) = spec.tolerance {
            let predicate = move |actual: &Value, expected: &Value| -> Result<bool, FunctionError> {
                Ok(approx_eq(actual, expected, tol))
            };
            fixture = fixture.with_assert(Rc::new(predicate));
        }
        set.insert(name, fixture);
    }
    Ok(set)
}

pub fn load_fixtures(path: &Path) -> Result<FixtureSet, FixtureLoadError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| FixtureLoadError::Io(format!("{}: {}", path.display(), e)))?;
    parse_fixtures(&contents)
}

/// Structural equality with numbers compared within `tol`.
pub fn approx_eq(a: &Value, b: &Value, tol: f64) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => (x - y).abs() <= tol,
        (Value::Sequence(xs), Value::Sequence(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| approx_eq(x, y, tol))
        }
        (Value::Mapping(xs), Value::Mapping(ys)) => {
            xs.len() == ys.len()
                && xs.iter().all(|(k, x)| b.get(k).is_some_and(|y| approx_eq(x, y, tol)))
                && ys.iter().all(|(k, _)| a.get(k).is_some())
        }
        _ => a.structurally_eq(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FunctionInfo, ParameterInfo};
    use crate::value::Shape;

    fn sum_entry() -> FunctionEntry {
        FunctionEntry::new(
            FunctionInfo {
                name: "sum".into(),
                documentation: String::new(),
                parameters: vec![ParameterInfo::new("n", Shape::Number).repeatable()],
                source: String::new(),
                origin: "test".into(),
            },
            Rc::new(|args: &[Value]| -> Result<Value, FunctionError> {
                Ok(Value::Number(args.iter().filter_map(Value::as_f64).sum()))
            }),
        )
    }

    fn list_len_entry() -> FunctionEntry {
        FunctionEntry::new(
            FunctionInfo {
                name: "len".into(),
                documentation: String::new(),
                parameters: vec![ParameterInfo::new("items", Shape::Sequence)],
                source: String::new(),
                origin: "test".into(),
            },
            Rc::new(|args: &[Value]| -> Result<Value, FunctionError> {
                let items = args[0].as_sequence().unwrap_or(&[]);
                Ok(Value::Number(items.len() as f64))
            }),
        )
    }

    fn nums(ns: &[f64]) -> Vec<Value> {
        ns.iter().map(|n| Value::Number(*n)).collect()
    }

    #[test]
    fn passing_fixture() {
        let fixture = Fixture::new(vec![nums(&[2.0, 3.0])], Value::Number(5.0));
        let report = run_fixture(&sum_entry(), &fixture);
        assert!(report.passed);
        assert_eq!(report.badge(), "✅ Test Passed");
    }

    #[test]
    fn failing_fixture_shows_actual() {
        let fixture = Fixture::new(vec![nums(&[2.0, 3.0])], Value::Number(6.0));
        let report = run_fixture(&sum_entry(), &fixture);
        assert!(!report.passed);
        assert_eq!(report.badge(), "❌ Test Failed");
        assert_eq!(report.actual, Value::Number(5.0));
        assert!(report.detail().ends_with("Actual:\n5"));
    }

    #[test]
    fn only_first_input_set_runs() {
        let fixture = Fixture::new(vec![nums(&[1.0]), nums(&[100.0])], Value::Number(1.0));
        assert!(run_fixture(&sum_entry(), &fixture).passed);
    }

    #[test]
    fn unspread_passes_one_sequence() {
        let fixture = Fixture::new(vec![nums(&[4.0, 5.0, 6.0])], Value::Number(3.0)).unspread();
        assert!(run_fixture(&list_len_entry(), &fixture).passed);

        // Spread into a sequence parameter is a shape error, reported as failure
        let spread = Fixture::new(vec![nums(&[4.0, 5.0, 6.0])], Value::Number(3.0));
        let report = run_fixture(&list_len_entry(), &spread);
        assert!(!report.passed);
        assert_eq!(
            report.actual.get("error").and_then(Value::as_str),
            Some("parameter 'items' expects sequence, got number")
        );
    }

    #[test]
    fn custom_predicate_is_used() {
        let fixture = Fixture::new(vec![nums(&[2.0, 3.0])], Value::Number(100.0))
            .with_assert(Rc::new(|actual: &Value, _expected: &Value| -> Result<bool, FunctionError> {
                Ok(actual.as_f64() == Some(5.0))
            }));
        assert!(run_fixture(&sum_entry(), &fixture).passed);
    }

    #[test]
    fn predicate_error_fails_test() {
        let fixture = Fixture::new(vec![nums(&[2.0])], Value::Number(2.0))
            .with_assert(Rc::new(|_: &Value, _: &Value| -> Result<bool, FunctionError> {
                Err(FunctionError::new("boom"))
            }));
        let report = run_fixture(&sum_entry(), &fixture);
        assert!(!report.passed);
        assert_eq!(report.actual.get("error"), Some(&Value::text("boom")));
    }

    #[test]
    fn describer_reformats_actual() {
        let fixture = Fixture::new(vec![nums(&[2.0, 3.0])], Value::Number(5.0)).with_describer(
            Rc::new(|actual: &Value, _: &Value, input: &[Value]| -> Result<Value, FunctionError> {
                Ok(Value::text(format!("{} inputs gave {}", input.len(), actual)))
            }),
        );
        let report = run_fixture(&sum_entry(), &fixture);
        assert!(report.passed);
        assert_eq!(report.actual, Value::text("2 inputs gave 5"));
    }

    #[test]
    fn describer_error_is_captured() {
        let fixture = Fixture::new(vec![nums(&[1.0])], Value::Number(1.0)).with_describer(Rc::new(
            |_: &Value, _: &Value, _: &[Value]| -> Result<Value, FunctionError> {
                Err(FunctionError::new("bad describe"))
            },
        ));
        let report = run_fixture(&sum_entry(), &fixture);
        assert!(report.passed);
        assert_eq!(report.actual.get("message"), Some(&Value::text("bad describe")));
    }

    #[test]
    fn empty_inputs_fail() {
        let report = run_fixture(&sum_entry(), &Fixture::new(vec![], Value::Null));
        assert!(!report.passed);
    }

    #[test]
    fn parse_fixture_file_with_tolerance() {
        let json = r#"{
            "sum": { "inputs": [[0.1, 0.2]], "expected": 0.3, "tolerance": 1e-9 },
            "len": { "inputs": [[1, 2]], "expected": 2, "spread": false }
        }"#;
        let set = parse_fixtures(json).unwrap();
        assert_eq!(set.len(), 2);
        assert!(run_fixture(&sum_entry(), set.get("sum").unwrap()).passed);
        assert!(run_fixture(&list_len_entry(), set.get("len").unwrap()).passed);
    }

    #[test]
    fn parse_fixture_file_rejects_garbage() {
        assert!(matches!(parse_fixtures("[1,2]"), Err(FixtureLoadError::Parse(_))));
    }

    #[test]
    fn approx_eq_nested() {
        let a = Value::from_json(&serde_json::json!({"x": [1.0, 2.0000001]}));
        let b = Value::from_json(&serde_json::json!({"x": [1, 2]}));
        assert!(approx_eq(&a, &b, 1e-3));
        assert!(!approx_eq(&a, &b, 1e-9));
    }
}
