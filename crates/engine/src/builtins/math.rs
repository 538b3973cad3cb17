// Numeric and list helpers

use std::rc::Rc;

use super::{num, numbers, opt_num, seq, text, Builtin, ParamSpec};
use crate::fixture::{approx_eq, Fixture, FixtureSet};
use crate::registry::FunctionError;
use crate::value::{Shape, Value};

pub const SOURCE: &str = include_str!("math.rs");

/// Longest sequence `range` will build.
const MAX_RANGE_LEN: usize = 10_000;

pub static FUNCTIONS: &[Builtin] = &[
    Builtin {
        name: "add",
        doc: "Adds two numbers. The second defaults to 0.",
        params: &[
            ParamSpec::required("a", Shape::Number, "First addend."),
            ParamSpec::optional("b", Shape::Number, "Second addend (default 0)."),
        ],
        func: add,
    },
    Builtin {
        name: "divide",
        doc: "Divides a by b. Fails on division by zero.",
        params: &[
            ParamSpec::required("a", Shape::Number, "Dividend."),
            ParamSpec::required("b", Shape::Number, "Divisor."),
        ],
        func: divide,
    },
    Builtin {
        name: "total",
        doc: "Sums a list of numbers.",
        params: &[ParamSpec::required("values", Shape::Sequence, "Numbers to add.")],
        func: total,
    },
    Builtin {
        name: "average",
        doc: "Arithmetic mean of a non-empty list of numbers.",
        params: &[ParamSpec::required("values", Shape::Sequence, "Numbers to average.")],
        func: average,
    },
    Builtin {
        name: "stats",
        doc: "Count, min, max and mean of a non-empty list of numbers.",
        params: &[ParamSpec::required("values", Shape::Sequence, "Numbers to summarize.")],
        func: stats,
    },
    Builtin {
        name: "clamp",
        doc: "Restricts a value to the closed interval [min, max].",
        params: &[
            ParamSpec::required("value", Shape::Number, "Value to clamp."),
            ParamSpec::required("min", Shape::Number, "Lower bound."),
            ParamSpec::required("max", Shape::Number, "Upper bound."),
        ],
        func: clamp,
    },
    Builtin {
        name: "range",
        doc: "Numbers from start (inclusive) to stop (exclusive) by step.",
        params: &[
            ParamSpec::required("start", Shape::Number, "First value."),
            ParamSpec::required("stop", Shape::Number, "Bound, not included."),
            ParamSpec::optional("step", Shape::Number, "Increment (default 1)."),
        ],
        func: range,
    },
    Builtin {
        name: "round_to",
        doc: "Rounds a number to the given count of decimal digits.",
        params: &[
            ParamSpec::required("value", Shape::Number, "Number to round."),
            ParamSpec::optional("digits", Shape::Number, "Decimal digits (default 0)."),
        ],
        func: round_to,
    },
    Builtin {
        name: "word_count",
        doc: "Counts whitespace-separated words.",
        params: &[ParamSpec::required("text", Shape::Text, "Text to count.")],
        func: word_count,
    },
    Builtin {
        name: "reverse",
        doc: "Reverses text or a list.",
        params: &[ParamSpec::required("items", Shape::Any, "Text or list.")],
        func: reverse,
    },
];

/// Adds two numbers.
pub fn add(args: &[Value]) -> Result<Value, FunctionError> {
    Ok(Value::Number(num(args, 0)? + opt_num(args, 1, 0.0)?))
}

/// Divides a by b.
pub fn divide(args: &[Value]) -> Result<Value, FunctionError> {
    let (a, b) = (num(args, 0)?, num(args, 1)?);
    if b == 0.0 {
        return Err(FunctionError::new("Division by zero"));
    }
    Ok(Value::Number(a / b))
}

/// Sums a list of numbers.
pub fn total(args: &[Value]) -> Result<Value, FunctionError> {
    let values = numbers(seq(args, 0)?)?;
    Ok(Value::Number(values.iter().sum()))
}

/// Arithmetic mean.
pub fn average(args: &[Value]) -> Result<Value, FunctionError> {
    let values = numbers(seq(args, 0)?)?;
    if values.is_empty() {
        return Err(FunctionError::new("cannot average an empty list"));
    }
    Ok(Value::Number(values.iter().sum::<f64>() / values.len() as f64))
}

/// Summary statistics.
pub fn stats(args: &[Value]) -> Result<Value, FunctionError> {
    let values = numbers(seq(args, 0)?)?;
    if values.is_empty() {
        return Err(FunctionError::new("cannot summarize an empty list"));
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Ok(Value::mapping([
        ("count", Value::Number(values.len() as f64)),
        ("min", Value::Number(min)),
        ("max", Value::Number(max)),
        ("mean", Value::Number(mean)),
    ]))
}

/// Clamps value into [min, max].
pub fn clamp(args: &[Value]) -> Result<Value, FunctionError> {
    let (value, min, max) = (num(args, 0)?, num(args, 1)?, num(args, 2)?);
    if min > max {
        return Err(FunctionError::new(format!("min ({min}) is greater than max ({max})")));
    }
    Ok(Value::Number(value.clamp(min, max)))
}

/// Half-open numeric range.
pub fn range(args: &[Value]) -> Result<Value, FunctionError> {
    let (start, stop, step) = (num(args, 0)?, num(args, 1)?, opt_num(args, 2, 1.0)?);
    if step == 0.0 || !step.is_finite() {
        return Err(FunctionError::new("step must be a non-zero finite number"));
    }

    let mut out = Vec::new();
    let mut current = start;
    while (step > 0.0 && current < stop) || (step < 0.0 && current > stop) {
        if out.len() >= MAX_RANGE_LEN {
            return Err(FunctionError::new(format!("range longer than {MAX_RANGE_LEN} items")));
        }
        out.push(Value::Number(current));
        current = start + step * out.len() as f64;
    }
    Ok(Value::Sequence(out))
}

/// Rounds to a number of decimal digits.
pub fn round_to(args: &[Value]) -> Result<Value, FunctionError> {
    let (value, digits) = (num(args, 0)?, opt_num(args, 1, 0.0)?);
    let factor = 10f64.powi(digits.trunc() as i32);
    Ok(Value::Number((value * factor).round() / factor))
}

/// Whitespace-separated word count.
pub fn word_count(args: &[Value]) -> Result<Value, FunctionError> {
    Ok(Value::Number(text(args, 0)?.split_whitespace().count() as f64))
}

/// Reverses text or a list.
pub fn reverse(args: &[Value]) -> Result<Value, FunctionError> {
    match args.first() {
        Some(Value::Text(s)) => Ok(Value::Text(s.chars().rev().collect())),
        Some(Value::Sequence(items)) => Ok(Value::Sequence(items.iter().rev().cloned().collect())),
        other => Err(FunctionError::new(format!(
            "reverse expects text or a sequence, got {}",
            other.map(Value::kind_name).unwrap_or("nothing")
        ))),
    }
}

fn within_tolerance(actual: &Value, expected: &Value) -> Result<bool, FunctionError> {
    Ok(approx_eq(actual, expected, 1e-9))
}

fn describe_mean(actual: &Value, _expected: &Value, input: &[Value]) -> Result<Value, FunctionError> {
    let mean = actual
        .get("mean")
        .ok_or_else(|| FunctionError::new("result has no mean"))?;
    Ok(Value::text(format!("mean {} over {} values", mean, input.len())))
}

fn n(x: f64) -> Value {
    Value::Number(x)
}

pub fn fixtures() -> FixtureSet {
    let mut set = FixtureSet::new();
    set.insert("add", Fixture::new(vec![vec![n(2.0), n(3.0)]], n(5.0)));
    set.insert("divide", Fixture::new(vec![vec![n(10.0), n(4.0)]], n(2.5)));
    set.insert(
        "total",
        Fixture::new(vec![vec![n(1.0), n(2.0), n(3.0), n(4.0)]], n(10.0)).unspread(),
    );
    // 0.6 / 3 is not exactly 0.2
    set.insert(
        "average",
        Fixture::new(vec![vec![n(0.1), n(0.2), n(0.3)]], n(0.2))
            .unspread()
            .with_assert(Rc::new(within_tolerance)),
    );
    set.insert(
        "stats",
        Fixture::new(
            vec![vec![n(1.0), n(2.0), n(3.0), n(6.0)]],
            Value::mapping([("count", n(4.0)), ("min", n(1.0)), ("max", n(6.0)), ("mean", n(3.0))]),
        )
        .unspread()
        .with_describer(Rc::new(describe_mean)),
    );
    set.insert("clamp", Fixture::new(vec![vec![n(15.0), n(0.0), n(10.0)]], n(10.0)));
    set.insert(
        "range",
        Fixture::new(
            vec![vec![n(0.0), n(5.0)]],
            Value::Sequence((0..5).map(|i| n(i as f64)).collect()),
        ),
    );
    set.insert("round_to", Fixture::new(vec![vec![n(3.14159), n(2.0)]], n(3.14)));
    set.insert(
        "word_count",
        Fixture::new(vec![vec![Value::text("the quick brown fox")]], n(4.0)),
    );
    set.insert("reverse", Fixture::new(vec![vec![Value::text("abc")]], Value::text("cba")));
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_defaults_second_operand() {
        assert_eq!(add(&[n(2.0)]).unwrap(), n(2.0));
        assert_eq!(add(&[n(2.0), Value::Null]).unwrap(), n(2.0));
    }

    #[test]
    fn divide_by_zero() {
        assert_eq!(divide(&[n(1.0), n(0.0)]).unwrap_err().message, "Division by zero");
    }

    #[test]
    fn average_empty_is_error() {
        assert!(average(&[Value::Sequence(vec![])]).is_err());
    }

    #[test]
    fn total_rejects_non_numbers() {
        let err = total(&[Value::Sequence(vec![n(1.0), Value::text("x")])]).unwrap_err();
        assert_eq!(err.message, "item 1 is text, not a number");
    }

    #[test]
    fn clamp_bad_bounds() {
        assert!(clamp(&[n(1.0), n(5.0), n(0.0)]).is_err());
    }

    #[test]
    fn range_negative_step() {
        let r = range(&[n(3.0), n(0.0), n(-1.0)]).unwrap();
        assert_eq!(r.to_json_string(), "[3,2,1]");
    }

    #[test]
    fn range_zero_step_is_error() {
        assert!(range(&[n(0.0), n(3.0), n(0.0)]).is_err());
    }

    #[test]
    fn range_is_capped() {
        assert!(range(&[n(0.0), n(1e9)]).is_err());
    }

    #[test]
    fn reverse_sequence_and_bad_input() {
        let r = reverse(&[Value::Sequence(vec![n(1.0), n(2.0)])]).unwrap();
        assert_eq!(r.to_json_string(), "[2,1]");
        assert!(reverse(&[n(1.0)]).is_err());
    }

    #[test]
    fn stats_describer_text() {
        let fixtures = fixtures();
        let fixture = fixtures.get("stats").unwrap();
        let describe = fixture.describe_actual.as_ref().unwrap();
        let actual = stats(&[Value::Sequence(vec![n(1.0), n(2.0), n(3.0), n(6.0)])]).unwrap();
        let shown = describe(&actual, &fixture.expected, fixture.inputs[0].as_slice()).unwrap();
        assert_eq!(shown, Value::text("mean 3 over 4 values"));
    }
}
