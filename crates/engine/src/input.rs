//! Input parsing: raw field text to tagged values.

use crate::page::Page;
use crate::value::Value;

/// Marker key that turns a one-field JSON object into an element reference:
/// `{"_selector": "#chart"}`.
pub const SELECTOR_MARKER: &str = "_selector";

/// Trim a field's text. Blank fields read as `None`.
pub fn field_text(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Parse one input value.
///
/// Blank text is null. Anything `serde_json` accepts becomes the matching
/// value; a mapping carrying [`SELECTOR_MARKER`] resolves to an element
/// reference on `page`. Text that is not JSON comes back unchanged, so bare
/// words work without quoting.
pub fn parse_input(text: &str, page: &Page) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) => resolve_marker(Value::from_json(&json), page),
        Err(_) => Value::Text(text.to_string()),
    }
}

/// Parse a field as it sits in a panel: trimmed, blank → null.
pub fn parse_field(raw: &str, page: &Page) -> Value {
    match field_text(raw) {
        Some(text) => parse_input(text, page),
        None => Value::Null,
    }
}

fn resolve_marker(value: Value, page: &Page) -> Value {
    let selector = match value.get(SELECTOR_MARKER) {
        Some(Value::Text(s)) if !s.is_empty() => s.clone(),
        _ => return value,
    };
    log::debug!("resolving element reference {selector:?}");
    Value::Element(page.select(&selector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Element;
    use proptest::prelude::*;

    fn page() -> Page {
        Page::new().with_element(Element::new("svg").with_id("test-svg"))
    }

    #[test]
    fn blank_is_null() {
        assert_eq!(parse_input("", &page()), Value::Null);
        assert_eq!(parse_input("   \t", &page()), Value::Null);
        assert_eq!(parse_field("  ", &page()), Value::Null);
    }

    #[test]
    fn json_scalars() {
        assert_eq!(parse_input("42", &page()), Value::Number(42.0));
        assert_eq!(parse_input("true", &page()), Value::Bool(true));
        assert_eq!(parse_input("null", &page()), Value::Null);
        assert_eq!(parse_input("\"hi\"", &page()), Value::text("hi"));
    }

    #[test]
    fn json_structures() {
        let v = parse_input(r#"{"x": [1, 2], "y": {"z": null}}"#, &page());
        assert_eq!(v.to_json_string(), r#"{"x":[1,2],"y":{"z":null}}"#);
    }

    #[test]
    fn invalid_json_returns_raw_text() {
        assert_eq!(parse_input("hello world", &page()), Value::text("hello world"));
        // Unquoted keys are not JSON
        assert_eq!(parse_input("{x:5}", &page()), Value::text("{x:5}"));
    }

    #[test]
    fn field_is_trimmed_before_parse() {
        assert_eq!(parse_field("  [1,2]  ", &page()).to_json_string(), "[1,2]");
        assert_eq!(parse_field("  word ", &page()), Value::text("word"));
    }

    #[test]
    fn selector_marker_resolves_element() {
        match parse_input(r##"{"_selector": "#test-svg"}"##, &page()) {
            Value::Element(r) => {
                assert_eq!(r.selector, "#test-svg");
                assert_eq!(r.element.unwrap().tag, "svg");
            }
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn selector_marker_missing_element_is_empty_ref() {
        match parse_input(r##"{"_selector": "#nowhere"}"##, &page()) {
            Value::Element(r) => assert!(r.is_empty()),
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn non_string_marker_is_plain_mapping() {
        let v = parse_input(r#"{"_selector": 3}"#, &page());
        assert!(matches!(v, Value::Mapping(_)));
    }

    proptest! {
        #[test]
        fn any_blank_string_is_null(s in "[ \t\r\n]*") {
            prop_assert_eq!(parse_input(&s, &page()), Value::Null);
        }

        #[test]
        fn valid_json_round_trips(n in -1.0e9f64..1.0e9f64, s in "[a-z]{0,8}", b in any::<bool>()) {
            let json = serde_json::json!({"n": n, "s": s, "list": [b, null]});
            let text = json.to_string();
            let parsed = parse_input(&text, &page());
            prop_assert_eq!(parsed, Value::from_json(&json));
        }

        #[test]
        fn invalid_json_is_returned_unchanged(s in "[a-zA-Z][a-zA-Z ]{0,20}") {
            prop_assume!(serde_json::from_str::<serde_json::Value>(&s).is_err());
            prop_assert_eq!(parse_input(&s, &page()), Value::Text(s.clone()));
        }
    }
}
