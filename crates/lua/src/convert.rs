//! Conversion between engine values and Lua values.
//!
//! Sequences become 1-based tables, mappings become string-keyed tables and
//! element references become plain tables of their fields. Coming back, a
//! table whose keys are exactly `1..n` is a sequence (an empty table is an
//! empty sequence); anything else is a mapping with keys in sorted order.

use mlua::Lua;

use runpad_engine::value::Value;

/// Nesting limit for tables, which also catches self-referencing tables.
const MAX_DEPTH: usize = 64;

/// Largest integer an f64 holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn conversion_error(message: impl Into<String>) -> mlua::Error {
    mlua::Error::RuntimeError(message.into())
}

pub fn value_to_lua(lua: &Lua, value: &Value) -> mlua::Result<mlua::Value> {
    match value {
        Value::Null => Ok(mlua::Value::Nil),
        Value::Bool(b) => Ok(mlua::Value::Boolean(*b)),
        // Integral numbers go over as Lua integers so `tostring(2)` is "2"
        Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
            Ok(mlua::Value::Integer(*n as i64))
        }
        Value::Number(n) => Ok(mlua::Value::Number(*n)),
        Value::Text(s) => Ok(mlua::Value::String(lua.create_string(s)?)),
        Value::Sequence(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.raw_set(i + 1, value_to_lua(lua, item)?)?;
            }
            Ok(mlua::Value::Table(table))
        }
        Value::Mapping(entries) => {
            let table = lua.create_table()?;
            for (key, item) in entries {
                table.raw_set(key.as_str(), value_to_lua(lua, item)?)?;
            }
            Ok(mlua::Value::Table(table))
        }
        Value::Element(el) => value_to_lua(lua, &Value::from_json(&el.to_json())),
    }
}

pub fn lua_to_value(value: &mlua::Value) -> mlua::Result<Value> {
    convert(value, 0)
}

fn convert(value: &mlua::Value, depth: usize) -> mlua::Result<Value> {
    match value {
        mlua::Value::Nil => Ok(Value::Null),
        mlua::Value::Boolean(b) => Ok(Value::Bool(*b)),
        mlua::Value::Integer(i) => Ok(Value::Number(*i as f64)),
        mlua::Value::Number(n) => Ok(Value::Number(*n)),
        mlua::Value::String(s) => Ok(Value::Text(s.to_string_lossy())),
        mlua::Value::Table(table) => {
            if depth >= MAX_DEPTH {
                return Err(conversion_error("table nesting too deep"));
            }
            table_to_value(table, depth)
        }
        other => Err(conversion_error(format!(
            "cannot convert a Lua {} to a value",
            other.type_name()
        ))),
    }
}

fn table_to_value(table: &mlua::Table, depth: usize) -> mlua::Result<Value> {
    let mut pairs = Vec::new();
    for pair in table.clone().pairs::<mlua::Value, mlua::Value>() {
        pairs.push(pair?);
    }

    let len = table.raw_len();
    if pairs.len() == len {
        let mut items = Vec::with_capacity(len);
        for i in 1..=len {
            let item: mlua::Value = table.raw_get(i)?;
            items.push(convert(&item, depth + 1)?);
        }
        return Ok(Value::Sequence(items));
    }

    let mut entries = Vec::with_capacity(pairs.len());
    for (key, item) in &pairs {
        let key = match key {
            mlua::Value::String(s) => s.to_string_lossy(),
            mlua::Value::Integer(i) => i.to_string(),
            mlua::Value::Number(n) => Value::Number(*n).to_string(),
            mlua::Value::Boolean(b) => b.to_string(),
            other => {
                return Err(conversion_error(format!(
                    "cannot use a Lua {} as a mapping key",
                    other.type_name()
                )))
            }
        };
        entries.push((key, convert(item, depth + 1)?));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(Value::mapping(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use runpad_engine::page::{Element, Page};

    fn round_trip(lua: &Lua, v: &Value) -> Value {
        lua_to_value(&value_to_lua(lua, v).unwrap()).unwrap()
    }

    #[test]
    fn scalars() {
        let lua = Lua::new();
        for v in [Value::Null, Value::Bool(true), Value::Number(2.0), Value::Number(2.5), Value::text("hi")] {
            assert_eq!(round_trip(&lua, &v), v);
        }
    }

    #[test]
    fn integral_numbers_are_integers() {
        let lua = Lua::new();
        assert!(matches!(value_to_lua(&lua, &Value::Number(3.0)).unwrap(), mlua::Value::Integer(3)));
    }

    #[test]
    fn tables_from_lua() {
        let lua = Lua::new();
        let seq: mlua::Value = lua.load("return {1, 2, 3}").eval().unwrap();
        assert_eq!(lua_to_value(&seq).unwrap().to_json_string(), "[1,2,3]");

        let map: mlua::Value = lua.load("return {b = 2, a = {x = true}}").eval().unwrap();
        assert_eq!(lua_to_value(&map).unwrap().to_json_string(), r#"{"a":{"x":true},"b":2}"#);

        let empty: mlua::Value = lua.load("return {}").eval().unwrap();
        assert_eq!(lua_to_value(&empty).unwrap(), Value::Sequence(vec![]));
    }

    #[test]
    fn sparse_table_is_mapping() {
        let lua = Lua::new();
        let sparse: mlua::Value = lua.load("return {[1] = 'a', [3] = 'c'}").eval().unwrap();
        assert_eq!(lua_to_value(&sparse).unwrap().to_json_string(), r#"{"1":"a","3":"c"}"#);
    }

    #[test]
    fn cyclic_table_is_error() {
        let lua = Lua::new();
        let cyclic: mlua::Value = lua.load("local t = {} t.self = t return t").eval().unwrap();
        assert!(lua_to_value(&cyclic).is_err());
    }

    #[test]
    fn functions_do_not_convert() {
        let lua = Lua::new();
        let f: mlua::Value = lua.load("return print").eval().unwrap();
        assert!(lua_to_value(&f).is_err());
    }

    #[test]
    fn element_becomes_field_table() {
        let lua = Lua::new();
        let page = Page::new().with_element(Element::new("svg").with_id("test-svg"));
        let el = Value::Element(page.select("#test-svg"));
        let back = round_trip(&lua, &el);
        assert_eq!(back.get("tag"), Some(&Value::text("svg")));
        assert_eq!(back.get("selector"), Some(&Value::text("#test-svg")));
    }
}
