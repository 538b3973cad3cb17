//! User-defined functions from a Lua script.
//!
//! Users write `functions.lua` in the config directory. The script runs once;
//! every global function it defines becomes a registry entry whose
//! documentation and parameter names are reflected from its source text. A
//! global `fixtures` table may attach self-checks to any function by name.
//! A fixture may carry an `assert(actual, expected)` predicate and a
//! `describeActual(actual, expected, input)` formatter (`describe` also works):
//!
//! ```lua
//! --[[ Doubles a number. ]]
//! function double(x)
//!   return x * 2
//! end
//!
//! fixtures = {
//!   double = { inputs = {{21}}, expected = 42 },
//! }
//! ```
//!
//! Functions run sandboxed (read-only globals, frozen standard library) and
//! under an instruction budget and wall-clock limit.

mod convert;
mod sandbox;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::Lua;

use runpad_engine::fixture::{Fixture, FixtureSet};
use runpad_engine::reflect::{extract_doc_comment, extract_param_names};
use runpad_engine::registry::{
    Callable, FunctionEntry, FunctionError, FunctionInfo, FunctionSource, ParameterInfo,
};
use runpad_engine::value::{Shape, Value};

pub use convert::{lua_to_value, value_to_lua};
use sandbox::{scrub_load_error, scrub_runtime_error, LimitGuard};

pub const SCRIPT_FILE: &str = "functions.lua";

/// Name of the function source built from the script.
pub const SOURCE_NAME: &str = "lua";

const FIXTURES_GLOBAL: &str = "fixtures";

#[derive(Debug)]
pub enum LuaLoadError {
    Io(String),
    /// Syntax error or error raised while the script ran
    Script(String),
    Fixtures(String),
}

impl fmt::Display for LuaLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "cannot read script: {msg}"),
            Self::Script(msg) => write!(f, "script failed to load: {msg}"),
            Self::Fixtures(msg) => write!(f, "invalid fixtures table: {msg}"),
        }
    }
}

impl std::error::Error for LuaLoadError {}

/// Everything a script contributed.
#[derive(Debug)]
pub struct LuaScript {
    pub path: PathBuf,
    pub functions: FunctionSource,
    pub fixtures: FixtureSet,
    pub warnings: Vec<String>,
}

impl LuaScript {
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            functions: FunctionSource::new(SOURCE_NAME),
            fixtures: FixtureSet::new(),
            warnings: Vec::new(),
        }
    }
}


/// Load a script from disk. A missing file is an empty script, not an error.
pub fn load_script(path: &Path) -> Result<LuaScript, LuaLoadError> {
    if !path.exists() {
        log::debug!("no script at {}", path.display());
        return Ok(LuaScript::empty(path));
    }

    let source = std::fs::read_to_string(path)
        .map_err(|e| LuaLoadError::Io(format!("{}: {}", path.display(), e)))?;
    let chunk_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| SCRIPT_FILE.to_string());

    let mut script = load_source(&source, &chunk_name)?;
    script.path = path.to_path_buf();
    log::info!(
        "loaded {} function(s) and {} fixture(s) from {}",
        script.functions.len(),
        script.fixtures.len(),
        path.display()
    );
    Ok(script)
}

/// Run `source` and collect the functions and fixtures it defines.
pub fn load_source(source: &str, chunk_name: &str) -> Result<LuaScript, LuaLoadError> {
    let lua = Rc::new(Lua::new());
    let builtin_globals = global_values(&lua);

    {
        let _guard = LimitGuard::new(&lua);
        lua.load(source)
            .set_name(format!("@{chunk_name}"))
            .exec()
            .map_err(|e| LuaLoadError::Script(scrub_load_error(&e)))?;
    }

    let defined: Vec<(String, mlua::Value)> = lua
        .globals()
        .pairs::<String, mlua::Value>()
        .filter_map(Result::ok)
        .filter(|(name, value)| builtin_globals.get(name) != Some(value))
        .collect();

    let env = sandbox::environment(&lua, &defined)
        .map_err(|e| LuaLoadError::Script(scrub_load_error(&e)))?;

    let mut warnings = Vec::new();
    let mut found = Vec::new();
    for (name, value) in &defined {
        let mlua::Value::Function(func) = value else {
            continue;
        };
        let info = func.info();
        if info.what != "Lua" {
            warnings.push(format!("{name} is not a Lua function; skipped"));
            continue;
        }
        found.push((info.line_defined, info.last_line_defined, name.clone(), func.clone()));
    }
    // Definition order
    found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.2.cmp(&b.2)));

    let lines: Vec<&str> = source.lines().collect();
    let mut functions = FunctionSource::new(SOURCE_NAME);
    for (first, last, name, func) in found {
        func.set_environment(env.clone())
            .map_err(|e| LuaLoadError::Script(scrub_load_error(&e)))?;
        let text = function_text(&lines, first, last);
        log::debug!("lua function {name} at line {}", first.unwrap_or(0));
        functions.insert(build_entry(&lua, name, func, text));
    }

    for warning in &warnings {
        log::warn!("{warning}");
    }

    let fixtures = read_fixtures(&lua, &env)?;

    Ok(LuaScript {
        path: PathBuf::from(chunk_name),
        functions,
        fixtures,
        warnings,
    })
}

/// Globals present before the script ran. A script global that is still
/// the same value was not defined by the script.
fn global_values(lua: &Lua) -> HashMap<String, mlua::Value> {
    lua.globals()
        .pairs::<String, mlua::Value>()
        .filter_map(Result::ok)
        .collect()
}

// =============================================================================
// Reflection
// =============================================================================

/// Source lines of a function, including the comment block right above it.
fn function_text(lines: &[&str], first: Option<usize>, last: Option<usize>) -> String {
    let (Some(first), Some(last)) = (first, last) else {
        return String::new();
    };
    if first == 0 || first > lines.len() {
        return String::new();
    }
    let end = last.clamp(first, lines.len());
    let start = leading_comment_start(lines, first - 1);
    lines[start..end].join("\n")
}

/// Index of the first line of the comment block ending right before `start`.
/// Only `--` line comments and `--[[ ... ]]` long comments count; code that
/// merely ends in `]]` stops the scan.
fn leading_comment_start(lines: &[&str], start: usize) -> usize {
    let mut first = start;
    while first > 0 {
        let line = lines[first - 1].trim();
        if line.starts_with("--") {
            first -= 1;
        } else if let Some(opener) = long_comment_opener(lines, first - 1) {
            first = opener;
        } else {
            break;
        }
    }
    first
}

/// Opening line of the `--[[` comment closed on line `close`, if that line
/// really ends one.
fn long_comment_opener(lines: &[&str], close: usize) -> Option<usize> {
    if !lines[close].trim_end().ends_with("]]") {
        return None;
    }
    let opener = (0..close)
        .rev()
        .find(|&i| lines[i].trim_start().starts_with("--[["))?;
    // Closed before `close`, so `close` is code
    let opened = &lines[opener].trim_start()["--[[".len()..];
    if opened.contains("]]") || lines[opener + 1..close].iter().any(|l| l.contains("]]")) {
        return None;
    }
    Some(opener)
}

fn build_entry(lua: &Rc<Lua>, name: String, func: mlua::Function, text: String) -> FunctionEntry {
    let parameters = extract_param_names(&text)
        .into_iter()
        .map(|p| {
            let param = ParameterInfo::new(p.as_str(), Shape::Any);
            if p == "..." {
                param.repeatable()
            } else {
                param
            }
        })
        .collect();

    let info = FunctionInfo {
        name: name.clone(),
        documentation: extract_doc_comment(&text),
        parameters,
        source: text,
        origin: SOURCE_NAME.to_string(),
    };

    let lua = Rc::clone(lua);
    let callable: Rc<dyn Callable> = Rc::new(move |args: &[Value]| -> Result<Value, FunctionError> {
        call_function(&lua, &func, args)
    });
    FunctionEntry::new(info, callable)
}

// =============================================================================
// Calling
// =============================================================================

fn call_function(lua: &Lua, func: &mlua::Function, args: &[Value]) -> Result<Value, FunctionError> {
    let lua_args = args
        .iter()
        .map(|a| value_to_lua(lua, a))
        .collect::<mlua::Result<Vec<_>>>()
        .map_err(|e| FunctionError::new(scrub_runtime_error(&e)))?;

    let ret = {
        let _guard = LimitGuard::new(lua);
        func.call::<mlua::Value>(mlua::MultiValue::from_iter(lua_args))
    }
    .map_err(|e| FunctionError::new(scrub_runtime_error(&e)))?;

    lua_to_value(&ret).map_err(|e| FunctionError::new(scrub_runtime_error(&e)))
}

fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

// =============================================================================
// Fixtures
// =============================================================================

fn read_fixtures(lua: &Rc<Lua>, env: &mlua::Table) -> Result<FixtureSet, LuaLoadError> {
    let mut set = FixtureSet::new();
    let table = match lua.globals().get::<mlua::Value>(FIXTURES_GLOBAL) {
        Ok(mlua::Value::Nil) => return Ok(set),
        Ok(mlua::Value::Table(t)) => t,
        Ok(other) => {
            return Err(LuaLoadError::Fixtures(format!(
                "`{FIXTURES_GLOBAL}` must be a table, got {}",
                other.type_name()
            )))
        }
        Err(e) => return Err(LuaLoadError::Fixtures(scrub_runtime_error(&e))),
    };

    for pair in table.pairs::<String, mlua::Table>() {
        let (name, spec) = pair.map_err(|e| LuaLoadError::Fixtures(scrub_runtime_error(&e)))?;
        let fixture = read_fixture(lua, env, &spec)
            .map_err(|e| LuaLoadError::Fixtures(format!("{name}: {}", scrub_runtime_error(&e))))?;
        set.insert(name, fixture);
    }
    Ok(set)
}

fn read_fixture(lua: &Rc<Lua>, env: &mlua::Table, spec: &mlua::Table) -> mlua::Result<Fixture> {
    let fail = |msg: String| mlua::Error::RuntimeError(msg);

    let inputs = match lua_to_value(&spec.get::<mlua::Value>("inputs")?)? {
        Value::Sequence(sets) => sets
            .into_iter()
            .map(|set| match set {
                Value::Sequence(items) => Ok(items),
                other => Err(fail(format!("input set must be a list, got {}", other.kind_name()))),
            })
            .collect::<mlua::Result<Vec<_>>>()?,
        Value::Null => return Err(fail("missing `inputs`".to_string())),
        other => return Err(fail(format!("`inputs` must be a list, got {}", other.kind_name()))),
    };
    let expected = lua_to_value(&spec.get::<mlua::Value>("expected")?)?;

    let mut fixture = Fixture::new(inputs, expected);
    if let Some(spread) = spec.get::<Option<bool>>("spread")? {
        fixture.spread = spread;
    }

    if let Some(predicate) = spec.get::<Option<mlua::Function>>("assert")? {
        predicate.set_environment(env.clone())?;
        let lua = Rc::clone(lua);
        let check = move |actual: &Value, expected: &Value| -> Result<bool, FunctionError> {
            let ret = call_function(&lua, &predicate, &[actual.clone(), expected.clone()])?;
            Ok(truthy(&ret))
        };
        fixture = fixture.with_assert(Rc::new(check));
    }

    let describe = match spec.get::<Option<mlua::Function>>("describeActual")? {
        Some(func) => Some(func),
        None => spec.get::<Option<mlua::Function>>("describe")?,
    };
    if let Some(describe) = describe {
        describe.set_environment(env.clone())?;
        let lua = Rc::clone(lua);
        let describer = move |actual: &Value, expected: &Value, input: &[Value]| -> Result<Value, FunctionError> {
            let args = [actual.clone(), expected.clone(), Value::Sequence(input.to_vec())];
            call_function(&lua, &describe, &args)
        };
        fixture = fixture.with_describer(Rc::new(describer));
    }

    Ok(fixture)
}
