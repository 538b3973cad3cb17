//! Execution limits and the read-only environment user functions run in.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mlua::{HookTriggers, Lua, VmState};

// =============================================================================
// RAII instruction limit guard
// =============================================================================

/// Instruction budget per call (10 million).
const INSTRUCTION_LIMIT: i64 = 10_000_000;

/// Hook check interval.
const HOOK_INTERVAL: u32 = 1_000;

/// Wall-clock limit per call.
const TIMEOUT: Duration = Duration::from_secs(1);

/// Installs the instruction/time hook and removes it on drop.
pub(crate) struct LimitGuard<'a> {
    lua: &'a Lua,
}

impl<'a> LimitGuard<'a> {
    pub(crate) fn new(lua: &'a Lua) -> Self {
        let counter = Arc::new(AtomicI64::new(0));
        let start = Instant::now();

        lua.set_hook(
            HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
            move |_lua, _debug| {
                let count = counter.fetch_add(HOOK_INTERVAL as i64, Ordering::Relaxed);
                if count >= INSTRUCTION_LIMIT {
                    return Err(mlua::Error::RuntimeError("instruction limit exceeded".to_string()));
                }
                if start.elapsed() > TIMEOUT {
                    return Err(mlua::Error::RuntimeError("execution timeout (1s limit)".to_string()));
                }
                Ok(VmState::Continue)
            },
        );

        Self { lua }
    }
}

impl Drop for LimitGuard<'_> {
    fn drop(&mut self) {
        self.lua.remove_hook();
    }
}

// =============================================================================
// Sandbox environment
// =============================================================================

const SAFE_LIBS: &[&str] = &["math", "string", "table", "utf8"];

const SAFE_GLOBALS: &[&str] = &[
    "assert", "error", "ipairs", "next", "pairs", "pcall", "rawequal", "rawget", "rawlen",
    "select", "tonumber", "tostring", "type",
];

/// Build the shared `_ENV` for user functions: frozen standard libraries,
/// a few safe globals, and everything the script itself defined. Writing a
/// global through it is an error.
pub(crate) fn environment(lua: &Lua, script_globals: &[(String, mlua::Value)]) -> mlua::Result<mlua::Table> {
    let env = lua.create_table()?;
    let globals = lua.globals();

    for lib_name in SAFE_LIBS {
        if let Ok(original) = globals.get::<mlua::Table>(*lib_name) {
            env.set(*lib_name, freeze_table(lua, &original)?)?;
        }
    }

    for name in SAFE_GLOBALS {
        if let Ok(val) = globals.get::<mlua::Value>(*name) {
            env.set(*name, val)?;
        }
    }

    for (name, value) in script_globals {
        env.set(name.as_str(), value.clone())?;
    }

    let mt = lua.create_table()?;
    mt.set("__index", env)?;
    mt.set(
        "__newindex",
        lua.create_function(|_, (_t, key, _val): (mlua::Value, String, mlua::Value)| {
            Err::<(), _>(mlua::Error::RuntimeError(format!(
                "Global state mutation is not allowed (attempted to set '{}')",
                key
            )))
        })?,
    )?;
    mt.set("__metatable", false)?;

    let wrapper = lua.create_table()?;
    wrapper.set_metatable(Some(mt));
    Ok(wrapper)
}

/// Read-only proxy table.
fn freeze_table(lua: &Lua, original: &mlua::Table) -> mlua::Result<mlua::Table> {
    let mt = lua.create_table()?;
    mt.set("__index", original.clone())?;
    mt.set(
        "__newindex",
        lua.create_function(|_, _: mlua::MultiValue| {
            Err::<(), _>(mlua::Error::RuntimeError("Cannot modify standard library".to_string()))
        })?,
    )?;
    mt.set("__metatable", false)?;

    let proxy = lua.create_table()?;
    proxy.set_metatable(Some(mt));
    Ok(proxy)
}

// =============================================================================
// Error scrubbing
// =============================================================================

const MAX_LOAD_ERROR: usize = 160;
const MAX_RUNTIME_ERROR: usize = 120;

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max - 3).collect::<String>())
    }
}

/// First line of a load/compile error. The chunk location is kept so the
/// user can find the line.
pub(crate) fn scrub_load_error(err: &mlua::Error) -> String {
    let raw = err.to_string();
    let first_line = raw.lines().next().unwrap_or(&raw).trim();
    truncate(first_line, MAX_LOAD_ERROR)
}

/// Core message of a runtime error: no "runtime error:" prefix, no
/// `chunk:line:` location, no traceback.
pub(crate) fn scrub_runtime_error(err: &mlua::Error) -> String {
    let raw = err.to_string();
    let first_line = raw.lines().next().unwrap_or(&raw).trim();
    let msg = first_line
        .strip_prefix("runtime error: ")
        .or_else(|| first_line.strip_prefix("callback error: "))
        .unwrap_or(first_line);
    truncate(strip_location(msg), MAX_RUNTIME_ERROR)
}

fn strip_location(msg: &str) -> &str {
    if let Some((location, rest)) = msg.split_once(": ") {
        if let Some((_, line)) = location.rsplit_once(':') {
            if !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()) {
                return rest;
            }
        }
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_location_prefix() {
        assert_eq!(strip_location("functions.lua:12: boom"), "boom");
        assert_eq!(strip_location("no location here"), "no location here");
        assert_eq!(strip_location("key: value"), "key: value");
    }

    #[test]
    fn truncates_on_char_boundary() {
        let long = "é".repeat(200);
        let out = truncate(&long, 10);
        assert_eq!(out.chars().count(), 10);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn runtime_error_message() {
        let lua = Lua::new();
        let err = lua
            .load("error('boom')")
            .set_name("@functions.lua")
            .exec()
            .unwrap_err();
        assert_eq!(scrub_runtime_error(&err), "boom");
    }

    #[test]
    fn guard_stops_runaway_loop() {
        let lua = Lua::new();
        let err = {
            let _guard = LimitGuard::new(&lua);
            lua.load("while true do end").exec().unwrap_err()
        };
        let msg = err.to_string();
        assert!(msg.contains("instruction limit exceeded") || msg.contains("timeout"), "{msg}");
        // Hook is gone after the guard drops
        lua.load("local n = 0 for i = 1, 5000000 do n = n + 1 end").exec().unwrap();
    }

    #[test]
    fn frozen_library_rejects_writes() {
        let lua = Lua::new();
        let env = environment(&lua, &[]).unwrap();
        let f: mlua::Function = lua.load("string.upper = nil").into_function().unwrap();
        f.set_environment(env).unwrap();
        let err = f.call::<()>(()).unwrap_err();
        assert!(err.to_string().contains("Cannot modify standard library"));
    }

    #[test]
    fn globals_are_read_only() {
        let lua = Lua::new();
        let env = environment(&lua, &[]).unwrap();
        let f: mlua::Function = lua.load("counter = 1").into_function().unwrap();
        f.set_environment(env).unwrap();
        let err = f.call::<()>(()).unwrap_err();
        assert!(err.to_string().contains("attempted to set 'counter'"));
    }
}
