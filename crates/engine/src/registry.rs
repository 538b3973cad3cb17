//! Function registry.
//!
//! Every callable is registered with a capability record (`FunctionInfo`):
//! ordered parameter descriptors with declared shapes, documentation and
//! source text. Two sources are merged once into an immutable `Registry`;
//! the later source wins on name collisions.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::value::{Shape, Value};

// ============================================================================
// Errors
// ============================================================================

/// Error raised by a callable itself.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionError {
    pub message: String,
}

impl FunctionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for FunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FunctionError {}

/// Why an invocation did not produce a value.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeError {
    /// Argument kind does not match the parameter's declared shape.
    ShapeMismatch { param: String, expected: Shape, found: &'static str },
    /// Required parameter received null or nothing.
    MissingArgument { param: String },
    /// More arguments than parameters, and the last one is not repeatable.
    TooManyArguments { expected: usize, got: usize },
    /// The callable ran and failed.
    Failed(FunctionError),
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch { param, expected, found } => {
                write!(f, "parameter '{param}' expects {expected}, got {found}")
            }
            Self::MissingArgument { param } => write!(f, "parameter '{param}' is required"),
            Self::TooManyArguments { expected, got } => {
                write!(f, "expected at most {expected} argument(s), got {got}")
            }
            Self::Failed(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for InvokeError {}

impl From<FunctionError> for InvokeError {
    fn from(err: FunctionError) -> Self {
        InvokeError::Failed(err)
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Declared parameter of a registered function.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub name: String,
    pub shape: Shape,
    pub description: String,
    pub optional: bool,
    pub repeatable: bool,
}

impl ParameterInfo {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            description: String::new(),
            optional: false,
            repeatable: false,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    fn accepts_null(&self) -> bool {
        self.optional || self.repeatable || self.shape == Shape::Any
    }
}

/// Capability record for one function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    pub name: String,
    pub documentation: String,
    pub parameters: Vec<ParameterInfo>,
    pub source: String,
    /// Where the function came from ("math", "graph", a script path...)
    pub origin: String,
}

impl FunctionInfo {
    /// `name(a: number, [b: text], rest...)`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                let base = if p.shape == Shape::Any {
                    p.name.clone()
                } else {
                    format!("{}: {}", p.name, p.shape)
                };
                let base = if p.repeatable && !base.ends_with("...") {
                    format!("{base}...")
                } else {
                    base
                };
                if p.optional {
                    format!("[{base}]")
                } else {
                    base
                }
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }
}

// ============================================================================
// Callables
// ============================================================================

pub trait Callable {
    fn call(&self, args: &[Value]) -> Result<Value, FunctionError>;
}

impl<F> Callable for F
where
    F: Fn(&[Value]) -> Result<Value, FunctionError>,
{
    fn call(&self, args: &[Value]) -> Result<Value, FunctionError> {
        self(args)
    }
}

/// A registered function: metadata plus the callable.
#[derive(Clone)]
pub struct FunctionEntry {
    pub info: FunctionInfo,
    callable: Rc<dyn Callable>,
}

impl fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionEntry").field("info", &self.info).finish_non_exhaustive()
    }
}

impl FunctionEntry {
    pub fn new(info: FunctionInfo, callable: Rc<dyn Callable>) -> Self {
        Self { info, callable }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Validate arguments against the declared parameters, then call.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, InvokeError> {
        self.check_args(args)?;
        log::debug!("invoking {} with {} argument(s)", self.info.name, args.len());
        let result = self.callable.call(args)?;
        log::debug!("{} returned {}", self.info.name, result.to_json_string());
        Ok(result)
    }

    fn check_args(&self, args: &[Value]) -> Result<(), InvokeError> {
        let params = &self.info.parameters;

        for (i, arg) in args.iter().enumerate() {
            let param = match params.get(i) {
                Some(p) => p,
                None => match params.last() {
                    Some(p) if p.repeatable => p,
                    _ => {
                        return Err(InvokeError::TooManyArguments {
                            expected: params.len(),
                            got: args.len(),
                        })
                    }
                },
            };

            if arg.is_null() {
                if param.accepts_null() {
                    continue;
                }
                return Err(InvokeError::MissingArgument { param: param.name.clone() });
            }

            if !param.shape.accepts(arg) {
                return Err(InvokeError::ShapeMismatch {
                    param: param.name.clone(),
                    expected: param.shape,
                    found: arg.kind_name(),
                });
            }
        }

        if let Some(missing) = params.iter().skip(args.len()).find(|p| !p.accepts_null()) {
            return Err(InvokeError::MissingArgument { param: missing.name.clone() });
        }

        Ok(())
    }
}

// ============================================================================
// Sources and the merged registry
// ============================================================================

/// One externally owned name → function table.
#[derive(Debug, Clone, Default)]
pub struct FunctionSource {
    pub name: String,
    entries: Vec<FunctionEntry>,
}

impl FunctionSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Add an entry; an existing entry with the same name is replaced in place.
    pub fn insert(&mut self, entry: FunctionEntry) {
        match self.entries.iter_mut().find(|e| e.name() == entry.name()) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for FunctionSource {
    type Item = FunctionEntry;
    type IntoIter = std::vec::IntoIter<FunctionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Merged lookup table. Built once; read-only afterwards.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<FunctionEntry>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Merge two sources. Missing sources count as empty. On a name clash the
    /// second source's entry wins but keeps the first-seen position.
    pub fn merge(first: Option<FunctionSource>, second: Option<FunctionSource>) -> Self {
        let mut registry = Registry::default();
        for source in [first, second].into_iter().flatten() {
            log::debug!("merging {} function(s) from {}", source.len(), source.name);
            for entry in source {
                registry.insert(entry);
            }
        }
        registry
    }

    fn insert(&mut self, entry: FunctionEntry) {
        match self.index.get(entry.name()) {
            Some(&i) => {
                log::debug!("{} overrides earlier definition", entry.name());
                self.entries[i] = entry;
            }
            None => {
                self.index.insert(entry.name().to_string(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
