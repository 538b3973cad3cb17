//! Panel builder and executor.
//!
//! A panel is the UI unit for one selected function: title, documentation,
//! a collapsible source view, one input per parameter, a run action with
//! its output, and the result of the function's fixture if it has one.
//! Panels are rebuilt from scratch on every selection; nothing persists.

use crate::fixture::{run_fixture, Fixture, TestReport};
use crate::input::parse_field;
use crate::page::Page;
use crate::reflect::NO_DOCUMENTATION;
use crate::registry::FunctionEntry;
use crate::value::Value;

pub const INPUT_TIP: &str = "Supports JSON input like [1,2], {\"x\":5}, etc. \
For page elements, use {\"_selector\": \"#test-svg\"}.";

pub const SOURCE_SUMMARY: &str = "Show Source Code";

#[derive(Debug, Clone, PartialEq)]
pub struct InputField {
    pub param: String,
    pub label: String,
    pub placeholder: String,
    pub value: String,
}

impl InputField {
    fn for_param(param: &str) -> Self {
        Self {
            param: param.to_string(),
            label: format!("{param}:"),
            placeholder: format!("Enter value for {param}"),
            value: String::new(),
        }
    }
}

/// Result of the last run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutput {
    Value(Value),
    Error(String),
}

impl RunOutput {
    pub fn is_error(&self) -> bool {
        matches!(self, RunOutput::Error(_))
    }

    pub fn text(&self) -> String {
        match self {
            RunOutput::Value(v) => format!("Output: {}", v.to_pretty_json()),
            RunOutput::Error(msg) => format!("Error: {msg}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub title: String,
    pub documentation: String,
    pub source: String,
    pub source_expanded: bool,
    pub fields: Vec<InputField>,
    pub output: Option<RunOutput>,
    pub test: Option<TestReport>,
    entry: FunctionEntry,
}

impl Panel {
    /// Build a panel for `entry`, running `fixture` immediately if given.
    pub fn build(entry: &FunctionEntry, fixture: Option<&Fixture>) -> Self {
        let info = &entry.info;
        let documentation = if info.documentation.trim().is_empty() {
            NO_DOCUMENTATION.to_string()
        } else {
            info.documentation.trim().to_string()
        };

        let fields = info.parameters.iter().map(|p| InputField::for_param(&p.name)).collect();
        let test = fixture.map(|f| run_fixture(entry, f));

        Self {
            title: info.name.clone(),
            documentation,
            source: info.source.clone(),
            source_expanded: false,
            fields,
            output: None,
            test,
            entry: entry.clone(),
        }
    }

    pub fn entry(&self) -> &FunctionEntry {
        &self.entry
    }

    pub fn toggle_source(&mut self) {
        self.source_expanded = !self.source_expanded;
    }

    /// Set the text of the input at `index`. Returns false if out of range.
    pub fn set_input(&mut self, index: usize, text: impl Into<String>) -> bool {
        match self.fields.get_mut(index) {
            Some(field) => {
                field.value = text.into();
                true
            }
            None => false,
        }
    }

    /// Parse every input in declaration order.
    pub fn collect_args(&self, page: &Page) -> Vec<Value> {
        self.fields.iter().map(|f| parse_field(&f.value, page)).collect()
    }

    /// Run the function with the current inputs. Errors are captured in the
    /// output, never returned.
    pub fn run(&mut self, page: &Page) -> &RunOutput {
        let args = self.collect_args(page);
        log::debug!(
            "parsed inputs for {}: {}",
            self.title,
            Value::Sequence(args.clone()).to_json_string()
        );

        let output = match self.entry.invoke(&args) {
            Ok(value) => RunOutput::Value(value),
            Err(err) => {
                // No message: show the error itself
                let mut msg = err.to_string();
                if msg.is_empty() {
                    msg = format!("{err:?}");
                }
                log::info!("{} failed: {}", self.title, msg);
                RunOutput::Error(msg)
            }
        };
        self.output.insert(output)
    }

    /// Plain-text rendering, top to bottom in display order.
    pub fn render_text(&self) -> String {
        let mut out = Vec::new();
        out.push(format!("== {} ==", self.title));
        out.push(self.documentation.clone());
        out.push(String::new());

        if self.source_expanded {
            out.push(format!("[-] {SOURCE_SUMMARY}"));
            out.push(self.source.clone());
        } else {
            out.push(format!("[+] {SOURCE_SUMMARY}"));
        }
        out.push(String::new());

        for field in &self.fields {
            let shown = if field.value.is_empty() {
                format!("<{}>", field.placeholder)
            } else {
                field.value.clone()
            };
            out.push(format!("{} {}", field.label, shown));
        }
        out.push("[ Run ]".to_string());
        out.push(INPUT_TIP.to_string());

        if let Some(output) = &self.output {
            out.push(output.text());
        }

        if let Some(test) = &self.test {
            out.push(String::new());
            out.push(test.badge().to_string());
            out.push(test.detail());
        }

        out.join("\n")
    }
}
