// runpad CLI - list, inspect, run and self-test registered functions
// `runpad ui` opens the interactive runner

mod exit_codes;
mod tui;
mod util;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use runpad_config::Settings;
use runpad_engine::builtins;
use runpad_engine::dispatch::{Dispatcher, PageIds};
use runpad_engine::fixture::{load_fixtures, run_fixture, TestReport};
use runpad_engine::input::parse_field;
use runpad_engine::page::{Element, Page};
use runpad_engine::panel::RunOutput;
use runpad_engine::registry::FunctionInfo;
use runpad_engine::value::Value;

use exit_codes::{
    EXIT_ERROR, EXIT_FIXTURES, EXIT_INVOKE, EXIT_NOT_FOUND, EXIT_SCRIPT, EXIT_SUCCESS,
    EXIT_USAGE,
};

/// Environment variable holding a log filter (`debug`, `runpad_lua=trace`, ...)
const LOG_ENV: &str = "RUNPAD_LOG";

#[derive(Parser)]
#[command(name = "runpad")]
#[command(about = "Scratchpad for running functions against typed inputs")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Settings file [default: <config dir>/runpad/settings.json]
    #[arg(long, global = true, env = "RUNPAD_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Lua script with user functions (overrides scripts.functions)
    #[arg(long, global = true, value_name = "PATH")]
    script: Option<PathBuf>,

    /// Load built-in functions only
    #[arg(long, global = true)]
    no_script: bool,

    /// JSON fixture file (overrides fixtures.path)
    #[arg(long, global = true, value_name = "PATH")]
    fixtures: Option<PathBuf>,

    /// Log to stderr: -v debug, -vv trace
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered functions with their signatures
    #[command(after_help = "\
Examples:
  runpad list
  runpad list --json | jq '.[].name'
  runpad list --no-script")]
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a function's panel: documentation, source, inputs, fixture result
    #[command(after_help = "\
Examples:
  runpad show add
  runpad show stats --source
  runpad show shortest_path --json")]
    Show {
        /// Function name
        name: String,

        /// Expand the source view
        #[arg(long)]
        source: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a function. Each value is parsed as JSON, else taken as text.
    #[command(after_help = "\
Examples:
  runpad run add 2 3
  runpad run total '[1, 2, 3]'
  runpad run word_count 'the quick brown fox'
  runpad run element_info '{\"_selector\": \"#test-svg\"}'
  runpad run divide 1 0 --json

A blank value ('') is null, which optional parameters accept.")]
    Run {
        /// Function name
        name: String,

        /// Argument values, in parameter order
        #[arg(allow_negative_numbers = true)]
        args: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run fixtures and report pass/fail
    #[command(after_help = "\
Examples:
  runpad test
  runpad test average
  runpad test --fixtures my-fixtures.json --json

Exits 1 when any fixture fails.")]
    Test {
        /// Only test this function
        name: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Open the interactive runner
    #[command(after_help = "\
Keys:
  Up/Down      select function
  Tab          next input
  Enter        run
  Ctrl-S       toggle source
  ?            help
  q / Esc      quit")]
    Ui,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  runpad-engine ", env!("CARGO_PKG_VERSION"),
        "\nscripts: Lua 5.4",
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        None => {
            eprintln!("Usage: runpad <command> [options]");
            eprintln!("       runpad --help for more information");
            Ok(())
        }
        Some(command) => run_command(&cli, command),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn run_command(cli: &Cli, command: &Commands) -> Result<(), CliError> {
    let loaded = match &cli.config {
        Some(path) => Settings::try_load_from(path),
        None => Settings::try_load(),
    };
    let (settings, settings_error) = match loaded {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };

    // The terminal UI owns the screen; log lines would tear it
    let tui = matches!(command, Commands::Ui);
    if !tui {
        init_logging(cli.verbose, &settings.log_level);
    }
    if let Some(e) = settings_error {
        if tui {
            eprintln!("warning: {}; using default settings", e);
        } else {
            log::warn!("{}; using default settings", e);
        }
    }

    let mut runner = open_runner(cli, &settings)?;

    match command {
        Commands::List { json } => cmd_list(&runner, *json),
        Commands::Show { name, source, json } => {
            cmd_show(&mut runner, name, *source || settings.show_source, *json)
        }
        Commands::Run { name, args, json } => cmd_run(&mut runner, name, args, *json),
        Commands::Test { name, json } => cmd_test(&runner, name.as_deref(), *json),
        Commands::Ui => tui::run(runner, settings.show_source).map_err(CliError::error),
    }
}

fn init_logging(verbose: u8, default_level: &str) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // Also installs the `log` bridge, so library crates need no tracing
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

// ============================================================================
// Runner setup
// ============================================================================

fn build_page(settings: &Settings) -> Page {
    let mut page = Page::new();
    for spec in &settings.elements {
        let mut element = Element::new(spec.tag.as_str());
        if let Some(id) = &spec.id {
            element = element.with_id(id.as_str());
        }
        for class in &spec.classes {
            element = element.with_class(class.as_str());
        }
        if !spec.text.is_empty() {
            element = element.with_text(spec.text.as_str());
        }
        page.push(element);
    }
    page
}

/// Load every source and fixture set, then mount the dispatcher on the page.
fn open_runner(cli: &Cli, settings: &Settings) -> Result<Dispatcher, CliError> {
    let script = if cli.no_script {
        None
    } else {
        let path = match &cli.script {
            Some(path) if !path.exists() => {
                return Err(CliError::usage(format!("script not found: {}", path.display())));
            }
            Some(path) => path.clone(),
            None => settings.functions_script_path(),
        };
        let script = runpad_lua::load_script(&path).map_err(|e| {
            CliError::script(e.to_string())
                .with_hint(format!("fix {} or pass --no-script", path.display()))
        })?;
        for warning in &script.warnings {
            log::warn!("{}", warning);
        }
        Some(script)
    };

    let mut fixtures = builtins::fixtures();
    if let Some(path) = cli.fixtures.as_ref().or(settings.fixtures_path.as_ref()) {
        let loaded = load_fixtures(path).map_err(|e| CliError::fixtures(e.to_string()))?;
        log::debug!("{} fixture(s) from {}", loaded.len(), path.display());
        fixtures.extend(loaded);
    }

    let user_functions = script.map(|script| {
        fixtures.extend(script.fixtures);
        script.functions
    });

    let ids = PageIds {
        select: settings.select_id.clone(),
        container: settings.container_id.clone(),
    };
    let missing = format!("page has no #{} or #{} element", ids.select, ids.container);

    Dispatcher::initialize(
        build_page(settings),
        ids,
        Some(builtins::builtin_source()),
        user_functions,
        fixtures,
    )
    .ok_or_else(|| {
        CliError::error(missing).with_hint(format!(
            "check page.elements in {}",
            cli.config
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(Settings::config_path_display)
        ))
    })
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn error(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self { code: EXIT_NOT_FOUND, message: msg.into(), hint: None }
    }

    pub fn script(msg: impl Into<String>) -> Self {
        Self { code: EXIT_SCRIPT, message: msg.into(), hint: None }
    }

    pub fn fixtures(msg: impl Into<String>) -> Self {
        Self { code: EXIT_FIXTURES, message: msg.into(), hint: None }
    }

    pub fn invoke(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INVOKE, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn unknown_function(name: &str) -> CliError {
    CliError::not_found(format!("no function named '{}'", name))
        .with_hint("run `runpad list` to see registered functions")
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::error(e.to_string()))?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", text).map_err(|e| CliError::error(e.to_string()))
}

fn info_json(info: &FunctionInfo, has_fixture: bool) -> serde_json::Value {
    let parameters: Vec<serde_json::Value> = info
        .parameters
        .iter()
        .map(|p| {
            json!({
                "name": p.name,
                "shape": p.shape.as_str(),
                "description": p.description,
                "optional": p.optional,
                "repeatable": p.repeatable,
            })
        })
        .collect();

    json!({
        "name": info.name,
        "origin": info.origin,
        "signature": info.signature(),
        "documentation": info.documentation,
        "parameters": parameters,
        "has_fixture": has_fixture,
    })
}

fn report_json(name: &str, report: &TestReport) -> serde_json::Value {
    json!({
        "name": name,
        "passed": report.passed,
        "input": report.input.to_json(),
        "expected": report.expected.to_json(),
        "actual": report.actual.to_json(),
    })
}

// ============================================================================
// list
// ============================================================================

fn cmd_list(runner: &Dispatcher, json: bool) -> Result<(), CliError> {
    let registry = runner.registry();
    let fixtures = runner.fixtures();

    if json {
        let items: Vec<serde_json::Value> = registry
            .iter()
            .map(|entry| info_json(&entry.info, fixtures.get(entry.name()).is_some()))
            .collect();
        return print_json(&serde_json::Value::Array(items));
    }

    let signatures: Vec<String> = registry.iter().map(|e| e.info.signature()).collect();
    let width = signatures.iter().map(|s| util::display_width(s)).max().unwrap_or(0);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for (entry, signature) in registry.iter().zip(&signatures) {
        let marker = if fixtures.get(entry.name()).is_some() { "*" } else { " " };
        writeln!(handle, "{} {}  {}", marker, util::pad_right(signature, width), entry.info.origin)
            .map_err(|e| CliError::error(e.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// show
// ============================================================================

fn cmd_show(runner: &mut Dispatcher, name: &str, source: bool, json: bool) -> Result<(), CliError> {
    runner.select(name);
    let panel = runner.panel_mut().ok_or_else(|| unknown_function(name))?;
    if source {
        panel.toggle_source();
    }

    if json {
        let mut value = info_json(&panel.entry().info, panel.test.is_some());
        value["source"] = json!(panel.source);
        value["test"] = match &panel.test {
            Some(report) => report_json(name, report),
            None => serde_json::Value::Null,
        };
        return print_json(&value);
    }

    println!("{}", panel.render_text());
    Ok(())
}

// ============================================================================
// run
// ============================================================================

fn cmd_run(runner: &mut Dispatcher, name: &str, args: &[String], json: bool) -> Result<(), CliError> {
    let registry = runner.registry();
    let entry = registry.get(name).ok_or_else(|| unknown_function(name))?;
    let params = &entry.info.parameters;

    let output = if args.len() <= params.len() {
        runner.select(name);
        let panel = runner.panel_mut().ok_or_else(|| unknown_function(name))?;
        for (i, arg) in args.iter().enumerate() {
            panel.set_input(i, arg.as_str());
        }
        runner.run().cloned().ok_or_else(|| unknown_function(name))?
    } else if params.last().is_some_and(|p| p.repeatable) {
        // A panel has one field per parameter; extra values for the
        // trailing repeatable parameter go straight to the function
        let values: Vec<Value> = args.iter().map(|a| parse_field(a, runner.page())).collect();
        match entry.invoke(&values) {
            Ok(value) => RunOutput::Value(value),
            Err(err) => RunOutput::Error(err.to_string()),
        }
    } else {
        return Err(CliError::usage(format!(
            "{} takes at most {} argument(s), got {}",
            name,
            params.len(),
            args.len()
        ))
        .with_hint(format!("usage: {}", entry.info.signature())));
    };

    if json {
        let value = match &output {
            RunOutput::Value(v) => json!({ "ok": true, "output": v.to_json() }),
            RunOutput::Error(msg) => json!({ "ok": false, "error": msg }),
        };
        print_json(&value)?;
    } else {
        println!("{}", output.text());
    }

    // The error line is already on stdout
    match output {
        RunOutput::Value(_) => Ok(()),
        RunOutput::Error(_) => Err(CliError::invoke("")),
    }
}

// ============================================================================
// test
// ============================================================================

fn cmd_test(runner: &Dispatcher, name: Option<&str>, json: bool) -> Result<(), CliError> {
    let registry = runner.registry();
    let fixtures = runner.fixtures();

    let targets: Vec<_> = match name {
        Some(name) => {
            let entry = registry.get(name).ok_or_else(|| unknown_function(name))?;
            if fixtures.get(name).is_none() {
                return Err(CliError::not_found(format!("'{}' has no fixture", name)));
            }
            vec![entry]
        }
        None => registry
            .iter()
            .filter(|entry| fixtures.get(entry.name()).is_some())
            .collect(),
    };

    let reports: Vec<(&str, TestReport)> = targets
        .into_iter()
        .filter_map(|entry| {
            fixtures
                .get(entry.name())
                .map(|fixture| (entry.name(), run_fixture(entry, fixture)))
        })
        .collect();
    let failed = reports.iter().filter(|(_, report)| !report.passed).count();
    let passed = reports.len() - failed;

    if json {
        let results: Vec<serde_json::Value> = reports
            .iter()
            .map(|(name, report)| report_json(name, report))
            .collect();
        print_json(&json!({ "passed": passed, "failed": failed, "results": results }))?;
    } else {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let write_err = |e: io::Error| CliError::error(e.to_string());
        for (name, report) in &reports {
            writeln!(out, "{}  {}", report.badge(), name).map_err(write_err)?;
            if !report.passed {
                for line in report.detail().lines() {
                    writeln!(out, "    {}", line).map_err(write_err)?;
                }
            }
        }
        writeln!(out, "\n{} passed, {} failed", passed, failed).map_err(write_err)?;
    }

    if failed > 0 {
        Err(CliError::error(format!("{} fixture(s) failed", failed)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runpad_config::ElementSpec;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn page_from_settings() {
        let mut settings = Settings::default();
        settings.elements.push(ElementSpec {
            id: Some("chart".to_string()),
            tag: "div".to_string(),
            classes: vec!["wide".to_string()],
            text: "hello".to_string(),
        });
        let page = build_page(&settings);
        assert!(page.element_by_id("functionSelect").is_some());
        assert!(page.element_by_id("functionContainer").is_some());
        let chart = page.element_by_id("chart").unwrap();
        assert_eq!(chart.classes, vec!["wide"]);
        assert_eq!(chart.text, "hello");
    }

    #[test]
    fn negative_numbers_are_values() {
        let cli = Cli::try_parse_from(["runpad", "run", "add", "-2", "3"]).unwrap();
        match cli.command {
            Some(Commands::Run { args, .. }) => assert_eq!(args, vec!["-2", "3"]),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn info_json_lists_parameters() {
        let source = builtins::math_source();
        let add = source.get("add").unwrap();
        let value = info_json(&add.info, true);
        assert_eq!(value["name"], "add");
        assert_eq!(value["parameters"][0]["shape"], "number");
        assert_eq!(value["parameters"][1]["optional"], true);
        assert_eq!(value["has_fixture"], true);
    }
}
