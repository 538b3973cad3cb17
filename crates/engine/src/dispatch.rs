//! Registry dispatcher: wires the merged registry to the page.
//!
//! On initialization the dispatcher finds the selection control and the
//! panel container on the page, merges the two function sources, and lists
//! one option per function. Every selection change discards the mounted
//! panel and, if the name resolves, mounts a fresh one.

use std::rc::Rc;

use crate::fixture::FixtureSet;
use crate::page::Page;
use crate::panel::{Panel, RunOutput};
use crate::registry::{FunctionSource, Registry};

/// Label of the empty first option.
pub const PLACEHOLDER_LABEL: &str = "-- Select a function --";

/// Element ids the dispatcher needs on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageIds {
    pub select: String,
    pub container: String,
}

impl Default for PageIds {
    fn default() -> Self {
        Self {
            select: "functionSelect".to_string(),
            container: "functionContainer".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    /// Function name; empty for the placeholder
    pub value: String,
    pub label: String,
}

pub struct Dispatcher {
    page: Page,
    ids: PageIds,
    registry: Rc<Registry>,
    fixtures: FixtureSet,
    options: Vec<SelectOption>,
    selected: String,
    /// Panel mounted in the container, if any
    panel: Option<Panel>,
}

impl Dispatcher {
    /// Returns None (after logging a warning) when the page lacks the
    /// selection control or the container.
    pub fn initialize(
        page: Page,
        ids: PageIds,
        first: Option<FunctionSource>,
        second: Option<FunctionSource>,
        fixtures: FixtureSet,
    ) -> Option<Self> {
        if page.element_by_id(&ids.select).is_none() || page.element_by_id(&ids.container).is_none() {
            log::warn!(
                "initialize: missing #{} or #{} on the page",
                ids.select,
                ids.container
            );
            return None;
        }

        let registry = Rc::new(Registry::merge(first, second));

        let mut options = vec![SelectOption {
            value: String::new(),
            label: PLACEHOLDER_LABEL.to_string(),
        }];
        options.extend(registry.names().map(|name| SelectOption {
            value: name.to_string(),
            label: name.to_string(),
        }));

        log::info!(
            "runner ready: {} function(s), {} fixture(s)",
            registry.len(),
            fixtures.len()
        );

        Some(Self {
            page,
            ids,
            registry,
            fixtures,
            options,
            selected: String::new(),
            panel: None,
        })
    }

    /// Shared handle to the merged registry.
    pub fn registry(&self) -> Rc<Registry> {
        Rc::clone(&self.registry)
    }

    pub fn fixtures(&self) -> &FixtureSet {
        &self.fixtures
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn ids(&self) -> &PageIds {
        &self.ids
    }

    pub fn options(&self) -> &[SelectOption] {
        &self.options
    }

    pub fn selected(&self) -> &str {
        &self.selected
    }

    /// Selection-change handler. Clears the container, then mounts a new
    /// panel when `name` is a registered function.
    pub fn select(&mut self, name: &str) {
        self.panel = None;
        self.selected = name.to_string();

        if name.is_empty() {
            return;
        }
        match self.registry.get(name) {
            Some(entry) => {
                self.panel = Some(Panel::build(entry, self.fixtures.get(name)));
            }
            None => log::debug!("no function named {name:?}"),
        }
    }

    pub fn panel(&self) -> Option<&Panel> {
        self.panel.as_ref()
    }

    pub fn panel_mut(&mut self) -> Option<&mut Panel> {
        self.panel.as_mut()
    }

    /// Run the mounted panel, if any.
    pub fn run(&mut self) -> Option<&RunOutput> {
        let page = &self.page;
        self.panel.as_mut().map(|panel| panel.run(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Fixture;
    use crate::page::Element;
    use crate::registry::{FunctionEntry, FunctionError, FunctionInfo, ParameterInfo};
    use crate::value::{Shape, Value};

    fn page() -> Page {
        Page::new()
            .with_element(Element::new("select").with_id("functionSelect"))
            .with_element(Element::new("div").with_id("functionContainer"))
    }

    fn sum(args: &[Value]) -> Result<Value, FunctionError> {
        Ok(Value::Number(args.iter().filter_map(Value::as_f64).sum()))
    }

    fn sum_source(origin: &str) -> FunctionSource {
        let mut source = FunctionSource::new(origin);
        source.insert(FunctionEntry::new(
            FunctionInfo {
                name: "sum".into(),
                documentation: "/** Adds */".into(),
                parameters: vec![
                    ParameterInfo::new("a", Shape::Number),
                    ParameterInfo::new("b", Shape::Number),
                ],
                source: String::new(),
                origin: origin.into(),
            },
            Rc::new(sum),
        ));
        source
    }

    fn fixtures(expected: f64) -> FixtureSet {
        let mut set = FixtureSet::new();
        set.insert(
            "sum",
            Fixture::new(vec![vec![Value::Number(2.0), Value::Number(3.0)]], Value::Number(expected)),
        );
        set
    }

    #[test]
    fn missing_elements_abort_initialization() {
        let no_select = Page::new().with_element(Element::new("div").with_id("functionContainer"));
        assert!(Dispatcher::initialize(no_select, PageIds::default(), None, None, FixtureSet::new()).is_none());

        let no_container = Page::new().with_element(Element::new("select").with_id("functionSelect"));
        assert!(Dispatcher::initialize(no_container, PageIds::default(), None, None, FixtureSet::new()).is_none());
    }

    #[test]
    fn options_follow_registry_order() {
        let d = Dispatcher::initialize(page(), PageIds::default(), Some(sum_source("a")), None, FixtureSet::new())
            .unwrap();
        let values: Vec<&str> = d.options().iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["", "sum"]);
        assert_eq!(d.options()[0].label, PLACEHOLDER_LABEL);
    }

    #[test]
    fn second_source_overrides() {
        let d = Dispatcher::initialize(
            page(),
            PageIds::default(),
            Some(sum_source("first")),
            Some(sum_source("second")),
            FixtureSet::new(),
        )
        .unwrap();
        assert_eq!(d.registry().get("sum").unwrap().info.origin, "second");
        assert_eq!(d.options().len(), 2);
    }

    #[test]
    fn select_mounts_panel_with_fixture() {
        let mut d =
            Dispatcher::initialize(page(), PageIds::default(), Some(sum_source("a")), None, fixtures(5.0)).unwrap();
        d.select("sum");
        let panel = d.panel().unwrap();
        assert!(panel.test.as_ref().unwrap().passed);

        let mut d =
            Dispatcher::initialize(page(), PageIds::default(), Some(sum_source("a")), None, fixtures(6.0)).unwrap();
        d.select("sum");
        let report = d.panel().unwrap().test.clone().unwrap();
        assert!(!report.passed);
        assert_eq!(report.actual, Value::Number(5.0));
    }

    #[test]
    fn placeholder_or_unknown_clears_panel() {
        let mut d = Dispatcher::initialize(page(), PageIds::default(), Some(sum_source("a")), None, FixtureSet::new())
            .unwrap();
        d.select("sum");
        assert!(d.panel().is_some());
        d.select("");
        assert!(d.panel().is_none());
        d.select("sum");
        d.select("does-not-exist");
        assert!(d.panel().is_none());
        assert_eq!(d.selected(), "does-not-exist");
    }

    #[test]
    fn reselect_builds_fresh_panel() {
        let mut d = Dispatcher::initialize(page(), PageIds::default(), Some(sum_source("a")), None, FixtureSet::new())
            .unwrap();
        d.select("sum");
        d.panel_mut().unwrap().set_input(0, "1");
        d.select("sum");
        assert_eq!(d.panel().unwrap().fields[0].value, "");
    }

    #[test]
    fn run_mounted_panel() {
        let mut d = Dispatcher::initialize(page(), PageIds::default(), Some(sum_source("a")), None, FixtureSet::new())
            .unwrap();
        assert!(d.run().is_none());
        d.select("sum");
        let panel = d.panel_mut().unwrap();
        panel.set_input(0, "4");
        panel.set_input(1, "5");
        assert_eq!(d.run().unwrap().text(), "Output: 9");
    }
}
