//! Headless page model.
//!
//! A page is a flat, ordered list of elements. The dispatcher looks up its
//! selection control and panel container here, and user input can point at
//! any element through a selector (see `input::SELECTOR_MARKER`).

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: Option<String>,
    pub tag: String,
    pub classes: Vec<String>,
    pub text: String,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            id: None,
            tag: tag.into(),
            classes: Vec::new(),
            text: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    fn matches(&self, sel: &SimpleSelector) -> bool {
        if let Some(tag) = &sel.tag {
            if !self.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &sel.id {
            if self.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        sel.classes.iter().all(|c| self.classes.iter().any(|own| own == c))
    }
}

/// Result of resolving a selector: the first matching element, or an empty
/// reference when nothing matched.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRef {
    pub selector: String,
    pub element: Option<Element>,
}

impl ElementRef {
    pub fn is_empty(&self) -> bool {
        self.element.is_none()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("selector".into(), serde_json::Value::String(self.selector.clone()));
        match &self.element {
            Some(el) => {
                map.insert("tag".into(), serde_json::Value::String(el.tag.clone()));
                if let Some(id) = &el.id {
                    map.insert("id".into(), serde_json::Value::String(id.clone()));
                }
                if !el.classes.is_empty() {
                    map.insert(
                        "classes".into(),
                        serde_json::Value::Array(
                            el.classes.iter().cloned().map(serde_json::Value::String).collect(),
                        ),
                    );
                }
                map.insert("text".into(), serde_json::Value::String(el.text.clone()));
            }
            None => {
                map.insert("empty".into(), serde_json::Value::Bool(true));
            }
        }
        serde_json::Value::Object(map)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    elements: Vec<Element>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.push(element);
        self
    }

    pub fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element_by_id(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|el| el.id.as_deref() == Some(id))
    }

    /// Resolve a compound selector (`tag`, `#id`, `.class`, or a combination
    /// like `svg#chart.wide`) to the first matching element in page order.
    /// Unsupported selectors resolve to an empty reference.
    pub fn select(&self, selector: &str) -> ElementRef {
        let element = parse_selector(selector.trim())
            .and_then(|sel| self.elements.iter().find(|el| el.matches(&sel)))
            .cloned();
        ElementRef {
            selector: selector.to_string(),
            element,
        }
    }
}

#[derive(Debug, Default)]
struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

fn parse_selector(s: &str) -> Option<SimpleSelector> {
    if s.is_empty() {
        return None;
    }

    let mut sel = SimpleSelector::default();
    // Current segment kind: None = tag, Some('#') = id, Some('.') = class
    let mut kind: Option<char> = None;
    let mut buf = String::new();

    for ch in s.chars() {
        match ch {
            '#' | '.' => {
                if !flush(kind, &mut buf, &mut sel) {
                    return None;
                }
                kind = Some(ch);
            }
            c if c.is_alphanumeric() || c == '-' || c == '_' => buf.push(c),
            _ => return None,
        }
    }
    if !flush(kind, &mut buf, &mut sel) {
        return None;
    }

    Some(sel)
}

/// Commit the pending segment. Returns false for an empty `#`/`.` segment
/// or a second id.
fn flush(kind: Option<char>, buf: &mut String, sel: &mut SimpleSelector) -> bool {
    let part = std::mem::take(buf);
    match kind {
        None if part.is_empty() => true,
        None => {
            sel.tag = Some(part);
            true
        }
        Some(_) if part.is_empty() => false,
        Some('#') => sel.id.replace(part).is_none(),
        Some(_) => {
            sel.classes.push(part);
            true
        }
    }
}
