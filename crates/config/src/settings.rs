// Application settings
// Loaded from ~/.config/runpad/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// An element placed on the page at startup, addressable from inputs with
/// `{"_selector": "#id"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub tag: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

impl ElementSpec {
    pub fn new(tag: &str, id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            tag: tag.to_string(),
            classes: Vec::new(),
            text: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Page
    #[serde(rename = "page.selectId")]
    pub select_id: String,

    #[serde(rename = "page.containerId")]
    pub container_id: String,

    #[serde(rename = "page.elements")]
    pub elements: Vec<ElementSpec>,

    // Sources
    #[serde(rename = "scripts.functions")]
    pub functions_script: Option<PathBuf>,  // None = <config dir>/functions.lua

    #[serde(rename = "fixtures.path")]
    pub fixtures_path: Option<PathBuf>,

    // UI
    #[serde(rename = "ui.showSource")]
    pub show_source: bool,

    // Logging
    #[serde(rename = "log.level")]
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Page
            select_id: "functionSelect".to_string(),
            container_id: "functionContainer".to_string(),
            elements: default_elements(),
            // Sources
            functions_script: None,
            fixtures_path: None,
            // UI
            show_source: false,
            // Logging
            log_level: "warn".to_string(),
        }
    }
}

fn default_elements() -> Vec<ElementSpec> {
    vec![
        ElementSpec::new("select", "functionSelect"),
        ElementSpec::new("div", "functionContainer"),
        ElementSpec::new("svg", "test-svg"),
    ]
}

const DEFAULT_CONFIG: &str = r##"{
    // Page layout: the selection control and panel container must exist
    "page.selectId": "functionSelect",
    "page.containerId": "functionContainer",

    // Elements on the page. The two above must be listed here; the rest can
    // be referenced from inputs with {"_selector": "#test-svg"}
    "page.elements": [
        { "id": "functionSelect", "tag": "select" },
        { "id": "functionContainer", "tag": "div" },
        { "id": "test-svg", "tag": "svg" }
    ],

    // User functions (null = functions.lua next to this file)
    "scripts.functions": null,

    // Extra fixtures as JSON: { "name": { "inputs": [[...]], "expected": ... } }
    "fixtures.path": null,

    // Panels open with the source view expanded
    "ui.showSource": false,

    // Default log filter when RUNPAD_LOG is not set
    "log.level": "warn"
}
"##;

impl Settings {
    /// Directory holding settings.json and functions.lua
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("runpad")
    }

    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("settings.json")
    }

    /// Load settings from disk, falling back to defaults. Writes a commented
    /// default file on first run.
    pub fn load() -> Self {
        Self::try_load().unwrap_or_else(Self::fallback)
    }

    /// Like `load`, but an unreadable or invalid file is returned as an error
    /// instead of being replaced by defaults.
    pub fn try_load() -> Result<Self, String> {
        let path = Self::config_path();

        if !path.exists() {
            if let Err(e) = Self::create_default_file(&path) {
                log::warn!("Error writing default settings.json: {}", e);
            }
            return Ok(Self::default());
        }

        Self::try_load_from(&path)
    }

    /// Load from an explicit path. Missing or invalid files give defaults.
    pub fn load_from(path: &Path) -> Self {
        Self::try_load_from(path).unwrap_or_else(Self::fallback)
    }

    /// Load from an explicit path. A missing file gives defaults; a file
    /// that cannot be read or parsed is an error.
    pub fn try_load_from(path: &Path) -> Result<Self, String> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                Self::parse(&contents).map_err(|e| format!("Error parsing {}: {}", path.display(), e))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(format!("Error reading {}: {}", path.display(), e)),
        }
    }

    fn fallback(message: String) -> Self {
        log::warn!("{}", message);
        log::warn!("Using default settings");
        Self::default()
    }

    /// Parse settings JSON. Lines starting with `//` are comments.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;

        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Write the commented default settings file
    pub fn create_default_file(path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        fs::write(path, DEFAULT_CONFIG).map_err(|e| e.to_string())
    }

    /// Script path: the configured one, else functions.lua beside the
    /// settings file
    pub fn functions_script_path(&self) -> PathBuf {
        self.functions_script
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("functions.lua"))
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}
