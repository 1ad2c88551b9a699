use serde::{Deserialize, Serialize};

/// Configuration from daymx.toml. Every section and field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Quiescence window for coalescing remote writes, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Context assumed for availability when none is given on the command line
    #[serde(default)]
    pub active_context: Option<String>,
    /// Include completed tasks in the task view by default
    #[serde(default)]
    pub show_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    /// Joins category names in shopping-list headings and task locations
    #[serde(default = "default_separator")]
    pub breadcrumb_separator: String,
    /// Width budget for task text in the task view (0 = unlimited)
    #[serde(default = "default_text_width")]
    pub text_width: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            breadcrumb_separator: default_separator(),
            text_width: default_text_width(),
        }
    }
}

/// Default: see src/templates/daymx.toml
fn default_debounce_ms() -> u64 {
    250
}

/// Default: see src/templates/daymx.toml
fn default_separator() -> String {
    " › ".to_string()
}

/// Default: see src/templates/daymx.toml
fn default_text_width() -> usize {
    60
}
