//! Runtime configuration for the notebook pipeline.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("interpreter `{name}` not found on PATH: {source}")]
    InterpreterNotFound {
        name: String,
        #[source]
        source: which::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotebookConfig {
    /// Directory scanned at startup and watched afterwards
    #[serde(default = "default_notebook_dir")]
    pub notebook_dir: PathBuf,

    /// Interpreter looked up on PATH to run the converter script
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Script passed to the interpreter, invoked as `<script> --infile=<path>`
    #[serde(default = "default_converter_script")]
    pub converter_script: PathBuf,

    /// Author recorded on every loaded notebook
    #[serde(default = "default_author")]
    pub author: String,

    /// Kill a conversion that runs longer than this (no limit when unset)
    #[serde(default)]
    pub convert_timeout_secs: Option<u64>,

    /// Extra attempts after a failed conversion
    #[serde(default)]
    pub convert_retries: u32,

    /// Conversions allowed in flight during the startup scan
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,

    /// Quiet period before a watched write triggers a reload
    #[serde(default = "default_reload_debounce_ms")]
    pub reload_debounce_ms: u64,

    /// Served under `/static` when set
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_notebook_dir() -> PathBuf { PathBuf::from("../notebooks") }
fn default_interpreter() -> String { "python".to_string() }
fn default_converter_script() -> PathBuf { PathBuf::from("../src/parser.py") }
fn default_author() -> String { "unknown".to_string() }
fn default_scan_concurrency() -> usize { 4 }
fn default_reload_debounce_ms() -> u64 { 100 }

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            notebook_dir: default_notebook_dir(),
            interpreter: default_interpreter(),
            converter_script: default_converter_script(),
            author: default_author(),
            convert_timeout_secs: None,
            convert_retries: 0,
            scan_concurrency: default_scan_concurrency(),
            reload_debounce_ms: default_reload_debounce_ms(),
            static_dir: None,
        }
    }
}

impl NotebookConfig {
    pub fn convert_timeout(&self) -> Option<Duration> {
        self.convert_timeout_secs.map(Duration::from_secs)
    }

    pub fn reload_debounce(&self) -> Duration {
        Duration::from_millis(self.reload_debounce_ms)
    }
}
