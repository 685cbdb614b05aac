//! Conversion of notebook source files into JSON contents by way of an
//! external converter process.

use async_trait::async_trait;
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{ConfigError, NotebookConfig};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("failed to run converter: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("converter failed ({status}):\n{output}")]
    Exit { status: ExitStatus, output: String },
    #[error("converter produced invalid JSON ({source}):\n{output}")]
    Malformed {
        #[source]
        source: serde_json::Error,
        output: String,
    },
    #[error("converter output is not a JSON object:\n{output}")]
    NotAnObject { output: String },
    #[error("converter did not finish within {0:?}")]
    TimedOut(Duration),
}

impl ConvertError {
    /// Raw stdout and stderr of the failed run, when the process ran at all.
    pub fn output(&self) -> Option<&str> {
        match self {
            ConvertError::Exit { output, .. }
            | ConvertError::Malformed { output, .. }
            | ConvertError::NotAnObject { output } => Some(output),
            ConvertError::Spawn(_) | ConvertError::TimedOut(_) => None,
        }
    }
}

/// Turns one source file into notebook contents.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, path: &Path) -> Result<Value, ConvertError>;
}

/// Runs `<interpreter> <script> --infile=<path>` once per call and parses
/// its stdout as a JSON object.
#[derive(Debug, Clone)]
pub struct ProcessConverter {
    interpreter: PathBuf,
    script: PathBuf,
    timeout: Option<Duration>,
    retries: u32,
}

impl ProcessConverter {
    pub fn new(interpreter: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            timeout: None,
            retries: 0,
        }
    }

    /// Resolve `interpreter` on PATH. A missing interpreter is a
    /// configuration error: nothing can be converted without it.
    pub fn locate(interpreter: &str, script: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = which::which(interpreter).map_err(|source| ConfigError::InterpreterNotFound {
            name: interpreter.to_string(),
            source,
        })?;
        debug!("using interpreter {}", path.display());
        Ok(Self::new(path, script))
    }

    pub fn from_config(config: &NotebookConfig) -> Result<Self, ConfigError> {
        Ok(Self::locate(&config.interpreter, &config.converter_script)?
            .with_timeout(config.convert_timeout())
            .with_retries(config.convert_retries))
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retry a failed conversion up to `retries` more times, doubling the
    /// pause between attempts.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    async fn run_once(&self, path: &Path) -> Result<Value, ConvertError> {
        let mut infile = OsString::from("--infile=");
        infile.push(path.as_os_str());

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&self.script)
            .arg(infile)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| ConvertError::TimedOut(limit))??,
            None => cmd.output().await?,
        };
        parse_output(&output)
    }
}

#[async_trait]
impl Converter for ProcessConverter {
    async fn convert(&self, path: &Path) -> Result<Value, ConvertError> {
        let mut attempt = 0;
        let mut delay = RETRY_BASE_DELAY;
        loop {
            match self.run_once(path).await {
                Ok(contents) => return Ok(contents),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "conversion of {} failed (attempt {}/{}): {}",
                        path.display(),
                        attempt,
                        self.retries + 1,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn parse_output(output: &Output) -> Result<Value, ConvertError> {
    let combined = || {
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        text.trim_end().to_string()
    };
    if !output.status.success() {
        return Err(ConvertError::Exit {
            status: output.status,
            output: combined(),
        });
    }
    match serde_json::from_slice::<Value>(&output.stdout) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(ConvertError::NotAnObject { output: combined() }),
        Err(source) => Err(ConvertError::Malformed {
            source,
            output: combined(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const SCRIPT: &str = r#"
file="${1#--infile=}"
case "$(cat "$file")" in
  *FAIL*) echo "partial output"; echo "syntax error" >&2; exit 1 ;;
  *SLOW*) sleep 5 ;;
  *FLAKY*)
    if [ ! -f "$file.seen" ]; then touch "$file.seen"; exit 3; fi
    echo '{"cells": []}'; exit 0 ;;
esac
cat "$file"
"#;

    fn setup() -> (TempDir, ProcessConverter) {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("convert.sh");
        std::fs::write(&script, SCRIPT).unwrap();
        let converter = ProcessConverter::locate("sh", script).unwrap();
        (dir, converter)
    }

    fn source(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[tokio::test]
    async fn converts_json_object() {
        let (dir, converter) = setup();
        let path = source(&dir, "a.ipynb", r#"{"cells": [[{"id": 1, "source": "x"}]]}"#);
        let contents = converter.convert(&path).await.unwrap();
        assert_eq!(contents, json!({"cells": [[{"id": 1, "source": "x"}]]}));
    }

    #[tokio::test]
    async fn nonzero_exit_keeps_stdout_and_stderr() {
        let (dir, converter) = setup();
        let path = source(&dir, "b.ipynb", "FAIL");
        let err = converter.convert(&path).await.unwrap_err();
        assert!(matches!(err, ConvertError::Exit { .. }));
        let output = err.output().unwrap();
        assert!(output.contains("partial output"));
        assert!(output.contains("syntax error"));
        assert!(err.to_string().contains("syntax error"));
    }

    #[tokio::test]
    async fn garbled_output_is_malformed() {
        let (dir, converter) = setup();
        let path = source(&dir, "c.ipynb", "{\"cells\": [[");
        let err = converter.convert(&path).await.unwrap_err();
        assert!(matches!(err, ConvertError::Malformed { .. }));
        assert_eq!(err.output(), Some("{\"cells\": [["));
    }

    #[tokio::test]
    async fn non_object_json_is_rejected() {
        let (dir, converter) = setup();
        let path = source(&dir, "d.ipynb", "[1, 2, 3]");
        let err = converter.convert(&path).await.unwrap_err();
        assert!(matches!(err, ConvertError::NotAnObject { .. }));
    }

    #[tokio::test]
    async fn slow_conversion_times_out() {
        let (dir, converter) = setup();
        let converter = converter.with_timeout(Some(Duration::from_millis(100)));
        let path = source(&dir, "e.ipynb", "SLOW");
        let err = converter.convert(&path).await.unwrap_err();
        assert!(matches!(err, ConvertError::TimedOut(_)));
        assert!(err.output().is_none());
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failure() {
        let (dir, converter) = setup();
        let path = source(&dir, "f.ipynb", "FLAKY");
        assert!(converter.convert(&path).await.is_err());

        let path = source(&dir, "g.ipynb", "FLAKY");
        let retried = converter.with_retries(1).convert(&path).await;
        assert_eq!(retried.unwrap(), json!({"cells": []}));
    }

    #[test]
    fn missing_interpreter_is_config_error() {
        let err = ProcessConverter::locate("definitely-not-an-interpreter-4821", "x.py").unwrap_err();
        assert!(matches!(err, ConfigError::InterpreterNotFound { .. }));
        assert!(err.to_string().contains("definitely-not-an-interpreter-4821"));
    }
}
