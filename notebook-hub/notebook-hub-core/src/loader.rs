use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::convert::{ConvertError, Converter};
use crate::fallback;
use crate::storage::NotebookStore;

/// What ended up in the store for one loaded file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Converted(String),
    Fallback(String),
}

impl LoadOutcome {
    pub fn identifier(&self) -> &str {
        match self {
            LoadOutcome::Converted(id) | LoadOutcome::Fallback(id) => id,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, LoadOutcome::Fallback(_))
    }
}

/// A finished conversion that has not been written to the store yet.
#[derive(Debug)]
pub struct Conversion {
    identifier: String,
    result: Result<Value, ConvertError>,
}

impl Conversion {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Identifier for a source file: its base name.
pub fn identifier_for(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

pub(crate) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Converter → store path shared by the startup scan and live reloads.
pub struct NotebookLoader {
    converter: Arc<dyn Converter>,
    store: Arc<NotebookStore>,
    author: String,
}

impl NotebookLoader {
    pub fn new(
        converter: Arc<dyn Converter>,
        store: Arc<NotebookStore>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            converter,
            store,
            author: author.into(),
        }
    }

    pub fn store(&self) -> &Arc<NotebookStore> {
        &self.store
    }

    /// Run the converter on `path` without touching the store. Returns
    /// `None` only for paths without a file name.
    pub async fn convert(&self, path: &Path) -> Option<Conversion> {
        let identifier = identifier_for(path)?;
        let result = self.converter.convert(path).await;
        if let Err(e) = &result {
            warn!("failed to convert {}: {}", path.display(), e);
        }
        Some(Conversion { identifier, result })
    }

    /// Upsert a finished conversion, substituting the error notebook when
    /// it failed.
    pub fn commit(&self, conversion: Conversion) -> LoadOutcome {
        let Conversion { identifier, result } = conversion;
        match result {
            Ok(contents) => {
                self.store
                    .upsert(&identifier, &identifier, &self.author, contents);
                debug!("loaded {}", identifier);
                LoadOutcome::Converted(identifier)
            }
            Err(e) => {
                let contents = fallback::build_error(&e.to_string());
                self.store
                    .upsert(&identifier, &identifier, &self.author, contents);
                LoadOutcome::Fallback(identifier)
            }
        }
    }

    /// Convert `path` and upsert the result, falling back to an error
    /// notebook when conversion fails.
    pub async fn load(&self, path: &Path) -> Option<LoadOutcome> {
        let conversion = self.convert(path).await?;
        Some(self.commit(conversion))
    }
}
