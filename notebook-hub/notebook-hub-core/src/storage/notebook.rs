//! In-memory notebook storage shared by the scanner, the watcher and the HTTP
//! handlers. Entries are replaced whole under a single lock so readers never
//! observe a partially built notebook.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::events::{EventBus, StoreEvent};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("notebook not found: {0}")]
    NotFound(String),
}

/// A parsed notebook. `contents` is passed through untouched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Notebook {
    identifier: String,
    #[serde(rename = "name")]
    title: String,
    author: String,
    contents: Value,
    updated_at: DateTime<Utc>,
}

/// Metadata-only view returned by listings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotebookSummary {
    pub identifier: String,
    #[serde(rename = "name")]
    pub title: String,
    pub author: String,
    pub updated_at: DateTime<Utc>,
}

impl Notebook {
    pub fn new(
        identifier: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        contents: Value,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            author: author.into(),
            contents,
            updated_at: Utc::now(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn contents(&self) -> &Value {
        &self.contents
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn summary(&self) -> NotebookSummary {
        NotebookSummary {
            identifier: self.identifier.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Concurrent map from identifier to [`Notebook`].
///
/// Writes to the same identifier are serialized by the lock and the last
/// commit wins. Nothing outside this type touches the map directly.
pub struct NotebookStore {
    docs: RwLock<BTreeMap<String, Notebook>>,
    events: Option<EventBus>,
}

impl NotebookStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            events: None,
        }
    }

    /// Publish a [`StoreEvent`] on `events` after every committed write.
    pub fn with_events(events: EventBus) -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            events: Some(events),
        }
    }

    /// Create or replace the notebook stored under `identifier`.
    /// Returns `true` when the identifier was not present before.
    pub fn upsert(
        &self,
        identifier: &str,
        title: &str,
        author: &str,
        contents: Value,
    ) -> bool {
        let notebook = Notebook::new(identifier, title, author, contents);
        let created = self
            .docs
            .write()
            .insert(identifier.to_string(), notebook)
            .is_none();
        let identifier = identifier.to_string();
        self.publish(if created {
            StoreEvent::Created { identifier }
        } else {
            StoreEvent::Updated { identifier }
        });
        created
    }

    pub fn get(&self, identifier: &str) -> Result<Notebook, StoreError> {
        self.docs
            .read()
            .get(identifier)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))
    }

    /// Summaries of every notebook, in identifier order.
    pub fn list(&self) -> Vec<NotebookSummary> {
        self.docs.read().values().map(Notebook::summary).collect()
    }

    /// Replace only the contents of an existing notebook. Never creates one.
    pub fn set_content(&self, identifier: &str, contents: Value) -> Result<(), StoreError> {
        {
            let mut docs = self.docs.write();
            let doc = docs
                .get_mut(identifier)
                .ok_or_else(|| StoreError::NotFound(identifier.to_string()))?;
            doc.contents = contents;
            doc.updated_at = Utc::now();
        }
        self.publish(StoreEvent::ContentSet {
            identifier: identifier.to_string(),
        });
        Ok(())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.docs.read().contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    fn publish(&self, event: StoreEvent) {
        if let Some(events) = &self.events {
            events.send(event);
        }
    }
}

impl Default for NotebookStore {
    fn default() -> Self {
        Self::new()
    }
}
