//! Startup sequence: locate the converter, scan the notebook directory, then
//! start watching it.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{ConfigError, NotebookConfig};
use crate::convert::{Converter, ProcessConverter};
use crate::events::{log_events, EventBus};
use crate::loader::NotebookLoader;
use crate::scanner::{scan_all, ScanReport};
use crate::storage::NotebookStore;
use crate::watcher::{watch, ReloadScheduler, WatchHandle};

pub struct NotebookHub {
    store: Arc<NotebookStore>,
    events: EventBus,
    scan: ScanReport,
    watch: Option<WatchHandle>,
}

impl NotebookHub {
    /// Fails only when the converter's interpreter cannot be found.
    pub async fn start(config: &NotebookConfig) -> Result<Self, ConfigError> {
        let converter = ProcessConverter::from_config(config)?;
        info!("converter: {}", converter.interpreter().display());
        Ok(Self::start_with(config, Arc::new(converter)).await)
    }

    /// Scan and watch with an already constructed converter. The scan has
    /// finished by the time this returns.
    pub async fn start_with(config: &NotebookConfig, converter: Arc<dyn Converter>) -> Self {
        let events = EventBus::new();
        tokio::spawn(log_events(events.subscribe()));
        let store = Arc::new(NotebookStore::with_events(events.clone()));
        let loader = Arc::new(NotebookLoader::new(
            converter,
            store.clone(),
            config.author.clone(),
        ));

        let scan = scan_all(&config.notebook_dir, &loader, config.scan_concurrency).await;
        info!(
            "loaded {} notebooks ({} failed to convert)",
            scan.total(),
            scan.failed.len()
        );
        for id in &scan.failed {
            warn!("{} is being served with a conversion error", id);
        }

        let scheduler = ReloadScheduler::new(loader, config.reload_debounce());
        let watch = match watch(&config.notebook_dir, scheduler) {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(
                    "cannot watch {}: {}; live reload disabled",
                    config.notebook_dir.display(),
                    e
                );
                None
            }
        };

        Self {
            store,
            events,
            scan,
            watch,
        }
    }

    pub fn store(&self) -> &Arc<NotebookStore> {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn scan_report(&self) -> &ScanReport {
        &self.scan
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }
}
