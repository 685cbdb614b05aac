//! End-to-end tests for the scan → convert → store → watch pipeline using a
//! shell script as the external converter.

use anyhow::Result;
use notebook_hub_core::{
    convert::ProcessConverter,
    events::{EventBus, StoreEvent},
    loader::NotebookLoader,
    scanner::scan_all,
    storage::NotebookStore,
    watcher::{watch, ReloadScheduler},
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const CONVERTER: &str = r#"
file="${1#--infile=}"
if grep -q BROKEN "$file"; then
  echo "Traceback: syntax error" >&2
  exit 1
fi
cat "$file"
"#;

struct Fixture {
    _tools: TempDir,
    notebooks: TempDir,
    store: Arc<NotebookStore>,
    events: EventBus,
    loader: Arc<NotebookLoader>,
}

fn fixture() -> Result<Fixture> {
    let tools = TempDir::new()?;
    let script = tools.path().join("convert.sh");
    std::fs::write(&script, CONVERTER)?;
    let converter = ProcessConverter::locate("sh", &script)?;

    let events = EventBus::new();
    let store = Arc::new(NotebookStore::with_events(events.clone()));
    let loader = Arc::new(NotebookLoader::new(
        Arc::new(converter),
        store.clone(),
        "tester",
    ));
    Ok(Fixture {
        _tools: tools,
        notebooks: TempDir::new()?,
        store,
        events,
        loader,
    })
}

fn write(dir: &Path, name: &str, text: &str) -> Result<()> {
    std::fs::write(dir.join(name), text)?;
    Ok(())
}

#[tokio::test]
async fn scan_stores_real_and_fallback_notebooks() -> Result<()> {
    let fx = fixture()?;
    write(fx.notebooks.path(), "a.ipynb", r#"{"cells": [[{"id": 1, "cell_type": "code", "source": "print(1)", "outputs": []}]]}"#)?;
    write(fx.notebooks.path(), "b.ipynb", "BROKEN")?;

    let report = scan_all(fx.notebooks.path(), &fx.loader, 4).await;
    assert_eq!(report.loaded, vec!["a.ipynb"]);
    assert_eq!(report.failed, vec!["b.ipynb"]);

    let list = fx.store.list();
    assert_eq!(list.len(), 2);

    let b = fx.store.get("b.ipynb")?;
    let cells = b.contents()["cells"].as_array().unwrap();
    assert_eq!(cells.len(), 1);
    let source = cells[0][0]["source"].as_str().unwrap();
    assert!(source.contains("syntax error"));
    Ok(())
}

#[tokio::test]
async fn write_event_reloads_notebook() -> Result<()> {
    let fx = fixture()?;
    write(fx.notebooks.path(), "a.ipynb", r#"{"cells": [[{"id": 1, "source": "old"}]]}"#)?;
    scan_all(fx.notebooks.path(), &fx.loader, 4).await;

    let scheduler = ReloadScheduler::new(fx.loader.clone(), Duration::from_millis(50));
    let handle = watch(fx.notebooks.path(), scheduler)?;
    let mut rx = fx.events.subscribe();

    let fresh = json!({"cells": [[{"id": 1, "source": "new"}]]});
    write(fx.notebooks.path(), "a.ipynb", &fresh.to_string())?;

    let reloaded = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = rx.recv().await?;
            if let StoreEvent::Updated { identifier } = &event {
                if identifier == "a.ipynb" && fx.store.get("a.ipynb")?.contents() == &fresh {
                    return Ok::<_, anyhow::Error>(());
                }
            }
        }
    })
    .await;
    assert!(reloaded.is_ok(), "no reload observed within timeout");
    reloaded??;

    assert_eq!(fx.store.len(), 1);
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn write_event_for_new_file_creates_entry() -> Result<()> {
    let fx = fixture()?;
    let scheduler = ReloadScheduler::new(fx.loader.clone(), Duration::from_millis(50));
    let handle = watch(fx.notebooks.path(), scheduler)?;
    let mut rx = fx.events.subscribe();

    write(fx.notebooks.path(), "late.ipynb", "BROKEN")?;

    let created = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await {
                Ok(StoreEvent::Created { identifier }) if identifier == "late.ipynb" => break,
                Ok(_) => continue,
                Err(e) => panic!("event bus closed: {}", e),
            }
        }
    })
    .await;
    assert!(created.is_ok(), "new file was not loaded");

    let doc = fx.store.get("late.ipynb")?;
    assert!(doc.contents()["cells"][0][0]["source"]
        .as_str()
        .unwrap()
        .contains("syntax error"));
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn watcher_on_missing_directory_fails_cleanly() -> Result<()> {
    let fx = fixture()?;
    let scheduler = ReloadScheduler::new(fx.loader.clone(), Duration::from_millis(50));
    let missing = fx.notebooks.path().join("does-not-exist");
    assert!(watch(&missing, scheduler).is_err());
    Ok(())
}
