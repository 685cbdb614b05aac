use anyhow::Result;
use clap::Parser;
use notebook_hub::app;
use notebook_hub_core::{config::NotebookConfig, hub::NotebookHub};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "notebook-hub")]
#[command(about = "Serve a directory of notebooks over HTTP and reload them as they change")]
struct Cli {
    /// Listen address
    #[arg(short, long, env = "NOTEBOOK_ADDR", default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Directory of notebook source files
    #[arg(short = 'd', long, env = "NOTEBOOK_DIR")]
    notebook_dir: Option<PathBuf>,

    /// Interpreter used to run the converter script
    #[arg(long, env = "NOTEBOOK_INTERPRETER")]
    interpreter: Option<String>,

    /// Converter script, invoked as `<interpreter> <script> --infile=<path>`
    #[arg(long, env = "NOTEBOOK_CONVERTER")]
    converter_script: Option<PathBuf>,

    /// Author recorded on loaded notebooks
    #[arg(long, env = "NOTEBOOK_AUTHOR")]
    author: Option<String>,

    /// Seconds before a running conversion is killed
    #[arg(long, env = "NOTEBOOK_CONVERT_TIMEOUT")]
    convert_timeout: Option<u64>,

    /// Extra attempts for a failed conversion
    #[arg(long, env = "NOTEBOOK_CONVERT_RETRIES")]
    convert_retries: Option<u32>,

    /// Conversions run in parallel during the startup scan
    #[arg(long, env = "NOTEBOOK_SCAN_CONCURRENCY")]
    scan_concurrency: Option<usize>,

    /// Milliseconds to wait for a burst of writes to settle before reloading
    #[arg(long, env = "NOTEBOOK_RELOAD_DEBOUNCE_MS")]
    reload_debounce_ms: Option<u64>,

    /// Directory served under /static
    #[arg(long, env = "NOTEBOOK_STATIC_DIR")]
    static_dir: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> NotebookConfig {
        let mut config = NotebookConfig::default();
        if let Some(dir) = &self.notebook_dir {
            config.notebook_dir = dir.clone();
        }
        if let Some(interpreter) = &self.interpreter {
            config.interpreter = interpreter.clone();
        }
        if let Some(script) = &self.converter_script {
            config.converter_script = script.clone();
        }
        if let Some(author) = &self.author {
            config.author = author.clone();
        }
        if self.convert_timeout.is_some() {
            config.convert_timeout_secs = self.convert_timeout;
        }
        if let Some(retries) = self.convert_retries {
            config.convert_retries = retries;
        }
        if let Some(n) = self.scan_concurrency {
            config.scan_concurrency = n;
        }
        if let Some(ms) = self.reload_debounce_ms {
            config.reload_debounce_ms = ms;
        }
        if self.static_dir.is_some() {
            config.static_dir = self.static_dir.clone();
        }
        config
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    // the scan completes inside start(), before the listener is bound
    let hub = NotebookHub::start(&config).await?;
    let app = app::build_router(hub.store().clone(), config.static_dir.as_deref());

    let listener = TcpListener::bind(cli.addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
