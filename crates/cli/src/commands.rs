//! Execution of parsed subcommands against a [`DocService`]

use anyhow::{Context, Result};
use doclib_service::{DocService, MaintenanceScheduler};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::Commands;

/// Writes command results as JSON
pub struct JsonOutput<W> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonOutput<W> {
    pub fn new(writer: W, pretty: bool) -> Self {
        Self { writer, pretty }
    }

    pub fn emit<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, value)?;
        } else {
            serde_json::to_writer(&mut self.writer, value)?;
        }
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Run one command and write its result
pub async fn execute<W: Write>(
    service: &Arc<DocService>,
    command: Commands,
    output: &mut JsonOutput<W>,
) -> Result<()> {
    match command {
        Commands::Tree { path, depth } => {
            let snapshot = match (path, depth) {
                (None, None) => service.get_tree().await,
                (path, depth) => {
                    let path = path.unwrap_or_default();
                    let depth = depth.unwrap_or(service.config().max_tree_depth);
                    service
                        .get_subtree_with_depth(&path, depth)
                        .await
                        .with_context(|| format!("failed to build tree for '{path}'"))?
                }
            };
            output.emit(snapshot.as_ref())
        }
        Commands::Content { path } => {
            let document = service
                .get_content(&path)
                .await
                .with_context(|| format!("failed to read '{path}'"))?;
            output.emit(document.as_ref())
        }
        Commands::Metadata { path } => {
            let metadata = service
                .get_metadata(&path)
                .await
                .with_context(|| format!("failed to read metadata for '{path}'"))?;
            output.emit(&metadata)
        }
        Commands::File { path } => {
            let file = service
                .get_file(&path)
                .await
                .with_context(|| format!("failed to resolve '{path}'"))?;
            output.emit(&file)
        }
        Commands::Breadcrumb { path } => {
            let items = service.get_breadcrumb(&path).await?;
            output.emit(&items)
        }
        Commands::Recent { limit } => {
            let documents = service
                .get_recent_docs(limit)
                .await
                .context("failed to list recent documents")?;
            output.emit(&documents)
        }
        Commands::Stats => output.emit(&service.stats()),
        Commands::Watch => {
            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("interrupt received"),
                    Err(e) => warn!(error = %e, "failed to listen for interrupt"),
                }
                signal.cancel();
            });

            watch(service, shutdown).await;
            output.emit(&service.stats())
        }
    }
}

/// Keep the caches in sync with the library until `shutdown` is cancelled
pub async fn watch(service: &Arc<DocService>, shutdown: CancellationToken) {
    if service.config().watch {
        if let Err(e) = service.start_watching() {
            warn!(error = %e, "change watcher failed to start, maintenance will retry");
        }
    }

    // Warm the top level so the first request is served from cache
    let tree = service.get_tree().await;
    info!(
        root = %service.root().display(),
        entries = tree.root.children.len(),
        "watching document library"
    );

    MaintenanceScheduler::new(service.clone()).run(shutdown).await;
    service.stop_watching();
}
