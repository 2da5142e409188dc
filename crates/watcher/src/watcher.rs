//! Recursive watcher feeding the debounced consumer task

use doclib_core::{Error, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::batch::{route, InvalidationSink};
use crate::debounce::Debouncer;
use crate::event::RawChange;

/// Spawn the task that debounces `rx` and applies each non-empty batch to
/// `sink`. The task ends when every sender is dropped.
pub fn spawn_consumer(
    root: PathBuf,
    mut rx: UnboundedReceiver<RawChange>,
    debouncer: Debouncer,
    sink: Arc<dyn InvalidationSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(changes) = debouncer.next_batch(&mut rx).await {
            let batch = route(&root, &changes);
            if batch.is_empty() {
                debug!(raw_events = batch.raw_events, "ignoring batch without visible changes");
                continue;
            }
            debug!(
                raw_events = batch.raw_events,
                files = batch.files.len(),
                directories = batch.directories.len(),
                structural = batch.structural,
                "applying invalidation batch"
            );
            sink.apply(&batch);
        }
        debug!("change consumer stopped");
    })
}

struct Running {
    // Dropping the watcher unsubscribes and drops the channel sender
    _watcher: RecommendedWatcher,
    consumer: JoinHandle<()>,
    healthy: Arc<AtomicBool>,
}

impl Running {
    fn is_alive(&self) -> bool {
        self.healthy.load(Ordering::Acquire) && !self.consumer.is_finished()
    }
}

/// Watches the library root and applies debounced invalidations.
///
/// Must be started from within a Tokio runtime.
pub struct ChangeWatcher {
    root: PathBuf,
    debouncer: Debouncer,
    sink: Arc<dyn InvalidationSink>,
    running: Option<Running>,
}

impl ChangeWatcher {
    pub fn start(
        root: impl Into<PathBuf>,
        window: Duration,
        sink: Arc<dyn InvalidationSink>,
    ) -> Result<Self> {
        let mut watcher = Self {
            root: root.into(),
            debouncer: Debouncer::new(window),
            sink,
            running: None,
        };
        watcher.running = Some(watcher.spawn()?);
        info!(root = %watcher.root.display(), window_ms = window.as_millis() as u64, "watching library for changes");
        Ok(watcher)
    }

    fn spawn(&self) -> Result<Running> {
        let (tx, rx) = unbounded_channel();
        let healthy = Arc::new(AtomicBool::new(true));

        let mut watcher = RecommendedWatcher::new(forwarder(tx, healthy.clone()), Config::default())
            .map_err(|e| Error::watcher_down(format!("failed to create watcher: {e}")))?;
        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| {
                Error::watcher_down(format!("failed to watch {}: {e}", self.root.display()))
            })?;

        let consumer = spawn_consumer(
            self.root.clone(),
            rx,
            self.debouncer,
            self.sink.clone(),
        );

        Ok(Running {
            _watcher: watcher,
            consumer,
            healthy,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the notify subscription and the consumer task are both healthy
    pub fn is_alive(&self) -> bool {
        self.running.as_ref().is_some_and(Running::is_alive)
    }

    /// Tear down and re-create the subscription and the consumer task
    pub fn restart(&mut self) -> Result<()> {
        warn!(root = %self.root.display(), "restarting change watcher");
        self.stop();
        self.running = Some(self.spawn()?);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.consumer.abort();
        }
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("root", &self.root)
            .field("window", &self.debouncer.window())
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// The notify callback: runs on notify's thread and never blocks
fn forwarder(
    tx: UnboundedSender<RawChange>,
    healthy: Arc<AtomicBool>,
) -> impl FnMut(notify::Result<Event>) + Send + 'static {
    move |result| match result {
        Ok(event) => {
            for change in RawChange::from_event(&event) {
                if tx.send(change).is_err() {
                    healthy.store(false, Ordering::Release);
                    return;
                }
            }
        }
        Err(e) => {
            error!(error = %e, "file watcher reported an error");
            healthy.store(false, Ordering::Release);
        }
    }
}
