/// Debounced background persistence of edit snapshots
///
/// Changes are coalesced until `debounce_ms` pass without another change,
/// then the newest one is saved. At most one save is in flight. Failures are
/// logged and retried in the next window; they never reach the caller.
use chrono::{DateTime, Utc};
use document::SaveRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::SnapshotSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub debounce_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self { debounce_ms: 2000 }
    }
}

impl AutosaveConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AutosaveStatus {
    Idle,
    /// A change is waiting for its window to close
    Pending,
    Saving,
    Saved { at: DateTime<Utc> },
    /// The last attempt failed; the change is retried next window
    Failed { message: String },
}

enum Command {
    Change(SaveRequest),
    Flush(oneshot::Sender<bool>),
}

pub struct AutosaveScheduler {
    tx: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<AutosaveStatus>,
    task: JoinHandle<()>,
}

impl AutosaveScheduler {
    /// Starts the scheduler task on the current runtime.
    pub fn spawn(sink: Arc<dyn SnapshotSink>, config: AutosaveConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(AutosaveStatus::Idle);
        let worker = Worker {
            sink,
            delay: config.delay(),
            rx,
            status: status_tx,
            pending: None,
            last_saved: None,
        };
        let task = tokio::spawn(worker.run());
        Self { tx, status, task }
    }

    /// Queues a snapshot. Returns `false` once the scheduler is gone.
    pub fn notify(&self, request: SaveRequest) -> bool {
        self.tx.send(Command::Change(request)).is_ok()
    }

    /// Saves any pending change now. Returns whether nothing is left unsaved.
    pub async fn flush(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Flush(reply)).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub fn status(&self) -> AutosaveStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AutosaveStatus> {
        self.status.clone()
    }

    /// Stops the task. Pending changes are dropped.
    pub fn shutdown(self) {
        self.task.abort();
        debug!("autosave stopped");
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Worker {
    sink: Arc<dyn SnapshotSink>,
    delay: Duration,
    rx: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<AutosaveStatus>,
    pending: Option<SaveRequest>,
    last_saved: Option<SaveRequest>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            if self.pending.is_none() {
                match self.rx.recv().await {
                    Some(Command::Change(request)) => self.accept(request),
                    Some(Command::Flush(reply)) => {
                        let _ = reply.send(true);
                    }
                    None => break,
                }
                continue;
            }

            let window = tokio::time::sleep(self.delay);
            tokio::pin!(window);
            let mut flush = None;
            loop {
                tokio::select! {
                    _ = &mut window => break,
                    command = self.rx.recv() => match command {
                        Some(Command::Change(request)) => {
                            self.accept(request);
                            window.as_mut().reset(Instant::now() + self.delay);
                        }
                        Some(Command::Flush(reply)) => {
                            flush = Some(reply);
                            break;
                        }
                        None => return,
                    },
                }
            }

            let saved = self.save_pending().await;
            if let Some(reply) = flush {
                let _ = reply.send(saved);
            }
        }
    }

    fn accept(&mut self, request: SaveRequest) {
        if self.last_saved.as_ref() == Some(&request) {
            // Back to what is already persisted
            self.pending = None;
            self.status.send_if_modified(|status| {
                let reverted = *status == AutosaveStatus::Pending;
                if reverted {
                    *status = AutosaveStatus::Idle;
                }
                reverted
            });
            return;
        }
        self.pending = Some(request);
        self.status.send_replace(AutosaveStatus::Pending);
    }

    async fn save_pending(&mut self) -> bool {
        let Some(request) = self.pending.take() else {
            return true;
        };
        self.status.send_replace(AutosaveStatus::Saving);
        match self.sink.persist(&request).await {
            Ok(_) => {
                info!(bytes = request.content.len(), "autosaved");
                self.last_saved = Some(request);
                self.status.send_replace(AutosaveStatus::Saved { at: Utc::now() });
                true
            }
            Err(err) => {
                warn!("autosave failed, retrying next window: {}", err);
                self.status.send_replace(AutosaveStatus::Failed {
                    message: err.to_string(),
                });
                // A newer change queued meanwhile replaces it before the retry
                self.pending = Some(request);
                false
            }
        }
    }
}
