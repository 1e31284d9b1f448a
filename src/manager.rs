use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};

use crate::downloader::{Downloader, TaskMessage};
use crate::error::DownloadError;
use crate::model::{DownloadOptions, DownloadStatus, DownloadTask, ProgressSnapshot};
use crate::progress::{LibraryEvent, Transition};
use crate::queue::QueueGate;

/// Events for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    ProgressUpdated { url: String, snapshot: ProgressSnapshot },
    Completed { task: Arc<DownloadTask>, filename: String },
    Failed { url: String, message: String },
    QueueChanged { pending: usize, active: usize },
}

/// Owns the queue and the per-URL progress, and keeps the slots busy.
///
/// All methods run on the UI thread. Downloads report back through an mpsc channel
/// that is drained by [`DownloadManager::poll`].
pub struct DownloadManager<D> {
    gate: QueueGate,
    downloads: HashMap<String, ProgressSnapshot>,
    downloader: D,
    tx: UnboundedSender<TaskMessage>,
    rx: UnboundedReceiver<TaskMessage>,
    outbox: Vec<ManagerEvent>,
}

impl<D: Downloader> DownloadManager<D> {
    pub fn new(downloader: D, capacity: usize) -> Self {
        let (tx, rx) = unbounded_channel();
        let gate = QueueGate::new(capacity);
        info!(capacity = gate.capacity(), "download queue ready");
        Self {
            gate,
            downloads: HashMap::new(),
            downloader,
            tx,
            rx,
            outbox: Vec::new(),
        }
    }

    pub fn add_download(&mut self, url: &str, save_dir: PathBuf, options: DownloadOptions) -> Result<(), DownloadError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DownloadError::EmptyUrl);
        }
        let task = Arc::new(DownloadTask { url: url.to_string(), save_dir, options });
        info!(url = %task.url, "queued");

        // a second submission of the same URL takes over its row
        let snapshot = ProgressSnapshot::queued(url);
        self.downloads.insert(task.url.clone(), snapshot.clone());
        self.outbox.push(ManagerEvent::ProgressUpdated { url: task.url.clone(), snapshot });

        self.gate.enqueue(task);
        self.process_queue();
        self.emit_queue_status();
        Ok(())
    }

    /// Applies every message the running downloads sent since the last call and
    /// returns the resulting events.
    pub fn poll(&mut self) -> Vec<ManagerEvent> {
        while let Ok(msg) = self.rx.try_recv() {
            self.handle(msg);
        }
        std::mem::take(&mut self.outbox)
    }

    pub fn pending_count(&self) -> usize {
        self.gate.pending_len()
    }

    pub fn active_count(&self) -> usize {
        self.gate.active_len()
    }

    fn process_queue(&mut self) {
        while let Some(task) = self.gate.admit_next() {
            self.start(task);
        }
    }

    fn start(&mut self, task: Arc<DownloadTask>) {
        let snapshot = self
            .downloads
            .entry(task.url.clone())
            .or_insert_with(|| ProgressSnapshot::queued(&task.url));
        snapshot.status = DownloadStatus::Downloading;
        self.outbox.push(ManagerEvent::ProgressUpdated { url: task.url.clone(), snapshot: snapshot.clone() });

        if let Err(e) = self.downloader.start(Arc::clone(&task), self.tx.clone()) {
            error!(url = %task.url, "could not start download: {}", e);
            // a failed start counts as a reported error; the caller's loop admits the next task
            self.apply(&task, LibraryEvent::Error { message: e.to_string() });
        }
    }

    fn handle(&mut self, msg: TaskMessage) {
        let terminal = matches!(msg.event, LibraryEvent::Finished | LibraryEvent::Error { .. });
        self.apply(&msg.task, msg.event);
        if terminal {
            self.process_queue();
            self.emit_queue_status();
        }
    }

    fn apply(&mut self, task: &Arc<DownloadTask>, event: LibraryEvent) {
        let url = task.url.as_str();
        // the same URL queued twice shares one snapshot; whichever run reports last wins
        let snapshot = self
            .downloads
            .entry(url.to_string())
            .or_insert_with(|| ProgressSnapshot::queued(url));

        let transition = snapshot.apply(event);
        let snapshot = snapshot.clone();
        self.outbox.push(ManagerEvent::ProgressUpdated { url: url.to_string(), snapshot: snapshot.clone() });

        match transition {
            Transition::Updated => {}
            Transition::Completed => {
                info!(url, file = %snapshot.display_name, "completed");
                self.downloads.remove(url);
                self.gate.release(url);
                self.outbox.push(ManagerEvent::Completed { task: Arc::clone(task), filename: snapshot.display_name });
            }
            Transition::Failed(message) => {
                warn!(url, "failed: {}", message);
                self.downloads.remove(url);
                self.gate.release(url);
                self.outbox.push(ManagerEvent::Failed { url: url.to_string(), message });
            }
        }
    }

    fn emit_queue_status(&mut self) {
        self.outbox.push(ManagerEvent::QueueChanged {
            pending: self.gate.pending_len(),
            active: self.gate.active_len(),
        });
    }
}
