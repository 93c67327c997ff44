use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use super::run::RunStatus;

/// Events emitted while a document is being processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    PassStarted {
        pass_id: String,
        document_id: i64,
        pages: usize,
    },
    PagesCollected {
        pass_id: String,
        collected: usize,
        failed: usize,
        cancelled: bool,
    },
    PipelineStarted {
        pass_id: String,
        pipeline: String,
    },
    PipelineFinished {
        pass_id: String,
        pipeline: String,
        status: RunStatus,
        issues: usize,
    },
    PassFinished {
        pass_id: String,
        runs: usize,
        cancelled: bool,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for tests and batch runs.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards events to a tokio broadcast channel.
///
/// Sending without subscribers is not an error; the event is dropped.
#[derive(Clone)]
pub struct BroadcastProgress {
    sender: Arc<broadcast::Sender<ProgressEvent>>,
}

impl BroadcastProgress {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn from_sender(sender: Arc<broadcast::Sender<ProgressEvent>>) -> Self {
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}
