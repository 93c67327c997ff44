use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

type RunKey = (i64, String);

/// Tracks which (document, pipeline) pairs currently have a run in flight.
///
/// Clones share the same set, so every pass coordinated through one
/// manager sees the same claims.
#[derive(Clone, Default)]
pub struct InFlightRuns {
    held: Arc<Mutex<HashSet<RunKey>>>,
}

impl InFlightRuns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the pair, or returns `None` when another run already holds it.
    pub fn try_acquire(&self, document_id: i64, pipeline: &str) -> Option<InFlightGuard> {
        let key = (document_id, pipeline.to_string());
        if !self.lock().insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            held: Arc::clone(&self.held),
            key,
        })
    }

    pub fn is_held(&self, document_id: i64, pipeline: &str) -> bool {
        self.lock().contains(&(document_id, pipeline.to_string()))
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<RunKey>> {
        // The set stays consistent even if a holder panicked.
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases its claim when dropped.
pub struct InFlightGuard {
    held: Arc<Mutex<HashSet<RunKey>>>,
    key: RunKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut held = self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        held.remove(&self.key);
    }
}
