//! Run context for a fit: checkpoint key, sink and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::checkpoint::{Checkpoint, MemoryStore};

/// Cooperative cancellation flag, shared by cloning.
///
/// The fit checks it at pass boundaries only; a pass in flight always
/// completes and is checkpointed before the flag is honoured.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    #[inline]
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Where and under which key a fit publishes its model, and how it is stopped.
#[derive(Clone)]
pub struct Job {
    key: String,
    store: Arc<dyn Checkpoint>,
    cancel: CancelToken,
}

impl Job {
    /// A job checkpointing into a fresh [`MemoryStore`].
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            store: Arc::new(MemoryStore::new()),
            cancel: CancelToken::new(),
        }
    }

    /// Checkpoint into `store` instead.
    pub fn with_store(mut self, store: Arc<dyn Checkpoint>) -> Self {
        self.store = store;
        self
    }

    /// Observe `cancel` instead of a private token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &dyn Checkpoint {
        self.store.as_ref()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    #[inline]
    pub fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("key", &self.key)
            .field("cancelled", &self.cancelled())
            .finish_non_exhaustive()
    }
}
