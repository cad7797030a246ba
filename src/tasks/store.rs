//! Task store abstraction.
//!
//! The store is the single source of truth for tasks. The core only writes
//! through [`TaskStore`] and reacts to the full snapshots it emits.
//!
//! Implemented by [`super::memory_store::MemoryTaskStore`]; hosts backed by a
//! remote document database provide their own implementation.

use std::fmt;
use std::sync::Arc;

use super::types::{NewTask, Task, TaskId, TaskPatch};
use crate::error::Result;

/// Callback receiving every full snapshot of the task collection.
///
/// Called on the writer's thread. A callback must not write to the store
/// it is subscribed to.
pub type SnapshotCallback = Arc<dyn Fn(&[Task]) + Send + Sync>;

/// Abstraction over the persistent task store.
pub trait TaskStore: Send + Sync {
    /// Register `callback` for snapshots.
    ///
    /// The current snapshot is delivered before this returns, then one
    /// snapshot after every successful write.
    fn subscribe(&self, callback: SnapshotCallback) -> Result<Subscription>;

    /// Create a task and return its identifier.
    fn create(&self, task: NewTask) -> Result<TaskId>;

    /// Apply a partial update.
    fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<()>;

    /// Remove a task.
    fn delete(&self, id: &TaskId) -> Result<()>;
}

/// Live snapshot registration. Unsubscribes when dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap the store-specific unsubscribe action.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop receiving snapshots. Calling it again is a no-op.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Returns `true` while snapshots are still delivered.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
