//! Task model and store collaborators.

pub mod memory_store;
pub mod store;
pub mod types;

pub use memory_store::MemoryTaskStore;
pub use store::{SnapshotCallback, Subscription, TaskStore};
pub use types::{NewTask, Schedule, Task, TaskId, TaskPatch};
