//! Dayplan: the today view and reminder engine of a personal task list.
//!
//! Two components sit between a persistent task store and the UI:
//!
//! - **Today view**: [`today::project_today`] decides which tasks belong to
//!   the current calendar day, re-deriving completion of daily tasks per day
//! - **Reminders**: [`scheduler::ReminderScheduler`] keeps one cancelable
//!   timer per task with a future reminder, reconciled against every snapshot
//!
//! # Architecture
//!
//! The store emits the full task collection on every change. A
//! [`session::TodaySession`] feeds each snapshot to both components and turns
//! user actions into store writes:
//! - **Store**: [`tasks::TaskStore`], with [`tasks::MemoryTaskStore`] as the
//!   in-process implementation
//! - **Notifications**: [`notifications::NotificationCenter`]
//! - **Time**: [`clock::Clock`], injectable so tests can simulate time

pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod notifications;
pub mod scheduler;
pub mod session;
pub mod tasks;
pub mod today;

pub use clock::{Clock, ManualClock, RuntimeClock, SystemClock};
pub use config::{DayplanConfig, ReminderConfig};
pub use error::{DayplanError, Result};
pub use notifications::{NotificationCenter, PermissionState};
pub use scheduler::ReminderScheduler;
pub use session::TodaySession;
pub use tasks::{MemoryTaskStore, NewTask, Schedule, Task, TaskId, TaskPatch, TaskStore};
pub use today::project_today;
