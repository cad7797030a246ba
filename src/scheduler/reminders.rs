//! Reminder scheduler.
//!
//! Owns one timer per task with a pending reminder and keeps that set in
//! agreement with the latest task snapshot. Every snapshot is treated as the
//! full desired state: [`ReminderScheduler::reconcile`] diffs it against the
//! armed timers instead of reacting to individual edits.
//!
//! The id → timer table is the only shared mutable state. Reconcile, fire
//! and shutdown all go through its single lock, and a timer only delivers if
//! it can still find its own entry (matched by generation) at fire time, so
//! a timer removed under the lock can never fire afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::ReminderConfig;
use crate::error::{DayplanError, Result};
use crate::notifications::{NotificationCenter, PermissionState};
use crate::tasks::{Task, TaskId, TaskPatch, TaskStore};
use crate::today::is_completed_as_of;

/// A live timer for one task.
struct ArmedTimer {
    /// Instant the timer was armed for.
    fire_at: DateTime<Utc>,
    /// Distinguishes this arming from earlier ones for the same task.
    generation: u64,
    /// Notification body, refreshed by reconcile when the text changes.
    text: String,
    cancel: CancellationToken,
}

#[derive(Default)]
struct TimerTable {
    timers: HashMap<TaskId, ArmedTimer>,
    next_generation: u64,
    shut_down: bool,
}

impl TimerTable {
    /// Remove and cancel the timer for `id`, if any.
    fn cancel(&mut self, id: &TaskId, reason: &str) {
        if let Some(timer) = self.timers.remove(id) {
            timer.cancel.cancel();
            debug!(task_id = %id, fire_at = %timer.fire_at, reason, "reminder cancelled");
        }
    }
}

struct Shared {
    table: Mutex<TimerTable>,
    notifier: Arc<dyn NotificationCenter>,
    clock: Arc<dyn Clock>,
    title: String,
    tracker: TaskTracker,
    root: CancellationToken,
    runtime: Handle,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TimerTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Timer callback. Claims the entry under the lock, then delivers.
    fn fire(&self, id: &TaskId, generation: u64) {
        let text = {
            let mut table = self.lock();
            if table.shut_down {
                return;
            }
            let current = table
                .timers
                .get(id)
                .is_some_and(|timer| timer.generation == generation);
            if !current {
                debug!(task_id = %id, generation, "stale reminder timer ignored");
                return;
            }
            match table.timers.remove(id) {
                Some(timer) => timer.text,
                None => return,
            }
        };

        match self.notifier.notify(&self.title, &text) {
            Ok(()) => info!(task_id = %id, "reminder delivered"),
            Err(e) => warn!(task_id = %id, "reminder delivery failed, not retrying: {e}"),
        }
    }
}

/// Keeps exactly one live timer per task with a future reminder.
pub struct ReminderScheduler {
    shared: Arc<Shared>,
}

impl ReminderScheduler {
    /// Create a scheduler whose timers run on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DayplanError::Scheduler`] when called outside a tokio runtime.
    pub fn new(
        notifier: Arc<dyn NotificationCenter>,
        clock: Arc<dyn Clock>,
        config: &ReminderConfig,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| DayplanError::Scheduler(format!("no tokio runtime for timers: {e}")))?;
        Ok(Self {
            shared: Arc::new(Shared {
                table: Mutex::new(TimerTable::default()),
                notifier,
                clock,
                title: config.notification_title.clone(),
                tracker: TaskTracker::new(),
                root: CancellationToken::new(),
                runtime,
            }),
        })
    }

    /// Bring the armed timers into agreement with `tasks`.
    ///
    /// A task wants a timer when it is not completed and its reminder is
    /// strictly in the future. A daily task completed on an earlier local
    /// day counts as not completed. Timers already armed for the right instant
    /// are left alone; moved reminders are re-armed; everything else,
    /// including tasks missing from the snapshot, is cancelled.
    pub fn reconcile(&self, tasks: &[Task]) {
        let now = self.shared.clock.now();
        let local_now = now.with_timezone(&Local);
        let mut table = self.shared.lock();
        if table.shut_down {
            debug!("reconcile after shutdown ignored");
            return;
        }

        let present: HashSet<&TaskId> = tasks.iter().map(|t| &t.id).collect();
        let deleted: Vec<TaskId> = table
            .timers
            .keys()
            .filter(|id| !present.contains(id))
            .cloned()
            .collect();
        for id in &deleted {
            table.cancel(id, "task deleted");
        }

        for task in tasks {
            let fire_at = match task.reminder_at {
                None => {
                    table.cancel(&task.id, "reminder cleared");
                    continue;
                }
                Some(_) if is_completed_as_of(task, &local_now) => {
                    table.cancel(&task.id, "task completed");
                    continue;
                }
                Some(at) if task.has_pending_reminder(now) => at,
                Some(_) => {
                    table.cancel(&task.id, "reminder in the past");
                    continue;
                }
            };

            if let Some(existing) = table.timers.get_mut(&task.id)
                && existing.fire_at == fire_at
            {
                if existing.text != task.text {
                    existing.text.clone_from(&task.text);
                }
                continue;
            }

            table.cancel(&task.id, "reminder moved");
            self.arm(&mut table, task, fire_at, now);
        }

        debug!(armed = table.timers.len(), "reminders reconciled");
    }

    fn arm(&self, table: &mut TimerTable, task: &Task, fire_at: DateTime<Utc>, now: DateTime<Utc>) {
        table.next_generation += 1;
        let generation = table.next_generation;
        // Clock skew between the check and here means fire immediately.
        let delay = (fire_at - now).to_std().unwrap_or(Duration::ZERO);
        let cancel = self.shared.root.child_token();

        table.timers.insert(
            task.id.clone(),
            ArmedTimer {
                fire_at,
                generation,
                text: task.text.clone(),
                cancel: cancel.clone(),
            },
        );

        let shared = Arc::clone(&self.shared);
        let id = task.id.clone();
        self.shared.tracker.spawn_on(
            async move {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {}
                    () = tokio::time::sleep(delay) => shared.fire(&id, generation),
                }
            },
            &self.shared.runtime,
        );

        info!(
            task_id = %task.id,
            %fire_at,
            delay_secs = delay.as_secs(),
            "reminder armed"
        );
    }

    /// Cancel every outstanding timer and wait for timer tasks to finish.
    ///
    /// Once this returns no reminder will fire. Later calls, and later
    /// reconciles, are no-ops. Returns how many timers were cancelled.
    pub async fn shutdown(&self) -> usize {
        let cancelled = {
            let mut table = self.shared.lock();
            if table.shut_down {
                0
            } else {
                table.shut_down = true;
                let count = table.timers.len();
                for (_, timer) in table.timers.drain() {
                    timer.cancel.cancel();
                }
                info!(cancelled = count, "reminder scheduler shutting down");
                count
            }
        };

        self.shared.root.cancel();
        self.shared.tracker.close();
        self.shared.tracker.wait().await;
        cancelled
    }

    /// Set or clear the reminder of `task` by writing to `store`.
    ///
    /// Setting a reminder asks for notification permission first when it
    /// has not been granted. Nothing is written when validation or the
    /// permission prompt fails. The new timer is armed by the next
    /// [`reconcile`](Self::reconcile), not here.
    ///
    /// # Errors
    ///
    /// - [`DayplanError::Validation`] if `at` is not strictly in the future
    /// - [`DayplanError::PermissionDenied`] if the user declines notifications
    /// - any error from [`TaskStore::update`]
    pub async fn set_reminder(
        &self,
        store: &dyn TaskStore,
        task: &Task,
        at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if let Some(at) = at {
            let now = self.shared.clock.now();
            if at <= now {
                return Err(DayplanError::Validation(format!(
                    "reminder time {at} is not in the future"
                )));
            }
            self.ensure_permission().await?;
        }

        store.update(&task.id, TaskPatch::reminder(at)).inspect_err(|e| {
            warn!(task_id = %task.id, "cannot write reminder: {e}");
        })
    }

    async fn ensure_permission(&self) -> Result<()> {
        let state = self.shared.notifier.permission_state();
        if state == PermissionState::Granted {
            return Ok(());
        }

        debug!(%state, "requesting notification permission");
        match self.shared.notifier.request_permission().await {
            PermissionState::Granted => Ok(()),
            answer => {
                info!(%answer, "notification permission not granted");
                Err(DayplanError::PermissionDenied(
                    "notifications are not allowed; enable them to use reminders".to_owned(),
                ))
            }
        }
    }

    /// Number of armed timers.
    pub fn armed_count(&self) -> usize {
        self.shared.lock().timers.len()
    }

    /// Instant the timer for `id` is armed for, if any.
    pub fn armed_at(&self, id: &TaskId) -> Option<DateTime<Utc>> {
        self.shared.lock().timers.get(id).map(|timer| timer.fire_at)
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has started.
    pub fn is_shut_down(&self) -> bool {
        self.shared.lock().shut_down
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.shared.root.cancel();
    }
}
