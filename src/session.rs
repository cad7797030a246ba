//! Today session: the loop between the task store, the today view and the
//! reminder scheduler.
//!
//! Every snapshot the store emits is remembered, projected into the today
//! view (published on a [`watch`] channel for the UI) and handed to the
//! [`ReminderScheduler`]. User actions only write to the store; their effect
//! arrives with the next snapshot.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::clock::{Clock, local_instant};
use crate::config::ReminderConfig;
use crate::error::{DayplanError, Result};
use crate::notifications::NotificationCenter;
use crate::scheduler::ReminderScheduler;
use crate::tasks::{
    NewTask, SnapshotCallback, Subscription, Task, TaskId, TaskPatch, TaskStore,
};
use crate::today::{is_completed_as_of, project_today};

/// Handle to a running session for one signed-in user.
pub struct TodaySession {
    store: Arc<dyn TaskStore>,
    scheduler: Arc<ReminderScheduler>,
    clock: Arc<dyn Clock>,
    latest: Arc<Mutex<Vec<Task>>>,
    today_tx: Arc<watch::Sender<Vec<Task>>>,
    subscription: Mutex<Option<Subscription>>,
}

impl TodaySession {
    /// Subscribe to `store` and start projecting and scheduling.
    ///
    /// The store's current snapshot is applied before this returns, so
    /// reminders persisted before a restart are re-armed immediately.
    ///
    /// # Errors
    ///
    /// Returns [`DayplanError::StoreUnavailable`] if the subscription fails
    /// and [`DayplanError::Scheduler`] outside a tokio runtime.
    pub fn start(
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn NotificationCenter>,
        clock: Arc<dyn Clock>,
        config: &ReminderConfig,
    ) -> Result<Self> {
        let scheduler = Arc::new(ReminderScheduler::new(
            notifier,
            Arc::clone(&clock),
            config,
        )?);
        let latest = Arc::new(Mutex::new(Vec::new()));
        let (today_tx, _) = watch::channel(Vec::new());
        let today_tx = Arc::new(today_tx);

        let callback: SnapshotCallback = {
            let scheduler = Arc::clone(&scheduler);
            let latest = Arc::clone(&latest);
            let today_tx = Arc::clone(&today_tx);
            let clock = Arc::clone(&clock);
            Arc::new(move |tasks: &[Task]| {
                debug!(tasks = tasks.len(), "task snapshot received");
                *latest.lock().unwrap_or_else(|e| e.into_inner()) = tasks.to_vec();
                publish(tasks, &today_tx, clock.as_ref());
                scheduler.reconcile(tasks);
            })
        };

        let subscription = store
            .subscribe(callback)
            .inspect_err(|e| warn!("cannot subscribe to task store: {e}"))?;
        info!(armed = scheduler.armed_count(), "today session started");

        Ok(Self {
            store,
            scheduler,
            clock,
            latest,
            today_tx,
            subscription: Mutex::new(Some(subscription)),
        })
    }

    /// Receiver that sees every change of the today view.
    pub fn today(&self) -> watch::Receiver<Vec<Task>> {
        self.today_tx.subscribe()
    }

    /// The today view as last projected.
    pub fn current_view(&self) -> Vec<Task> {
        self.today_tx.borrow().clone()
    }

    /// The last snapshot received from the store.
    pub fn snapshot(&self) -> Vec<Task> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The session's reminder scheduler.
    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    /// Re-project and re-reconcile the last snapshot at the current time.
    ///
    /// Picks up midnight rollover when the store has not changed: daily
    /// tasks completed on an earlier day show as open again and get their
    /// reminders back.
    pub fn refresh(&self) {
        let tasks = self.snapshot();
        publish(&tasks, &self.today_tx, self.clock.as_ref());
        self.scheduler.reconcile(&tasks);
    }

    /// Add a task. Non-recurring tasks are due today.
    ///
    /// # Errors
    ///
    /// Returns [`DayplanError::Validation`] for blank text, or the store's error.
    pub fn add_task(&self, text: &str, daily: bool) -> Result<TaskId> {
        let new = if daily {
            NewTask::daily(text)
        } else {
            NewTask::due_on(text, self.local_now().date_naive())
        };
        self.create(new)
    }

    /// Add a task due on `date`.
    ///
    /// # Errors
    ///
    /// Returns [`DayplanError::Validation`] for blank text, or the store's error.
    pub fn add_task_due(&self, text: &str, date: NaiveDate) -> Result<TaskId> {
        self.create(NewTask::due_on(text, date))
    }

    fn create(&self, new: NewTask) -> Result<TaskId> {
        new.validate()?;
        let id = self.store_write("create", self.store.create(new))?;
        info!(task_id = %id, "task added");
        Ok(id)
    }

    /// Replace a task's text.
    ///
    /// # Errors
    ///
    /// Returns [`DayplanError::Validation`] for blank text, or the store's error.
    pub fn rename_task(&self, id: &TaskId, text: &str) -> Result<()> {
        let patch = TaskPatch::rename(text);
        patch.validate()?;
        self.store_write("rename", self.store.update(id, patch))
    }

    /// Flip the completion state the user currently sees.
    ///
    /// For a daily task that is "completed today", so a task finished
    /// yesterday is marked done again rather than undone.
    ///
    /// # Errors
    ///
    /// Returns [`DayplanError::TaskNotFound`] for an id missing from the last
    /// snapshot, or the store's error.
    pub fn toggle_complete(&self, id: &TaskId) -> Result<()> {
        let task = self.find(id)?;
        let now = self.clock.now();
        let shown_completed = is_completed_as_of(&task, &now.with_timezone(&Local));
        self.store_write(
            "toggle",
            self.store.update(id, TaskPatch::toggle(shown_completed, now)),
        )
    }

    /// Remove a task. Its pending reminder is cancelled by the next snapshot.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub fn delete_task(&self, id: &TaskId) -> Result<()> {
        self.store_write("delete", self.store.delete(id))
    }

    /// Set or clear a task's reminder.
    ///
    /// # Errors
    ///
    /// See [`ReminderScheduler::set_reminder`]; also
    /// [`DayplanError::TaskNotFound`] for an unknown id.
    pub async fn set_reminder(&self, id: &TaskId, at: Option<DateTime<Utc>>) -> Result<()> {
        let task = self.find(id)?;
        self.scheduler
            .set_reminder(self.store.as_ref(), &task, at)
            .await
    }

    /// Set a reminder from a local date and wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns [`DayplanError::Validation`] when the local time does not
    /// exist, plus everything [`set_reminder`](Self::set_reminder) returns.
    pub async fn set_reminder_local(
        &self,
        id: &TaskId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<()> {
        let at = local_instant(date, time, &Local)?;
        self.set_reminder(id, Some(at)).await
    }

    /// Stop receiving snapshots and drain every reminder timer.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut subscription) = subscription {
            subscription.unsubscribe();
        }
        let cancelled = self.scheduler.shutdown().await;
        info!(cancelled, "today session shut down");
    }

    fn find(&self, id: &TaskId) -> Result<Task> {
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|t| &t.id == id)
            .cloned()
            .ok_or_else(|| DayplanError::TaskNotFound(id.clone()))
    }

    fn local_now(&self) -> DateTime<Local> {
        self.clock.now().with_timezone(&Local)
    }

    fn store_write<T>(&self, action: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!(action, "task store write failed: {e}");
        }
        result
    }
}

/// Project `tasks` at the current local time and publish if the view changed.
fn publish(tasks: &[Task], today_tx: &watch::Sender<Vec<Task>>, clock: &dyn Clock) {
    let now = clock.now().with_timezone(&Local);
    let view = project_today(tasks, &now);
    today_tx.send_if_modified(|current| {
        if *current == view {
            false
        } else {
            *current = view;
            true
        }
    });
}
