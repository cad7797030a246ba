//! In-process [`TaskStore`] with optional JSON persistence.
//!
//! Holds the collection in memory and, when opened with a path, writes the
//! whole collection to `tasks.json` before each change is committed. A
//! write that cannot be persisted leaves the collection unchanged.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::{SnapshotCallback, Subscription, TaskStore};
use super::types::{NewTask, Task, TaskId, TaskPatch};
use crate::clock::Clock;
use crate::error::{DayplanError, Result};

/// On-disk layout of the task file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default = "default_file_version")]
    version: u8,
    #[serde(default)]
    tasks: Vec<serde_json::Value>,
}

fn default_file_version() -> u8 {
    1
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    callbacks: Vec<(u64, SnapshotCallback)>,
}

struct StoreInner {
    clock: Arc<dyn Clock>,
    state_path: Option<PathBuf>,
    tasks: Mutex<Vec<Task>>,
    subscribers: Mutex<Subscribers>,
    /// Serializes write-then-emit so snapshots arrive in commit order.
    emit: Mutex<()>,
    available: AtomicBool,
}

impl StoreInner {
    fn remove_subscriber(&self, id: u64) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.callbacks.retain(|(sub_id, _)| *sub_id != id);
    }

    fn emit(&self, snapshot: &[Task]) -> Result<()> {
        let callbacks: Vec<SnapshotCallback> = lock(&self.subscribers)?
            .callbacks
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        debug!(
            tasks = snapshot.len(),
            subscribers = callbacks.len(),
            "emitting task snapshot"
        );
        for callback in callbacks {
            callback(snapshot);
        }
        Ok(())
    }
}

/// In-memory task store.
///
/// Cloning yields another handle to the same collection.
#[derive(Clone)]
pub struct MemoryTaskStore {
    inner: Arc<StoreInner>,
}

impl MemoryTaskStore {
    /// Create an empty, non-persistent store.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_tasks(clock, Vec::new())
    }

    /// Create a non-persistent store seeded with `tasks`.
    pub fn with_tasks(clock: Arc<dyn Clock>, tasks: Vec<Task>) -> Self {
        Self::build(clock, None, tasks)
    }

    /// Open a store persisted at `path`, loading any existing tasks.
    ///
    /// A missing file opens an empty store. Records that fail to parse are
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`DayplanError::StoreUnavailable`] if the file exists but
    /// cannot be read or is not a task file.
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.into();
        let tasks = load_tasks_from_path(&path)?;
        debug!(path = %path.display(), tasks = tasks.len(), "opened task store");
        Ok(Self::build(clock, Some(path), tasks))
    }

    fn build(clock: Arc<dyn Clock>, state_path: Option<PathBuf>, tasks: Vec<Task>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                clock,
                state_path,
                tasks: Mutex::new(tasks),
                subscribers: Mutex::new(Subscribers::default()),
                emit: Mutex::new(()),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Simulate an outage: while unavailable every write and subscribe fails
    /// with [`DayplanError::StoreUnavailable`].
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Current contents of the collection.
    pub fn tasks(&self) -> Vec<Task> {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .callbacks
            .len()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DayplanError::StoreUnavailable(
                "task store is offline".to_owned(),
            ))
        }
    }

    /// Mutate a copy, persist it, then swap it in and emit.
    fn commit<R>(&self, mutate: impl FnOnce(&mut Vec<Task>) -> Result<R>) -> Result<R> {
        self.ensure_available()?;
        let _emit = lock(&self.inner.emit)?;

        let (result, snapshot) = {
            let mut tasks = lock(&self.inner.tasks)?;
            let mut next = tasks.clone();
            let result = mutate(&mut next)?;
            if let Some(path) = &self.inner.state_path {
                save_tasks_to_path(path, &next)?;
            }
            *tasks = next;
            (result, tasks.clone())
        };

        self.inner.emit(&snapshot)?;
        Ok(result)
    }
}

impl TaskStore for MemoryTaskStore {
    fn subscribe(&self, callback: SnapshotCallback) -> Result<Subscription> {
        self.ensure_available()?;
        let _emit = lock(&self.inner.emit)?;

        let id = {
            let mut subs = lock(&self.inner.subscribers)?;
            subs.next_id += 1;
            let id = subs.next_id;
            subs.callbacks.push((id, Arc::clone(&callback)));
            id
        };

        let snapshot = lock(&self.inner.tasks)?.clone();
        callback(&snapshot);

        let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove_subscriber(id);
            }
        }))
    }

    fn create(&self, task: NewTask) -> Result<TaskId> {
        task.validate()?;
        let id = TaskId::generate();
        let created_at = self.inner.clock.now();
        let record = Task::from_new(id.clone(), task, created_at);
        self.commit(move |tasks| {
            tasks.push(record);
            Ok(())
        })?;
        Ok(id)
    }

    fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<()> {
        patch.validate()?;
        self.commit(|tasks| {
            let task = tasks
                .iter_mut()
                .find(|t| &t.id == id)
                .ok_or_else(|| DayplanError::TaskNotFound(id.clone()))?;
            patch.apply(task);
            Ok(())
        })
    }

    fn delete(&self, id: &TaskId) -> Result<()> {
        self.commit(|tasks| {
            let before = tasks.len();
            tasks.retain(|t| &t.id != id);
            if tasks.len() == before {
                return Err(DayplanError::TaskNotFound(id.clone()));
            }
            Ok(())
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| DayplanError::StoreUnavailable("store lock poisoned".to_owned()))
}

fn load_tasks_from_path(path: &Path) -> Result<Vec<Task>> {
    let bytes = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(DayplanError::StoreUnavailable(format!(
                "cannot read task file: {e}"
            )));
        }
    };

    let file: StoreFile = serde_json::from_slice(&bytes)
        .map_err(|e| DayplanError::StoreUnavailable(format!("cannot parse task file: {e}")))?;

    let mut tasks = Vec::with_capacity(file.tasks.len());
    for (index, value) in file.tasks.into_iter().enumerate() {
        match serde_json::from_value::<Task>(value) {
            Ok(task) => tasks.push(task),
            Err(e) => warn!(index, "skipping malformed task record: {e}"),
        }
    }
    Ok(tasks)
}

fn save_tasks_to_path(path: &Path, tasks: &[Task]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            DayplanError::StoreUnavailable(format!("cannot create task dir: {e}"))
        })?;
    }

    let records = tasks
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| DayplanError::StoreUnavailable(format!("cannot serialize tasks: {e}")))?;

    let file = StoreFile {
        version: default_file_version(),
        tasks: records,
    };
    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| DayplanError::StoreUnavailable(format!("cannot serialize tasks: {e}")))?;

    std::fs::write(path, json)
        .map_err(|e| DayplanError::StoreUnavailable(format!("cannot write task file: {e}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::clock::ManualClock;
    use crate::tasks::Schedule;
    use chrono::{DateTime, NaiveDate, Utc};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new(at("2024-05-01T08:00:00Z")))
    }

    fn recording_subscriber() -> (SnapshotCallback, Arc<Mutex<Vec<Vec<Task>>>>) {
        let seen: Arc<Mutex<Vec<Vec<Task>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: SnapshotCallback = Arc::new(move |tasks: &[Task]| {
            sink.lock().unwrap().push(tasks.to_vec());
        });
        (callback, seen)
    }

    #[test]
    fn subscribe_delivers_current_snapshot() {
        let store = MemoryTaskStore::new(clock());
        store.create(NewTask::daily("Stretch")).unwrap();

        let (callback, seen) = recording_subscriber();
        let _sub = store.subscribe(callback).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].len(), 1);
        assert_eq!(seen[0][0].text, "Stretch");
    }

    #[test]
    fn writes_emit_full_snapshots() {
        let store = MemoryTaskStore::new(clock());
        let (callback, seen) = recording_subscriber();
        let _sub = store.subscribe(callback).unwrap();

        let id = store.create(NewTask::daily("Stretch")).unwrap();
        store.update(&id, TaskPatch::rename("Stretch well")).unwrap();
        store.delete(&id).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen[0].is_empty());
        assert_eq!(seen[1][0].text, "Stretch");
        assert_eq!(seen[2][0].text, "Stretch well");
        assert!(seen[3].is_empty());
    }

    #[test]
    fn create_stamps_clock_and_starts_incomplete() {
        let store = MemoryTaskStore::new(clock());
        let id = store.create(NewTask::daily("Stretch")).unwrap();

        let task = store.tasks().into_iter().find(|t| t.id == id).unwrap();
        assert_eq!(task.created_at, at("2024-05-01T08:00:00Z"));
        assert!(!task.completed);
    }

    #[test]
    fn invalid_create_writes_nothing() {
        let store = MemoryTaskStore::new(clock());
        let err = store.create(NewTask::daily("")).unwrap_err();
        assert!(matches!(err, DayplanError::Validation(_)));
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn unknown_ids_are_reported() {
        let store = MemoryTaskStore::new(clock());
        let missing = TaskId::from("missing");
        assert!(matches!(
            store.update(&missing, TaskPatch::rename("x")),
            Err(DayplanError::TaskNotFound(_))
        ));
        assert!(matches!(
            store.delete(&missing),
            Err(DayplanError::TaskNotFound(_))
        ));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let store = MemoryTaskStore::new(clock());
        let (callback, seen) = recording_subscriber();
        let mut sub = store.subscribe(callback).unwrap();
        assert_eq!(store.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);

        store.create(NewTask::daily("Stretch")).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn offline_store_rejects_writes_and_keeps_state() {
        let store = MemoryTaskStore::new(clock());
        store.create(NewTask::daily("Stretch")).unwrap();
        store.set_available(false);

        let err = store.create(NewTask::daily("Read")).unwrap_err();
        assert!(matches!(err, DayplanError::StoreUnavailable(_)));
        let (callback, _seen) = recording_subscriber();
        assert!(store.subscribe(callback).is_err());
        assert_eq!(store.tasks().len(), 1);

        store.set_available(true);
        store.create(NewTask::daily("Read")).unwrap();
        assert_eq!(store.tasks().len(), 2);
    }

    #[test]
    fn persisted_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data").join("tasks.json");

        let store = MemoryTaskStore::open(&path, clock()).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let id = store.create(NewTask::due_on("Pay rent", date)).unwrap();
        store
            .update(&id, TaskPatch::reminder(Some(at("2024-05-01T17:00:00Z"))))
            .unwrap();
        drop(store);

        let reopened = MemoryTaskStore::open(&path, clock()).unwrap();
        let tasks = reopened.tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, id);
        assert_eq!(tasks[0].schedule, Schedule::DueOn { date });
        assert_eq!(tasks[0].reminder_at, Some(at("2024-05-01T17:00:00Z")));
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = MemoryTaskStore::open(dir.path().join("tasks.json"), clock()).unwrap();
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn malformed_records_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tasks.json");
        std::fs::write(
            &path,
            r#"{
                "version": 1,
                "tasks": [
                    {"id": "ok", "text": "Read", "created_at": "2024-05-01T08:00:00Z",
                     "schedule": {"type": "daily"}},
                    {"id": "broken", "text": "No timestamp"}
                ]
            }"#,
        )
        .unwrap();

        let store = MemoryTaskStore::open(&path, clock()).unwrap();
        let tasks = store.tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id.as_str(), "ok");
    }

    #[test]
    fn unparseable_file_is_store_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tasks.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            MemoryTaskStore::open(&path, clock()),
            Err(DayplanError::StoreUnavailable(_))
        ));
    }
}
