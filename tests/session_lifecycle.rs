//! End-to-end scenarios for a today session: store snapshots flowing into
//! the today view and the reminder scheduler, on a paused tokio clock.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use dayplan::clock::local_instant;
use dayplan::notifications::RecordingNotificationCenter;
use dayplan::{
    Clock, DayplanError, MemoryTaskStore, PermissionState, ReminderConfig, RuntimeClock, TaskId,
    TodaySession,
};

/// Local noon, so minute-scale scenarios never cross midnight.
fn start() -> DateTime<Utc> {
    Local
        .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .earliest()
        .expect("local noon exists")
        .with_timezone(&Utc)
}

fn minutes(n: i64) -> DateTime<Utc> {
    start() + chrono::Duration::minutes(n)
}

struct Harness {
    session: TodaySession,
    store: MemoryTaskStore,
    notifier: Arc<RecordingNotificationCenter>,
    clock: Arc<RuntimeClock>,
    origin: tokio::time::Instant,
}

impl Harness {
    fn with_store(
        store: MemoryTaskStore,
        notifier: RecordingNotificationCenter,
        clock: Arc<RuntimeClock>,
    ) -> Self {
        let notifier = Arc::new(notifier);
        let session = TodaySession::start(
            Arc::new(store.clone()),
            notifier.clone(),
            clock.clone(),
            &ReminderConfig::default(),
        )
        .expect("session starts");
        Self {
            session,
            store,
            notifier,
            clock,
            origin: tokio::time::Instant::now(),
        }
    }

    fn new(notifier: RecordingNotificationCenter) -> Self {
        let clock = Arc::new(RuntimeClock::starting_at(start()));
        let store = MemoryTaskStore::new(clock.clone());
        Self::with_store(store, notifier, clock)
    }

    fn granted() -> Self {
        Self::new(RecordingNotificationCenter::granted())
    }

    /// Let paused time run to `n` minutes after the harness started.
    async fn run_until_minute(&self, n: u64) {
        tokio::time::sleep_until(self.origin + Duration::from_secs(n * 60)).await;
        tokio::task::yield_now().await;
    }

    fn bodies(&self) -> Vec<String> {
        self.notifier
            .delivered()
            .into_iter()
            .map(|n| n.body)
            .collect()
    }

    fn view_texts(&self) -> Vec<String> {
        self.session
            .current_view()
            .into_iter()
            .map(|t| t.text)
            .collect()
    }
}

async fn tick() {
    tokio::time::advance(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn added_tasks_show_up_in_todays_view() {
    let h = Harness::granted();
    let today = h.clock.now().with_timezone(&Local).date_naive();

    h.session.add_task("Stretch", true).unwrap();
    tick().await;
    h.session.add_task("Pay rent", false).unwrap();
    tick().await;
    h.session
        .add_task_due("Dentist", today + chrono::Duration::days(1))
        .unwrap();

    assert_eq!(h.view_texts(), vec!["Stretch", "Pay rent"]);
    assert_eq!(h.session.snapshot().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn view_updates_are_broadcast() {
    let h = Harness::granted();
    let mut rx = h.session.today();
    assert!(rx.borrow_and_update().is_empty());

    h.session.add_task("Stretch", true).unwrap();

    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn blank_text_is_rejected_before_writing() {
    let h = Harness::granted();
    let err = h.session.add_task("   ", true).unwrap_err();

    assert!(matches!(err, DayplanError::Validation(_)));
    assert!(err.is_user_facing());
    assert!(h.store.tasks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn daily_completion_resets_on_a_later_day() {
    let h = Harness::granted();
    let id = h.session.add_task("Stretch", true).unwrap();

    h.session.toggle_complete(&id).unwrap();
    assert!(h.session.current_view()[0].completed);

    tokio::time::advance(Duration::from_secs(48 * 3600)).await;
    h.session.refresh();
    let view = h.session.current_view();
    assert!(!view[0].completed);
    // Stored state still says completed, from two days ago.
    assert!(h.store.tasks()[0].completed);

    // Toggling what the user sees marks it done for today.
    h.session.toggle_complete(&id).unwrap();
    assert!(h.session.current_view()[0].completed);
    assert_eq!(h.store.tasks()[0].completed_at, Some(h.clock.now()));
}

#[tokio::test(start_paused = true)]
async fn daily_task_done_yesterday_gets_todays_reminder() {
    let h = Harness::granted();
    let id = h.session.add_task("Stretch", true).unwrap();
    h.session.toggle_complete(&id).unwrap();

    tokio::time::advance(Duration::from_secs(24 * 3600)).await;
    h.session.refresh();
    assert!(!h.session.current_view()[0].completed);

    let at = h.clock.now() + chrono::Duration::minutes(5);
    h.session.set_reminder(&id, Some(at)).await.unwrap();
    assert_eq!(h.session.scheduler().armed_at(&id), Some(at));

    h.run_until_minute(24 * 60 + 10).await;
    assert_eq!(h.bodies(), vec!["Stretch".to_owned()]);
    assert_eq!(h.notifier.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_rearms_daily_reminder_after_midnight() {
    let h = Harness::granted();
    let id = h.session.add_task("Stretch", true).unwrap();
    let tomorrow = h.clock.now() + chrono::Duration::hours(24);
    h.session.set_reminder(&id, Some(tomorrow)).await.unwrap();

    // Done today: the reminder is dropped until the day rolls over.
    h.session.toggle_complete(&id).unwrap();
    assert_eq!(h.session.scheduler().armed_count(), 0);

    tokio::time::advance(Duration::from_secs(23 * 3600)).await;
    h.session.refresh();
    assert_eq!(h.session.scheduler().armed_at(&id), Some(tomorrow));

    h.run_until_minute(24 * 60 + 1).await;
    assert_eq!(h.bodies(), vec!["Stretch".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn dated_task_toggles_back_to_incomplete() {
    let h = Harness::granted();
    let id = h.session.add_task("Pay rent", false).unwrap();

    h.session.toggle_complete(&id).unwrap();
    h.session.toggle_complete(&id).unwrap();

    let stored = &h.store.tasks()[0];
    assert!(!stored.completed);
    assert!(stored.completed_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn reminder_fires_once_with_task_text() {
    let h = Harness::granted();
    let id = h.session.add_task("Water plants", true).unwrap();

    h.session.set_reminder(&id, Some(minutes(5))).await.unwrap();
    assert_eq!(h.session.scheduler().armed_at(&id), Some(minutes(5)));

    h.run_until_minute(4).await;
    assert!(h.bodies().is_empty());

    h.run_until_minute(30).await;
    assert_eq!(h.bodies(), vec!["Water plants".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn deleting_a_task_cancels_its_reminder() {
    let h = Harness::granted();
    let id = h.session.add_task("Water plants", true).unwrap();
    h.session.set_reminder(&id, Some(minutes(5))).await.unwrap();

    h.session.delete_task(&id).unwrap();
    assert_eq!(h.session.scheduler().armed_count(), 0);

    h.run_until_minute(10).await;
    assert_eq!(h.notifier.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn completing_a_task_cancels_its_reminder() {
    let h = Harness::granted();
    let id = h.session.add_task("Water plants", false).unwrap();
    h.session.set_reminder(&id, Some(minutes(5))).await.unwrap();

    h.session.toggle_complete(&id).unwrap();

    h.run_until_minute(10).await;
    assert_eq!(h.notifier.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn clearing_a_reminder_cancels_it() {
    let h = Harness::granted();
    let id = h.session.add_task("Water plants", true).unwrap();
    h.session.set_reminder(&id, Some(minutes(5))).await.unwrap();
    h.session.set_reminder(&id, None).await.unwrap();

    assert_eq!(h.session.scheduler().armed_count(), 0);
    h.run_until_minute(10).await;
    assert_eq!(h.notifier.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn denied_permission_blocks_the_write() {
    let h = Harness::new(RecordingNotificationCenter::new(
        PermissionState::Denied,
        PermissionState::Denied,
    ));
    let id = h.session.add_task("Water plants", true).unwrap();

    let err = h
        .session
        .set_reminder(&id, Some(minutes(5)))
        .await
        .unwrap_err();

    assert!(matches!(err, DayplanError::PermissionDenied(_)));
    assert!(h.store.tasks()[0].reminder_at.is_none());
    assert_eq!(h.session.scheduler().armed_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn local_reminder_time_is_converted() {
    let h = Harness::granted();
    let id = h.session.add_task("Water plants", true).unwrap();
    let date = h.clock.now().with_timezone(&Local).date_naive();
    let time = NaiveTime::from_hms_opt(18, 30, 0).unwrap();

    h.session.set_reminder_local(&id, date, time).await.unwrap();

    let expected = local_instant(date, time, &Local).unwrap();
    assert_eq!(h.store.tasks()[0].reminder_at, Some(expected));
}

#[tokio::test(start_paused = true)]
async fn unknown_task_is_reported() {
    let h = Harness::granted();
    let missing = TaskId::from("missing");

    assert!(matches!(
        h.session.toggle_complete(&missing),
        Err(DayplanError::TaskNotFound(_))
    ));
    assert!(matches!(
        h.session.set_reminder(&missing, Some(minutes(5))).await,
        Err(DayplanError::TaskNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn store_outage_keeps_existing_reminders_running() {
    let h = Harness::granted();
    let id = h.session.add_task("Water plants", true).unwrap();
    h.session.set_reminder(&id, Some(minutes(5))).await.unwrap();

    h.store.set_available(false);
    let err = h.session.add_task("Read", true).unwrap_err();
    assert!(matches!(err, DayplanError::StoreUnavailable(_)));
    assert_eq!(h.session.snapshot().len(), 1);

    h.run_until_minute(6).await;
    assert_eq!(h.bodies(), vec!["Water plants".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_reminders_and_snapshots() {
    let h = Harness::granted();
    let id = h.session.add_task("Water plants", true).unwrap();
    h.session.set_reminder(&id, Some(minutes(5))).await.unwrap();

    h.session.shutdown().await;
    h.session.shutdown().await;

    assert_eq!(h.store.subscriber_count(), 0);
    assert!(h.session.scheduler().is_shut_down());

    h.run_until_minute(10).await;
    assert_eq!(h.notifier.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn restart_rearms_future_reminders_and_drops_missed_ones() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tasks.json");
    let clock = Arc::new(RuntimeClock::starting_at(start()));
    let origin = tokio::time::Instant::now();

    {
        let store = MemoryTaskStore::open(&path, clock.clone()).unwrap();
        let first = Harness::with_store(store, RecordingNotificationCenter::granted(), clock.clone());
        let soon = first.session.add_task("Soon", true).unwrap();
        let later = first.session.add_task("Later", true).unwrap();
        first.session.set_reminder(&soon, Some(minutes(5))).await.unwrap();
        first.session.set_reminder(&later, Some(minutes(60))).await.unwrap();
        first.session.shutdown().await;
    }

    // The process is down while the first reminder comes due.
    tokio::time::sleep_until(origin + Duration::from_secs(10 * 60)).await;

    let store = MemoryTaskStore::open(&path, clock.clone()).unwrap();
    let second = Harness::with_store(store, RecordingNotificationCenter::granted(), clock);
    assert_eq!(second.session.scheduler().armed_count(), 1);

    tokio::time::sleep_until(origin + Duration::from_secs(61 * 60)).await;
    tokio::task::yield_now().await;
    assert_eq!(second.bodies(), vec!["Later".to_owned()]);
}
