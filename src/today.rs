//! Today view projection.
//!
//! [`project_today`] turns the full task collection into the ordered list
//! shown for the current calendar day. It is pure: the caller passes "now"
//! in the zone whose calendar defines the day, and the start of that day is
//! recomputed on every call.

use chrono::{DateTime, TimeZone};

use crate::tasks::{Schedule, Task};

/// Returns `true` when `task` was completed on or after the start of the
/// calendar day containing `now`.
pub fn is_completed_today<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>) -> bool {
    if !task.completed {
        return false;
    }
    let today = now.date_naive();
    let tz = now.timezone();
    task.completed_at
        .is_some_and(|at| at.with_timezone(&tz).date_naive() >= today)
}

/// Completion as it applies on the day containing `now`.
///
/// Daily tasks count as completed only when completed today; every other
/// task uses its stored flag.
pub fn is_completed_as_of<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>) -> bool {
    match task.schedule {
        Schedule::Daily => is_completed_today(task, now),
        Schedule::DueOn { .. } | Schedule::Unscheduled => task.completed,
    }
}

/// Tasks visible today, incomplete first, each group oldest first.
///
/// - Daily tasks are always included, with `completed` replaced by whether
///   they were completed today.
/// - Dated tasks are included when due today, or when completed today.
/// - Anything else is left out, including legacy records with no schedule.
pub fn project_today<Tz: TimeZone>(tasks: &[Task], now: &DateTime<Tz>) -> Vec<Task> {
    let today = now.date_naive();

    let mut visible: Vec<Task> = tasks
        .iter()
        .filter_map(|task| {
            let completed_today = is_completed_today(task, now);
            match &task.schedule {
                Schedule::Daily => {
                    let mut shown = task.clone();
                    shown.completed = completed_today;
                    Some(shown)
                }
                Schedule::DueOn { date } if *date == today => Some(task.clone()),
                Schedule::DueOn { .. } if completed_today => Some(task.clone()),
                Schedule::DueOn { .. } | Schedule::Unscheduled => None,
            }
        })
        .collect();

    visible.sort_by(|a, b| {
        a.completed
            .cmp(&b.completed)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    visible
}
