//! Task definitions.
//!
//! Defines the [`Task`] record, its [`Schedule`] (recurring or date-scoped),
//! and the write-side shapes [`NewTask`] and [`TaskPatch`].

use crate::error::{DayplanError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque task identifier, unique within a collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// A fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which days a task belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    /// Reappears every calendar day; completion counts for one day only.
    Daily,
    /// Belongs to a single calendar date.
    DueOn {
        /// Local calendar date.
        date: NaiveDate,
    },
    /// Neither recurring nor dated.
    ///
    /// Only produced by legacy records. Never shown in the today view and
    /// rejected on every write path.
    #[default]
    Unscheduled,
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => f.write_str("daily"),
            Self::DueOn { date } => write!(f, "due {date}"),
            Self::Unscheduled => f.write_str("unscheduled"),
        }
    }
}

/// A task as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: TaskId,
    /// Display text.
    pub text: String,
    /// Whether the task is marked done.
    #[serde(default)]
    pub completed: bool,
    /// When `completed` last went from false to true.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation instant; stable ordering key.
    pub created_at: DateTime<Utc>,
    /// Recurring or date-scoped.
    #[serde(default)]
    pub schedule: Schedule,
    /// Instant of the single pending reminder, if any.
    #[serde(default)]
    pub reminder_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Build a stored task from validated input.
    pub fn from_new(id: TaskId, new: NewTask, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            text: new.text.trim().to_owned(),
            completed: false,
            completed_at: None,
            created_at,
            schedule: new.schedule,
            reminder_at: new.reminder_at,
        }
    }

    /// Returns `true` when a reminder is set for an instant strictly after `now`.
    pub fn has_pending_reminder(&self, now: DateTime<Utc>) -> bool {
        self.reminder_at.is_some_and(|at| at > now)
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Display text; surrounding whitespace is trimmed.
    pub text: String,
    /// Recurring or date-scoped.
    pub schedule: Schedule,
    /// Optional reminder instant.
    pub reminder_at: Option<DateTime<Utc>>,
}

impl NewTask {
    /// A daily-recurring task.
    pub fn daily(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            schedule: Schedule::Daily,
            reminder_at: None,
        }
    }

    /// A task due on `date`.
    pub fn due_on(text: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            text: text.into(),
            schedule: Schedule::DueOn { date },
            reminder_at: None,
        }
    }

    /// Check the input before it is written.
    ///
    /// # Errors
    ///
    /// Returns [`DayplanError::Validation`] for blank text or a task that is
    /// neither recurring nor dated.
    pub fn validate(&self) -> Result<()> {
        validate_text(&self.text)?;
        if self.schedule == Schedule::Unscheduled {
            return Err(DayplanError::Validation(
                "a task must be daily or have a due date".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Partial update of a stored task.
///
/// `None` leaves a field untouched. For clearable fields the inner
/// `Option` carries the new value, so `Some(None)` clears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// New display text.
    pub text: Option<String>,
    /// New completion flag.
    pub completed: Option<bool>,
    /// New completion instant.
    pub completed_at: Option<Option<DateTime<Utc>>>,
    /// New schedule.
    pub schedule: Option<Schedule>,
    /// New reminder instant.
    pub reminder_at: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    /// Flip completion as currently shown to the user.
    ///
    /// `shown_completed` is the state the user sees, which for a daily task
    /// is "completed today" rather than the stored flag. Marking done stamps
    /// `completed_at = now`; marking undone clears it.
    pub fn toggle(shown_completed: bool, now: DateTime<Utc>) -> Self {
        if shown_completed {
            Self {
                completed: Some(false),
                completed_at: Some(None),
                ..Self::default()
            }
        } else {
            Self {
                completed: Some(true),
                completed_at: Some(Some(now)),
                ..Self::default()
            }
        }
    }

    /// Set or clear the reminder.
    pub fn reminder(at: Option<DateTime<Utc>>) -> Self {
        Self {
            reminder_at: Some(at),
            ..Self::default()
        }
    }

    /// Replace the display text.
    pub fn rename(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Check the patch before it is written.
    ///
    /// # Errors
    ///
    /// Returns [`DayplanError::Validation`] for blank text or an
    /// `Unscheduled` schedule.
    pub fn validate(&self) -> Result<()> {
        if let Some(text) = &self.text {
            validate_text(text)?;
        }
        if self.schedule == Some(Schedule::Unscheduled) {
            return Err(DayplanError::Validation(
                "a task must be daily or have a due date".to_owned(),
            ));
        }
        Ok(())
    }

    /// Apply the patch in place.
    pub fn apply(&self, task: &mut Task) {
        if let Some(text) = &self.text {
            task.text = text.trim().to_owned();
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(completed_at) = self.completed_at {
            task.completed_at = completed_at;
        }
        if let Some(schedule) = &self.schedule {
            task.schedule = schedule.clone();
        }
        if let Some(reminder_at) = self.reminder_at {
            task.reminder_at = reminder_at;
        }
    }
}

fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(DayplanError::Validation(
            "task text must not be empty".to_owned(),
        ));
    }
    Ok(())
}
