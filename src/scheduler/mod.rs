//! Reminder scheduling.
//!
//! Arms one cancelable timer per task with a pending reminder and keeps the
//! timer set consistent with every task snapshot.

pub mod reminders;

pub use reminders::ReminderScheduler;
