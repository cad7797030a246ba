//! Local notification facility.
//!
//! [`NotificationCenter`] is the boundary to the OS "show notification"
//! capability and its permission gate. Two implementations ship with the
//! crate:
//!
//! - [`LogNotificationCenter`] for headless hosts, which emits every
//!   notification as a tracing event
//! - [`RecordingNotificationCenter`] for tests, which records deliveries and
//!   answers permission prompts with a preset decision

use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Whether the user allows local notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// Notifications may be shown.
    Granted,
    /// The user declined.
    Denied,
    /// The user has not been asked yet.
    Undetermined,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Undetermined => "undetermined",
        };
        f.write_str(s)
    }
}

/// Error reported by the notification facility for a single delivery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    /// Permission was revoked after the reminder was set.
    #[error("notifications not permitted")]
    NotPermitted,
    /// The platform refused or failed to show the notification.
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Abstraction over the OS notification facility.
#[async_trait]
pub trait NotificationCenter: Send + Sync {
    /// Current permission state, without prompting.
    fn permission_state(&self) -> PermissionState;

    /// Ask the user for permission.
    ///
    /// Resolves to [`PermissionState::Granted`] or [`PermissionState::Denied`].
    async fn request_permission(&self) -> PermissionState;

    /// Show a notification. There is no delivery confirmation beyond the
    /// immediate result.
    fn notify(&self, title: &str, body: &str) -> Result<(), NotificationError>;
}

/// Headless notification center that logs instead of displaying.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationCenter;

#[async_trait]
impl NotificationCenter for LogNotificationCenter {
    fn permission_state(&self) -> PermissionState {
        PermissionState::Granted
    }

    async fn request_permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), NotificationError> {
        info!(title, body, "notification");
        Ok(())
    }
}

/// A notification that was handed to [`RecordingNotificationCenter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredNotification {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
}

#[derive(Debug)]
struct RecordingState {
    permission: PermissionState,
    answer: PermissionState,
    fail_deliveries: bool,
    delivered: Vec<DeliveredNotification>,
    attempts: usize,
    permission_requests: usize,
}

/// In-memory notification center for tests.
#[derive(Debug)]
pub struct RecordingNotificationCenter {
    state: Mutex<RecordingState>,
}

impl RecordingNotificationCenter {
    /// A center whose permission is already granted.
    pub fn granted() -> Self {
        Self::new(PermissionState::Granted, PermissionState::Granted)
    }

    /// A center in `permission` state that answers prompts with `answer`.
    pub fn new(permission: PermissionState, answer: PermissionState) -> Self {
        Self {
            state: Mutex::new(RecordingState {
                permission,
                answer,
                fail_deliveries: false,
                delivered: Vec::new(),
                attempts: 0,
                permission_requests: 0,
            }),
        }
    }

    /// Make every subsequent delivery fail.
    pub fn fail_deliveries(&self, fail: bool) {
        self.lock().fail_deliveries = fail;
    }

    /// Successfully delivered notifications, oldest first.
    pub fn delivered(&self) -> Vec<DeliveredNotification> {
        self.lock().delivered.clone()
    }

    /// Number of `notify` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Number of permission prompts shown.
    pub fn permission_requests(&self) -> usize {
        self.lock().permission_requests
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl NotificationCenter for RecordingNotificationCenter {
    fn permission_state(&self) -> PermissionState {
        self.lock().permission
    }

    async fn request_permission(&self) -> PermissionState {
        let mut state = self.lock();
        state.permission_requests += 1;
        state.permission = state.answer;
        state.answer
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), NotificationError> {
        let mut state = self.lock();
        state.attempts += 1;
        if state.permission != PermissionState::Granted {
            return Err(NotificationError::NotPermitted);
        }
        if state.fail_deliveries {
            return Err(NotificationError::Delivery("simulated failure".to_owned()));
        }
        state.delivered.push(DeliveredNotification {
            title: title.to_owned(),
            body: body.to_owned(),
        });
        Ok(())
    }
}
