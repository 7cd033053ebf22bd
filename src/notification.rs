use std::path::PathBuf;

use thiserror::Error;

const APP_NAME: &str = "Snapline";
const APP_ICON: &str = "camera-photo";
const OPEN_ACTION: &str = "open";

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("failed to show desktop notification: {source}")]
    Show {
        #[source]
        source: notify_rust::error::Error,
    },
}

pub type NotificationResult<T> = std::result::Result<T, NotificationError>;

/// A "screenshot saved" notification with a single action that opens the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotNotification {
    pub title: String,
    pub body: String,
    pub action_label: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationResponse {
    Open,
    Dismissed,
}

impl NotificationResponse {
    fn from_action(action: &str) -> Self {
        if action == OPEN_ACTION {
            NotificationResponse::Open
        } else {
            NotificationResponse::Dismissed
        }
    }
}

/// `show_and_wait` blocks until the user acts, so callers run it off the main loop.
pub trait Notifier: Send + Sync {
    fn show_and_wait(
        &self,
        notification: &ScreenshotNotification,
    ) -> NotificationResult<NotificationResponse>;

    fn send_text(&self, body: &str) -> NotificationResult<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn show_and_wait(
        &self,
        notification: &ScreenshotNotification,
    ) -> NotificationResult<NotificationResponse> {
        let handle = notify_rust::Notification::new()
            .appname(APP_NAME)
            .summary(&notification.title)
            .body(&notification.body)
            .icon(APP_ICON)
            .action(OPEN_ACTION, &notification.action_label)
            .show()
            .map_err(|source| NotificationError::Show { source })?;

        let mut response = NotificationResponse::Dismissed;
        handle.wait_for_action(|action| {
            response = NotificationResponse::from_action(action);
        });
        tracing::debug!(?response, path = %notification.path.display(), "notification closed");
        Ok(response)
    }

    fn send_text(&self, body: &str) -> NotificationResult<()> {
        notify_rust::Notification::new()
            .appname(APP_NAME)
            .summary(APP_NAME)
            .body(body)
            .icon(APP_ICON)
            .show()
            .map(|_| ())
            .map_err(|source| NotificationError::Show { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_open_action_maps_to_open() {
        assert_eq!(
            NotificationResponse::from_action("open"),
            NotificationResponse::Open
        );
        assert_eq!(
            NotificationResponse::from_action("__closed"),
            NotificationResponse::Dismissed
        );
        assert_eq!(
            NotificationResponse::from_action("default"),
            NotificationResponse::Dismissed
        );
    }
}
