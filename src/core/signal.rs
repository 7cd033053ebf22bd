use std::path::PathBuf;
use std::time::Duration;

use crate::capture::{CaptureArtifact, GrabMode, GrabOptions};
use crate::notification::ScreenshotNotification;

use super::print::PrintJob;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartMode {
    #[default]
    Gui,
    Background,
    DBus,
}

/// Everything the command line decides about a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOptions {
    pub start_mode: StartMode,
    pub grab_mode: GrabMode,
    pub output: Option<String>,
    /// Negative values request an on-click grab.
    pub delay_ms: i64,
    pub notify: bool,
    pub send_to_clipboard: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            start_mode: StartMode::Gui,
            grab_mode: GrabMode::FullScreen,
            output: None,
            delay_ms: 0,
            notify: true,
            send_to_clipboard: false,
        }
    }
}

/// Work the runtime performs on behalf of the core, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreSignal {
    Grab {
        options: GrabOptions,
        delay: Duration,
    },
    GrabOnClick {
        options: GrabOptions,
    },
    InitGui {
        on_click_supported: bool,
    },
    ShowScreenshot(CaptureArtifact),
    ShowWindow,
    ShowError(String),
    Notify(ScreenshotNotification),
    NotifyText(String),
    OpenFile(PathBuf),
    Print(PrintJob),
    ImageSaved(PathBuf),
    GrabFailed,
    AllDone {
        after: Duration,
    },
}
