use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use gtk4::glib;

use crate::capture::{BackendKind, CaptureArtifact, CaptureError, GrabMode, GrabOptions};
use crate::clipboard::ClipboardBackend;
use crate::config::AppConfig;
use crate::export::ExportManager;
use crate::notification::{NotificationResponse, ScreenshotNotification};
use crate::state::{CoreEvent, CoreState, StateMachine};

mod drag;
mod launch;
mod print;
mod signal;

pub use drag::{thumbnail_size, DragPayload, DRAG_THUMBNAIL_EDGE, SUGGESTED_FILENAME_MIME};
pub use launch::{AppLauncher, LaunchError};
pub use print::{fit_to_page, PrintJob, PrintPlacement};
pub use signal::{CoreSignal, StartMode, StartOptions};

const SETTLE_MARGIN_COMPOSITED: Duration = Duration::from_millis(200);
const SETTLE_MARGIN_PLAIN: Duration = Duration::from_millis(50);
const OPEN_THEN_QUIT_DELAY: Duration = Duration::from_millis(250);
const CAPTURE_FAILED_MESSAGE: &str = "Screenshot capture canceled or failed";
const CLIPBOARD_NOTIFICATION: &str = "A screenshot was saved to your clipboard.";
const OPEN_ACTION_LABEL: &str = "Open";

/// What the capture backend can do on this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendInfo {
    pub kind: BackendKind,
    pub on_click_supported: bool,
    pub compositing: bool,
}

/// The user-requested output filename, resolved against the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Local(PathBuf),
    /// A non-file URL. Remembered for display, never written to.
    Remote(String),
}

impl OutputTarget {
    pub fn parse(raw: &str, cwd: &Path) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.starts_with("file://") {
            return match glib::filename_from_uri(raw) {
                Ok((path, _)) => Some(OutputTarget::Local(path)),
                Err(err) => {
                    tracing::warn!(uri = raw, %err, "ignoring malformed file URI");
                    None
                }
            };
        }
        if has_url_scheme(raw) {
            return Some(OutputTarget::Remote(raw.to_string()));
        }

        let path = Path::new(raw);
        if path.is_absolute() {
            Some(OutputTarget::Local(path.to_path_buf()))
        } else {
            Some(OutputTarget::Local(cwd.join(path)))
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            OutputTarget::Local(path) => path.display().to_string(),
            OutputTarget::Remote(url) => url.clone(),
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        match self {
            OutputTarget::Local(path) => Some(path),
            OutputTarget::Remote(_) => None,
        }
    }
}

fn resolve_output(raw: &str) -> Option<OutputTarget> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    OutputTarget::parse(raw, &cwd)
}

fn has_url_scheme(raw: &str) -> bool {
    raw.split_once("://").is_some_and(|(scheme, _)| {
        scheme
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Coordinates grabs and routes each result by start mode. Every entry point
/// returns the signals the runtime has to carry out.
pub struct ScreenshotCore {
    start_mode: StartMode,
    filename: Option<String>,
    output: Option<OutputTarget>,
    grab_options: GrabOptions,
    initial_delay_ms: i64,
    notify: bool,
    send_to_clipboard: bool,
    backend: BackendInfo,
    config: AppConfig,
    export: ExportManager,
    clipboard: Box<dyn ClipboardBackend>,
    state: StateMachine,
    gui_inited: bool,
}

impl ScreenshotCore {
    pub fn new(
        options: StartOptions,
        backend: BackendInfo,
        export: ExportManager,
        clipboard: Box<dyn ClipboardBackend>,
        config: AppConfig,
    ) -> Self {
        let output = options.output.as_deref().and_then(resolve_output);
        let filename = output.as_ref().map(OutputTarget::display_name);

        let grab_options = GrabOptions {
            mode: options.grab_mode,
            include_pointer: config.include_pointer,
            include_decorations: config.include_decorations,
        };

        let initial_delay_ms = if options.delay_ms < 0 && !backend.on_click_supported {
            tracing::info!(
                backend = backend.kind.name(),
                "on-click grab unsupported; grabbing without delay"
            );
            0
        } else {
            options.delay_ms
        };

        Self {
            start_mode: options.start_mode,
            filename,
            output,
            grab_options,
            initial_delay_ms,
            notify: options.notify,
            send_to_clipboard: options.send_to_clipboard,
            backend,
            config,
            export,
            clipboard,
            state: StateMachine::new(),
            gui_inited: false,
        }
    }

    /// Signals for the configured start mode. Call once after construction.
    pub fn start(&mut self) -> Vec<CoreSignal> {
        tracing::info!(
            start_mode = ?self.start_mode,
            mode = %self.grab_options.mode,
            delay_ms = self.initial_delay_ms,
            backend = self.backend.kind.name(),
            "starting screenshot core"
        );
        match self.start_mode {
            StartMode::DBus => Vec::new(),
            StartMode::Background => {
                if !self.request_grab() {
                    return Vec::new();
                }
                let options = self.grab_options;
                if self.initial_delay_ms < 0 {
                    vec![CoreSignal::GrabOnClick { options }]
                } else {
                    let delay = self.settle_margin() + millis(self.initial_delay_ms);
                    vec![CoreSignal::Grab { options, delay }]
                }
            }
            StartMode::Gui => self.init_gui(),
        }
    }

    pub fn start_mode(&self) -> StartMode {
        self.start_mode
    }

    pub fn state(&self) -> CoreState {
        self.state.state()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn set_filename(&mut self, filename: &str) {
        self.output = resolve_output(filename);
        self.filename = self.output.as_ref().map(OutputTarget::display_name);
    }

    pub fn output(&self) -> Option<&OutputTarget> {
        self.output.as_ref()
    }

    pub fn grab_mode(&self) -> GrabMode {
        self.grab_options.mode
    }

    pub fn set_grab_mode(&mut self, mode: GrabMode) {
        self.grab_options.mode = mode;
    }

    pub fn grab_options(&self) -> GrabOptions {
        self.grab_options
    }

    pub fn backend(&self) -> BackendInfo {
        self.backend
    }

    pub fn export(&self) -> &ExportManager {
        &self.export
    }

    fn settle_margin(&self) -> Duration {
        if self.backend.compositing {
            SETTLE_MARGIN_COMPOSITED
        } else {
            SETTLE_MARGIN_PLAIN
        }
    }

    fn request_grab(&mut self) -> bool {
        match self.state.transition(CoreEvent::RequestGrab) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(%err, "grab request rejected");
                false
            }
        }
    }

    fn advance(&mut self, event: CoreEvent) {
        if let Err(err) = self.state.transition(event) {
            tracing::debug!(%err, "state unchanged");
        }
    }

    fn init_gui(&mut self) -> Vec<CoreSignal> {
        if self.gui_inited {
            return vec![CoreSignal::ShowWindow];
        }
        self.gui_inited = true;

        let mut signals = vec![CoreSignal::InitGui {
            on_click_supported: self.backend.on_click_supported,
        }];
        if self.request_grab() {
            signals.push(CoreSignal::Grab {
                options: self.grab_options,
                delay: Duration::ZERO,
            });
        }
        signals
    }

    fn finish(&mut self, after: Duration) -> CoreSignal {
        self.advance(CoreEvent::Finish);
        self.export.release();
        CoreSignal::AllDone { after }
    }

    pub fn take_new_screenshot(
        &mut self,
        mode: GrabMode,
        timeout_ms: i64,
        include_pointer: bool,
        include_decorations: bool,
    ) -> Vec<CoreSignal> {
        if self.state() == CoreState::GrabPending {
            tracing::warn!(mode = %mode, "screenshot already pending; ignoring request");
            return Vec::new();
        }

        self.grab_options = GrabOptions {
            mode,
            include_pointer,
            include_decorations,
        };
        if !self.request_grab() {
            return Vec::new();
        }

        let options = self.grab_options;
        if timeout_ms < 0 {
            if self.backend.on_click_supported {
                return vec![CoreSignal::GrabOnClick { options }];
            }
            tracing::debug!(
                backend = self.backend.kind.name(),
                "on-click grab unsupported; grabbing after settle margin"
            );
            return vec![CoreSignal::Grab {
                options,
                delay: self.settle_margin(),
            }];
        }

        vec![CoreSignal::Grab {
            options,
            delay: millis(timeout_ms) + self.settle_margin(),
        }]
    }

    pub fn screenshot_updated(&mut self, artifact: CaptureArtifact) -> Vec<CoreSignal> {
        tracing::info!(
            capture_id = %artifact.capture_id,
            mode = %artifact.mode,
            width = artifact.width,
            height = artifact.height,
            "screenshot captured"
        );
        self.export.set_image(artifact.clone());

        match self.start_mode {
            StartMode::Gui => {
                self.advance(CoreEvent::OpenPreview);
                vec![CoreSignal::ShowScreenshot(artifact)]
            }
            StartMode::Background if self.send_to_clipboard => {
                let mut signals = Vec::new();
                match self.clipboard.copy_image(&artifact.temp_path) {
                    Ok(()) => {
                        tracing::info!("screenshot copied to clipboard");
                        if self.notify {
                            signals.push(CoreSignal::NotifyText(CLIPBOARD_NOTIFICATION.to_string()));
                        }
                    }
                    Err(err) => {
                        signals.extend(self.show_error_message(&format!(
                            "Failed to copy screenshot to clipboard: {err}"
                        )));
                    }
                }
                signals.push(self.finish(Duration::ZERO));
                signals
            }
            StartMode::Background | StartMode::DBus => {
                let target = match self.start_mode {
                    StartMode::Background => self
                        .output
                        .as_ref()
                        .and_then(OutputTarget::local_path)
                        .map(Path::to_path_buf),
                    _ => None,
                };
                if let (StartMode::Background, Some(OutputTarget::Remote(url))) =
                    (self.start_mode, &self.output)
                {
                    tracing::warn!(url = %url, "remote output is not supported; auto-saving");
                }

                let mut signals = Vec::new();
                match self.export.do_save(target.as_deref(), &Local::now()) {
                    Ok(saved_at) => {
                        signals.extend(self.after_save(&saved_at));
                        if self.notify {
                            self.advance(CoreEvent::AwaitNotification);
                            signals.push(self.do_notify(&saved_at));
                        } else {
                            signals.push(self.finish(Duration::ZERO));
                        }
                    }
                    Err(err) => {
                        signals.extend(
                            self.show_error_message(&format!("Failed to save screenshot: {err}")),
                        );
                        signals.push(CoreSignal::GrabFailed);
                        signals.push(self.finish(Duration::ZERO));
                    }
                }
                signals
            }
        }
    }

    pub fn screenshot_failed(&mut self, err: &CaptureError) -> Vec<CoreSignal> {
        tracing::warn!(%err, start_mode = ?self.start_mode, "screenshot grab failed");
        match self.start_mode {
            StartMode::Background | StartMode::DBus => {
                let mut signals = Vec::new();
                if self.start_mode == StartMode::Background {
                    signals.extend(self.show_error_message(CAPTURE_FAILED_MESSAGE));
                }
                self.advance(CoreEvent::GrabFailed);
                signals.push(CoreSignal::GrabFailed);
                signals.push(self.finish(Duration::ZERO));
                signals
            }
            StartMode::Gui => {
                if self.export.has_image() {
                    self.advance(CoreEvent::OpenPreview);
                } else {
                    self.advance(CoreEvent::GrabFailed);
                }
                vec![CoreSignal::ShowWindow]
            }
        }
    }

    /// Errors are always logged. Only the GUI also presents them.
    pub fn show_error_message(&self, message: &str) -> Vec<CoreSignal> {
        tracing::error!(error = message, "screenshot error");
        if self.start_mode == StartMode::Gui {
            vec![CoreSignal::ShowError(message.to_string())]
        } else {
            Vec::new()
        }
    }

    pub fn do_notify(&self, saved_at: &Path) -> CoreSignal {
        CoreSignal::Notify(self.saved_notification(saved_at))
    }

    fn saved_notification(&self, saved_at: &Path) -> ScreenshotNotification {
        let name = saved_at
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = saved_at.parent().unwrap_or_else(|| Path::new(""));
        let in_pictures = self
            .export
            .settings()
            .pictures_dir
            .as_deref()
            .is_some_and(|pictures| same_dir(pictures, dir));

        let body = if in_pictures {
            format!("A screenshot was saved as '{name}' to your Pictures folder.")
        } else {
            format!("A screenshot was saved as '{name}' to '{}'.", dir.display())
        };

        ScreenshotNotification {
            title: notification_title(self.grab_options.mode).to_string(),
            body,
            action_label: OPEN_ACTION_LABEL.to_string(),
            path: saved_at.to_path_buf(),
        }
    }

    /// Result of a notification raised by [`Self::do_notify`].
    pub fn notification_closed(
        &mut self,
        notification: &ScreenshotNotification,
        response: NotificationResponse,
    ) -> Vec<CoreSignal> {
        match response {
            NotificationResponse::Open => vec![
                CoreSignal::OpenFile(notification.path.clone()),
                self.finish(OPEN_THEN_QUIT_DELAY),
            ],
            NotificationResponse::Dismissed => vec![self.finish(Duration::ZERO)],
        }
    }

    fn after_save(&self, saved_at: &Path) -> Vec<CoreSignal> {
        let mut signals = vec![CoreSignal::ImageSaved(saved_at.to_path_buf())];
        signals.extend(self.do_copy_path(saved_at));
        signals
    }

    pub fn do_copy_path(&self, saved_at: &Path) -> Vec<CoreSignal> {
        if !self.config.copy_save_location_to_clipboard {
            return Vec::new();
        }
        match self.clipboard.copy_text(&saved_at.to_string_lossy()) {
            Ok(()) => {
                tracing::debug!(path = %saved_at.display(), "copied save location");
                Vec::new()
            }
            Err(err) => self.show_error_message(&format!("Failed to copy save location: {err}")),
        }
    }

    /// `None` when there is nothing to drag or the temp export failed.
    pub fn do_start_drag_and_drop(&mut self) -> Option<DragPayload> {
        let (width, height, capture_path) = {
            let artifact = self.export.image()?;
            (artifact.width, artifact.height, artifact.temp_path.clone())
        };
        let file_path = match self.export.temp_save(&Local::now()) {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(%err, "temp save for drag failed");
                return None;
            }
        };
        let uri = match glib::filename_to_uri(&file_path, None) {
            Ok(uri) => uri,
            Err(err) => {
                tracing::warn!(path = %file_path.display(), %err, "cannot build drag URI");
                return None;
            }
        };
        // The export may be re-encoded; the raw capture is always PNG.
        let png_data = match std::fs::read(&capture_path) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(path = %capture_path.display(), ?err, "cannot read drag image");
                return None;
            }
        };
        let suggested_filename = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (thumbnail_width, thumbnail_height) =
            thumbnail_size(width, height, DRAG_THUMBNAIL_EDGE);

        Some(DragPayload {
            uri_list: format!("{uri}\r\n"),
            file_path,
            png_data,
            suggested_filename,
            thumbnail_width,
            thumbnail_height,
        })
    }

    pub fn dbus_start_agent(&mut self) -> Vec<CoreSignal> {
        if self.start_mode != StartMode::Gui {
            tracing::info!(from = ?self.start_mode, "switching to GUI mode");
            self.start_mode = StartMode::Gui;
        }
        self.init_gui()
    }

    pub fn do_auto_save(&self) -> Vec<CoreSignal> {
        match self.export.do_save(None, &Local::now()) {
            Ok(saved_at) => self.after_save(&saved_at),
            Err(err) => self.show_error_message(&format!("Failed to save screenshot: {err}")),
        }
    }

    pub fn do_gui_save_as(&self, path: &Path) -> Vec<CoreSignal> {
        match self.export.save_to(path) {
            Ok(saved_at) => self.after_save(&saved_at),
            Err(err) => self.show_error_message(&format!(
                "Failed to save screenshot to {}: {err}",
                path.display()
            )),
        }
    }

    pub fn do_send_to_clipboard(&self) -> Vec<CoreSignal> {
        let Some(artifact) = self.export.image() else {
            return self.show_error_message("There is no screenshot to copy");
        };
        match self.clipboard.copy_image(&artifact.temp_path) {
            Ok(()) => {
                tracing::info!(capture_id = %artifact.capture_id, "screenshot copied to clipboard");
                Vec::new()
            }
            Err(err) => {
                self.show_error_message(&format!("Failed to copy screenshot to clipboard: {err}"))
            }
        }
    }

    pub fn do_print(&mut self) -> Vec<CoreSignal> {
        let Some((width, height)) = self.export.image().map(|a| (a.width, a.height)) else {
            return self.show_error_message("There is no screenshot to print");
        };
        match self.export.temp_save(&Local::now()) {
            Ok(image_path) => vec![CoreSignal::Print(PrintJob {
                image_path,
                width,
                height,
            })],
            Err(err) => self.show_error_message(&format!("Failed to prepare print: {err}")),
        }
    }

    pub fn do_send_to_service(&mut self, launcher: &dyn AppLauncher) -> Vec<CoreSignal> {
        self.hand_off(launcher)
    }

    /// Hands the screenshot to the default (or user-chosen) application.
    pub fn do_send_to_open_with(&mut self, launcher: &dyn AppLauncher) -> Vec<CoreSignal> {
        self.hand_off(launcher)
    }

    fn hand_off(&mut self, launcher: &dyn AppLauncher) -> Vec<CoreSignal> {
        if !self.export.has_image() {
            return self.show_error_message("There is no screenshot to send");
        }
        let path = match self.export.temp_save(&Local::now()) {
            Ok(path) => path,
            Err(err) => {
                return self.show_error_message(&format!("Failed to prepare screenshot: {err}"))
            }
        };
        match launcher.launch(&path) {
            Ok(()) => {
                tracing::info!(
                    application = %launcher.display_name(),
                    path = %path.display(),
                    "screenshot sent to application"
                );
                Vec::new()
            }
            Err(err) => self.show_error_message(&err.to_string()),
        }
    }

    /// The preview window was closed.
    pub fn close(&mut self) -> Vec<CoreSignal> {
        vec![self.finish(Duration::ZERO)]
    }
}

fn millis(value: i64) -> Duration {
    Duration::from_millis(u64::try_from(value).unwrap_or(0))
}

fn same_dir(left: &Path, right: &Path) -> bool {
    let trim = |path: &Path| path.components().collect::<PathBuf>();
    trim(left) == trim(right)
}

pub fn notification_title(mode: GrabMode) -> &'static str {
    match mode {
        GrabMode::FullScreen => "Full Screen Captured",
        GrabMode::CurrentScreen => "Current Screen Captured",
        GrabMode::ActiveWindow => "Active Window Captured",
        GrabMode::WindowUnderCursor => "Window Under Cursor Captured",
        GrabMode::RectangularRegion => "Rectangular Region Captured",
    }
}
