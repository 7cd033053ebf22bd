use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::storage::create_temp_capture;
use thiserror::Error;

mod dummy;
mod hyprland;
mod platform;
mod wayland;
mod x11;

pub use dummy::DummyGrabber;
pub use platform::{compositing_active, detect_platform, select_grabber, Platform};
pub use wayland::WaylandGrabber;
pub use x11::X11Grabber;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GrabMode {
    #[default]
    FullScreen,
    CurrentScreen,
    ActiveWindow,
    WindowUnderCursor,
    RectangularRegion,
}

impl GrabMode {
    pub const ALL: [GrabMode; 5] = [
        GrabMode::FullScreen,
        GrabMode::CurrentScreen,
        GrabMode::ActiveWindow,
        GrabMode::WindowUnderCursor,
        GrabMode::RectangularRegion,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            GrabMode::FullScreen => "full-screen",
            GrabMode::CurrentScreen => "current-screen",
            GrabMode::ActiveWindow => "active-window",
            GrabMode::WindowUnderCursor => "window-under-cursor",
            GrabMode::RectangularRegion => "rectangular-region",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            GrabMode::FullScreen => "Full Screen",
            GrabMode::CurrentScreen => "Current Screen",
            GrabMode::ActiveWindow => "Active Window",
            GrabMode::WindowUnderCursor => "Window Under Cursor",
            GrabMode::RectangularRegion => "Rectangular Region",
        }
    }

    pub const fn is_window_mode(self) -> bool {
        matches!(self, GrabMode::ActiveWindow | GrabMode::WindowUnderCursor)
    }
}

impl fmt::Display for GrabMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrabMode {
    type Err = CaptureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        GrabMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| CaptureError::UnknownGrabMode {
                value: value.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrabOptions {
    pub mode: GrabMode,
    pub include_pointer: bool,
    pub include_decorations: bool,
}

impl GrabOptions {
    pub const fn new(mode: GrabMode) -> Self {
        Self {
            mode,
            include_pointer: true,
            include_decorations: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    X11,
    Wayland,
    Dummy,
}

impl BackendKind {
    pub const fn name(self) -> &'static str {
        match self {
            BackendKind::X11 => "x11",
            BackendKind::Wayland => "wayland",
            BackendKind::Dummy => "dummy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureArtifact {
    pub capture_id: String,
    pub temp_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub mode: GrabMode,
    pub created_at: u64,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("command failed: {command}: {message}")]
    CommandFailed { command: String, message: String },
    #[error("command io error: {command}")]
    CommandIo {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no focused monitor found")]
    NoFocusedMonitor,
    #[error("invalid monitor metadata: {message}")]
    InvalidMonitorMetadata { message: String },
    #[error("invalid window metadata: {message}")]
    InvalidWindowMetadata { message: String },
    #[error("invalid capture artifact: {message}")]
    InvalidCaptureArtifact { message: String },
    #[error("invalid capture selection: {message}")]
    InvalidSelection { message: String },
    #[error("failed to read captured image dimensions: {message}")]
    ImageReadFailed { message: String },
    #[error("unknown grab mode: {value}")]
    UnknownGrabMode { value: String },
    #[error("{backend} backend does not support {operation}")]
    Unsupported {
        backend: &'static str,
        operation: String,
    },
    #[error("capture cancelled: {reason}")]
    Cancelled { reason: String },
}

/// Platform screenshot backend. Implementations block until the image file is written.
pub trait ImageGrabber: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn on_click_grab_supported(&self) -> bool;

    fn grab(&self, options: &GrabOptions) -> Result<CaptureArtifact, CaptureError>;

    fn grab_on_click(&self, options: &GrabOptions) -> Result<CaptureArtifact, CaptureError> {
        Err(CaptureError::Unsupported {
            backend: self.kind().name(),
            operation: format!("on-click grab of {}", options.mode),
        })
    }
}

/// External tool invocations used by the command-driven backends.
pub trait CommandRunner: Send + Sync {
    fn output(&self, command: &str, args: &[&str]) -> Result<String, CaptureError>;
    fn write_to(&self, command: &str, args: &[&str], output: &Path) -> Result<(), CaptureError>;
    fn image_dimensions(&self, path: &Path) -> Result<(u32, u32), CaptureError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn output(&self, command: &str, args: &[&str]) -> Result<String, CaptureError> {
        run_command_output(command, args)
    }

    fn write_to(&self, command: &str, args: &[&str], output: &Path) -> Result<(), CaptureError> {
        run_command_status(command, args, output)
    }

    fn image_dimensions(&self, path: &Path) -> Result<(u32, u32), CaptureError> {
        image::image_dimensions(path).map_err(|err| CaptureError::ImageReadFailed {
            message: err.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CaptureRegion {
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl CaptureRegion {
    pub(crate) const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub(crate) fn contains(&self, x: i32, y: i32) -> bool {
        let right = i64::from(self.x) + i64::from(self.width);
        let bottom = i64::from(self.y) + i64::from(self.height);
        x >= self.x && y >= self.y && i64::from(x) < right && i64::from(y) < bottom
    }

    /// `grim -g` / `slurp` geometry syntax.
    pub(crate) fn slurp_geometry(&self) -> String {
        format!("{},{} {}x{}", self.x, self.y, self.width, self.height)
    }

    /// X geometry syntax used by `maim -g`.
    pub(crate) fn x_geometry(&self) -> String {
        format!("{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

pub(crate) fn parse_region_selection(geometry: &str) -> Result<CaptureRegion, CaptureError> {
    let invalid = || CaptureError::InvalidSelection {
        message: format!("invalid region geometry: {geometry}"),
    };
    let mut parts = geometry.split_whitespace();
    let position = parts.next().ok_or_else(invalid)?;
    let size = parts.next().ok_or_else(invalid)?;
    if parts.next().is_some() {
        return Err(invalid());
    }

    let Some((x, y)) = position.split_once(',') else {
        return Err(CaptureError::InvalidSelection {
            message: format!("invalid region position: {position}"),
        });
    };
    let Some((width, height)) = size.split_once('x') else {
        return Err(CaptureError::InvalidSelection {
            message: format!("invalid region size: {size}"),
        });
    };

    let x = parse_coordinate(x, "x")?;
    let y = parse_coordinate(y, "y")?;
    let width = parse_extent(width, "width")?;
    let height = parse_extent(height, "height")?;
    if width == 0 || height == 0 {
        return Err(CaptureError::InvalidSelection {
            message: format!("selection must be positive, got {width}x{height}"),
        });
    }

    Ok(CaptureRegion::new(x, y, width, height))
}

fn parse_coordinate(raw: &str, axis: &str) -> Result<i32, CaptureError> {
    raw.parse::<i32>()
        .map_err(|err| CaptureError::InvalidSelection {
            message: format!("invalid {axis} coordinate '{raw}': {err}"),
        })
}

fn parse_extent(raw: &str, axis: &str) -> Result<u32, CaptureError> {
    raw.parse::<u32>()
        .map_err(|err| CaptureError::InvalidSelection {
            message: format!("invalid {axis} '{raw}': {err}"),
        })
}

/// Reserves a capture id and temp path for a grab that is about to run.
pub(crate) struct PendingCapture {
    capture_id: String,
    temp_path: PathBuf,
    mode: GrabMode,
    created_at: u64,
}

impl PendingCapture {
    pub(crate) fn allocate(mode: GrabMode) -> Result<Self, CaptureError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| CaptureError::InvalidCaptureArtifact {
                message: format!("system time before unix epoch: {err}"),
            })?;

        let capture_id = format!("capture-{}", now.as_nanos());
        let temp_path = create_temp_capture(&capture_id).map_err(|err| {
            CaptureError::InvalidCaptureArtifact {
                message: format!("failed to prepare temp capture path: {err}"),
            }
        })?;
        Ok(Self {
            capture_id,
            temp_path,
            mode,
            created_at: now.as_millis() as u64,
        })
    }

    pub(crate) fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Runs the pixel-writing step and reads back the image size. The temp file is
    /// removed when either step fails.
    pub(crate) fn complete<R, F>(self, runner: &R, write: F) -> Result<CaptureArtifact, CaptureError>
    where
        R: CommandRunner + ?Sized,
        F: FnOnce(&Path) -> Result<(), CaptureError>,
    {
        if let Err(err) = write(&self.temp_path) {
            cleanup_temp_capture_file(&self.temp_path, "capture command failure");
            return Err(err);
        }

        let (width, height) = match runner.image_dimensions(&self.temp_path) {
            Ok(size) => size,
            Err(err) => {
                cleanup_temp_capture_file(&self.temp_path, "capture image dimension read failure");
                return Err(err);
            }
        };

        tracing::debug!(
            capture_id = %self.capture_id,
            mode = %self.mode,
            width,
            height,
            "capture written"
        );

        Ok(CaptureArtifact {
            capture_id: self.capture_id,
            temp_path: self.temp_path,
            width,
            height,
            mode: self.mode,
            created_at: self.created_at,
        })
    }
}

/// Maps a failed interactive selection tool (slurp, slop) to a cancellation.
pub(crate) fn selection_cancelled(err: CaptureError) -> CaptureError {
    match err {
        CaptureError::CommandFailed { command, message } => CaptureError::Cancelled {
            reason: format!("{command} selection aborted: {message}"),
        },
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TempCaptureCleanupOutcome {
    Removed,
    NotFound,
    Failed,
}

fn cleanup_temp_capture_file(temp_path: &Path, stage: &str) -> TempCaptureCleanupOutcome {
    cleanup_temp_capture_file_with(temp_path, stage, |path| std::fs::remove_file(path))
}

fn cleanup_temp_capture_file_with<F>(
    temp_path: &Path,
    stage: &str,
    remove_file: F,
) -> TempCaptureCleanupOutcome
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    match remove_file(temp_path) {
        Ok(()) => TempCaptureCleanupOutcome::Removed,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                stage = stage,
                path = %temp_path.display(),
                "temporary capture file was never written"
            );
            TempCaptureCleanupOutcome::NotFound
        }
        Err(err) => {
            tracing::warn!(
                stage = stage,
                path = %temp_path.display(),
                ?err,
                "failed to cleanup temporary capture file"
            );
            TempCaptureCleanupOutcome::Failed
        }
    }
}

fn run_command_output(command: &str, args: &[&str]) -> Result<String, CaptureError> {
    let child = Command::new(command)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| CaptureError::CommandIo {
            command: command.to_string(),
            source: err,
        })?;

    let output = child
        .wait_with_output()
        .map_err(|err| CaptureError::CommandIo {
            command: command.to_string(),
            source: err,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let message = format!("exit status: {}; stderr: {}", output.status, stderr.trim());
        return Err(CaptureError::CommandFailed {
            command: command.to_string(),
            message,
        });
    }

    if stdout.is_empty() {
        return Err(CaptureError::CommandFailed {
            command: command.to_string(),
            message: "command produced no stdout output".to_string(),
        });
    }

    Ok(stdout)
}

fn run_command_status(command: &str, args: &[&str], output: &Path) -> Result<(), CaptureError> {
    let status = Command::new(command)
        .args(args)
        .arg(output)
        .status()
        .map_err(|err| CaptureError::CommandIo {
            command: command.to_string(),
            source: err,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(CaptureError::CommandFailed {
            command: command.to_string(),
            message: format!("command exited with status: {status}"),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use super::{CaptureError, CommandRunner};

    /// Records every invocation; replies come from a table keyed by the full command line.
    #[derive(Default)]
    pub(crate) struct FakeRunner {
        replies: HashMap<String, String>,
        failing: Vec<String>,
        pub(crate) dimensions: (u32, u32),
        pub(crate) fail_dimensions: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        pub(crate) fn new() -> Self {
            Self {
                dimensions: (1920, 1080),
                ..Self::default()
            }
        }

        pub(crate) fn reply(mut self, command_line: &str, stdout: &str) -> Self {
            self.replies
                .insert(command_line.to_string(), stdout.to_string());
            self
        }

        pub(crate) fn fail(mut self, command: &str) -> Self {
            self.failing.push(command.to_string());
            self
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }

        fn record(&self, line: String) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(line);
            }
        }

        fn check_failing(&self, command: &str) -> Result<(), CaptureError> {
            if self.failing.iter().any(|failing| failing == command) {
                return Err(CaptureError::CommandFailed {
                    command: command.to_string(),
                    message: "simulated failure".to_string(),
                });
            }
            Ok(())
        }

        fn lookup(&self, line: &str, command: &str) -> Result<String, CaptureError> {
            self.replies
                .get(line)
                .cloned()
                .ok_or_else(|| CaptureError::CommandFailed {
                    command: command.to_string(),
                    message: format!("no fake reply for `{line}`"),
                })
        }
    }

    fn command_line(command: &str, args: &[&str]) -> String {
        std::iter::once(command)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    impl CommandRunner for FakeRunner {
        fn output(&self, command: &str, args: &[&str]) -> Result<String, CaptureError> {
            let line = command_line(command, args);
            self.record(line.clone());
            self.check_failing(command)?;
            self.lookup(&line, command)
        }

        fn write_to(
            &self,
            command: &str,
            args: &[&str],
            output: &Path,
        ) -> Result<(), CaptureError> {
            self.record(format!(
                "{} {}",
                command_line(command, args),
                output.display()
            ));
            self.check_failing(command)?;
            std::fs::write(output, b"capture-data").map_err(|err| CaptureError::CommandIo {
                command: command.to_string(),
                source: err,
            })
        }

        fn image_dimensions(&self, _path: &Path) -> Result<(u32, u32), CaptureError> {
            if self.fail_dimensions {
                return Err(CaptureError::ImageReadFailed {
                    message: "simulated dimension read failure".to_string(),
                });
            }
            Ok(self.dimensions)
        }
    }

    /// Output path is the last token of a recorded write command.
    pub(crate) fn written_path(call: &str) -> std::path::PathBuf {
        std::path::PathBuf::from(call.split_whitespace().last().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{written_path, FakeRunner};
    use super::*;

    #[test]
    fn grab_mode_round_trips_through_names() {
        for mode in GrabMode::ALL {
            assert_eq!(mode.as_str().parse::<GrabMode>().unwrap(), mode);
        }
        assert_eq!(
            "Window_Under_Cursor".parse::<GrabMode>().unwrap(),
            GrabMode::WindowUnderCursor
        );
        assert!(matches!(
            "everything".parse::<GrabMode>(),
            Err(CaptureError::UnknownGrabMode { .. })
        ));
    }

    #[test]
    fn parse_region_selection_parses_expected_format() {
        let selection = parse_region_selection("320,240 640x360").expect("selection should parse");
        assert_eq!(selection, CaptureRegion::new(320, 240, 640, 360));
        assert_eq!(selection.slurp_geometry(), "320,240 640x360");
        assert_eq!(selection.x_geometry(), "640x360+320+240");
    }

    #[test]
    fn parse_region_selection_rejects_invalid_formats() {
        for raw in ["oops", "1,2", "1,2 3x4 extra", "a,2 3x4", "1,2 0x4"] {
            let err = parse_region_selection(raw).expect_err("invalid geometry should error");
            assert!(matches!(err, CaptureError::InvalidSelection { .. }), "{raw}");
        }
    }

    #[test]
    fn capture_region_contains_is_half_open() {
        let region = CaptureRegion::new(10, 20, 100, 50);
        assert!(region.contains(10, 20));
        assert!(region.contains(109, 69));
        assert!(!region.contains(110, 20));
        assert!(!region.contains(10, 70));
        assert!(!region.contains(9, 20));
    }

    #[test]
    fn pending_capture_cleans_up_when_dimension_read_fails() {
        let mut runner = FakeRunner::new();
        runner.fail_dimensions = true;
        let pending = PendingCapture::allocate(GrabMode::FullScreen).unwrap();
        let err = pending
            .complete(&runner, |path| runner.write_to("grim", &[], path))
            .expect_err("dimension failure should bubble");
        assert!(matches!(err, CaptureError::ImageReadFailed { .. }));

        let call = runner.calls().pop().expect("write call recorded");
        assert!(!written_path(&call).exists());
    }

    #[test]
    fn pending_capture_produces_artifact_with_mode_and_size() {
        let mut runner = FakeRunner::new();
        runner.dimensions = (640, 480);
        let pending = PendingCapture::allocate(GrabMode::ActiveWindow).unwrap();
        let artifact = pending
            .complete(&runner, |path| runner.write_to("grim", &[], path))
            .expect("capture should complete");
        assert_eq!(artifact.mode, GrabMode::ActiveWindow);
        assert_eq!((artifact.width, artifact.height), (640, 480));
        assert!(artifact.temp_path.exists());
        assert!(artifact.capture_id.starts_with("capture-"));
        let _ = std::fs::remove_file(artifact.temp_path);
    }

    #[test]
    fn cleanup_temp_capture_file_with_reports_failed_when_remove_errors() {
        let path = PathBuf::from("/tmp/snapline-nonexistent-file.png");
        let outcome = cleanup_temp_capture_file_with(&path, "test cleanup", |_| {
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "simulated cleanup failure",
            ))
        });
        assert_eq!(outcome, TempCaptureCleanupOutcome::Failed);
    }

    #[test]
    fn selection_cancelled_maps_only_command_failures() {
        let mapped = selection_cancelled(CaptureError::CommandFailed {
            command: "slurp".to_string(),
            message: "exit status: 1".to_string(),
        });
        assert!(matches!(mapped, CaptureError::Cancelled { .. }));

        let untouched = selection_cancelled(CaptureError::NoFocusedMonitor);
        assert!(matches!(untouched, CaptureError::NoFocusedMonitor));
    }

    #[test]
    fn default_on_click_grab_is_unsupported() {
        let grabber = DummyGrabber;
        let err = grabber
            .grab_on_click(&GrabOptions::new(GrabMode::FullScreen))
            .expect_err("dummy backend cannot grab on click");
        assert!(matches!(err, CaptureError::Unsupported { backend: "dummy", .. }));
    }

    #[test]
    fn system_runner_captures_stdout_and_reports_failures() {
        let runner = SystemCommandRunner;
        assert_eq!(runner.output("echo", &["640x360"]).unwrap(), "640x360\n");

        let err = runner
            .output("snapline-missing-tool", &[])
            .expect_err("missing tool should fail to spawn");
        assert!(matches!(err, CaptureError::CommandIo { .. }));

        let err = runner
            .output("true", &[])
            .expect_err("empty stdout is a failure");
        assert!(matches!(err, CaptureError::CommandFailed { .. }));
    }
}
