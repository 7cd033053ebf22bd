use super::hyprland::{
    parse_active_window, parse_cursor_position, parse_focused_monitor, window_at_point,
};
use super::{
    parse_region_selection, selection_cancelled, BackendKind, CaptureArtifact, CaptureError,
    CaptureRegion, CommandRunner, GrabMode, GrabOptions, ImageGrabber, PendingCapture,
    SystemCommandRunner,
};

const GRIM: &str = "grim";
const SLURP: &str = "slurp";
const HYPRCTL: &str = "hyprctl";

/// wlroots-style capture through `grim`, with `slurp` for regions and `hyprctl` for
/// monitor and window metadata. Compositors draw decorations client-side here, so
/// `include_decorations` has no effect.
pub struct WaylandGrabber<R: CommandRunner = SystemCommandRunner> {
    runner: R,
}

impl WaylandGrabber {
    pub fn new() -> Self {
        Self::with_runner(SystemCommandRunner)
    }
}

impl Default for WaylandGrabber {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> WaylandGrabber<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    fn capture_with_grim(
        &self,
        mode: GrabMode,
        include_pointer: bool,
        target: GrimTarget<'_>,
    ) -> Result<CaptureArtifact, CaptureError> {
        let geometry;
        let mut args: Vec<&str> = Vec::with_capacity(3);
        if include_pointer {
            args.push("-c");
        }
        match target {
            GrimTarget::Everything => {}
            GrimTarget::Output(name) => args.extend(["-o", name]),
            GrimTarget::Region(region) => {
                geometry = region.slurp_geometry();
                args.extend(["-g", geometry.as_str()]);
            }
        }

        let pending = PendingCapture::allocate(mode)?;
        tracing::debug!(
            mode = %mode,
            path = %pending.temp_path().display(),
            "running grim capture"
        );
        pending.complete(&self.runner, |output| {
            self.runner.write_to(GRIM, &args, output)
        })
    }

    fn focused_monitor(&self) -> Result<super::hyprland::FocusedMonitor, CaptureError> {
        let monitors_json = self.runner.output(HYPRCTL, &["monitors", "-j"])?;
        parse_focused_monitor(&monitors_json)
    }

    fn active_window_region(&self) -> Result<CaptureRegion, CaptureError> {
        let window_json = self.runner.output(HYPRCTL, &["activewindow", "-j"])?;
        parse_active_window(&window_json)
    }

    fn window_under_cursor_region(&self) -> Result<CaptureRegion, CaptureError> {
        let monitor = self.focused_monitor()?;
        let workspace_id =
            monitor
                .active_workspace_id
                .ok_or(CaptureError::InvalidMonitorMetadata {
                    message: "focused monitor missing active workspace id".to_string(),
                })?;
        let cursor_json = self.runner.output(HYPRCTL, &["cursorpos", "-j"])?;
        let cursor = parse_cursor_position(&cursor_json)?;
        let clients_json = self.runner.output(HYPRCTL, &["clients", "-j"])?;
        window_at_point(&clients_json, workspace_id, cursor)
    }

    fn selected_region(&self) -> Result<CaptureRegion, CaptureError> {
        let raw_geometry = self
            .runner
            .output(SLURP, &[])
            .map_err(selection_cancelled)?;
        let geometry = raw_geometry.trim();
        if geometry.is_empty() {
            return Err(CaptureError::Cancelled {
                reason: "region selection returned no geometry".to_string(),
            });
        }
        parse_region_selection(geometry)
    }
}

enum GrimTarget<'a> {
    Everything,
    Output(&'a str),
    Region(CaptureRegion),
}

impl<R: CommandRunner> ImageGrabber for WaylandGrabber<R> {
    fn kind(&self) -> BackendKind {
        BackendKind::Wayland
    }

    fn on_click_grab_supported(&self) -> bool {
        false
    }

    fn grab(&self, options: &GrabOptions) -> Result<CaptureArtifact, CaptureError> {
        let mode = options.mode;
        let pointer = options.include_pointer;
        match mode {
            GrabMode::FullScreen => self.capture_with_grim(mode, pointer, GrimTarget::Everything),
            GrabMode::CurrentScreen => {
                let monitor = self.focused_monitor()?;
                self.capture_with_grim(mode, pointer, GrimTarget::Output(&monitor.name))
            }
            GrabMode::ActiveWindow => {
                let region = self.active_window_region()?;
                self.capture_with_grim(mode, pointer, GrimTarget::Region(region))
            }
            GrabMode::WindowUnderCursor => {
                let region = self.window_under_cursor_region()?;
                self.capture_with_grim(mode, pointer, GrimTarget::Region(region))
            }
            GrabMode::RectangularRegion => {
                let region = self.selected_region()?;
                self.capture_with_grim(mode, pointer, GrimTarget::Region(region))
            }
        }
    }
}
