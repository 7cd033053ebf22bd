use super::{
    selection_cancelled, BackendKind, CaptureArtifact, CaptureError, CaptureRegion, CommandRunner,
    GrabMode, GrabOptions, ImageGrabber, PendingCapture, SystemCommandRunner,
};

const MAIM: &str = "maim";
const XDOTOOL: &str = "xdotool";
const XRANDR: &str = "xrandr";
const XWININFO: &str = "xwininfo";

/// X11 capture through `maim`, with `xdotool` for window lookup and `xrandr` for
/// monitor geometry.
pub struct X11Grabber<R: CommandRunner = SystemCommandRunner> {
    runner: R,
}

impl X11Grabber {
    pub fn new() -> Self {
        Self::with_runner(SystemCommandRunner)
    }
}

impl Default for X11Grabber {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MouseLocation {
    x: i32,
    y: i32,
    window: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveMonitor {
    name: String,
    region: CaptureRegion,
}

enum MaimTarget {
    Everything,
    Region(CaptureRegion),
    Window(String),
    Selection,
}

impl<R: CommandRunner> X11Grabber<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    fn capture_with_maim(
        &self,
        mode: GrabMode,
        include_pointer: bool,
        target: MaimTarget,
    ) -> Result<CaptureArtifact, CaptureError> {
        let mut args: Vec<String> = Vec::with_capacity(3);
        if !include_pointer {
            args.push("-u".to_string());
        }
        let selecting = matches!(target, MaimTarget::Selection);
        match target {
            MaimTarget::Everything => {}
            MaimTarget::Region(region) => {
                args.push("-g".to_string());
                args.push(region.x_geometry());
            }
            MaimTarget::Window(window_id) => {
                args.push("-i".to_string());
                args.push(window_id);
            }
            MaimTarget::Selection => args.push("-s".to_string()),
        }
        let args = args.iter().map(String::as_str).collect::<Vec<_>>();

        let pending = PendingCapture::allocate(mode)?;
        pending.complete(&self.runner, |output| {
            let result = self.runner.write_to(MAIM, &args, output);
            if selecting {
                result.map_err(selection_cancelled)
            } else {
                result
            }
        })
    }

    fn mouse_location(&self) -> Result<MouseLocation, CaptureError> {
        let output = self
            .runner
            .output(XDOTOOL, &["getmouselocation", "--shell"])?;
        parse_mouse_location(&output)
    }

    fn monitor_under_pointer(&self) -> Result<CaptureRegion, CaptureError> {
        let location = self.mouse_location()?;
        let output = self.runner.output(XRANDR, &["--listactivemonitors"])?;
        let monitors = parse_active_monitors(&output)?;
        monitors
            .iter()
            .find(|monitor| monitor.region.contains(location.x, location.y))
            .or_else(|| monitors.first())
            .map(|monitor| {
                tracing::debug!(monitor = %monitor.name, "resolved monitor under pointer");
                monitor.region
            })
            .ok_or(CaptureError::NoFocusedMonitor)
    }

    /// Window managers reparent clients into a frame; capturing the frame includes
    /// the title bar and borders.
    fn capture_window_id(&self, window_id: &str, include_decorations: bool) -> String {
        if !include_decorations {
            return window_id.to_string();
        }
        match self.runner.output(XWININFO, &["-tree", "-id", window_id]) {
            Ok(tree) => parse_frame_window(&tree).unwrap_or_else(|| window_id.to_string()),
            Err(err) => {
                tracing::warn!(?err, window_id, "failed to query window frame; capturing client");
                window_id.to_string()
            }
        }
    }

    fn window_grab(
        &self,
        options: &GrabOptions,
        window_id: &str,
    ) -> Result<CaptureArtifact, CaptureError> {
        let target = self.capture_window_id(window_id, options.include_decorations);
        self.capture_with_maim(
            options.mode,
            options.include_pointer,
            MaimTarget::Window(target),
        )
    }

    fn active_window_id(&self) -> Result<String, CaptureError> {
        let output = self.runner.output(XDOTOOL, &["getactivewindow"])?;
        parse_window_id(&output)
    }

    fn window_under_pointer_id(&self) -> Result<String, CaptureError> {
        self.mouse_location()?
            .window
            .ok_or_else(|| CaptureError::InvalidWindowMetadata {
                message: "no window under pointer".to_string(),
            })
    }
}

impl<R: CommandRunner> ImageGrabber for X11Grabber<R> {
    fn kind(&self) -> BackendKind {
        BackendKind::X11
    }

    fn on_click_grab_supported(&self) -> bool {
        true
    }

    fn grab(&self, options: &GrabOptions) -> Result<CaptureArtifact, CaptureError> {
        let mode = options.mode;
        let pointer = options.include_pointer;
        match mode {
            GrabMode::FullScreen => self.capture_with_maim(mode, pointer, MaimTarget::Everything),
            GrabMode::CurrentScreen => {
                let region = self.monitor_under_pointer()?;
                self.capture_with_maim(mode, pointer, MaimTarget::Region(region))
            }
            GrabMode::ActiveWindow => {
                let window_id = self.active_window_id()?;
                self.window_grab(options, &window_id)
            }
            GrabMode::WindowUnderCursor => {
                let window_id = self.window_under_pointer_id()?;
                self.window_grab(options, &window_id)
            }
            GrabMode::RectangularRegion => {
                self.capture_with_maim(mode, pointer, MaimTarget::Selection)
            }
        }
    }

    fn grab_on_click(&self, options: &GrabOptions) -> Result<CaptureArtifact, CaptureError> {
        if options.mode == GrabMode::RectangularRegion {
            return self.grab(options);
        }

        tracing::info!(mode = %options.mode, "waiting for click to grab");
        let clicked = self
            .runner
            .output(XDOTOOL, &["selectwindow"])
            .map_err(selection_cancelled)?;
        let window_id = parse_window_id(&clicked)?;

        if options.mode.is_window_mode() {
            self.window_grab(options, &window_id)
        } else {
            self.grab(options)
        }
    }
}

fn parse_window_id(output: &str) -> Result<String, CaptureError> {
    let trimmed = output.trim();
    if trimmed.is_empty() || trimmed.parse::<u64>().is_err() {
        return Err(CaptureError::InvalidWindowMetadata {
            message: format!("invalid window id: {trimmed}"),
        });
    }
    Ok(trimmed.to_string())
}

fn parse_mouse_location(output: &str) -> Result<MouseLocation, CaptureError> {
    let mut x = None;
    let mut y = None;
    let mut window = None;
    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "X" => x = value.parse::<i32>().ok(),
            "Y" => y = value.parse::<i32>().ok(),
            "WINDOW" => window = Some(value.to_string()).filter(|id| parse_window_id(id).is_ok()),
            _ => {}
        }
    }

    match (x, y) {
        (Some(x), Some(y)) => Ok(MouseLocation { x, y, window }),
        _ => Err(CaptureError::InvalidWindowMetadata {
            message: "pointer location missing from xdotool output".to_string(),
        }),
    }
}

/// Parses `xrandr --listactivemonitors` lines such as
/// ` 0: +*DP-1 1920/527x1080/296+0+0  DP-1`.
fn parse_active_monitors(output: &str) -> Result<Vec<ActiveMonitor>, CaptureError> {
    let invalid = |line: &str| CaptureError::InvalidMonitorMetadata {
        message: format!("unexpected monitor line: {}", line.trim()),
    };

    let mut monitors = Vec::new();
    for line in output.lines().skip_while(|line| line.starts_with("Monitors:")) {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let _index = fields.next().ok_or_else(|| invalid(line))?;
        let name = fields
            .next()
            .map(|raw| raw.trim_start_matches(['+', '*']))
            .ok_or_else(|| invalid(line))?;
        let geometry = fields.next().ok_or_else(|| invalid(line))?;

        let (width_part, rest) = geometry.split_once('x').ok_or_else(|| invalid(line))?;
        let mut offsets = rest.split('+');
        let height_part = offsets.next().ok_or_else(|| invalid(line))?;
        let x = offsets.next().and_then(|value| value.parse::<i32>().ok());
        let y = offsets.next().and_then(|value| value.parse::<i32>().ok());
        let width = physical_stripped(width_part);
        let height = physical_stripped(height_part);

        match (width, height, x, y) {
            (Some(width), Some(height), Some(x), Some(y)) if width > 0 && height > 0 => {
                monitors.push(ActiveMonitor {
                    name: name.to_string(),
                    region: CaptureRegion::new(x, y, width, height),
                });
            }
            _ => return Err(invalid(line)),
        }
    }

    Ok(monitors)
}

/// `1920/527` carries the physical size in millimetres after the slash.
fn physical_stripped(raw: &str) -> Option<u32> {
    raw.split('/').next()?.parse::<u32>().ok()
}

/// Returns the decimal id of the frame parent, or `None` when the window is a
/// direct child of the root (undecorated).
fn parse_frame_window(tree: &str) -> Option<String> {
    let mut root = None;
    let mut parent = None;
    for line in tree.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Root window id:") {
            root = first_hex_id(rest);
        } else if let Some(rest) = line.strip_prefix("Parent window id:") {
            parent = first_hex_id(rest);
        }
    }
    match (root, parent) {
        (Some(root), Some(parent)) if root != parent => Some(parent.to_string()),
        _ => None,
    }
}

fn first_hex_id(raw: &str) -> Option<u64> {
    let token = raw.split_whitespace().next()?;
    u64::from_str_radix(token.strip_prefix("0x")?, 16).ok()
}
