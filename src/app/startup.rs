use clap::{ArgAction, ArgGroup, Parser};

use crate::capture::GrabMode;
use crate::core::{StartMode, StartOptions};

#[derive(Parser, Debug)]
#[command(name = "snapline")]
#[command(version, about = "Screenshot utility with a preview window, background and D-Bus modes")]
#[command(group(
    ArgGroup::new("grab_mode")
        .args(["fullscreen", "current", "active_window", "window_under_cursor", "region"])
        .multiple(false)
))]
#[command(group(ArgGroup::new("start_mode").args(["background", "dbus"]).multiple(false)))]
pub(crate) struct Cli {
    /// Capture the entire desktop (default)
    #[arg(short = 'f', long = "fullscreen", action = ArgAction::SetTrue)]
    fullscreen: bool,

    /// Capture the current monitor
    #[arg(short = 'm', long = "current", action = ArgAction::SetTrue)]
    current: bool,

    /// Capture the active window
    #[arg(short = 'a', long = "activewindow", action = ArgAction::SetTrue)]
    active_window: bool,

    /// Capture the window currently under the cursor
    #[arg(short = 'u', long = "windowundercursor", action = ArgAction::SetTrue)]
    window_under_cursor: bool,

    /// Capture a rectangular region of the desktop
    #[arg(short = 'r', long = "region", action = ArgAction::SetTrue)]
    region: bool,

    /// Take a screenshot and exit without showing the window
    #[arg(short = 'b', long = "background", action = ArgAction::SetTrue)]
    background: bool,

    /// Start as a D-Bus service and wait for requests
    #[arg(short = 's', long = "dbus", action = ArgAction::SetTrue)]
    dbus: bool,

    /// In background mode, save the image to this file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<String>,

    /// In background mode, wait this many milliseconds before grabbing
    #[arg(
        short = 'd',
        long = "delay",
        value_name = "MSEC",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    delay: i64,

    /// Wait for a click before grabbing. Overrides --delay
    #[arg(short = 'w', long = "onclick", action = ArgAction::SetTrue)]
    on_click: bool,

    /// In background mode, do not pop up a notification when the screenshot is taken
    #[arg(short = 'n', long = "nonotify", action = ArgAction::SetTrue)]
    no_notify: bool,

    /// In background mode, copy the screenshot to the clipboard instead of saving it
    #[arg(short = 'c', long = "clipboard", action = ArgAction::SetTrue)]
    clipboard: bool,
}

impl Cli {
    fn grab_mode(&self) -> GrabMode {
        if self.current {
            GrabMode::CurrentScreen
        } else if self.active_window {
            GrabMode::ActiveWindow
        } else if self.window_under_cursor {
            GrabMode::WindowUnderCursor
        } else if self.region {
            GrabMode::RectangularRegion
        } else {
            GrabMode::FullScreen
        }
    }

    fn start_mode(&self) -> StartMode {
        if self.dbus {
            StartMode::DBus
        } else if self.background {
            StartMode::Background
        } else {
            StartMode::Gui
        }
    }

    pub(crate) fn into_start_options(self) -> StartOptions {
        StartOptions {
            start_mode: self.start_mode(),
            grab_mode: self.grab_mode(),
            delay_ms: if self.on_click { -1 } else { self.delay },
            notify: !self.no_notify,
            send_to_clipboard: self.clipboard,
            output: self.output,
        }
    }
}

/// GTK only receives argv[0]; the application flags are parsed by clap.
pub(super) fn gtk_launch_args() -> Vec<String> {
    std::env::args().take(1).collect()
}
