use std::sync::Arc;

use super::{DummyGrabber, ImageGrabber, WaylandGrabber, X11Grabber};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    X11,
    Wayland,
    Unknown,
}

impl Platform {
    pub const fn name(self) -> &'static str {
        match self {
            Platform::X11 => "x11",
            Platform::Wayland => "wayland",
            Platform::Unknown => "unknown",
        }
    }
}

pub fn detect_platform() -> Platform {
    detect_platform_with(|key| std::env::var(key).ok())
}

/// `WAYLAND_DISPLAY` wins over `DISPLAY`, since XWayland sessions export both.
pub(crate) fn detect_platform_with<F>(lookup: F) -> Platform
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if non_empty("WAYLAND_DISPLAY").is_some()
        || non_empty("XDG_SESSION_TYPE").is_some_and(|kind| kind.eq_ignore_ascii_case("wayland"))
    {
        return Platform::Wayland;
    }
    if non_empty("DISPLAY").is_some() {
        return Platform::X11;
    }
    Platform::Unknown
}

pub fn select_grabber(platform: Platform) -> Arc<dyn ImageGrabber> {
    let grabber: Arc<dyn ImageGrabber> = match platform {
        Platform::X11 => Arc::new(X11Grabber::new()),
        Platform::Wayland => Arc::new(WaylandGrabber::new()),
        Platform::Unknown => Arc::new(DummyGrabber),
    };
    tracing::info!(
        platform = platform.name(),
        backend = grabber.kind().name(),
        "selected screenshot backend"
    );
    grabber
}

/// Wayland compositors always composite. On X11 there is no portable probe, so the
/// configured value is used and compositing is assumed otherwise.
pub fn compositing_active(platform: Platform, configured: Option<bool>) -> bool {
    match platform {
        Platform::Wayland => true,
        Platform::X11 => configured.unwrap_or(true),
        Platform::Unknown => false,
    }
}
