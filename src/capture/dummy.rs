use super::{BackendKind, CaptureArtifact, CaptureError, GrabOptions, ImageGrabber};

/// Selected when no display server is detected. Every grab fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyGrabber;

impl ImageGrabber for DummyGrabber {
    fn kind(&self) -> BackendKind {
        BackendKind::Dummy
    }

    fn on_click_grab_supported(&self) -> bool {
        false
    }

    fn grab(&self, options: &GrabOptions) -> Result<CaptureArtifact, CaptureError> {
        Err(CaptureError::Unsupported {
            backend: self.kind().name(),
            operation: format!("{} grab", options.mode),
        })
    }
}
