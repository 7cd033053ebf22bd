use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to launch {application}: {message}")]
    Failed {
        application: String,
        message: String,
    },
}

/// An application the screenshot can be handed to.
pub trait AppLauncher {
    fn display_name(&self) -> String;
    fn launch(&self, path: &Path) -> Result<(), LaunchError>;
}
