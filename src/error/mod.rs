use crate::capture::CaptureError;
use crate::clipboard::ClipboardError;
use crate::config::ConfigPathError;
use crate::export::ExportError;
use crate::notification::NotificationError;
use crate::state::StateError;
use crate::storage::StorageError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Config(#[from] ConfigPathError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error("gtk runtime exited with status {code}")]
    Runtime { code: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_errors_keep_their_message() {
        let err = AppError::from(StorageError::MissingCaptureId);
        assert_eq!(err.to_string(), "capture id is empty");

        let err = AppError::from(ExportError::NoImage);
        assert!(matches!(err, AppError::Export(ExportError::NoImage)));
    }
}
