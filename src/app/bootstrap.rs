use std::sync::Arc;

use crate::capture::{compositing_active, detect_platform, select_grabber, ImageGrabber, Platform};
use crate::clipboard::{ClipboardBackend, GdkClipboardBackend, WlCopyBackend, XclipBackend};
use crate::config::{load_app_config, AppConfig};
use crate::core::{BackendInfo, StartMode, StartOptions};
use crate::export::{ExportManager, ExportSettings};
use crate::storage::{prune_stale_temp_files, StorageService, STALE_TEMP_MAX_AGE_HOURS};

use super::startup::Cli;

pub(super) struct AppBootstrap {
    pub(super) options: StartOptions,
    pub(super) config: AppConfig,
    pub(super) platform: Platform,
    pub(super) grabber: Arc<dyn ImageGrabber>,
    pub(super) backend: BackendInfo,
    pub(super) storage: StorageService,
}

impl AppBootstrap {
    pub(super) fn export_manager(&self) -> ExportManager {
        ExportManager::new(
            ExportSettings::from_config(&self.config),
            self.storage.clone(),
        )
    }

    pub(super) fn clipboard_backend(&self) -> Box<dyn ClipboardBackend> {
        clipboard_backend_for(self.platform, self.options.start_mode)
    }
}

pub(super) fn bootstrap_app_runtime(cli: Cli) -> AppBootstrap {
    let options = cli.into_start_options();
    prune_stale_capture_temp_files();

    let config = load_app_config();
    tracing::info!(
        include_pointer = config.include_pointer,
        include_decorations = config.include_decorations,
        copy_save_location = config.copy_save_location_to_clipboard,
        "loaded app config"
    );

    let platform = detect_platform();
    let grabber = select_grabber(platform);
    let backend = BackendInfo {
        kind: grabber.kind(),
        on_click_supported: grabber.on_click_grab_supported(),
        compositing: compositing_active(platform, config.compositing),
    };
    tracing::info!(
        platform = platform.name(),
        backend = backend.kind.name(),
        on_click = backend.on_click_supported,
        compositing = backend.compositing,
        "resolved capture backend"
    );

    AppBootstrap {
        options,
        config,
        platform,
        grabber,
        backend,
        storage: initialize_storage_service(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClipboardKind {
    Gdk,
    WlCopy,
    Xclip,
}

/// Headless sessions quit right after routing the image, so their copies have to
/// outlive the process. `wl-copy` and `xclip` fork a server that keeps serving it.
fn clipboard_kind_for(platform: Platform, start_mode: StartMode) -> ClipboardKind {
    match (platform, start_mode) {
        (_, StartMode::Gui) | (Platform::Unknown, _) => ClipboardKind::Gdk,
        (Platform::Wayland, _) => ClipboardKind::WlCopy,
        (Platform::X11, _) => ClipboardKind::Xclip,
    }
}

fn clipboard_backend_for(platform: Platform, start_mode: StartMode) -> Box<dyn ClipboardBackend> {
    let kind = clipboard_kind_for(platform, start_mode);
    tracing::debug!(?kind, platform = platform.name(), "selected clipboard backend");
    match kind {
        ClipboardKind::Gdk => Box::new(GdkClipboardBackend),
        ClipboardKind::WlCopy => Box::new(WlCopyBackend),
        ClipboardKind::Xclip => Box::new(XclipBackend),
    }
}

fn initialize_storage_service() -> StorageService {
    match StorageService::with_default_paths() {
        Ok(storage) => {
            tracing::debug!(temp_dir = %storage.temp_dir().display(), "initialized storage");
            storage
        }
        Err(err) => {
            let fallback = std::env::temp_dir().join("snapline");
            tracing::warn!(?err, fallback = %fallback.display(), "failed to prepare runtime dir");
            StorageService::with_temp_dir(fallback)
        }
    }
}

fn prune_stale_capture_temp_files() {
    match prune_stale_temp_files(STALE_TEMP_MAX_AGE_HOURS) {
        Ok(report) if report.removed_files > 0 => {
            tracing::info!(
                removed_files = report.removed_files,
                "pruned stale capture temp files"
            );
        }
        Ok(_) => {}
        Err(err) => {
            tracing::warn!(
                max_age_hours = STALE_TEMP_MAX_AGE_HOURS,
                ?err,
                "failed to prune stale capture temp files"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_sessions_use_clipboard_tools_that_outlive_the_process() {
        for start_mode in [StartMode::Background, StartMode::DBus] {
            assert_eq!(
                clipboard_kind_for(Platform::Wayland, start_mode),
                ClipboardKind::WlCopy
            );
            assert_eq!(
                clipboard_kind_for(Platform::X11, start_mode),
                ClipboardKind::Xclip
            );
            assert_eq!(
                clipboard_kind_for(Platform::Unknown, start_mode),
                ClipboardKind::Gdk
            );
        }
    }

    #[test]
    fn gui_sessions_use_the_display_clipboard() {
        for platform in [Platform::X11, Platform::Wayland, Platform::Unknown] {
            assert_eq!(clipboard_kind_for(platform, StartMode::Gui), ClipboardKind::Gdk);
        }
    }
}
