use std::path::Path;

use gtk4::gio;
use gtk4::gio::prelude::*;
use gtk4::glib;

use crate::core::{AppLauncher, LaunchError};

const IMAGE_CONTENT_TYPE: &str = "image/png";

/// A specific installed application, picked from the "Send To" list.
pub(super) struct GioAppLauncher {
    app_info: gio::AppInfo,
}

impl GioAppLauncher {
    pub(super) fn new(app_info: gio::AppInfo) -> Self {
        Self { app_info }
    }
}

impl AppLauncher for GioAppLauncher {
    fn display_name(&self) -> String {
        self.app_info.display_name().to_string()
    }

    fn launch(&self, path: &Path) -> Result<(), LaunchError> {
        let file = gio::File::for_path(path);
        self.app_info
            .launch(&[file], None::<&gio::AppLaunchContext>)
            .map_err(|err| LaunchError::Failed {
                application: self.display_name(),
                message: err.to_string(),
            })
    }
}

/// Whatever the desktop registers as the default viewer for the file.
pub(super) struct DefaultAppLauncher;

impl AppLauncher for DefaultAppLauncher {
    fn display_name(&self) -> String {
        "default application".to_string()
    }

    fn launch(&self, path: &Path) -> Result<(), LaunchError> {
        open_with_default_app(path).map_err(|message| LaunchError::Failed {
            application: self.display_name(),
            message,
        })
    }
}

pub(super) fn open_with_default_app(path: &Path) -> Result<(), String> {
    let uri = glib::filename_to_uri(path, None).map_err(|err| err.to_string())?;
    gio::AppInfo::launch_default_for_uri(&uri, None::<&gio::AppLaunchContext>)
        .map_err(|err| err.to_string())
}

/// Applications that accept PNG files, for the "Send To" menu.
pub(super) fn image_handlers() -> Vec<gio::AppInfo> {
    let mut handlers = gio::AppInfo::all_for_type(IMAGE_CONTENT_TYPE);
    handlers.retain(|info| info.should_show());
    handlers.sort_by_key(|info| info.display_name().to_lowercase());
    handlers
}
