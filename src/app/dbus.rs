use std::str::FromStr;

use gtk4::gio;
use gtk4::gio::prelude::*;
use gtk4::glib;
use gtk4::glib::variant::{StaticVariantType, ToVariant};
use gtk4::Application;

use crate::capture::GrabMode;

pub(super) const DBUS_INTERFACE: &str = "io.github.snapline.Snapline";
const TAKE_SCREENSHOT_ACTION: &str = "take-screenshot";
const START_AGENT_ACTION: &str = "start-agent";
const TAKE_SCREENSHOT_SIGNATURE: &str = "(sbbi)";
const SCREENSHOT_TAKEN_SIGNAL: &str = "ScreenshotTaken";
const SCREENSHOT_FAILED_SIGNAL: &str = "ScreenshotFailed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum DBusRequest {
    TakeScreenshot {
        mode: GrabMode,
        include_pointer: bool,
        include_decorations: bool,
        timeout_ms: i64,
    },
    StartAgent,
}

/// `take-screenshot` carries `(mode, include_pointer, include_decorations, timeout_ms)`.
pub(super) fn parse_take_screenshot(parameter: Option<&glib::Variant>) -> Result<DBusRequest, String> {
    let parameter = parameter.ok_or_else(|| "missing take-screenshot parameters".to_string())?;
    let (mode, include_pointer, include_decorations, timeout_ms) = parameter
        .get::<(String, bool, bool, i32)>()
        .ok_or_else(|| {
            format!(
                "take-screenshot expects {TAKE_SCREENSHOT_SIGNATURE}, got {}",
                parameter.type_()
            )
        })?;
    let mode = GrabMode::from_str(&mode).map_err(|err| err.to_string())?;
    Ok(DBusRequest::TakeScreenshot {
        mode,
        include_pointer,
        include_decorations,
        timeout_ms: i64::from(timeout_ms),
    })
}

/// Exports the request actions on the application's D-Bus object.
pub(super) fn install_dbus_actions<F>(app: &Application, on_request: F)
where
    F: Fn(DBusRequest) + Clone + 'static,
{
    let parameter_type = <(String, bool, bool, i32)>::static_variant_type();
    let take_screenshot =
        gio::SimpleAction::new(TAKE_SCREENSHOT_ACTION, Some(parameter_type.as_ref()));
    {
        let on_request = on_request.clone();
        take_screenshot.connect_activate(move |_, parameter| {
            match parse_take_screenshot(parameter) {
                Ok(request) => on_request(request),
                Err(reason) => tracing::warn!(%reason, "rejected D-Bus screenshot request"),
            }
        });
    }
    app.add_action(&take_screenshot);

    let start_agent = gio::SimpleAction::new(START_AGENT_ACTION, None);
    start_agent.connect_activate(move |_, _| on_request(DBusRequest::StartAgent));
    app.add_action(&start_agent);

    tracing::info!(interface = DBUS_INTERFACE, "registered D-Bus actions");
}

pub(super) fn emit_screenshot_taken(app: &Application, path: &std::path::Path) {
    let path = path.to_string_lossy().into_owned();
    emit(app, SCREENSHOT_TAKEN_SIGNAL, Some((path,).to_variant()));
}

pub(super) fn emit_screenshot_failed(app: &Application) {
    emit(app, SCREENSHOT_FAILED_SIGNAL, None);
}

fn emit(app: &Application, signal: &str, parameters: Option<glib::Variant>) {
    let (Some(connection), Some(object_path)) = (app.dbus_connection(), app.dbus_object_path())
    else {
        tracing::warn!(signal, "no D-Bus connection; signal dropped");
        return;
    };
    if let Err(err) = connection.emit_signal(
        None,
        &object_path,
        DBUS_INTERFACE,
        signal,
        parameters.as_ref(),
    ) {
        tracing::warn!(signal, %err, "failed to emit D-Bus signal");
    } else {
        tracing::debug!(signal, "emitted D-Bus signal");
    }
}
