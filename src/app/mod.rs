use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use gtk4::{gio, glib};
use gtk4::prelude::*;
use gtk4::Application;

use crate::capture::{CaptureArtifact, CaptureError, ImageGrabber};
use crate::core::{CoreSignal, DragPayload, ScreenshotCore, StartMode};
use crate::error::{AppError, AppResult};
use crate::notification::{DesktopNotifier, NotificationResponse, Notifier, ScreenshotNotification};
use crate::state::CoreState;

mod bootstrap;
mod dbus;
mod drag;
mod launch;
mod print;
mod startup;
mod window;
mod worker;

use self::bootstrap::{bootstrap_app_runtime, AppBootstrap};
use self::dbus::{emit_screenshot_failed, emit_screenshot_taken, install_dbus_actions, DBusRequest};
use self::launch::{open_with_default_app, DefaultAppLauncher, GioAppLauncher};
use self::print::run_print_job;
use self::startup::{gtk_launch_args, Cli};
use self::window::{PreviewWindow, WindowHandlers, WindowRequest};
use self::worker::{spawn_worker, spawn_worker_after};

const APPLICATION_ID: &str = "io.github.snapline.Snapline";

fn application_flags(start_mode: StartMode) -> gio::ApplicationFlags {
    match start_mode {
        StartMode::DBus => gio::ApplicationFlags::IS_SERVICE,
        StartMode::Gui | StartMode::Background => gio::ApplicationFlags::NON_UNIQUE,
    }
}

/// GUI sessions are kept alive by their window; everything else holds the app.
fn needs_headless_hold(start_mode: StartMode) -> bool {
    !matches!(start_mode, StartMode::Gui)
}

fn gtk_exit_status(exit_code: glib::ExitCode) -> AppResult<()> {
    if exit_code == glib::ExitCode::SUCCESS {
        Ok(())
    } else {
        Err(AppError::Runtime {
            code: exit_code.get(),
        })
    }
}

/// Main-loop side of a session: owns the core and carries out its signals.
struct Runtime {
    app: Application,
    core: RefCell<ScreenshotCore>,
    grabber: Arc<dyn ImageGrabber>,
    notifier: Arc<dyn Notifier>,
    window: RefCell<Option<Rc<PreviewWindow>>>,
    hold: RefCell<Option<gio::ApplicationHoldGuard>>,
}

impl Runtime {
    fn new(app: &Application, bootstrap: AppBootstrap) -> Rc<Self> {
        let core = ScreenshotCore::new(
            bootstrap.options.clone(),
            bootstrap.backend,
            bootstrap.export_manager(),
            bootstrap.clipboard_backend(),
            bootstrap.config.clone(),
        );
        Rc::new(Self {
            app: app.clone(),
            core: RefCell::new(core),
            grabber: bootstrap.grabber,
            notifier: Arc::new(DesktopNotifier),
            window: RefCell::new(None),
            hold: RefCell::new(None),
        })
    }

    fn start_mode(&self) -> StartMode {
        self.core.borrow().start_mode()
    }

    fn hold_app(&self) {
        if self.hold.borrow().is_some() {
            return;
        }
        tracing::info!("holding app lifecycle for headless session");
        let guard = <gtk4::Application as gio::prelude::ApplicationExtManual>::hold(&self.app);
        self.hold.borrow_mut().replace(guard);
    }

    fn current_window(&self) -> Option<Rc<PreviewWindow>> {
        self.window.borrow().clone()
    }

    fn dispatch(self: &Rc<Self>, signals: Vec<CoreSignal>) {
        for signal in signals {
            self.execute(signal);
        }
    }

    fn execute(self: &Rc<Self>, signal: CoreSignal) {
        tracing::debug!(?signal, "executing core signal");
        match signal {
            CoreSignal::Grab { options, delay } => {
                if let Some(window) = self.current_window() {
                    window.hide_for_grab();
                }
                let grabber = self.grabber.clone();
                let runtime = self.clone();
                spawn_worker_after(
                    delay,
                    move || grabber.grab(&options),
                    move |result| runtime.grab_finished(result),
                );
            }
            CoreSignal::GrabOnClick { options } => {
                if let Some(window) = self.current_window() {
                    window.hide_for_grab();
                }
                let grabber = self.grabber.clone();
                let runtime = self.clone();
                spawn_worker(
                    move || grabber.grab_on_click(&options),
                    move |result| runtime.grab_finished(result),
                );
            }
            CoreSignal::InitGui { on_click_supported } => self.init_window(on_click_supported),
            CoreSignal::ShowScreenshot(artifact) => {
                if let Some(window) = self.current_window() {
                    window.set_screenshot(&artifact);
                    window.present();
                }
            }
            CoreSignal::ShowWindow => {
                if let Some(window) = self.current_window() {
                    window.present();
                }
            }
            CoreSignal::ShowError(message) => match self.current_window() {
                Some(window) => window.show_error(&message),
                None => tracing::error!(error = %message, "no window to show error"),
            },
            CoreSignal::Notify(notification) => self.notify(notification),
            CoreSignal::NotifyText(body) => {
                if let Err(err) = self.notifier.send_text(&body) {
                    tracing::warn!(%err, "failed to send notification");
                }
            }
            CoreSignal::OpenFile(path) => {
                if let Err(message) = open_with_default_app(&path) {
                    tracing::warn!(path = %path.display(), error = %message, "failed to open screenshot");
                }
            }
            CoreSignal::Print(job) => match self.current_window() {
                Some(window) => {
                    if let Err(message) = run_print_job(window.window(), job) {
                        window.show_error(&format!("Failed to print screenshot: {message}"));
                    }
                }
                None => tracing::warn!("print requested without a window"),
            },
            CoreSignal::ImageSaved(path) => self.image_saved(&path),
            CoreSignal::GrabFailed => {
                if self.start_mode() == StartMode::DBus {
                    emit_screenshot_failed(&self.app);
                }
            }
            CoreSignal::AllDone { after } => {
                let runtime = self.clone();
                gtk4::glib::timeout_add_local_once(after, move || runtime.quit());
            }
        }
    }

    fn grab_finished(self: &Rc<Self>, result: Result<CaptureArtifact, CaptureError>) {
        let signals = match result {
            Ok(artifact) => self.core.borrow_mut().screenshot_updated(artifact),
            Err(err) => self.core.borrow_mut().screenshot_failed(&err),
        };
        self.dispatch(signals);
    }

    fn notify(self: &Rc<Self>, notification: ScreenshotNotification) {
        let notifier = self.notifier.clone();
        let shown = notification.clone();
        let runtime = self.clone();
        spawn_worker(
            move || notifier.show_and_wait(&shown),
            move |result| {
                let response = result.unwrap_or_else(|err| {
                    tracing::warn!(%err, "notification failed");
                    NotificationResponse::Dismissed
                });
                let signals = runtime
                    .core
                    .borrow_mut()
                    .notification_closed(&notification, response);
                runtime.dispatch(signals);
            },
        );
    }

    fn image_saved(&self, path: &Path) {
        tracing::info!(path = %path.display(), "screenshot saved");
        match self.start_mode() {
            StartMode::DBus => emit_screenshot_taken(&self.app, path),
            StartMode::Gui => {
                if let Some(window) = self.current_window() {
                    window.set_status(&format!("Saved to {}", path.display()));
                }
            }
            StartMode::Background => {}
        }
    }

    fn init_window(self: &Rc<Self>, on_click_supported: bool) {
        if self.window.borrow().is_some() {
            return;
        }
        let defaults = self.core.borrow().grab_options();
        let runtime = Rc::downgrade(self);
        let on_request = Rc::new(move |request: WindowRequest| {
            if let Some(runtime) = runtime.upgrade() {
                runtime.handle_window_request(request);
            }
        });
        let runtime = Rc::downgrade(self);
        let on_drag_prepare = Rc::new(move || -> Option<DragPayload> {
            runtime
                .upgrade()
                .and_then(|runtime| runtime.core.borrow_mut().do_start_drag_and_drop())
        });

        let window = PreviewWindow::new(
            &self.app,
            defaults,
            on_click_supported,
            WindowHandlers {
                on_request,
                on_drag_prepare,
            },
        );
        self.window.borrow_mut().replace(Rc::new(window));
        // The window now keeps the app alive; a D-Bus agent no longer needs the hold.
        self.hold.borrow_mut().take();
        tracing::info!(on_click_supported, "initialized preview window");
    }

    fn handle_window_request(self: &Rc<Self>, request: WindowRequest) {
        tracing::debug!(?request, "preview window request");
        let signals = match request {
            WindowRequest::NewScreenshot {
                mode,
                timeout_ms,
                include_pointer,
                include_decorations,
            } => self.core.borrow_mut().take_new_screenshot(
                mode,
                timeout_ms,
                include_pointer,
                include_decorations,
            ),
            WindowRequest::Save => self.core.borrow().do_auto_save(),
            WindowRequest::SaveAs => {
                self.choose_save_path();
                Vec::new()
            }
            WindowRequest::Copy => self.core.borrow().do_send_to_clipboard(),
            WindowRequest::Print => self.core.borrow_mut().do_print(),
            WindowRequest::Open => self
                .core
                .borrow_mut()
                .do_send_to_open_with(&DefaultAppLauncher),
            WindowRequest::SendTo(app_info) => self
                .core
                .borrow_mut()
                .do_send_to_service(&GioAppLauncher::new(app_info)),
            WindowRequest::Close => self.core.borrow_mut().close(),
        };
        self.dispatch(signals);
    }

    fn choose_save_path(self: &Rc<Self>) {
        let Some(window) = self.current_window() else {
            return;
        };
        let suggested = match self.core.borrow().export().suggested_filename(&Local::now()) {
            Ok(name) => name,
            Err(err) => {
                window.show_error(&format!("Failed to build a file name: {err}"));
                return;
            }
        };
        let runtime = Rc::downgrade(self);
        window.choose_save_path(&suggested, move |path| {
            if let Some(runtime) = runtime.upgrade() {
                let signals = runtime.core.borrow().do_gui_save_as(&path);
                runtime.dispatch(signals);
            }
        });
    }

    fn handle_dbus_request(self: &Rc<Self>, request: DBusRequest) {
        tracing::info!(?request, "D-Bus request");
        let signals = match request {
            DBusRequest::TakeScreenshot {
                mode,
                include_pointer,
                include_decorations,
                timeout_ms,
            } => self.core.borrow_mut().take_new_screenshot(
                mode,
                timeout_ms,
                include_pointer,
                include_decorations,
            ),
            DBusRequest::StartAgent => self.core.borrow_mut().dbus_start_agent(),
        };
        self.dispatch(signals);
    }

    fn quit(&self) {
        tracing::info!(state = ?self.core.borrow().state(), "session finished; quitting");
        self.hold.borrow_mut().take();
        if let Some(window) = self.window.borrow_mut().take() {
            window.window().destroy();
        }
        self.app.quit();
    }
}

pub struct App {
    cli: Option<Cli>,
    final_state: CoreState,
}

impl App {
    /// Reads the session options from the process arguments.
    pub fn from_args() -> Self {
        Self {
            cli: Some(Cli::parse()),
            final_state: CoreState::default(),
        }
    }

    pub fn state(&self) -> CoreState {
        self.final_state
    }

    pub fn start(&mut self) -> AppResult<()> {
        let Some(cli) = self.cli.take() else {
            tracing::warn!("app already started");
            return Ok(());
        };
        let bootstrap = bootstrap_app_runtime(cli);
        let start_mode = bootstrap.options.start_mode;

        tracing::info!(?start_mode, "starting gtk runtime");
        let application = Application::new(Some(APPLICATION_ID), application_flags(start_mode));

        let bootstrap = Rc::new(RefCell::new(Some(bootstrap)));
        let runtime_slot = Rc::new(RefCell::new(None::<Rc<Runtime>>));
        {
            let runtime_slot = runtime_slot.clone();
            application.connect_startup(move |app| {
                let Some(bootstrap) = bootstrap.borrow_mut().take() else {
                    return;
                };
                let runtime = Runtime::new(app, bootstrap);
                if needs_headless_hold(start_mode) {
                    runtime.hold_app();
                }
                if start_mode == StartMode::DBus {
                    let weak = Rc::downgrade(&runtime);
                    install_dbus_actions(app, move |request| {
                        if let Some(runtime) = weak.upgrade() {
                            runtime.handle_dbus_request(request);
                        }
                    });
                    tracing::info!("waiting for D-Bus requests");
                }
                runtime_slot.borrow_mut().replace(runtime);
            });
        }

        let activate_once = Rc::new(Cell::new(false));
        {
            let runtime_slot = runtime_slot.clone();
            application.connect_activate(move |_| {
                if activate_once.replace(true) {
                    tracing::debug!("ignoring duplicate gtk activate signal");
                    return;
                }
                let Some(runtime) = runtime_slot.borrow().clone() else {
                    tracing::error!("activate before startup");
                    return;
                };
                let signals = runtime.core.borrow_mut().start();
                runtime.dispatch(signals);
            });
        }

        // Pass only argv[0] to GTK so app flags like --background do not fail GTK parsing.
        let gtk_args = gtk_launch_args();
        let exit_code = application.run_with_args(&gtk_args);
        tracing::debug!(?exit_code, "gtk runtime exited");

        if let Some(runtime) = runtime_slot.borrow_mut().take() {
            self.final_state = runtime.core.borrow().state();
        }
        gtk_exit_status(exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dbus_sessions_register_as_services() {
        assert_eq!(
            application_flags(StartMode::DBus),
            gio::ApplicationFlags::IS_SERVICE
        );
        assert_eq!(
            application_flags(StartMode::Gui),
            gio::ApplicationFlags::NON_UNIQUE
        );
        assert_eq!(
            application_flags(StartMode::Background),
            gio::ApplicationFlags::NON_UNIQUE
        );
    }

    #[test]
    fn failed_gtk_runs_surface_their_exit_code() {
        assert!(gtk_exit_status(glib::ExitCode::SUCCESS).is_ok());
        let err = gtk_exit_status(glib::ExitCode::new(2)).expect_err("non-zero exit is an error");
        assert!(matches!(err, AppError::Runtime { code: 2 }));
        assert_eq!(err.to_string(), "gtk runtime exited with status 2");
    }

    #[test]
    fn only_windowless_sessions_hold_the_app() {
        assert!(!needs_headless_hold(StartMode::Gui));
        assert!(needs_headless_hold(StartMode::Background));
        assert!(needs_headless_hold(StartMode::DBus));
    }
}
