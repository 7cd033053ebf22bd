use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use gtk4::gdk;
use gtk4::gio;
use gtk4::prelude::*;
use gtk4::{
    Align, Application, ApplicationWindow, Box as GtkBox, Button, ButtonsType, CheckButton,
    DragSource, DropDown, FileChooserAction, FileChooserNative, Label, MenuButton,
    MessageDialog, MessageType, Orientation, Picture, Popover, ResponseType, SpinButton,
};

use crate::capture::{CaptureArtifact, GrabMode, GrabOptions};
use crate::core::DragPayload;

use super::drag::{drag_content, drag_icon};
use super::launch::image_handlers;

const WINDOW_TITLE: &str = "Snapline";
const WINDOW_DEFAULT_SIZE: (i32, i32) = (820, 560);
const CONTROL_SPACING: i32 = 8;
const WINDOW_MARGIN: i32 = 12;
const MAX_DELAY_SECONDS: f64 = 99.0;

/// User actions from the preview window.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum WindowRequest {
    NewScreenshot {
        mode: GrabMode,
        timeout_ms: i64,
        include_pointer: bool,
        include_decorations: bool,
    },
    Save,
    SaveAs,
    Copy,
    Print,
    Open,
    SendTo(gio::AppInfo),
    Close,
}

pub(super) struct WindowHandlers {
    pub(super) on_request: Rc<dyn Fn(WindowRequest)>,
    pub(super) on_drag_prepare: Rc<dyn Fn() -> Option<DragPayload>>,
}

/// Preview of the last grab with the controls for taking the next one.
pub(super) struct PreviewWindow {
    window: ApplicationWindow,
    picture: Picture,
    status_label: Label,
    image_buttons: Vec<Button>,
    send_to_button: MenuButton,
}

struct GrabControls {
    mode: DropDown,
    delay: SpinButton,
    on_click: CheckButton,
    pointer: CheckButton,
    decorations: CheckButton,
}

impl GrabControls {
    fn new(defaults: GrabOptions, on_click_supported: bool) -> Self {
        let labels: Vec<&str> = GrabMode::ALL.iter().map(|mode| mode.label()).collect();
        let mode = DropDown::from_strings(&labels);
        let selected = GrabMode::ALL
            .iter()
            .position(|candidate| *candidate == defaults.mode)
            .unwrap_or(0);
        mode.set_selected(u32::try_from(selected).unwrap_or(0));

        let delay = SpinButton::with_range(0.0, MAX_DELAY_SECONDS, 0.5);
        delay.set_digits(1);
        delay.set_tooltip_text(Some("Delay in seconds"));

        let on_click = CheckButton::with_label("On click");
        on_click.set_sensitive(on_click_supported);
        if !on_click_supported {
            on_click.set_tooltip_text(Some("Not supported by this capture backend"));
        }
        {
            let delay = delay.clone();
            on_click.connect_toggled(move |check| delay.set_sensitive(!check.is_active()));
        }

        let pointer = CheckButton::with_label("Include pointer");
        pointer.set_active(defaults.include_pointer);

        let decorations = CheckButton::with_label("Include decorations");
        decorations.set_active(defaults.include_decorations);
        decorations.set_sensitive(defaults.mode.is_window_mode());
        {
            let decorations = decorations.clone();
            mode.connect_selected_notify(move |dropdown| {
                decorations.set_sensitive(selected_mode(dropdown).is_window_mode());
            });
        }

        Self {
            mode,
            delay,
            on_click,
            pointer,
            decorations,
        }
    }

    fn request(&self) -> WindowRequest {
        let timeout_ms = if self.on_click.is_active() && self.on_click.is_sensitive() {
            -1
        } else {
            (self.delay.value() * 1000.0).round() as i64
        };
        WindowRequest::NewScreenshot {
            mode: selected_mode(&self.mode),
            timeout_ms,
            include_pointer: self.pointer.is_active(),
            include_decorations: self.decorations.is_active(),
        }
    }

    fn container(&self) -> GtkBox {
        let row = GtkBox::new(Orientation::Horizontal, CONTROL_SPACING);
        row.append(&self.mode);
        row.append(&Label::new(Some("Delay")));
        row.append(&self.delay);
        row.append(&self.on_click);
        row.append(&self.pointer);
        row.append(&self.decorations);
        row
    }
}

fn selected_mode(dropdown: &DropDown) -> GrabMode {
    usize::try_from(dropdown.selected())
        .ok()
        .and_then(|index| GrabMode::ALL.get(index).copied())
        .unwrap_or_default()
}

fn action_button(label: &str, request: WindowRequest, handlers: &WindowHandlers) -> Button {
    let button = Button::with_label(label);
    let on_request = handlers.on_request.clone();
    button.connect_clicked(move |_| on_request(request.clone()));
    button
}

fn send_to_popover(handlers: &WindowHandlers) -> Popover {
    let list = GtkBox::new(Orientation::Vertical, 2);
    let popover = Popover::new();
    let apps = image_handlers();
    if apps.is_empty() {
        list.append(&Label::new(Some("No applications accept images")));
    }
    for app_info in apps {
        let button = Button::with_label(&app_info.display_name());
        button.add_css_class("flat");
        let on_request = handlers.on_request.clone();
        let popover_ref = popover.downgrade();
        button.connect_clicked(move |_| {
            if let Some(popover) = popover_ref.upgrade() {
                popover.popdown();
            }
            on_request(WindowRequest::SendTo(app_info.clone()));
        });
        list.append(&button);
    }
    popover.set_child(Some(&list));
    popover
}

impl PreviewWindow {
    pub(super) fn new(
        app: &Application,
        defaults: GrabOptions,
        on_click_supported: bool,
        handlers: WindowHandlers,
    ) -> Self {
        let window = ApplicationWindow::new(app);
        window.set_title(Some(WINDOW_TITLE));
        window.set_default_size(WINDOW_DEFAULT_SIZE.0, WINDOW_DEFAULT_SIZE.1);

        let picture = Picture::new();
        picture.set_can_shrink(true);
        picture.set_vexpand(true);
        picture.set_hexpand(true);
        attach_drag_source(&picture, handlers.on_drag_prepare.clone());

        let controls = Rc::new(GrabControls::new(defaults, on_click_supported));
        let new_button = Button::with_label("New Screenshot");
        new_button.add_css_class("suggested-action");
        {
            let controls = controls.clone();
            let on_request = handlers.on_request.clone();
            new_button.connect_clicked(move |_| on_request(controls.request()));
        }

        let image_buttons = vec![
            action_button("Save", WindowRequest::Save, &handlers),
            action_button("Save As…", WindowRequest::SaveAs, &handlers),
            action_button("Copy", WindowRequest::Copy, &handlers),
            action_button("Print", WindowRequest::Print, &handlers),
            action_button("Open", WindowRequest::Open, &handlers),
        ];
        let send_to_button = MenuButton::new();
        send_to_button.set_label("Send To");
        send_to_button.set_popover(Some(&send_to_popover(&handlers)));

        let actions = GtkBox::new(Orientation::Horizontal, CONTROL_SPACING);
        actions.append(&new_button);
        for button in &image_buttons {
            actions.append(button);
        }
        actions.append(&send_to_button);

        let status_label = Label::new(None);
        status_label.set_halign(Align::Start);
        status_label.add_css_class("dim-label");

        let root = GtkBox::new(Orientation::Vertical, CONTROL_SPACING);
        root.set_margin_top(WINDOW_MARGIN);
        root.set_margin_bottom(WINDOW_MARGIN);
        root.set_margin_start(WINDOW_MARGIN);
        root.set_margin_end(WINDOW_MARGIN);
        root.append(&picture);
        root.append(&controls.container());
        root.append(&actions);
        root.append(&status_label);
        window.set_child(Some(&root));

        {
            let on_request = handlers.on_request.clone();
            window.connect_close_request(move |_| {
                on_request(WindowRequest::Close);
                gtk4::glib::Propagation::Proceed
            });
        }

        let preview = Self {
            window,
            picture,
            status_label,
            image_buttons,
            send_to_button,
        };
        preview.set_image_actions_enabled(false);
        preview
    }

    fn set_image_actions_enabled(&self, enabled: bool) {
        for button in &self.image_buttons {
            button.set_sensitive(enabled);
        }
        self.send_to_button.set_sensitive(enabled);
    }

    pub(super) fn window(&self) -> &ApplicationWindow {
        &self.window
    }

    pub(super) fn set_screenshot(&self, artifact: &CaptureArtifact) {
        let file = gio::File::for_path(&artifact.temp_path);
        match gdk::Texture::from_file(&file) {
            Ok(texture) => {
                self.picture.set_paintable(Some(&texture));
                self.set_image_actions_enabled(true);
                self.set_status(&format!(
                    "{} × {} {}",
                    artifact.width,
                    artifact.height,
                    artifact.mode.label()
                ));
            }
            Err(err) => {
                tracing::warn!(path = %artifact.temp_path.display(), %err, "failed to load preview");
                self.show_error(&format!("Failed to load screenshot preview: {err}"));
            }
        }
    }

    pub(super) fn set_status(&self, text: &str) {
        self.status_label.set_text(text);
    }

    pub(super) fn present(&self) {
        self.window.present();
    }

    /// Keeps the window out of the grab. Closing would end the session.
    pub(super) fn hide_for_grab(&self) {
        self.window.set_visible(false);
    }

    pub(super) fn show_error(&self, message: &str) {
        let dialog = MessageDialog::builder()
            .transient_for(&self.window)
            .modal(true)
            .message_type(MessageType::Error)
            .buttons(ButtonsType::Close)
            .text(message)
            .build();
        dialog.connect_response(|dialog, _| dialog.close());
        dialog.present();
    }

    pub(super) fn choose_save_path<F>(&self, suggested_name: &str, on_chosen: F)
    where
        F: Fn(PathBuf) + 'static,
    {
        let chooser = FileChooserNative::new(
            Some("Save Screenshot"),
            Some(&self.window),
            FileChooserAction::Save,
            Some("Save"),
            Some("Cancel"),
        );
        chooser.set_modal(true);
        chooser.set_current_name(suggested_name);
        // Native choosers are not owned by their parent; the handler keeps it alive.
        let keep_alive = Rc::new(RefCell::new(Some(chooser.clone())));
        chooser.connect_response(move |chooser, response| {
            if response == ResponseType::Accept {
                match chooser.file().and_then(|file| file.path()) {
                    Some(path) => on_chosen(path),
                    None => tracing::warn!("save dialog returned no local path"),
                }
            }
            chooser.destroy();
            keep_alive.borrow_mut().take();
        });
        chooser.show();
    }
}

fn attach_drag_source(picture: &Picture, on_drag_prepare: Rc<dyn Fn() -> Option<DragPayload>>) {
    let source = DragSource::new();
    source.set_actions(gdk::DragAction::COPY);
    source.connect_prepare(move |source, _, _| {
        let payload = on_drag_prepare()?;
        if let Some(icon) = drag_icon(&payload) {
            let hot_x = i32::try_from(payload.thumbnail_width / 2).unwrap_or(0);
            let hot_y = i32::try_from(payload.thumbnail_height / 2).unwrap_or(0);
            source.set_icon(Some(&icon), hot_x, hot_y);
        }
        Some(drag_content(payload))
    });
    picture.add_controller(source);
}
