use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use gtk4::gdk;
use gtk4::gdk::prelude::*;
use gtk4::glib;
use thiserror::Error;

const WL_COPY_COMMAND: &str = "wl-copy";
const XCLIP_COMMAND: &str = "xclip";
const MIME_TEXT_URI_LIST: &str = "text/uri-list";
const MIME_GNOME_COPIED_FILES: &str = "x-special/gnome-copied-files";
const MIME_TEXT_PLAIN: &str = "text/plain";
const MIME_TEXT_PLAIN_UTF8: &str = "text/plain;charset=utf-8";
const MIME_IMAGE_PNG: &str = "image/png";

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("failed to open file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to run clipboard command: {command}")]
    CommandIo {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to convert path to file URI {path}: {source}")]
    PathToUri {
        path: PathBuf,
        #[source]
        source: glib::Error,
    },
    #[error("failed to read image file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to access default display for clipboard operations")]
    DisplayUnavailable,
    #[error("failed to set clipboard content: {source}")]
    SetContent {
        #[source]
        source: glib::BoolError,
    },
    #[error("{command} exited with non-zero status: {status}")]
    CommandFailed { command: String, status: String },
}

pub type ClipboardResult<T> = std::result::Result<T, ClipboardError>;

pub trait ClipboardBackend {
    /// Places the image itself on the clipboard, plus file references where supported.
    fn copy_image(&self, path: &Path) -> ClipboardResult<()>;
    fn copy_text(&self, text: &str) -> ClipboardResult<()>;
}

/// Pipes data into `wl-copy`. Used by Wayland sessions that exit right after copying.
#[derive(Debug, Default)]
pub struct WlCopyBackend;

/// Pipes data into `xclip -selection clipboard`, the X11 counterpart of [`WlCopyBackend`].
#[derive(Debug, Default)]
pub struct XclipBackend;

/// Sets content on the default GDK display clipboard.
#[derive(Debug, Default)]
pub struct GdkClipboardBackend;

fn uri_list_payload(path: &Path) -> ClipboardResult<String> {
    let absolute_path = resolve_absolute_path(path)?;
    let uri =
        glib::filename_to_uri(&absolute_path, None).map_err(|err| ClipboardError::PathToUri {
            path: absolute_path.clone(),
            source: err,
        })?;
    Ok(format!("{uri}\r\n"))
}

fn gnome_copied_files_payload(path: &Path) -> ClipboardResult<String> {
    let absolute_path = resolve_absolute_path(path)?;
    let uri =
        glib::filename_to_uri(&absolute_path, None).map_err(|err| ClipboardError::PathToUri {
            path: absolute_path.clone(),
            source: err,
        })?;
    Ok(format!("copy\n{uri}"))
}

fn plain_text_path_payload(path: &Path) -> ClipboardResult<String> {
    let absolute_path = resolve_absolute_path(path)?;
    Ok(absolute_path.to_string_lossy().into_owned())
}

fn is_png_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

fn resolve_absolute_path(path: &Path) -> ClipboardResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|dir| dir.join(path))
        .map_err(|err| ClipboardError::CommandIo {
            command: "current_dir".to_string(),
            source: err,
        })
}

/// A clipboard tool that forks a server which keeps serving the content after the
/// calling process has exited.
struct ClipboardCommand {
    program: &'static str,
    image_args: &'static [&'static str],
    text_args: &'static [&'static str],
}

const WL_COPY: ClipboardCommand = ClipboardCommand {
    program: WL_COPY_COMMAND,
    image_args: &["--type", MIME_IMAGE_PNG],
    text_args: &[],
};

const XCLIP: ClipboardCommand = ClipboardCommand {
    program: XCLIP_COMMAND,
    image_args: &["-selection", "clipboard", "-t", MIME_IMAGE_PNG],
    text_args: &["-selection", "clipboard"],
};

impl ClipboardCommand {
    fn io_error(&self, err: io::Error) -> ClipboardError {
        ClipboardError::CommandIo {
            command: self.program.to_string(),
            source: err,
        }
    }

    fn check(&self, status: std::process::ExitStatus) -> ClipboardResult<()> {
        if status.success() {
            Ok(())
        } else {
            Err(ClipboardError::CommandFailed {
                command: self.program.to_string(),
                status: status.to_string(),
            })
        }
    }

    fn copy_image(&self, path: &Path) -> ClipboardResult<()> {
        let file = File::open(path).map_err(|err| ClipboardError::OpenFile {
            path: path.to_path_buf(),
            source: err,
        })?;

        let status = Command::new(self.program)
            .args(self.image_args)
            .stdin(Stdio::from(file))
            .status()
            .map_err(|err| self.io_error(err))?;
        self.check(status)
    }

    fn copy_text(&self, text: &str) -> ClipboardResult<()> {
        let mut child = Command::new(self.program)
            .args(self.text_args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|err| self.io_error(err))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|err| self.io_error(err))?;
        }
        let status = child.wait().map_err(|err| self.io_error(err))?;
        self.check(status)
    }
}

impl ClipboardBackend for WlCopyBackend {
    fn copy_image(&self, path: &Path) -> ClipboardResult<()> {
        WL_COPY.copy_image(path)
    }

    fn copy_text(&self, text: &str) -> ClipboardResult<()> {
        WL_COPY.copy_text(text)
    }
}

impl ClipboardBackend for XclipBackend {
    fn copy_image(&self, path: &Path) -> ClipboardResult<()> {
        XCLIP.copy_image(path)
    }

    fn copy_text(&self, text: &str) -> ClipboardResult<()> {
        XCLIP.copy_text(text)
    }
}

fn bytes_provider(mime: &str, payload: Vec<u8>) -> gdk::ContentProvider {
    gdk::ContentProvider::for_bytes(mime, &glib::Bytes::from_owned(payload))
}

fn default_clipboard() -> ClipboardResult<gdk::Clipboard> {
    let display = gdk::Display::default().ok_or(ClipboardError::DisplayUnavailable)?;
    Ok(display.clipboard())
}

impl ClipboardBackend for GdkClipboardBackend {
    fn copy_image(&self, path: &Path) -> ClipboardResult<()> {
        let absolute_path = resolve_absolute_path(path)?;
        let uri_list_payload = uri_list_payload(path)?;
        let gnome_payload = gnome_copied_files_payload(path)?;
        let text_path_payload = plain_text_path_payload(path)?;
        let clipboard = default_clipboard()?;

        let mut providers = vec![
            bytes_provider(MIME_GNOME_COPIED_FILES, gnome_payload.into_bytes()),
            bytes_provider(MIME_TEXT_URI_LIST, uri_list_payload.into_bytes()),
            bytes_provider(MIME_TEXT_PLAIN_UTF8, text_path_payload.clone().into_bytes()),
            bytes_provider(MIME_TEXT_PLAIN, text_path_payload.into_bytes()),
        ];
        if is_png_path(&absolute_path) {
            let image_bytes =
                std::fs::read(&absolute_path).map_err(|source| ClipboardError::ReadFile {
                    path: absolute_path,
                    source,
                })?;
            providers.push(bytes_provider(MIME_IMAGE_PNG, image_bytes));
        }
        let provider = gdk::ContentProvider::new_union(&providers);
        clipboard
            .set_content(Some(&provider))
            .map_err(|source| ClipboardError::SetContent { source })
    }

    fn copy_text(&self, text: &str) -> ClipboardResult<()> {
        default_clipboard()?.set_text(text);
        Ok(())
    }
}
