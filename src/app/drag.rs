use gtk4::gdk;
use gtk4::gdk_pixbuf::Pixbuf;
use gtk4::glib;

use crate::core::{DragPayload, SUGGESTED_FILENAME_MIME};

const MIME_TEXT_URI_LIST: &str = "text/uri-list";
const MIME_IMAGE_PNG: &str = "image/png";

fn bytes_provider(mime: &str, payload: Vec<u8>) -> gdk::ContentProvider {
    gdk::ContentProvider::for_bytes(mime, &glib::Bytes::from_owned(payload))
}

/// File managers take the URI, image editors the PNG bytes, and KDE targets
/// read the suggested file name when they copy the file themselves.
pub(super) fn drag_content(payload: DragPayload) -> gdk::ContentProvider {
    gdk::ContentProvider::new_union(&[
        bytes_provider(MIME_TEXT_URI_LIST, payload.uri_list.into_bytes()),
        bytes_provider(MIME_IMAGE_PNG, payload.png_data),
        bytes_provider(
            SUGGESTED_FILENAME_MIME,
            payload.suggested_filename.into_bytes(),
        ),
    ])
}

pub(super) fn drag_icon(payload: &DragPayload) -> Option<gdk::Texture> {
    let width = i32::try_from(payload.thumbnail_width).ok()?;
    let height = i32::try_from(payload.thumbnail_height).ok()?;
    match Pixbuf::from_file_at_scale(&payload.file_path, width, height, false) {
        Ok(pixbuf) => Some(gdk::Texture::for_pixbuf(&pixbuf)),
        Err(err) => {
            tracing::debug!(path = %payload.file_path.display(), %err, "no drag thumbnail");
            None
        }
    }
}
