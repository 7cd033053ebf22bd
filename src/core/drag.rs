use std::path::PathBuf;

pub const SUGGESTED_FILENAME_MIME: &str = "application/x-kde-suggestedfilename";
pub const DRAG_THUMBNAIL_EDGE: u32 = 256;

/// Data offered by a drag out of the preview window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragPayload {
    pub file_path: PathBuf,
    pub uri_list: String,
    pub png_data: Vec<u8>,
    pub suggested_filename: String,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
}

/// Scales `width`x`height` so it covers an `edge`x`edge` square with the aspect
/// ratio kept. The short side becomes `edge`.
pub fn thumbnail_size(width: u32, height: u32, edge: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (edge, edge);
    }
    let scale = (f64::from(edge) / f64::from(width)).max(f64::from(edge) / f64::from(height));
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}
