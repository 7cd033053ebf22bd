use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

use crate::capture::CaptureArtifact;
use crate::config::{expand_tilde, AppConfig};
use crate::storage::{StorageError, StorageService};

pub const DEFAULT_FILENAME_TEMPLATE: &str = "Screenshot_%Y%m%d_%H%M%S";
const DEFAULT_SAVE_EXTENSION: &str = "png";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no screenshot to export")]
    NoImage,
    #[error("invalid filename template: {template}")]
    InvalidTemplate { template: String },
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ExportResult<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSettings {
    pub save_location: PathBuf,
    pub filename_template: String,
    /// Lowercase extension of the default save format.
    pub save_format: String,
    pub overwrite_on_save: bool,
    /// The user's XDG Pictures directory, if one is configured.
    pub pictures_dir: Option<PathBuf>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        let pictures_dir = dirs::picture_dir();
        Self {
            save_location: pictures_dir
                .clone()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from(".")),
            filename_template: DEFAULT_FILENAME_TEMPLATE.to_string(),
            save_format: DEFAULT_SAVE_EXTENSION.to_string(),
            overwrite_on_save: false,
            pictures_dir,
        }
    }
}

impl ExportSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let mut settings = Self::default();
        if let Some(location) = config.save_location.as_deref().filter(|s| !s.is_empty()) {
            settings.save_location = expand_tilde(location);
        }
        if let Some(template) = config.filename_template.as_deref().filter(|s| !s.is_empty()) {
            settings.filename_template = template.to_string();
        }
        if let Some(format) = config.save_format.as_deref() {
            let extension = format.trim().trim_start_matches('.').to_ascii_lowercase();
            if writable_format(&extension).is_some() {
                settings.save_format = extension;
            } else {
                tracing::warn!(format, "unsupported save format; keeping png");
            }
        }
        settings.overwrite_on_save = config.overwrite_on_save;
        settings
    }

    fn default_format(&self) -> ImageFormat {
        writable_format(&self.save_format).unwrap_or(ImageFormat::Png)
    }
}

fn writable_format(extension: &str) -> Option<ImageFormat> {
    ImageFormat::from_extension(extension).filter(|format| format.writing_enabled())
}

#[derive(Debug, Clone)]
struct TempExport {
    capture_id: String,
    path: PathBuf,
}

/// Holds the current screenshot and writes it out in the requested formats.
#[derive(Debug)]
pub struct ExportManager {
    settings: ExportSettings,
    storage: StorageService,
    current: Option<CaptureArtifact>,
    temp_export: Option<TempExport>,
}

impl ExportManager {
    pub fn new(settings: ExportSettings, storage: StorageService) -> Self {
        Self {
            settings,
            storage,
            current: None,
            temp_export: None,
        }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn image(&self) -> Option<&CaptureArtifact> {
        self.current.as_ref()
    }

    pub fn has_image(&self) -> bool {
        self.current.is_some()
    }

    /// Replaces the held screenshot. The previous capture's temp file is discarded.
    pub fn set_image(&mut self, artifact: CaptureArtifact) {
        if let Some(previous) = self.current.replace(artifact) {
            self.discard(&previous);
        }
        self.temp_export = None;
    }

    /// Drops the held screenshot and its temp file.
    pub fn release(&mut self) {
        if let Some(previous) = self.current.take() {
            self.discard(&previous);
        }
        self.temp_export = None;
    }

    fn discard(&self, artifact: &CaptureArtifact) {
        if let Err(err) = self.storage.discard_capture(artifact) {
            tracing::warn!(
                capture_id = %artifact.capture_id,
                ?err,
                "failed to discard capture temp file"
            );
        }
    }

    /// Template expansion plus default extension, without a uniqueness suffix.
    pub fn suggested_filename(&self, now: &DateTime<Local>) -> ExportResult<String> {
        let stem = render_template(&self.settings.filename_template, now)?;
        Ok(format!("{stem}.{}", self.settings.save_format))
    }

    pub fn auto_save_path(&self, now: &DateTime<Local>) -> ExportResult<PathBuf> {
        let stem = render_template(&self.settings.filename_template, now)?;
        let extension = &self.settings.save_format;
        let dir = &self.settings.save_location;

        let candidate = dir.join(format!("{stem}.{extension}"));
        if self.settings.overwrite_on_save || !candidate.exists() {
            return Ok(candidate);
        }

        let mut suffix: u32 = 1;
        loop {
            let candidate = dir.join(format!("{stem}-{suffix}.{extension}"));
            if !candidate.exists() {
                return Ok(candidate);
            }
            suffix = suffix.saturating_add(1);
        }
    }

    /// Resolves the final path and encoder for a save target.
    pub fn save_format_for(&self, path: &Path) -> (PathBuf, ImageFormat) {
        let default_format = self.settings.default_format();
        match path.extension().and_then(|ext| ext.to_str()) {
            None => {
                let mut with_extension = OsString::from(path.as_os_str());
                with_extension.push(".");
                with_extension.push(&self.settings.save_format);
                (PathBuf::from(with_extension), default_format)
            }
            Some(extension) => {
                let format = writable_format(&extension.to_ascii_lowercase()).unwrap_or_else(|| {
                    tracing::debug!(extension, "unknown extension; using default save format");
                    default_format
                });
                (path.to_path_buf(), format)
            }
        }
    }

    pub fn save_to(&self, requested: &Path) -> ExportResult<PathBuf> {
        let artifact = self.current.as_ref().ok_or(ExportError::NoImage)?;
        let (target, format) = self.save_format_for(requested);

        if let Some(parent) = target.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ExportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        if format == ImageFormat::Png {
            fs::copy(&artifact.temp_path, &target).map_err(|source| ExportError::Io {
                path: target.clone(),
                source,
            })?;
        } else {
            encode_as(&artifact.temp_path, &target, format)?;
        }

        tracing::info!(
            capture_id = %artifact.capture_id,
            path = %target.display(),
            format = ?format,
            "screenshot saved"
        );
        Ok(target)
    }

    /// Saves to `target`, or to a fresh auto-generated path when none is given.
    pub fn do_save(&self, target: Option<&Path>, now: &DateTime<Local>) -> ExportResult<PathBuf> {
        match target {
            Some(path) => self.save_to(path),
            None => {
                let path = self.auto_save_path(now)?;
                self.save_to(&path)
            }
        }
    }

    /// Writes the screenshot into the temp export directory under its suggested
    /// name. Repeated calls for the same capture reuse the file.
    pub fn temp_save(&mut self, now: &DateTime<Local>) -> ExportResult<PathBuf> {
        let artifact = self.current.as_ref().ok_or(ExportError::NoImage)?;
        if let Some(cached) = self
            .temp_export
            .as_ref()
            .filter(|cached| cached.capture_id == artifact.capture_id && cached.path.exists())
        {
            return Ok(cached.path.clone());
        }

        let capture_id = artifact.capture_id.clone();
        let name = self.suggested_filename(now)?;
        let path = self.storage.allocate_export_path(&name)?;
        let path = self.save_to(&path)?;
        self.temp_export = Some(TempExport {
            capture_id,
            path: path.clone(),
        });
        Ok(path)
    }
}

fn encode_as(source: &Path, target: &Path, format: ImageFormat) -> ExportResult<()> {
    let encode_error = |source: image::ImageError| ExportError::Encode {
        path: target.to_path_buf(),
        source,
    };
    let image = image::open(source).map_err(encode_error)?;
    let image = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        image
    };
    image.save_with_format(target, format).map_err(encode_error)
}

/// Expands a strftime template. Unknown specifiers and names that would escape
/// the save directory are rejected.
pub fn render_template(template: &str, now: &DateTime<Local>) -> ExportResult<String> {
    let invalid = || ExportError::InvalidTemplate {
        template: template.to_string(),
    };
    let items: Vec<Item<'_>> = StrftimeItems::new(template).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(invalid());
    }

    let rendered = now.format_with_items(items.iter()).to_string();
    let rendered = rendered.trim();
    if rendered.is_empty() || rendered.contains('/') || rendered == "." || rendered == ".." {
        return Err(invalid());
    }
    Ok(rendered.to_string())
}
