use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::capture::CaptureArtifact;
use thiserror::Error;

const APP_TEMP_DIR: &str = "snapline";
const DEFAULT_TEMP_PREFIX: &str = "capture_";
const EXPORT_SUBDIR: &str = "export";
const DEFAULT_FALLBACK_TEMP_ROOT: &str = "/tmp";
pub const STALE_TEMP_MAX_AGE_HOURS: u64 = 24;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("capture id is empty")]
    MissingCaptureId,
    #[error("export file name is empty or not a plain file name: {name}")]
    InvalidExportName { name: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Default, Clone)]
pub struct PruneReport {
    pub removed_files: usize,
}

/// Runtime scratch space: raw captures at the top level, temp exports in `export/`.
#[derive(Debug, Clone)]
pub struct StorageService {
    temp_dir: PathBuf,
}

impl StorageService {
    pub const fn with_temp_dir(temp_dir: PathBuf) -> Self {
        Self { temp_dir }
    }

    pub fn with_default_paths() -> StorageResult<Self> {
        let temp_dir = default_runtime_temp_dir();
        fs::create_dir_all(&temp_dir)?;
        Ok(Self::with_temp_dir(temp_dir))
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn export_dir(&self) -> PathBuf {
        self.temp_dir.join(EXPORT_SUBDIR)
    }

    fn validate_capture_id(capture_id: &str) -> StorageResult<()> {
        if capture_id.is_empty() {
            return Err(StorageError::MissingCaptureId);
        }
        Ok(())
    }

    pub fn temp_path_for_capture(&self, capture_id: &str) -> StorageResult<PathBuf> {
        Self::validate_capture_id(capture_id)?;
        let mut path = self.temp_dir.clone();
        path.push(format!("{DEFAULT_TEMP_PREFIX}{capture_id}.png"));
        Ok(path)
    }

    /// Allocates `export/<name>`, creating the directory. `name` must be a bare file name.
    pub fn allocate_export_path(&self, name: &str) -> StorageResult<PathBuf> {
        let is_plain = Path::new(name)
            .file_name()
            .is_some_and(|file_name| file_name == name);
        if !is_plain {
            return Err(StorageError::InvalidExportName {
                name: name.to_string(),
            });
        }

        let dir = self.export_dir();
        fs::create_dir_all(&dir)?;
        Ok(dir.join(name))
    }

    /// Deletes the capture's temp file. An already-removed file counts as success.
    pub fn discard_capture(&self, artifact: &CaptureArtifact) -> StorageResult<()> {
        Self::validate_capture_id(&artifact.capture_id)?;
        match fs::remove_file(&artifact.temp_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    pub fn prune_stale_temp_files(&self, max_age_hours: u64) -> StorageResult<PruneReport> {
        let max_age = Duration::from_secs(max_age_hours.saturating_mul(60 * 60));
        let mut report = PruneReport::default();

        prune_dir(&self.temp_dir, max_age, &mut report, |name| {
            name.starts_with(DEFAULT_TEMP_PREFIX)
        })?;
        prune_dir(&self.export_dir(), max_age, &mut report, |_| true)?;

        if report.removed_files > 0 {
            tracing::info!(
                removed = report.removed_files,
                dir = %self.temp_dir.display(),
                "pruned stale temp files"
            );
        }
        Ok(report)
    }
}

fn prune_dir<F>(
    dir: &Path,
    max_age: Duration,
    report: &mut PruneReport,
    accepts: F,
) -> StorageResult<()>
where
    F: Fn(&str) -> bool,
{
    if !dir.exists() {
        return Ok(());
    }

    let now = SystemTime::now();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        if path
            .file_name()
            .and_then(|name| name.to_str())
            .is_none_or(|name| !accepts(name))
        {
            continue;
        }

        let modified = fs::metadata(&path)?.modified()?;
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age <= max_age {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => report.removed_files += 1,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    ?err,
                    "failed to remove stale temp file"
                );
            }
        }
    }
    Ok(())
}

/// Temp path for a new capture. The runtime directory is created on demand.
pub fn create_temp_capture(capture_id: &str) -> StorageResult<PathBuf> {
    let service = StorageService::with_default_paths()?;
    service.temp_path_for_capture(capture_id)
}

pub fn prune_stale_temp_files(max_age_hours: u64) -> StorageResult<PruneReport> {
    StorageService::with_default_paths()?.prune_stale_temp_files(max_age_hours)
}

fn default_runtime_temp_dir() -> PathBuf {
    runtime_temp_dir_with(std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from))
}

fn runtime_temp_dir_with(xdg_runtime_dir: Option<PathBuf>) -> PathBuf {
    xdg_runtime_dir
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FALLBACK_TEMP_ROOT))
        .join(APP_TEMP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::GrabMode;
    use std::fs::File;

    fn age_file(path: &Path, hours: u64) {
        let file = File::options().write(true).open(path).unwrap();
        let past = SystemTime::now() - Duration::from_secs(hours * 60 * 60);
        file.set_modified(past).unwrap();
    }

    #[test]
    fn runtime_temp_dir_prefers_xdg_runtime_dir() {
        assert_eq!(
            runtime_temp_dir_with(Some(PathBuf::from("/run/user/1000"))),
            PathBuf::from("/run/user/1000/snapline")
        );
        assert_eq!(
            runtime_temp_dir_with(Some(PathBuf::new())),
            PathBuf::from("/tmp/snapline")
        );
        assert_eq!(runtime_temp_dir_with(None), PathBuf::from("/tmp/snapline"));
    }

    #[test]
    fn create_temp_capture_targets_temp_directory() {
        let path = create_temp_capture("123").unwrap();
        assert!(path.ends_with("snapline/capture_123.png"));
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn temp_path_rejects_empty_capture_id() {
        let service = StorageService::with_temp_dir(PathBuf::from("/tmp/snapline-test"));
        assert!(matches!(
            service.temp_path_for_capture(""),
            Err(StorageError::MissingCaptureId)
        ));
    }

    #[test]
    fn allocate_export_path_creates_export_dir_and_rejects_nested_names() {
        let dir = tempfile::tempdir().unwrap();
        let service = StorageService::with_temp_dir(dir.path().to_path_buf());
        let path = service.allocate_export_path("shot.png").unwrap();
        assert_eq!(path, dir.path().join("export/shot.png"));
        assert!(dir.path().join("export").is_dir());

        for name in ["", "../shot.png", "a/b.png"] {
            assert!(matches!(
                service.allocate_export_path(name),
                Err(StorageError::InvalidExportName { .. })
            ));
        }
    }

    #[test]
    fn discard_capture_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let service = StorageService::with_temp_dir(dir.path().to_path_buf());
        let path = service.temp_path_for_capture("artifact-1").unwrap();
        std::fs::write(&path, b"png").unwrap();
        let artifact = CaptureArtifact {
            capture_id: "artifact-1".to_string(),
            temp_path: path.clone(),
            width: 1,
            height: 1,
            mode: GrabMode::FullScreen,
            created_at: 0,
        };

        service.discard_capture(&artifact).unwrap();
        assert!(!path.exists());
        service.discard_capture(&artifact).unwrap();
    }

    #[test]
    fn prune_removes_only_old_capture_and_export_files() {
        let dir = tempfile::tempdir().unwrap();
        let service = StorageService::with_temp_dir(dir.path().to_path_buf());

        let old_capture = service.temp_path_for_capture("old").unwrap();
        let fresh_capture = service.temp_path_for_capture("fresh").unwrap();
        let unrelated = dir.path().join("notes.txt");
        let old_export = service.allocate_export_path("Screenshot.png").unwrap();
        for path in [&old_capture, &fresh_capture, &unrelated, &old_export] {
            std::fs::write(path, b"data").unwrap();
        }
        age_file(&old_capture, 30);
        age_file(&unrelated, 30);
        age_file(&old_export, 48);

        let report = service
            .prune_stale_temp_files(STALE_TEMP_MAX_AGE_HOURS)
            .unwrap();
        assert_eq!(report.removed_files, 2);
        assert!(!old_capture.exists());
        assert!(!old_export.exists());
        assert!(fresh_capture.exists());
        assert!(unrelated.exists());
    }
}
