use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigPathError {
    #[error("neither XDG_CONFIG_HOME nor HOME is set")]
    MissingHomeDirectory,
}

const APP_DIR: &str = "snapline";
const APP_CONFIG_FILE: &str = "config.json";

/// Application-level settings from `config.json`. Unknown keys are ignored and
/// missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub include_pointer: bool,
    pub include_decorations: bool,
    pub copy_save_location_to_clipboard: bool,
    pub save_location: Option<String>,
    pub filename_template: Option<String>,
    pub save_format: Option<String>,
    pub overwrite_on_save: bool,
    /// X11 only: whether a compositing manager is running.
    pub compositing: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            include_pointer: true,
            include_decorations: true,
            copy_save_location_to_clipboard: false,
            save_location: None,
            filename_template: None,
            save_format: None,
            overwrite_on_save: false,
            compositing: None,
        }
    }
}

pub fn load_app_config() -> AppConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_app_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_app_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> AppConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(err) => {
            tracing::warn!(%err, "cannot locate config.json; using defaults");
            return AppConfig::default();
        }
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            AppConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}

/// Expands a leading `~/` against the home directory.
pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_config_path_prefers_xdg_config_home() {
        let path = app_config_path(
            "snapline",
            "config.json",
            Some(Path::new("/tmp/config-root")),
            Some(Path::new("/tmp/home")),
        )
        .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/config-root/snapline/config.json"));
    }

    #[test]
    fn app_config_path_falls_back_to_home_dot_config() {
        let path = app_config_path("snapline", "config.json", None, Some(Path::new("/tmp/home")))
            .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/home/.config/snapline/config.json"));
    }

    #[test]
    fn app_config_path_errors_when_home_missing_and_xdg_unset() {
        let error = app_config_path("snapline", "config.json", None, None).unwrap_err();
        assert_eq!(error, ConfigPathError::MissingHomeDirectory);
    }

    #[test]
    fn load_app_config_reads_partial_file_and_keeps_defaults() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("snapline");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.json"),
            r#"{"include_pointer": false, "save_format": "jpg", "compositing": false, "unknown": 1}"#,
        )
        .unwrap();

        let config = load_app_config_with(Some(root.path()), None);
        assert!(!config.include_pointer);
        assert!(config.include_decorations);
        assert_eq!(config.save_format.as_deref(), Some("jpg"));
        assert_eq!(config.compositing, Some(false));
        assert!(!config.overwrite_on_save);
    }

    #[test]
    fn load_app_config_falls_back_on_malformed_or_missing_file() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(load_app_config_with(Some(root.path()), None), AppConfig::default());

        let dir = root.path().join("snapline");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.json"), "{ not json").unwrap();
        assert_eq!(load_app_config_with(Some(root.path()), None), AppConfig::default());
    }

    #[test]
    fn expand_tilde_only_touches_home_prefix() {
        assert_eq!(expand_tilde("/srv/shots"), PathBuf::from("/srv/shots"));
        assert!(!expand_tilde("~/Pictures").starts_with("~"));
    }
}
