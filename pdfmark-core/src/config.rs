use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// View zoom bounds, as fractions of actual size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomConfig {
    #[serde(default = "default_zoom_min")]
    pub min: f32,
    #[serde(default = "default_zoom_max")]
    pub max: f32,
    #[serde(default = "default_zoom_step")]
    pub step: f32,
    #[serde(default = "default_zoom")]
    pub default: f32,
}

const fn default_zoom_min() -> f32 {
    0.25
}

const fn default_zoom_max() -> f32 {
    2.0
}

const fn default_zoom_step() -> f32 {
    0.05
}

const fn default_zoom() -> f32 {
    1.0
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min: default_zoom_min(),
            max: default_zoom_max(),
            step: default_zoom_step(),
            default: default_zoom(),
        }
    }
}

impl ZoomConfig {
    pub fn clamp(&self, zoom: f32) -> f32 {
        zoom.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Populate the forest from the document's outline when it is opened.
    #[serde(default = "default_true")]
    pub auto_extract: bool,

    #[serde(default)]
    pub zoom: ZoomConfig,

    /// Appended to the input file stem when no output path is given.
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
}

const fn default_true() -> bool {
    true
}

fn default_output_suffix() -> String {
    "-bookmarked".to_owned()
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            auto_extract: true,
            zoom: ZoomConfig::default(),
            output_suffix: default_output_suffix(),
        }
    }
}

impl EditorConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Loads the explicit path if given, else the per-user config file.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => match default_config_path() {
                Some(path) => Self::load_from(&path),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let zoom = &self.zoom;
        if !(zoom.min > 0.0) {
            return Err(invalid("zoom.min", "must be greater than zero"));
        }
        if zoom.min > zoom.max {
            return Err(invalid("zoom.max", "must not be below zoom.min"));
        }
        if !(zoom.step > 0.0) {
            return Err(invalid("zoom.step", "must be greater than zero"));
        }
        if !(zoom.min..=zoom.max).contains(&zoom.default) {
            return Err(invalid("zoom.default", "must lie between zoom.min and zoom.max"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_owned(),
    }
}

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "pdfmark", "pdfmark")
}

pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = EditorConfig::from_toml("").unwrap();
        assert_eq!(config, EditorConfig::default());
        assert!(config.auto_extract);
        assert_eq!(config.output_suffix, "-bookmarked");
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = EditorConfig::from_toml(
            "auto_extract = false\n[zoom]\nmax = 4.0\n",
        )
        .unwrap();
        assert!(!config.auto_extract);
        assert_eq!(config.zoom.max, 4.0);
        assert_eq!(config.zoom.min, 0.25);
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        for text in [
            "[zoom]\nmin = 0.0",
            "[zoom]\nmin = 3.0",
            "[zoom]\nstep = -1.0",
            "[zoom]\ndefault = 5.0",
        ] {
            assert!(
                matches!(EditorConfig::from_toml(text), Err(ConfigError::Invalid { .. })),
                "{text}"
            );
        }
        assert!(matches!(
            EditorConfig::from_toml("zoom = 'x'"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EditorConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EditorConfig::default());

        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "output_suffix = \"-toc\"").unwrap();
        assert_eq!(EditorConfig::load(Some(&path)).unwrap().output_suffix, "-toc");
    }
}
