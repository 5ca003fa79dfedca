use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::preview::{PageColor, PreviewError, PreviewOptions, RenderMode, Topology};
use crate::preview::{DEFAULT_RASTER_CACHE_SIZE, DEFAULT_TILE_HEIGHT};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "livepreview";

const SETTINGS_HEADER: &str = "\
# livepreview settings
# render_mode: vector | raster
# topology: continuous | paginated
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub topology: Topology,

    /// Kept as a string so an unknown mode fails at attach, not at parse
    #[serde(default = "default_render_mode")]
    pub render_mode: String,

    #[serde(default)]
    pub source_mapping: bool,

    #[serde(default)]
    pub is_content_preview: bool,

    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f32,

    #[serde(default = "default_tile_height")]
    pub tile_height: u32,

    #[serde(default = "default_raster_cache_size")]
    pub raster_cache_size: usize,

    #[serde(default = "default_debounce_ms")]
    pub default_debounce_ms: u64,

    #[serde(default)]
    pub dark_mode: bool,

    #[serde(default = "default_light_page_color")]
    pub light_page_color: String,

    #[serde(default = "default_dark_page_color")]
    pub dark_page_color: String,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_render_mode() -> String {
    RenderMode::Vector.as_str().to_string()
}

fn default_pixel_ratio() -> f32 {
    1.0
}

fn default_tile_height() -> u32 {
    DEFAULT_TILE_HEIGHT
}

fn default_raster_cache_size() -> usize {
    DEFAULT_RASTER_CACHE_SIZE
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_light_page_color() -> String {
    "white".to_string()
}

fn default_dark_page_color() -> String {
    "#242424".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            topology: Topology::default(),
            render_mode: default_render_mode(),
            source_mapping: false,
            is_content_preview: false,
            pixel_ratio: default_pixel_ratio(),
            tile_height: default_tile_height(),
            raster_cache_size: default_raster_cache_size(),
            default_debounce_ms: default_debounce_ms(),
            dark_mode: false,
            light_page_color: default_light_page_color(),
            dark_page_color: default_dark_page_color(),
        }
    }
}

impl Settings {
    /// Page color for the current dark/light preference
    pub fn page_color(&self) -> Result<PageColor, PreviewError> {
        let raw = if self.dark_mode {
            &self.dark_page_color
        } else {
            &self.light_page_color
        };
        raw.parse().map_err(PreviewError::Configuration)
    }

    /// Options for `DocumentController::attach`
    pub fn preview_options(&self) -> Result<PreviewOptions, PreviewError> {
        let initial_render_mode: RenderMode = self
            .render_mode
            .parse()
            .map_err(PreviewError::Configuration)?;

        if !(self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0) {
            return Err(PreviewError::configuration(format!(
                "pixel_ratio must be positive, got {}",
                self.pixel_ratio
            )));
        }

        Ok(PreviewOptions {
            topology: self.topology,
            is_content_preview: self.is_content_preview,
            source_mapping: self.source_mapping,
            initial_render_mode,
            pixel_ratio: self.pixel_ratio,
            tile_height: self.tile_height.max(1),
            raster_cache_size: self.raster_cache_size,
            default_debounce: Duration::from_millis(self.default_debounce_ms),
            page_color: self.page_color()?,
        })
    }
}

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the default location, writing defaults if missing
pub fn load_settings() -> Settings {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return Settings::default();
    };
    load_or_create(&path)
}

/// Load settings from `path`, creating the file with defaults if missing
pub fn load_or_create(path: &Path) -> Settings {
    if path.exists() {
        return load_settings_from_path(path);
    }

    info!("Settings file not found, creating with defaults at {path:?}");
    let settings = Settings::default();
    save_settings_to_file(&settings, path);
    settings
}

/// Parse settings from `path`; malformed files fall back to defaults
pub fn load_settings_from_path(path: &Path) -> Settings {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }
                settings
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
                Settings::default()
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
            Settings::default()
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILENAME);

        let settings = load_or_create(&path);
        assert_eq!(settings, Settings::default());
        assert!(path.exists());

        let reloaded = load_settings_from_path(&path);
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "topology: paginated\nrender_mode: raster\n").unwrap();

        let settings = load_settings_from_path(&path);
        assert_eq!(settings.topology, Topology::Paginated);
        assert_eq!(settings.render_mode, "raster");
        assert_eq!(settings.tile_height, DEFAULT_TILE_HEIGHT);

        let options = settings.preview_options().unwrap();
        assert_eq!(options.initial_render_mode, RenderMode::Raster);
        assert_eq!(options.default_debounce, Duration::from_millis(100));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "topology: [not, a, topology]\n").unwrap();

        assert_eq!(load_settings_from_path(&path), Settings::default());
    }

    #[test]
    fn old_version_is_migrated_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "version: 0\n").unwrap();

        let settings = load_settings_from_path(&path);
        assert_eq!(settings.version, CURRENT_VERSION);
        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains(&format!("version: {CURRENT_VERSION}")));
    }

    #[test]
    fn unknown_render_mode_is_a_configuration_error() {
        let settings = Settings {
            render_mode: "webgl".to_string(),
            ..Settings::default()
        };
        let err = settings.preview_options().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn dark_mode_picks_dark_page_color() {
        let mut settings = Settings::default();
        assert_eq!(settings.page_color().unwrap(), PageColor::WHITE);

        settings.dark_mode = true;
        assert_eq!(
            settings.page_color().unwrap(),
            PageColor::rgb(0x24, 0x24, 0x24)
        );
    }
}
