use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::WindowTarget;
use crate::detection::{BoardLayout, CellRegion};
use crate::error::ConfigError;
use crate::preprocessing::{GameGeometry, WindowBorders};

/// Directory name under the platform config dir
pub const APP_DIR_NAME: &str = "PacmanPerception";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Owning application of the game window (exact match)
    pub app_name: String,

    /// Title of the game window (exact match)
    pub window_title: String,

    /// How often the window list is polled while acquiring
    pub poll_interval_ms: u64,

    /// Give up acquiring after this long
    pub acquisition_timeout_ms: u64,

    /// Capture cadence once the window is acquired
    pub capture_interval_ms: u64,

    /// Window chrome above the playfield, in points
    pub top_border_points: f64,

    /// Window chrome below the playfield, in points
    pub bottom_border_points: f64,

    /// Tile model JSON; the bundled model is used when unset
    pub model_path: Option<PathBuf>,

    /// Cell rectangles that are never classified
    pub ignore_regions: Vec<CellRegion>,

    /// Start a new acquisition attempt after a timeout
    pub restart_on_timeout: bool,
}

impl Default for Config {
    fn default() -> Self {
        let borders = WindowBorders::default();
        Self {
            app_name: "Pac-Man".to_string(),
            window_title: "Pac-Man".to_string(),
            poll_interval_ms: 250,
            acquisition_timeout_ms: 10_000,
            capture_interval_ms: 90,
            top_border_points: borders.top_points,
            bottom_border_points: borders.bottom_points,
            model_path: None,
            ignore_regions: BoardLayout::default_ignored(GameGeometry::ARCADE),
            restart_on_timeout: false,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the platform config directory
    /// when no path is given. Creates a default config if the file doesn't
    /// exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path).map_err(|err| ConfigError::LoadFailed {
                path: config_path.display().to_string(),
                source: Box::new(err),
            })?;
            let config: Config = serde_json::from_str(&content).map_err(|err| ConfigError::LoadFailed {
                path: config_path.display().to_string(),
                source: Box::new(err),
            })?;
            config.validate()?;

            tracing::info!("✓ Loaded config from: {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            tracing::info!("✓ Created default config at: {}", config_path.display());
            tracing::info!("  Edit this file to customize settings.");
            Ok(config)
        }
    }

    /// Save configuration to the platform config directory
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), ConfigError> {
        let save_failed = |err: Box<dyn std::error::Error + Send + Sync>| ConfigError::SaveFailed {
            path: config_path.display().to_string(),
            source: err,
        };

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|err| save_failed(Box::new(err)))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|err| save_failed(Box::new(err)))?;
        fs::write(config_path, json).map_err(|err| save_failed(Box::new(err)))?;

        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be greater than 0".to_string()));
        }
        if self.acquisition_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "acquisition_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.capture_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "capture_interval_ms must be greater than 0".to_string(),
            ));
        }
        for (name, value) in [
            ("top_border_points", self.top_border_points),
            ("bottom_border_points", self.bottom_border_points),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        let geometry = GameGeometry::ARCADE;
        if let Some(region) = self
            .ignore_regions
            .iter()
            .find(|region| !region.fits(geometry.rows(), geometry.cols()))
        {
            return Err(ConfigError::Invalid(format!(
                "ignore region {:?} is outside the {}x{} board",
                region,
                geometry.rows(),
                geometry.cols()
            )));
        }

        Ok(())
    }

    /// Get the config file path (in the platform config directory)
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::app_dir()?.join("config.json"))
    }

    /// Directory holding the config file and logs
    pub fn app_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn target(&self) -> WindowTarget {
        WindowTarget::new(&self.app_name, &self.window_title)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition_timeout_ms)
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    pub fn borders(&self) -> WindowBorders {
        WindowBorders {
            top_points: self.top_border_points,
            bottom_points: self.bottom_border_points,
        }
    }

    pub fn layout(&self) -> BoardLayout {
        BoardLayout::new(GameGeometry::ARCADE, self.ignore_regions.clone())
    }
}
