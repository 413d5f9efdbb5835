//! Engine configuration.
//!
//! Loop timing, world constants and view settings, loaded from an INI file.
//! Every key is optional; missing values keep their defaults.
//!
//! # Configuration File Format
//!
//! ```ini
//! [loop]
//! fixed_step_ms = 17
//! time_multiplier = 1.0
//! max_advance_ms = 100
//!
//! [world]
//! gravity = 2800
//!
//! [view]
//! width = 640
//! height = 960
//! background = #ffffff
//! debug = false
//! ```

use std::path::PathBuf;

use configparser::ini::Ini;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::resources::world::DEFAULT_GRAVITY;

const DEFAULT_FIXED_STEP_MS: f64 = 17.0;
const DEFAULT_TIME_MULTIPLIER: f64 = 1.0;
pub const DEFAULT_MAX_ADVANCE_MS: f64 = 100.0;
const DEFAULT_VIEW_WIDTH: u32 = 640;
const DEFAULT_VIEW_HEIGHT: u32 = 960;
const DEFAULT_BACKGROUND: &str = "#ffffff";
const DEFAULT_CONFIG_PATH: &str = "./cadence.ini";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Simulation step in milliseconds; `0` runs one variable step per frame.
    pub fixed_step_ms: f64,
    pub time_multiplier: f64,
    /// Cap on the time a single frame may feed the loop.
    pub max_advance_ms: f64,
    pub gravity: f32,
    pub view_width: u32,
    pub view_height: u32,
    pub background: String,
    pub debug: bool,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            fixed_step_ms: DEFAULT_FIXED_STEP_MS,
            time_multiplier: DEFAULT_TIME_MULTIPLIER,
            max_advance_ms: DEFAULT_MAX_ADVANCE_MS,
            gravity: DEFAULT_GRAVITY,
            view_width: DEFAULT_VIEW_WIDTH,
            view_height: DEFAULT_VIEW_HEIGHT,
            background: DEFAULT_BACKGROUND.to_string(),
            debug: false,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current values.
    pub fn load_from_file(&mut self) -> Result<()> {
        let mut config = Ini::new();
        // `#` starts colour values here, not comments
        config.set_comment_symbols(&[';']);
        config
            .load(&self.config_path)
            .map_err(|e| EngineError::Config(format!("Failed to load config file: {}", e)))?;

        // [loop] section
        if let Some(step) = config.getfloat("loop", "fixed_step_ms").ok().flatten() {
            self.fixed_step_ms = step.max(0.0);
        }
        if let Some(m) = config.getfloat("loop", "time_multiplier").ok().flatten() {
            self.time_multiplier = m;
        }
        if let Some(max) = config.getfloat("loop", "max_advance_ms").ok().flatten() {
            self.max_advance_ms = max.max(0.0);
        }

        // [world] section
        if let Some(gravity) = config.getfloat("world", "gravity").ok().flatten() {
            self.gravity = gravity as f32;
        }

        // [view] section
        if let Some(width) = config.getuint("view", "width").ok().flatten() {
            self.view_width = width as u32;
        }
        if let Some(height) = config.getuint("view", "height").ok().flatten() {
            self.view_height = height as u32;
        }
        if let Some(background) = config.get("view", "background") {
            self.background = background;
        }
        if let Some(debug) = config.getbool("view", "debug").ok().flatten() {
            self.debug = debug;
        }

        info!(
            "Loaded config: step={}ms x{}, max_advance={}ms, gravity={}, view {}x{} {}, debug={}",
            self.fixed_step_ms,
            self.time_multiplier,
            self.max_advance_ms,
            self.gravity,
            self.view_width,
            self.view_height,
            self.background,
            self.debug
        );

        Ok(())
    }

    /// Save configuration to the INI file.
    pub fn save_to_file(&self) -> Result<()> {
        let mut config = Ini::new();

        config.set("loop", "fixed_step_ms", Some(self.fixed_step_ms.to_string()));
        config.set("loop", "time_multiplier", Some(self.time_multiplier.to_string()));
        config.set("loop", "max_advance_ms", Some(self.max_advance_ms.to_string()));

        config.set("world", "gravity", Some(self.gravity.to_string()));

        config.set("view", "width", Some(self.view_width.to_string()));
        config.set("view", "height", Some(self.view_height.to_string()));
        config.set("view", "background", Some(self.background.clone()));
        config.set("view", "debug", Some(self.debug.to_string()));

        config
            .write(&self.config_path)
            .map_err(|e| EngineError::Config(format!("Failed to save config file: {}", e)))?;

        info!("Saved config to {:?}", self.config_path);

        Ok(())
    }

    /// Fixed step in milliseconds, `None` in variable mode.
    pub fn fixed_step(&self) -> Option<f64> {
        (self.fixed_step_ms > 0.0).then_some(self.fixed_step_ms)
    }

    pub fn set_fixed_step(&mut self, step_ms: Option<f64>) -> &mut Self {
        self.fixed_step_ms = step_ms.unwrap_or(0.0).max(0.0);
        self
    }

    pub fn set_view_size(&mut self, width: u32, height: u32) -> &mut Self {
        self.view_width = width;
        self.view_height = height;
        self
    }

    pub fn set_debug(&mut self, debug: bool) -> &mut Self {
        self.debug = debug;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cadence-{}-{}.ini", name, std::process::id()))
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.fixed_step(), Some(17.0));
        assert_eq!(config.max_advance_ms, 100.0);
        assert_eq!(config.gravity, 2800.0);
        assert_eq!((config.view_width, config.view_height), (640, 960));
        assert_eq!(config.background, "#ffffff");
        assert!(!config.debug);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let path = temp_path("partial");
        std::fs::write(&path, "[loop]\nfixed_step_ms = 0\n[view]\ndebug = true\n").unwrap();

        let mut config = EngineConfig::with_path(&path);
        config.load_from_file().unwrap();
        assert_eq!(config.fixed_step(), None);
        assert!(config.debug);
        assert_eq!(config.view_width, 640);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("save");
        let mut config = EngineConfig::with_path(&path);
        config.set_view_size(320, 480).set_fixed_step(Some(10.0));
        config.gravity = 100.0;
        config.save_to_file().unwrap();

        let mut loaded = EngineConfig::with_path(&path);
        loaded.load_from_file().unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let mut config = EngineConfig::with_path(temp_path("does-not-exist"));
        assert!(matches!(
            config.load_from_file(),
            Err(EngineError::Config(_))
        ));
    }
}
