//! Configuration for chaser_vision
//!
//! The robot is described by a single TOML document: the named color ranges, which
//! of them is the target (and optionally the line and obstacle colors), the
//! cameras in priority order, and the search and serial settings.

use crate::arbiter::SearchConfig;
use crate::capture::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
use crate::channel::SerialConfig;
use crate::core_modules::camera_unit::{CameraRole, DEFAULT_LINE_MIN_Y};
use crate::core_modules::color_segmenter::ColorRange;
use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

const MAX_FRAME_WIDTH: u32 = 7680;
const MAX_FRAME_HEIGHT: u32 = 4320;

/// How the target color is pursued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStrategy {
    /// Drive at the target.
    #[default]
    Chase,
    /// Turn to face the target and hold position.
    Face,
}

/// Which blob locator feeds the chase and face rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    /// One centroid per external contour.
    #[default]
    Multi,
    /// One pixel-weighted centroid for the whole mask.
    Single,
}

/// One physical camera.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CameraConfig {
    pub name: String,
    pub role: CameraRole,
    /// Capture device index.
    #[serde(default)]
    pub device: i32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_width() -> u32 {
    DEFAULT_FRAME_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_FRAME_HEIGHT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AvoidLineConfig {
    /// Centroids at or below this row (in pixels) count as a line under the robot.
    pub min_y: u32,
}

impl Default for AvoidLineConfig {
    fn default() -> Self {
        Self { min_y: DEFAULT_LINE_MIN_Y }
    }
}

/// The whole robot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RobotConfig {
    /// Key into `colors` for the object to pursue.
    pub target_color: String,
    #[serde(default)]
    pub strategy: TargetStrategy,
    #[serde(default)]
    pub locator: LocatorKind,
    /// Key into `colors` for floor lines to stay away from.
    #[serde(default)]
    pub line_color: Option<String>,
    /// Key into `colors` for obstacles to steer around.
    #[serde(default)]
    pub obstacle_color: Option<String>,
    /// Poll cameras concurrently.
    #[serde(default)]
    pub parallel: bool,
    pub colors: BTreeMap<String, ColorRange>,
    /// In decision priority order.
    pub cameras: Vec<CameraConfig>,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub avoid_line: AvoidLineConfig,
    #[serde(default)]
    pub serial: SerialConfig,
}

impl RobotConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RobotConfig = toml::from_str(text)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.colors.is_empty() {
            return Err("At least one color range is required".to_string());
        }
        for (name, range) in &self.colors {
            range.validate().map_err(|e| format!("color '{}': {}", name, e))?;
        }

        self.require_color("target_color", Some(&self.target_color))?;
        self.require_color("line_color", self.line_color.as_ref())?;
        self.require_color("obstacle_color", self.obstacle_color.as_ref())?;

        if self.cameras.is_empty() {
            return Err("At least one camera is required".to_string());
        }
        let mut names = HashSet::new();
        for camera in &self.cameras {
            if camera.name.trim().is_empty() {
                return Err("Camera names must be non-empty".to_string());
            }
            if !names.insert(camera.name.as_str()) {
                return Err(format!("Duplicate camera name '{}'", camera.name));
            }
            if camera.width == 0 || camera.height == 0 {
                return Err(format!("Camera '{}': resolution must be non-zero", camera.name));
            }
            if camera.width > MAX_FRAME_WIDTH || camera.height > MAX_FRAME_HEIGHT {
                return Err(format!("Camera '{}': resolution too large (max 8K)", camera.name));
            }
        }

        self.search.validate()?;
        self.serial.validate()?;
        Ok(())
    }

    pub fn target_range(&self) -> Option<&ColorRange> {
        self.colors.get(&self.target_color)
    }

    pub fn line_range(&self) -> Option<&ColorRange> {
        self.line_color.as_ref().and_then(|name| self.colors.get(name))
    }

    pub fn obstacle_range(&self) -> Option<&ColorRange> {
        self.obstacle_color.as_ref().and_then(|name| self.colors.get(name))
    }

    fn require_color(&self, key: &str, name: Option<&String>) -> Result<(), String> {
        match name {
            Some(name) if !self.colors.contains_key(name) => {
                Err(format!("{} '{}' is not defined in [colors]", key, name))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        target_color = "orange"

        [colors]
        orange = [[0, 108, 255], [179, 255, 255]]

        [[cameras]]
        name = "front"
        role = "front"
    "#;

    const FULL: &str = r#"
        target_color = "orange"
        strategy = "face"
        locator = "single"
        line_color = "yellow"
        obstacle_color = "black"
        parallel = true

        [colors]
        orange = [[0, 108, 255], [179, 255, 255]]
        yellow = [[20, 100, 100], [30, 255, 255]]
        black = [[0, 0, 0], [180, 255, 40]]

        [[cameras]]
        name = "front"
        role = "front"
        device = 1

        [[cameras]]
        name = "360"
        role = "back"
        device = 0
        width = 1280
        height = 720

        [search]
        nudge_at = 3
        realign_at = 10

        [avoid_line]
        min_y = 600

        [serial]
        port = "/dev/ttyACM0"
        baud_rate = 115200
    "#;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config = RobotConfig::from_toml_str(MINIMAL).expect("valid config");
        assert_eq!(config.strategy, TargetStrategy::Chase);
        assert_eq!(config.locator, LocatorKind::Multi);
        assert!(!config.parallel);
        assert_eq!(config.cameras[0].width, 640);
        assert_eq!(config.cameras[0].height, 480);
        assert_eq!(config.cameras[0].device, 0);
        assert_eq!(config.search, SearchConfig::default());
        assert_eq!(config.avoid_line.min_y, 715);
        assert_eq!(config.serial.baud_rate, 2_000_000);
        assert_eq!(config.target_range(), Some(&ColorRange::new([0, 108, 255], [179, 255, 255])));
        assert!(config.line_range().is_none());
        assert!(config.obstacle_range().is_none());
    }

    #[test]
    fn test_full_config() {
        let config = RobotConfig::from_toml_str(FULL).expect("valid config");
        assert_eq!(config.strategy, TargetStrategy::Face);
        assert_eq!(config.locator, LocatorKind::Single);
        assert!(config.parallel);
        assert_eq!(config.cameras.len(), 2);
        assert_eq!(config.cameras[1].role, CameraRole::Back);
        assert_eq!((config.cameras[1].width, config.cameras[1].height), (1280, 720));
        assert_eq!(config.search.nudge_at, 3);
        assert_eq!(config.avoid_line.min_y, 600);
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.serial.timeout_ms, 100);
        assert!(config.line_range().is_some());
        assert!(config.obstacle_range().is_some());
    }

    #[test]
    fn test_unknown_target_color() {
        let text = MINIMAL.replace(r#"target_color = "orange""#, r#"target_color = "teal""#);
        match RobotConfig::from_toml_str(&text) {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("teal")),
            other => panic!("expected invalid config, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_optional_color() {
        let mut config = RobotConfig::from_toml_str(MINIMAL).expect("valid config");
        config.obstacle_color = Some("black".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut config = RobotConfig::from_toml_str(MINIMAL).expect("valid config");
        config.colors.insert("bad".to_string(), ColorRange::new([10, 0, 200], [20, 255, 100]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_camera_validation() {
        let mut config = RobotConfig::from_toml_str(MINIMAL).expect("valid config");
        config.cameras.push(config.cameras[0].clone());
        assert!(config.validate().unwrap_err().contains("Duplicate"));

        config.cameras.pop();
        config.cameras[0].width = 0;
        assert!(config.validate().is_err());

        config.cameras[0].width = 7681;
        assert!(config.validate().is_err());

        config.cameras.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_search_bounds_checked() {
        let mut config = RobotConfig::from_toml_str(MINIMAL).expect("valid config");
        config.search = SearchConfig { nudge_at: 20, realign_at: 15 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            RobotConfig::from_toml_str("target_color = "),
            Err(ConfigError::Parse(_))
        ));
        let bad_role = MINIMAL.replace(r#"role = "front""#, r#"role = "up""#);
        assert!(matches!(RobotConfig::from_toml_str(&bad_role), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("robot.toml");
        std::fs::write(&path, FULL).expect("write config");
        let config = RobotConfig::load(&path).expect("valid config");
        assert_eq!(config.cameras[1].name, "360");

        let missing = RobotConfig::load(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
