//! Bridge configuration
//!
//! Loaded from TOML. Every section has defaults, so a missing file or a
//! missing section still yields a usable configuration. Loading only rejects
//! malformed files; call [`BridgeConfig::validate`] once command line
//! overrides are applied.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::controller::ModeToggleSettings;
use crate::decoder::DiagnosticsSettings;
use crate::device::protocol::TIME_UNIT_MS;
use crate::device::{Color, DetectionCondition, DetectionMode, IndicatorParam, SimulationSettings};

const CONFIG_DIR: &str = "posture-bridge";
const CONFIG_FILE: &str = "config.toml";
const MAX_STATS_INTERVAL_SECS: i64 = 86_400;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    pub connect_timeout_ms: u64,
    /// Mode written right after connecting
    pub initial_mode: DetectionMode,
    pub interval_ms: u64,
    pub condition: DetectionCondition,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            initial_mode: DetectionMode::Euler,
            interval_ms: 100,
            condition: DetectionCondition::ChangeDetection,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct IndicatorConfig {
    pub color: [u8; 3],
    pub duration_ms: u64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            color: [0, 128, 32],
            duration_ms: 0,
        }
    }
}

impl IndicatorConfig {
    pub fn param(&self) -> IndicatorParam {
        IndicatorParam {
            duration_ms: self.duration_ms,
            color: Color::from(self.color),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub frame_rate: u32,
    pub model: PathBuf,
    pub scale: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            model: PathBuf::from("../assets/cube_noconv.fbx"),
            scale: 1.0,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub stats_interval_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: 30,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub link: LinkConfig,
    pub indicator: IndicatorConfig,
    pub render: RenderConfig,
    pub diagnostics: DiagnosticsSettings,
    pub session: SessionConfig,
    pub simulation: SimulationSettings,
}

impl BridgeConfig {
    /// `$XDG_CONFIG_HOME/posture-bridge/config.toml` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Loads `path`, or the default location when `path` is `None`.
    ///
    /// An explicitly given file must exist. A missing file at the default
    /// location falls back to defaults.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => {
                    info!("No config directory available, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
        if !exists && !required {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
        let config = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        info!("Loaded config from {}", path.display());
        debug!("Config: {:?}", config);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.frame_rate == 0 {
            return Err(ConfigError::Invalid(
                "render.frame_rate must be greater than 0".to_string(),
            ));
        }
        if self.render.scale.is_nan() || self.render.scale <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "render.scale must be positive, got {}",
                self.render.scale
            )));
        }
        let max_interval = TIME_UNIT_MS * u8::MAX as u64;
        if self.link.interval_ms < TIME_UNIT_MS || self.link.interval_ms > max_interval {
            return Err(ConfigError::Invalid(format!(
                "link.interval_ms must be within {}..={}, got {}",
                TIME_UNIT_MS, max_interval, self.link.interval_ms
            )));
        }
        if self.link.interval_ms % TIME_UNIT_MS != 0 {
            return Err(ConfigError::Invalid(format!(
                "link.interval_ms must be a multiple of {}, got {}",
                TIME_UNIT_MS, self.link.interval_ms
            )));
        }
        if !(1..=MAX_STATS_INTERVAL_SECS).contains(&self.session.stats_interval_secs) {
            return Err(ConfigError::Invalid(format!(
                "session.stats_interval_secs must be within 1..={}, got {}",
                MAX_STATS_INTERVAL_SECS, self.session.stats_interval_secs
            )));
        }
        Ok(())
    }

    pub fn mode_toggle_settings(&self) -> ModeToggleSettings {
        ModeToggleSettings {
            interval_ms: self.link.interval_ms,
            condition: self.link.condition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::AxisOrder;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn empty_file_yields_defaults() {
        let config = BridgeConfig::parse("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = BridgeConfig::parse(
            r#"
            [link]
            initial_mode = "quaternion"
            condition = "always"

            [diagnostics]
            axis_orders = ["xyz", "ZYX"]

            [simulation]
            button_period_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.link.initial_mode, DetectionMode::Quaternion);
        assert_eq!(config.link.condition, DetectionCondition::Always);
        assert_eq!(config.link.interval_ms, 100);
        assert!(config.diagnostics.enabled);
        assert_eq!(
            config.diagnostics.axis_orders,
            vec![AxisOrder::Xyz, AxisOrder::IntrinsicZyx]
        );
        assert_eq!(config.simulation.button_period_ms, 0);
        assert_eq!(config.simulation.motion_period_ms, 100);
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = BridgeConfig::default();
        config.render.frame_rate = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = BridgeConfig::default();
        config.render.scale = -1.0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.link.interval_ms = 5000;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.link.interval_ms = 105;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.session.stats_interval_secs = 9_223_372_036_854_775;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.session.stats_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn indicator_param_uses_configured_color() {
        let param = IndicatorConfig::default().param();
        assert_eq!(param.color, Color { r: 0, g: 128, b: 32 });
        assert_eq!(param.duration_ms, 0);
    }

    #[tokio::test]
    async fn explicit_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("posture_bridge_missing_config.toml");
        let _ = std::fs::remove_file(&path);
        let result = BridgeConfig::load(Some(&path)).await;
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[tokio::test]
    async fn loads_file_from_disk() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("posture_bridge_config_{suffix}.toml"));
        std::fs::write(&path, "[render]\nframe_rate = 30\nscale = 2.5\n").expect("write");

        let config = BridgeConfig::load(Some(&path)).await.expect("load");
        assert_eq!(config.render.frame_rate, 30);
        assert_eq!(config.render.scale, 2.5);

        // invalid values load fine and are only rejected by validation
        std::fs::write(&path, "[render]\nscale = 0.0\n").expect("write");
        let mut config = BridgeConfig::load(Some(&path)).await.expect("load");
        assert!(config.validate().is_err());
        config.render.scale = 2.0;
        assert!(config.validate().is_ok());

        std::fs::write(&path, "[render\n").expect("write");
        let result = BridgeConfig::load(Some(&path)).await;
        assert!(matches!(result, Err(ConfigError::Parse { .. })));

        std::fs::remove_file(&path).expect("cleanup");
    }
}
