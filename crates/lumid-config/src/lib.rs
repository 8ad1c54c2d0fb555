//! Board configuration for the lumid backlight daemon.
//!
//! The primary format is a TOML file describing which PWM channel and
//! GPIO lines drive the panel. Boards migrated from the old vendor
//! firmware may instead carry a flat `key = value` file, handled by the
//! [`legacy`] module.

pub mod legacy;

use lumid_hal::Polarity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location of the TOML board description.
pub const CONFIG_PATH: &str = "/etc/lumid/board.toml";

/// Location of the flat legacy board description.
pub const LEGACY_CONFIG_PATH: &str = "/etc/lumid/board.conf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// How one board's backlight is wired up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardConfig {
    /// Device name, also used for the runtime control directory.
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub pwm_chip: u32,

    #[serde(default)]
    pub pwm_channel: u32,

    #[serde(default)]
    pub polarity: Polarity,

    /// PWM period in nanoseconds, programmed when the channel does not
    /// already report one. 0 relies on the channel's own period.
    #[serde(default)]
    pub period_ns: u64,

    /// Lowest usable brightness, on the same scale as `max_brightness`.
    #[serde(default)]
    pub lth_brightness: u32,

    #[serde(default = "default_brightness")]
    pub default_brightness: u32,

    #[serde(default = "default_max_brightness")]
    pub max_brightness: u32,

    /// GPIO that powers the panel itself, held high for the device lifetime.
    #[serde(default)]
    pub panel_power_gpio: Option<u32>,

    /// GPIO gating the backlight supply, toggled with the PWM output.
    #[serde(default)]
    pub backlight_enable_gpio: Option<u32>,
}

fn default_name() -> String {
    "backlight".to_string()
}

fn default_brightness() -> u32 {
    128
}

fn default_max_brightness() -> u32 {
    255
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            pwm_chip: 0,
            pwm_channel: 0,
            polarity: Polarity::Normal,
            period_ns: 0,
            lth_brightness: 0,
            default_brightness: default_brightness(),
            max_brightness: default_max_brightness(),
            panel_power_gpio: None,
            backlight_enable_gpio: None,
        }
    }
}

impl BoardConfig {
    /// Load and validate a TOML board description.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the description back out as TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        if self.max_brightness == 0 {
            return Err(ConfigError::Invalid(
                "max_brightness must be at least 1".to_string(),
            ));
        }
        if self.lth_brightness > self.max_brightness {
            return Err(ConfigError::Invalid(format!(
                "lth_brightness {} exceeds max_brightness {}",
                self.lth_brightness, self.max_brightness
            )));
        }
        Ok(())
    }
}

/// Load the board description from the standard paths.
///
/// Tries the TOML file first, then the legacy flat file, and finally
/// falls back to built-in defaults so the daemon always comes up.
pub fn load_default() -> BoardConfig {
    load_with_fallback(Path::new(CONFIG_PATH), Path::new(LEGACY_CONFIG_PATH))
}

pub fn load_with_fallback(primary: &Path, legacy_path: &Path) -> BoardConfig {
    let config = match BoardConfig::load(primary) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => match legacy::parse_file(legacy_path) {
            Ok(config) => {
                tracing::warn!(
                    "no {} found, using legacy description {}",
                    primary.display(),
                    legacy_path.display()
                );
                config
            }
            Err(e) => {
                if !matches!(e, ConfigError::NotFound(_)) {
                    tracing::warn!("failed to read {}: {}", legacy_path.display(), e);
                }
                tracing::warn!("no board description found, using defaults");
                BoardConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!("failed to load {}: {}, using defaults", primary.display(), e);
            BoardConfig::default()
        }
    };

    tracing::info!(
        "board '{}': pwm {}:{} polarity {} period {}ns, lth {}, brightness {}/{}",
        config.name,
        config.pwm_chip,
        config.pwm_channel,
        config.polarity.as_str(),
        config.period_ns,
        config.lth_brightness,
        config.default_brightness,
        config.max_brightness
    );

    config
}
