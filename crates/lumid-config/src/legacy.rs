//! Parser for the flat board description shipped by the old vendor firmware.
//!
//! The file is a list of `key = value` lines (section headers and `#` or
//! `;` comments are ignored). Every key the mapping needs but cannot find
//! is logged and treated as 0, matching how the firmware behaved. The
//! format carries no maximum brightness, so a floor above the fixed
//! scale is clamped to it.

use crate::{BoardConfig, ConfigError};
use lumid_hal::Polarity;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Read and map a legacy board description.
pub fn parse_file(path: &Path) -> Result<BoardConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(parse_str(&content))
}

/// Map legacy keys onto a [`BoardConfig`].
pub fn parse_str(content: &str) -> BoardConfig {
    let values = scan(content);
    let fetch = |key: &str| -> u32 {
        match values.get(key) {
            Some(v) => *v,
            None => {
                tracing::warn!("legacy config has no {}, using 0", key);
                0
            }
        }
    };

    let freq_hz = fetch("pwm_freq");
    let period_ns = if freq_hz == 0 {
        tracing::warn!("legacy pwm_freq is 0, keeping the channel period");
        0
    } else {
        NSEC_PER_SEC / u64::from(freq_hz)
    };

    let gpio = |raw: u32| if raw == 0 { None } else { Some(raw) };

    let defaults = BoardConfig::default();
    let mut lth_brightness = fetch("lth_brightness");
    if lth_brightness > defaults.max_brightness {
        tracing::warn!(
            "legacy lth_brightness {} above maximum {}, clamping",
            lth_brightness,
            defaults.max_brightness
        );
        lth_brightness = defaults.max_brightness;
    }

    BoardConfig {
        pwm_channel: fetch("pwm_ch"),
        polarity: Polarity::from_raw(fetch("pwm_pol")),
        period_ns,
        lth_brightness,
        default_brightness: fetch("dft_brightness"),
        panel_power_gpio: gpio(fetch("lcd_power")),
        backlight_enable_gpio: gpio(fetch("bl_enable")),
        // the legacy format never described these
        ..defaults
    }
}

fn scan(content: &str) -> HashMap<String, u32> {
    let mut values = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') || line.starts_with('[')
        {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        match parse_number(value) {
            Some(v) => {
                values.insert(key.to_string(), v);
            }
            None => {
                tracing::warn!("legacy config: unparseable value '{}' for {}", value, key);
            }
        }
    }
    values
}

fn parse_number(value: &str) -> Option<u32> {
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}
