//! Host configuration persistence
//!
//! Stores device choices, startup levels and library locations as
//! `key=value` lines.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub sample_rate: u32,
    /// Input device name, `None` for the host default
    pub input_device: Option<String>,
    /// Output device name, `None` for the host default
    pub output_device: Option<String>,
    pub input_gain: f32,
    pub output_level: f32,
    pub looper_mix: f32,
    /// Folder scanned for cabinet impulse responses
    pub cabinet_ir_dir: Option<PathBuf>,
    /// Preset database, defaults to the data directory
    pub preset_db: Option<PathBuf>,
    /// Preset slot restored at startup
    pub last_preset: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            input_device: None,
            output_device: None,
            input_gain: 0.3,
            output_level: 1.0,
            looper_mix: 1.0,
            cabinet_ir_dir: None,
            preset_db: None,
            last_preset: None,
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "config loaded");
                config
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                }
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn save(&self) -> io::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())
    }

    /// Default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pedal")
            .join("config.txt")
    }

    /// Preset database path, from the config or the data directory
    pub fn preset_db_path(&self) -> PathBuf {
        self.preset_db.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pedal")
                .join("presets.db")
        })
    }

    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            let text = || (!value.is_empty()).then(|| value.to_string());

            match key.trim() {
                "sample_rate" => {
                    if let Ok(sr) = value.parse() {
                        config.sample_rate = sr;
                    }
                }
                "input_device" => config.input_device = text(),
                "output_device" => config.output_device = text(),
                "input_gain" => {
                    if let Ok(v) = value.parse() {
                        config.input_gain = v;
                    }
                }
                "output_level" => {
                    if let Ok(v) = value.parse() {
                        config.output_level = v;
                    }
                }
                "looper_mix" => {
                    if let Ok(v) = value.parse() {
                        config.looper_mix = v;
                    }
                }
                "cabinet_ir_dir" => config.cabinet_ir_dir = text().map(PathBuf::from),
                "preset_db" => config.preset_db = text().map(PathBuf::from),
                "last_preset" => config.last_preset = value.parse().ok(),
                _ => {} // Ignore unknown keys
            }
        }

        config
    }

    fn serialize(&self) -> String {
        let mut lines = vec![
            "# Pedal configuration".to_string(),
            format!("sample_rate={}", self.sample_rate),
            format!("input_gain={}", self.input_gain),
            format!("output_level={}", self.output_level),
            format!("looper_mix={}", self.looper_mix),
        ];

        if let Some(ref name) = self.input_device {
            lines.push(format!("input_device={}", name));
        }
        if let Some(ref name) = self.output_device {
            lines.push(format!("output_device={}", name));
        }
        if let Some(ref dir) = self.cabinet_ir_dir {
            lines.push(format!("cabinet_ir_dir={}", dir.display()));
        }
        if let Some(ref db) = self.preset_db {
            lines.push(format!("preset_db={}", db.display()));
        }
        if let Some(slot) = self.last_preset {
            lines.push(format!("last_preset={}", slot));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let config = Config::parse("");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_values_and_comments() {
        let content = "# levels\ninput_gain=0.5\nsample_rate=44100\n\noutput_device=USB Audio\nlast_preset=3";
        let config = Config::parse(content);
        assert_eq!(config.input_gain, 0.5);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.output_device.as_deref(), Some("USB Audio"));
        assert_eq!(config.last_preset, Some(3));
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = Config::parse("input_gain=loud\nmystery=1\nsample_rate=");
        assert_eq!(config.input_gain, 0.3);
        assert_eq!(config.sample_rate, 48000);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config {
            input_device: Some("Line In".to_string()),
            cabinet_ir_dir: Some(PathBuf::from("/irs")),
            looper_mix: 1.5,
            last_preset: Some(7),
            ..Config::default()
        };
        let parsed = Config::parse(&config.serialize());
        assert_eq!(parsed, config);
    }
}
