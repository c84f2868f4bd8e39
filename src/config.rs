//! Engine configuration and config/data file locations.
//!
//! `EngineConfig` is the knob set the engine consumes (content size, timeline
//! length, gap tolerance, history depth ...). It lives as JSON in the config
//! directory; missing fields fall back to defaults, bad values are clamped by
//! `validated()`.
//!
//! Directory priority:
//! 1. CLI `--config-dir`
//! 2. `CELPAINT_CONFIG_DIR` environment variable
//! 3. Current folder IF a celpaint config/log file exists there
//! 4. Platform directory from dirs-next (`~/.config/celpaint`, ...)

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::core::history::HISTORY_CAPACITY;
use crate::entities::ColorKey;

/// Config file name inside the config directory.
pub const CONFIG_FILE: &str = "celpaint.json";
/// Default log file name inside the data directory.
pub const LOG_FILE: &str = "celpaint.log";

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Canvas width in pixels (fixed once per project).
    pub content_width: usize,
    /// Canvas height in pixels (fixed once per project).
    pub content_height: usize,
    /// Timeline length in frames.
    pub total_frames: usize,
    /// Line gap tolerance radius for morphological closing (0 = exact).
    pub gap_px: u32,
    /// Undo depth.
    pub history_capacity: usize,
    /// Alpha used when a held frame is displayed.
    pub held_frame_alpha: f32,
    /// Color of the "flood the whole cel" command.
    pub whole_cel_color: ColorKey,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            content_width: 1920,
            content_height: 1080,
            total_frames: 24,
            gap_px: 2,
            history_capacity: HISTORY_CAPACITY,
            held_frame_alpha: 1.0,
            whole_cel_color: ColorKey::WHITE,
        }
    }
}

impl EngineConfig {
    /// Clamp everything into a usable range.
    pub fn validated(mut self) -> Self {
        self.content_width = self.content_width.max(1);
        self.content_height = self.content_height.max(1);
        self.total_frames = self.total_frames.max(1);
        self.history_capacity = self.history_capacity.max(1);
        self.held_frame_alpha = if self.held_frame_alpha.is_finite() {
            self.held_frame_alpha.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config.validated())
    }

    /// Load `path` if it exists, defaults otherwise. A broken file is logged
    /// and replaced by defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded config: {}", path.display());
                config
            }
            Err(e) => {
                warn!("{:#}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("Failed to write config: {}", path.display()))
    }
}

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (CELPAINT_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var("CELPAINT_CONFIG_DIR").ok().map(PathBuf::from));
        Self { config_dir }
    }
}

/// Path to a configuration file.
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

/// Path to a data file (logs, scratch output).
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    get_data_dir(config).join(name)
}

/// Create config and data directories if missing.
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_config_dir(config);
    let data_dir = get_data_dir(config);

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    }
    if data_dir != config_dir && !data_dir.exists() {
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    }
    Ok(())
}

fn has_local_config_files(dir: &Path) -> bool {
    [CONFIG_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

fn local_dir() -> Option<PathBuf> {
    std::env::current_dir().ok().filter(|d| has_local_config_files(d))
}

fn get_config_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Some(dir) = local_dir() {
        return dir;
    }
    dirs_next::config_dir()
        .map(|d| d.join("celpaint"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn get_data_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Some(dir) = local_dir() {
        return dir;
    }
    dirs_next::data_dir()
        .map(|d| d.join("celpaint"))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };
        assert_eq!(config_file("test.json", &config), PathBuf::from("/custom/test.json"));
        assert_eq!(data_file(LOG_FILE, &config), PathBuf::from("/custom/celpaint.log"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r##"{"gap_px": 5, "whole_cel_color": "#0f0"}"##).unwrap();
        assert_eq!(config.gap_px, 5);
        assert_eq!(config.whole_cel_color, ColorKey::new(0, 255, 0));
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.total_frames, 24);
    }

    #[test]
    fn test_validated_clamps() {
        let config = EngineConfig {
            content_width: 0,
            total_frames: 0,
            history_capacity: 0,
            held_frame_alpha: f32::NAN,
            ..EngineConfig::default()
        }
        .validated();
        assert_eq!(config.content_width, 1);
        assert_eq!(config.total_frames, 1);
        assert_eq!(config.history_capacity, 1);
        assert_eq!(config.held_frame_alpha, 1.0);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("celpaint_cfg_{}", std::process::id()));
        let paths = PathConfig {
            config_dir: Some(dir.clone()),
        };
        ensure_dirs(&paths).unwrap();
        let path = config_file(CONFIG_FILE, &paths);

        let config = EngineConfig {
            content_width: 64,
            content_height: 32,
            gap_px: 0,
            ..EngineConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);

        fs::write(&path, "{ not json").unwrap();
        assert!(EngineConfig::load(&path).is_err());
        assert_eq!(EngineConfig::load_or_default(&path), EngineConfig::default());

        let _ = fs::remove_dir_all(&dir);
    }
}
