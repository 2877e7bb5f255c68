//! Runtime configuration
//!
//! Every field has a default so a config file only needs the values it
//! changes. Command-line flags are applied on top by the binary.

use crate::scheduler::SchedulerConfig;
use anyhow::{Context, Result};
use dsim_control::FlightMode;
use dsim_core::model::WeatherPreset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub target_ups: u32,
    pub max_updates_per_tick: u32,
    pub max_frame_delta_ms: f64,
    /// Rate of the render tick source (Hz)
    pub render_hz: u32,
    pub max_recordings: usize,
    /// Fallback tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
    /// Where the file store lives. `None` uses the platform data directory.
    pub storage_dir: Option<PathBuf>,
    pub flight_mode: FlightMode,
    pub weather: WeatherPreset,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            target_ups: 60,
            max_updates_per_tick: 5,
            max_frame_delta_ms: 250.0,
            render_hz: 144,
            max_recordings: 10,
            log_filter: "info".to_string(),
            storage_dir: None,
            flight_mode: FlightMode::Angle,
            weather: WeatherPreset::Clear,
        }
    }
}

impl SimConfig {
    /// Load a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Load `path` if given, otherwise the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            target_ups: self.target_ups,
            max_updates_per_tick: self.max_updates_per_tick,
            max_frame_delta_ms: self.max_frame_delta_ms,
        }
    }

    /// Storage directory, falling back to the platform data directory
    pub fn resolved_storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir
            .clone()
            .or_else(crate::storage::default_storage_dir)
    }
}
