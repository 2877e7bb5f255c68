//! Pilot settings and progression
//!
//! Plain state containers with explicit load/save against a
//! [`KeyValueStore`]. Missing or unreadable payloads load as defaults.

use dsim_control::FlightMode;
use dsim_core::model::{AxisTriple, WeatherPreset};
use dsim_core::storage::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

pub const SETTINGS_KEY: &str = "dsim.settings";
pub const PROGRESS_KEY: &str = "dsim.progress";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PilotSettings {
    pub flight_mode: FlightMode,
    /// Rate ceilings (deg/s)
    pub max_rates: AxisTriple<f32>,
    pub weather: WeatherPreset,
    pub drone_preset: String,
}

impl Default for PilotSettings {
    fn default() -> Self {
        Self {
            flight_mode: FlightMode::default(),
            max_rates: AxisTriple::new(670.0, 670.0, 400.0),
            weather: WeatherPreset::default(),
            drone_preset: "racer".to_string(),
        }
    }
}

impl PilotSettings {
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        load_or_default(store, SETTINGS_KEY)
    }

    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> bool {
        save_json(store, SETTINGS_KEY, self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Progress {
    /// Best lap (seconds) per course name
    pub best_laps: BTreeMap<String, f64>,
    pub races_completed: u32,
    pub total_flight_seconds: f64,
    pub flights_recorded: u32,
}

impl Progress {
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        load_or_default(store, PROGRESS_KEY)
    }

    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> bool {
        save_json(store, PROGRESS_KEY, self)
    }

    /// Record a lap; returns true if it beat the stored best for `course`
    pub fn record_lap(&mut self, course: &str, seconds: f64) -> bool {
        match self.best_laps.get_mut(course) {
            Some(best) if seconds >= *best => false,
            Some(best) => {
                *best = seconds;
                true
            }
            None => {
                self.best_laps.insert(course.to_string(), seconds);
                true
            }
        }
    }

    pub fn best_lap(&self, course: &str) -> Option<f64> {
        self.best_laps.get(course).copied()
    }

    pub fn record_race_completed(&mut self) {
        self.races_completed += 1;
    }

    pub fn add_flight_time(&mut self, seconds: f64) {
        if seconds > 0.0 {
            self.total_flight_seconds += seconds;
        }
    }

    pub fn record_flight_saved(&mut self) {
        self.flights_recorded += 1;
    }
}

fn load_or_default<T, S>(store: &S, key: &str) -> T
where
    T: DeserializeOwned + Default,
    S: KeyValueStore + ?Sized,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            warn!("Failed to read {}: {}", key, e);
            return T::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("Ignoring corrupted {}: {}", key, e);
        T::default()
    })
}

fn save_json<T, S>(store: &mut S, key: &str, value: &T) -> bool
where
    T: Serialize,
    S: KeyValueStore + ?Sized,
{
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to serialize {}: {}", key, e);
            return false;
        }
    };
    match store.set(key, &raw) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to save {}: {}", key, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsim_core::storage::MemoryStore;

    #[test]
    fn test_missing_payloads_load_defaults() {
        let store = MemoryStore::new();
        assert_eq!(PilotSettings::load(&store), PilotSettings::default());
        assert_eq!(Progress::load(&store), Progress::default());
    }

    #[test]
    fn test_settings_roundtrip() {
        let mut store = MemoryStore::new();
        let settings = PilotSettings {
            flight_mode: FlightMode::Acro,
            max_rates: AxisTriple::new(800.0, 800.0, 500.0),
            weather: WeatherPreset::Foggy,
            drone_preset: "cinewhoop".to_string(),
        };
        assert!(settings.save(&mut store));
        assert_eq!(PilotSettings::load(&store), settings);

        let raw = store.get(SETTINGS_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["flightMode"], "acro");
        assert_eq!(value["weather"], "foggy");
    }

    #[test]
    fn test_partial_payload_fills_defaults() {
        let mut store = MemoryStore::new();
        store.set(SETTINGS_KEY, r#"{"weather":"stormy"}"#).unwrap();
        let settings = PilotSettings::load(&store);
        assert_eq!(settings.weather, WeatherPreset::Stormy);
        assert_eq!(settings.drone_preset, "racer");
    }

    #[test]
    fn test_corrupted_payload_loads_default() {
        let mut store = MemoryStore::new();
        store.set(PROGRESS_KEY, "not json").unwrap();
        assert_eq!(Progress::load(&store), Progress::default());
    }

    #[test]
    fn test_progress_tracks_best_laps() {
        let mut progress = Progress::default();
        assert!(progress.record_lap("Training Loop", 30.0));
        assert!(!progress.record_lap("Training Loop", 31.0));
        assert!(!progress.record_lap("Training Loop", 30.0));
        assert!(progress.record_lap("Training Loop", 28.5));
        assert_eq!(progress.best_lap("Training Loop"), Some(28.5));
        assert_eq!(progress.best_lap("Other"), None);

        progress.add_flight_time(12.5);
        progress.add_flight_time(-3.0);
        progress.record_race_completed();
        progress.record_flight_saved();

        let mut store = MemoryStore::new();
        assert!(progress.save(&mut store));
        let loaded = Progress::load(&store);
        assert_eq!(loaded, progress);
        assert_eq!(loaded.total_flight_seconds, 12.5);
    }

    #[test]
    fn test_failed_save_reports_false() {
        let mut store = MemoryStore::with_quota(8);
        assert!(!Progress::default().save(&mut store));
        assert!(store.is_empty());
    }
}
