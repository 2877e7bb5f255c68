//! Wind and ambient weather model
//!
//! Produces a time-varying wind force plus ambient parameters (fog, rain,
//! time of day). Changing preset eases the current values toward the new
//! targets instead of jumping; gusts ride on top of the base wind speed.

use dsim_core::model::{Vec3, WeatherPreset};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use tracing::{debug, info};

/// Exponential approach rate toward preset targets (1/s)
pub const TRANSITION_RATE: f32 = 0.5;

/// Newtons of force per m/s of wind
pub const WIND_FORCE_PER_MPS: f32 = 0.12;

/// Target values a preset eases toward
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetParams {
    pub wind_speed: f32,
    pub gust_strength: f32,
    pub gust_frequency: f32,
    pub fog_density: f32,
    pub rain_intensity: f32,
}

pub fn preset_params(preset: WeatherPreset) -> PresetParams {
    match preset {
        WeatherPreset::Clear => PresetParams {
            wind_speed: 1.0,
            gust_strength: 0.5,
            gust_frequency: 0.1,
            fog_density: 0.0,
            rain_intensity: 0.0,
        },
        WeatherPreset::Cloudy => PresetParams {
            wind_speed: 3.0,
            gust_strength: 1.0,
            gust_frequency: 0.15,
            fog_density: 0.05,
            rain_intensity: 0.0,
        },
        WeatherPreset::Windy => PresetParams {
            wind_speed: 8.0,
            gust_strength: 4.0,
            gust_frequency: 0.3,
            fog_density: 0.0,
            rain_intensity: 0.0,
        },
        WeatherPreset::Rainy => PresetParams {
            wind_speed: 4.0,
            gust_strength: 2.0,
            gust_frequency: 0.2,
            fog_density: 0.15,
            rain_intensity: 0.6,
        },
        WeatherPreset::Stormy => PresetParams {
            wind_speed: 12.0,
            gust_strength: 8.0,
            gust_frequency: 0.5,
            fog_density: 0.25,
            rain_intensity: 1.0,
        },
        WeatherPreset::Foggy => PresetParams {
            wind_speed: 0.5,
            gust_strength: 0.2,
            gust_frequency: 0.05,
            fog_density: 0.8,
            rain_intensity: 0.0,
        },
    }
}

/// Read-only weather snapshot for renderers and physics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherState {
    /// Unit vector the wind blows toward
    #[serde(with = "dsim_core::units::vec3")]
    pub wind_direction: Vec3,
    /// Base wind speed (m/s)
    pub wind_speed: f32,
    /// Instantaneous gust addition (m/s, never negative)
    pub gust: f32,
    pub gust_strength: f32,
    /// Gust cycles per second
    pub gust_frequency: f32,
    pub fog_density: f32,
    pub rain_intensity: f32,
    /// Hours in [0, 24)
    pub time_of_day: f32,
    pub preset: WeatherPreset,
}

impl WeatherState {
    fn from_preset(preset: WeatherPreset) -> Self {
        let p = preset_params(preset);
        Self {
            wind_direction: Vec3::x(),
            wind_speed: p.wind_speed,
            gust: 0.0,
            gust_strength: p.gust_strength,
            gust_frequency: p.gust_frequency,
            fog_density: p.fog_density,
            rain_intensity: p.rain_intensity,
            time_of_day: 12.0,
            preset,
        }
    }
}

pub struct WindModel {
    state: WeatherState,
    target: PresetParams,
    elapsed: f32,
    /// Hours advanced per simulated second
    day_cycle_rate: f32,
}

impl WindModel {
    pub fn new(preset: WeatherPreset) -> Self {
        Self {
            state: WeatherState::from_preset(preset),
            target: preset_params(preset),
            elapsed: 0.0,
            day_cycle_rate: 0.0,
        }
    }

    /// Advance the model by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.elapsed += dt;

        let k = 1.0 - (-TRANSITION_RATE * dt).exp();
        let s = &mut self.state;
        s.wind_speed = lerp(s.wind_speed, self.target.wind_speed, k);
        s.gust_strength = lerp(s.gust_strength, self.target.gust_strength, k);
        s.gust_frequency = lerp(s.gust_frequency, self.target.gust_frequency, k);
        s.fog_density = lerp(s.fog_density, self.target.fog_density, k);
        s.rain_intensity = lerp(s.rain_intensity, self.target.rain_intensity, k);

        // Two incommensurate sinusoids so gusts don't repeat on a short period
        let phase = self.elapsed * s.gust_frequency * TAU;
        let envelope = 0.5 + 0.5 * phase.sin();
        let flutter = 0.7 + 0.3 * (phase * 2.3 + 1.1).sin();
        s.gust = (s.gust_strength * envelope * flutter).max(0.0);

        if self.day_cycle_rate != 0.0 {
            s.time_of_day = wrap_hours(s.time_of_day + self.day_cycle_rate * dt);
        }
    }

    /// Wind force vector for the physics collaborator
    pub fn wind_force(&self) -> Vec3 {
        self.state.wind_direction * ((self.state.wind_speed + self.state.gust) * WIND_FORCE_PER_MPS)
    }

    pub fn state(&self) -> WeatherState {
        self.state
    }

    pub fn preset(&self) -> WeatherPreset {
        self.state.preset
    }

    /// Begin easing toward a new preset
    pub fn set_preset(&mut self, preset: WeatherPreset) {
        if preset != self.state.preset {
            info!("Weather changing from {} to {}", self.state.preset, preset);
        }
        self.state.preset = preset;
        self.target = preset_params(preset);
    }

    pub fn set_time_of_day(&mut self, hours: f32) {
        self.state.time_of_day = wrap_hours(hours);
    }

    /// Set the direction the wind blows toward. Zero vectors are ignored.
    pub fn set_wind_direction(&mut self, direction: Vec3) {
        match direction.try_normalize(f32::EPSILON) {
            Some(dir) => self.state.wind_direction = dir,
            None => debug!("Ignoring zero wind direction"),
        }
    }

    pub fn set_day_cycle_rate(&mut self, hours_per_second: f32) {
        self.day_cycle_rate = hours_per_second;
    }
}

impl Default for WindModel {
    fn default() -> Self {
        Self::new(WeatherPreset::default())
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn wrap_hours(hours: f32) -> f32 {
    hours.rem_euclid(24.0)
}
