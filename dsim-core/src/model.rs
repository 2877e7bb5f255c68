//! Flight data model
//!
//! Defines the pose, frame and recording structures shared by the flight
//! controller, the recorder and the race tracker.
//!
//! Coordinate system: Right-handed, world space
//! - X: Right
//! - Y: Up (altitude)
//! - Z: Forward
//!
//! Attitudes are expressed in degrees, rates in degrees per second and
//! timestamps in milliseconds.

use crate::units::{self, round4, round4_array};
use chrono::{DateTime, Utc};
pub use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;
use thiserror::Error;

/// Above this quaternion dot product slerp falls back to normalized lerp
pub const SLERP_LINEAR_THRESHOLD: f32 = 0.9995;

/// Error returned when parsing a named enum value from a string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseKindError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseKindError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// === Vectors and rotations ===

/// 3D vector (meters, meters per second, or a direction)
pub type Vec3 = Vector3<f32>;

/// Unit rotation quaternion
pub type Rotation = UnitQuaternion<f32>;

/// Build a rotation from roll/pitch/yaw in degrees.
///
/// Yaw turns about +Y, pitch about +X and roll about +Z, applied
/// roll first, then pitch, then yaw.
pub fn rotation_from_euler_degrees(angles: AxisTriple<f32>) -> Rotation {
    let yaw = Rotation::from_axis_angle(&Vec3::y_axis(), angles.yaw.to_radians());
    let pitch = Rotation::from_axis_angle(&Vec3::x_axis(), angles.pitch.to_radians());
    let roll = Rotation::from_axis_angle(&Vec3::z_axis(), angles.roll.to_radians());
    yaw * pitch * roll
}

/// Spherical linear interpolation along the shortest arc.
///
/// The end rotation is negated when the two lie in opposite hemispheres.
/// Nearly parallel inputs (dot above [`SLERP_LINEAR_THRESHOLD`]) use a
/// normalized lerp since `sin(theta)` approaches zero there.
pub fn slerp(from: &Rotation, to: &Rotation, t: f32) -> Rotation {
    let a = *from.quaternion();
    let mut b = *to.quaternion();
    let mut dot = a.dot(&b);
    if dot < 0.0 {
        b = -b;
        dot = -dot;
    }

    if dot > SLERP_LINEAR_THRESHOLD {
        return Rotation::new_normalize(a + (b - a) * t);
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta_0 = theta_0.sin();
    let s0 = theta.cos() - dot * theta.sin() / sin_theta_0;
    let s1 = theta.sin() / sin_theta_0;
    Rotation::new_normalize(a * s0 + b * s1)
}

// === Axis grouping ===

/// Rotational axis selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Roll,
    Pitch,
    Yaw,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Roll, Axis::Pitch, Axis::Yaw];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Roll => write!(f, "roll"),
            Axis::Pitch => write!(f, "pitch"),
            Axis::Yaw => write!(f, "yaw"),
        }
    }
}

/// {roll, pitch, yaw} grouping used for rates, angles, gains and outputs
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisTriple<T> {
    pub roll: T,
    pub pitch: T,
    pub yaw: T,
}

impl<T> AxisTriple<T> {
    pub fn new(roll: T, pitch: T, yaw: T) -> Self {
        Self { roll, pitch, yaw }
    }

    pub fn map<U>(self, mut f: impl FnMut(Axis, T) -> U) -> AxisTriple<U> {
        AxisTriple {
            roll: f(Axis::Roll, self.roll),
            pitch: f(Axis::Pitch, self.pitch),
            yaw: f(Axis::Yaw, self.yaw),
        }
    }

    pub fn as_ref(&self) -> AxisTriple<&T> {
        AxisTriple::new(&self.roll, &self.pitch, &self.yaw)
    }
}

impl<T: Copy> AxisTriple<T> {
    pub fn splat(value: T) -> Self {
        Self::new(value, value, value)
    }
}

impl AxisTriple<f32> {
    /// Componentwise linear interpolation (no angle wrapping)
    pub fn lerp(self, other: AxisTriple<f32>, t: f32) -> AxisTriple<f32> {
        self.map(|axis, a| a + (other[axis] - a) * t)
    }
}

impl<T> Index<Axis> for AxisTriple<T> {
    type Output = T;

    fn index(&self, axis: Axis) -> &T {
        match axis {
            Axis::Roll => &self.roll,
            Axis::Pitch => &self.pitch,
            Axis::Yaw => &self.yaw,
        }
    }
}

impl<T> IndexMut<Axis> for AxisTriple<T> {
    fn index_mut(&mut self, axis: Axis) -> &mut T {
        match axis {
            Axis::Roll => &mut self.roll,
            Axis::Pitch => &mut self.pitch,
            Axis::Yaw => &mut self.yaw,
        }
    }
}

// === Frames ===

/// Position plus orientation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    #[serde(with = "units::vec3")]
    pub position: Vec3,
    #[serde(with = "units::rotation")]
    pub rotation: Rotation,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Rotation) -> Self {
        Self { position, rotation }
    }

    /// Blend toward `other`: lerp on position, slerp on rotation
    pub fn interpolate(&self, other: &Pose, t: f32) -> Pose {
        Pose::new(
            self.position.lerp(&other.position, t),
            slerp(&self.rotation, &other.rotation, t),
        )
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(Vec3::zeros(), Rotation::identity())
    }
}

/// Raw pilot stick snapshot (throttle 0..1, axes -1..1)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PilotInput {
    #[serde(serialize_with = "round4")]
    pub throttle: f32,
    #[serde(serialize_with = "round4")]
    pub roll: f32,
    #[serde(serialize_with = "round4")]
    pub pitch: f32,
    #[serde(serialize_with = "round4")]
    pub yaw: f32,
}

impl PilotInput {
    pub fn new(throttle: f32, roll: f32, pitch: f32, yaw: f32) -> Self {
        Self {
            throttle,
            roll,
            pitch,
            yaw,
        }
    }

    /// Stick axes without throttle
    pub fn axes(&self) -> AxisTriple<f32> {
        AxisTriple::new(self.roll, self.pitch, self.yaw)
    }
}

/// One recorded sample of a flight. Timestamp is relative to recording start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightFrame {
    /// Milliseconds since the recording started
    pub timestamp: f64,

    #[serde(flatten)]
    pub pose: Pose,

    /// Per-motor RPM (front-left, front-right, rear-left, rear-right)
    #[serde(rename = "motorRPM", serialize_with = "round4_array")]
    pub motor_rpm: [f32; 4],

    /// World-space velocity (m/s)
    #[serde(with = "units::vec3")]
    pub velocity: Vec3,

    pub input: PilotInput,
}

/// Weather preset tag stored with recordings and selected at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherPreset {
    #[default]
    Clear,
    Cloudy,
    Windy,
    Rainy,
    Stormy,
    Foggy,
}

impl WeatherPreset {
    pub const ALL: [WeatherPreset; 6] = [
        WeatherPreset::Clear,
        WeatherPreset::Cloudy,
        WeatherPreset::Windy,
        WeatherPreset::Rainy,
        WeatherPreset::Stormy,
        WeatherPreset::Foggy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherPreset::Clear => "clear",
            WeatherPreset::Cloudy => "cloudy",
            WeatherPreset::Windy => "windy",
            WeatherPreset::Rainy => "rainy",
            WeatherPreset::Stormy => "stormy",
            WeatherPreset::Foggy => "foggy",
        }
    }
}

impl fmt::Display for WeatherPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeatherPreset {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        WeatherPreset::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| ParseKindError::new("weather preset", s))
    }
}

/// Derived recording metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMetadata {
    pub drone_preset: String,
    pub weather: WeatherPreset,
    #[serde(serialize_with = "round4")]
    pub max_altitude: f32,
    #[serde(serialize_with = "round4")]
    pub max_speed: f32,
}

/// A complete recorded flight session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightRecording {
    pub id: String,
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last frame (ms)
    pub duration: f64,
    pub frame_count: usize,
    pub frames: Vec<FlightFrame>,
    pub metadata: RecordingMetadata,
}

impl FlightRecording {
    /// True when frames are present and their timestamps never decrease
    pub fn is_well_formed(&self) -> bool {
        !self.frames.is_empty()
            && self
                .frames
                .windows(2)
                .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    }
}

/// Lightweight trajectory sample used for best-lap ghosts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GhostFrame {
    /// Milliseconds since the lap started
    pub timestamp: f64,
    #[serde(with = "units::vec3")]
    pub position: Vec3,
    /// Euler attitude in degrees
    pub rotation: AxisTriple<f32>,
}
