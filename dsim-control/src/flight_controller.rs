//! Multi-axis flight controller
//!
//! Composes one rate controller and one angle controller per axis.
//!
//! - **Acro**: stick deflection maps to a rotation-rate demand tracked by the
//!   rate loop.
//! - **Angle**: stick deflection maps to an attitude demand. The outer angle
//!   loop turns attitude error into a rate demand (bounded by the axis max
//!   rate) which the inner rate loop tracks.
//!
//! Angles are in degrees, rates in degrees per second, and outputs are
//! normalized corrections for the external motor mixer.

use crate::pid::{ControllerConfig, FeedbackController, Gains, PartialGains};
use dsim_core::model::{Axis, AxisTriple, ParseKindError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Default attitude limit in angle mode (degrees)
pub const DEFAULT_MAX_ANGLE: f32 = 55.0;

/// Stabilization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightMode {
    Acro,
    #[default]
    Angle,
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightMode::Acro => write!(f, "acro"),
            FlightMode::Angle => write!(f, "angle"),
        }
    }
}

impl FromStr for FlightMode {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "acro" | "rate" => Ok(FlightMode::Acro),
            "angle" | "level" => Ok(FlightMode::Angle),
            _ => Err(ParseKindError::new("flight mode", s)),
        }
    }
}

/// Tuning for all six controllers plus the demand ceilings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlightControllerConfig {
    pub rate: AxisTriple<ControllerConfig>,
    pub angle: AxisTriple<ControllerConfig>,
    /// Per-axis maximum rotation rate (deg/s)
    pub max_rates: AxisTriple<f32>,
    /// Attitude reached at full stick in angle mode (deg)
    pub max_angle: f32,
}

impl Default for FlightControllerConfig {
    fn default() -> Self {
        let rate_roll_pitch = ControllerConfig::new(Gains::new(0.0045, 0.003, 0.00004))
            .with_output_limit(1.0)
            .with_integral_limit(100.0)
            .with_derivative_filter(0.5);
        let rate_yaw = ControllerConfig::new(Gains::new(0.006, 0.004, 0.0))
            .with_output_limit(1.0)
            .with_integral_limit(100.0)
            .with_derivative_filter(0.5);
        let angle = ControllerConfig::new(Gains::new(4.5, 0.05, 0.0))
            .with_output_limit(2000.0)
            .with_integral_limit(20.0)
            .with_derivative_filter(0.5);

        Self {
            rate: AxisTriple::new(rate_roll_pitch, rate_roll_pitch, rate_yaw),
            angle: AxisTriple::splat(angle),
            max_rates: AxisTriple::new(670.0, 670.0, 400.0),
            max_angle: DEFAULT_MAX_ANGLE,
        }
    }
}

/// Cascaded roll/pitch/yaw stabilizer
#[derive(Debug, Clone)]
pub struct FlightController {
    rate_pids: AxisTriple<FeedbackController>,
    angle_pids: AxisTriple<FeedbackController>,
    max_rates: AxisTriple<f32>,
    max_angle: f32,
}

impl FlightController {
    pub fn new(config: FlightControllerConfig) -> Self {
        Self {
            rate_pids: config.rate.map(|_, c| FeedbackController::new(c)),
            angle_pids: config.angle.map(|_, c| FeedbackController::new(c)),
            max_rates: config.max_rates.map(|_, r| r.abs()),
            max_angle: config.max_angle.abs(),
        }
    }

    /// Rate stabilization: stick position is a rotation-rate demand
    pub fn update_acro_mode(
        &mut self,
        input: AxisTriple<f32>,
        current_rates: AxisTriple<f32>,
        dt: f32,
    ) -> AxisTriple<f32> {
        let mut output = AxisTriple::default();
        for axis in Axis::ALL {
            let rate_setpoint = input[axis].clamp(-1.0, 1.0) * self.max_rates[axis];
            output[axis] = self.rate_pids[axis].update(rate_setpoint, current_rates[axis], dt);
        }
        output
    }

    /// Self-leveling: stick position is an attitude demand
    pub fn update_angle_mode(
        &mut self,
        input: AxisTriple<f32>,
        current_angles: AxisTriple<f32>,
        current_rates: AxisTriple<f32>,
        dt: f32,
    ) -> AxisTriple<f32> {
        let mut output = AxisTriple::default();
        for axis in Axis::ALL {
            let max_rate = self.max_rates[axis];
            let angle_setpoint = input[axis].clamp(-1.0, 1.0) * self.max_angle;
            let desired_rate = self.angle_pids[axis]
                .update(angle_setpoint, current_angles[axis], dt)
                .clamp(-max_rate, max_rate);
            output[axis] = self.rate_pids[axis].update(desired_rate, current_rates[axis], dt);
        }
        output
    }

    /// Run the controller for the given mode
    pub fn update(
        &mut self,
        mode: FlightMode,
        input: AxisTriple<f32>,
        current_angles: AxisTriple<f32>,
        current_rates: AxisTriple<f32>,
        dt: f32,
    ) -> AxisTriple<f32> {
        match mode {
            FlightMode::Acro => self.update_acro_mode(input, current_rates, dt),
            FlightMode::Angle => self.update_angle_mode(input, current_angles, current_rates, dt),
        }
    }

    /// Reset all six controllers
    pub fn reset(&mut self) {
        for axis in Axis::ALL {
            self.rate_pids[axis].reset();
            self.angle_pids[axis].reset();
        }
    }

    pub fn set_rate_pid_gains(&mut self, axis: Axis, gains: PartialGains) {
        self.rate_pids[axis].set_gains(gains);
    }

    pub fn set_attitude_pid_gains(&mut self, axis: Axis, gains: PartialGains) {
        self.angle_pids[axis].set_gains(gains);
    }

    pub fn rate_pid_gains(&self) -> AxisTriple<Gains> {
        self.rate_pids.as_ref().map(|_, pid| pid.gains())
    }

    pub fn attitude_pid_gains(&self) -> AxisTriple<Gains> {
        self.angle_pids.as_ref().map(|_, pid| pid.gains())
    }

    pub fn set_max_rates(&mut self, max_rates: AxisTriple<f32>) {
        debug!(
            "Max rates set to roll {} pitch {} yaw {} deg/s",
            max_rates.roll, max_rates.pitch, max_rates.yaw
        );
        self.max_rates = max_rates.map(|_, r| r.abs());
    }

    pub fn max_rates(&self) -> AxisTriple<f32> {
        self.max_rates
    }

    pub fn set_max_angle(&mut self, max_angle: f32) {
        self.max_angle = max_angle.abs();
    }

    pub fn max_angle(&self) -> f32 {
        self.max_angle
    }
}

impl Default for FlightController {
    fn default() -> Self {
        Self::new(FlightControllerConfig::default())
    }
}
