//! Single-axis feedback controller
//!
//! PID with a clamped integral accumulator (anti-windup), an exponentially
//! smoothed derivative term and a symmetric output clamp.

use serde::{Deserialize, Serialize};

/// Controller coefficients
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Gains {
    pub p: f32,
    pub i: f32,
    pub d: f32,
}

impl Gains {
    pub fn new(p: f32, i: f32, d: f32) -> Self {
        Self { p, i, d }
    }

    /// Copy of these gains with the provided fields replaced
    pub fn merged(self, update: PartialGains) -> Self {
        Self {
            p: update.p.unwrap_or(self.p),
            i: update.i.unwrap_or(self.i),
            d: update.d.unwrap_or(self.d),
        }
    }
}

/// Partial gain update. `None` fields keep their current value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PartialGains {
    pub p: Option<f32>,
    pub i: Option<f32>,
    pub d: Option<f32>,
}

impl PartialGains {
    pub fn p(value: f32) -> Self {
        Self {
            p: Some(value),
            ..Self::default()
        }
    }

    pub fn i(value: f32) -> Self {
        Self {
            i: Some(value),
            ..Self::default()
        }
    }

    pub fn d(value: f32) -> Self {
        Self {
            d: Some(value),
            ..Self::default()
        }
    }

    pub fn with_p(mut self, value: f32) -> Self {
        self.p = Some(value);
        self
    }

    pub fn with_i(mut self, value: f32) -> Self {
        self.i = Some(value);
        self
    }

    pub fn with_d(mut self, value: f32) -> Self {
        self.d = Some(value);
        self
    }
}

impl From<Gains> for PartialGains {
    fn from(g: Gains) -> Self {
        Self {
            p: Some(g.p),
            i: Some(g.i),
            d: Some(g.d),
        }
    }
}

/// Gains plus limits for one controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub gains: Gains,
    /// Symmetric clamp on the summed output
    pub output_limit: f32,
    /// Symmetric clamp on the raw integral accumulator
    pub integral_limit: f32,
    /// Low-pass coefficient for the derivative (0 = frozen, 1 = unfiltered)
    pub derivative_filter: f32,
}

impl ControllerConfig {
    pub fn new(gains: Gains) -> Self {
        Self {
            gains,
            ..Self::default()
        }
    }

    pub fn with_output_limit(mut self, limit: f32) -> Self {
        self.output_limit = limit.abs();
        self
    }

    pub fn with_integral_limit(mut self, limit: f32) -> Self {
        self.integral_limit = limit.abs();
        self
    }

    pub fn with_derivative_filter(mut self, coefficient: f32) -> Self {
        self.derivative_filter = coefficient.clamp(0.0, 1.0);
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            gains: Gains::default(),
            output_limit: 1.0,      // Normalized output
            integral_limit: 0.5,
            derivative_filter: 0.1,
        }
    }
}

/// Stateful single-axis PID controller
#[derive(Debug, Clone)]
pub struct FeedbackController {
    config: ControllerConfig,

    // State
    integral: f32,
    previous_error: f32,
    filtered_derivative: f32,
}

impl FeedbackController {
    pub fn new(config: ControllerConfig) -> Self {
        // Limits must be non-negative for the symmetric clamps below
        let config = ControllerConfig {
            output_limit: config.output_limit.abs(),
            integral_limit: config.integral_limit.abs(),
            derivative_filter: config.derivative_filter.clamp(0.0, 1.0),
            ..config
        };
        Self {
            config,
            integral: 0.0,
            previous_error: 0.0,
            filtered_derivative: 0.0,
        }
    }

    /// Compute the control output for one step.
    ///
    /// A non-positive `dt` returns 0 and leaves the controller state untouched.
    pub fn update(&mut self, setpoint: f32, measured: f32, dt: f32) -> f32 {
        if dt <= 0.0 {
            return 0.0;
        }

        let ControllerConfig {
            gains,
            output_limit,
            integral_limit,
            derivative_filter,
        } = self.config;

        let error = setpoint - measured;

        let p_term = gains.p * error;

        self.integral = (self.integral + error * dt).clamp(-integral_limit, integral_limit);
        let i_term = gains.i * self.integral;

        let raw_derivative = (error - self.previous_error) / dt;
        self.filtered_derivative += derivative_filter * (raw_derivative - self.filtered_derivative);
        let d_term = gains.d * self.filtered_derivative;

        self.previous_error = error;

        (p_term + i_term + d_term).clamp(-output_limit, output_limit)
    }

    /// Zero the integral, previous error and filtered derivative
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
        self.filtered_derivative = 0.0;
    }

    pub fn set_gains(&mut self, update: PartialGains) {
        self.config.gains = self.config.gains.merged(update);
    }

    pub fn gains(&self) -> Gains {
        self.config.gains
    }

    pub fn config(&self) -> ControllerConfig {
        self.config
    }

    /// Current raw integral accumulator
    pub fn integral(&self) -> f32 {
        self.integral
    }
}

impl Default for FeedbackController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}
