//! Demo airframe and autopilot for headless runs
//!
//! `DemoDrone` is a kinematic stand-in for the physics collaborator:
//! corrections drive angular acceleration, collective thrust acts along the
//! body up axis, and wind arrives as an external force. `DemoPilot` produces
//! stick input that flies toward a target point, so a session can run a race
//! course without a human on the sticks.

use dsim_control::FlightMode;
use dsim_core::model::{rotation_from_euler_degrees, Axis, AxisTriple, PilotInput, Pose, Rotation, Vec3};

// =============================================================================
// Airframe constants
// =============================================================================

const GRAVITY: f32 = 9.81;
/// Full-throttle acceleration (m/s^2), two g
const MAX_THRUST_ACCEL: f32 = 2.0 * GRAVITY;
const MASS_KG: f32 = 0.8;
const LINEAR_DRAG: f32 = 0.3;
/// Angular acceleration from a full-scale correction (deg/s^2)
const ANGULAR_AUTHORITY: f32 = 4000.0;
const ANGULAR_DRAG: f32 = 2.0;
const MAX_RPM: f32 = 24000.0;
const IDLE_RPM: f32 = 2000.0;
/// Tilt is held short of inverted so the kinematic model stays meaningful
const MAX_TILT_DEG: f32 = 80.0;

/// Where sessions spawn the drone
pub fn spawn_position() -> Vec3 {
    Vec3::new(0.0, 1.0, 0.0)
}

/// Throttle that balances gravity when level
pub const HOVER_THROTTLE: f32 = GRAVITY / MAX_THRUST_ACCEL;

// =============================================================================
// Airframe
// =============================================================================

#[derive(Debug, Clone)]
pub struct DemoDrone {
    position: Vec3,
    velocity: Vec3,
    /// Euler attitude (deg)
    angles: AxisTriple<f32>,
    /// Body rates (deg/s)
    rates: AxisTriple<f32>,
    motor_rpm: [f32; 4],
}

impl DemoDrone {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::zeros(),
            angles: AxisTriple::default(),
            rates: AxisTriple::default(),
            motor_rpm: [IDLE_RPM; 4],
        }
    }

    /// Integrate one step of `dt` seconds
    pub fn step(&mut self, correction: AxisTriple<f32>, throttle: f32, wind_force: Vec3, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        for axis in Axis::ALL {
            let accel = correction[axis] * ANGULAR_AUTHORITY - self.rates[axis] * ANGULAR_DRAG;
            self.rates[axis] += accel * dt;
            self.angles[axis] += self.rates[axis] * dt;
        }
        for axis in [Axis::Roll, Axis::Pitch] {
            if self.angles[axis].abs() > MAX_TILT_DEG {
                self.angles[axis] = self.angles[axis].clamp(-MAX_TILT_DEG, MAX_TILT_DEG);
                self.rates[axis] = 0.0;
            }
        }
        self.angles.yaw = wrap_degrees(self.angles.yaw);

        let throttle = throttle.clamp(0.0, 1.0);
        let up = self.rotation() * Vec3::y();
        let accel = up * (throttle * MAX_THRUST_ACCEL) + wind_force / MASS_KG
            - self.velocity * LINEAR_DRAG
            - Vec3::new(0.0, GRAVITY, 0.0);
        self.velocity += accel * dt;
        self.position += self.velocity * dt;

        // Ground contact
        if self.position.y < 0.0 {
            self.position.y = 0.0;
            self.velocity.y = self.velocity.y.max(0.0);
        }

        self.motor_rpm = mix(throttle, correction);
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn angles(&self) -> AxisTriple<f32> {
        self.angles
    }

    pub fn rates(&self) -> AxisTriple<f32> {
        self.rates
    }

    pub fn rotation(&self) -> Rotation {
        rotation_from_euler_degrees(self.angles)
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation())
    }

    pub fn motor_rpm(&self) -> [f32; 4] {
        self.motor_rpm
    }
}

impl Default for DemoDrone {
    fn default() -> Self {
        Self::new(spawn_position())
    }
}

/// Quad-X mixer: front-left, front-right, rear-left, rear-right
fn mix(throttle: f32, c: AxisTriple<f32>) -> [f32; 4] {
    let signs = [(1.0, 1.0, -1.0), (-1.0, 1.0, 1.0), (1.0, -1.0, 1.0), (-1.0, -1.0, -1.0)];
    signs.map(|(r, p, y)| {
        let level = (throttle + 0.25 * (r * c.roll + p * c.pitch + y * c.yaw)).clamp(0.0, 1.0);
        IDLE_RPM + level * (MAX_RPM - IDLE_RPM)
    })
}

fn wrap_degrees(deg: f32) -> f32 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}

// =============================================================================
// Autopilot
// =============================================================================

/// Horizontal position gain (m/s^2 per m)
const KP_HORIZONTAL: f32 = 0.8;
const KD_HORIZONTAL: f32 = 1.4;
/// Altitude gains in throttle units
const KP_ALTITUDE: f32 = 0.15;
const KD_ALTITUDE: f32 = 0.3;
const MAX_COMMAND_TILT_DEG: f32 = 25.0;
/// Acro mode: rate demand per degree of attitude error (1/s)
const ACRO_ATTITUDE_GAIN: f32 = 4.0;

/// Scripted pilot that steers the drone toward a target point
#[derive(Debug, Clone, Copy)]
pub struct DemoPilot {
    mode: FlightMode,
    max_rates: AxisTriple<f32>,
    max_angle: f32,
}

impl DemoPilot {
    pub fn new(mode: FlightMode, max_rates: AxisTriple<f32>, max_angle: f32) -> Self {
        Self {
            mode,
            max_rates,
            max_angle,
        }
    }

    pub fn set_mode(&mut self, mode: FlightMode) {
        self.mode = mode;
    }

    /// Stick input that flies `drone` toward `target`
    pub fn input(&self, drone: &DemoDrone, target: Vec3) -> PilotInput {
        let pos = drone.position();
        let vel = drone.velocity();

        // Desired horizontal acceleration, limited to what the tilt cap allows
        let mut ax = KP_HORIZONTAL * (target.x - pos.x) - KD_HORIZONTAL * vel.x;
        let mut az = KP_HORIZONTAL * (target.z - pos.z) - KD_HORIZONTAL * vel.z;
        let limit = GRAVITY * MAX_COMMAND_TILT_DEG.to_radians().tan();
        let magnitude = ax.hypot(az);
        if magnitude > limit {
            ax *= limit / magnitude;
            az *= limit / magnitude;
        }

        // Positive roll tips thrust toward -X, positive pitch toward +Z
        let desired = AxisTriple::new(
            -(ax / GRAVITY).clamp(-1.0, 1.0).asin().to_degrees(),
            (az / GRAVITY).clamp(-1.0, 1.0).asin().to_degrees(),
            0.0,
        );

        let angles = drone.angles();
        let tilt = angles.roll.to_radians().cos() * angles.pitch.to_radians().cos();
        let throttle = (HOVER_THROTTLE + KP_ALTITUDE * (target.y - pos.y) - KD_ALTITUDE * vel.y)
            / tilt.max(0.5);

        let sticks = match self.mode {
            FlightMode::Angle => desired.map(|_, deg| deg / self.max_angle),
            FlightMode::Acro => desired.map(|axis, deg| {
                ACRO_ATTITUDE_GAIN * (deg - angles[axis]) / self.max_rates[axis]
            }),
        }
        .map(|_, v| v.clamp(-1.0, 1.0));

        PilotInput::new(throttle.clamp(0.0, 1.0), sticks.roll, sticks.pitch, sticks.yaw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_hover_throttle_holds_altitude() {
        let mut drone = DemoDrone::default();
        for _ in 0..120 {
            drone.step(AxisTriple::default(), HOVER_THROTTLE, Vec3::zeros(), DT);
        }
        assert!((drone.position().y - spawn_position().y).abs() < 1e-3);
        assert!(drone.velocity().norm() < 1e-3);
    }

    #[test]
    fn test_drone_rests_on_ground() {
        let mut drone = DemoDrone::new(Vec3::new(0.0, 0.5, 0.0));
        for _ in 0..300 {
            drone.step(AxisTriple::default(), 0.0, Vec3::zeros(), DT);
        }
        assert_eq!(drone.position().y, 0.0);
        assert!(drone.velocity().y >= 0.0);
        assert_eq!(drone.motor_rpm(), [IDLE_RPM; 4]);
    }

    #[test]
    fn test_positive_roll_drifts_toward_negative_x() {
        let mut drone = DemoDrone::default();
        drone.step(AxisTriple::new(0.05, 0.0, 0.0), HOVER_THROTTLE, Vec3::zeros(), DT);
        for _ in 0..60 {
            drone.step(AxisTriple::default(), HOVER_THROTTLE, Vec3::zeros(), DT);
        }
        assert!(drone.angles().roll > 0.0);
        assert!(drone.position().x < 0.0);
    }

    #[test]
    fn test_wind_pushes_drone() {
        let mut drone = DemoDrone::default();
        for _ in 0..60 {
            drone.step(AxisTriple::default(), HOVER_THROTTLE, Vec3::new(0.0, 0.0, 1.0), DT);
        }
        assert!(drone.position().z > 0.0);
    }

    #[test]
    fn test_yaw_wraps() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(45.0), 45.0);
    }

    #[test]
    fn test_pilot_leans_toward_target() {
        let drone = DemoDrone::default();
        let pilot = DemoPilot::new(FlightMode::Angle, AxisTriple::new(670.0, 670.0, 400.0), 55.0);

        let input = pilot.input(&drone, Vec3::new(20.0, 1.0, 0.0));
        assert!(input.roll < 0.0, "target at +X needs negative roll");
        assert!(input.pitch.abs() < 1e-6);

        let input = pilot.input(&drone, Vec3::new(0.0, 1.0, 20.0));
        assert!(input.pitch > 0.0);

        let input = pilot.input(&drone, Vec3::new(0.0, 10.0, 0.0));
        assert!(input.throttle > HOVER_THROTTLE);
        assert_eq!(input.yaw, 0.0);
    }

    #[test]
    fn test_mixer_splits_roll_across_sides() {
        let rpm = mix(0.5, AxisTriple::new(0.4, 0.0, 0.0));
        assert!(rpm[0] > rpm[1]);
        assert!(rpm[2] > rpm[3]);
        assert_eq!(rpm[0], rpm[2]);
    }
}
