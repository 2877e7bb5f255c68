//! Closed-loop tests for the flight controller against a toy airframe

use dsim_control::{FlightController, FlightMode, PartialGains, WindModel};
use dsim_core::model::{Axis, AxisTriple, WeatherPreset};

const DT: f32 = 1.0 / 60.0;

/// Angular acceleration (deg/s^2) produced by a full-scale correction
const AUTHORITY: f32 = 4000.0;

/// Minimal rigid airframe: outputs drive angular acceleration, with drag
struct ToyAirframe {
    angles: AxisTriple<f32>,
    rates: AxisTriple<f32>,
}

impl ToyAirframe {
    fn new(angles: AxisTriple<f32>, rates: AxisTriple<f32>) -> Self {
        Self { angles, rates }
    }

    fn step(&mut self, output: AxisTriple<f32>) {
        for axis in Axis::ALL {
            let accel = output[axis] * AUTHORITY - self.rates[axis] * 2.0;
            self.rates[axis] += accel * DT;
            self.angles[axis] += self.rates[axis] * DT;
        }
    }
}

fn run(fc: &mut FlightController, frame: &mut ToyAirframe, mode: FlightMode, input: AxisTriple<f32>, ticks: usize) {
    for _ in 0..ticks {
        let out = fc.update(mode, input, frame.angles, frame.rates, DT);
        frame.step(out);
    }
}

#[test]
fn test_acro_damps_spin_to_zero() {
    let mut fc = FlightController::default();
    let mut frame = ToyAirframe::new(AxisTriple::splat(0.0), AxisTriple::new(300.0, -200.0, 150.0));

    run(&mut fc, &mut frame, FlightMode::Acro, AxisTriple::splat(0.0), 180);

    for axis in Axis::ALL {
        assert!(
            frame.rates[axis].abs() < 10.0,
            "{} rate should settle near zero, got {}",
            axis,
            frame.rates[axis]
        );
    }
}

#[test]
fn test_acro_tracks_rate_demand() {
    let mut fc = FlightController::default();
    fc.set_max_rates(AxisTriple::new(400.0, 400.0, 200.0));
    let mut frame = ToyAirframe::new(AxisTriple::splat(0.0), AxisTriple::splat(0.0));

    run(&mut fc, &mut frame, FlightMode::Acro, AxisTriple::new(0.5, 0.0, 0.0), 240);

    assert!(
        (frame.rates.roll - 200.0).abs() < 20.0,
        "roll rate should approach 200 deg/s, got {}",
        frame.rates.roll
    );
}

#[test]
fn test_angle_mode_self_levels() {
    let mut fc = FlightController::default();
    let mut frame = ToyAirframe::new(AxisTriple::new(30.0, -20.0, 0.0), AxisTriple::splat(0.0));

    run(&mut fc, &mut frame, FlightMode::Angle, AxisTriple::splat(0.0), 300);

    assert!(frame.angles.roll.abs() < 3.0, "roll {}", frame.angles.roll);
    assert!(frame.angles.pitch.abs() < 3.0, "pitch {}", frame.angles.pitch);
}

#[test]
fn test_angle_mode_holds_commanded_tilt() {
    let mut fc = FlightController::default();
    let mut frame = ToyAirframe::new(AxisTriple::splat(0.0), AxisTriple::splat(0.0));

    // Half stick => half of the 55 degree limit
    run(&mut fc, &mut frame, FlightMode::Angle, AxisTriple::new(0.0, 0.5, 0.0), 400);

    assert!(
        (frame.angles.pitch - 27.5).abs() < 3.0,
        "pitch should hold near 27.5, got {}",
        frame.angles.pitch
    );
}

#[test]
fn test_retuned_controller_still_converges() {
    let mut fc = FlightController::default();
    for axis in Axis::ALL {
        fc.set_rate_pid_gains(axis, PartialGains::p(0.006));
    }
    let mut frame = ToyAirframe::new(AxisTriple::splat(0.0), AxisTriple::new(250.0, 0.0, 0.0));
    run(&mut fc, &mut frame, FlightMode::Acro, AxisTriple::splat(0.0), 180);
    assert!(frame.rates.roll.abs() < 10.0);
}

#[test]
fn test_wind_force_is_finite_through_storm_transition() {
    let mut wind = WindModel::new(WeatherPreset::Clear);
    wind.set_preset(WeatherPreset::Stormy);
    for _ in 0..3600 {
        wind.update(DT);
        let force = wind.wind_force();
        assert!(force.x.is_finite() && force.y.is_finite() && force.z.is_finite());
    }
    assert_eq!(wind.state().preset, WeatherPreset::Stormy);
}

#[test]
fn test_controller_config_serializes() {
    let config = dsim_control::FlightControllerConfig::default();
    let json = serde_json::to_string(&config).expect("config should serialize");
    let back: dsim_control::FlightControllerConfig =
        serde_json::from_str(&json).expect("config should deserialize");
    assert_eq!(back, config);
}
