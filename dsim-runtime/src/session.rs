//! One flight session
//!
//! Wires a single simulation step together: pilot input and wind feed the
//! flight controller, the airframe integrates the correction, and the new
//! pose goes to the recorder and the race tracker.

use crate::demo::{spawn_position, DemoDrone, DemoPilot};
use crate::profile::{PilotSettings, Progress};
use crate::race::{RaceConfig, RaceEvent, RaceState, RaceTracker};
use crate::recorder::{TrajectoryStore, FRAME_INTERVAL_MS};
use crate::scheduler::{LoopHandler, LoopStats};
use dsim_control::{FlightController, FlightMode, WindModel};
use dsim_core::clock::{Clock, ManualClock};
use dsim_core::model::{FlightRecording, Pose, Vec3, WeatherPreset};
use tracing::{debug, info};

/// Hover point used when no race is running, two meters above spawn
fn idle_target() -> Vec3 {
    spawn_position() + Vec3::new(0.0, 2.0, 0.0)
}

pub struct FlightSession<C: Clock> {
    mode: FlightMode,
    drone_preset: String,
    controller: FlightController,
    wind: WindModel,
    recorder: TrajectoryStore<C>,
    race: RaceTracker,
    drone: DemoDrone,
    pilot: DemoPilot,
    progress: Progress,

    previous_pose: Pose,
    render_pose: Pose,
    sim_seconds: f64,
    updates: u64,
    frames_rendered: u64,
    last_stats: Option<LoopStats>,
}

/// End-of-session results
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub recording: Option<FlightRecording>,
    pub race: RaceState,
    pub sim_seconds: f64,
    pub updates: u64,
    pub frames_rendered: u64,
}

impl<C: Clock> FlightSession<C> {
    pub fn new(settings: &PilotSettings, progress: Progress, clock: C) -> Self {
        let mut controller = FlightController::default();
        controller.set_max_rates(settings.max_rates);
        let pilot = DemoPilot::new(settings.flight_mode, settings.max_rates, controller.max_angle());
        let drone = DemoDrone::default();
        let pose = drone.pose();

        Self {
            mode: settings.flight_mode,
            drone_preset: settings.drone_preset.clone(),
            controller,
            wind: WindModel::new(settings.weather),
            recorder: TrajectoryStore::new(clock),
            race: RaceTracker::new(),
            drone,
            pilot,
            progress,
            previous_pose: pose,
            render_pose: pose,
            sim_seconds: 0.0,
            updates: 0,
            frames_rendered: 0,
            last_stats: None,
        }
    }

    pub fn start_race(&mut self, config: RaceConfig) {
        self.race.start_race(config);
    }

    pub fn start_recording(&mut self) {
        self.recorder.start_recording();
    }

    pub fn set_mode(&mut self, mode: FlightMode) {
        if mode != self.mode {
            info!("Flight mode {} -> {}", self.mode, mode);
            // Integrators built up in one mode don't carry over
            self.controller.reset();
        }
        self.mode = mode;
        self.pilot.set_mode(mode);
    }

    pub fn set_weather(&mut self, weather: WeatherPreset) {
        self.wind.set_preset(weather);
    }

    /// Stop recording and racing and fold the flight into progress
    pub fn finish(&mut self, name: &str) -> SessionSummary {
        let recording = self
            .recorder
            .stop_recording(name, &self.drone_preset, self.wind.preset());
        self.race.stop_race();
        self.progress.add_flight_time(self.sim_seconds);

        SessionSummary {
            recording,
            race: self.race.state(),
            sim_seconds: self.sim_seconds,
            updates: self.updates,
            frames_rendered: self.frames_rendered,
        }
    }

    fn handle_race_events(&mut self, events: Vec<RaceEvent>) {
        let course = match self.race.config() {
            Some(config) => config.name.clone(),
            None => return,
        };
        for event in events {
            match event {
                RaceEvent::CheckpointPassed { .. } => {}
                RaceEvent::LapCompleted { time, .. } => {
                    if self.progress.record_lap(&course, time) {
                        info!("New personal best on '{}': {:.3}s", course, time);
                    }
                }
                RaceEvent::RaceFinished { .. } => self.progress.record_race_completed(),
            }
        }
    }

    pub fn mode(&self) -> FlightMode {
        self.mode
    }

    pub fn drone(&self) -> &DemoDrone {
        &self.drone
    }

    pub fn wind(&self) -> &WindModel {
        &self.wind
    }

    pub fn controller(&self) -> &FlightController {
        &self.controller
    }

    pub fn race(&self) -> &RaceTracker {
        &self.race
    }

    pub fn recorder(&self) -> &TrajectoryStore<C> {
        &self.recorder
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn into_progress(self) -> Progress {
        self.progress
    }

    /// Pose blended between the last two simulation steps
    pub fn render_pose(&self) -> Pose {
        self.render_pose
    }

    pub fn sim_seconds(&self) -> f64 {
        self.sim_seconds
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn last_stats(&self) -> Option<LoopStats> {
        self.last_stats
    }
}

impl<C: Clock> LoopHandler for FlightSession<C> {
    fn update(&mut self, dt: f64) {
        let dt32 = dt as f32;
        let target = self.race.current_target().unwrap_or_else(idle_target);
        let input = self.pilot.input(&self.drone, target);

        self.wind.update(dt32);
        let correction = self.controller.update(
            self.mode,
            input.axes(),
            self.drone.angles(),
            self.drone.rates(),
            dt32,
        );

        self.previous_pose = self.drone.pose();
        self.drone
            .step(correction, input.throttle, self.wind.wind_force(), dt32);

        self.recorder.record_frame(
            self.drone.pose(),
            self.drone.motor_rpm(),
            self.drone.velocity(),
            input,
        );

        let events = self
            .race
            .update(dt, self.drone.position(), self.drone.angles());
        if !events.is_empty() {
            self.handle_race_events(events);
        }

        self.sim_seconds += dt;
        self.updates += 1;
    }

    fn render(&mut self, alpha: f64) {
        let current = self.drone.pose();
        self.render_pose = self.previous_pose.interpolate(&current, alpha as f32);
        self.frames_rendered += 1;
    }

    fn stats(&mut self, stats: LoopStats) {
        debug!(
            "Loop: {:.1} fps, {:.1} ups, last delta {:.2}ms",
            stats.fps, stats.ups, stats.last_delta_ms
        );
        self.last_stats = Some(stats);
    }
}

/// Result of replaying a recording through the playback engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayReport {
    pub samples: usize,
    pub playback_ms: f64,
    pub max_altitude: f32,
    pub path_length: f32,
}

/// Play `recording` once at `speed` against a hand-driven clock, sampling
/// interpolated frames at the recording rate of the playback output.
pub fn replay_once(recording: FlightRecording, speed: f64) -> ReplayReport {
    let clock = ManualClock::new(0.0);
    let mut store = TrajectoryStore::new(clock.clone());
    store.set_looping(false);
    store.set_playback_speed(speed);
    store.load_recording(recording);
    store.start_playback();

    let mut report = ReplayReport {
        samples: 0,
        playback_ms: 0.0,
        max_altitude: f32::NEG_INFINITY,
        path_length: 0.0,
    };
    let mut last_position: Option<Vec3> = None;

    loop {
        let Some(frame) = store.get_interpolated_frame() else {
            break;
        };
        report.samples += 1;
        report.playback_ms = frame.timestamp;
        report.max_altitude = report.max_altitude.max(frame.pose.position.y);
        if let Some(last) = last_position {
            report.path_length += last.metric_distance(&frame.pose.position);
        }
        last_position = Some(frame.pose.position);

        if !store.playback_status().playing {
            break;
        }
        clock.advance(FRAME_INTERVAL_MS);
    }

    report
}
