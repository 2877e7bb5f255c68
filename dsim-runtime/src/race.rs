//! Checkpoint race tracking with best-lap ghosts
//!
//! Checkpoints must be flown in order; only the checkpoint at the current
//! index is ever tested. Lap and total times are in seconds, ghost frame
//! timestamps in milliseconds from the start of the lap.

use dsim_core::model::{AxisTriple, GhostFrame, Vec3};
use dsim_core::units::secs_to_ms;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Radius used by checkpoints that don't set their own (m)
pub const DEFAULT_CHECKPOINT_RADIUS: f32 = 5.0;

/// Ghost frames are captured every Nth update
pub const GHOST_SAMPLE_INTERVAL: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaceCheckpoint {
    #[serde(with = "dsim_core::units::vec3")]
    pub position: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
}

impl RaceCheckpoint {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            radius: None,
        }
    }

    pub fn with_radius(position: Vec3, radius: f32) -> Self {
        Self {
            position,
            radius: Some(radius),
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius.unwrap_or(DEFAULT_CHECKPOINT_RADIUS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceConfig {
    pub name: String,
    pub checkpoints: Vec<RaceCheckpoint>,
    pub laps: u32,
}

impl RaceConfig {
    /// Built-in six gate course around the spawn point
    pub fn default_course() -> Self {
        let gates = [
            (0.0, 3.0, -30.0),
            (25.0, 5.0, -45.0),
            (50.0, 8.0, -25.0),
            (45.0, 4.0, 10.0),
            (20.0, 6.0, 25.0),
            (-5.0, 3.0, 10.0),
        ];
        Self {
            name: "Training Loop".to_string(),
            checkpoints: gates
                .into_iter()
                .map(|(x, y, z)| RaceCheckpoint::new(Vec3::new(x, y, z)))
                .collect(),
            laps: 3,
        }
    }
}

/// Read-only race snapshot for HUDs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceState {
    pub active: bool,
    pub completed: bool,
    pub current_checkpoint: usize,
    /// 1-based lap number
    pub current_lap: u32,
    pub lap_time: f64,
    pub total_time: f64,
    /// Lap time at each checkpoint passed this lap
    pub split_times: Vec<f64>,
    /// `f64::INFINITY` until a lap has been completed
    pub best_lap_time: f64,
    pub best_lap_ghost: Vec<GhostFrame>,
    pub recording: bool,
    /// Per-checkpoint progress for the current lap
    pub passed: Vec<bool>,
}

impl Default for RaceState {
    fn default() -> Self {
        Self {
            active: false,
            completed: false,
            current_checkpoint: 0,
            current_lap: 1,
            lap_time: 0.0,
            total_time: 0.0,
            split_times: Vec::new(),
            best_lap_time: f64::INFINITY,
            best_lap_ghost: Vec::new(),
            recording: false,
            passed: Vec::new(),
        }
    }
}

/// Something that happened during a race update
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RaceEvent {
    CheckpointPassed { lap: u32, index: usize, split: f64 },
    LapCompleted { lap: u32, time: f64, new_best: bool },
    RaceFinished { total_time: f64, best_lap_time: f64 },
}

#[derive(Debug, Default)]
pub struct RaceTracker {
    config: Option<RaceConfig>,
    state: RaceState,
    ghost_buffer: Vec<GhostFrame>,
    tick_count: u32,
}

impl RaceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all race state and begin racing `config`
    pub fn start_race(&mut self, config: RaceConfig) {
        info!(
            "Race '{}' started: {} checkpoints, {} laps",
            config.name,
            config.checkpoints.len(),
            config.laps
        );
        self.state = RaceState {
            active: true,
            recording: true,
            passed: vec![false; config.checkpoints.len()],
            ..RaceState::default()
        };
        self.ghost_buffer.clear();
        self.tick_count = 0;
        self.config = Some(config);
    }

    /// Deactivate without completing
    pub fn stop_race(&mut self) {
        if self.state.active {
            info!("Race stopped on lap {}", self.state.current_lap);
        }
        self.state.active = false;
        self.state.recording = false;
    }

    /// Advance race time by `dt` seconds and test the current checkpoint
    pub fn update(&mut self, dt: f64, position: Vec3, rotation: AxisTriple<f32>) -> Vec<RaceEvent> {
        let mut events = Vec::new();
        let Some(config) = &self.config else {
            return events;
        };
        if !self.state.active || config.checkpoints.is_empty() {
            return events;
        }
        let state = &mut self.state;

        if state.recording {
            if self.tick_count % GHOST_SAMPLE_INTERVAL == 0 {
                self.ghost_buffer.push(GhostFrame {
                    timestamp: secs_to_ms(state.lap_time),
                    position,
                    rotation,
                });
            }
            self.tick_count = self.tick_count.wrapping_add(1);
        }

        let dt = dt.max(0.0);
        state.lap_time += dt;
        state.total_time += dt;

        let index = state.current_checkpoint;
        let Some(checkpoint) = config.checkpoints.get(index) else {
            return events;
        };
        if position.metric_distance(&checkpoint.position) >= checkpoint.radius() {
            return events;
        }

        state.passed[index] = true;
        state.split_times.push(state.lap_time);
        state.current_checkpoint += 1;
        debug!(
            "Checkpoint {} passed on lap {} at {:.2}s",
            index, state.current_lap, state.lap_time
        );
        events.push(RaceEvent::CheckpointPassed {
            lap: state.current_lap,
            index,
            split: state.lap_time,
        });

        if state.current_checkpoint < config.checkpoints.len() {
            return events;
        }

        // Lap complete
        let lap = state.current_lap;
        let lap_time = state.lap_time;
        let new_best = lap_time < state.best_lap_time;
        if new_best {
            state.best_lap_time = lap_time;
            state.best_lap_ghost = std::mem::take(&mut self.ghost_buffer);
        }
        info!(
            "Lap {} completed in {:.3}s{}",
            lap,
            lap_time,
            if new_best { " (best)" } else { "" }
        );
        events.push(RaceEvent::LapCompleted {
            lap,
            time: lap_time,
            new_best,
        });

        if lap >= config.laps.max(1) {
            state.active = false;
            state.recording = false;
            state.completed = true;
            info!(
                "Race finished in {:.3}s, best lap {:.3}s",
                state.total_time, state.best_lap_time
            );
            events.push(RaceEvent::RaceFinished {
                total_time: state.total_time,
                best_lap_time: state.best_lap_time,
            });
        } else {
            state.current_lap += 1;
            state.current_checkpoint = 0;
            state.passed.fill(false);
            state.lap_time = 0.0;
            state.split_times.clear();
            self.ghost_buffer.clear();
            self.tick_count = 0;
        }

        events
    }

    /// Best-lap ghost pose at `time_ms`, looped over the best lap time.
    ///
    /// Euler components are blended independently, so attitudes crossing
    /// +/-180 degrees sweep the long way around.
    pub fn get_ghost_frame(&self, time_ms: f64) -> Option<GhostFrame> {
        let ghost = &self.state.best_lap_ghost;
        if ghost.is_empty() || !self.state.best_lap_time.is_finite() {
            return None;
        }
        let lap_ms = secs_to_ms(self.state.best_lap_time);
        let t = if lap_ms > 0.0 {
            time_ms.rem_euclid(lap_ms)
        } else {
            0.0
        };

        let idx = ghost.partition_point(|f| f.timestamp <= t);
        if idx == 0 {
            return ghost.first().copied();
        }
        if idx >= ghost.len() {
            return ghost.last().copied();
        }

        let a = ghost[idx - 1];
        let b = ghost[idx];
        let span = b.timestamp - a.timestamp;
        let frac = if span > 0.0 {
            ((t - a.timestamp) / span) as f32
        } else {
            0.0
        };
        Some(GhostFrame {
            timestamp: t,
            position: a.position.lerp(&b.position, frac),
            rotation: a.rotation.lerp(b.rotation, frac),
        })
    }

    /// Snapshot of the current race state
    pub fn state(&self) -> RaceState {
        self.state.clone()
    }

    pub fn config(&self) -> Option<&RaceConfig> {
        self.config.as_ref()
    }

    /// Position of the checkpoint to fly next, while racing
    pub fn current_target(&self) -> Option<Vec3> {
        if !self.state.active {
            return None;
        }
        self.config
            .as_ref()?
            .checkpoints
            .get(self.state.current_checkpoint)
            .map(|c| c.position)
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn is_completed(&self) -> bool {
        self.state.completed
    }

    pub fn has_ghost(&self) -> bool {
        !self.state.best_lap_ghost.is_empty()
    }

    pub fn best_lap_time(&self) -> Option<f64> {
        Some(self.state.best_lap_time).filter(|t| t.is_finite())
    }
}
