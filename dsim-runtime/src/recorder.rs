//! Flight recording and playback engine
//!
//! Captures pose samples at a fixed rate while recording, and plays a loaded
//! [`FlightRecording`] back against the injected clock with play/pause/seek/speed
//! control. Lookups binary-search the frame timestamps.

use chrono::Utc;
use dsim_core::clock::Clock;
use dsim_core::units::ms_to_secs;
use dsim_core::model::{
    FlightFrame, FlightRecording, PilotInput, Pose, RecordingMetadata, Vec3, WeatherPreset,
};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{debug, info};

/// Minimum spacing between accepted samples (60 Hz)
pub const FRAME_INTERVAL_MS: f64 = 1000.0 / 60.0;

pub const MIN_PLAYBACK_SPEED: f64 = 0.25;
pub const MAX_PLAYBACK_SPEED: f64 = 4.0;

/// Serializable playback snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackStatus {
    pub loaded: bool,
    pub playing: bool,
    pub time_ms: f64,
    pub duration_ms: f64,
    pub speed: f64,
    pub looping: bool,
}

pub struct TrajectoryStore<C: Clock> {
    clock: C,

    // Recording
    recording: bool,
    frames: Vec<FlightFrame>,
    record_start: f64,
    last_sample: Option<f64>,

    // Playback
    loaded: Option<FlightRecording>,
    playing: bool,
    playback_time: f64,
    /// Clock time at which playback position 0 would have been shown
    playback_anchor: f64,
    playback_speed: f64,
    looping: bool,
}

impl<C: Clock> TrajectoryStore<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            recording: false,
            frames: Vec::new(),
            record_start: 0.0,
            last_sample: None,
            loaded: None,
            playing: false,
            playback_time: 0.0,
            playback_anchor: 0.0,
            playback_speed: 1.0,
            looping: true,
        }
    }

    // === Recording ===

    /// Clear the frame buffer and begin capturing
    pub fn start_recording(&mut self) {
        self.frames.clear();
        self.record_start = self.clock.now_ms();
        self.last_sample = None;
        self.recording = true;
        info!("Recording started");
    }

    /// Capture one sample. Returns false when not recording or when the
    /// previous sample is less than one frame interval old.
    pub fn record_frame(
        &mut self,
        pose: Pose,
        motor_rpm: [f32; 4],
        velocity: Vec3,
        input: PilotInput,
    ) -> bool {
        if !self.recording {
            return false;
        }

        let now = self.clock.now_ms();
        if let Some(last) = self.last_sample {
            if now - last < FRAME_INTERVAL_MS {
                return false;
            }
        }
        self.last_sample = Some(now);

        self.frames.push(FlightFrame {
            timestamp: now - self.record_start,
            pose,
            motor_rpm,
            velocity,
            input,
        });
        true
    }

    /// Finish recording. Returns `None` if nothing was captured.
    pub fn stop_recording(
        &mut self,
        name: &str,
        drone_preset: &str,
        weather: WeatherPreset,
    ) -> Option<FlightRecording> {
        if !self.recording {
            return None;
        }
        self.recording = false;

        let frames = std::mem::take(&mut self.frames);
        let Some(last) = frames.last() else {
            debug!("Recording stopped with no frames captured");
            return None;
        };
        let duration = last.timestamp;

        let max_altitude = frames
            .iter()
            .map(|f| f.pose.position.y)
            .fold(f32::NEG_INFINITY, f32::max);
        let max_speed = frames
            .iter()
            .map(|f| f.velocity.norm())
            .fold(0.0, f32::max);

        let created_at = Utc::now();

        // Stable id from name, creation time and content size
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        created_at.timestamp_millis().hash(&mut hasher);
        frames.len().hash(&mut hasher);
        duration.to_bits().hash(&mut hasher);
        let id = format!("{:016x}", hasher.finish());

        info!(
            "Recording '{}' stopped: {} frames, {:.1}s",
            name,
            frames.len(),
            ms_to_secs(duration)
        );

        Some(FlightRecording {
            id,
            name: name.to_string(),
            created_at,
            duration,
            frame_count: frames.len(),
            frames,
            metadata: RecordingMetadata {
                drone_preset: drone_preset.to_string(),
                weather,
                max_altitude,
                max_speed,
            },
        })
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Frames captured so far in the active recording
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn recording_elapsed_ms(&self) -> f64 {
        if self.recording {
            self.clock.now_ms() - self.record_start
        } else {
            0.0
        }
    }

    // === Playback ===

    /// Load a recording, paused at its start
    pub fn load_recording(&mut self, recording: FlightRecording) {
        info!(
            "Loaded recording '{}' ({} frames)",
            recording.name,
            recording.frames.len()
        );
        self.loaded = Some(recording);
        self.playing = false;
        self.playback_time = 0.0;
    }

    pub fn loaded_recording(&self) -> Option<&FlightRecording> {
        self.loaded.as_ref()
    }

    pub fn start_playback(&mut self) {
        if self.playing {
            return;
        }
        let duration = match &self.loaded {
            Some(recording) => recording.duration,
            None => return,
        };
        // Finished non-looping playback starts over
        if self.playback_time >= duration {
            self.playback_time = 0.0;
        }
        self.reanchor();
        self.playing = true;
    }

    pub fn pause_playback(&mut self) {
        self.advance_playback();
        self.playing = false;
    }

    pub fn stop_playback(&mut self) {
        self.playing = false;
        self.playback_time = 0.0;
    }

    /// Change speed without moving the current playback position.
    /// Non-finite speeds are ignored.
    pub fn set_playback_speed(&mut self, speed: f64) {
        if !speed.is_finite() {
            debug!("Ignoring playback speed {}", speed);
            return;
        }
        self.advance_playback();
        self.playback_speed = speed.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED);
        if self.playing {
            self.reanchor();
        }
    }

    pub fn playback_speed(&self) -> f64 {
        self.playback_speed
    }

    /// Jump to `time_ms`, clamped to the recording
    pub fn seek_to(&mut self, time_ms: f64) {
        let duration = self.duration();
        self.playback_time = time_ms.clamp(0.0, duration);
        if self.playing {
            self.reanchor();
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn playback_status(&self) -> PlaybackStatus {
        let (time_ms, playing) = if self.playing {
            self.resolve_time(self.clock.now_ms())
        } else {
            (self.playback_time, false)
        };
        PlaybackStatus {
            loaded: self.loaded.is_some(),
            playing,
            time_ms,
            duration_ms: self.duration(),
            speed: self.playback_speed,
            looping: self.looping,
        }
    }

    /// Frame with the greatest timestamp not after the playback position
    pub fn get_playback_frame(&mut self) -> Option<FlightFrame> {
        self.advance_playback();
        let frames = &self.loaded.as_ref()?.frames;
        let idx = frames.partition_point(|f| f.timestamp <= self.playback_time);
        frames.get(idx.saturating_sub(1)).cloned()
    }

    /// Frame blended between the two samples bracketing the playback position
    pub fn get_interpolated_frame(&mut self) -> Option<FlightFrame> {
        self.advance_playback();
        let frames = &self.loaded.as_ref()?.frames;
        let t = self.playback_time;

        let idx = frames.partition_point(|f| f.timestamp <= t);
        if idx == 0 {
            return frames.first().cloned();
        }
        if idx >= frames.len() {
            return frames.last().cloned();
        }

        let a = &frames[idx - 1];
        let b = &frames[idx];
        let span = b.timestamp - a.timestamp;
        let frac = if span > 0.0 {
            ((t - a.timestamp) / span) as f32
        } else {
            0.0
        };

        let mut motor_rpm = a.motor_rpm;
        for (rpm, target) in motor_rpm.iter_mut().zip(b.motor_rpm) {
            *rpm += (target - *rpm) * frac;
        }

        Some(FlightFrame {
            timestamp: t,
            pose: a.pose.interpolate(&b.pose, frac),
            motor_rpm,
            velocity: a.velocity.lerp(&b.velocity, frac),
            input: a.input,
        })
    }

    fn duration(&self) -> f64 {
        self.loaded.as_ref().map_or(0.0, |r| r.duration)
    }

    fn reanchor(&mut self) {
        self.playback_anchor = self.clock.now_ms() - self.playback_time / self.playback_speed;
    }

    /// Playback position at clock time `now` and whether playback continues
    fn resolve_time(&self, now: f64) -> (f64, bool) {
        let duration = self.duration();
        let t = (now - self.playback_anchor) * self.playback_speed;
        if t < duration {
            (t.max(0.0), true)
        } else if self.looping && duration > 0.0 {
            (t % duration, true)
        } else {
            (duration, false)
        }
    }

    fn advance_playback(&mut self) {
        if !self.playing {
            return;
        }
        let (t, playing) = self.resolve_time(self.clock.now_ms());
        self.playback_time = t;
        if playing {
            // Keeps the anchor valid after a loop wrap
            self.reanchor();
        } else {
            debug!("Playback reached end");
            self.playing = false;
        }
    }
}
