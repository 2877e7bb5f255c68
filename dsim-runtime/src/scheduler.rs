//! Fixed-timestep simulation scheduler
//!
//! Render ticks arrive at whatever rate the platform delivers them. Each
//! tick adds the elapsed wall-clock time to an accumulator which is drained
//! in uniform simulation steps; the leftover fraction is handed to the
//! renderer as an interpolation factor.

use dsim_core::clock::Clock;
use dsim_core::units::{ms_to_secs, MS_PER_SECOND};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Simulation updates per second
    pub target_ups: u32,
    /// Cap on update invocations per tick
    pub max_updates_per_tick: u32,
    /// Largest tick delta accepted before accumulation (ms)
    pub max_frame_delta_ms: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            target_ups: 60,
            max_updates_per_tick: 5,
            max_frame_delta_ms: 250.0,
        }
    }
}

/// Once-per-second loop performance report
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoopStats {
    pub fps: f64,
    pub ups: f64,
    /// Last raw tick delta (ms, before clamping)
    pub last_delta_ms: f64,
}

/// Callbacks driven by the scheduler
pub trait LoopHandler {
    /// Advance the simulation by one fixed step of `dt` seconds
    fn update(&mut self, dt: f64);

    /// Draw, blending `alpha` of the way from the previous to the current state
    fn render(&mut self, alpha: f64);

    fn stats(&mut self, _stats: LoopStats) {}
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    pub updates: u32,
    /// `None` when the scheduler is stopped and nothing was rendered
    pub alpha: Option<f64>,
}

pub struct FixedStepScheduler<C: Clock> {
    config: SchedulerConfig,
    clock: C,
    state: LoopState,
    step_ms: f64,
    last_time: f64,
    accumulator: f64,

    // Stats window
    window_start: f64,
    frames: u32,
    updates: u32,
    last_delta_ms: f64,
    last_stats: LoopStats,
}

impl<C: Clock> FixedStepScheduler<C> {
    pub fn new(config: SchedulerConfig, clock: C) -> Self {
        let target_ups = config.target_ups.max(1);
        Self {
            config: SchedulerConfig {
                target_ups,
                max_updates_per_tick: config.max_updates_per_tick.max(1),
                max_frame_delta_ms: config.max_frame_delta_ms.max(0.0),
            },
            clock,
            state: LoopState::Stopped,
            step_ms: MS_PER_SECOND / target_ups as f64,
            last_time: 0.0,
            accumulator: 0.0,
            window_start: 0.0,
            frames: 0,
            updates: 0,
            last_delta_ms: 0.0,
            last_stats: LoopStats::default(),
        }
    }

    /// Begin (or resume) running from the current time
    pub fn start(&mut self) {
        if self.state == LoopState::Running {
            return;
        }
        info!("Scheduler starting at {} updates/s", self.config.target_ups);
        self.reset_timing();
        self.window_start = self.last_time;
        self.frames = 0;
        self.updates = 0;
        self.state = LoopState::Running;
    }

    /// Stop ticking. Safe to call from any state.
    pub fn stop(&mut self) {
        if self.state != LoopState::Stopped {
            info!("Scheduler stopped");
        }
        self.state = LoopState::Stopped;
    }

    /// Toggle between running and paused. No effect while stopped.
    pub fn toggle_pause(&mut self) {
        match self.state {
            LoopState::Running => {
                debug!("Scheduler paused");
                self.state = LoopState::Paused;
            }
            LoopState::Paused => {
                debug!("Scheduler resumed");
                // Time spent paused must not turn into a catch-up burst
                self.reset_timing();
                self.state = LoopState::Running;
            }
            LoopState::Stopped => {}
        }
    }

    fn reset_timing(&mut self) {
        self.last_time = self.clock.now_ms();
        self.accumulator = 0.0;
    }

    /// Process one externally delivered tick at `timestamp_ms`
    pub fn tick<H: LoopHandler + ?Sized>(&mut self, timestamp_ms: f64, handler: &mut H) -> TickReport {
        match self.state {
            LoopState::Stopped => TickReport::default(),
            LoopState::Paused => {
                handler.render(0.0);
                self.frames += 1;
                self.maybe_report(timestamp_ms, handler);
                TickReport {
                    updates: 0,
                    alpha: Some(0.0),
                }
            }
            LoopState::Running => {
                let raw_delta = timestamp_ms - self.last_time;
                self.last_time = timestamp_ms;
                self.last_delta_ms = raw_delta;
                self.accumulator += raw_delta.clamp(0.0, self.config.max_frame_delta_ms);

                let step_secs = ms_to_secs(self.step_ms);
                let mut updates = 0;
                while self.accumulator >= self.step_ms && updates < self.config.max_updates_per_tick {
                    handler.update(step_secs);
                    self.accumulator -= self.step_ms;
                    updates += 1;
                }

                let alpha = (self.accumulator / self.step_ms).min(1.0);
                handler.render(alpha);

                self.frames += 1;
                self.updates += updates;
                self.maybe_report(timestamp_ms, handler);

                TickReport {
                    updates,
                    alpha: Some(alpha),
                }
            }
        }
    }

    fn maybe_report<H: LoopHandler + ?Sized>(&mut self, timestamp_ms: f64, handler: &mut H) {
        let elapsed = timestamp_ms - self.window_start;
        if elapsed < 1000.0 {
            return;
        }
        let stats = LoopStats {
            fps: self.frames as f64 * 1000.0 / elapsed,
            ups: self.updates as f64 * 1000.0 / elapsed,
            last_delta_ms: self.last_delta_ms,
        };
        self.last_stats = stats;
        handler.stats(stats);
        self.frames = 0;
        self.updates = 0;
        self.window_start = timestamp_ms;
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    /// Fixed step size in milliseconds
    pub fn step_ms(&self) -> f64 {
        self.step_ms
    }

    pub fn accumulator_ms(&self) -> f64 {
        self.accumulator
    }

    pub fn last_stats(&self) -> LoopStats {
        self.last_stats
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsim_core::clock::ManualClock;

    #[derive(Default)]
    struct Recorder {
        updates: Vec<f64>,
        renders: Vec<f64>,
        stats: Vec<LoopStats>,
    }

    impl LoopHandler for Recorder {
        fn update(&mut self, dt: f64) {
            self.updates.push(dt);
        }

        fn render(&mut self, alpha: f64) {
            self.renders.push(alpha);
        }

        fn stats(&mut self, stats: LoopStats) {
            self.stats.push(stats);
        }
    }

    fn running(clock: &ManualClock) -> FixedStepScheduler<ManualClock> {
        let mut scheduler = FixedStepScheduler::new(SchedulerConfig::default(), clock.clone());
        scheduler.start();
        scheduler
    }

    #[test]
    fn test_one_update_per_step_interval() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = running(&clock);
        let mut handler = Recorder::default();

        let report = scheduler.tick(16.667, &mut handler);
        assert_eq!(report.updates, 1);
        assert_eq!(handler.updates.len(), 1);
        assert!((handler.updates[0] - 1.0 / 60.0).abs() < 1e-12);
        assert_eq!(handler.renders.len(), 1);
    }

    #[test]
    fn test_short_tick_only_renders() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = running(&clock);
        let mut handler = Recorder::default();

        let report = scheduler.tick(8.0, &mut handler);
        assert_eq!(report.updates, 0);
        let alpha = report.alpha.unwrap();
        assert!((alpha - 8.0 / scheduler.step_ms()).abs() < 1e-9);
        assert!((0.0..1.0).contains(&alpha));
    }

    #[test]
    fn test_large_gap_is_clamped_to_max_delta() {
        let clock = ManualClock::new(0.0);
        let config = SchedulerConfig {
            target_ups: 100,
            max_updates_per_tick: 100,
            ..SchedulerConfig::default()
        };
        let mut scheduler = FixedStepScheduler::new(config, clock.clone());
        scheduler.start();
        let mut handler = Recorder::default();

        let report = scheduler.tick(500.0, &mut handler);
        // 250 ms of 10 ms steps
        assert_eq!(report.updates, 25);
        assert_eq!(scheduler.accumulator_ms(), 0.0);
    }

    #[test]
    fn test_update_cap_retains_excess_time() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = running(&clock);
        let mut handler = Recorder::default();

        let report = scheduler.tick(200.0, &mut handler);
        assert_eq!(report.updates, 5);
        let expected_left = 200.0 - 5.0 * scheduler.step_ms();
        assert!((scheduler.accumulator_ms() - expected_left).abs() < 1e-9);
        assert_eq!(report.alpha, Some(1.0));

        // Next short tick drains the backlog
        let report = scheduler.tick(201.0, &mut handler);
        assert_eq!(report.updates, 5);
    }

    #[test]
    fn test_updates_happen_before_render() {
        struct Ordered(Vec<&'static str>);
        impl LoopHandler for Ordered {
            fn update(&mut self, _dt: f64) {
                self.0.push("update");
            }
            fn render(&mut self, _alpha: f64) {
                self.0.push("render");
            }
        }

        let clock = ManualClock::new(0.0);
        let mut scheduler = running(&clock);
        let mut handler = Ordered(Vec::new());
        scheduler.tick(40.0, &mut handler);
        assert_eq!(handler.0, vec!["update", "update", "render"]);
    }

    #[test]
    fn test_stopped_scheduler_ignores_ticks() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = FixedStepScheduler::new(SchedulerConfig::default(), clock.clone());
        let mut handler = Recorder::default();

        assert_eq!(scheduler.tick(100.0, &mut handler), TickReport::default());
        assert!(handler.renders.is_empty());

        assert!(!scheduler.is_running());
        scheduler.start();
        assert!(scheduler.is_running());
        scheduler.stop();
        scheduler.stop();
        assert_eq!(scheduler.state(), LoopState::Stopped);
        scheduler.tick(200.0, &mut handler);
        assert!(handler.renders.is_empty());
    }

    #[test]
    fn test_pause_renders_without_updates_and_resume_skips_paused_time() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = running(&clock);
        let mut handler = Recorder::default();

        scheduler.toggle_pause();
        assert_eq!(scheduler.state(), LoopState::Paused);
        let report = scheduler.tick(100.0, &mut handler);
        assert_eq!(report.updates, 0);
        assert_eq!(handler.renders, vec![0.0]);

        clock.set(5000.0);
        scheduler.toggle_pause();
        assert_eq!(scheduler.state(), LoopState::Running);
        let report = scheduler.tick(5016.7, &mut handler);
        assert_eq!(report.updates, 1, "paused time must not be caught up");
    }

    #[test]
    fn test_start_from_paused_resets_baseline_and_accumulator() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = running(&clock);
        let mut handler = Recorder::default();

        // Leave a partial step in the accumulator
        let report = scheduler.tick(10.0, &mut handler);
        assert_eq!(report.updates, 0);

        scheduler.toggle_pause();
        clock.set(5000.0);
        scheduler.start();
        assert_eq!(scheduler.state(), LoopState::Running);

        let report = scheduler.tick(5010.0, &mut handler);
        assert_eq!(report.updates, 0, "gap and leftover must both be discarded");
        assert!(handler.updates.is_empty());

        let report = scheduler.tick(5016.7, &mut handler);
        assert_eq!(report.updates, 1);
    }

    #[test]
    fn test_toggle_pause_while_stopped_is_noop() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = FixedStepScheduler::new(SchedulerConfig::default(), clock);
        scheduler.toggle_pause();
        assert_eq!(scheduler.state(), LoopState::Stopped);
    }

    #[test]
    fn test_stats_reported_once_per_second() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = running(&clock);
        let mut handler = Recorder::default();

        let mut t = 0.0;
        // One tick past the one-second mark
        for _ in 0..121 {
            t += 1000.0 / 120.0;
            scheduler.tick(t, &mut handler);
        }
        assert_eq!(handler.stats.len(), 1);
        let stats = handler.stats[0];
        assert!((stats.fps - 120.0).abs() < 1.0, "fps {}", stats.fps);
        assert!((stats.ups - 60.0).abs() < 2.0, "ups {}", stats.ups);
        assert!((stats.last_delta_ms - 1000.0 / 120.0).abs() < 1e-6);
        assert_eq!(scheduler.last_stats(), stats);
    }
}
