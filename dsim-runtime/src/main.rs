//! dsim headless runner
//!
//! Flies the demo pilot around the default race course on a fixed-step loop,
//! then saves the flight, replays it once and updates pilot progress.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use dsim_control::FlightMode;
use dsim_core::clock::{Clock, SystemClock};
use dsim_core::model::WeatherPreset;
use dsim_core::storage::{KeyValueStore, MemoryStore};
use dsim_runtime::session::replay_once;
use dsim_runtime::{
    FileStore, FixedStepScheduler, FlightSession, PilotSettings, Progress, RaceConfig,
    RecordingLibrary, SimConfig,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "dsim")]
#[command(about = "Headless drone flight simulation core")]
#[command(version)]
struct Cli {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many seconds (otherwise runs until Ctrl-C or the race ends)
    #[arg(short, long)]
    seconds: Option<f64>,

    /// Flight mode: acro or angle
    #[arg(short, long)]
    mode: Option<FlightMode>,

    /// Weather preset: clear, cloudy, windy, rainy, stormy or foggy
    #[arg(short, long)]
    weather: Option<WeatherPreset>,

    /// Laps of the default course
    #[arg(long, default_value_t = 1)]
    laps: u32,

    /// Keep recordings and progress in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Speed of the post-run replay
    #[arg(long, default_value_t = 1.0)]
    speed: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SimConfig::load(cli.config.as_deref())?;
    if let Some(mode) = cli.mode {
        config.flight_mode = mode;
    }
    if let Some(weather) = cli.weather {
        config.weather = weather;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    info!(
        "Starting dsim ({} mode, {} weather, {} laps)",
        config.flight_mode, config.weather, cli.laps
    );

    let mut store = open_store(&config, cli.ephemeral)?;
    run(&config, &cli, store.as_mut()).await
}

fn open_store(config: &SimConfig, ephemeral: bool) -> Result<Box<dyn KeyValueStore>> {
    if ephemeral {
        return Ok(Box::new(MemoryStore::new()));
    }
    match config.resolved_storage_dir() {
        Some(dir) => {
            let store = FileStore::open(&dir)
                .with_context(|| format!("Failed to open storage at {}", dir.display()))?;
            info!("Using storage at {}", dir.display());
            Ok(Box::new(store))
        }
        None => {
            warn!("No data directory available, keeping data in memory");
            Ok(Box::new(MemoryStore::new()))
        }
    }
}

async fn run(config: &SimConfig, cli: &Cli, store: &mut dyn KeyValueStore) -> Result<()> {
    let mut settings = PilotSettings::load(&*store);
    settings.flight_mode = config.flight_mode;
    settings.weather = config.weather;
    let progress = Progress::load(&*store);

    let mut course = RaceConfig::default_course();
    course.laps = cli.laps.max(1);
    let course_name = course.name.clone();

    let clock = SystemClock::new();
    let mut session = FlightSession::new(&settings, progress, clock);
    session.start_race(course);
    session.start_recording();

    let cancel = CancellationToken::new();
    spawn_stop_triggers(cancel.clone(), cli.seconds);

    let mut scheduler = FixedStepScheduler::new(config.scheduler(), clock);
    let mut ticks = tokio::time::interval(Duration::from_secs_f64(1.0 / config.render_hz.max(1) as f64));
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    scheduler.start();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticks.tick() => {
                scheduler.tick(clock.now_ms(), &mut session);
                if session.race().is_completed() {
                    break;
                }
            }
        }
    }
    scheduler.stop();
    cancel.cancel();

    let name = format!("Flight {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    let summary = session.finish(&name);
    let mut progress = session.into_progress();

    let library = RecordingLibrary::new(config.max_recordings);
    match summary.recording {
        Some(recording) => {
            if library.save_recording(&mut *store, &recording) {
                progress.record_flight_saved();
            }
            let report = replay_once(recording, cli.speed);
            info!(
                "Replay at {:.2}x: {} samples over {:.1}s, max altitude {:.1}m, path {:.1}m",
                cli.speed,
                report.samples,
                report.playback_ms / 1000.0,
                report.max_altitude,
                report.path_length
            );
        }
        None => warn!("No frames were recorded"),
    }

    if !progress.save(&mut *store) {
        warn!("Progress was not saved");
    }
    if !settings.save(&mut *store) {
        warn!("Settings were not saved");
    }

    info!(
        "Flew {:.1}s ({} updates, {} frames rendered)",
        summary.sim_seconds, summary.updates, summary.frames_rendered
    );
    let race = &summary.race;
    if race.completed {
        info!("Finished '{}' in {:.3}s", course_name, race.total_time);
    } else {
        info!(
            "Stopped on lap {} at checkpoint {} of '{}'",
            race.current_lap, race.current_checkpoint, course_name
        );
    }
    if let Some(best) = progress.best_lap(&course_name) {
        info!("Personal best on '{}': {:.3}s", course_name, best);
    }
    info!(
        "{} recording(s) stored, {} race(s) completed",
        library.list_summaries(&*store).len(),
        progress.races_completed
    );

    Ok(())
}

/// Cancel on Ctrl-C, or once `seconds` have elapsed
fn spawn_stop_triggers(cancel: CancellationToken, seconds: Option<f64>) {
    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    info!("Ctrl-C received, stopping");
                    token.cancel();
                }
                Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
            },
        }
    });

    if let Some(seconds) = seconds.filter(|s| s.is_finite() && *s > 0.0) {
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs_f64(seconds)) => {
                    info!("Run time of {:.1}s elapsed", seconds);
                    cancel.cancel();
                }
            }
        });
    }
}
