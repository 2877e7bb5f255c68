//! dsim Runtime Library
//!
//! Fixed-step scheduling, flight recording and playback, race tracking and
//! persistence. Exposes runtime components for the `dsim` binary and for
//! integration testing.

pub mod config;
pub mod demo;
pub mod library;
pub mod profile;
pub mod race;
pub mod recorder;
pub mod scheduler;
pub mod session;
pub mod storage;

pub use config::SimConfig;
pub use library::{RecordingLibrary, RecordingSummary};
pub use profile::{PilotSettings, Progress};
pub use race::{RaceCheckpoint, RaceConfig, RaceEvent, RaceState, RaceTracker};
pub use recorder::{PlaybackStatus, TrajectoryStore};
pub use scheduler::{FixedStepScheduler, LoopHandler, LoopState, LoopStats, SchedulerConfig};
pub use session::{FlightSession, ReplayReport, SessionSummary};
pub use storage::FileStore;
