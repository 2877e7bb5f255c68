//! dsim Core Library
//!
//! This crate provides the shared flight data model and the collaborator
//! seams (clock, key-value storage) used by the control and runtime crates.

pub mod clock;
pub mod model;
pub mod storage;
pub mod units;

pub use clock::{Clock, ManualClock, SystemClock};
pub use model::{
    rotation_from_euler_degrees, slerp, Axis, AxisTriple, FlightFrame, FlightRecording, GhostFrame,
    ParseKindError, PilotInput, Pose, RecordingMetadata, Rotation, Vec3, WeatherPreset,
};
pub use storage::{KeyValueStore, MemoryStore, StorageError};
