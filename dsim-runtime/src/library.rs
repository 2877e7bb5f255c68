//! Persisted recording list
//!
//! All recordings live as one JSON array under a single key of a
//! [`KeyValueStore`]. Failures never propagate: corrupted payloads read as an
//! empty list and failed writes report `false`, leaving the previously
//! stored list untouched. A save or delete whose read fails at the storage
//! layer is abandoned rather than written over a list it never saw.

use chrono::{DateTime, Utc};
use dsim_core::model::FlightRecording;
use dsim_core::storage::{KeyValueStore, StorageError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Store key holding the serialized recording list
pub const RECORDINGS_KEY: &str = "dsim.recordings";

pub const DEFAULT_MAX_RECORDINGS: usize = 10;

#[derive(Debug, Error)]
enum PersistError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("recording format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Recording listing entry without frame data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub id: String,
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub duration: f64,
    pub frame_count: usize,
}

impl From<&FlightRecording> for RecordingSummary {
    fn from(r: &FlightRecording) -> Self {
        Self {
            id: r.id.clone(),
            name: r.name.clone(),
            created_at: r.created_at,
            duration: r.duration,
            frame_count: r.frame_count,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecordingLibrary {
    max_recordings: usize,
}

impl RecordingLibrary {
    pub fn new(max_recordings: usize) -> Self {
        Self {
            max_recordings: max_recordings.max(1),
        }
    }

    pub fn max_recordings(&self) -> usize {
        self.max_recordings
    }

    /// All stored recordings, oldest first. Unreadable storage reads as empty.
    pub fn list_recordings<S: KeyValueStore + ?Sized>(&self, store: &S) -> Vec<FlightRecording> {
        match read_list(store) {
            Ok(list) => list,
            Err(e) => {
                warn!("Discarding unreadable recording list: {}", e);
                Vec::new()
            }
        }
    }

    pub fn list_summaries<S: KeyValueStore + ?Sized>(&self, store: &S) -> Vec<RecordingSummary> {
        self.list_recordings(store)
            .iter()
            .map(RecordingSummary::from)
            .collect()
    }

    /// Persist `recording`, evicting the oldest entries beyond the cap.
    /// A recording with an existing id replaces that entry in place.
    pub fn save_recording<S: KeyValueStore + ?Sized>(
        &self,
        store: &mut S,
        recording: &FlightRecording,
    ) -> bool {
        let Some(mut list) = read_for_update(store) else {
            warn!("Recording '{}' not saved", recording.name);
            return false;
        };

        if let Some(existing) = list.iter_mut().find(|r| r.id == recording.id) {
            *existing = recording.clone();
        } else {
            let excess = (list.len() + 1).saturating_sub(self.max_recordings);
            if excess > 0 {
                debug!("Evicting {} oldest recording(s)", excess);
                list.drain(..excess);
            }
            list.push(recording.clone());
        }

        match write_list(store, &list) {
            Ok(()) => {
                info!("Saved recording '{}' ({})", recording.name, recording.id);
                true
            }
            Err(e) => {
                warn!("Failed to save recording '{}': {}", recording.name, e);
                false
            }
        }
    }

    pub fn load_recording<S: KeyValueStore + ?Sized>(
        &self,
        store: &S,
        id: &str,
    ) -> Option<FlightRecording> {
        self.list_recordings(store).into_iter().find(|r| r.id == id)
    }

    /// Remove a recording. Returns false if it was missing or the write failed.
    pub fn delete_recording<S: KeyValueStore + ?Sized>(&self, store: &mut S, id: &str) -> bool {
        let Some(mut list) = read_for_update(store) else {
            warn!("Recording {} not deleted", id);
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != id);
        if list.len() == before {
            return false;
        }

        match write_list(store, &list) {
            Ok(()) => {
                info!("Deleted recording {}", id);
                true
            }
            Err(e) => {
                warn!("Failed to delete recording {}: {}", id, e);
                false
            }
        }
    }

    /// Pretty-printed JSON for a stored recording
    pub fn export_recording<S: KeyValueStore + ?Sized>(&self, store: &S, id: &str) -> Option<String> {
        let recording = self.load_recording(store, id)?;
        match serde_json::to_string_pretty(&recording) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!("Failed to export recording {}: {}", id, e);
                None
            }
        }
    }

    /// Parse and store an exported recording. Rejects recordings without
    /// frames or with decreasing timestamps.
    pub fn import_recording<S: KeyValueStore + ?Sized>(
        &self,
        store: &mut S,
        json: &str,
    ) -> Option<FlightRecording> {
        let recording: FlightRecording = match serde_json::from_str(json) {
            Ok(r) => r,
            Err(e) => {
                warn!("Rejected recording import: {}", e);
                return None;
            }
        };
        if !recording.is_well_formed() {
            warn!("Rejected recording import '{}': malformed frames", recording.name);
            return None;
        }

        self.save_recording(store, &recording).then_some(recording)
    }
}

impl Default for RecordingLibrary {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORDINGS)
    }
}

fn read_list<S: KeyValueStore + ?Sized>(store: &S) -> Result<Vec<FlightRecording>, PersistError> {
    match store.get(RECORDINGS_KEY)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(Vec::new()),
    }
}

/// Current list for a read-modify-write. A corrupt payload starts a fresh
/// list; a storage failure yields `None`.
fn read_for_update<S: KeyValueStore + ?Sized>(store: &S) -> Option<Vec<FlightRecording>> {
    match read_list(store) {
        Ok(list) => Some(list),
        Err(PersistError::Format(e)) => {
            warn!("Replacing unreadable recording list: {}", e);
            Some(Vec::new())
        }
        Err(e @ PersistError::Storage(_)) => {
            warn!("Failed to read recording list: {}", e);
            None
        }
    }
}

fn write_list<S: KeyValueStore + ?Sized>(
    store: &mut S,
    list: &[FlightRecording],
) -> Result<(), PersistError> {
    let raw = serde_json::to_string(list)?;
    store.set(RECORDINGS_KEY, &raw)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsim_core::model::{
        FlightFrame, PilotInput, Pose, RecordingMetadata, Rotation, Vec3, WeatherPreset,
    };
    use dsim_core::storage::MemoryStore;
    use std::cell::Cell;

    /// Helper: memory store whose next read can be made to fail
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_next_get: Cell<bool>,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            if self.fail_next_get.replace(false) {
                return Err(std::io::Error::new(std::io::ErrorKind::Interrupted, "read failed").into());
            }
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    fn sample(id: &str) -> FlightRecording {
        let frames: Vec<FlightFrame> = (0..3)
            .map(|i| FlightFrame {
                timestamp: i as f64 * 100.0,
                pose: Pose::new(Vec3::new(i as f32, 1.0, 0.0), Rotation::identity()),
                motor_rpm: [9000.0; 4],
                velocity: Vec3::new(1.0, 0.0, 0.0),
                input: PilotInput::new(0.5, 0.0, 0.0, 0.0),
            })
            .collect();
        FlightRecording {
            id: id.to_string(),
            name: format!("flight {}", id),
            created_at: Utc::now(),
            duration: 200.0,
            frame_count: frames.len(),
            frames,
            metadata: RecordingMetadata {
                drone_preset: "racer".to_string(),
                weather: WeatherPreset::Clear,
                max_altitude: 1.0,
                max_speed: 1.0,
            },
        }
    }

    fn ids<S: KeyValueStore + ?Sized>(library: &RecordingLibrary, store: &S) -> Vec<String> {
        library
            .list_recordings(store)
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    #[test]
    fn test_save_load_delete() {
        let library = RecordingLibrary::default();
        let mut store = MemoryStore::new();

        assert!(library.list_recordings(&store).is_empty());
        assert!(library.save_recording(&mut store, &sample("a")));

        let loaded = library.load_recording(&store, "a").unwrap();
        assert_eq!(loaded.frame_count, 3);
        assert_eq!(loaded.frames[2].pose.position.x, 2.0);
        assert!(library.load_recording(&store, "missing").is_none());

        assert!(library.delete_recording(&mut store, "a"));
        assert!(!library.delete_recording(&mut store, "a"));
        assert!(library.list_recordings(&store).is_empty());
    }

    #[test]
    fn test_oldest_recordings_evicted_first() {
        let library = RecordingLibrary::new(3);
        let mut store = MemoryStore::new();
        for id in ["a", "b", "c", "d", "e"] {
            assert!(library.save_recording(&mut store, &sample(id)));
        }
        assert_eq!(ids(&library, &store), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_same_id_replaces_in_place() {
        let library = RecordingLibrary::new(3);
        let mut store = MemoryStore::new();
        for id in ["a", "b", "c"] {
            library.save_recording(&mut store, &sample(id));
        }

        let mut renamed = sample("b");
        renamed.name = "renamed".to_string();
        assert!(library.save_recording(&mut store, &renamed));

        assert_eq!(ids(&library, &store), vec!["a", "b", "c"]);
        assert_eq!(library.load_recording(&store, "b").unwrap().name, "renamed");
    }

    #[test]
    fn test_corrupted_payload_reads_as_empty() {
        let library = RecordingLibrary::default();
        let mut store = MemoryStore::new();
        store.set(RECORDINGS_KEY, "{not json").unwrap();

        assert!(library.list_recordings(&store).is_empty());
        assert!(library.load_recording(&store, "a").is_none());
        assert!(!library.delete_recording(&mut store, "a"));

        // Saving over corrupted data starts a fresh list
        assert!(library.save_recording(&mut store, &sample("a")));
        assert_eq!(ids(&library, &store), vec!["a"]);
    }

    #[test]
    fn test_failed_write_keeps_previous_list() {
        let library = RecordingLibrary::default();
        let mut sizing = MemoryStore::new();
        library.save_recording(&mut sizing, &sample("a"));
        let one_len = sizing.get(RECORDINGS_KEY).unwrap().unwrap().len();

        // Room for one recording but not two
        let mut store = MemoryStore::with_quota(RECORDINGS_KEY.len() + one_len + 10);
        assert!(library.save_recording(&mut store, &sample("a")));
        assert!(!library.save_recording(&mut store, &sample("b")));
        assert_eq!(ids(&library, &store), vec!["a"]);
    }

    #[test]
    fn test_read_failure_leaves_stored_list_alone() {
        let library = RecordingLibrary::default();
        let mut store = FlakyStore::default();
        for id in ["a", "b", "c"] {
            assert!(library.save_recording(&mut store, &sample(id)));
        }

        store.fail_next_get.set(true);
        assert!(!library.save_recording(&mut store, &sample("d")));
        assert_eq!(ids(&library, &store), vec!["a", "b", "c"]);

        store.fail_next_get.set(true);
        assert!(!library.delete_recording(&mut store, "a"));
        assert_eq!(ids(&library, &store), vec!["a", "b", "c"]);

        assert!(library.save_recording(&mut store, &sample("d")));
        assert_eq!(ids(&library, &store), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_persisted_format_field_names() {
        let library = RecordingLibrary::default();
        let mut store = MemoryStore::new();
        library.save_recording(&mut store, &sample("a"));

        let raw = store.get(RECORDINGS_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let first = &value[0];
        assert!(first["createdAt"].is_i64());
        assert_eq!(first["frameCount"], 3);
        assert_eq!(first["metadata"]["dronePreset"], "racer");
        assert_eq!(first["frames"][0]["motorRPM"].as_array().unwrap().len(), 4);
        assert!(first["frames"][0]["input"]["throttle"].is_number());
    }

    #[test]
    fn test_summaries_omit_frames() {
        let library = RecordingLibrary::default();
        let mut store = MemoryStore::new();
        library.save_recording(&mut store, &sample("a"));
        library.save_recording(&mut store, &sample("b"));

        let summaries = library.list_summaries(&store);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[1].id, "b");
        assert_eq!(summaries[1].frame_count, 3);
        let json = serde_json::to_value(&summaries[0]).unwrap();
        assert!(json.get("frames").is_none());
        assert!(json["createdAt"].is_i64());
        assert_eq!(json["frameCount"], 3);
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn test_export_import() {
        let library = RecordingLibrary::default();
        let mut source = MemoryStore::new();
        library.save_recording(&mut source, &sample("a"));
        let json = library.export_recording(&source, "a").unwrap();
        assert!(json.contains('\n'));
        assert!(library.export_recording(&source, "missing").is_none());

        let mut target = MemoryStore::new();
        let imported = library.import_recording(&mut target, &json).unwrap();
        assert_eq!(imported.id, "a");
        assert_eq!(ids(&library, &target), vec!["a"]);
    }

    #[test]
    fn test_import_rejects_malformed_recordings() {
        let library = RecordingLibrary::default();
        let mut store = MemoryStore::new();
        assert!(library.import_recording(&mut store, "[]").is_none());

        let mut backwards = sample("x");
        backwards.frames[2].timestamp = 50.0;
        let json = serde_json::to_string(&backwards).unwrap();
        assert!(library.import_recording(&mut store, &json).is_none());

        let mut empty = sample("y");
        empty.frames.clear();
        let json = serde_json::to_string(&empty).unwrap();
        assert!(library.import_recording(&mut store, &json).is_none());

        assert!(library.list_recordings(&store).is_empty());
    }
}
