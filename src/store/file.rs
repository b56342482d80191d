//! JSON file store with advisory locking.
//!
//! Persists one serde document per file under the state directory.
//! Loads are lock-free and fail open: a missing, unreadable or
//! structurally invalid file yields the document's `Default`. Writes
//! take an OS-level exclusive lock for the duration of the
//! truncate-and-write so concurrent hook invocations serialize on the
//! same state file.

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors surfaced by [`StateStore::save`].
///
/// Callers log these and continue; a failed save never blocks the
/// triggering tool call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Repository interface over a persisted state document.
pub trait StateStore<T> {
    /// Loads the current document, falling back to `T::default()` on any
    /// read or validation failure.
    fn load(&self) -> T;

    /// Persists the document, serializing concurrent writers.
    fn save(&self, state: &T) -> Result<(), StoreError>;
}

/// File-backed [`StateStore`] holding a single JSON document.
pub struct JsonFileStore<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> JsonFileStore<T> {
    /// Creates a store for the document at `path`. The file and its
    /// parent directory are created lazily on first save.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> StateStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    fn load(&self) -> T {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file yet, starting fresh");
                return T::default();
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read state file, starting fresh"
                );
                return T::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "State file failed validation, starting fresh"
                );
                T::default()
            }
        }
    }

    fn save(&self, state: &T) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;

        // `mode` above only applies at creation; a pre-existing file may
        // carry looser permissions from an earlier writer.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        file.lock_exclusive()?;
        let result = write_locked(&mut file, state);
        // Unlock even when the write failed; the lock must never outlive
        // this invocation.
        let _ = file.unlock();
        result
    }
}

fn write_locked<T: Serialize>(file: &mut fs::File, state: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(state)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(json.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{ActivityState, TeammateRecord, TeammateStatus};
    use chrono::Utc;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> JsonFileStore<ActivityState> {
        JsonFileStore::new(dir.join("activity.json"))
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempdir().unwrap();
        let state = store_in(dir.path()).load();
        assert!(state.teammates.is_empty());
        assert_eq!(state.total_retries, 0);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let mut state = ActivityState::default();
        let mut record = TeammateRecord::new(Utc::now());
        record.status = TeammateStatus::Working;
        record.messages_sent = 2;
        state.teammates.insert("alice".to_string(), record);

        store.save(&state).unwrap();
        let reloaded = store.load();

        assert_eq!(reloaded.teammates.len(), 1);
        let alice = &reloaded.teammates["alice"];
        assert_eq!(alice.status, TeammateStatus::Working);
        assert_eq!(alice.messages_sent, 2);
        assert_eq!(alice.last_activity, state.teammates["alice"].last_activity);
    }

    #[test]
    fn test_corrupted_file_loads_as_default() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.path(), r#"{"teammates": "not-a-map"}"#).unwrap();

        let state = store.load();
        assert!(state.teammates.is_empty());
    }

    #[test]
    fn test_truncated_file_loads_as_default() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.path(), r#"{"teammates": {"ali"#).unwrap();

        let state = store.load();
        assert!(state.teammates.is_empty());
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let store: JsonFileStore<ActivityState> =
            JsonFileStore::new(dir.path().join("nested").join("activity.json"));
        store.save(&ActivityState::default()).unwrap();
        assert!(store.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_save_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.save(&ActivityState::default()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_tightens_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.path(), "{}").unwrap();
        fs::set_permissions(store.path(), fs::Permissions::from_mode(0o644)).unwrap();

        store.save(&ActivityState::default()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_concurrent_saves_serialize_on_the_lock() {
        use std::io::Read;

        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let team = |prefix: &str| {
            let mut state = ActivityState::default();
            for i in 0..50 {
                state
                    .teammates
                    .insert(format!("{prefix}-{i}"), TeammateRecord::new(Utc::now()));
            }
            state
        };
        let first = team("alice");
        let second = team("bob");

        let store = &store;
        std::thread::scope(|scope| {
            for state in [&first, &second] {
                scope.spawn(move || {
                    for _ in 0..50 {
                        store.save(state).unwrap();
                    }
                });
            }

            // A reader holding the shared lock must only ever observe a
            // complete document from one writer, never an interleaved
            // truncate-and-write.
            scope.spawn(|| {
                for _ in 0..200 {
                    let Ok(mut file) = fs::File::open(store.path()) else {
                        continue;
                    };
                    file.lock_shared().unwrap();
                    let mut raw = String::new();
                    file.read_to_string(&mut raw).unwrap();
                    let _ = file.unlock();

                    // Created but not yet written; nothing to check.
                    if raw.is_empty() {
                        continue;
                    }
                    let snapshot: ActivityState =
                        serde_json::from_str(&raw).expect("observed a torn state file");
                    assert_eq!(snapshot.teammates.len(), 50);
                }
            });
        });

        assert_eq!(store.load().teammates.len(), 50);
    }

    #[test]
    fn test_shorter_rewrite_leaves_no_trailing_garbage() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let mut state = ActivityState::default();
        for i in 0..10 {
            state
                .teammates
                .insert(format!("teammate-{i}"), TeammateRecord::new(Utc::now()));
        }
        store.save(&state).unwrap();
        store.save(&ActivityState::default()).unwrap();

        let reloaded = store.load();
        assert!(reloaded.teammates.is_empty());
    }
}
