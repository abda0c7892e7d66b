use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::Utc;

use crate::{
    types::{CheckpointState, ScraperError},
    utils::write_atomic,
};

/// Durable crawl progress kept as a single JSON snapshot.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CheckpointStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Missing or unreadable checkpoints yield an empty state.
    pub fn load(&self) -> CheckpointState {
        let data = match fs::read(&self.path) {
            Ok(d) => d,
            Err(_) => {
                debug!("no checkpoint at {:?}, starting empty", self.path);
                return CheckpointState::default();
            }
        };
        match serde_json::from_slice::<CheckpointState>(&data) {
            Ok(mut state) => {
                // an id can't be both done and failed, done wins
                let processed = state.processed_ids.clone();
                state.failed_ids.retain(|id| !processed.contains(id));
                info!(
                    "loaded checkpoint from {:?}: {} tools, {} processed, last page {}",
                    self.path,
                    state.results.len(),
                    state.processed_ids.len(),
                    state.last_page
                );
                state
            }
            Err(e) => {
                warn!(
                    "checkpoint at {:?} is corrupt ({}), starting empty",
                    self.path, e
                );
                CheckpointState::default()
            }
        }
    }

    /// Writes to a sibling temp file, syncs it, then renames over the checkpoint.
    pub fn save(&self, state: &mut CheckpointState) -> Result<(), ScraperError> {
        state.saved_at = Utc::now();
        let data = serde_json::to_vec_pretty(state)
            .map_err(|e| ScraperError::checkpoint_io(&self.path, e.into()))?;

        write_atomic(&self.path, &data).map_err(|e| ScraperError::checkpoint_io(&self.path, e))?;

        debug!(
            "checkpoint saved: {} tools, {} processed ids",
            state.results.len(),
            state.processed_ids.len()
        );
        Ok(())
    }

    pub fn clear(&self) -> Result<(), ScraperError> {
        match fs::remove_file(&self.path) {
            Ok(_) => {
                info!("cleared checkpoint {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ScraperError::checkpoint_io(&self.path, e)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::ToolRecord;
    use crate::utils::tmp_path;

    fn store() -> (tempfile::TempDir, CheckpointStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("scrape_checkpoint.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_loads_empty() {
        let (_dir, store) = store();
        assert!(!store.exists());
        let s = store.load();
        assert!(s.processed_ids.is_empty());
        assert_eq!(s.last_page, 0);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let (_dir, store) = store();
        fs::write(store.path(), b"{\"processed_ids\": [\"a\"").unwrap();
        let s = store.load();
        assert!(s.processed_ids.is_empty());
        assert!(s.results.is_empty());
    }

    #[test]
    fn save_then_load_recovers_acknowledged_state() {
        let (_dir, store) = store();
        let mut s = CheckpointState::default();
        s.processed_ids.insert("https://www.toolify.ai/tool/a".into());
        s.failed_ids.insert("https://www.toolify.ai/tool/b".into());
        s.last_page = 2;
        s.results.push(ToolRecord {
            name: "A".into(),
            ..Default::default()
        });
        store.save(&mut s).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.processed_ids, s.processed_ids);
        assert_eq!(loaded.failed_ids, s.failed_ids);
        assert_eq!(loaded.last_page, 2);
        assert_eq!(loaded.results, s.results);
        assert!(!tmp_path(store.path()).exists());
    }

    #[test]
    fn stale_temp_file_is_ignored() {
        let (_dir, store) = store();
        let mut s = CheckpointState::default();
        s.processed_ids.insert("done".into());
        store.save(&mut s).unwrap();
        // a crash mid-write leaves only a half-written temp file behind
        fs::write(tmp_path(store.path()), b"{\"processed_ids\": [\"done\", \"half").unwrap();
        let loaded = store.load();
        assert_eq!(loaded.processed_ids.len(), 1);
        assert!(loaded.is_processed("done"));
    }

    #[test]
    fn processed_ids_win_over_failed() {
        let (_dir, store) = store();
        let mut s = CheckpointState::default();
        s.processed_ids.insert("x".into());
        s.failed_ids.insert("x".into());
        store.save(&mut s).unwrap();
        assert!(store.load().failed_ids.is_empty());
    }

    #[test]
    fn clear_removes_file() {
        let (_dir, store) = store();
        store.save(&mut CheckpointState::default()).unwrap();
        assert!(store.exists());
        store.clear().unwrap();
        assert!(!store.exists());
        store.clear().unwrap();
    }
}
