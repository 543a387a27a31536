//! Debounced auto-save.
//!
//! Every change reschedules the save, so a burst of edits lands as one
//! write once the design has been quiet for the debounce window. Saves are
//! skipped while a background upload is in flight.

use crate::Instant;
use crate::design::DesignState;
use crate::persistence::{PersistenceAdapter, SaveOutcome};
use crate::storage::StorageResult;
use kurbo::Size;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Default debounce window in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1500;

/// Manages debounced design persistence.
pub struct AutoSaveManager {
    /// Persistence backend.
    adapter: PersistenceAdapter,
    /// Quiet period required before a save.
    debounce: Duration,
    /// Time of the most recent unsaved change.
    last_change: Option<Instant>,
    /// Last save timestamp.
    last_save: Option<Instant>,
    /// Set while an image upload is running.
    uploading: Arc<AtomicBool>,
}

/// Marks an upload as running until dropped.
///
/// Dropping the guard clears the flag even if the upload future was
/// abandoned mid-flight.
#[must_use = "the upload is marked finished as soon as the guard is dropped"]
pub struct UploadGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl AutoSaveManager {
    /// Create a new auto-save manager.
    pub fn new(adapter: PersistenceAdapter, debounce: Duration) -> Self {
        Self {
            adapter,
            debounce,
            last_change: None,
            last_save: None,
            uploading: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the debounce window.
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Record a change, pushing the scheduled save back.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.last_change = Some(now);
    }

    /// Check if the design has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.last_change.is_some()
    }

    /// When the pending save becomes due.
    pub fn due_at(&self) -> Option<Instant> {
        self.last_change.map(|at| at + self.debounce)
    }

    /// Last successful save.
    pub fn last_save(&self) -> Option<Instant> {
        self.last_save
    }

    /// Mark an upload as started. Saves are skipped until [`Self::end_upload`].
    pub fn begin_upload(&mut self) {
        self.uploading.store(true, Ordering::Release);
    }

    /// Mark the upload as finished.
    pub fn end_upload(&mut self) {
        self.uploading.store(false, Ordering::Release);
    }

    /// Mark an upload as started for as long as the returned guard lives.
    pub fn upload_guard(&self) -> UploadGuard {
        self.uploading.store(true, Ordering::Release);
        UploadGuard {
            flag: self.uploading.clone(),
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::Acquire)
    }

    /// Check if a save should run now (dirty, quiet long enough, no upload).
    pub fn should_save(&self, now: Instant) -> bool {
        if self.is_uploading() {
            return false;
        }
        match self.due_at() {
            Some(due) => now >= due,
            None => false,
        }
    }

    /// Save the design if a save is due.
    /// Returns the outcome if a save was performed.
    pub async fn maybe_save(&mut self, state: &DesignState, now: Instant) -> StorageResult<Option<SaveOutcome>> {
        if !self.should_save(now) {
            if self.is_uploading() && self.is_dirty() {
                log::debug!("Upload in progress, deferring auto-save");
            }
            return Ok(None);
        }

        self.save(state, now).await.map(Some)
    }

    /// Force save the design immediately.
    pub async fn save(&mut self, state: &DesignState, now: Instant) -> StorageResult<SaveOutcome> {
        let outcome = self.adapter.save(state).await?;
        self.last_save = Some(now);
        self.last_change = None;
        Ok(outcome)
    }

    /// Load the saved design, if any.
    pub fn load(&mut self, default_size: Size) -> Option<DesignState> {
        let state = self.adapter.load(default_size)?;
        self.last_change = None;
        Some(state)
    }

    /// Get the persistence backend.
    pub fn adapter(&self) -> &PersistenceAdapter {
        &self.adapter
    }

    /// Get the persistence backend mutably.
    pub fn adapter_mut(&mut self) -> &mut PersistenceAdapter {
        &mut self.adapter
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;
    use pollster::block_on;
    use std::sync::Arc;

    const DEBOUNCE: Duration = Duration::from_millis(DEFAULT_DEBOUNCE_MS);

    fn manager(local: &Arc<MemoryKeyValueStore>) -> AutoSaveManager {
        AutoSaveManager::new(PersistenceAdapter::new(local.clone(), "design", 1024), DEBOUNCE)
    }

    fn state() -> DesignState {
        DesignState::new(Size::new(800.0, 600.0))
    }

    #[test]
    fn test_autosave_manager_creation() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let manager = manager(&local);

        assert!(!manager.is_dirty());
        assert!(!manager.should_save(Instant::now()));
    }

    #[test]
    fn test_debounce_reschedules() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let mut manager = manager(&local);
        let t0 = Instant::now();

        manager.mark_dirty(t0);
        assert!(!manager.should_save(t0 + DEBOUNCE / 2));

        manager.mark_dirty(t0 + DEBOUNCE / 2);
        assert!(!manager.should_save(t0 + DEBOUNCE));
        assert!(manager.should_save(t0 + DEBOUNCE / 2 + DEBOUNCE));
    }

    #[test]
    fn test_burst_coalesces_into_one_write() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let mut manager = manager(&local);
        let t0 = Instant::now();

        for i in 0..5 {
            let at = t0 + Duration::from_millis(100 * i);
            manager.mark_dirty(at);
            assert!(block_on(manager.maybe_save(&state(), at)).unwrap().is_none());
        }
        let later = t0 + Duration::from_secs(10);
        assert!(block_on(manager.maybe_save(&state(), later)).unwrap().is_some());
        assert!(block_on(manager.maybe_save(&state(), later)).unwrap().is_none());
        assert_eq!(local.write_count(), 1);
        assert!(!manager.is_dirty());
    }

    #[test]
    fn test_skip_while_uploading() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let mut manager = manager(&local);
        let t0 = Instant::now();

        manager.begin_upload();
        manager.mark_dirty(t0);
        manager.mark_dirty(t0 + Duration::from_millis(200));

        let later = t0 + Duration::from_secs(10);
        assert!(block_on(manager.maybe_save(&state(), later)).unwrap().is_none());
        assert_eq!(local.write_count(), 0);

        manager.end_upload();
        assert!(block_on(manager.maybe_save(&state(), later)).unwrap().is_some());
        assert_eq!(local.write_count(), 1);
    }

    #[test]
    fn test_dropped_upload_guard_releases_saves() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let mut manager = manager(&local);
        let t0 = Instant::now();
        manager.mark_dirty(t0);

        let guard = manager.upload_guard();
        assert!(manager.is_uploading());
        assert!(!manager.should_save(t0 + DEBOUNCE));

        drop(guard);
        assert!(!manager.is_uploading());
        assert!(manager.should_save(t0 + DEBOUNCE));
    }

    #[test]
    fn test_load_clears_dirty() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let mut manager = manager(&local);
        let now = Instant::now();
        block_on(manager.save(&state(), now)).unwrap();
        assert_eq!(manager.last_save(), Some(now));

        manager.mark_dirty(now);
        assert!(manager.load(Size::new(800.0, 600.0)).is_some());
        assert!(!manager.is_dirty());
    }
}
