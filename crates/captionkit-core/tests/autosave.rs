//! Integration tests: debounced autosave and the upload guard.

use std::sync::Arc;
use std::time::Duration;

use captionkit_core::storage::{AutoSaveManager, FileKeyValueStore, MemoryKeyValueStore};
use captionkit_core::{DesignState, Instant, KeyValueStore, PersistenceAdapter, TextLayer};
use kurbo::{Point, Size};
use pollster::block_on;
use pretty_assertions::assert_eq;

const DEBOUNCE: Duration = Duration::from_millis(1500);
const CANVAS: Size = Size::new(800.0, 600.0);

fn design() -> DesignState {
    let mut state = DesignState::new(CANVAS);
    state
        .text_layers
        .push(TextLayer::new(Point::new(400.0, 300.0)).with_text("Caption"));
    state
}

#[test]
fn no_writes_while_uploading() {
    let local = Arc::new(MemoryKeyValueStore::new());
    let adapter = PersistenceAdapter::new(local.clone(), "design", 1024);
    let mut manager = AutoSaveManager::new(adapter, DEBOUNCE);
    let t0 = Instant::now();

    manager.begin_upload();
    manager.mark_dirty(t0);
    manager.mark_dirty(t0 + Duration::from_millis(500));

    for ms in [600, 2_500, 10_000] {
        let at = t0 + Duration::from_millis(ms);
        assert_eq!(block_on(manager.maybe_save(&design(), at)).unwrap(), None);
    }
    assert_eq!(local.write_count(), 0);

    manager.end_upload();
    let at = t0 + Duration::from_millis(10_000);
    assert!(block_on(manager.maybe_save(&design(), at)).unwrap().is_some());
    assert_eq!(local.write_count(), 1);
}

#[test]
fn file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let local = Arc::new(FileKeyValueStore::new(dir.path().to_path_buf()).unwrap());
    let adapter = PersistenceAdapter::new(local.clone(), "captionkit.design", 1024);
    let mut manager = AutoSaveManager::new(adapter, DEBOUNCE);

    let state = design();
    block_on(manager.save(&state, Instant::now())).unwrap();
    assert!(local.get("captionkit.design").unwrap().is_some());

    assert_eq!(manager.load(CANVAS), Some(state));
}
