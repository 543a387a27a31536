//! CaptionKit Core Library
//!
//! Editing state, history and persistence engine for the CaptionKit
//! image/text composer: a background image with styled text layers on top.

pub mod background;
pub mod binding;
pub mod config;
pub mod design;
pub mod editor;
pub mod error;
pub mod fonts;
pub mod history;
pub mod layer;
pub mod persistence;
pub mod storage;

#[cfg(not(target_arch = "wasm32"))]
pub use std::time::Instant;

#[cfg(target_arch = "wasm32")]
pub use web_time::Instant;

pub use background::{BackgroundImage, DecodedImage, ImageFormat, fit_within};
pub use binding::{CanvasBinding, CanvasEvent, CanvasRuntime, MemoryCanvas, NudgeDirection, ObjectKey};
pub use config::EditorConfig;
pub use design::{DesignState, DesignStore, ReorderDirection};
pub use editor::{Editor, Notice, NoticeLevel};
pub use error::{EditorError, EditorResult};
pub use fonts::{FALLBACK_FONTS, FontCatalog, StaticFontCatalog};
pub use history::{History, MAX_HISTORY_DEPTH};
pub use layer::{LayerId, LayerPatch, TextAlign, TextLayer};
pub use persistence::{PersistedDesign, PersistenceAdapter, SaveOutcome};
pub use storage::{AutoSaveManager, BlobStore, KeyValueStore, StorageError, StorageResult};
