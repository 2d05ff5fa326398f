//! Redline Core Library
//!
//! Platform-agnostic core for the Redline annotation canvas: a background
//! image with manipulable rectangular annotations that can be panned,
//! zoomed, rotated, resized, dragged, created, copied/pasted, and
//! undone/redone. Rendering, UI chrome, and server persistence are external
//! collaborators; this crate owns the spatial index, the coordinate and
//! geometry engine, and the delta-based history that is the single source of
//! truth for annotation state.

pub mod annotation;
pub mod camera;
pub mod editor;
pub mod geometry;
pub mod history;
pub mod index;
pub mod input;
pub mod manipulate;
pub mod quadtree;
pub mod router;
pub mod storage;

pub use annotation::{Annotation, AnnotationId, Background, SerializableColor};
pub use camera::Camera;
pub use editor::{Editor, EditorMode};
pub use geometry::Corner;
pub use history::{ChangeKind, Delta, DeltaOp, FieldPatch, History};
pub use index::SpatialIndex;
pub use input::{InputState, KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use quadtree::QuadTree;
pub use router::{ContextMenu, CursorShape, EventRouter, Gesture};
pub use storage::{MemoryStorage, RecoveryManager, RecoverySnapshot, Storage};

#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileStorage;
