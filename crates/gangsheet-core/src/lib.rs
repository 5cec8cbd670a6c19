//! Gangsheet Core Library
//!
//! Scene engine for print gang sheets: element model, undo history, drag and
//! transform sync, snapping, alt-drag duplication and grid tiling.

pub mod cache;
pub mod canvas;
pub mod command;
pub mod config;
pub mod duplicate;
pub mod elements;
pub mod error;
pub mod history;
pub mod layout;
pub mod persist;
pub mod scene;
pub mod selection;
pub mod snap;
pub mod storage;
pub mod surface;

pub use cache::{ByteCache, MemoryByteCache, content_key};
pub use canvas::{CanvasDocument, DocumentSettings, Placement, Workspace};
pub use command::{CommandError, CommandOutput, EditorCommand};
pub use config::EngineConfig;
pub use duplicate::{DuplicateDrag, DuplicateDragError, DuplicateDragState, DuplicatePlacement};
pub use elements::{Element, ElementId, ElementPatch, ElementUpdate, Group, Image, Shape, Text};
pub use error::{EditorError, EditorResult};
pub use history::{CommitOutcome, History, HistoryError, Snapshot};
pub use layout::{
    DEFAULT_MARGIN_PX, LayoutAdvisory, LayoutError, Length, MAX_TILE_CELLS, ShelfBatch,
    TileAlignment, TilingMode, TilingOutcome, TilingRequest,
};
pub use persist::{InlineMode, PersistError, PortableDocument};
pub use scene::{Alignment, Axis, SceneStore, ZOrder};
pub use selection::{DragModifiers, DragSession, LiveTransform, Selection, bake_transform};
pub use snap::{SHAPE_SNAP_THRESHOLD, SnapGuide, SnapResult, snap_box};
pub use surface::{HeadlessSurface, NodeId, RenderSurface};
