//! Layered raster image-editing engine.
//!
//! [`Editor`] is the entry point: load an image, apply filters, transforms,
//! layer and selection operations, undo/redo them, and export the composite.
//! The engine never touches the file system.

pub mod canvas;
pub mod components;
pub mod config;
pub mod editor;
pub mod error;
pub mod io;
pub mod ops;
pub mod selection;

pub use canvas::{BlendMode, Dimensions, Layer, LayerStack, PixelBuffer, Rect};
pub use components::history::{HistoryManager, HistorySnapshot};
pub use config::EditorConfig;
pub use editor::Editor;
pub use error::{EditorError, EditorResult};
pub use io::{ExportFormat, ImageSource};
pub use ops::canvas_ops::LayerInfo;
pub use ops::effects::ConvolutionKind;
pub use ops::shapes::{ShapeKind, ShapeStyle};
pub use selection::{Point, SelectionInfo, SelectionMask};
