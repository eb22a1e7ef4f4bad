//! Annotate PNG and JPEG documents with shapes, highlights, cover-ups and
//! rich text, then export the flattened result.
//!
//! The crate is UI-free: [`Editor`] takes pointer and keyboard events in
//! canvas pixel coordinates and keeps the canvas, tool mode, style state and
//! text editing session consistent. The `doc-annotate` binary drives it
//! from an egui window.

pub mod canvas;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod export;
pub mod geometry;
pub mod history;
pub mod shape;
pub mod style;
pub mod text;
pub mod tool;

pub use canvas::Canvas;
pub use config::EditorConfig;
pub use document::{DocumentKind, SourceDocument, UploadPolicy};
pub use editor::{Editor, InputEvent, Key};
pub use error::{ConfigError, ExportError, UploadError};
pub use export::{export_image, load_font, ExportMode, ExportedFile};
pub use geometry::{Bounds, Point};
pub use shape::{create_shape, update_shape, Drawable, Geometry, ObjectId, ShapeKind};
pub use style::{Color, HighlightStyle, ShapeStyle, StyleState, TextAlign, TextStyle};
pub use text::{TextBox, TextEditSession};
pub use tool::{ToolMode, ToolState};
