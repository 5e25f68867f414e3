#![forbid(unsafe_code)]

//! Umbrella crate: one `use otui::prelude::*` away from the engine.
//!
//! The pipeline, end to end: a retained scene tree is laid out by the
//! flexbox solver, composited into a double-buffered cell grid, diffed
//! against the previously presented frame, and written out as minimal
//! ANSI. Input bytes stream back through the parser into typed events,
//! hit testing, and selection.

pub use otui_core as core;
pub use otui_layout as layout;
pub use otui_render as render;
pub use otui_runtime as runtime;
pub use otui_scene as scene;
pub use otui_style as style;
pub use otui_text as text;

/// The types most applications touch.
pub mod prelude {
    pub use otui_core::capabilities::Capabilities;
    pub use otui_core::event::{Event, KeyCode, KeyEvent, Modifiers, MouseButton, MouseEvent};
    pub use otui_core::geometry::{Rect, Sides, Size};
    pub use otui_core::session::{SessionOptions, TerminalSession};
    pub use otui_layout::{
        AlignItems, ContainerStyle, Dimension, FlexDirection, ItemStyle, JustifyContent,
    };
    pub use otui_render::buffer::{BorderStyle, OptimizedBuffer, SampleMode};
    pub use otui_render::cell::{Cell, CellAttrs, PackedRgba, StyleFlags};
    pub use otui_render::presenter::{CursorHint, FramePresenter};
    pub use otui_runtime::{FrameLoop, LoopConfig, Renderer, RendererOptions};
    pub use otui_scene::{NodeId, NodeKind, PointerEvent, PointerKind, SceneTree};
    pub use otui_style::{Rgba, Style, StyleRegistry};
    pub use otui_text::breaks::WrapMode;
    pub use otui_text::width::{EastAsianPolicy, TabPolicy};
    pub use otui_text::{StyledChunk, TextBuffer};
}
