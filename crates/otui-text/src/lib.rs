#![forbid(unsafe_code)]

//! Text subsystem: Unicode width, break scanning, the marker rope, and the
//! styled text buffer with its wrap cache.

pub mod breaks;
pub mod rope;
pub mod text_buffer;
pub mod width;

pub use breaks::{find_line_breaks, find_wrap_breaks, LineBreakKind, WrapMode};
pub use rope::{Metrics, Rope, Segment};
pub use text_buffer::{Highlight, StyledChunk, TextBuffer, VisualChunk};
pub use width::{
    calculate_text_width, find_pos_by_width, find_wrap_pos_by_width, grapheme_width,
    is_ascii_only, EastAsianPolicy,
};
