#![forbid(unsafe_code)]

//! Runtime: the renderer facade and the steady-frequency frame loop.

pub mod frame_loop;
pub mod renderer;

pub use frame_loop::{FrameLoop, LoopConfig, LoopControl};
pub use renderer::{Renderer, RendererOptions, RuntimeError};
