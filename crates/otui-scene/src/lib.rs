#![forbid(unsafe_code)]

//! Retained scene graph: nodes, flexbox-driven layout, z-ordered
//! compositing, hit testing, and drag/selection routing.

pub mod compositor;
pub mod hit;
pub mod node;
pub mod selection;

pub use hit::{PointerEvent, PointerKind, PointerRouter};
pub use node::{NodeId, NodeKind, SceneNode, SceneTree};
pub use selection::{osc52_copy, SelectionController, SelectionSnapshot};
