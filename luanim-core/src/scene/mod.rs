//! Scene Graph
//!
//! Nodes are composable shapes whose every property is a signal. The tree
//! owns the nodes; scripts hold `Copy` [`NodeId`]s and mutate the tree
//! through attach, detach and destroy. Once per tick the engine walks the
//! tree and turns it into draw instructions.

mod builder;
mod draw;
mod node;
mod transform;
mod tree;

pub use builder::{Init, NodeBuilder};
pub use draw::{monospace_width, Draw, TextMeasure, GLYPH_ADVANCE};
pub use node::{Node, NodeId, NodeKind, NodeProps, Operand};
pub use transform::{axis_scale, local, mean_scale, rotation, viewport, DEFAULT_EXTENT};
pub use tree::SceneTree;
