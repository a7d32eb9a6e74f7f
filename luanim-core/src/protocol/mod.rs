//! Draw-Instruction Protocol
//!
//! The scene tree never draws anything itself. Traversal emits a flat list
//! of opcode-tagged instructions into a [`Frame`], and the host hands each
//! frame to a [`Renderer`]. The format is versioned and forward compatible:
//! consumers skip instructions they do not understand.

mod frame;
mod opcode;

pub use frame::{Command, Emit, Frame, Renderer, StringTable, PROTOCOL_VERSION};
pub use opcode::{Instruction, Opcode, CUSTOM_OPCODE_BASE};
