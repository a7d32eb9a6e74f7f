//! Opcodes and Instructions
//!
//! Every draw instruction is an opcode byte followed by a short list of
//! numeric operands. Opcodes below [`CUSTOM_OPCODE_BASE`] are built in and
//! have a fixed arity; the rest belong to the application and are carried
//! through untouched.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{Error, Result};

/// First opcode available to application-defined instructions.
pub const CUSTOM_OPCODE_BASE: u8 = 128;

/// Built-in drawing operations.
///
/// Coordinates are in canvas space; the renderer applies no transform of its
/// own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Opcode {
    /// `alpha`: opacity applied to everything that follows.
    Opacity = 2,
    /// `width`: stroke width for following paths.
    LineWidth = 3,
    /// `x, y, radius`
    Circle = 4,
    /// `x, y`: starts a new path.
    MoveTo = 7,
    /// `x, y`
    LineTo = 9,
    ClosePath = 10,
    /// `x, y, size, rotation, string`: the last operand indexes the frame's
    /// string table.
    Text = 13,
    /// `x, y, radius_x, radius_y, rotation`
    Ellipse = 19,
    /// Strokes the current path.
    StrokePath = 20,
}

impl Opcode {
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            2 => Opcode::Opacity,
            3 => Opcode::LineWidth,
            4 => Opcode::Circle,
            7 => Opcode::MoveTo,
            9 => Opcode::LineTo,
            10 => Opcode::ClosePath,
            13 => Opcode::Text,
            19 => Opcode::Ellipse,
            20 => Opcode::StrokePath,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Number of operands the instruction carries.
    pub fn arity(self) -> usize {
        match self {
            Opcode::ClosePath | Opcode::StrokePath => 0,
            Opcode::Opacity | Opcode::LineWidth => 1,
            Opcode::MoveTo | Opcode::LineTo => 2,
            Opcode::Circle => 3,
            Opcode::Text | Opcode::Ellipse => 5,
        }
    }
}

/// A single draw instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: u8,
    pub operands: SmallVec<[f32; 6]>,
}

impl Instruction {
    pub fn builtin(opcode: Opcode, operands: &[f32]) -> Self {
        debug_assert_eq!(operands.len(), opcode.arity(), "{opcode:?} arity");
        Self {
            opcode: opcode.code(),
            operands: SmallVec::from_slice(operands),
        }
    }

    /// An application-defined instruction.
    ///
    /// Fails with [`Error::ReservedOpcode`] for opcodes in the built-in range.
    pub fn custom(opcode: u8, operands: impl IntoIterator<Item = f32>) -> Result<Self> {
        if opcode < CUSTOM_OPCODE_BASE {
            return Err(Error::ReservedOpcode { opcode });
        }
        Ok(Self {
            opcode,
            operands: operands.into_iter().collect(),
        })
    }

    /// The built-in opcode, if this is a known built-in instruction.
    pub fn builtin_opcode(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode)
    }

    pub fn is_custom(&self) -> bool {
        self.opcode >= CUSTOM_OPCODE_BASE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_round_trip_through_bytes() {
        for op in [
            Opcode::Opacity,
            Opcode::LineWidth,
            Opcode::Circle,
            Opcode::MoveTo,
            Opcode::LineTo,
            Opcode::ClosePath,
            Opcode::Text,
            Opcode::Ellipse,
            Opcode::StrokePath,
        ] {
            assert_eq!(Opcode::from_u8(op.code()), Some(op));
        }
        assert_eq!(Opcode::from_u8(0), None);
        assert_eq!(Opcode::from_u8(200), None);
    }

    #[test]
    fn custom_opcodes_must_be_in_open_range() {
        assert_eq!(
            Instruction::custom(20, [1.0]),
            Err(Error::ReservedOpcode { opcode: 20 })
        );

        let instr = Instruction::custom(130, [1.0, 2.0]).unwrap();
        assert!(instr.is_custom());
        assert_eq!(instr.builtin_opcode(), None);
        assert_eq!(instr.operands.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn builtin_keeps_operands_inline() {
        let instr = Instruction::builtin(Opcode::Circle, &[0.0, 1.0, 2.0]);
        assert_eq!(instr.opcode, 4);
        assert!(!instr.operands.spilled());
    }
}
