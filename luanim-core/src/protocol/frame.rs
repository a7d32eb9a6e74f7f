//! Frames
//!
//! A frame is everything the renderer needs for one tick: the instructions
//! in traversal order and the string table referenced by text instructions.
//! Frames serialize to MessagePack for transport and to JSON for debugging.

use glam::Vec2;
use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::opcode::{Instruction, Opcode};
use crate::error::{Error, Result};

/// Wire format version stamped on every frame.
pub const PROTOCOL_VERSION: u16 = 1;

/// One tick's worth of draw instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub version: u16,
    /// Zero-based tick counter.
    pub index: u64,
    /// Virtual time of the tick, in seconds.
    pub time: f64,
    pub instructions: Vec<Instruction>,
    /// Interned strings; text instructions refer to them by position.
    pub strings: StringTable,
}

impl Frame {
    pub fn new(index: u64, time: f64) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            index,
            time,
            instructions: Vec::new(),
            strings: StringTable::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn string(&self, index: u32) -> Option<&str> {
        self.strings.get(index)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| Error::Encode(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::Encode(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Encode(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Encode(e.to_string()))
    }

    /// Decode the instructions into typed commands.
    ///
    /// Instructions this version cannot decode (unknown built-in opcodes,
    /// short operand lists, dangling string references) are skipped.
    pub fn commands(&self) -> impl Iterator<Item = Command<'_>> {
        self.instructions
            .iter()
            .filter_map(move |instr| Command::decode(instr, &self.strings))
    }
}

/// Sink for draw instructions during traversal.
pub trait Emit {
    fn emit(&mut self, instruction: Instruction);

    /// Index of `text` in the string table, adding it if needed.
    fn intern(&mut self, text: &str) -> u32;
}

impl Emit for Frame {
    fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    fn intern(&mut self, text: &str) -> u32 {
        self.strings.intern(text)
    }
}

/// Strings referenced by text instructions, in first-use order.
///
/// Serialized as a plain sequence.
#[derive(Debug, Clone, Default)]
pub struct StringTable(IndexSet<String>);

impl StringTable {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.0.get_index(index as usize).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Index of `text`, adding it if needed.
    pub fn intern(&mut self, text: &str) -> u32 {
        if let Some(index) = self.0.get_index_of(text) {
            return index as u32;
        }
        self.0.insert_full(text.to_string()).0 as u32
    }
}

impl PartialEq for StringTable {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().eq(other.0.iter())
    }
}

impl Serialize for StringTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for StringTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        let len = strings.len();
        let table: IndexSet<String> = strings.into_iter().collect();
        if table.len() != len {
            return Err(serde::de::Error::custom("duplicate entry in string table"));
        }
        Ok(Self(table))
    }
}

/// A decoded draw instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Command<'a> {
    Opacity(f32),
    LineWidth(f32),
    Circle {
        center: Vec2,
        radius: f32,
    },
    Ellipse {
        center: Vec2,
        radii: Vec2,
        rotation: f32,
    },
    MoveTo(Vec2),
    LineTo(Vec2),
    ClosePath,
    StrokePath,
    Text {
        position: Vec2,
        size: f32,
        rotation: f32,
        text: &'a str,
    },
    Custom {
        opcode: u8,
        operands: &'a [f32],
    },
}

impl<'a> Command<'a> {
    pub fn decode(instr: &'a Instruction, strings: &'a StringTable) -> Option<Self> {
        if instr.is_custom() {
            return Some(Command::Custom {
                opcode: instr.opcode,
                operands: instr.operands.as_slice(),
            });
        }

        let opcode = instr.builtin_opcode()?;
        let ops = instr.operands.as_slice();
        if ops.len() < opcode.arity() {
            return None;
        }

        Some(match opcode {
            Opcode::Opacity => Command::Opacity(ops[0]),
            Opcode::LineWidth => Command::LineWidth(ops[0]),
            Opcode::Circle => Command::Circle {
                center: Vec2::new(ops[0], ops[1]),
                radius: ops[2],
            },
            Opcode::Ellipse => Command::Ellipse {
                center: Vec2::new(ops[0], ops[1]),
                radii: Vec2::new(ops[2], ops[3]),
                rotation: ops[4],
            },
            Opcode::MoveTo => Command::MoveTo(Vec2::new(ops[0], ops[1])),
            Opcode::LineTo => Command::LineTo(Vec2::new(ops[0], ops[1])),
            Opcode::ClosePath => Command::ClosePath,
            Opcode::StrokePath => Command::StrokePath,
            Opcode::Text => {
                let index = ops[4];
                if index < 0.0 || index.fract() != 0.0 || index > u32::MAX as f32 {
                    return None;
                }
                Command::Text {
                    position: Vec2::new(ops[0], ops[1]),
                    size: ops[2],
                    rotation: ops[3],
                    text: strings.get(index as u32)?,
                }
            }
        })
    }
}

/// The external drawing backend.
pub trait Renderer {
    fn render(&mut self, frame: &Frame) -> Result<()>;
}

/// Recording renderer, handy for headless runs.
impl Renderer for Vec<Frame> {
    fn render(&mut self, frame: &Frame) -> Result<()> {
        self.push(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn sample() -> Frame {
        let mut frame = Frame::new(3, 0.05);
        frame.emit(Instruction::builtin(Opcode::Opacity, &[0.5]));
        let label = frame.intern("hello");
        frame.emit(Instruction::builtin(
            Opcode::Text,
            &[10.0, 20.0, 1.0, 0.0, label as f32],
        ));
        frame.emit(Instruction::custom(140, [7.0]).unwrap());
        frame
    }

    #[test]
    fn interning_reuses_entries() {
        let mut frame = Frame::new(0, 0.0);
        assert_eq!(frame.intern("a"), 0);
        assert_eq!(frame.intern("b"), 1);
        assert_eq!(frame.intern("a"), 0);
        assert_eq!(frame.strings.len(), 2);
        assert_eq!(frame.string(1), Some("b"));
    }

    #[test]
    fn interning_many_labels_keeps_first_use_order() {
        let mut frame = Frame::new(0, 0.0);
        for round in 0..3 {
            for i in 0..500u32 {
                assert_eq!(frame.intern(&format!("label-{i}")), i, "round {round}");
            }
        }
        assert_eq!(frame.strings.len(), 500);
        assert_eq!(frame.strings.iter().next(), Some("label-0"));
    }

    #[test]
    fn duplicate_strings_are_rejected_on_decode() {
        let json = r#"{"version":1,"index":0,"time":0.0,"instructions":[],"strings":["a","a"]}"#;
        assert!(matches!(Frame::from_json(json), Err(Error::Encode(_))));
    }

    #[test]
    fn msgpack_preserves_frames() {
        let frame = sample();
        let bytes = frame.to_msgpack().unwrap();
        assert_eq!(Frame::from_msgpack(&bytes).unwrap(), frame);
    }

    #[test]
    fn json_carries_version_and_strings() {
        let json = sample().to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["version"], PROTOCOL_VERSION);
        assert_eq!(parsed["strings"][0], "hello");
    }

    #[test]
    fn commands_decode_and_skip_unknown() {
        let mut frame = sample();
        frame.emit(Instruction {
            opcode: 50,
            operands: Default::default(),
        });
        frame.emit(Instruction {
            opcode: Opcode::Circle.code(),
            operands: smallvec![1.0],
        });

        let commands: Vec<_> = frame.commands().collect();
        assert_eq!(
            commands,
            vec![
                Command::Opacity(0.5),
                Command::Text {
                    position: Vec2::new(10.0, 20.0),
                    size: 1.0,
                    rotation: 0.0,
                    text: "hello",
                },
                Command::Custom {
                    opcode: 140,
                    operands: &[7.0],
                },
            ]
        );
    }

    #[test]
    fn recording_renderer_keeps_frames() {
        let mut frames: Vec<Frame> = Vec::new();
        frames.render(&sample()).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].index, 3);
    }
}
