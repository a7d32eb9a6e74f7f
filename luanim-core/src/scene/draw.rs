//! Draw dispatch.
//!
//! Each node kind turns its resolved props and world transform into
//! protocol instructions. All props are resolved before the first
//! instruction is emitted, so a node whose props fail to read emits nothing.

use glam::{Affine2, Vec2};

use super::node::{NodeKind, Operand};
use super::transform::{axis_scale, mean_scale, rotation};
use crate::error::Result;
use crate::protocol::{Emit, Instruction, Opcode};
use crate::reactive::SignalGraph;

/// Relative tolerance under which two axis scales count as equal.
const UNIFORM_SCALE_TOLERANCE: f32 = 1e-5;

/// Glyph advance of the default monospace estimate, relative to font size.
pub const GLYPH_ADVANCE: f32 = 8.0 / 15.0;

/// Host hook measuring the width of `text` at a font size, in logical units.
pub type TextMeasure = Box<dyn Fn(&str, f32) -> f32>;

/// Width estimate used until the host installs a real measure.
pub fn monospace_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * GLYPH_ADVANCE
}

/// Emission of draw instructions for a node.
pub trait Draw {
    fn draw(&self, graph: &mut SignalGraph, world: &Affine2, out: &mut dyn Emit) -> Result<()>;
}

impl Draw for NodeKind {
    fn draw(&self, graph: &mut SignalGraph, world: &Affine2, out: &mut dyn Emit) -> Result<()> {
        let origin = world.translation;
        match self {
            NodeKind::Group => {}

            NodeKind::Circle { radius } => {
                let radius = graph.get(radius)?;
                let scale = axis_scale(world);
                let uniform = (scale.x - scale.y).abs()
                    <= UNIFORM_SCALE_TOLERANCE * scale.x.max(scale.y);
                if uniform {
                    out.emit(Instruction::builtin(
                        Opcode::Circle,
                        &[origin.x, origin.y, radius * scale.x],
                    ));
                } else {
                    out.emit(Instruction::builtin(
                        Opcode::Ellipse,
                        &[
                            origin.x,
                            origin.y,
                            radius * scale.x,
                            radius * scale.y,
                            rotation(world),
                        ],
                    ));
                }
            }

            NodeKind::Polyline {
                points,
                closed,
                width,
            } => {
                let width = graph.get(width)?;
                let points = points
                    .iter()
                    .map(|point| graph.get(point).map(|p| world.transform_point2(p)))
                    .collect::<Result<Vec<Vec2>>>()?;
                let Some((first, rest)) = points.split_first() else {
                    return Ok(());
                };

                out.emit(Instruction::builtin(
                    Opcode::LineWidth,
                    &[width * mean_scale(world)],
                ));
                out.emit(Instruction::builtin(Opcode::MoveTo, &[first.x, first.y]));
                for point in rest {
                    out.emit(Instruction::builtin(Opcode::LineTo, &[point.x, point.y]));
                }
                if *closed {
                    out.emit(Instruction::builtin(Opcode::ClosePath, &[]));
                }
                out.emit(Instruction::builtin(Opcode::StrokePath, &[]));
            }

            NodeKind::Text { content, size } => {
                let content = graph.get(content)?;
                let size = graph.get(size)?;
                let index = out.intern(&content);
                out.emit(Instruction::builtin(
                    Opcode::Text,
                    &[
                        origin.x,
                        origin.y,
                        size * mean_scale(world),
                        rotation(world),
                        index as f32,
                    ],
                ));
            }

            NodeKind::Custom { opcode, operands } => {
                let mut values = vec![origin.x, origin.y, mean_scale(world), rotation(world)];
                for operand in operands {
                    values.push(match operand {
                        Operand::Float(prop) => graph.get(prop)?,
                        Operand::Int(prop) => graph.get::<i64>(prop)? as f32,
                    });
                }
                out.emit(Instruction::custom(*opcode, values)?);
            }
        }
        Ok(())
    }
}
