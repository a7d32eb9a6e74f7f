//! Node Builder
//!
//! Every node property becomes a signal when the node is created. The
//! builder records how each one should be seeded:
//!
//! - a literal value creates a fresh source signal owned by the node,
//! - a closure creates a derived signal owned by the node,
//! - an existing handle is bound as-is and stays owned by whoever made it.
//!
//! ```rust
//! use glam::Vec2;
//! use luanim_core::scene::{Init, NodeBuilder};
//!
//! let builder = NodeBuilder::circle(12.0)
//!     .position(Vec2::new(-40.0, 0.0))
//!     .opacity(Init::derive(|_| Ok(0.5)));
//! ```

use std::fmt;
use std::rc::Rc;

use glam::Vec2;

use super::node::{NodeKind, NodeProps, Operand};
use crate::error::{Error, Result};
use crate::protocol::CUSTOM_OPCODE_BASE;
use crate::reactive::{Input, Memo, Prop, Recompute, Signal, SignalGraph, SignalId, SignalValue};

type DeriveFn<T> = Rc<dyn Fn(&mut Recompute<'_>) -> Result<T>>;

/// How a node property is seeded.
pub enum Init<T> {
    Value(T),
    Derive(DeriveFn<T>),
    Bind(Prop<T>),
}

impl<T> Init<T> {
    pub fn derive<F>(compute: F) -> Self
    where
        F: Fn(&mut Recompute<'_>) -> Result<T> + 'static,
    {
        Init::Derive(Rc::new(compute))
    }
}

impl<T: SignalValue> Init<T> {
    fn realize(self, graph: &mut SignalGraph, owned: &mut Vec<SignalId>) -> Result<Prop<T>> {
        let prop = match self {
            Init::Value(value) => Prop::Signal(graph.create(value)),
            Init::Derive(compute) => Prop::Memo(graph.derive(move |cx| compute(cx))?),
            Init::Bind(prop) => return Ok(prop),
        };
        owned.push(prop.id());
        Ok(prop)
    }
}

impl<T: fmt::Debug> fmt::Debug for Init<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Init::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Init::Derive(_) => f.write_str("Derive(..)"),
            Init::Bind(prop) => f.debug_tuple("Bind").field(prop).finish(),
        }
    }
}

macro_rules! init_from_literal {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Init<$ty> {
                fn from(value: $ty) -> Self {
                    Init::Value(value)
                }
            }
        )*
    };
}

init_from_literal!(f32, Vec2, i64, bool, String);

impl From<&str> for Init<String> {
    fn from(value: &str) -> Self {
        Init::Value(value.to_string())
    }
}

impl From<[f32; 2]> for Init<Vec2> {
    fn from([x, y]: [f32; 2]) -> Self {
        Init::Value(Vec2::new(x, y))
    }
}

impl<T> From<Signal<T>> for Init<T> {
    fn from(signal: Signal<T>) -> Self {
        Init::Bind(Prop::Signal(signal))
    }
}

impl<T> From<Memo<T>> for Init<T> {
    fn from(memo: Memo<T>) -> Self {
        Init::Bind(Prop::Memo(memo))
    }
}

impl<T> From<Prop<T>> for Init<T> {
    fn from(prop: Prop<T>) -> Self {
        Init::Bind(prop)
    }
}

/// Inputs are read-only, so binding one wraps it in a derived signal.
impl<T: SignalValue> From<Input<T>> for Init<T> {
    fn from(input: Input<T>) -> Self {
        Init::derive(move |cx| cx.read(input))
    }
}

#[derive(Debug)]
enum OperandInit {
    Float(Init<f32>),
    Int(Init<i64>),
}

#[derive(Debug)]
enum KindInit {
    Group,
    Circle {
        radius: Init<f32>,
    },
    Polyline {
        points: Vec<Init<Vec2>>,
        closed: bool,
        width: Init<f32>,
    },
    Text {
        content: Init<String>,
        size: Init<f32>,
    },
    Custom {
        opcode: u8,
        operands: Vec<OperandInit>,
    },
}

/// Description of a node to create with
/// [`SceneTree::create`](super::SceneTree::create).
#[derive(Debug)]
pub struct NodeBuilder {
    position: Init<Vec2>,
    scale: Init<Vec2>,
    rotation: Init<f32>,
    opacity: Init<f32>,
    visible: Init<bool>,
    kind: KindInit,
}

impl NodeBuilder {
    fn with_kind(kind: KindInit) -> Self {
        Self {
            position: Init::Value(Vec2::ZERO),
            scale: Init::Value(Vec2::ONE),
            rotation: Init::Value(0.0),
            opacity: Init::Value(1.0),
            visible: Init::Value(true),
            kind,
        }
    }

    pub fn group() -> Self {
        Self::with_kind(KindInit::Group)
    }

    pub fn circle(radius: impl Into<Init<f32>>) -> Self {
        Self::with_kind(KindInit::Circle {
            radius: radius.into(),
        })
    }

    /// An open polyline through `points`, stroked one unit wide.
    pub fn polyline<P: Into<Init<Vec2>>>(points: impl IntoIterator<Item = P>) -> Self {
        Self::with_kind(KindInit::Polyline {
            points: points.into_iter().map(Into::into).collect(),
            closed: false,
            width: Init::Value(1.0),
        })
    }

    /// A text label of unit size.
    pub fn text(content: impl Into<Init<String>>) -> Self {
        Self::with_kind(KindInit::Text {
            content: content.into(),
            size: Init::Value(1.0),
        })
    }

    /// An application-defined shape. The opcode is checked when the node is
    /// created.
    pub fn custom(opcode: u8) -> Self {
        Self::with_kind(KindInit::Custom {
            opcode,
            operands: Vec::new(),
        })
    }

    pub fn position(mut self, position: impl Into<Init<Vec2>>) -> Self {
        self.position = position.into();
        self
    }

    pub fn scale(mut self, scale: impl Into<Init<Vec2>>) -> Self {
        self.scale = scale.into();
        self
    }

    pub fn uniform_scale(self, scale: f32) -> Self {
        self.scale(Vec2::splat(scale))
    }

    pub fn rotation(mut self, rotation: impl Into<Init<f32>>) -> Self {
        self.rotation = rotation.into();
        self
    }

    pub fn opacity(mut self, opacity: impl Into<Init<f32>>) -> Self {
        self.opacity = opacity.into();
        self
    }

    pub fn visible(mut self, visible: impl Into<Init<bool>>) -> Self {
        self.visible = visible.into();
        self
    }

    /// Close the path back to its first point. Polylines only.
    pub fn closed(mut self) -> Self {
        if let KindInit::Polyline { closed, .. } = &mut self.kind {
            *closed = true;
        }
        self
    }

    /// Stroke width. Polylines only.
    pub fn width(mut self, value: impl Into<Init<f32>>) -> Self {
        if let KindInit::Polyline { width, .. } = &mut self.kind {
            *width = value.into();
        }
        self
    }

    /// Font size. Text only.
    pub fn size(mut self, value: impl Into<Init<f32>>) -> Self {
        if let KindInit::Text { size, .. } = &mut self.kind {
            *size = value.into();
        }
        self
    }

    /// Append a float operand. Custom nodes only.
    pub fn operand(mut self, value: impl Into<Init<f32>>) -> Self {
        if let KindInit::Custom { operands, .. } = &mut self.kind {
            operands.push(OperandInit::Float(value.into()));
        }
        self
    }

    /// Append an integer operand. Custom nodes only.
    pub fn int_operand(mut self, value: impl Into<Init<i64>>) -> Self {
        if let KindInit::Custom { operands, .. } = &mut self.kind {
            operands.push(OperandInit::Int(value.into()));
        }
        self
    }

    /// Turn every seed into a signal.
    ///
    /// On failure every signal created so far is disposed again, so a failed
    /// build leaves the graph untouched.
    pub(crate) fn realize(
        self,
        graph: &mut SignalGraph,
    ) -> Result<(NodeProps, NodeKind, Vec<SignalId>)> {
        let mut owned = Vec::new();
        match self.realize_into(graph, &mut owned) {
            Ok((props, kind)) => Ok((props, kind, owned)),
            Err(err) => {
                for id in owned {
                    graph.dispose(id);
                }
                Err(err)
            }
        }
    }

    fn realize_into(
        self,
        graph: &mut SignalGraph,
        owned: &mut Vec<SignalId>,
    ) -> Result<(NodeProps, NodeKind)> {
        if let KindInit::Custom { opcode, .. } = &self.kind {
            if *opcode < CUSTOM_OPCODE_BASE {
                return Err(Error::ReservedOpcode { opcode: *opcode });
            }
        }

        let props = NodeProps {
            position: self.position.realize(graph, owned)?,
            scale: self.scale.realize(graph, owned)?,
            rotation: self.rotation.realize(graph, owned)?,
            opacity: self.opacity.realize(graph, owned)?,
            visible: self.visible.realize(graph, owned)?,
        };

        let kind = match self.kind {
            KindInit::Group => NodeKind::Group,
            KindInit::Circle { radius } => NodeKind::Circle {
                radius: radius.realize(graph, owned)?,
            },
            KindInit::Polyline {
                points,
                closed,
                width,
            } => NodeKind::Polyline {
                points: points
                    .into_iter()
                    .map(|point| point.realize(graph, owned))
                    .collect::<Result<_>>()?,
                closed,
                width: width.realize(graph, owned)?,
            },
            KindInit::Text { content, size } => NodeKind::Text {
                content: content.realize(graph, owned)?,
                size: size.realize(graph, owned)?,
            },
            KindInit::Custom { opcode, operands } => NodeKind::Custom {
                opcode,
                operands: operands
                    .into_iter()
                    .map(|operand| match operand {
                        OperandInit::Float(init) => init.realize(graph, owned).map(Operand::Float),
                        OperandInit::Int(init) => init.realize(graph, owned).map(Operand::Int),
                    })
                    .collect::<Result<_>>()?,
            },
        };

        Ok((props, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_become_owned_sources() {
        let mut graph = SignalGraph::new();
        let (props, kind, owned) = NodeBuilder::circle(3.0).realize(&mut graph).unwrap();

        assert_eq!(owned.len(), 6);
        assert!(props.position.signal().is_ok());
        assert_eq!(graph.get(props.scale).unwrap(), Vec2::ONE);
        let NodeKind::Circle { radius } = kind else {
            panic!("expected a circle");
        };
        assert_eq!(graph.get(radius).unwrap(), 3.0);
    }

    #[test]
    fn bound_handles_are_not_owned() {
        let mut graph = SignalGraph::new();
        let shared = graph.create(Vec2::new(1.0, 2.0));

        let (props, _, owned) = NodeBuilder::group()
            .position(shared)
            .realize(&mut graph)
            .unwrap();

        assert_eq!(props.position, Prop::Signal(shared));
        assert!(!owned.contains(&shared.id()));
    }

    #[test]
    fn closures_become_derived_props() {
        let mut graph = SignalGraph::new();
        let base = graph.create(0.25f32);

        let (props, _, _) = NodeBuilder::group()
            .opacity(Init::derive(move |cx| Ok(cx.read(base)? * 2.0)))
            .realize(&mut graph)
            .unwrap();

        assert!(matches!(props.opacity, Prop::Memo(_)));
        graph.set(base, 0.5).unwrap();
        assert_eq!(graph.get(props.opacity).unwrap(), 1.0);
    }

    #[test]
    fn failed_builds_release_their_signals() {
        let mut graph = SignalGraph::new();
        let err = NodeBuilder::circle(Init::derive(|cx| cx.read_named::<f32>("missing")))
            .realize(&mut graph)
            .unwrap_err();

        assert!(matches!(err, Error::UnknownInput { .. }));
        assert!(graph.is_empty());
    }

    #[test]
    fn reserved_custom_opcodes_are_rejected() {
        let mut graph = SignalGraph::new();
        let err = NodeBuilder::custom(4).realize(&mut graph).unwrap_err();
        assert_eq!(err, Error::ReservedOpcode { opcode: 4 });
    }

    #[test]
    fn kind_specific_setters_apply_to_matching_kinds() {
        let mut graph = SignalGraph::new();
        let (_, kind, _) = NodeBuilder::polyline([Vec2::ZERO, Vec2::ONE])
            .closed()
            .width(2.0)
            .size(9.0)
            .realize(&mut graph)
            .unwrap();

        let NodeKind::Polyline {
            points,
            closed,
            width,
        } = kind
        else {
            panic!("expected a polyline");
        };
        assert_eq!(points.len(), 2);
        assert!(closed);
        assert_eq!(graph.get(width).unwrap(), 2.0);
    }
}
