//! Scene Nodes
//!
//! A node is a transform, an opacity, a visibility flag and a shape, every
//! one of them a signal. The shape is a closed set of variants; drawing is
//! dispatched through [`Draw`](super::Draw).

use std::fmt;

use glam::Vec2;

use crate::reactive::{Prop, SignalId};

/// Stable index of a node in the scene arena. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Properties shared by every node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeProps {
    /// Translation relative to the parent.
    pub position: Prop<Vec2>,
    pub scale: Prop<Vec2>,
    /// Radians, counter-clockwise.
    pub rotation: Prop<f32>,
    /// Multiplied with the parent's opacity.
    pub opacity: Prop<f32>,
    /// Hides the node and its whole subtree.
    pub visible: Prop<bool>,
}

/// Operand of an application-defined instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Float(Prop<f32>),
    Int(Prop<i64>),
}

/// The shape of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Draws nothing; only carries a transform for its children.
    Group,
    Circle {
        radius: Prop<f32>,
    },
    Polyline {
        points: Vec<Prop<Vec2>>,
        closed: bool,
        width: Prop<f32>,
    },
    Text {
        content: Prop<String>,
        size: Prop<f32>,
    },
    /// Emits `opcode` with the node's placement followed by `operands`.
    Custom {
        opcode: u8,
        operands: Vec<Operand>,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Group => "group",
            NodeKind::Circle { .. } => "circle",
            NodeKind::Polyline { .. } => "polyline",
            NodeKind::Text { .. } => "text",
            NodeKind::Custom { .. } => "custom",
        }
    }

    pub fn draws(&self) -> bool {
        !matches!(self, NodeKind::Group)
    }
}

/// An element of the scene tree.
#[derive(Debug)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) props: NodeProps,
    pub(crate) kind: NodeKind,
    /// Signals created for this node; disposed when it is destroyed.
    pub(crate) owned: Vec<SignalId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in draw order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn props(&self) -> &NodeProps {
        &self.props
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn owned_signals(&self) -> &[SignalId] {
        &self.owned
    }
}
