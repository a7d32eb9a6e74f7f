//! Scene Tree
//!
//! The tree owns every node in an arena. Ownership is singular: a node has
//! at most one parent, children are drawn in insertion order, and a detached
//! node stays alive as an orphan until it is attached again or destroyed.
//!
//! # Traversal
//!
//! Traversal is pre-order depth-first. For each node it:
//!
//! 1. resolves the transform, opacity and visibility signals,
//! 2. skips the node and its subtree if it is invisible,
//! 3. composes `parent_world * local` and multiplies opacity down the tree,
//! 4. emits an `Opacity` instruction if the effective opacity differs from
//!    the last one emitted, then the node's own instructions,
//! 5. recurses into the children.
//!
//! A node whose props fail to resolve is skipped together with its subtree;
//! the failure is logged and the rest of the frame is still drawn.

use glam::{Affine2, Vec2};
use tracing::{debug, trace, warn};

use super::builder::NodeBuilder;
use super::draw::Draw;
use super::node::{Node, NodeId, NodeProps};
use super::transform;
use crate::error::{Error, Result};
use crate::protocol::{Emit, Instruction, Opcode};
use crate::reactive::{SignalGraph, SignalId};

/// Arena of scene nodes.
#[derive(Debug, Default)]
pub struct SceneTree {
    nodes: Vec<Option<Node>>,
    live: usize,
}

/// Per-frame state carried through traversal.
struct Pass<'e> {
    out: &'e mut dyn Emit,
    /// Opacity currently in effect on the renderer side.
    opacity: f32,
    drawn: usize,
}

/// Props resolved for one visit.
struct Placement {
    position: Vec2,
    scale: Vec2,
    rotation: f32,
    opacity: f32,
    visible: bool,
}

impl Placement {
    fn resolve(graph: &mut SignalGraph, props: &NodeProps) -> Result<Self> {
        Ok(Self {
            position: graph.get(props.position)?,
            scale: graph.get(props.scale)?,
            rotation: graph.get(props.rotation)?,
            opacity: graph.get(props.opacity)?,
            visible: graph.get(props.visible)?,
        })
    }
}

impl SceneTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Create an orphan node, turning the builder's seeds into signals.
    pub fn create(&mut self, graph: &mut SignalGraph, builder: NodeBuilder) -> Result<NodeId> {
        let (props, kind, owned) = builder.realize(graph)?;
        let id = NodeId::from_raw(self.nodes.len() as u32);
        debug!(node = %id, kind = kind.name(), signals = owned.len(), "node created");
        self.nodes.push(Some(Node {
            parent: None,
            children: Vec::new(),
            props,
            kind,
            owned,
        }));
        self.live += 1;
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(Error::DetachedNodeReference { node: id })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(Error::DetachedNodeReference { node: id })
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        self.node(id).map(Node::parent)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        self.node(id).map(Node::children)
    }

    /// Whether `ancestor` is `id` or lies on the path from `id` to its root.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.node(node).ok().and_then(Node::parent);
        }
        false
    }

    /// Append `child` to the children of `parent`.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node(parent)?;
        if let Some(owner) = self.node(child)?.parent {
            return Err(Error::AlreadyOwned {
                child,
                parent: owner,
            });
        }
        if self.is_ancestor(child, parent) {
            return Err(Error::OwnershipCycle { child, parent });
        }

        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        debug!(parent = %parent, child = %child, "node attached");
        Ok(())
    }

    /// Remove `child` from `parent`, leaving it an orphan.
    ///
    /// Detaching a node that is not a child of `parent` does nothing.
    pub fn detach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_node = self.node_mut(parent)?;
        let Some(position) = parent_node.children.iter().position(|&c| c == child) else {
            return Ok(());
        };
        parent_node.children.remove(position);

        if let Ok(child_node) = self.node_mut(child) {
            child_node.parent = None;
        }
        debug!(parent = %parent, child = %child, "node detached");
        Ok(())
    }

    /// Record `signal` as owned by `node`, so it is disposed with it.
    pub fn adopt(&mut self, node: NodeId, signal: SignalId) -> Result<()> {
        let node = self.node_mut(node)?;
        if !node.owned.contains(&signal) {
            node.owned.push(signal);
        }
        Ok(())
    }

    /// Detach `id` and free it together with its whole subtree, disposing
    /// every signal the freed nodes own.
    pub fn destroy(&mut self, graph: &mut SignalGraph, id: NodeId) -> Result<()> {
        if let Some(parent) = self.node(id)?.parent {
            self.detach(parent, id)?;
        }

        let mut stack = vec![id];
        let mut freed = 0;
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current.index()).and_then(Option::take) else {
                continue;
            };
            for signal in node.owned {
                graph.dispose(signal);
            }
            stack.extend(node.children);
            freed += 1;
        }

        self.live -= freed;
        debug!(node = %id, freed, "subtree destroyed");
        Ok(())
    }

    /// Walk the subtree under `root`, emitting draw instructions.
    ///
    /// `base` is the transform of the space `root` lives in, usually the
    /// viewport transform. Returns the number of nodes that drew something.
    pub fn traverse(
        &self,
        graph: &mut SignalGraph,
        root: NodeId,
        base: Affine2,
        out: &mut dyn Emit,
    ) -> Result<usize> {
        self.node(root)?;
        let mut pass = Pass {
            out,
            opacity: 1.0,
            drawn: 0,
        };
        self.visit(graph, root, &base, 1.0, &mut pass);
        trace!(root = %root, drawn = pass.drawn, "traversal finished");
        Ok(pass.drawn)
    }

    fn visit(
        &self,
        graph: &mut SignalGraph,
        id: NodeId,
        parent_world: &Affine2,
        parent_opacity: f32,
        pass: &mut Pass<'_>,
    ) {
        let Ok(node) = self.node(id) else {
            return;
        };
        let placement = match Placement::resolve(graph, &node.props) {
            Ok(placement) => placement,
            Err(err) => {
                warn!(node = %id, error = %err, "skipping subtree with unreadable props");
                return;
            }
        };
        if !placement.visible {
            return;
        }

        let world = *parent_world
            * transform::local(placement.position, placement.scale, placement.rotation);
        let opacity = parent_opacity * placement.opacity;

        if node.kind.draws() {
            if opacity != pass.opacity {
                pass.out
                    .emit(Instruction::builtin(Opcode::Opacity, &[opacity]));
                pass.opacity = opacity;
            }
            if let Err(err) = node.kind.draw(graph, &world, &mut *pass.out) {
                warn!(node = %id, error = %err, "skipping subtree that failed to draw");
                return;
            }
            pass.drawn += 1;
        }

        for &child in &node.children {
            self.visit(graph, child, &world, opacity, pass);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Command, Frame};
    use crate::scene::Init;

    fn frame_of(tree: &SceneTree, graph: &mut SignalGraph, root: NodeId) -> Frame {
        let mut frame = Frame::new(0, 0.0);
        tree.traverse(graph, root, Affine2::IDENTITY, &mut frame)
            .unwrap();
        frame
    }

    #[test]
    fn attach_rejects_second_owner() {
        let mut graph = SignalGraph::new();
        let mut tree = SceneTree::new();
        let a = tree.create(&mut graph, NodeBuilder::group()).unwrap();
        let b = tree.create(&mut graph, NodeBuilder::group()).unwrap();
        let c = tree.create(&mut graph, NodeBuilder::circle(1.0)).unwrap();

        tree.attach(a, c).unwrap();
        assert_eq!(
            tree.attach(b, c),
            Err(Error::AlreadyOwned { child: c, parent: a })
        );
        assert_eq!(tree.children(a).unwrap(), &[c]);
    }

    #[test]
    fn attach_rejects_cycles() {
        let mut graph = SignalGraph::new();
        let mut tree = SceneTree::new();
        let a = tree.create(&mut graph, NodeBuilder::group()).unwrap();
        let b = tree.create(&mut graph, NodeBuilder::group()).unwrap();
        tree.attach(a, b).unwrap();

        assert_eq!(
            tree.attach(b, a),
            Err(Error::OwnershipCycle { child: a, parent: b })
        );
        assert_eq!(
            tree.attach(a, a),
            Err(Error::OwnershipCycle { child: a, parent: a })
        );
    }

    #[test]
    fn detach_of_absent_child_is_a_no_op() {
        let mut graph = SignalGraph::new();
        let mut tree = SceneTree::new();
        let a = tree.create(&mut graph, NodeBuilder::group()).unwrap();
        let b = tree.create(&mut graph, NodeBuilder::group()).unwrap();

        tree.detach(a, b).unwrap();
        tree.attach(a, b).unwrap();
        tree.detach(a, b).unwrap();
        tree.detach(a, b).unwrap();
        assert_eq!(tree.parent(b).unwrap(), None);
        assert!(tree.children(a).unwrap().is_empty());
    }

    #[test]
    fn destroy_frees_subtree_and_signals() {
        let mut graph = SignalGraph::new();
        let mut tree = SceneTree::new();
        let root = tree.create(&mut graph, NodeBuilder::group()).unwrap();
        let a = tree.create(&mut graph, NodeBuilder::group()).unwrap();
        let b = tree.create(&mut graph, NodeBuilder::circle(2.0)).unwrap();
        tree.attach(root, a).unwrap();
        tree.attach(a, b).unwrap();
        let radius_signals = tree.node(b).unwrap().owned_signals().to_vec();

        tree.destroy(&mut graph, a).unwrap();

        assert_eq!(tree.len(), 1);
        assert!(tree.children(root).unwrap().is_empty());
        assert_eq!(tree.node(b).err(), Some(Error::DetachedNodeReference { node: b }));
        for id in radius_signals {
            assert!(!graph.contains(id));
        }
        assert_eq!(graph.len(), 5);
    }

    #[test]
    fn traversal_composes_transforms() {
        let mut graph = SignalGraph::new();
        let mut tree = SceneTree::new();
        let root = tree
            .create(&mut graph, NodeBuilder::group().position(Vec2::new(10.0, 0.0)).uniform_scale(2.0))
            .unwrap();
        let dot = tree
            .create(&mut graph, NodeBuilder::circle(1.0).position(Vec2::new(1.0, 1.0)))
            .unwrap();
        tree.attach(root, dot).unwrap();

        let frame = frame_of(&tree, &mut graph, root);
        assert_eq!(
            frame.commands().collect::<Vec<_>>(),
            vec![Command::Circle {
                center: Vec2::new(12.0, 2.0),
                radius: 2.0
            }]
        );
    }

    #[test]
    fn opacity_multiplies_and_is_emitted_on_change() {
        let mut graph = SignalGraph::new();
        let mut tree = SceneTree::new();
        let root = tree
            .create(&mut graph, NodeBuilder::group().opacity(0.5))
            .unwrap();
        let first = tree
            .create(&mut graph, NodeBuilder::circle(1.0).opacity(0.5))
            .unwrap();
        let second = tree
            .create(&mut graph, NodeBuilder::circle(1.0).opacity(0.5))
            .unwrap();
        tree.attach(root, first).unwrap();
        tree.attach(root, second).unwrap();

        let frame = frame_of(&tree, &mut graph, root);
        let opcodes: Vec<u8> = frame.instructions.iter().map(|i| i.opcode).collect();
        assert_eq!(opcodes, vec![2, 4, 4]);
        assert_eq!(frame.instructions[0].operands.as_slice(), &[0.25]);
    }

    #[test]
    fn invisible_nodes_hide_their_subtree() {
        let mut graph = SignalGraph::new();
        let mut tree = SceneTree::new();
        let shown = graph.create(true);
        let root = tree.create(&mut graph, NodeBuilder::group()).unwrap();
        let group = tree
            .create(&mut graph, NodeBuilder::group().visible(shown))
            .unwrap();
        let dot = tree.create(&mut graph, NodeBuilder::circle(1.0)).unwrap();
        tree.attach(root, group).unwrap();
        tree.attach(group, dot).unwrap();

        assert_eq!(frame_of(&tree, &mut graph, root).len(), 1);
        graph.set(shown, false).unwrap();
        assert!(frame_of(&tree, &mut graph, root).is_empty());
    }

    #[test]
    fn unreadable_subtrees_are_skipped() {
        let mut graph = SignalGraph::new();
        let mut tree = SceneTree::new();
        let radius = graph.create(1.0f32);
        let root = tree.create(&mut graph, NodeBuilder::group()).unwrap();
        let broken = tree
            .create(&mut graph, NodeBuilder::circle(Init::Bind(radius.into())))
            .unwrap();
        let fine = tree.create(&mut graph, NodeBuilder::circle(3.0)).unwrap();
        tree.attach(root, broken).unwrap();
        tree.attach(root, fine).unwrap();
        graph.dispose(radius.id());

        let frame = frame_of(&tree, &mut graph, root);
        assert_eq!(frame.len(), 1);
        assert!(matches!(
            frame.commands().next(),
            Some(Command::Circle { radius, .. }) if radius == 3.0
        ));
    }
}
