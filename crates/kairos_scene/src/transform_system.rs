//! Transform System
//!
//! Recomputes world matrices top-down. Decoupled from `Scene` so that it only
//! borrows the node arena, which lets the scene call it from inside its own
//! `&mut self` methods.
//!
//! The scene keeps the invariant `world == parent.world * local` eagerly:
//! every call that changes a local matrix or re-parents a node propagates the
//! affected subtree before returning, so there is no per-frame dirty pass.

use glam::Affine3A;
use slotmap::SlotMap;

use crate::NodeHandle;
use crate::node::Node;

/// World matrix of `handle`'s parent, or identity for an unparented node.
#[must_use]
pub fn parent_world(nodes: &SlotMap<NodeHandle, Node>, handle: NodeHandle) -> Affine3A {
    nodes
        .get(handle)
        .and_then(|node| node.parent)
        .and_then(|parent| nodes.get(parent))
        .map_or(Affine3A::IDENTITY, |parent| parent.transform.world)
}

/// Recomputes world matrices for `root` and its whole subtree.
///
/// Uses an explicit stack instead of recursion so deep hierarchies cannot
/// overflow the call stack. Returns the number of nodes updated.
pub fn propagate_subtree(nodes: &mut SlotMap<NodeHandle, Node>, root: NodeHandle) -> usize {
    let start = parent_world(nodes, root);

    // (node, parent world matrix)
    let mut stack: Vec<(NodeHandle, Affine3A)> = Vec::with_capacity(32);
    stack.push((root, start));
    let mut updated = 0;

    while let Some((handle, parent_world_matrix)) = stack.pop() {
        let Some(node) = nodes.get_mut(handle) else {
            continue;
        };

        node.transform.world = parent_world_matrix * node.transform.local;
        updated += 1;

        let world = node.transform.world;
        // Reverse so children are visited in declaration order.
        stack.extend(node.children.iter().rev().map(|&child| (child, world)));
    }

    updated
}
