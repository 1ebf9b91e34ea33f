//! Scene Graph
//!
//! [`Scene`] owns every node in a slotmap arena and maintains three things
//! eagerly:
//!
//! - the tree structure (single parent, no cycles, one permanent root)
//! - world transforms (`world == parent.world * local` after every call)
//! - scene membership, recorded as [`SceneMutation`]s in an outbox
//!
//! # Attach / detach protocol
//!
//! Attaching a subtree below a node that is in the scene marks every node of
//! the subtree as in-scene and records one `Added` entry per node, in
//! pre-order. Detaching records the matching `Removed` entries. The engine
//! collects the outbox with [`Scene::take_mutations`] and fans it out to the
//! per-frame-slot queues; nothing is coalesced, so an attach immediately
//! followed by a detach still yields both entries.

use std::fmt::Write as _;

use glam::{Affine3A, Quat, Vec3};
use kairos_core::{KairosError, Result};
use slotmap::SlotMap;

use crate::NodeHandle;
use crate::kind::NodeKind;
use crate::mutation::{MutationOp, SceneMutation};
use crate::node::Node;
use crate::process::effective_processing;
use crate::script::{NodeScript, ScriptContext};
use crate::transform_system;
use crate::tween::Tween;

/// The scene container.
pub struct Scene {
    nodes: SlotMap<NodeHandle, Node>,
    root: NodeHandle,
    outbox: Vec<SceneMutation>,
    pending_ready: Vec<NodeHandle>,
    tweens: Vec<Box<dyn Tween>>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Creates a scene containing only its root node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let mut root = Node::new("Root");
        root.in_scene = true;
        root.ready = true;
        let root = nodes.insert(root);
        Self {
            nodes,
            root,
            outbox: Vec::new(),
            pending_ready: Vec::new(),
            tweens: Vec::new(),
        }
    }

    // ========================================================================
    // Node Creation & Access
    // ========================================================================

    /// The permanent root. It cannot be detached or destroyed.
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    /// Inserts a node into the arena without attaching it.
    pub fn insert(&mut self, mut node: Node) -> NodeHandle {
        node.parent = None;
        node.children.clear();
        node.in_scene = false;
        node.transform.world = node.transform.local;
        self.nodes.insert(node)
    }

    /// Creates an unattached plain node.
    pub fn create_node(&mut self, name: &str) -> NodeHandle {
        self.insert(Node::new(name))
    }

    /// Creates an unattached node with a capability.
    pub fn create_node_with_kind(&mut self, name: &str, kind: NodeKind) -> NodeHandle {
        self.insert(Node::with_kind(name, kind))
    }

    /// Inserts `node` and attaches it below `parent`.
    pub fn spawn(&mut self, parent: NodeHandle, node: Node) -> Result<NodeHandle> {
        let handle = self.insert(node);
        if let Err(err) = self.add_child(parent, handle) {
            self.nodes.remove(handle);
            return Err(err);
        }
        Ok(handle)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    /// Mutable access for name, visibility and process mode.
    ///
    /// Hierarchy, transform and kind changes go through the scene so its
    /// invariants hold.
    #[inline]
    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains_key(handle)
    }

    /// Number of nodes in the arena, attached or not, including the root.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when only the root exists.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    #[must_use]
    pub fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(handle).and_then(|n| n.parent)
    }

    #[must_use]
    pub fn children(&self, handle: NodeHandle) -> &[NodeHandle] {
        self.nodes.get(handle).map_or(&[], |n| n.children.as_slice())
    }

    #[must_use]
    pub fn is_in_scene(&self, handle: NodeHandle) -> bool {
        self.nodes.get(handle).is_some_and(|n| n.in_scene)
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Attaches `child` as the last child of `parent`.
    ///
    /// Fails if `child` already has a parent, is the root, or is an ancestor
    /// of `parent`.
    pub fn add_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<()> {
        let parent_node = self.node(parent)?;
        let parent_in_scene = parent_node.in_scene;
        let child_node = self.node(child)?;

        if child == self.root {
            return Err(KairosError::InvalidNode("the scene root cannot be re-parented".into()));
        }
        if child_node.parent.is_some() {
            return Err(KairosError::NodeAlreadyAttached(child_node.name().to_string()));
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(KairosError::HierarchyCycle {
                child: child_node.name().to_string(),
                parent: self.node(parent)?.name().to_string(),
            });
        }

        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
        transform_system::propagate_subtree(&mut self.nodes, child);

        if parent_in_scene {
            self.enter_scene(child);
        }
        Ok(())
    }

    /// Detaches `child` from `parent`. The subtree stays in the arena and can
    /// be attached again.
    pub fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<()> {
        let parent_node = self.node(parent)?;
        let Some(index) = parent_node.children.iter().position(|&c| c == child) else {
            return Err(KairosError::NotAChild {
                child: self.node(child).map_or_else(|_| format!("{child:?}"), |n| n.name().to_string()),
                parent: parent_node.name().to_string(),
            });
        };

        self.nodes[parent].children.remove(index);
        self.nodes[child].parent = None;
        transform_system::propagate_subtree(&mut self.nodes, child);

        if self.nodes[child].in_scene {
            self.exit_scene(child);
        }
        Ok(())
    }

    /// Detaches `child` from whatever parent it has. No-op for orphans.
    pub fn detach(&mut self, child: NodeHandle) -> Result<()> {
        if child == self.root {
            return Err(KairosError::InvalidNode("the scene root cannot be detached".into()));
        }
        match self.node(child)?.parent {
            Some(parent) => self.remove_child(parent, child),
            None => Ok(()),
        }
    }

    /// Detaches `handle` and frees its whole subtree. Returns the number of
    /// nodes freed.
    pub fn destroy(&mut self, handle: NodeHandle) -> Result<usize> {
        if handle == self.root {
            return Err(KairosError::InvalidNode("the scene root cannot be destroyed".into()));
        }
        self.detach(handle)?;
        let subtree = self.walk(handle);
        for node in &subtree {
            self.nodes.remove(*node);
        }
        self.pending_ready.retain(|h| !subtree.contains(h));
        Ok(subtree.len())
    }

    /// Replaces a node's capability. Only allowed while the node is outside
    /// the scene, so attach and detach entries always describe the same kind.
    pub fn set_kind(&mut self, handle: NodeHandle, kind: NodeKind) -> Result<()> {
        let node = self.node_mut(handle)?;
        if node.in_scene {
            return Err(KairosError::NodeInScene(node.name().to_string()));
        }
        node.kind = kind;
        Ok(())
    }

    /// Installs (or replaces) the node's script.
    pub fn set_script(&mut self, handle: NodeHandle, script: impl NodeScript + 'static) -> Result<()> {
        self.node_mut(handle)?.script = Some(Box::new(script));
        Ok(())
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    pub fn set_local_transform(&mut self, handle: NodeHandle, local: Affine3A) -> Result<()> {
        self.edit_transform(handle, |t| t.local = local)
    }

    pub fn set_position(&mut self, handle: NodeHandle, position: Vec3) -> Result<()> {
        self.edit_transform(handle, |t| t.set_position(position))
    }

    pub fn translate(&mut self, handle: NodeHandle, offset: Vec3) -> Result<()> {
        self.edit_transform(handle, |t| t.translate(offset))
    }

    pub fn set_rotation(&mut self, handle: NodeHandle, rotation: Quat) -> Result<()> {
        self.edit_transform(handle, |t| t.set_rotation(rotation))
    }

    pub fn set_scale(&mut self, handle: NodeHandle, scale: Vec3) -> Result<()> {
        self.edit_transform(handle, |t| t.set_scale(scale))
    }

    /// Rotates around the local X axis.
    pub fn rotate_x(&mut self, handle: NodeHandle, angle: f32) -> Result<()> {
        self.edit_transform(handle, |t| t.rotate_local(Quat::from_rotation_x(angle)))
    }

    /// Rotates around the local Y axis.
    pub fn rotate_y(&mut self, handle: NodeHandle, angle: f32) -> Result<()> {
        self.edit_transform(handle, |t| t.rotate_local(Quat::from_rotation_y(angle)))
    }

    /// Rotates around the local Z axis.
    pub fn rotate_z(&mut self, handle: NodeHandle, angle: f32) -> Result<()> {
        self.edit_transform(handle, |t| t.rotate_local(Quat::from_rotation_z(angle)))
    }

    /// Moves the node so its world position becomes `position`.
    pub fn set_position_global(&mut self, handle: NodeHandle, position: Vec3) -> Result<()> {
        self.node(handle)?;
        let parent_world = transform_system::parent_world(&self.nodes, handle);
        let local = parent_world.inverse().transform_point3(position);
        self.set_position(handle, local)
    }

    #[must_use]
    pub fn local_transform(&self, handle: NodeHandle) -> Option<Affine3A> {
        self.nodes.get(handle).map(|n| n.transform.local)
    }

    #[must_use]
    pub fn world_transform(&self, handle: NodeHandle) -> Option<Affine3A> {
        self.nodes.get(handle).map(|n| n.transform.world)
    }

    fn edit_transform(&mut self, handle: NodeHandle, edit: impl FnOnce(&mut crate::Transform)) -> Result<()> {
        edit(&mut self.node_mut(handle)?.transform);
        transform_system::propagate_subtree(&mut self.nodes, handle);
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Direct child of `parent` called `name`.
    #[must_use]
    pub fn find_child(&self, parent: NodeHandle, name: &str) -> Option<NodeHandle> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.nodes.get(c).is_some_and(|n| n.name() == name))
    }

    /// Resolves a `/`-separated path of child names starting at `from`.
    /// Empty segments are ignored, so `"a//b/"` equals `"a/b"`.
    #[must_use]
    pub fn find_node(&self, from: NodeHandle, path: &str) -> Option<NodeHandle> {
        if !self.contains(from) {
            return None;
        }
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(from, |current, segment| self.find_child(current, segment))
    }

    /// `true` if `child` is a direct child of `parent`, or any descendant
    /// when `recursive` is set.
    #[must_use]
    pub fn has_child(&self, parent: NodeHandle, child: NodeHandle, recursive: bool) -> bool {
        if recursive {
            parent != child && self.is_ancestor(parent, child)
        } else {
            self.parent(child) == Some(parent)
        }
    }

    /// First descendant of `from` (pre-order, `from` excluded) matching
    /// `predicate`.
    pub fn find_first(&self, from: NodeHandle, mut predicate: impl FnMut(&Node) -> bool) -> Option<NodeHandle> {
        self.walk(from)
            .into_iter()
            .skip(1)
            .find(|&h| self.nodes.get(h).is_some_and(&mut predicate))
    }

    /// `handle` and all its descendants in pre-order.
    #[must_use]
    pub fn walk(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Indented, one-node-per-line dump of the subtree at `handle`.
    #[must_use]
    pub fn tree_string(&self, handle: NodeHandle) -> String {
        let mut out = String::new();
        let mut stack = vec![(handle, 0_usize)];
        while let Some((current, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            let _ = writeln!(
                out,
                "{}{} {} ({:?})",
                "  ".repeat(depth),
                node.id(),
                node.name(),
                node.kind().capability()
            );
            stack.extend(node.children.iter().rev().map(|&c| (c, depth + 1)));
        }
        out
    }

    /// Deep-copies the subtree at `handle` into a new, unattached subtree.
    ///
    /// Copies get fresh ids. Scripts are not copied.
    pub fn duplicate(&mut self, handle: NodeHandle) -> Result<NodeHandle> {
        let copy = self.node(handle)?.detached_copy();
        let new_root = self.nodes.insert(copy);

        let mut stack = vec![(handle, new_root)];
        while let Some((source, target)) = stack.pop() {
            let children = self.children(source).to_vec();
            for child in children {
                let Some(child_copy) = self.nodes.get(child).map(Node::detached_copy) else {
                    continue;
                };
                let new_child = self.nodes.insert(child_copy);
                self.nodes[new_child].parent = Some(target);
                self.nodes[target].children.push(new_child);
                stack.push((child, new_child));
            }
        }

        transform_system::propagate_subtree(&mut self.nodes, new_root);
        Ok(new_root)
    }

    /// Whether callbacks of `handle` run given the engine pause flag.
    #[must_use]
    pub fn is_processed(&self, handle: NodeHandle, paused: bool) -> bool {
        let modes = std::iter::successors(self.nodes.get(handle), |node| {
            node.parent.and_then(|p| self.nodes.get(p))
        })
        .map(|node| node.process_mode);
        self.contains(handle) && effective_processing(modes, paused)
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    /// Runs `on_ready` for nodes that entered the scene since the last call.
    pub fn dispatch_ready(&mut self) {
        let pending = std::mem::take(&mut self.pending_ready);
        for handle in pending {
            let Some(node) = self.nodes.get_mut(handle) else {
                continue;
            };
            if node.ready || !node.in_scene {
                continue;
            }
            node.ready = true;
            self.with_script(handle, |script, ctx| script.on_ready(ctx));
        }
    }

    /// Runs `on_physics_process` in tree order for processed nodes.
    pub fn physics_process(&mut self, dt: f32, paused: bool) {
        for handle in self.walk(self.root) {
            if self.is_in_scene(handle) && self.is_processed(handle, paused) {
                self.with_script(handle, |script, ctx| script.on_physics_process(ctx, dt));
            }
        }
    }

    /// Runs `on_process` in tree order for processed nodes.
    pub fn process(&mut self, alpha: f32, paused: bool) {
        for handle in self.walk(self.root) {
            if self.is_in_scene(handle) && self.is_processed(handle, paused) {
                self.with_script(handle, |script, ctx| script.on_process(ctx, alpha));
            }
        }
    }

    fn with_script(&mut self, handle: NodeHandle, call: impl FnOnce(&mut dyn NodeScript, &mut ScriptContext<'_>)) {
        let Some(mut script) = self.nodes.get_mut(handle).and_then(|n| n.script.take()) else {
            return;
        };
        {
            let mut ctx = ScriptContext { scene: self, node: handle };
            call(script.as_mut(), &mut ctx);
        }
        // The node may have been destroyed, or given a new script, meanwhile.
        if let Some(node) = self.nodes.get_mut(handle)
            && node.script.is_none()
        {
            node.script = Some(script);
        }
    }

    // ========================================================================
    // Tweens
    // ========================================================================

    pub fn add_tween(&mut self, tween: impl Tween + 'static) {
        self.tweens.push(Box::new(tween));
    }

    #[inline]
    #[must_use]
    pub fn active_tweens(&self) -> usize {
        self.tweens.len()
    }

    /// Advances every tween whose target is processed; drops finished ones
    /// and those whose target no longer exists.
    pub fn update_tweens(&mut self, dt: f32, paused: bool) {
        let mut tweens = std::mem::take(&mut self.tweens);
        tweens.retain_mut(|tween| {
            let target = tween.target();
            if !self.contains(target) {
                return false;
            }
            if !self.is_processed(target, paused) {
                return true;
            }
            !tween.update(self, dt)
        });
        // Tweens created by setters during this update run from the next step.
        tweens.append(&mut self.tweens);
        self.tweens = tweens;
    }

    // ========================================================================
    // Mutation outbox
    // ========================================================================

    /// Entries recorded since the last call, in order.
    pub fn take_mutations(&mut self) -> Vec<SceneMutation> {
        std::mem::take(&mut self.outbox)
    }

    #[inline]
    #[must_use]
    pub fn pending_mutations(&self) -> &[SceneMutation] {
        &self.outbox
    }

    fn enter_scene(&mut self, subtree_root: NodeHandle) {
        for handle in self.walk(subtree_root) {
            let node = &mut self.nodes[handle];
            node.in_scene = true;
            if !node.ready {
                self.pending_ready.push(handle);
            }
            let entry = Self::mutation(handle, node, MutationOp::Added);
            log::trace!("node {} {} added to scene", entry.id, entry.name);
            self.outbox.push(entry);
        }
    }

    fn exit_scene(&mut self, subtree_root: NodeHandle) {
        for handle in self.walk(subtree_root) {
            let node = &mut self.nodes[handle];
            node.in_scene = false;
            let entry = Self::mutation(handle, node, MutationOp::Removed);
            log::trace!("node {} {} removed from scene", entry.id, entry.name);
            self.outbox.push(entry);
        }
    }

    fn mutation(handle: NodeHandle, node: &Node, op: MutationOp) -> SceneMutation {
        SceneMutation {
            node: handle,
            id: node.id(),
            name: node.name().to_string(),
            op,
            kind: node.kind.clone(),
        }
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn node(&self, handle: NodeHandle) -> Result<&Node> {
        self.nodes
            .get(handle)
            .ok_or_else(|| KairosError::InvalidNode(format!("{handle:?}")))
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Result<&mut Node> {
        self.nodes
            .get_mut(handle)
            .ok_or_else(|| KairosError::InvalidNode(format!("{handle:?}")))
    }

    /// `true` if `ancestor` is a strict ancestor of `node`.
    fn is_ancestor(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = self.parent(node);
        while let Some(handle) = current {
            if handle == ancestor {
                return true;
            }
            current = self.parent(handle);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_below_orphan_does_not_enter_scene() {
        let mut scene = Scene::new();
        let group = scene.create_node("group");
        let leaf = scene.create_node("leaf");
        scene.add_child(group, leaf).unwrap();
        assert!(!scene.is_in_scene(leaf));
        assert!(scene.pending_mutations().is_empty());

        scene.add_child(scene.root(), group).unwrap();
        assert!(scene.is_in_scene(leaf));
        let ops: Vec<_> = scene.take_mutations().into_iter().map(|m| (m.node, m.op)).collect();
        assert_eq!(ops, vec![(group, MutationOp::Added), (leaf, MutationOp::Added)]);
    }

    #[test]
    fn destroy_frees_the_subtree() {
        let mut scene = Scene::new();
        let a = scene.spawn(scene.root(), Node::new("a")).unwrap();
        let b = scene.spawn(a, Node::new("b")).unwrap();
        assert_eq!(scene.destroy(a).unwrap(), 2);
        assert!(!scene.contains(a));
        assert!(!scene.contains(b));
        assert!(scene.is_empty());
    }

    #[test]
    fn root_is_protected() {
        let mut scene = Scene::new();
        let root = scene.root();
        assert!(scene.destroy(root).is_err());
        assert!(scene.detach(root).is_err());
    }
}
