use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::NodeHandle;
use crate::kind::NodeKind;
use crate::process::ProcessMode;
use crate::script::NodeScript;
use crate::transform::Transform;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Monotonic node identity, unique for the lifetime of the process.
///
/// Unlike a [`NodeHandle`], an id is never reused and survives duplication
/// bookkeeping; it is what diagnostics print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A scene node.
///
/// # Hierarchy
///
/// Nodes form a tree inside a [`Scene`](crate::Scene) arena:
/// - `parent`: non-owning back-reference, used only for upward queries
///   (world transform, pause inheritance)
/// - `children`: exclusively owned child handles, in draw/process order
///
/// # Scene membership
///
/// Constructing a node does not put it in the scene. `in_scene` becomes true
/// only when the node (or an ancestor) is attached below the scene root, and
/// that transition is what produces deferred mutation entries for the
/// renderer.
pub struct Node {
    id: NodeId,
    name: String,

    // === Core Hierarchy ===
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,

    // === Core Spatial Data ===
    pub(crate) transform: Transform,

    // === Core State ===
    /// Pause filter mode.
    pub process_mode: ProcessMode,
    /// Visibility flag for rendering.
    pub visible: bool,
    pub(crate) kind: NodeKind,
    pub(crate) in_scene: bool,
    pub(crate) ready: bool,
    pub(crate) script: Option<Box<dyn NodeScript>>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind.capability())
            .field("process_mode", &self.process_mode)
            .field("in_scene", &self.in_scene)
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

impl Node {
    /// Creates a plain node.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self::with_kind(name, NodeKind::Plain)
    }

    /// Creates a node carrying a capability.
    #[must_use]
    pub fn with_kind(name: &str, kind: NodeKind) -> Self {
        Self {
            id: NodeId::next(),
            name: sanitize_name(name),
            parent: None,
            children: Vec::new(),
            transform: Transform::default(),
            process_mode: ProcessMode::Inherit,
            visible: true,
            kind,
            in_scene: false,
            ready: false,
            script: None,
        }
    }

    /// Sets the initial transform (builder style, before insertion).
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Transform::from_local(transform.local);
        self
    }

    #[must_use]
    pub fn with_process_mode(mut self, mode: ProcessMode) -> Self {
        self.process_mode = mode;
        self
    }

    #[must_use]
    pub fn with_script(mut self, script: impl NodeScript + 'static) -> Self {
        self.script = Some(Box::new(script));
        self
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the node. `/` is reserved for paths and becomes `_`.
    pub fn set_name(&mut self, name: &str) {
        self.name = sanitize_name(name);
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// `true` once the node is reachable from the scene root.
    #[inline]
    #[must_use]
    pub fn is_in_scene(&self) -> bool {
        self.in_scene
    }

    #[inline]
    #[must_use]
    pub fn has_script(&self) -> bool {
        self.script.is_some()
    }

    /// Copy of this node with a fresh id, no hierarchy and no script.
    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            id: NodeId::next(),
            name: self.name.clone(),
            parent: None,
            children: Vec::new(),
            transform: Transform::from_local(self.transform.local),
            process_mode: self.process_mode,
            visible: self.visible,
            kind: self.kind.clone(),
            in_scene: false,
            ready: false,
            script: None,
        }
    }
}

fn sanitize_name(name: &str) -> String {
    name.replace('/', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_cannot_contain_path_separators() {
        let mut node = Node::new("a/b");
        assert_eq!(node.name(), "a_b");
        node.set_name("x/y/z");
        assert_eq!(node.name(), "x_y_z");
    }

    #[test]
    fn ids_are_monotonic() {
        let a = Node::new("a");
        let b = Node::new("b");
        assert!(b.id() > a.id());
    }
}
