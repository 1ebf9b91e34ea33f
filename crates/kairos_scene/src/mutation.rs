use crate::NodeHandle;
use crate::kind::NodeKind;
use crate::node::NodeId;

/// What happened to a node's scene membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationOp {
    Added,
    Removed,
}

/// One attach/detach notification.
///
/// Owns a snapshot of the node's capability so the entry stays meaningful
/// even if the node is destroyed before every frame slot has drained it.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMutation {
    pub node: NodeHandle,
    pub id: NodeId,
    pub name: String,
    pub op: MutationOp,
    pub kind: NodeKind,
}

impl SceneMutation {
    #[inline]
    #[must_use]
    pub fn is_added(&self) -> bool {
        self.op == MutationOp::Added
    }
}
