//! Deferred Mutation Queues
//!
//! One FIFO of [`SceneMutation`]s per frame slot. Every published entry is
//! copied into *every* slot's queue, because up to `F - 1` other frames may
//! still be rendering the pre-mutation scene. Each queue is drained exactly
//! once per cycle of its slot; nothing is coalesced, so an attach followed by
//! a detach of the same node is replayed as both entries, in order.

use std::collections::VecDeque;

use kairos_core::{KairosError, Result};
use kairos_scene::{NodeHandle, SceneMutation};

use crate::slot::{FrameSlot, PerSlot};

#[derive(Debug, Default)]
struct SlotQueue {
    entries: VecDeque<SceneMutation>,
    camera_request: Option<NodeHandle>,
}

/// What a slot receives when it drains.
#[derive(Debug, Default)]
pub struct DrainedMutations {
    pub entries: VecDeque<SceneMutation>,
    /// Latest camera activation request published since the last drain.
    pub camera_request: Option<NodeHandle>,
}

impl DrainedMutations {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.camera_request.is_none()
    }
}

#[derive(Debug)]
pub struct MutationQueues {
    slots: PerSlot<SlotQueue>,
    next_drain: FrameSlot,
}

impl MutationQueues {
    #[must_use]
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            slots: PerSlot::from_fn(frames_in_flight.max(1), |_| SlotQueue::default()),
            next_drain: FrameSlot(0),
        }
    }

    #[inline]
    #[must_use]
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Slot expected to drain next.
    #[inline]
    #[must_use]
    pub fn next_slot(&self) -> FrameSlot {
        self.next_drain
    }

    /// Appends `mutation` to every slot's queue.
    pub fn publish(&mut self, mutation: &SceneMutation) {
        for queue in self.slots.iter_mut() {
            queue.entries.push_back(mutation.clone());
        }
    }

    pub fn publish_all(&mut self, mutations: impl IntoIterator<Item = SceneMutation>) {
        for mutation in mutations {
            self.publish(&mutation);
        }
    }

    /// Asks every slot to make `camera` its active camera after its next
    /// drain. A later request replaces an undrained earlier one.
    pub fn request_camera(&mut self, camera: NodeHandle) {
        for queue in self.slots.iter_mut() {
            queue.camera_request = Some(camera);
        }
    }

    /// Number of entries waiting in `slot`'s queue.
    #[must_use]
    pub fn pending(&self, slot: FrameSlot) -> usize {
        self.slots.get(slot).map_or(0, |q| q.entries.len())
    }

    /// Takes everything queued for `slot`. Slots must drain in cycling order.
    pub fn drain(&mut self, slot: FrameSlot) -> Result<DrainedMutations> {
        let frames_in_flight = self.frames_in_flight();
        if slot.index() >= frames_in_flight {
            return Err(KairosError::SlotOutOfRange { slot: slot.index(), frames_in_flight });
        }
        if slot != self.next_drain {
            return Err(KairosError::SlotOutOfOrder {
                expected: self.next_drain.index(),
                got: slot.index(),
            });
        }
        self.next_drain = slot.next(frames_in_flight);

        let queue = &mut self.slots[slot];
        Ok(DrainedMutations {
            entries: std::mem::take(&mut queue.entries),
            camera_request: queue.camera_request.take(),
        })
    }

    /// Drops every pending entry and restarts the cycle at slot 0.
    pub fn clear(&mut self) {
        for queue in self.slots.iter_mut() {
            *queue = SlotQueue::default();
        }
        self.next_drain = FrameSlot(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairos_scene::{Node, Scene};

    fn attach_one(scene: &mut Scene, name: &str) -> Vec<SceneMutation> {
        let root = scene.root();
        scene.spawn(root, Node::new(name)).unwrap();
        scene.take_mutations()
    }

    #[test]
    fn entries_fan_out_to_every_slot() {
        let mut scene = Scene::new();
        let mut queues = MutationQueues::new(3);
        queues.publish_all(attach_one(&mut scene, "a"));
        for i in 0..3 {
            assert_eq!(queues.pending(FrameSlot(i)), 1);
        }
    }

    #[test]
    fn draining_out_of_order_is_rejected() {
        let mut queues = MutationQueues::new(2);
        assert!(matches!(
            queues.drain(FrameSlot(1)),
            Err(KairosError::SlotOutOfOrder { expected: 0, got: 1 })
        ));
        assert!(queues.drain(FrameSlot(0)).unwrap().is_empty());
        assert!(queues.drain(FrameSlot(1)).is_ok());
        assert!(matches!(queues.drain(FrameSlot(2)), Err(KairosError::SlotOutOfRange { .. })));
        assert_eq!(queues.next_slot(), FrameSlot(0));
    }

    #[test]
    fn each_slot_sees_only_what_arrived_since_its_last_drain() {
        let mut scene = Scene::new();
        let mut queues = MutationQueues::new(2);

        queues.publish_all(attach_one(&mut scene, "a"));
        assert_eq!(queues.drain(FrameSlot(0)).unwrap().entries.len(), 1);

        queues.publish_all(attach_one(&mut scene, "b"));
        let slot1: Vec<_> = queues.drain(FrameSlot(1)).unwrap().entries.into_iter().map(|m| m.name).collect();
        assert_eq!(slot1, vec!["a", "b"]);

        let slot0: Vec<_> = queues.drain(FrameSlot(0)).unwrap().entries.into_iter().map(|m| m.name).collect();
        assert_eq!(slot0, vec!["b"]);
    }
}
